use std::time::Duration;

use async_nats::connection::State;
use async_nats::jetstream::Context as JetStreamContext;
use async_nats::jetstream::stream::Config as StreamConfig;
use async_nats::{Client, ConnectOptions, jetstream};
use bytes::Bytes;
use jetgate_wire::PublishReceipt;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;

use crate::error::{self, Error, Result};
use crate::subject;

/// Process-wide handle to the message broker.
///
/// Constructed once at startup and cloned into every request handler; clones
/// share the underlying connection. All bridge operations go through this
/// capability; there is no ambient global client.
#[derive(Clone, Debug)]
pub struct Broker {
    client: Client,
    jetstream: JetStreamContext,
}

impl Broker {
    /// Connects to the broker at the given URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BrokerUnavailable`] if the connection cannot be
    /// established.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = ConnectOptions::new()
            .connection_timeout(Duration::from_secs(5))
            .connect(url)
            .await
            .map_err(|e| Error::BrokerUnavailable(e.to_string()))?;

        Ok(Self::from_client(client))
    }

    /// Wraps an already-connected client.
    #[must_use]
    pub fn from_client(client: Client) -> Self {
        let jetstream = jetstream::new(client.clone());

        Self { client, jetstream }
    }

    pub(crate) const fn jetstream(&self) -> &JetStreamContext {
        &self.jetstream
    }

    /// Publishes an opaque payload, creating the inferred stream on first
    /// use (broker-side behavior; the bridge keeps no record of it).
    ///
    /// # Errors
    ///
    /// Returns an error if the subject is malformed or the broker rejects
    /// the publish.
    pub async fn publish(&self, subject: &str, payload: Bytes) -> Result<PublishReceipt> {
        let stream_name = subject::stream_name(subject)?;
        let subjects = subject::inferred_subjects(subject)?;

        self.jetstream
            .get_or_create_stream(StreamConfig {
                name: stream_name.clone(),
                subjects,
                ..Default::default()
            })
            .await
            .map_err(Error::internal)?;

        let ack = self
            .jetstream
            .publish(subject.to_string(), payload)
            .await
            .map_err(|e| error::publish_error(&stream_name, e))?
            .await
            .map_err(|e| error::publish_error(&stream_name, e))?;

        Ok(PublishReceipt {
            published: true,
            subject: subject.to_string(),
            stream: ack.stream,
            sequence: ack.sequence,
            timestamp: OffsetDateTime::now_utc(),
        })
    }

    /// The last sequence number of a stream, or `None` if the stream does
    /// not exist.
    ///
    /// # Errors
    ///
    /// Returns an error for any failure other than a missing stream.
    pub async fn last_sequence(&self, stream_name: &str) -> Result<Option<u64>> {
        match self.jetstream.get_stream(stream_name).await {
            Ok(mut stream) => {
                let info = stream
                    .info()
                    .await
                    .map_err(|e| Error::BrokerUnavailable(e.to_string()))?;

                Ok(Some(info.state.last_sequence))
            }
            Err(err) => match error::stream_error(stream_name, err) {
                Error::StreamNotFound(_) => {
                    debug!(stream = %stream_name, "stream absent");
                    Ok(None)
                }
                other => Err(other),
            },
        }
    }

    /// A point-in-time summary of a stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StreamNotFound`] if the stream does not exist.
    pub async fn stream_info(&self, stream_name: &str) -> Result<StreamSnapshot> {
        let mut stream = self
            .jetstream
            .get_stream(stream_name)
            .await
            .map_err(|e| error::stream_error(stream_name, e))?;

        let info = stream
            .info()
            .await
            .map_err(|e| Error::BrokerUnavailable(e.to_string()))?;

        Ok(StreamSnapshot {
            name: info.config.name.clone(),
            subjects: info.config.subjects.iter().map(ToString::to_string).collect(),
            messages: info.state.messages,
            first_sequence: info.state.first_sequence,
            last_sequence: info.state.last_sequence,
            consumer_count: info.state.consumer_count,
        })
    }

    /// Current broker connectivity, as reported to the health endpoint.
    pub async fn health(&self) -> HealthSnapshot {
        let nats_connected = self.client.connection_state() == State::Connected;
        let jetstream_available = self.jetstream.query_account().await.is_ok();

        HealthSnapshot {
            status: if nats_connected && jetstream_available {
                "healthy".to_string()
            } else {
                "degraded".to_string()
            },
            nats_connected,
            jetstream_available,
        }
    }
}

/// Point-in-time summary of a stream.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamSnapshot {
    /// Stream name.
    pub name: String,

    /// Subjects the stream captures.
    pub subjects: Vec<String>,

    /// Number of messages currently retained.
    pub messages: u64,

    /// Sequence of the oldest retained message.
    pub first_sequence: u64,

    /// Sequence of the newest message.
    pub last_sequence: u64,

    /// Number of consumers defined on the stream.
    pub consumer_count: usize,
}

/// Broker connectivity snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// `healthy` when both fields below hold, `degraded` otherwise.
    pub status: String,

    /// Whether the underlying connection is currently established.
    pub nats_connected: bool,

    /// Whether the JetStream API answered an account query.
    pub jetstream_available: bool,
}

//! Live message feeds backing the WebSocket streaming bridge.
//!
//! A feed is a continuous pull subscription over either a transient
//! subject-filter consumer (messages from connection time forward) or a
//! pre-existing durable consumer. The socket side owns pacing: it awaits
//! [`LiveFeed::next_item`], writes the frame, and (for ack-required
//! durables) acknowledges only after the write succeeded, so the durable's
//! position advances exactly as far as the client has been sent.

use std::time::Duration;

use async_nats::jetstream::Context as JetStreamContext;
use async_nats::jetstream::Message;
use async_nats::jetstream::consumer::pull::Config as PullConfig;
use async_nats::jetstream::consumer::{AckPolicy, DeliverPolicy};
use futures::StreamExt;
use jetgate_wire::StreamMessage;
use tracing::{debug, warn};

use crate::broker::Broker;
use crate::error::{self, Error, Result};
use crate::{codec, fetch, subject};

/// Reaper threshold for feed consumers, should explicit deletion fail.
const FEED_IDLE_TTL: Duration = Duration::from_secs(60);

/// An open feed of messages for one streaming session.
pub struct LiveFeed {
    jetstream: JetStreamContext,
    stream_name: String,
    /// Transient consumer to delete on close, if this feed created one.
    transient: Option<String>,
    /// Durable consumer name, used to annotate delivered messages.
    source: Option<String>,
    ack_required: bool,
    messages: async_nats::jetstream::consumer::pull::Stream,
}

/// One delivered message plus its pending acknowledgement, if any.
pub struct FeedItem {
    message: StreamMessage,
    raw: Option<Message>,
}

impl FeedItem {
    /// The converted wire message.
    #[must_use]
    pub const fn message(&self) -> &StreamMessage {
        &self.message
    }

    /// Acknowledges the delivery, advancing the durable's position.
    ///
    /// Call only after the message reached the client. A failed
    /// acknowledgement is logged; the broker will redeliver.
    pub async fn acknowledge(self) {
        if let Some(raw) = self.raw {
            if let Err(err) = raw.ack().await {
                warn!(error = %err, "failed to acknowledge delivered message");
            }
        }
    }
}

impl LiveFeed {
    /// Waits for the next delivered message.
    ///
    /// Returns `None` when the underlying subscription ends. Cancel-safe:
    /// dropping the future loses no message.
    pub async fn next_item(&mut self) -> Option<Result<FeedItem>> {
        match self.messages.next().await? {
            Ok(message) => Some(
                codec::stream_message(&message, self.source.as_deref()).map(|converted| FeedItem {
                    message: converted,
                    raw: self.ack_required.then_some(message),
                }),
            ),
            Err(err) => Some(Err(Error::internal(err))),
        }
    }

    /// Tears the feed down, deleting its transient consumer if it has one.
    pub async fn close(self) {
        drop(self.messages);

        if let Some(name) = self.transient {
            if let Err(err) = self
                .jetstream
                .delete_consumer_from_stream(&name, &self.stream_name)
                .await
            {
                warn!(
                    stream = %self.stream_name,
                    consumer = %name,
                    error = %err,
                    "failed to delete feed consumer; inactivity threshold will reap it"
                );
            } else {
                debug!(stream = %self.stream_name, consumer = %name, "deleted feed consumer");
            }
        }
    }
}

/// Opens a feed of messages matching `subject_filter`, starting at
/// connection time.
///
/// # Errors
///
/// Returns [`Error::StreamNotFound`] when no stream owns the filter's first
/// token.
pub async fn open_subject(broker: &Broker, subject_filter: &str) -> Result<LiveFeed> {
    let stream_name = subject::stream_name(subject_filter)?;
    let name = fetch::transient_name();

    let consumer = broker
        .jetstream()
        .create_consumer_on_stream(
            PullConfig {
                name: Some(name.clone()),
                deliver_policy: DeliverPolicy::New,
                ack_policy: AckPolicy::None,
                filter_subject: subject_filter.to_string(),
                inactive_threshold: FEED_IDLE_TTL,
                ..Default::default()
            },
            stream_name.as_str(),
        )
        .await
        .map_err(|e| error::consumer_error(&stream_name, &name, e))?;

    let messages = consumer
        .messages()
        .await
        .map_err(|e| Error::BrokerUnavailable(e.to_string()))?;

    debug!(stream = %stream_name, consumer = %name, filter = %subject_filter, "opened subject feed");

    Ok(LiveFeed {
        jetstream: broker.jetstream().clone(),
        stream_name,
        transient: Some(name),
        source: None,
        ack_required: false,
        messages,
    })
}

/// Opens a feed over an existing durable consumer.
///
/// # Errors
///
/// Returns [`Error::ConsumerNotFound`] when the consumer does not exist.
pub async fn open_durable(
    broker: &Broker,
    stream_name: &str,
    consumer_name: &str,
) -> Result<LiveFeed> {
    let consumer = fetch::lookup_durable(broker, stream_name, consumer_name).await?;
    let ack_required = consumer.cached_info().config.ack_policy != AckPolicy::None;

    let messages = consumer
        .messages()
        .await
        .map_err(|e| Error::BrokerUnavailable(e.to_string()))?;

    debug!(stream = %stream_name, consumer = %consumer_name, "opened durable feed");

    Ok(LiveFeed {
        jetstream: broker.jetstream().clone(),
        stream_name: stream_name.to_string(),
        transient: None,
        source: Some(consumer_name.to_string()),
        ack_required,
        messages,
    })
}

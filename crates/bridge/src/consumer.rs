//! Durable-consumer management: create, inspect, delete, peek, and the
//! destructive reset/replay transition.

use std::time::Duration;

use async_nats::jetstream::consumer::pull::Config as PullConfig;
use async_nats::jetstream::consumer::{AckPolicy, DeliverPolicy, Info as ConsumerInfo};
use futures::TryStreamExt;
use jetgate_wire::FetchBatch;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::broker::Broker;
use crate::error::{self, Error, Result};
use crate::fetch;

/// Request body for creating a consumer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsumerSpec {
    /// Consumer name.
    pub name: String,

    /// Whether the consumer survives client disconnects.
    #[serde(default = "default_durable")]
    pub durable: bool,

    /// Subject filter scoping the consumer, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_subject: Option<String>,

    /// Where the consumer starts reading.
    #[serde(default)]
    pub deliver_policy: StartPolicy,

    /// How delivered messages are acknowledged.
    #[serde(default)]
    pub ack_policy: AckMode,

    /// Redelivery cap for unacknowledged messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_deliver: Option<i64>,

    /// Seconds to wait for an acknowledgement before redelivering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_wait_secs: Option<u64>,

    /// Seconds of inactivity after which the broker reaps the consumer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inactive_threshold_secs: Option<u64>,
}

const fn default_durable() -> bool {
    true
}

impl ConsumerSpec {
    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::InvalidArgument(
                "consumer name must not be empty".to_string(),
            ));
        }

        if self
            .name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '.' | '*' | '>'))
        {
            return Err(Error::InvalidArgument(format!(
                "consumer name `{}` must not contain whitespace, `.`, `*` or `>`",
                self.name
            )));
        }

        Ok(())
    }

    fn into_config(self) -> PullConfig {
        let durable_name = self.durable.then(|| self.name.clone());

        PullConfig {
            durable_name,
            name: Some(self.name),
            deliver_policy: self.deliver_policy.into_nats(),
            ack_policy: self.ack_policy.into_nats(),
            filter_subject: self.filter_subject.unwrap_or_default(),
            max_deliver: self.max_deliver.unwrap_or_default(),
            ack_wait: self.ack_wait_secs.map_or_else(Duration::default, Duration::from_secs),
            inactive_threshold: self
                .inactive_threshold_secs
                .map_or_else(Duration::default, Duration::from_secs),
            ..Default::default()
        }
    }
}

/// Where a consumer starts reading its stream.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPolicy {
    /// From the first retained message.
    #[default]
    All,

    /// From the newest message.
    Last,

    /// Only messages published after creation.
    New,

    /// From a specific stream sequence.
    ByStartSequence {
        /// The sequence to start at.
        sequence: u64,
    },

    /// From a specific point in time.
    ByStartTime {
        /// The time to start at.
        #[serde(with = "time::serde::rfc3339")]
        time: OffsetDateTime,
    },
}

impl StartPolicy {
    const fn into_nats(self) -> DeliverPolicy {
        match self {
            Self::All => DeliverPolicy::All,
            Self::Last => DeliverPolicy::Last,
            Self::New => DeliverPolicy::New,
            Self::ByStartSequence { sequence } => DeliverPolicy::ByStartSequence {
                start_sequence: sequence,
            },
            Self::ByStartTime { time } => DeliverPolicy::ByStartTime { start_time: time },
        }
    }
}

/// How a consumer's position advances.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckMode {
    /// Every message must be acknowledged individually.
    #[default]
    Explicit,

    /// No acknowledgement; the position advances on delivery.
    None,

    /// Acknowledging a message acknowledges everything before it.
    All,
}

impl AckMode {
    const fn into_nats(self) -> AckPolicy {
        match self {
            Self::Explicit => AckPolicy::Explicit,
            Self::None => AckPolicy::None,
            Self::All => AckPolicy::All,
        }
    }
}

/// A consumer's configuration and delivery state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsumerDetails {
    /// Stream the consumer reads.
    pub stream: String,

    /// Consumer name.
    pub name: String,

    /// Whether the consumer is durable.
    pub durable: bool,

    /// Subject filter, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_subject: Option<String>,

    /// Effective deliver policy.
    pub deliver_policy: String,

    /// Effective ack policy.
    pub ack_policy: String,

    /// Messages in the stream the consumer has not been sent yet.
    pub pending: u64,

    /// Delivered messages still waiting for an acknowledgement.
    pub ack_pending: usize,

    /// Messages delivered more than once.
    pub redelivered: usize,

    /// Stream sequence of the last delivered message.
    pub delivered_stream_sequence: u64,

    /// Stream sequence below which everything is acknowledged.
    pub ack_floor_stream_sequence: u64,
}

impl ConsumerDetails {
    fn from_info(stream: &str, info: &ConsumerInfo) -> Self {
        Self {
            stream: stream.to_string(),
            name: info.name.clone(),
            durable: info.config.durable_name.is_some(),
            filter_subject: (!info.config.filter_subject.is_empty())
                .then(|| info.config.filter_subject.clone()),
            deliver_policy: deliver_policy_label(&info.config.deliver_policy),
            ack_policy: ack_policy_label(info.config.ack_policy),
            pending: info.num_pending,
            ack_pending: info.num_ack_pending,
            redelivered: info.num_redelivered,
            delivered_stream_sequence: info.delivered.stream_sequence,
            ack_floor_stream_sequence: info.ack_floor.stream_sequence,
        }
    }
}

/// Derived liveness snapshot for a consumer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsumerHealth {
    /// Stream the consumer reads.
    pub stream: String,

    /// Consumer name.
    pub consumer: String,

    /// Messages not yet delivered.
    pub pending: u64,

    /// Delivered but unacknowledged messages.
    pub ack_pending: usize,

    /// Messages delivered more than once.
    pub redelivered: usize,

    /// Stream sequence of the last delivered message.
    pub delivered_stream_sequence: u64,

    /// Stream sequence below which everything is acknowledged.
    pub ack_floor_stream_sequence: u64,

    /// Whether the consumer has nothing left to deliver.
    pub caught_up: bool,
}

/// A replay instruction for [`reset`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ResetAction {
    /// Start over from the first retained message.
    ResetAll,

    /// Replay from a specific stream sequence.
    ReplayFromSequence {
        /// The sequence to replay from.
        sequence: u64,
    },

    /// Replay from a specific point in time.
    ReplayFromTime {
        /// The time to replay from.
        #[serde(with = "time::serde::rfc3339")]
        time: OffsetDateTime,
    },
}

impl ResetAction {
    const fn deliver_policy(&self) -> DeliverPolicy {
        match self {
            Self::ResetAll => DeliverPolicy::All,
            Self::ReplayFromSequence { sequence } => DeliverPolicy::ByStartSequence {
                start_sequence: *sequence,
            },
            Self::ReplayFromTime { time } => DeliverPolicy::ByStartTime { start_time: *time },
        }
    }
}

/// Result of a successful [`reset`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResetOutcome {
    /// Stream the consumer reads.
    pub stream: String,

    /// Name the consumer was recreated under.
    pub consumer: String,

    /// The new effective deliver policy.
    pub deliver_policy: String,
}

/// Creates a consumer on a stream.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for a malformed spec and
/// [`Error::StreamNotFound`] when the stream does not exist.
pub async fn create(
    broker: &Broker,
    stream_name: &str,
    spec: ConsumerSpec,
) -> Result<ConsumerDetails> {
    spec.validate()?;
    let name = spec.name.clone();

    let consumer = broker
        .jetstream()
        .create_consumer_on_stream(spec.into_config(), stream_name)
        .await
        .map_err(|e| error::consumer_error(stream_name, &name, e))?;

    info!(stream = %stream_name, consumer = %name, "created consumer");

    Ok(ConsumerDetails::from_info(stream_name, consumer.cached_info()))
}

/// Lists the consumers defined on a stream.
///
/// Consumers that are not pull-based (or vanish mid-listing) are skipped.
///
/// # Errors
///
/// Returns [`Error::StreamNotFound`] when the stream does not exist.
pub async fn list(broker: &Broker, stream_name: &str) -> Result<Vec<ConsumerDetails>> {
    let stream = broker
        .jetstream()
        .get_stream(stream_name)
        .await
        .map_err(|e| error::stream_error(stream_name, e))?;

    let mut names = stream.consumer_names();
    let mut consumers = Vec::new();

    while let Some(name) = names.try_next().await.map_err(Error::internal)? {
        match fetch::lookup_durable(broker, stream_name, &name).await {
            Ok(consumer) => {
                consumers.push(ConsumerDetails::from_info(stream_name, consumer.cached_info()));
            }
            Err(err) => {
                debug!(stream = %stream_name, consumer = %name, error = %err, "skipping consumer");
            }
        }
    }

    Ok(consumers)
}

/// Fetches one consumer's configuration and delivery state.
///
/// # Errors
///
/// Returns [`Error::ConsumerNotFound`] when the consumer does not exist.
pub async fn details(
    broker: &Broker,
    stream_name: &str,
    consumer_name: &str,
) -> Result<ConsumerDetails> {
    let consumer = fetch::lookup_durable(broker, stream_name, consumer_name).await?;

    Ok(ConsumerDetails::from_info(stream_name, consumer.cached_info()))
}

/// Deletes a consumer.
///
/// # Errors
///
/// Returns [`Error::ConsumerNotFound`] when the consumer does not exist.
pub async fn delete(broker: &Broker, stream_name: &str, consumer_name: &str) -> Result<()> {
    broker
        .jetstream()
        .delete_consumer_from_stream(consumer_name, stream_name)
        .await
        .map_err(|e| error::consumer_error(stream_name, consumer_name, e))?;

    info!(stream = %stream_name, consumer = %consumer_name, "deleted consumer");

    Ok(())
}

/// Reads the messages a durable consumer would receive next, without moving
/// its cursor.
///
/// Served through a transient consumer positioned just past the durable's
/// last delivered message, torn down like any other transient consumer.
///
/// # Errors
///
/// Returns [`Error::ConsumerNotFound`] when the durable does not exist,
/// [`Error::InvalidArgument`] on out-of-range bounds.
pub async fn peek(
    broker: &Broker,
    stream_name: &str,
    consumer_name: &str,
    limit: usize,
    timeout_secs: u64,
) -> Result<FetchBatch> {
    let (limit, timeout) = fetch::validate_bounds(limit, timeout_secs)?;

    let durable = fetch::lookup_durable(broker, stream_name, consumer_name).await?;
    let durable_info = durable.cached_info();
    let next_sequence = durable_info.delivered.stream_sequence + 1;
    let filter_subject = durable_info.config.filter_subject.clone();

    let messages = fetch::pull_transient(
        broker,
        stream_name,
        filter_subject,
        DeliverPolicy::ByStartSequence {
            start_sequence: next_sequence,
        },
        limit,
        timeout,
        Some(consumer_name),
    )
    .await?;

    Ok(FetchBatch {
        subject: None,
        stream: stream_name.to_string(),
        consumer: Some(consumer_name.to_string()),
        count: messages.len(),
        messages,
    })
}

/// Computes a consumer's health snapshot from fresh broker-side counters.
///
/// # Errors
///
/// Returns [`Error::ConsumerNotFound`] when the consumer does not exist.
pub async fn health(
    broker: &Broker,
    stream_name: &str,
    consumer_name: &str,
) -> Result<ConsumerHealth> {
    let mut consumer = fetch::lookup_durable(broker, stream_name, consumer_name).await?;

    let info = consumer
        .info()
        .await
        .map_err(|e| Error::BrokerUnavailable(e.to_string()))?;

    Ok(ConsumerHealth {
        stream: stream_name.to_string(),
        consumer: consumer_name.to_string(),
        pending: info.num_pending,
        ack_pending: info.num_ack_pending,
        redelivered: info.num_redelivered,
        delivered_stream_sequence: info.delivered.stream_sequence,
        ack_floor_stream_sequence: info.ack_floor.stream_sequence,
        caught_up: info.num_pending == 0,
    })
}

/// Repositions a consumer by deleting and recreating it under the same name.
///
/// This transition is not atomic and discards the consumer's delivery
/// counters and pending state. If recreation fails after the delete, the
/// consumer is gone; surfaced as [`Error::PartialFailure`], never retried.
///
/// # Errors
///
/// Returns [`Error::ConsumerNotFound`] when the consumer does not exist and
/// [`Error::PartialFailure`] when it was deleted but not recreated.
pub async fn reset(
    broker: &Broker,
    stream_name: &str,
    consumer_name: &str,
    action: &ResetAction,
) -> Result<ResetOutcome> {
    let consumer = fetch::lookup_durable(broker, stream_name, consumer_name).await?;

    let mut config = consumer.cached_info().config.clone();
    config.deliver_policy = action.deliver_policy();

    broker
        .jetstream()
        .delete_consumer_from_stream(consumer_name, stream_name)
        .await
        .map_err(|e| error::consumer_error(stream_name, consumer_name, e))?;

    // The consumer is absent from here until recreation succeeds.
    match broker
        .jetstream()
        .create_consumer_on_stream(config, stream_name)
        .await
    {
        Ok(recreated) => {
            info!(stream = %stream_name, consumer = %consumer_name, "reset consumer");

            Ok(ResetOutcome {
                stream: stream_name.to_string(),
                consumer: consumer_name.to_string(),
                deliver_policy: deliver_policy_label(&recreated.cached_info().config.deliver_policy),
            })
        }
        Err(err) => Err(Error::PartialFailure {
            consumer: consumer_name.to_string(),
            detail: err.to_string(),
        }),
    }
}

/// Reference consumer configurations for common setups.
#[must_use]
pub fn templates() -> Vec<ConsumerSpec> {
    vec![
        ConsumerSpec {
            name: "events-worker".to_string(),
            durable: true,
            filter_subject: Some("events.>".to_string()),
            deliver_policy: StartPolicy::All,
            ack_policy: AckMode::Explicit,
            max_deliver: Some(3),
            ack_wait_secs: Some(30),
            inactive_threshold_secs: None,
        },
        ConsumerSpec {
            name: "events-replay".to_string(),
            durable: true,
            filter_subject: Some("events.>".to_string()),
            deliver_policy: StartPolicy::All,
            ack_policy: AckMode::None,
            max_deliver: None,
            ack_wait_secs: None,
            inactive_threshold_secs: None,
        },
        ConsumerSpec {
            name: "events-tail".to_string(),
            durable: false,
            filter_subject: Some("events.>".to_string()),
            deliver_policy: StartPolicy::New,
            ack_policy: AckMode::None,
            max_deliver: None,
            ack_wait_secs: None,
            inactive_threshold_secs: Some(300),
        },
    ]
}

fn deliver_policy_label(policy: &DeliverPolicy) -> String {
    match policy {
        DeliverPolicy::All => "all".to_string(),
        DeliverPolicy::Last => "last".to_string(),
        DeliverPolicy::New => "new".to_string(),
        DeliverPolicy::LastPerSubject => "last_per_subject".to_string(),
        DeliverPolicy::ByStartSequence { start_sequence } => {
            format!("by_start_sequence({start_sequence})")
        }
        DeliverPolicy::ByStartTime { start_time } => format!("by_start_time({start_time})"),
    }
}

fn ack_policy_label(policy: AckPolicy) -> String {
    match policy {
        AckPolicy::Explicit => "explicit".to_string(),
        AckPolicy::None => "none".to_string(),
        AckPolicy::All => "all".to_string(),
    }
}

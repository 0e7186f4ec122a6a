//! One-shot fetch operations over fabricated or pre-existing consumers.

use std::time::Duration;

use async_nats::jetstream::consumer::pull::Config as PullConfig;
use async_nats::jetstream::consumer::{AckPolicy, DeliverPolicy, PullConsumer};
use futures::StreamExt;
use jetgate_wire::{FetchBatch, MessageEnvelope};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::broker::Broker;
use crate::error::{self, Error, Result};
use crate::{codec, subject};

/// Smallest accepted batch size.
pub const MIN_LIMIT: usize = 1;
/// Largest accepted batch size.
pub const MAX_LIMIT: usize = 100;
/// Batch size used when the caller does not give one.
pub const DEFAULT_LIMIT: usize = 10;

/// Shortest accepted pull timeout, in seconds.
pub const MIN_TIMEOUT_SECS: u64 = 1;
/// Longest accepted pull timeout, in seconds.
pub const MAX_TIMEOUT_SECS: u64 = 30;
/// Pull timeout used when the caller does not give one, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Reaper threshold for transient consumers, should explicit deletion fail.
const TRANSIENT_IDLE_TTL: Duration = Duration::from_secs(5);

/// Checks fetch bounds before any broker round-trip.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] when either bound is out of range.
pub(crate) fn validate_bounds(limit: usize, timeout_secs: u64) -> Result<(usize, Duration)> {
    if !(MIN_LIMIT..=MAX_LIMIT).contains(&limit) {
        return Err(Error::InvalidArgument(format!(
            "limit must be between {MIN_LIMIT} and {MAX_LIMIT}, got {limit}"
        )));
    }

    if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&timeout_secs) {
        return Err(Error::InvalidArgument(format!(
            "timeout must be between {MIN_TIMEOUT_SECS} and {MAX_TIMEOUT_SECS} seconds, got {timeout_secs}"
        )));
    }

    Ok((limit, Duration::from_secs(timeout_secs)))
}

/// Where a tail window of `limit` messages starts, given the stream's last
/// sequence.
pub(crate) fn start_sequence(last_sequence: u64, limit: usize) -> u64 {
    last_sequence
        .saturating_sub(limit.saturating_sub(1) as u64)
        .max(1)
}

pub(crate) fn transient_name() -> String {
    format!("gw-{}", Uuid::new_v4().simple())
}

/// Fetches up to `limit` of the most recent messages matching
/// `subject_filter`, waiting at most `timeout_secs` for them.
///
/// A transient consumer is created for the duration of the call and deleted
/// again on every exit path; a short server-side inactivity threshold backs
/// that deletion up. Fewer messages than `limit`, including none at all,
/// is a successful, possibly empty batch, not an error.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] on out-of-range bounds, otherwise only
/// broker-side failures.
pub async fn latest(
    broker: &Broker,
    subject_filter: &str,
    limit: usize,
    timeout_secs: u64,
) -> Result<FetchBatch> {
    let (limit, timeout) = validate_bounds(limit, timeout_secs)?;
    let stream_name = subject::stream_name(subject_filter)?;

    let Some(last_sequence) = broker.last_sequence(&stream_name).await? else {
        return Ok(FetchBatch {
            subject: Some(subject_filter.to_string()),
            stream: stream_name,
            consumer: None,
            count: 0,
            messages: Vec::new(),
        });
    };

    let messages = pull_transient(
        broker,
        &stream_name,
        subject_filter.to_string(),
        DeliverPolicy::ByStartSequence {
            start_sequence: start_sequence(last_sequence, limit),
        },
        limit,
        timeout,
        None,
    )
    .await?;

    Ok(FetchBatch {
        subject: Some(subject_filter.to_string()),
        stream: stream_name,
        consumer: None,
        count: messages.len(),
        messages,
    })
}

/// Fetches up to `limit` messages from an existing durable consumer,
/// continuing from wherever it left off.
///
/// The consumer is looked up, never created, and never deleted afterwards.
/// Its position advances on its own only under `AckPolicy::None`; with any
/// other ack policy, acknowledging delivered messages stays the caller's
/// responsibility (through a direct broker client) and unacked messages
/// will be redelivered.
///
/// # Errors
///
/// Returns [`Error::ConsumerNotFound`] when the consumer does not exist,
/// [`Error::InvalidArgument`] on out-of-range bounds.
pub async fn durable(
    broker: &Broker,
    stream_name: &str,
    consumer_name: &str,
    limit: usize,
    timeout_secs: u64,
) -> Result<FetchBatch> {
    let (limit, timeout) = validate_bounds(limit, timeout_secs)?;

    let consumer = lookup_durable(broker, stream_name, consumer_name).await?;

    if consumer.cached_info().config.ack_policy != AckPolicy::None {
        warn!(
            stream = %stream_name,
            consumer = %consumer_name,
            "fetching from an ack-required consumer; unacked messages will be redelivered"
        );
    }

    let messages = pull_batch(&consumer, limit, timeout, Some(consumer_name)).await?;

    Ok(FetchBatch {
        subject: None,
        stream: stream_name.to_string(),
        consumer: Some(consumer_name.to_string()),
        count: messages.len(),
        messages,
    })
}

/// Looks up an existing durable pull consumer; never creates one.
pub(crate) async fn lookup_durable(
    broker: &Broker,
    stream_name: &str,
    consumer_name: &str,
) -> Result<PullConsumer> {
    broker
        .jetstream()
        .get_consumer_from_stream(consumer_name, stream_name)
        .await
        .map_err(|e| error::consumer_error(stream_name, consumer_name, e))
}

/// Creates a transient consumer, pulls one batch through it, and deletes it
/// again, also when the pull failed. A deletion failure is logged and never
/// masks the pull result.
pub(crate) async fn pull_transient(
    broker: &Broker,
    stream_name: &str,
    filter_subject: String,
    deliver_policy: DeliverPolicy,
    limit: usize,
    timeout: Duration,
    source: Option<&str>,
) -> Result<Vec<MessageEnvelope>> {
    let name = transient_name();

    let consumer = broker
        .jetstream()
        .create_consumer_on_stream(
            PullConfig {
                name: Some(name.clone()),
                deliver_policy,
                ack_policy: AckPolicy::None,
                filter_subject,
                inactive_threshold: TRANSIENT_IDLE_TTL,
                ..Default::default()
            },
            stream_name,
        )
        .await
        .map_err(|e| error::consumer_error(stream_name, &name, e))?;

    debug!(stream = %stream_name, consumer = %name, "created transient consumer");

    let pulled = pull_batch(&consumer, limit, timeout, source).await;

    if let Err(err) = broker
        .jetstream()
        .delete_consumer_from_stream(&name, stream_name)
        .await
    {
        warn!(
            stream = %stream_name,
            consumer = %name,
            error = %err,
            "failed to delete transient consumer; inactivity threshold will reap it"
        );
    }

    pulled
}

/// Pulls one bounded batch, ending at `limit` messages or `timeout`,
/// whichever comes first.
async fn pull_batch(
    consumer: &PullConsumer,
    limit: usize,
    timeout: Duration,
    source: Option<&str>,
) -> Result<Vec<MessageEnvelope>> {
    let mut batch = consumer
        .batch()
        .max_messages(limit)
        .expires(timeout)
        .messages()
        .await
        .map_err(|e| Error::BrokerUnavailable(e.to_string()))?;

    let mut messages = Vec::with_capacity(limit);
    while let Some(message) = batch.next().await {
        let message = message.map_err(Error::internal)?;
        messages.push(codec::envelope(&message, source)?);
    }

    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_inclusive() {
        assert!(validate_bounds(1, 1).is_ok());
        assert!(validate_bounds(100, 30).is_ok());
    }

    #[test]
    fn out_of_range_limit_is_rejected() {
        assert!(matches!(
            validate_bounds(0, 5),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            validate_bounds(101, 5),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn out_of_range_timeout_is_rejected() {
        assert!(matches!(
            validate_bounds(10, 0),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            validate_bounds(10, 31),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn tail_window_starts_limit_back() {
        // 12 messages, window of 5: sequences 8 through 12.
        assert_eq!(start_sequence(12, 5), 8);
    }

    #[test]
    fn tail_window_never_starts_before_one() {
        assert_eq!(start_sequence(0, 10), 1);
        assert_eq!(start_sequence(3, 50), 1);
        assert_eq!(start_sequence(1, 1), 1);
    }

    #[test]
    fn transient_names_are_unique() {
        assert_ne!(transient_name(), transient_name());
    }
}

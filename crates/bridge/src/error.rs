use async_nats::jetstream::context::{GetStreamError, GetStreamErrorKind, PublishError, PublishErrorKind};
use async_nats::jetstream::ErrorCode;
use async_nats::jetstream::stream::{ConsumerError, ConsumerErrorKind};
use thiserror::Error as ThisError;

/// The result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The closed set of failures a bridge operation can surface.
///
/// Call sites dispatch on the variant, never on message text.
#[derive(Debug, ThisError)]
pub enum Error {
    /// A request parameter was outside its allowed range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The named stream does not exist on the broker.
    #[error("stream `{0}` not found; create it or publish a message to one of its subjects first")]
    StreamNotFound(String),

    /// The named consumer does not exist on the named stream.
    #[error(
        "consumer `{consumer}` not found on stream `{stream}`; create it through the consumer API before using it"
    )]
    ConsumerNotFound {
        /// Stream the consumer was looked up on.
        stream: String,
        /// Name of the missing consumer.
        consumer: String,
    },

    /// A reset deleted the consumer but failed to recreate it.
    #[error(
        "consumer `{consumer}` was deleted but could not be recreated: {detail}; the consumer no longer exists"
    )]
    PartialFailure {
        /// Name of the consumer that was lost.
        consumer: String,
        /// Why recreation failed.
        detail: String,
    },

    /// The broker could not be reached or timed out.
    #[error("broker unavailable: {0}")]
    BrokerUnavailable(String),

    /// Any other unexpected failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub(crate) fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Folds a consumer-operation failure into the taxonomy, using the JetStream
/// API error codes to tell a missing entity from a transport fault.
pub(crate) fn consumer_error(stream: &str, consumer: &str, err: ConsumerError) -> Error {
    match err.kind() {
        ConsumerErrorKind::JetStream(js) => match js.error_code() {
            ErrorCode::CONSUMER_NOT_FOUND => Error::ConsumerNotFound {
                stream: stream.to_string(),
                consumer: consumer.to_string(),
            },
            ErrorCode::STREAM_NOT_FOUND => Error::StreamNotFound(stream.to_string()),
            _ => Error::Internal(js.to_string()),
        },
        ConsumerErrorKind::TimedOut => Error::BrokerUnavailable(err.to_string()),
        _ => Error::Internal(err.to_string()),
    }
}

pub(crate) fn stream_error(stream: &str, err: GetStreamError) -> Error {
    match err.kind() {
        GetStreamErrorKind::JetStream(js) if js.error_code() == ErrorCode::STREAM_NOT_FOUND => {
            Error::StreamNotFound(stream.to_string())
        }
        _ => Error::Internal(err.to_string()),
    }
}

pub(crate) fn publish_error(stream: &str, err: PublishError) -> Error {
    match err.kind() {
        PublishErrorKind::StreamNotFound => Error::StreamNotFound(stream.to_string()),
        PublishErrorKind::TimedOut => Error::BrokerUnavailable(err.to_string()),
        _ => Error::Internal(err.to_string()),
    }
}

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::Result;

/// One binary WebSocket protocol unit: either a delivered stream message or
/// a control signal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// A message delivered from a stream.
    Message {
        /// The delivered message.
        message: StreamMessage,
    },
    /// An in-band control signal.
    Control {
        /// The control payload.
        control: ControlMessage,
    },
}

impl Frame {
    /// Wraps a stream message in a frame.
    #[must_use]
    pub const fn message(message: StreamMessage) -> Self {
        Self::Message { message }
    }

    /// Wraps a control message in a frame.
    #[must_use]
    pub const fn control(control: ControlMessage) -> Self {
        Self::Control { control }
    }

    /// Encodes the frame as CBOR bytes for a binary WebSocket message.
    ///
    /// # Errors
    ///
    /// Returns an error if CBOR serialization fails.
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)?;
        Ok(buf.into())
    }

    /// Decodes a frame from CBOR bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid CBOR frame.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(ciborium::from_reader(bytes)?)
    }
}

/// A message delivered over a streaming connection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamMessage {
    /// Subject the message was published to.
    pub subject: String,

    /// Stream sequence number of the message.
    pub sequence: u64,

    /// Broker-recorded publish time.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,

    /// Payload size in bytes.
    pub size_bytes: usize,

    /// Opaque message payload.
    pub data: Bytes,

    /// Name of the consumer that delivered the message, when bound to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer: Option<String>,
}

/// Kinds of control signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlType {
    /// Subscription accepted; stream messages may follow.
    SubscribeAck,

    /// The server hit an error; the connection is about to close.
    Error,

    /// Orderly end of the stream.
    Close,

    /// Periodic liveness signal.
    Keepalive,
}

/// An in-band control signal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlMessage {
    /// The kind of signal.
    #[serde(rename = "type")]
    pub kind: ControlType,

    /// Human-readable detail.
    pub message: String,
}

impl ControlMessage {
    /// Builds a subscription acknowledgement.
    pub fn subscribe_ack(message: impl Into<String>) -> Self {
        Self {
            kind: ControlType::SubscribeAck,
            message: message.into(),
        }
    }

    /// Builds an error signal.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: ControlType::Error,
            message: message.into(),
        }
    }

    /// Builds a close signal.
    pub fn close(message: impl Into<String>) -> Self {
        Self {
            kind: ControlType::Close,
            message: message.into(),
        }
    }

    /// Builds a keepalive signal.
    #[must_use]
    pub fn keepalive() -> Self {
        Self {
            kind: ControlType::Keepalive,
            message: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_frame_round_trip() {
        let frame = Frame::message(StreamMessage {
            subject: "events.demo".to_string(),
            sequence: 42,
            timestamp: OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap(),
            size_bytes: 3,
            data: Bytes::from_static(b"abc"),
            consumer: Some("orders-worker".to_string()),
        });

        let encoded = frame.encode().expect("encode");
        let decoded = Frame::decode(&encoded).expect("decode");

        assert_eq!(decoded, frame);
    }

    #[test]
    fn control_frame_round_trip() {
        let frame = Frame::control(ControlMessage::error("consumer not found"));

        let decoded = Frame::decode(&frame.encode().expect("encode")).expect("decode");

        match decoded {
            Frame::Control { control } => {
                assert_eq!(control.kind, ControlType::Error);
                assert_eq!(control.message, "consumer not found");
            }
            Frame::Message { .. } => panic!("expected a control frame"),
        }
    }

    #[test]
    fn frame_tag_layout() {
        let frame = Frame::control(ControlMessage::subscribe_ack("subscribed to events.>"));
        let json = serde_json::to_value(&frame).expect("to json");

        assert_eq!(json["type"], "control");
        assert_eq!(json["control"]["type"], "subscribe_ack");
        assert_eq!(json["control"]["message"], "subscribed to events.>");
    }

    #[test]
    fn keepalive_has_empty_message() {
        let control = ControlMessage::keepalive();
        assert_eq!(control.kind, ControlType::Keepalive);
        assert!(control.message.is_empty());
    }
}

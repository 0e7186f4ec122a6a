use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A single delivered message as returned by the HTTP fetch endpoints.
///
/// The payload is opaque to the gateway and carried base64-encoded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Subject the message was published to.
    pub subject: String,

    /// Stream sequence number of the message.
    pub sequence: u64,

    /// Broker-recorded publish time.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,

    /// Opaque payload, base64-encoded on the wire.
    #[serde(with = "base64_bytes")]
    pub data: Bytes,

    /// Payload size in bytes.
    pub size_bytes: usize,

    /// Name of the consumer that delivered the message, when bound to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer: Option<String>,
}

/// The response body of a fetch call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FetchBatch {
    /// Subject filter used for the fetch, when one was given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Stream the messages came from.
    pub stream: String,

    /// Consumer used for the fetch, when bound to a durable one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer: Option<String>,

    /// Number of messages in the batch.
    pub count: usize,

    /// The delivered messages, in ascending sequence order.
    pub messages: Vec<MessageEnvelope>,
}

/// Acknowledgement returned after publishing a message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublishReceipt {
    /// Whether the broker accepted the message.
    pub published: bool,

    /// Subject the message was published to.
    pub subject: String,

    /// Stream that captured the message.
    pub stream: String,

    /// Sequence assigned by the stream.
    pub sequence: u64,

    /// Gateway-side publish time.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let decoded = STANDARD.decode(encoded).map_err(D::Error::custom)?;
        Ok(Bytes::from(decoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(consumer: Option<&str>) -> MessageEnvelope {
        MessageEnvelope {
            subject: "events.demo".to_string(),
            sequence: 7,
            timestamp: OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap(),
            data: Bytes::from_static(b"{\"note\":\"hi\"}"),
            size_bytes: 13,
            consumer: consumer.map(str::to_string),
        }
    }

    #[test]
    fn payload_is_base64_in_json() {
        let json = serde_json::to_value(envelope(None)).expect("to json");

        assert_eq!(json["data"], "eyJub3RlIjoiaGkifQ==");
        assert_eq!(json["size_bytes"], 13);
        assert!(json.get("consumer").is_none());
    }

    #[test]
    fn envelope_json_round_trip() {
        let original = envelope(Some("orders-worker"));
        let json = serde_json::to_string(&original).expect("to json");
        let parsed: MessageEnvelope = serde_json::from_str(&json).expect("from json");

        assert_eq!(parsed, original);
    }

    #[test]
    fn batch_omits_unset_source_fields() {
        let batch = FetchBatch {
            subject: Some("events.>".to_string()),
            stream: "EVENTS".to_string(),
            consumer: None,
            count: 0,
            messages: Vec::new(),
        };

        let json = serde_json::to_value(batch).expect("to json");
        assert_eq!(json["subject"], "events.>");
        assert!(json.get("consumer").is_none());
        assert_eq!(json["count"], 0);
    }
}

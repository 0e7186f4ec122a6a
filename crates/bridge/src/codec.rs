use async_nats::jetstream::Message;
use jetgate_wire::{MessageEnvelope, StreamMessage};

use crate::error::{Error, Result};

/// Converts a delivered broker message into the JSON fetch envelope.
pub(crate) fn envelope(message: &Message, consumer: Option<&str>) -> Result<MessageEnvelope> {
    let info = message
        .info()
        .map_err(|e| Error::Internal(format!("message metadata missing: {e}")))?;

    Ok(MessageEnvelope {
        subject: message.subject.to_string(),
        sequence: info.stream_sequence,
        timestamp: info.published,
        data: message.payload.clone(),
        size_bytes: message.payload.len(),
        consumer: consumer.map(str::to_string),
    })
}

/// Converts a delivered broker message into the binary frame payload.
pub(crate) fn stream_message(message: &Message, consumer: Option<&str>) -> Result<StreamMessage> {
    let info = message
        .info()
        .map_err(|e| Error::Internal(format!("message metadata missing: {e}")))?;

    Ok(StreamMessage {
        subject: message.subject.to_string(),
        sequence: info.stream_sequence,
        timestamp: info.published,
        size_bytes: message.payload.len(),
        data: message.payload.clone(),
        consumer: consumer.map(str::to_string),
    })
}

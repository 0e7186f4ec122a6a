//! Wire types shared by the gateway's HTTP responses and WebSocket frames.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod envelope;
mod error;
mod frame;

pub use envelope::{FetchBatch, MessageEnvelope, PublishReceipt};
pub use error::{Error, Result};
pub use frame::{ControlMessage, ControlType, Frame, StreamMessage};

//! Bridging layer between stateless HTTP/WebSocket clients and the
//! JetStream broker's stateful pull-consumer protocol.
//!
//! The broker only speaks a connection-oriented consumer lifecycle: create a
//! consumer, pull from it, acknowledge, delete. This crate hides that behind
//! one-shot operations: fabricating a transient consumer per "last N
//! messages" request and tearing it down again, binding to durable consumers
//! without ever creating them implicitly, and exposing the destructive
//! delete-and-recreate reset transition explicitly.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod broker;
mod codec;
mod error;

pub mod consumer;
pub mod feed;
pub mod fetch;
pub mod subject;

pub use broker::{Broker, HealthSnapshot, StreamSnapshot};
pub use error::{Error, Result};

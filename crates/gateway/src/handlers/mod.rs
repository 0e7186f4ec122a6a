//! Request handlers, grouped by resource.

mod consumers;
mod health;
mod messages;
mod streams;
mod ws;

pub(crate) use consumers::{
    consumer_details, consumer_health, consumer_templates, create_consumer, delete_consumer,
    list_consumers, peek_messages, reset_consumer,
};
pub(crate) use health::health;
pub(crate) use messages::{fetch_durable, fetch_latest, publish_message};
pub(crate) use streams::stream_info;
pub(crate) use ws::{stream_durable, stream_subject};

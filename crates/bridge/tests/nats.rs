//! Integration tests against a live NATS server at `localhost:4222`.
//!
//! Start one with `nats-server -js`, then run `cargo test -- --ignored`.

use std::time::{Duration, Instant};

use async_nats::ConnectOptions;
use bytes::Bytes;
use futures::TryStreamExt;
use jetgate_bridge::consumer::{self, AckMode, ConsumerSpec, ResetAction, StartPolicy};
use jetgate_bridge::{Broker, Error, fetch};
use serial_test::serial;

async fn connect() -> Broker {
    let client = ConnectOptions::default()
        .connection_timeout(Duration::from_secs(5))
        .connect("localhost:4222")
        .await
        .expect("Failed to connect to NATS");

    Broker::from_client(client)
}

async fn cleanup_stream(stream_name: &str) {
    let client = ConnectOptions::default()
        .connect("localhost:4222")
        .await
        .expect("Failed to connect to NATS");
    let js = async_nats::jetstream::new(client);

    // Ignore errors since the stream might not exist
    let _ = js.delete_stream(stream_name).await;
}

async fn consumer_names(stream_name: &str) -> Vec<String> {
    let client = ConnectOptions::default()
        .connect("localhost:4222")
        .await
        .expect("Failed to connect to NATS");
    let js = async_nats::jetstream::new(client);

    let stream = js.get_stream(stream_name).await.expect("Stream not found");
    stream
        .consumer_names()
        .try_collect()
        .await
        .expect("Failed to list consumers")
}

async fn seed(broker: &Broker, subject: &str, count: usize) {
    for i in 1..=count {
        broker
            .publish(subject, Bytes::from(format!("message-{i}")))
            .await
            .expect("Failed to publish");
    }
}

fn worker_spec(name: &str, filter: &str) -> ConsumerSpec {
    ConsumerSpec {
        name: name.to_string(),
        durable: true,
        filter_subject: Some(filter.to_string()),
        deliver_policy: StartPolicy::All,
        ack_policy: AckMode::None,
        max_deliver: None,
        ack_wait_secs: None,
        inactive_threshold_secs: None,
    }
}

#[tokio::test]
#[serial]
#[ignore = "Requires a running NATS server"]
async fn ephemeral_fetch_returns_the_tail_in_order() {
    cleanup_stream("GWTAIL").await;
    let broker = connect().await;
    seed(&broker, "gwtail.demo", 12).await;

    let batch = fetch::latest(&broker, "gwtail.demo", 5, 5)
        .await
        .expect("Failed to fetch");

    assert_eq!(batch.stream, "GWTAIL");
    assert_eq!(batch.count, 5);

    let sequences: Vec<u64> = batch.messages.iter().map(|m| m.sequence).collect();
    assert_eq!(sequences, vec![8, 9, 10, 11, 12]);
}

#[tokio::test]
#[serial]
#[ignore = "Requires a running NATS server"]
async fn ephemeral_fetch_is_idempotent_while_the_stream_is_unchanged() {
    cleanup_stream("GWIDEM").await;
    let broker = connect().await;
    seed(&broker, "gwidem.demo", 6).await;

    let first = fetch::latest(&broker, "gwidem.demo", 4, 5)
        .await
        .expect("Failed to fetch");
    let second = fetch::latest(&broker, "gwidem.demo", 4, 5)
        .await
        .expect("Failed to fetch");

    let seqs = |batch: &jetgate_wire::FetchBatch| -> Vec<u64> {
        batch.messages.iter().map(|m| m.sequence).collect()
    };
    assert_eq!(seqs(&first), seqs(&second));
}

#[tokio::test]
#[serial]
#[ignore = "Requires a running NATS server"]
async fn ephemeral_fetch_leaves_no_consumer_behind() {
    cleanup_stream("GWCLEAN").await;
    let broker = connect().await;
    seed(&broker, "gwclean.demo", 3).await;

    fetch::latest(&broker, "gwclean.demo", 3, 2)
        .await
        .expect("Failed to fetch");

    assert!(
        consumer_names("GWCLEAN").await.is_empty(),
        "ephemeral consumer survived the fetch"
    );
}

#[tokio::test]
#[serial]
#[ignore = "Requires a running NATS server"]
async fn ephemeral_fetch_with_missing_stream_is_an_empty_batch() {
    cleanup_stream("GWGONE").await;
    let broker = connect().await;

    let batch = fetch::latest(&broker, "gwgone.anything", 10, 2)
        .await
        .expect("A missing stream should not be an error");

    assert_eq!(batch.count, 0);
    assert!(batch.messages.is_empty());
}

#[tokio::test]
#[serial]
#[ignore = "Requires a running NATS server"]
async fn ephemeral_fetch_returns_partial_results_after_the_timeout() {
    cleanup_stream("GWPART").await;
    let broker = connect().await;
    seed(&broker, "gwpart.demo", 3).await;

    let started = Instant::now();
    let batch = fetch::latest(&broker, "gwpart.demo", 50, 2)
        .await
        .expect("Failed to fetch");
    let elapsed = started.elapsed();

    assert_eq!(batch.count, 3);
    assert!(
        elapsed >= Duration::from_secs(2),
        "returned before the timeout elapsed: {elapsed:?}"
    );
    assert!(elapsed < Duration::from_secs(10), "took too long: {elapsed:?}");
}

#[tokio::test]
#[serial]
#[ignore = "Requires a running NATS server"]
async fn durable_fetch_without_the_consumer_is_not_found() {
    cleanup_stream("GWMISS").await;
    let broker = connect().await;
    seed(&broker, "gwmiss.demo", 1).await;

    let result = fetch::durable(&broker, "GWMISS", "no-such-consumer", 5, 2).await;

    assert!(matches!(result, Err(Error::ConsumerNotFound { .. })));
    assert!(
        consumer_names("GWMISS").await.is_empty(),
        "durable fetch must never create a consumer"
    );
}

#[tokio::test]
#[serial]
#[ignore = "Requires a running NATS server"]
async fn durable_fetch_continues_from_the_previous_position() {
    cleanup_stream("GWDUR").await;
    let broker = connect().await;
    seed(&broker, "gwdur.demo", 6).await;

    consumer::create(&broker, "GWDUR", worker_spec("position-worker", "gwdur.>"))
        .await
        .expect("Failed to create consumer");

    let first = fetch::durable(&broker, "GWDUR", "position-worker", 3, 2)
        .await
        .expect("Failed to fetch");
    let second = fetch::durable(&broker, "GWDUR", "position-worker", 3, 2)
        .await
        .expect("Failed to fetch");

    let first_seqs: Vec<u64> = first.messages.iter().map(|m| m.sequence).collect();
    let second_seqs: Vec<u64> = second.messages.iter().map(|m| m.sequence).collect();
    assert_eq!(first_seqs, vec![1, 2, 3]);
    assert_eq!(second_seqs, vec![4, 5, 6]);
}

#[tokio::test]
#[serial]
#[ignore = "Requires a running NATS server"]
async fn reset_replays_from_the_requested_sequence() {
    cleanup_stream("GWRESET").await;
    let broker = connect().await;
    seed(&broker, "gwreset.demo", 5).await;

    consumer::create(&broker, "GWRESET", worker_spec("replay-worker", "gwreset.>"))
        .await
        .expect("Failed to create consumer");

    // Drain the consumer so its position is at the end.
    fetch::durable(&broker, "GWRESET", "replay-worker", 5, 2)
        .await
        .expect("Failed to fetch");

    let outcome = consumer::reset(
        &broker,
        "GWRESET",
        "replay-worker",
        &ResetAction::ReplayFromSequence { sequence: 3 },
    )
    .await
    .expect("Failed to reset");
    assert_eq!(outcome.consumer, "replay-worker");

    let replayed = fetch::durable(&broker, "GWRESET", "replay-worker", 5, 2)
        .await
        .expect("Failed to fetch");

    assert_eq!(replayed.messages.first().map(|m| m.sequence), Some(3));
}

#[tokio::test]
#[serial]
#[ignore = "Requires a running NATS server"]
async fn peek_does_not_advance_the_durable() {
    cleanup_stream("GWPEEK").await;
    let broker = connect().await;
    seed(&broker, "gwpeek.demo", 3).await;

    consumer::create(&broker, "GWPEEK", worker_spec("peek-worker", "gwpeek.>"))
        .await
        .expect("Failed to create consumer");

    let peeked = consumer::peek(&broker, "GWPEEK", "peek-worker", 2, 2)
        .await
        .expect("Failed to peek");
    let peeked_seqs: Vec<u64> = peeked.messages.iter().map(|m| m.sequence).collect();
    assert_eq!(peeked_seqs, vec![1, 2]);

    // The durable still starts from the beginning.
    let fetched = fetch::durable(&broker, "GWPEEK", "peek-worker", 3, 2)
        .await
        .expect("Failed to fetch");
    assert_eq!(fetched.messages.first().map(|m| m.sequence), Some(1));
}

#[tokio::test]
#[serial]
#[ignore = "Requires a running NATS server"]
async fn publish_reports_the_captured_stream_and_sequence() {
    cleanup_stream("GWPUB").await;
    let broker = connect().await;

    let receipt = broker
        .publish("gwpub.demo", Bytes::from_static(b"payload"))
        .await
        .expect("Failed to publish");

    assert!(receipt.published);
    assert_eq!(receipt.stream, "GWPUB");
    assert_eq!(receipt.sequence, 1);
}

#[tokio::test]
#[serial]
#[ignore = "Requires a running NATS server"]
async fn stream_info_reflects_published_messages() {
    cleanup_stream("GWINFO").await;
    let broker = connect().await;
    seed(&broker, "gwinfo.demo", 2).await;

    let snapshot = broker
        .stream_info("GWINFO")
        .await
        .expect("Failed to get stream info");

    assert_eq!(snapshot.name, "GWINFO");
    assert_eq!(snapshot.messages, 2);
    assert_eq!(snapshot.last_sequence, 2);
    assert!(snapshot.subjects.contains(&"gwinfo.>".to_string()));
}

#[tokio::test]
#[serial]
#[ignore = "Requires a running NATS server"]
async fn health_reports_a_reachable_broker() {
    let broker = connect().await;

    let health = broker.health().await;

    assert!(health.nats_connected);
    assert!(health.jetstream_available);
    assert_eq!(health.status, "healthy");
}

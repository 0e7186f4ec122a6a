//! The WebSocket streaming bridge: turns a broker feed into framed binary
//! messages on one socket.
//!
//! Per connection: one subscription acknowledgement, then a strictly
//! sequential send loop selected against the connection's cancellation
//! token. Errors are delivered in-band as control frames before the socket
//! is closed; a connection is never left hanging.

use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use jetgate_bridge::feed::{self, LiveFeed};
use jetgate_bridge::{Broker, Error as BridgeError};
use jetgate_wire::{ControlMessage, Frame};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::state::AppState;

const KEEPALIVE_PERIOD: Duration = Duration::from_secs(30);

/// Handler for `GET /stream/{subject}`: ephemeral subject streaming.
pub(crate) async fn stream_subject(
    Path(subject): Path<String>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let broker: Broker = state.broker.clone();
    let token = state.shutdown.child_token();

    ws.on_upgrade(move |socket| async move {
        let feed = feed::open_subject(&broker, &subject).await;
        let ack_text = format!("subscribed to {subject}");
        drive_socket(socket, feed, ack_text, token).await;
    })
}

/// Handler for `GET /stream/{stream}/consumer/{consumer}`: durable
/// consumer streaming.
pub(crate) async fn stream_durable(
    Path((stream, consumer)): Path<(String, String)>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let broker: Broker = state.broker.clone();
    let token = state.shutdown.child_token();

    ws.on_upgrade(move |socket| async move {
        let feed = feed::open_durable(&broker, &stream, &consumer).await;
        let ack_text = format!("bound to consumer {consumer} on {stream}");
        drive_socket(socket, feed, ack_text, token).await;
    })
}

/// The per-connection state machine: ack, stream, close.
async fn drive_socket(
    socket: WebSocket,
    feed: Result<LiveFeed, BridgeError>,
    ack_text: String,
    token: CancellationToken,
) {
    let (mut sender, mut receiver) = socket.split();

    if send_control(&mut sender, ControlMessage::subscribe_ack(ack_text))
        .await
        .is_err()
    {
        return;
    }

    let mut feed = match feed {
        Ok(feed) => feed,
        Err(err) => {
            info!(error = %err, "subscription rejected");
            let _ = send_control(&mut sender, ControlMessage::error(client_error_text(&err))).await;
            close_socket(sender, "stream closed").await;
            return;
        }
    };

    // A client close (or transport error) cancels the connection token,
    // which interrupts any in-progress wait on the feed.
    let client_token = token.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
        client_token.cancel();
    });

    let mut keepalive = tokio::time::interval(KEEPALIVE_PERIOD);
    keepalive.tick().await; // the first tick completes immediately

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            item = feed.next_item() => match item {
                Some(Ok(item)) => {
                    let bytes = match Frame::message(item.message().clone()).encode() {
                        Ok(bytes) => bytes,
                        Err(err) => {
                            error!(error = %err, "failed to encode message frame");
                            let _ = send_control(&mut sender, ControlMessage::error("internal error")).await;
                            break;
                        }
                    };

                    // A write failure means the socket is unusable; no retry.
                    if sender.send(Message::Binary(bytes)).await.is_err() {
                        break;
                    }

                    item.acknowledge().await;
                }
                Some(Err(err)) => {
                    error!(error = %err, "feed error");
                    let _ = send_control(&mut sender, ControlMessage::error(client_error_text(&err))).await;
                    break;
                }
                None => {
                    warn!("feed ended unexpectedly");
                    let _ = send_control(&mut sender, ControlMessage::error("stream source ended")).await;
                    break;
                }
            },
            _ = keepalive.tick() => {
                if send_control(&mut sender, ControlMessage::keepalive()).await.is_err() {
                    break;
                }
            }
        }
    }

    close_socket(sender, "stream closed").await;
    recv_task.abort();
    feed.close().await;
    info!("streaming session ended");
}

async fn send_control(
    sender: &mut SplitSink<WebSocket, Message>,
    control: ControlMessage,
) -> Result<(), axum::Error> {
    let bytes = Frame::control(control).encode().map_err(axum::Error::new)?;

    sender.send(Message::Binary(bytes)).await
}

async fn close_socket(mut sender: SplitSink<WebSocket, Message>, reason: &'static str) {
    let _ = send_control(&mut sender, ControlMessage::close(reason)).await;
    let _ = sender
        .send(Message::Close(Some(CloseFrame {
            code: close_code::NORMAL,
            reason: reason.into(),
        })))
        .await;
}

/// What an error looks like to the client: missing entities and bad
/// arguments are named, everything else stays generic.
fn client_error_text(error: &BridgeError) -> String {
    match error {
        BridgeError::InvalidArgument(_)
        | BridgeError::StreamNotFound(_)
        | BridgeError::ConsumerNotFound { .. } => error.to_string(),
        BridgeError::BrokerUnavailable(_) => "broker unavailable".to_string(),
        BridgeError::PartialFailure { .. } | BridgeError::Internal(_) => {
            "internal error".to_string()
        }
    }
}

//! HTTP/WebSocket server fronting the JetStream bridge.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

mod error;
mod handlers;
mod problem;
mod state;

pub use error::Error;

use std::future::IntoFuture;
use std::net::SocketAddr;

use axum::Router;
use axum::routing::{get, post};
use jetgate_bridge::Broker;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::state::AppState;

/// Options for constructing a [`Gateway`].
pub struct GatewayOptions {
    /// Connected broker capability shared by all requests.
    pub broker: Broker,

    /// Address the HTTP/WebSocket server listens on.
    pub listen_addr: SocketAddr,
}

/// The gateway server.
pub struct Gateway {
    broker: Broker,
    listen_addr: SocketAddr,
    shutdown_token: CancellationToken,
    task_tracker: TaskTracker,
}

impl Gateway {
    /// Creates a new `Gateway`.
    #[must_use]
    pub fn new(GatewayOptions { broker, listen_addr }: GatewayOptions) -> Self {
        Self {
            broker,
            listen_addr,
            shutdown_token: CancellationToken::new(),
            task_tracker: TaskTracker::new(),
        }
    }

    /// Binds the listen address and starts serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the server was already started or the address
    /// cannot be bound.
    pub async fn start(&self) -> Result<JoinHandle<()>, Error> {
        if self.task_tracker.is_closed() {
            return Err(Error::AlreadyStarted);
        }

        let router = self.router();
        let listener = TcpListener::bind(self.listen_addr)
            .await
            .map_err(Error::Bind)?;

        info!(addr = %self.listen_addr, "gateway listening");

        let shutdown_token = self.shutdown_token.clone();
        let handle = self.task_tracker.spawn(async move {
            tokio::select! {
                e = axum::serve(listener, router.into_make_service()).into_future() => {
                    info!("http server exited {e:?}");
                }
                () = shutdown_token.cancelled() => {}
            }
        });

        self.task_tracker.close();

        Ok(handle)
    }

    /// Cancels in-flight streams and waits for the server task to finish.
    pub async fn shutdown(&self) {
        info!("gateway shutting down...");

        self.shutdown_token.cancel();
        self.task_tracker.wait().await;

        info!("gateway shutdown");
    }

    /// Builds the gateway's router. Exposed so tests can serve it directly.
    #[must_use]
    pub fn router(&self) -> Router {
        let state = AppState {
            broker: self.broker.clone(),
            shutdown: self.shutdown_token.clone(),
        };

        Router::new()
            .route("/health", get(handlers::health))
            .route(
                "/messages/{subject}",
                post(handlers::publish_message).get(handlers::fetch_latest),
            )
            .route(
                "/messages/{stream}/consumer/{consumer}",
                get(handlers::fetch_durable),
            )
            .route("/streams/{stream}", get(handlers::stream_info))
            .route("/consumers/templates", get(handlers::consumer_templates))
            .route(
                "/consumers/{stream}",
                post(handlers::create_consumer).get(handlers::list_consumers),
            )
            .route(
                "/consumers/{stream}/{consumer}",
                get(handlers::consumer_details).delete(handlers::delete_consumer),
            )
            .route(
                "/consumers/{stream}/{consumer}/messages",
                get(handlers::peek_messages),
            )
            .route(
                "/consumers/{stream}/{consumer}/health",
                get(handlers::consumer_health),
            )
            .route(
                "/consumers/{stream}/{consumer}/reset",
                post(handlers::reset_consumer),
            )
            .route("/stream/{subject}", get(handlers::stream_subject))
            .route(
                "/stream/{stream}/consumer/{consumer}",
                get(handlers::stream_durable),
            )
            .layer(CorsLayer::permissive())
            .with_state(state)
    }
}

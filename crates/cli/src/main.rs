//! CLI binary serving the JetStream gateway.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::net::SocketAddr;

use clap::Parser;
use jetgate_bridge::Broker;
use jetgate_gateway::{Gateway, GatewayOptions};
use tracing::info;
use url::Url;

/// CLI-specific error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Broker connection error
    #[error(transparent)]
    Bridge(#[from] jetgate_bridge::Error),

    /// Gateway server error
    #[error(transparent)]
    Gateway(#[from] jetgate_gateway::Error),
}

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Address the HTTP/WebSocket server listens on
    #[arg(long, default_value = "0.0.0.0:8080", env = "JETGATE_LISTEN_ADDR")]
    listen_addr: SocketAddr,

    /// NATS server URL
    #[arg(
        long,
        default_value = "nats://localhost:4222",
        env = "JETGATE_NATS_URL"
    )]
    nats_url: Url,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    info!(url = %args.nats_url, "connecting to NATS");
    let broker = Broker::connect(args.nats_url.as_str()).await?;

    let gateway = Gateway::new(GatewayOptions {
        broker,
        listen_addr: args.listen_addr,
    });

    let handle = gateway.start().await?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received");
            gateway.shutdown().await;
        }
        _ = handle => {}
    }

    Ok(())
}

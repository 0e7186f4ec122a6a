use jetgate_bridge::Broker;
use tokio_util::sync::CancellationToken;

/// Shared state injected into every handler.
#[derive(Clone)]
pub(crate) struct AppState {
    /// The process-wide broker capability.
    pub broker: Broker,

    /// Server shutdown token; streaming connections watch a child of it.
    pub shutdown: CancellationToken,
}

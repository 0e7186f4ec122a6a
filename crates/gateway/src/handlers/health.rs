use axum::Json;
use axum::extract::State;
use jetgate_bridge::HealthSnapshot;

use crate::state::AppState;

/// Handler for the `/health` endpoint.
pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthSnapshot> {
    Json(state.broker.health().await)
}

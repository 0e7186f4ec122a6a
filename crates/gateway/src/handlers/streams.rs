use axum::Json;
use axum::extract::{Path, State};
use jetgate_bridge::StreamSnapshot;

use crate::problem::ApiError;
use crate::state::AppState;

/// Handler for `GET /streams/{stream}`.
pub(crate) async fn stream_info(
    Path(stream): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<StreamSnapshot>, ApiError> {
    let snapshot = state.broker.stream_info(&stream).await?;

    Ok(Json(snapshot))
}

use axum::Json;
use axum::extract::{Path, Query, State};
use bytes::Bytes;
use jetgate_bridge::fetch;
use jetgate_wire::{FetchBatch, PublishReceipt};
use serde::Deserialize;

use crate::problem::ApiError;
use crate::state::AppState;

/// Query parameters accepted by the fetch endpoints.
#[derive(Clone, Copy, Debug, Deserialize)]
pub(crate) struct FetchParams {
    limit: Option<usize>,
    timeout: Option<u64>,
}

impl FetchParams {
    pub(crate) fn limit(self) -> usize {
        self.limit.unwrap_or(fetch::DEFAULT_LIMIT)
    }

    pub(crate) fn timeout(self) -> u64 {
        self.timeout.unwrap_or(fetch::DEFAULT_TIMEOUT_SECS)
    }
}

/// Handler for `POST /messages/{subject}`.
pub(crate) async fn publish_message(
    Path(subject): Path<String>,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PublishReceipt>, ApiError> {
    let receipt = state.broker.publish(&subject, body).await?;

    Ok(Json(receipt))
}

/// Handler for `GET /messages/{subject}`: the most recent messages
/// matching the subject filter.
pub(crate) async fn fetch_latest(
    Path(subject): Path<String>,
    Query(params): Query<FetchParams>,
    State(state): State<AppState>,
) -> Result<Json<FetchBatch>, ApiError> {
    let batch = fetch::latest(&state.broker, &subject, params.limit(), params.timeout()).await?;

    Ok(Json(batch))
}

/// Handler for `GET /messages/{stream}/consumer/{consumer}`: continue from
/// the durable consumer's position.
pub(crate) async fn fetch_durable(
    Path((stream, consumer)): Path<(String, String)>,
    Query(params): Query<FetchParams>,
    State(state): State<AppState>,
) -> Result<Json<FetchBatch>, ApiError> {
    let batch = fetch::durable(
        &state.broker,
        &stream,
        &consumer,
        params.limit(),
        params.timeout(),
    )
    .await?;

    Ok(Json(batch))
}

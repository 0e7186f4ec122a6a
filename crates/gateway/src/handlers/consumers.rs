use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use jetgate_bridge::consumer::{
    self, ConsumerDetails, ConsumerHealth, ConsumerSpec, ResetAction, ResetOutcome,
};
use jetgate_wire::FetchBatch;
use serde::Serialize;

use super::messages::FetchParams;
use crate::problem::ApiError;
use crate::state::AppState;

/// Response body of the list endpoint.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct ConsumerList {
    stream: String,
    consumers: Vec<ConsumerDetails>,
}

/// Response body of the delete endpoint.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct DeleteReceipt {
    deleted: bool,
    stream: String,
    consumer: String,
}

/// Handler for `POST /consumers/{stream}`.
pub(crate) async fn create_consumer(
    Path(stream): Path<String>,
    State(state): State<AppState>,
    Json(spec): Json<ConsumerSpec>,
) -> Result<(StatusCode, Json<ConsumerDetails>), ApiError> {
    let details = consumer::create(&state.broker, &stream, spec).await?;

    Ok((StatusCode::CREATED, Json(details)))
}

/// Handler for `GET /consumers/{stream}`.
pub(crate) async fn list_consumers(
    Path(stream): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ConsumerList>, ApiError> {
    let consumers = consumer::list(&state.broker, &stream).await?;

    Ok(Json(ConsumerList { stream, consumers }))
}

/// Handler for `GET /consumers/templates`.
pub(crate) async fn consumer_templates() -> Json<Vec<ConsumerSpec>> {
    Json(consumer::templates())
}

/// Handler for `GET /consumers/{stream}/{consumer}`.
pub(crate) async fn consumer_details(
    Path((stream, name)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<ConsumerDetails>, ApiError> {
    let details = consumer::details(&state.broker, &stream, &name).await?;

    Ok(Json(details))
}

/// Handler for `DELETE /consumers/{stream}/{consumer}`.
pub(crate) async fn delete_consumer(
    Path((stream, name)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<DeleteReceipt>, ApiError> {
    consumer::delete(&state.broker, &stream, &name).await?;

    Ok(Json(DeleteReceipt {
        deleted: true,
        stream,
        consumer: name,
    }))
}

/// Handler for `GET /consumers/{stream}/{consumer}/messages`: peek without
/// advancing the consumer.
pub(crate) async fn peek_messages(
    Path((stream, name)): Path<(String, String)>,
    Query(params): Query<FetchParams>,
    State(state): State<AppState>,
) -> Result<Json<FetchBatch>, ApiError> {
    let batch = consumer::peek(
        &state.broker,
        &stream,
        &name,
        params.limit(),
        params.timeout(),
    )
    .await?;

    Ok(Json(batch))
}

/// Handler for `GET /consumers/{stream}/{consumer}/health`.
pub(crate) async fn consumer_health(
    Path((stream, name)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<ConsumerHealth>, ApiError> {
    let health = consumer::health(&state.broker, &stream, &name).await?;

    Ok(Json(health))
}

/// Handler for `POST /consumers/{stream}/{consumer}/reset`.
pub(crate) async fn reset_consumer(
    Path((stream, name)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(action): Json<ResetAction>,
) -> Result<Json<ResetOutcome>, ApiError> {
    let outcome = consumer::reset(&state.broker, &stream, &name, &action).await?;

    Ok(Json(outcome))
}

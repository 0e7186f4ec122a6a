use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use jetgate_bridge::Error as BridgeError;
use serde::Serialize;
use tracing::error;

/// Structured HTTP error body.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct Problem {
    pub status: u16,
    pub title: String,
    pub detail: String,
}

/// Bridge error carried through a handler's `?`.
pub(crate) struct ApiError(BridgeError);

impl From<BridgeError> for ApiError {
    fn from(error: BridgeError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = self.0;

        let (status, title, detail) = match &error {
            BridgeError::InvalidArgument(_) => {
                (StatusCode::BAD_REQUEST, "Invalid argument", error.to_string())
            }
            BridgeError::StreamNotFound(_) => {
                (StatusCode::NOT_FOUND, "Stream not found", error.to_string())
            }
            BridgeError::ConsumerNotFound { .. } => {
                (StatusCode::NOT_FOUND, "Consumer not found", error.to_string())
            }
            BridgeError::PartialFailure { .. } => {
                error!(error = %error, "reset left the consumer deleted");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Reset partially failed",
                    error.to_string(),
                )
            }
            BridgeError::BrokerUnavailable(_) => {
                error!(error = %error, "broker unavailable");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Broker unavailable",
                    "the message broker could not be reached".to_string(),
                )
            }
            BridgeError::Internal(detail) => {
                // Full detail goes to the log only.
                error!(detail = %detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error",
                    "internal error".to_string(),
                )
            }
        };

        (
            status,
            Json(Problem {
                status: status.as_u16(),
                title: title.to_string(),
                detail,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(error: BridgeError) -> StatusCode {
        ApiError(error).into_response().status()
    }

    #[test]
    fn taxonomy_maps_to_http_statuses() {
        assert_eq!(
            status_of(BridgeError::InvalidArgument("limit".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(BridgeError::StreamNotFound("EVENTS".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(BridgeError::ConsumerNotFound {
                stream: "EVENTS".into(),
                consumer: "w".into(),
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(BridgeError::PartialFailure {
                consumer: "w".into(),
                detail: "gone".into(),
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(BridgeError::BrokerUnavailable("down".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(BridgeError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn problem_body_shape() {
        let problem = Problem {
            status: 404,
            title: "Consumer not found".to_string(),
            detail: "consumer `w` not found on stream `EVENTS`".to_string(),
        };

        let json = serde_json::to_value(problem).expect("to json");
        assert_eq!(json["status"], 404);
        assert_eq!(json["title"], "Consumer not found");
        assert!(json["detail"].as_str().unwrap().contains('w'));
    }
}

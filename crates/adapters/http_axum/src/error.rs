//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use areaflow_domain::error::AreaFlowError;
use areaflow_domain::webhook::WebhookError;

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`AreaFlowError`] to an HTTP response with appropriate status code.
#[derive(Debug)]
pub struct ApiError(AreaFlowError);

impl From<AreaFlowError> for ApiError {
    fn from(err: AreaFlowError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            AreaFlowError::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            AreaFlowError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string()),
            AreaFlowError::Conflict(err) => (StatusCode::CONFLICT, err.to_string()),
            AreaFlowError::Webhook(err) => {
                let status = match err {
                    WebhookError::ModeMismatch { .. } => StatusCode::CONFLICT,
                    WebhookError::DeliveryTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
                    WebhookError::Removed(_) => StatusCode::GONE,
                };
                (status, err.to_string())
            }
            AreaFlowError::Capability(err) => {
                tracing::warn!(error = %err, "capability error");
                (StatusCode::BAD_GATEWAY, err.to_string())
            }
            AreaFlowError::Storage(err) => {
                tracing::error!(error = %err, "storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
            AreaFlowError::Log(err) => {
                tracing::error!(error = %err, "applet log error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use areaflow_domain::error::{ConflictError, NotFoundError};

    fn status_of(err: impl Into<AreaFlowError>) -> StatusCode {
        ApiError::from(err.into()).into_response().status()
    }

    #[test]
    fn should_map_not_found_to_404() {
        let err = NotFoundError {
            entity: "Trigger",
            id: "x".to_string(),
        };
        assert_eq!(status_of(err), StatusCode::NOT_FOUND);
    }

    #[test]
    fn should_map_still_running_to_409() {
        assert_eq!(
            status_of(ConflictError::StillRunning("x".to_string())),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn should_map_delivery_timeout_to_504() {
        assert_eq!(
            status_of(WebhookError::DeliveryTimeout("x".to_string())),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn should_hide_storage_details_behind_500() {
        let err = AreaFlowError::Storage(Box::new(std::io::Error::other("disk full")));
        assert_eq!(status_of(err), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

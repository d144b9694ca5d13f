//! Inbound webhook endpoints.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use areaflow_app::capability::CapabilityCatalog;
use areaflow_app::ports::{AppletLogFactory, AppletRepository, AuthorizationRepository};
use areaflow_domain::webhook::HistoryItem;

use crate::error::ApiError;
use crate::state::AppState;

/// Header naming who sent a delivery.
pub const AUTHOR_HEADER: &str = "x-webhook-author";

const ANONYMOUS: &str = "anonymous";

/// Possible responses from the deliver endpoint.
pub enum DeliverResponse {
    /// A reader took the payload.
    Delivered,
}

impl IntoResponse for DeliverResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Delivered => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// Possible responses from the history endpoint.
pub enum HistoryResponse {
    Ok(Json<Vec<HistoryItem>>),
}

impl IntoResponse for HistoryResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// `POST /api/webhooks/:name` — hand the raw body to the worker reading `name`.
///
/// Holds the request open until the payload is consumed, the webhook is
/// removed, or the broker's delivery timeout elapses.
pub async fn deliver<R, C, L>(
    State(state): State<AppState<R, C, L>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<DeliverResponse, ApiError>
where
    R: AppletRepository + AuthorizationRepository + 'static,
    C: CapabilityCatalog + 'static,
    L: AppletLogFactory + 'static,
{
    let author = headers
        .get(AUTHOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .unwrap_or(ANONYMOUS);
    state.broker.deliver(author, &name, body.to_vec()).await?;
    Ok(DeliverResponse::Delivered)
}

/// `GET /api/webhooks/history` — every recorded delivery, newest first.
pub async fn history<R, C, L>(
    State(state): State<AppState<R, C, L>>,
) -> Result<HistoryResponse, ApiError>
where
    R: AppletRepository + AuthorizationRepository + 'static,
    C: CapabilityCatalog + 'static,
    L: AppletLogFactory + 'static,
{
    Ok(HistoryResponse::Ok(Json(state.broker.history())))
}

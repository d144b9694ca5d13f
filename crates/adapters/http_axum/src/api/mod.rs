//! JSON REST API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod applets;
#[allow(clippy::missing_errors_doc)]
pub mod triggers;
#[allow(clippy::missing_errors_doc)]
pub mod webhooks;

use std::str::FromStr;

use axum::Router;
use axum::routing::{get, post, put};

use areaflow_app::capability::CapabilityCatalog;
use areaflow_app::ports::{AppletLogFactory, AppletRepository, AuthorizationRepository};
use areaflow_domain::error::{AreaFlowError, ValidationError};
use areaflow_domain::id::AppletId;

use crate::error::ApiError;
use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<R, C, L>() -> Router<AppState<R, C, L>>
where
    R: AppletRepository + AuthorizationRepository + 'static,
    C: CapabilityCatalog + 'static,
    L: AppletLogFactory + 'static,
{
    Router::new()
        // Applets
        .route(
            "/applets",
            get(applets::list::<R, C, L>).post(applets::create::<R, C, L>),
        )
        .route(
            "/applets/{id}",
            get(applets::get::<R, C, L>).delete(applets::delete::<R, C, L>),
        )
        // Triggers
        .route(
            "/triggers",
            get(triggers::list::<R, C, L>).post(triggers::create::<R, C, L>),
        )
        .route(
            "/triggers/{id}",
            get(triggers::get::<R, C, L>).delete(triggers::delete::<R, C, L>),
        )
        .route("/triggers/{id}/open", post(triggers::open::<R, C, L>))
        .route("/triggers/{id}/close", post(triggers::close::<R, C, L>))
        .route("/triggers/{id}/start", post(triggers::start::<R, C, L>))
        .route("/triggers/{id}/stop", post(triggers::stop::<R, C, L>))
        .route(
            "/triggers/{id}/{side}",
            put(triggers::reconfigure::<R, C, L>),
        )
        // Webhooks
        .route("/webhooks/history", get(webhooks::history::<R, C, L>))
        .route("/webhooks/{name}", post(webhooks::deliver::<R, C, L>))
}

/// Parse an applet id taken from the request path.
fn parse_id(raw: &str) -> Result<AppletId, ApiError> {
    AppletId::from_str(raw).map_err(|_| {
        ApiError::from(AreaFlowError::from(ValidationError::InvalidId(
            raw.to_string(),
        )))
    })
}

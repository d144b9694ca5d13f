//! JSON REST handlers for triggers.
//!
//! A trigger is addressed by the id of the applet it drives.

use std::str::FromStr;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use areaflow_app::capability::CapabilityCatalog;
use areaflow_app::ports::{AppletLogFactory, AppletRepository, AuthorizationRepository};
use areaflow_app::trigger::TriggerInfo;
use areaflow_domain::applet::{AreaBinding, Side};
use areaflow_domain::error::AreaFlowError;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for creating a trigger.
#[derive(Deserialize)]
pub struct CreateTriggerRequest {
    pub applet_id: String,
    #[serde(default)]
    pub autostart: bool,
}

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Vec<TriggerInfo>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the get endpoint.
pub enum GetResponse {
    Ok(Json<TriggerInfo>),
}

impl IntoResponse for GetResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the create endpoint.
pub enum CreateResponse {
    Created(Json<TriggerInfo>),
}

impl IntoResponse for CreateResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// Response of every endpoint that only changes trigger state.
pub enum ControlResponse {
    NoContent,
}

impl IntoResponse for ControlResponse {
    fn into_response(self) -> Response {
        match self {
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `GET /api/triggers` — snapshot of every live trigger.
pub async fn list<R, C, L>(
    State(state): State<AppState<R, C, L>>,
) -> Result<ListResponse, ApiError>
where
    R: AppletRepository + AuthorizationRepository + 'static,
    C: CapabilityCatalog + 'static,
    L: AppletLogFactory + 'static,
{
    Ok(ListResponse::Ok(Json(state.registry.list())))
}

/// `GET /api/triggers/:id` — current state of one trigger.
pub async fn get<R, C, L>(
    State(state): State<AppState<R, C, L>>,
    Path(id): Path<String>,
) -> Result<GetResponse, ApiError>
where
    R: AppletRepository + AuthorizationRepository + 'static,
    C: CapabilityCatalog + 'static,
    L: AppletLogFactory + 'static,
{
    let applet_id = super::parse_id(&id)?;
    let info = state.registry.lookup(applet_id)?;
    Ok(GetResponse::Ok(Json(info)))
}

/// `POST /api/triggers` — build a trigger for a stored applet.
pub async fn create<R, C, L>(
    State(state): State<AppState<R, C, L>>,
    Json(req): Json<CreateTriggerRequest>,
) -> Result<CreateResponse, ApiError>
where
    R: AppletRepository + AuthorizationRepository + 'static,
    C: CapabilityCatalog + 'static,
    L: AppletLogFactory + 'static,
{
    let applet_id = super::parse_id(&req.applet_id)?;
    state
        .applet_service
        .create_trigger(applet_id, req.autostart)
        .await?;
    let info = state.registry.lookup(applet_id)?;
    Ok(CreateResponse::Created(Json(info)))
}

/// `DELETE /api/triggers/:id` — drop a trigger that is not running.
pub async fn delete<R, C, L>(
    State(state): State<AppState<R, C, L>>,
    Path(id): Path<String>,
) -> Result<ControlResponse, ApiError>
where
    R: AppletRepository + AuthorizationRepository + 'static,
    C: CapabilityCatalog + 'static,
    L: AppletLogFactory + 'static,
{
    let applet_id = super::parse_id(&id)?;
    state.registry.remove(applet_id)?;
    Ok(ControlResponse::NoContent)
}

/// `POST /api/triggers/:id/open` — resume action and reaction calls.
pub async fn open<R, C, L>(
    State(state): State<AppState<R, C, L>>,
    Path(id): Path<String>,
) -> Result<ControlResponse, ApiError>
where
    R: AppletRepository + AuthorizationRepository + 'static,
    C: CapabilityCatalog + 'static,
    L: AppletLogFactory + 'static,
{
    let applet_id = super::parse_id(&id)?;
    state.registry.open(applet_id).await?;
    Ok(ControlResponse::NoContent)
}

/// `POST /api/triggers/:id/close` — pause without losing store state.
pub async fn close<R, C, L>(
    State(state): State<AppState<R, C, L>>,
    Path(id): Path<String>,
) -> Result<ControlResponse, ApiError>
where
    R: AppletRepository + AuthorizationRepository + 'static,
    C: CapabilityCatalog + 'static,
    L: AppletLogFactory + 'static,
{
    let applet_id = super::parse_id(&id)?;
    state.registry.close(applet_id).await?;
    Ok(ControlResponse::NoContent)
}

/// `POST /api/triggers/:id/start` — launch an idle trigger or rebuild a stopped one.
pub async fn start<R, C, L>(
    State(state): State<AppState<R, C, L>>,
    Path(id): Path<String>,
) -> Result<ControlResponse, ApiError>
where
    R: AppletRepository + AuthorizationRepository + 'static,
    C: CapabilityCatalog + 'static,
    L: AppletLogFactory + 'static,
{
    let applet_id = super::parse_id(&id)?;
    state.registry.restart(applet_id).await?;
    Ok(ControlResponse::NoContent)
}

/// `POST /api/triggers/:id/stop` — ask the worker to exit after its current cycle.
pub async fn stop<R, C, L>(
    State(state): State<AppState<R, C, L>>,
    Path(id): Path<String>,
) -> Result<ControlResponse, ApiError>
where
    R: AppletRepository + AuthorizationRepository + 'static,
    C: CapabilityCatalog + 'static,
    L: AppletLogFactory + 'static,
{
    let applet_id = super::parse_id(&id)?;
    state.registry.stop(applet_id).await?;
    Ok(ControlResponse::NoContent)
}

/// `PUT /api/triggers/:id/:side` — rebind the action or the reaction.
pub async fn reconfigure<R, C, L>(
    State(state): State<AppState<R, C, L>>,
    Path((id, side)): Path<(String, String)>,
    Json(binding): Json<AreaBinding>,
) -> Result<ControlResponse, ApiError>
where
    R: AppletRepository + AuthorizationRepository + 'static,
    C: CapabilityCatalog + 'static,
    L: AppletLogFactory + 'static,
{
    let applet_id = super::parse_id(&id)?;
    let side = Side::from_str(&side).map_err(AreaFlowError::from)?;
    state
        .registry
        .reconfigure(applet_id, side, binding)
        .await?;
    Ok(ControlResponse::NoContent)
}

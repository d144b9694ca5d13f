//! JSON REST handlers for applets.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use areaflow_app::capability::CapabilityCatalog;
use areaflow_app::ports::{AppletLogFactory, AppletRepository, AuthorizationRepository};
use areaflow_domain::applet::{Applet, AreaBinding};

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for creating an applet.
#[derive(Deserialize)]
pub struct CreateAppletRequest {
    pub name: String,
    pub description: Option<String>,
    pub action: AreaBinding,
    pub reaction: AreaBinding,
    pub active: Option<bool>,
}

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Vec<Applet>>),
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
    Ok(Json<Applet>),
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
    Created(Json<Applet>),
}

impl IntoResponse for CreateResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// Possible responses from the delete endpoint.
pub enum DeleteResponse {
    NoContent,
}

impl IntoResponse for DeleteResponse {
    fn into_response(self) -> Response {
        match self {
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `GET /api/applets` — list all applets.
pub async fn list<R, C, L>(
    State(state): State<AppState<R, C, L>>,
) -> Result<ListResponse, ApiError>
where
    R: AppletRepository + AuthorizationRepository + 'static,
    C: CapabilityCatalog + 'static,
    L: AppletLogFactory + 'static,
{
    let applets = state.applet_service.list_applets().await?;
    Ok(ListResponse::Ok(Json(applets)))
}

/// `GET /api/applets/:id` — get applet by ID.
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
    let applet = state.applet_service.get_applet(applet_id).await?;
    Ok(GetResponse::Ok(Json(applet)))
}

/// `POST /api/applets` — persist a new applet. No trigger is created.
pub async fn create<R, C, L>(
    State(state): State<AppState<R, C, L>>,
    Json(req): Json<CreateAppletRequest>,
) -> Result<CreateResponse, ApiError>
where
    R: AppletRepository + AuthorizationRepository + 'static,
    C: CapabilityCatalog + 'static,
    L: AppletLogFactory + 'static,
{
    let mut builder = Applet::builder()
        .name(req.name)
        .action(req.action)
        .reaction(req.reaction);

    if let Some(description) = req.description {
        builder = builder.description(description);
    }
    if let Some(active) = req.active {
        builder = builder.active(active);
    }

    let applet = builder.build()?;
    let created = state.applet_service.create_applet(applet).await?;
    Ok(CreateResponse::Created(Json(created)))
}

/// `DELETE /api/applets/:id` — delete an applet, retiring its trigger first.
pub async fn delete<R, C, L>(
    State(state): State<AppState<R, C, L>>,
    Path(id): Path<String>,
) -> Result<DeleteResponse, ApiError>
where
    R: AppletRepository + AuthorizationRepository + 'static,
    C: CapabilityCatalog + 'static,
    L: AppletLogFactory + 'static,
{
    let applet_id = super::parse_id(&id)?;
    state.applet_service.delete_applet(applet_id).await?;
    Ok(DeleteResponse::NoContent)
}

use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::{
    db::{documents::PinnedDocument, invitations::ProjectInvitation},
    error::Result,
    middleware::auth::AuthUser,
    services::{
        documents::Created,
        invitations,
        projects::{self, ProjectOverview, ProjectUpdate},
        reconcile::{self, Invitee, Mutation},
    },
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_project))
        .route("/:id", get(get_project).patch(update_project))
        .route("/:id/documents", post(create_document))
        .route("/:id/pinned", get(get_pinned).put(pin_document))
        .route("/:id/invites", get(list_invites).post(invite))
        .route("/:id/invites/:display_name", delete(revoke_invite))
}

fn default_public() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default = "default_public")]
    pub public: bool,
}

#[derive(Debug, Deserialize)]
pub struct PinRequest {
    pub document_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub invitees: Vec<Invitee>,
}

async fn create_project(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateProjectRequest>,
) -> Result<Json<Created>> {
    let created = projects::create_project(&state.db.pool, &user.id, &body.name, body.public).await?;
    Ok(Json(created))
}

async fn get_project(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Path(key): Path<String>,
) -> Result<Json<ProjectOverview>> {
    let requester = user.as_ref().map(|u| u.id.as_str());
    Ok(Json(projects::overview(&state.db.pool, &key, requester).await?))
}

async fn update_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<ProjectUpdate>,
) -> Result<Json<()>> {
    projects::update_project(&state.db.pool, &id, &user.id, &body).await?;
    Ok(Json(()))
}

async fn get_pinned(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Path(key): Path<String>,
) -> Result<Json<Option<PinnedDocument>>> {
    let requester = user.as_ref().map(|u| u.id.as_str());
    Ok(Json(projects::get_pinned(&state.db.pool, &key, requester).await?))
}

async fn pin_document(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<PinRequest>,
) -> Result<Json<()>> {
    projects::pin_document(&state.db.pool, &id, &user.id, &body.document_id).await?;
    Ok(Json(()))
}

async fn create_document(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<CreateDocumentRequest>,
) -> Result<Json<Created>> {
    let created =
        crate::services::documents::create_in_project(&state.db.pool, &id, &user.id, &body.name)
            .await?;
    Ok(Json(created))
}

async fn invite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<InviteRequest>,
) -> Result<Json<Vec<Mutation>>> {
    let applied = reconcile::invite(&state.db.pool, &id, &user.id, &body.invitees).await?;
    Ok(Json(applied))
}

async fn list_invites(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<ProjectInvitation>>> {
    Ok(Json(
        invitations::list_for_project(&state.db.pool, &id, &user.id).await?,
    ))
}

async fn revoke_invite(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, display_name)): Path<(String, String)>,
) -> Result<Json<()>> {
    invitations::revoke(&state.db.pool, &id, &user.id, &display_name).await?;
    Ok(Json(()))
}

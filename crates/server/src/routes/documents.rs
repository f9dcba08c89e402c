use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::{
    db::documents::RevisionListing,
    error::Result,
    middleware::auth::AuthUser,
    services::{
        documents::{self, Created, DocumentView},
        revisions::{self, RevisionView},
    },
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_standalone))
        .route(
            "/:id",
            get(get_document).put(save_document).delete(delete_document),
        )
        .route("/:id/revisions", get(list_revisions).post(save_revision))
        .route("/:id/revert", post(revert_document))
        .route("/:id/publish", post(publish_document))
        .route("/:id/fork", post(fork_document))
}

pub fn revisions_router() -> Router<AppState> {
    Router::new().route("/:slug", get(get_revision))
}

#[derive(Debug, Deserialize)]
pub struct CreateStandaloneRequest {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveDocumentRequest {
    pub name: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SaveRevisionRequest {
    pub label: String,
}

fn default_content_only() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct RevertRequest {
    pub revision_id: String,
    #[serde(default = "default_content_only")]
    pub content_only: bool,
}

async fn create_standalone(
    State(state): State<AppState>,
    Json(body): Json<CreateStandaloneRequest>,
) -> Result<Json<Created>> {
    Ok(Json(
        documents::create_standalone(&state.db.pool, &body.name, &body.content).await?,
    ))
}

async fn get_document(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Path(key): Path<String>,
) -> Result<Json<DocumentView>> {
    let requester = user.as_ref().map(|u| u.id.as_str());
    Ok(Json(
        documents::get_document(&state.db.pool, &key, requester).await?,
    ))
}

async fn save_document(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<SaveDocumentRequest>,
) -> Result<Json<()>> {
    documents::update_document(
        &state.db.pool,
        &id,
        &user.id,
        body.name.as_deref(),
        body.content.as_deref(),
    )
    .await?;
    Ok(Json(()))
}

async fn delete_document(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<()>> {
    documents::delete_document(&state.db.pool, &id, &user.id).await?;
    Ok(Json(()))
}

async fn list_revisions(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<RevisionListing>>> {
    Ok(Json(
        revisions::list_revisions(&state.db.pool, &id, Some(&user.id)).await?,
    ))
}

async fn save_revision(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<SaveRevisionRequest>,
) -> Result<Json<()>> {
    revisions::save_revision(&state.db.pool, &id, &user.id, &body.label).await?;
    Ok(Json(()))
}

async fn revert_document(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<RevertRequest>,
) -> Result<Json<()>> {
    revisions::revert_document(
        &state.db.pool,
        &id,
        &body.revision_id,
        body.content_only,
        &user.id,
    )
    .await?;
    Ok(Json(()))
}

async fn publish_document(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<()>> {
    revisions::publish(&state.db.pool, &id, &user.id).await?;
    Ok(Json(()))
}

async fn fork_document(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Created>> {
    Ok(Json(documents::fork(&state.db.pool, &id, &user.id).await?))
}

async fn get_revision(
    State(state): State<AppState>,
    user: AuthUser,
    Path(slug): Path<String>,
) -> Result<Json<RevisionView>> {
    Ok(Json(
        revisions::get_revision(&state.db.pool, &slug, Some(&user.id)).await?,
    ))
}

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    db::{invitations::InboxInvitation, models::ProjectSummary},
    error::Result,
    middleware::auth::AuthUser,
    services::{
        invitations::{self, DeclinedInvitation},
        users::{self, Profile, UserMatch, UserProjects},
    },
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/search", get(search_users))
        .route("/me/display-name", put(change_display_name))
        .route("/me/projects", get(my_projects))
        .route("/me/invites", get(my_invites))
        .route("/me/invites/:project_id/accept", post(accept_invite))
        .route("/me/invites/:project_id", delete(decline_invite))
        .route("/profile/:display_name", get(profile))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub prefix: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DisplayNameRequest {
    pub display_name: String,
}

#[derive(Debug, Serialize)]
pub struct DisplayNameResponse {
    pub display_name: String,
}

async fn search_users(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<UserMatch>>> {
    Ok(Json(
        users::search(&state.db.pool, &query.prefix, query.limit).await?,
    ))
}

async fn change_display_name(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<DisplayNameRequest>,
) -> Result<Json<DisplayNameResponse>> {
    let display_name = users::change_display_name(&state.db.pool, &user.id, &body.display_name).await?;
    Ok(Json(DisplayNameResponse { display_name }))
}

async fn my_projects(State(state): State<AppState>, user: AuthUser) -> Result<Json<UserProjects>> {
    Ok(Json(users::projects(&state.db.pool, &user.id).await?))
}

async fn my_invites(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<InboxInvitation>>> {
    Ok(Json(
        invitations::list_for_user(&state.db.pool, &user.id, &user.id).await?,
    ))
}

async fn accept_invite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
) -> Result<Json<ProjectSummary>> {
    Ok(Json(
        invitations::accept(&state.db.pool, &project_id, &user.id).await?,
    ))
}

async fn decline_invite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
) -> Result<Json<DeclinedInvitation>> {
    Ok(Json(
        invitations::decline(&state.db.pool, &project_id, &user.id).await?,
    ))
}

async fn profile(
    State(state): State<AppState>,
    Path(display_name): Path<String>,
) -> Result<Json<Profile>> {
    Ok(Json(users::profile(&state.db.pool, &display_name).await?))
}

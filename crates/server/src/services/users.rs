use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    db::{
        self,
        models::{MemberRole, Project},
    },
    error::{AppError, Result},
    services::validate_length,
};

pub const DISPLAY_NAME_MAX_LEN: usize = 20;
pub const SEARCH_LIMIT: i64 = 10;

#[derive(Debug, Serialize)]
pub struct UserMatch {
    pub id: String,
    pub display_name: String,
}

#[derive(Debug, Serialize)]
pub struct Profile {
    pub display_name: String,
    pub owned_projects: Vec<Project>,
    pub editable_projects: Vec<Project>,
}

#[derive(Debug, Serialize)]
pub struct UserProjects {
    pub owned: Vec<Project>,
    pub editable: Vec<Project>,
    pub viewable: Vec<Project>,
}

/// Project features are only available once the user has picked a display name.
pub async fn require_display_name(conn: &mut SqliteConnection, user_id: &str) -> Result<String> {
    let user = db::users::find_by_id(conn, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    user.display_name
        .ok_or_else(|| AppError::bad_request("A display name must be set first"))
}

pub async fn change_display_name(pool: &SqlitePool, requester: &str, raw: &str) -> Result<String> {
    let name = raw.trim();
    validate_length("Display name", name, DISPLAY_NAME_MAX_LEN)?;

    let updated = db::users::set_display_name(&mut *pool.acquire().await?, requester, name)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::bad_request("Display name is already taken")
            }
            other => AppError::Database(other),
        })?;
    if !updated {
        return Err(AppError::not_found("User not found"));
    }

    tracing::info!(user_id = %requester, display_name = %name, "display name changed");
    Ok(name.to_string())
}

/// Invitee search by display-name prefix.
pub async fn search(pool: &SqlitePool, prefix: &str, limit: Option<i64>) -> Result<Vec<UserMatch>> {
    let prefix = prefix.trim();
    if prefix.is_empty() {
        return Ok(Vec::new());
    }
    let limit = limit.unwrap_or(SEARCH_LIMIT).clamp(1, SEARCH_LIMIT);

    let rows =
        db::users::find_by_display_name_prefix(&mut *pool.acquire().await?, prefix, limit).await?;
    Ok(rows
        .into_iter()
        .map(|(id, display_name)| UserMatch { id, display_name })
        .collect())
}

/// Public profile: only public projects are listed.
pub async fn profile(pool: &SqlitePool, display_name: &str) -> Result<Profile> {
    let mut conn = pool.acquire().await?;
    let user_id = db::users::find_id_by_display_name(&mut conn, display_name)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(Profile {
        display_name: display_name.to_string(),
        owned_projects: db::projects::list_owned(&mut conn, &user_id, true).await?,
        editable_projects: db::projects::list_with_role(&mut conn, &user_id, MemberRole::Editor, true)
            .await?,
    })
}

pub async fn projects(pool: &SqlitePool, requester: &str) -> Result<UserProjects> {
    let mut conn = pool.acquire().await?;
    Ok(UserProjects {
        owned: db::projects::list_owned(&mut conn, requester, false).await?,
        editable: db::projects::list_with_role(&mut conn, requester, MemberRole::Editor, false)
            .await?,
        viewable: db::projects::list_with_role(&mut conn, requester, MemberRole::Viewer, false)
            .await?,
    })
}

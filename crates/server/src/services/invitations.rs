//! Pending invitations: accept, decline, revoke and listing.
//!
//! An invitation is keyed by (project, user). Accepting it deletes the row and
//! inserts the membership in the same transaction, so it can only happen once.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::{
    db::{
        self,
        invitations::{InboxInvitation, ProjectInvitation},
        models::{MemberRole, ProjectSummary},
    },
    error::{AppError, Result},
};

/// Number of invitations shown to an owner administering a project.
pub const PROJECT_INVITATION_LIMIT: i64 = 20;

#[derive(Debug, Serialize)]
pub struct DeclinedInvitation {
    pub role: String,
    pub project: ProjectSummary,
}

pub async fn accept(pool: &SqlitePool, project_id: &str, requester: &str) -> Result<ProjectSummary> {
    let mut tx = pool.begin().await?;

    let stored = db::invitations::take(&mut *tx, project_id, requester)
        .await?
        .ok_or_else(|| AppError::not_found("Invitation not found"))?;

    // Only EDITOR and VIEWER can be written by the service layer; anything else is a
    // corrupt row and the rollback leaves it in place.
    let role: MemberRole = stored.parse().map_err(|_| {
        tracing::warn!(%project_id, user_id = %requester, role = %stored, "refusing to accept invitation");
        AppError::bad_request("This invitation cannot be accepted")
    })?;

    db::projects::upsert_member(&mut *tx, project_id, requester, role).await?;
    let project = db::projects::summary(&mut *tx, project_id)
        .await?
        .ok_or_else(|| AppError::not_found("Project not found"))?;

    tx.commit().await?;

    tracing::info!(%project_id, user_id = %requester, %role, "invitation accepted");
    Ok(project)
}

pub async fn decline(
    pool: &SqlitePool,
    project_id: &str,
    requester: &str,
) -> Result<DeclinedInvitation> {
    let mut tx = pool.begin().await?;

    let role = db::invitations::take(&mut *tx, project_id, requester)
        .await?
        .ok_or_else(|| AppError::not_found("Invitation not found"))?;
    let project = db::projects::summary(&mut *tx, project_id)
        .await?
        .ok_or_else(|| AppError::not_found("Project not found"))?;

    tx.commit().await?;

    tracing::info!(%project_id, user_id = %requester, "invitation declined");
    Ok(DeclinedInvitation { role, project })
}

/// Owner withdraws the pending invitation of `display_name`.
pub async fn revoke(
    pool: &SqlitePool,
    project_id: &str,
    requester: &str,
    display_name: &str,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    if !db::projects::lock(&mut *tx, project_id).await? {
        return Err(AppError::not_found("Project not found"));
    }
    let project = db::projects::find(&mut *tx, project_id)
        .await?
        .ok_or_else(|| AppError::not_found("Project not found"))?;
    if project.owner_id != requester {
        return Err(AppError::unauthorized("Only the owner can revoke invitations"));
    }

    let user_id = db::users::find_id_by_display_name(&mut *tx, display_name)
        .await?
        .ok_or_else(|| AppError::not_found("Invitation not found"))?;
    db::invitations::take(&mut *tx, &project.id, &user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Invitation not found"))?;

    tx.commit().await?;

    tracing::info!(project_id = %project.id, %user_id, "invitation revoked");
    Ok(())
}

pub async fn list_for_project(
    pool: &SqlitePool,
    project_id: &str,
    requester: &str,
) -> Result<Vec<ProjectInvitation>> {
    let mut conn = pool.acquire().await?;

    let project = db::projects::find(&mut conn, project_id)
        .await?
        .ok_or_else(|| AppError::not_found("Project not found"))?;
    if project.owner_id != requester {
        return Err(AppError::unauthorized("Only the owner can list invitations"));
    }

    Ok(db::invitations::list_for_project(&mut conn, &project.id, PROJECT_INVITATION_LIMIT).await?)
}

pub async fn list_for_user(
    pool: &SqlitePool,
    user_id: &str,
    requester: &str,
) -> Result<Vec<InboxInvitation>> {
    if user_id != requester {
        return Err(AppError::unauthorized("Invitations belong to another user"));
    }
    let mut conn = pool.acquire().await?;
    Ok(db::invitations::list_for_user(&mut conn, user_id).await?)
}

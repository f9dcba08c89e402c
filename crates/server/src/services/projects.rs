use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{
    db::{
        self,
        documents::{DocumentListing, PinnedDocument},
        invitations::ProjectInvitation,
        models::{MemberRole, Project, UserRef},
    },
    error::{AppError, Result},
    services::{
        access::{self, MembershipSnapshot, Role},
        documents::{new_document, Created},
        invitations::PROJECT_INVITATION_LIMIT,
        users, validate_name,
    },
};

/// Documents listed on a project overview.
pub const OVERVIEW_DOCUMENT_LIMIT: i64 = 25;

#[derive(Debug, Serialize)]
pub struct ProjectOverview {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub public: bool,
    pub editable: bool,
    pub pinned_document_id: Option<String>,
    pub role: Role,
    pub owner: UserRef,
    pub editors: Vec<UserRef>,
    pub viewers: Vec<UserRef>,
    /// Pending invitations, shown to the owner only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invitations: Option<Vec<ProjectInvitation>>,
    pub documents: Vec<DocumentListing>,
}

/// Owner-side project settings; absent fields are left alone.
#[derive(Debug, Default, Deserialize)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub public: Option<bool>,
    pub editable: Option<bool>,
}

/// Creates a project owned by the requester, seeded with one empty, pinned document.
pub async fn create_project(
    pool: &SqlitePool,
    requester: &str,
    name: &str,
    public: bool,
) -> Result<Created> {
    validate_name("Project name", name)?;
    users::require_display_name(&mut *pool.acquire().await?, requester).await?;

    let now = db::now();
    let project = Project {
        id: db::new_id(),
        slug: db::new_slug(),
        name: name.to_string(),
        owner_id: requester.to_string(),
        public,
        view_only: false,
        pinned_document_id: None,
        created_at: now.clone(),
        updated_at: now,
    };
    let document = new_document(Some(&project.id), name, "", false);

    let mut tx = pool.begin().await?;
    db::projects::insert(&mut tx, &project).await?;
    db::documents::insert(&mut tx, &document).await?;
    db::projects::set_pinned(&mut tx, &project.id, &document.id).await?;
    tx.commit().await?;

    tracing::info!(project_id = %project.id, owner_id = %requester, "project created");
    Ok(Created {
        id: project.id,
        slug: project.slug,
    })
}

pub async fn overview(
    pool: &SqlitePool,
    key: &str,
    requester: Option<&str>,
) -> Result<ProjectOverview> {
    let mut conn = pool.acquire().await?;
    let membership = db::projects::find_membership(&mut conn, key)
        .await?
        .ok_or_else(|| AppError::not_found("Project not found"))?;
    let role = access::require_view(&MembershipSnapshot::from(&membership), requester)?;
    let project = membership.project;

    let owner = db::users::find_by_id(&mut conn, &project.owner_id)
        .await?
        .map(|user| UserRef {
            id: user.id,
            display_name: user.display_name,
        })
        .ok_or_else(|| AppError::Internal(format!("owner of project {} is missing", project.id)))?;
    let editors = db::projects::members_with_role(&mut conn, &project.id, MemberRole::Editor).await?;
    let viewers = db::projects::members_with_role(&mut conn, &project.id, MemberRole::Viewer).await?;
    let invitations = if role.is_owner() {
        Some(
            db::invitations::list_for_project(&mut conn, &project.id, PROJECT_INVITATION_LIMIT)
                .await?,
        )
    } else {
        None
    };
    let documents =
        db::documents::list_for_project(&mut conn, &project.id, OVERVIEW_DOCUMENT_LIMIT).await?;

    Ok(ProjectOverview {
        id: project.id,
        slug: project.slug,
        name: project.name,
        public: project.public,
        editable: !project.view_only,
        pinned_document_id: project.pinned_document_id,
        role,
        owner,
        editors,
        viewers,
        invitations,
        documents,
    })
}

/// Owner-only rename, visibility and editability changes.
pub async fn update_project(
    pool: &SqlitePool,
    project_id: &str,
    requester: &str,
    update: &ProjectUpdate,
) -> Result<()> {
    if let Some(name) = &update.name {
        validate_name("Project name", name)?;
    }

    let mut tx = pool.begin().await?;
    if !db::projects::lock(&mut tx, project_id).await? {
        return Err(AppError::not_found("Project not found"));
    }
    let project = db::projects::find(&mut tx, project_id)
        .await?
        .ok_or_else(|| AppError::not_found("Project not found"))?;
    if project.owner_id != requester {
        return Err(AppError::unauthorized("Only the owner can change the project"));
    }

    if let Some(name) = &update.name {
        db::projects::rename(&mut tx, &project.id, name).await?;
    }
    if let Some(public) = update.public {
        db::projects::set_public(&mut tx, &project.id, public).await?;
    }
    if let Some(editable) = update.editable {
        db::projects::set_view_only(&mut tx, &project.id, !editable).await?;
    }
    db::projects::touch(&mut tx, &project.id, &db::now()).await?;
    tx.commit().await?;
    Ok(())
}

/// Owner-only: marks one of the project's documents as its landing document.
pub async fn pin_document(
    pool: &SqlitePool,
    project_id: &str,
    requester: &str,
    document_key: &str,
) -> Result<()> {
    let mut tx = pool.begin().await?;
    if !db::projects::lock(&mut tx, project_id).await? {
        return Err(AppError::not_found("Project not found"));
    }
    let project = db::projects::find(&mut tx, project_id)
        .await?
        .ok_or_else(|| AppError::not_found("Project not found"))?;
    if project.owner_id != requester {
        return Err(AppError::unauthorized("Only the owner can pin documents"));
    }

    let document = db::documents::find(&mut tx, document_key)
        .await?
        .ok_or_else(|| AppError::not_found("Document not found"))?;
    if document.project_id.as_deref() != Some(project.id.as_str()) {
        return Err(AppError::bad_request("The document is not part of the project"));
    }

    db::projects::set_pinned(&mut tx, &project.id, &document.id).await?;
    db::projects::touch(&mut tx, &project.id, &db::now()).await?;
    tx.commit().await?;

    tracing::info!(project_id = %project.id, document_id = %document.id, "document pinned");
    Ok(())
}

/// The project's pinned document, if it has one and the requester may view the project.
pub async fn get_pinned(
    pool: &SqlitePool,
    key: &str,
    requester: Option<&str>,
) -> Result<Option<PinnedDocument>> {
    let mut conn = pool.acquire().await?;
    let membership = db::projects::find_membership(&mut conn, key)
        .await?
        .ok_or_else(|| AppError::not_found("Project not found"))?;
    access::require_view(&MembershipSnapshot::from(&membership), requester)?;

    Ok(db::documents::find_pinned(&mut conn, &membership.project.id).await?)
}

use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    db::{
        self,
        models::{Document, Project, ProjectMembership, ProjectSummary},
    },
    error::{AppError, Result},
    services::{
        access::{self, MembershipSnapshot, Role},
        validate_name,
    },
};

/// A document together with the membership of the project it belongs to, if any.
pub struct LoadedDocument {
    pub document: Document,
    pub membership: Option<ProjectMembership>,
}

impl LoadedDocument {
    /// The owning project's authorization view; standalone documents are rejected.
    pub fn project_snapshot(&self) -> Result<MembershipSnapshot> {
        self.membership
            .as_ref()
            .map(MembershipSnapshot::from)
            .ok_or_else(|| AppError::bad_request("The document is not part of a project"))
    }
}

pub async fn load(conn: &mut SqliteConnection, key: &str) -> Result<LoadedDocument> {
    let document = db::documents::find(&mut *conn, key)
        .await?
        .ok_or_else(|| AppError::not_found("Document not found"))?;
    let membership = match &document.project_id {
        Some(project_id) => db::projects::find_membership(&mut *conn, project_id).await?,
        None => None,
    };
    Ok(LoadedDocument {
        document,
        membership,
    })
}

#[derive(Debug, Serialize)]
pub struct DocumentView {
    #[serde(flatten)]
    pub document: Document,
    pub project: Option<ProjectSummary>,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct Created {
    pub id: String,
    pub slug: String,
}

pub async fn get_document(
    pool: &SqlitePool,
    key: &str,
    requester: Option<&str>,
) -> Result<DocumentView> {
    let mut conn = pool.acquire().await?;
    let loaded = load(&mut conn, key).await?;

    let Some(membership) = &loaded.membership else {
        // Standalone documents are public to everyone.
        return Ok(DocumentView {
            document: loaded.document,
            project: None,
            role: Role::Guest,
        });
    };

    let role = access::require_view(&MembershipSnapshot::from(membership), requester)?;
    let project = ProjectSummary {
        id: membership.project.id.clone(),
        name: membership.project.name.clone(),
        slug: membership.project.slug.clone(),
    };
    Ok(DocumentView {
        document: loaded.document,
        project: Some(project),
        role,
    })
}

pub fn new_document(project_id: Option<&str>, name: &str, content: &str, view_only: bool) -> Document {
    let now = db::now();
    Document {
        id: db::new_id(),
        slug: db::new_slug(),
        project_id: project_id.map(str::to_string),
        name: name.to_string(),
        content: content.to_string(),
        view_only,
        created_at: now.clone(),
        updated_at: now,
    }
}

/// Creates a view-only document outside of any project. Anyone may do this.
pub async fn create_standalone(pool: &SqlitePool, name: &str, content: &str) -> Result<Created> {
    validate_name("Name", name)?;
    if content.is_empty() {
        return Err(AppError::bad_request("Content must not be empty"));
    }

    let document = new_document(None, name, content, true);
    db::documents::insert(&mut *pool.acquire().await?, &document).await?;

    tracing::info!(document_id = %document.id, "standalone document created");
    Ok(Created {
        id: document.id,
        slug: document.slug,
    })
}

pub async fn create_in_project(
    pool: &SqlitePool,
    project_id: &str,
    requester: &str,
    name: &str,
) -> Result<Created> {
    validate_name("Document name", name)?;
    let mut conn = pool.acquire().await?;

    let project = db::projects::find(&mut conn, project_id)
        .await?
        .ok_or_else(|| AppError::not_found("Project not found"))?;
    if project.owner_id != requester {
        return Err(AppError::unauthorized("Only the owner can add documents"));
    }

    let document = new_document(Some(&project.id), name, "", false);
    db::documents::insert(&mut conn, &document).await?;
    Ok(Created {
        id: document.id,
        slug: document.slug,
    })
}

/// Saves name and/or content. Last write wins.
pub async fn update_document(
    pool: &SqlitePool,
    document_id: &str,
    requester: &str,
    name: Option<&str>,
    content: Option<&str>,
) -> Result<()> {
    if let Some(name) = name {
        validate_name("Name", name)?;
    }
    let mut conn = pool.acquire().await?;
    let loaded = load(&mut conn, document_id).await?;

    access::require_edit(&loaded.project_snapshot()?, requester)?;
    if loaded.document.view_only {
        return Err(AppError::bad_request("The document is view only."));
    }
    if loaded.membership.as_ref().is_some_and(|m| m.project.view_only) {
        return Err(AppError::bad_request("The project is view only."));
    }

    db::documents::update(&mut conn, &loaded.document.id, name, content, &db::now()).await?;
    Ok(())
}

pub async fn delete_document(pool: &SqlitePool, document_id: &str, requester: &str) -> Result<()> {
    let mut conn = pool.acquire().await?;
    let loaded = load(&mut conn, document_id).await?;

    access::require_edit(&loaded.project_snapshot()?, requester)?;

    db::documents::delete(&mut conn, &loaded.document.id).await?;
    tracing::info!(document_id = %loaded.document.id, "document deleted");
    Ok(())
}

/// Copies the document into a new public project owned by the requester, pinned there.
///
/// The source is read before the write transaction starts; the copy reflects the
/// document as it was at that moment.
pub async fn fork(pool: &SqlitePool, document_id: &str, requester: &str) -> Result<Created> {
    let loaded = load(&mut *pool.acquire().await?, document_id).await?;
    if let Some(membership) = &loaded.membership {
        access::require_view(&MembershipSnapshot::from(membership), Some(requester))?;
    }

    let now = db::now();
    let project = Project {
        id: db::new_id(),
        slug: db::new_slug(),
        name: format!("{} - forked", loaded.document.name),
        owner_id: requester.to_string(),
        public: true,
        view_only: false,
        pinned_document_id: None,
        created_at: now.clone(),
        updated_at: now,
    };
    let document = new_document(
        Some(&project.id),
        &loaded.document.name,
        &loaded.document.content,
        false,
    );

    let mut tx = pool.begin().await?;
    db::projects::insert(&mut tx, &project).await?;
    db::documents::insert(&mut tx, &document).await?;
    db::projects::set_pinned(&mut tx, &project.id, &document.id).await?;
    tx.commit().await?;

    tracing::info!(source = %loaded.document.id, project_id = %project.id, "document forked");
    Ok(Created {
        id: project.id,
        slug: project.slug,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{seed_document, seed_project, seed_user, Fixture};
    use crate::db::models::MemberRole;

    #[tokio::test]
    async fn standalone_documents_are_guest_viewable_and_immutable() {
        let fx = Fixture::new().await;
        let alice = seed_user(&fx, "alice").await;
        let created = create_standalone(&fx.db.pool, "snippet", "fn main() {}").await.unwrap();

        let view = get_document(&fx.db.pool, &created.slug, None).await.unwrap();
        assert_eq!(view.role, Role::Guest);
        assert!(view.document.view_only);
        assert!(view.project.is_none());

        let err = update_document(&fx.db.pool, &created.id, &alice, None, Some("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn private_document_is_hidden_from_strangers() {
        let fx = Fixture::new().await;
        let owner = seed_user(&fx, "owner").await;
        let stranger = seed_user(&fx, "stranger").await;
        let project = seed_project(&fx, &owner, false).await;
        let doc = seed_document(&fx, Some(&project), "secret").await;

        assert!(matches!(
            get_document(&fx.db.pool, &doc, Some(&stranger)).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            get_document(&fx.db.pool, &doc, None).await,
            Err(AppError::Unauthorized(_))
        ));
        let view = get_document(&fx.db.pool, &doc, Some(&owner)).await.unwrap();
        assert_eq!(view.role, Role::Owner);
    }

    #[tokio::test]
    async fn viewers_cannot_save_and_view_only_blocks_editors() {
        let fx = Fixture::new().await;
        let owner = seed_user(&fx, "owner").await;
        let ed = seed_user(&fx, "ed").await;
        let vi = seed_user(&fx, "vi").await;
        let project = seed_project(&fx, &owner, true).await;
        let doc = seed_document(&fx, Some(&project), "").await;
        {
            let mut conn = fx.conn().await;
            db::projects::upsert_member(&mut conn, &project, &ed, MemberRole::Editor).await.unwrap();
            db::projects::upsert_member(&mut conn, &project, &vi, MemberRole::Viewer).await.unwrap();
        }

        assert!(matches!(
            update_document(&fx.db.pool, &doc, &vi, None, Some("x")).await,
            Err(AppError::Unauthorized(_))
        ));
        update_document(&fx.db.pool, &doc, &ed, Some("renamed"), Some("x")).await.unwrap();
        let view = get_document(&fx.db.pool, &doc, Some(&vi)).await.unwrap();
        assert_eq!(view.document.content, "x");
        assert_eq!(view.document.name, "renamed");
        assert_eq!(view.role, Role::Viewer);

        sqlx::query("UPDATE documents SET view_only = 1 WHERE id = ?")
            .bind(&doc)
            .execute(&fx.db.pool)
            .await
            .unwrap();
        assert!(matches!(
            update_document(&fx.db.pool, &doc, &ed, None, Some("y")).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn fork_copies_content_into_new_project() {
        let fx = Fixture::new().await;
        let owner = seed_user(&fx, "owner").await;
        let other = seed_user(&fx, "other").await;
        let project = seed_project(&fx, &owner, true).await;
        let doc = seed_document(&fx, Some(&project), "hello").await;

        let forked = fork(&fx.db.pool, &doc, &other).await.unwrap();
        let membership = db::projects::find_membership(&mut *fx.conn().await, &forked.slug)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(membership.project.owner_id, other);
        assert_eq!(membership.project.name, "notes - forked");

        let docs = db::documents::list_for_project(&mut *fx.conn().await, &forked.id, 10)
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(membership.project.pinned_document_id.as_deref(), Some(docs[0].id.as_str()));
        let copy = get_document(&fx.db.pool, &docs[0].id, Some(&other)).await.unwrap();
        assert_eq!(copy.document.content, "hello");
        assert_eq!(copy.role, Role::Owner);
    }

    #[tokio::test]
    async fn fork_requires_view_access() {
        let fx = Fixture::new().await;
        let owner = seed_user(&fx, "owner").await;
        let other = seed_user(&fx, "other").await;
        let project = seed_project(&fx, &owner, false).await;
        let doc = seed_document(&fx, Some(&project), "hello").await;

        assert!(matches!(
            fork(&fx.db.pool, &doc, &other).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn delete_requires_edit_access() {
        let fx = Fixture::new().await;
        let owner = seed_user(&fx, "owner").await;
        let other = seed_user(&fx, "other").await;
        let project = seed_project(&fx, &owner, true).await;
        let doc = seed_document(&fx, Some(&project), "").await;

        assert!(delete_document(&fx.db.pool, &doc, &other).await.is_err());
        delete_document(&fx.db.pool, &doc, &owner).await.unwrap();
        assert!(matches!(
            get_document(&fx.db.pool, &doc, Some(&owner)).await,
            Err(AppError::NotFound(_))
        ));
    }
}

//! Append-only document history.
//!
//! Saving is rejected when nothing changed since the latest revision. Reverting is
//! destructive: the target revision and everything created at or after it are
//! deleted in the same transaction that restores the content.

use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::{
    db::{
        self,
        documents::RevisionListing,
        models::{Document, Revision},
    },
    error::{AppError, Result},
    services::{
        access::{self, MembershipSnapshot, Role},
        documents::{self, LoadedDocument},
        validate_name,
    },
};

/// Revisions shown in a document's history list.
pub const REVISION_LIST_LIMIT: i64 = 10;

#[derive(Debug, Serialize)]
pub struct RevisionView {
    pub name: String,
    pub content: String,
    pub created_at: String,
    pub document_name: String,
    pub document_slug: String,
    pub project_name: String,
    pub role: Role,
}

fn snapshot_of(document: &Document, name: &str) -> Revision {
    Revision {
        id: db::new_id(),
        slug: db::new_slug(),
        document_id: document.id.clone(),
        name: name.to_string(),
        content: document.content.clone(),
        created_at: db::now(),
    }
}

fn require_owner(loaded: &LoadedDocument, requester: &str) -> Result<()> {
    access::require_owner(&loaded.project_snapshot()?, requester)
}

/// Opens a transaction that already holds the write lock and loads the document in it.
async fn load_for_write(
    pool: &SqlitePool,
    document_id: &str,
) -> Result<(Transaction<'static, Sqlite>, LoadedDocument)> {
    let mut tx = pool.begin().await?;
    if !db::documents::lock(&mut tx, document_id).await? {
        return Err(AppError::not_found("Document not found"));
    }
    let loaded = documents::load(&mut tx, document_id).await?;
    Ok((tx, loaded))
}

pub async fn save_revision(
    pool: &SqlitePool,
    document_id: &str,
    requester: &str,
    label: &str,
) -> Result<()> {
    validate_name("Revision name", label)?;

    let (mut tx, loaded) = load_for_write(pool, document_id).await?;
    access::require_edit(&loaded.project_snapshot()?, requester)?;

    let latest = db::documents::latest_revision(&mut tx, &loaded.document.id).await?;
    if latest.is_some_and(|r| r.content == loaded.document.content) {
        return Err(AppError::bad_request(
            "Content is the same as the last revision.",
        ));
    }

    let revision = snapshot_of(&loaded.document, label);
    db::documents::insert_revision(&mut tx, &revision).await?;
    tx.commit().await?;

    tracing::info!(document_id = %loaded.document.id, revision_id = %revision.id, "revision saved");
    Ok(())
}

/// Owner snapshot labelled with the document's own name; no duplicate check.
pub async fn publish(pool: &SqlitePool, document_id: &str, requester: &str) -> Result<()> {
    let (mut tx, loaded) = load_for_write(pool, document_id).await?;
    require_owner(&loaded, requester)?;

    let revision = snapshot_of(&loaded.document, &loaded.document.name);
    db::documents::insert_revision(&mut tx, &revision).await?;
    tx.commit().await?;

    tracing::info!(document_id = %loaded.document.id, revision_id = %revision.id, "document published");
    Ok(())
}

/// Restores the document to `revision_id` and drops that revision and every later one.
///
/// Revisions sharing the target's timestamp are deleted with it.
pub async fn revert_document(
    pool: &SqlitePool,
    document_id: &str,
    revision_id: &str,
    content_only: bool,
    requester: &str,
) -> Result<()> {
    let (mut tx, loaded) = load_for_write(pool, document_id).await?;
    require_owner(&loaded, requester)?;

    let revision = db::documents::find_revision_of(&mut tx, &loaded.document.id, revision_id)
        .await?
        .ok_or_else(|| AppError::bad_request("This revision is not part of the document"))?;

    let name = (!content_only).then_some(revision.name.as_str());
    db::documents::update(
        &mut tx,
        &loaded.document.id,
        name,
        Some(revision.content.as_str()),
        &db::now(),
    )
    .await?;
    let removed =
        db::documents::delete_revisions_since(&mut tx, &loaded.document.id, &revision.created_at)
            .await?;
    tx.commit().await?;

    tracing::info!(
        document_id = %loaded.document.id,
        %revision_id,
        removed,
        "document reverted"
    );
    Ok(())
}

pub async fn list_revisions(
    pool: &SqlitePool,
    document_id: &str,
    requester: Option<&str>,
) -> Result<Vec<RevisionListing>> {
    let mut conn = pool.acquire().await?;
    let loaded = documents::load(&mut conn, document_id).await?;
    access::require_view(&loaded.project_snapshot()?, requester)?;

    Ok(db::documents::list_revisions(&mut conn, &loaded.document.id, REVISION_LIST_LIMIT).await?)
}

pub async fn get_revision(
    pool: &SqlitePool,
    slug: &str,
    requester: Option<&str>,
) -> Result<RevisionView> {
    let mut conn = pool.acquire().await?;
    let revision = db::documents::find_revision_by_slug(&mut conn, slug)
        .await?
        .ok_or_else(|| AppError::not_found("Revision not found"))?;
    let loaded = documents::load(&mut conn, &revision.document_id).await?;
    let membership = loaded
        .membership
        .as_ref()
        .ok_or_else(|| AppError::bad_request("Document does not belong to a project."))?;
    let role = access::require_view(&MembershipSnapshot::from(membership), requester)?;

    Ok(RevisionView {
        name: revision.name,
        content: revision.content,
        created_at: revision.created_at,
        document_name: loaded.document.name.clone(),
        document_slug: loaded.document.slug.clone(),
        project_name: membership.project.name.clone(),
        role,
    })
}

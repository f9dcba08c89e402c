use serde::Serialize;
use sqlx::SqliteConnection;

use super::models::{Document, Revision};

const DOCUMENT_COLUMNS: &str =
    "id, slug, project_id, name, content, view_only, created_at, updated_at";
const REVISION_COLUMNS: &str = "id, slug, document_id, name, content, created_at";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DocumentListing {
    pub id: String,
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PinnedDocument {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RevisionListing {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub created_at: String,
}

pub async fn insert(conn: &mut SqliteConnection, document: &Document) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO documents (id, slug, project_id, name, content, view_only, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&document.id)
    .bind(&document.slug)
    .bind(&document.project_id)
    .bind(&document.name)
    .bind(&document.content)
    .bind(document.view_only)
    .bind(&document.created_at)
    .bind(&document.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Looks a document up by id or slug.
pub async fn find(conn: &mut SqliteConnection, key: &str) -> sqlx::Result<Option<Document>> {
    sqlx::query_as::<_, Document>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ? OR slug = ?"
    ))
    .bind(key)
    .bind(key)
    .fetch_optional(conn)
    .await
}

/// Takes SQLite's write lock without changing the row; see [`super::projects::lock`].
pub async fn lock(conn: &mut SqliteConnection, key: &str) -> sqlx::Result<bool> {
    let result = sqlx::query("UPDATE documents SET updated_at = updated_at WHERE id = ? OR slug = ?")
        .bind(key)
        .bind(key)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Overwrites name and/or content. No version check: the last writer wins.
pub async fn update(
    conn: &mut SqliteConnection,
    document_id: &str,
    name: Option<&str>,
    content: Option<&str>,
    at: &str,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE documents
        SET name = COALESCE(?, name), content = COALESCE(?, content), updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(name)
    .bind(content)
    .bind(at)
    .bind(document_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn delete(conn: &mut SqliteConnection, document_id: &str) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(document_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn list_for_project(
    conn: &mut SqliteConnection,
    project_id: &str,
    limit: i64,
) -> sqlx::Result<Vec<DocumentListing>> {
    sqlx::query_as::<_, DocumentListing>(
        "SELECT id, slug, name FROM documents WHERE project_id = ? ORDER BY name ASC LIMIT ?",
    )
    .bind(project_id)
    .bind(limit)
    .fetch_all(conn)
    .await
}

pub async fn find_pinned(
    conn: &mut SqliteConnection,
    project_id: &str,
) -> sqlx::Result<Option<PinnedDocument>> {
    sqlx::query_as::<_, PinnedDocument>(
        r#"
        SELECT d.id, d.slug, d.name, d.content
        FROM projects p
        JOIN documents d ON d.id = p.pinned_document_id
        WHERE p.id = ?
        "#,
    )
    .bind(project_id)
    .fetch_optional(conn)
    .await
}

pub async fn insert_revision(conn: &mut SqliteConnection, revision: &Revision) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO revisions (id, slug, document_id, name, content, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&revision.id)
    .bind(&revision.slug)
    .bind(&revision.document_id)
    .bind(&revision.name)
    .bind(&revision.content)
    .bind(&revision.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn latest_revision(
    conn: &mut SqliteConnection,
    document_id: &str,
) -> sqlx::Result<Option<Revision>> {
    sqlx::query_as::<_, Revision>(&format!(
        "SELECT {REVISION_COLUMNS} FROM revisions WHERE document_id = ? ORDER BY created_at DESC, rowid DESC LIMIT 1"
    ))
    .bind(document_id)
    .fetch_optional(conn)
    .await
}

/// Finds a revision only if it belongs to the given document.
pub async fn find_revision_of(
    conn: &mut SqliteConnection,
    document_id: &str,
    revision_id: &str,
) -> sqlx::Result<Option<Revision>> {
    sqlx::query_as::<_, Revision>(&format!(
        "SELECT {REVISION_COLUMNS} FROM revisions WHERE id = ? AND document_id = ?"
    ))
    .bind(revision_id)
    .bind(document_id)
    .fetch_optional(conn)
    .await
}

pub async fn find_revision_by_slug(
    conn: &mut SqliteConnection,
    slug: &str,
) -> sqlx::Result<Option<Revision>> {
    sqlx::query_as::<_, Revision>(&format!(
        "SELECT {REVISION_COLUMNS} FROM revisions WHERE slug = ?"
    ))
    .bind(slug)
    .fetch_optional(conn)
    .await
}

/// Deletes every revision of the document created at or after `since`.
pub async fn delete_revisions_since(
    conn: &mut SqliteConnection,
    document_id: &str,
    since: &str,
) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM revisions WHERE document_id = ? AND created_at >= ?")
        .bind(document_id)
        .bind(since)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

pub async fn list_revisions(
    conn: &mut SqliteConnection,
    document_id: &str,
    limit: i64,
) -> sqlx::Result<Vec<RevisionListing>> {
    sqlx::query_as::<_, RevisionListing>(
        r#"
        SELECT id, slug, name, created_at FROM revisions
        WHERE document_id = ?
        ORDER BY created_at DESC, rowid DESC
        LIMIT ?
        "#,
    )
    .bind(document_id)
    .bind(limit)
    .fetch_all(conn)
    .await
}

use sqlx::SqliteConnection;

use super::models::{
    Member, MemberRole, PendingInvitation, Project, ProjectMembership, ProjectSummary, UserRef,
};

const PROJECT_COLUMNS: &str =
    "id, slug, name, owner_id, public, view_only, pinned_document_id, created_at, updated_at";

pub async fn insert(conn: &mut SqliteConnection, project: &Project) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO projects
            (id, slug, name, owner_id, public, view_only, pinned_document_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&project.id)
    .bind(&project.slug)
    .bind(&project.name)
    .bind(&project.owner_id)
    .bind(project.public)
    .bind(project.view_only)
    .bind(&project.pinned_document_id)
    .bind(&project.created_at)
    .bind(&project.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Looks a project up by id or slug.
pub async fn find(conn: &mut SqliteConnection, key: &str) -> sqlx::Result<Option<Project>> {
    sqlx::query_as::<_, Project>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ? OR slug = ?"
    ))
    .bind(key)
    .bind(key)
    .fetch_optional(conn)
    .await
}

/// Loads the project row together with its members and pending invitations.
pub async fn find_membership(
    conn: &mut SqliteConnection,
    key: &str,
) -> sqlx::Result<Option<ProjectMembership>> {
    let Some(project) = find(&mut *conn, key).await? else {
        return Ok(None);
    };

    let rows = sqlx::query_as::<_, (String, String)>(
        "SELECT user_id, role FROM project_members WHERE project_id = ?",
    )
    .bind(&project.id)
    .fetch_all(&mut *conn)
    .await?;

    let mut members = Vec::with_capacity(rows.len());
    for (user_id, role) in rows {
        match role.parse::<MemberRole>() {
            Ok(role) => members.push(Member { user_id, role }),
            Err(_) => tracing::warn!(project_id = %project.id, %user_id, %role, "ignoring membership row with unknown role"),
        }
    }

    let invitations = sqlx::query_as::<_, (String, String)>(
        "SELECT user_id, role FROM invitations WHERE project_id = ?",
    )
    .bind(&project.id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|(user_id, role)| PendingInvitation { user_id, role })
    .collect();

    Ok(Some(ProjectMembership {
        project,
        members,
        invitations,
    }))
}

/// Takes SQLite's write lock for the surrounding transaction without changing the row.
///
/// Must be the first statement of a read-then-write transaction: a deferred
/// transaction that reads first cannot wait for the lock and fails with
/// `SQLITE_BUSY` instead. Returns false when no project matches `key`.
pub async fn lock(conn: &mut SqliteConnection, key: &str) -> sqlx::Result<bool> {
    let result = sqlx::query("UPDATE projects SET updated_at = updated_at WHERE id = ? OR slug = ?")
        .bind(key)
        .bind(key)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn touch(conn: &mut SqliteConnection, project_id: &str, at: &str) -> sqlx::Result<()> {
    sqlx::query("UPDATE projects SET updated_at = ? WHERE id = ?")
        .bind(at)
        .bind(project_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn rename(conn: &mut SqliteConnection, project_id: &str, name: &str) -> sqlx::Result<()> {
    sqlx::query("UPDATE projects SET name = ? WHERE id = ?")
        .bind(name)
        .bind(project_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn set_view_only(
    conn: &mut SqliteConnection,
    project_id: &str,
    view_only: bool,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE projects SET view_only = ? WHERE id = ?")
        .bind(view_only)
        .bind(project_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn set_pinned(
    conn: &mut SqliteConnection,
    project_id: &str,
    document_id: &str,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE projects SET pinned_document_id = ? WHERE id = ?")
        .bind(document_id)
        .bind(project_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn set_public(
    conn: &mut SqliteConnection,
    project_id: &str,
    public: bool,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE projects SET public = ? WHERE id = ?")
        .bind(public)
        .bind(project_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Inserts the membership, or changes its role when the user is already a member.
pub async fn upsert_member(
    conn: &mut SqliteConnection,
    project_id: &str,
    user_id: &str,
    role: MemberRole,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO project_members (project_id, user_id, role) VALUES (?, ?, ?)
        ON CONFLICT (project_id, user_id) DO UPDATE SET role = excluded.role
        "#,
    )
    .bind(project_id)
    .bind(user_id)
    .bind(role.as_str())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn remove_member(
    conn: &mut SqliteConnection,
    project_id: &str,
    user_id: &str,
) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM project_members WHERE project_id = ? AND user_id = ?")
        .bind(project_id)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Members holding `role`, ordered by display name.
pub async fn members_with_role(
    conn: &mut SqliteConnection,
    project_id: &str,
    role: MemberRole,
) -> sqlx::Result<Vec<UserRef>> {
    sqlx::query_as::<_, UserRef>(
        r#"
        SELECT u.id, u.display_name
        FROM project_members pm
        JOIN users u ON u.id = pm.user_id
        WHERE pm.project_id = ? AND pm.role = ?
        ORDER BY u.display_name ASC
        "#,
    )
    .bind(project_id)
    .bind(role.as_str())
    .fetch_all(conn)
    .await
}

pub async fn summary(
    conn: &mut SqliteConnection,
    project_id: &str,
) -> sqlx::Result<Option<ProjectSummary>> {
    sqlx::query_as::<_, ProjectSummary>("SELECT id, name, slug FROM projects WHERE id = ?")
        .bind(project_id)
        .fetch_optional(conn)
        .await
}

pub async fn list_owned(
    conn: &mut SqliteConnection,
    user_id: &str,
    public_only: bool,
) -> sqlx::Result<Vec<Project>> {
    sqlx::query_as::<_, Project>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects WHERE owner_id = ? AND (public = 1 OR ? = 0) ORDER BY name ASC"
    ))
    .bind(user_id)
    .bind(public_only)
    .fetch_all(conn)
    .await
}

/// Projects where the user holds the given membership role.
pub async fn list_with_role(
    conn: &mut SqliteConnection,
    user_id: &str,
    role: MemberRole,
    public_only: bool,
) -> sqlx::Result<Vec<Project>> {
    sqlx::query_as::<_, Project>(
        r#"
        SELECT p.id, p.slug, p.name, p.owner_id, p.public, p.view_only, p.pinned_document_id,
               p.created_at, p.updated_at
        FROM projects p
        JOIN project_members pm ON p.id = pm.project_id
        WHERE pm.user_id = ? AND pm.role = ? AND (p.public = 1 OR ? = 0)
        ORDER BY p.name ASC
        "#,
    )
    .bind(user_id)
    .bind(role.as_str())
    .bind(public_only)
    .fetch_all(conn)
    .await
}

use serde::Serialize;
use sqlx::SqliteConnection;

use super::models::MemberRole;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProjectInvitation {
    pub display_name: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct InboxInvitation {
    pub project_id: String,
    pub user_id: String,
    pub role: String,
    pub project_name: String,
}

/// At most one invitation exists per (project, user); a second offer replaces the role.
pub async fn upsert(
    conn: &mut SqliteConnection,
    project_id: &str,
    user_id: &str,
    role: MemberRole,
    at: &str,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO invitations (project_id, user_id, role, created_at) VALUES (?, ?, ?, ?)
        ON CONFLICT (project_id, user_id) DO UPDATE SET role = excluded.role
        "#,
    )
    .bind(project_id)
    .bind(user_id)
    .bind(role.as_str())
    .bind(at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Deletes the invitation and hands back the role it carried, if it existed.
pub async fn take(
    conn: &mut SqliteConnection,
    project_id: &str,
    user_id: &str,
) -> sqlx::Result<Option<String>> {
    sqlx::query_scalar::<_, String>(
        "DELETE FROM invitations WHERE project_id = ? AND user_id = ? RETURNING role",
    )
    .bind(project_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await
}

pub async fn list_for_project(
    conn: &mut SqliteConnection,
    project_id: &str,
    limit: i64,
) -> sqlx::Result<Vec<ProjectInvitation>> {
    sqlx::query_as::<_, ProjectInvitation>(
        r#"
        SELECT u.display_name AS display_name, i.role AS role
        FROM invitations i
        JOIN users u ON i.user_id = u.id
        WHERE i.project_id = ?
        ORDER BY i.created_at ASC
        LIMIT ?
        "#,
    )
    .bind(project_id)
    .bind(limit)
    .fetch_all(conn)
    .await
}

pub async fn list_for_user(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> sqlx::Result<Vec<InboxInvitation>> {
    sqlx::query_as::<_, InboxInvitation>(
        r#"
        SELECT i.project_id AS project_id, i.user_id AS user_id, i.role AS role, p.name AS project_name
        FROM invitations i
        JOIN projects p ON i.project_id = p.id
        WHERE i.user_id = ?
        ORDER BY i.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(conn)
    .await
}

use sqlx::SqliteConnection;

use super::models::User;

const USER_COLUMNS: &str = "id, email, password_hash, display_name, created_at";

pub async fn insert(conn: &mut SqliteConnection, user: &User) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO users (id, email, password_hash, display_name, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.display_name)
    .bind(&user.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(conn)
        .await
}

pub async fn find_by_email(conn: &mut SqliteConnection, email: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
        .bind(email)
        .fetch_optional(conn)
        .await
}

/// Resolves a display name to a user id.
pub async fn find_id_by_display_name(
    conn: &mut SqliteConnection,
    display_name: &str,
) -> sqlx::Result<Option<String>> {
    sqlx::query_scalar::<_, String>("SELECT id FROM users WHERE display_name = ?")
        .bind(display_name)
        .fetch_optional(conn)
        .await
}

pub async fn set_display_name(
    conn: &mut SqliteConnection,
    user_id: &str,
    display_name: &str,
) -> sqlx::Result<bool> {
    let result = sqlx::query("UPDATE users SET display_name = ? WHERE id = ?")
        .bind(display_name)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Users whose display name starts with `prefix`, compared case-sensitively like
/// the uniqueness constraint. Ordered by display name.
pub async fn find_by_display_name_prefix(
    conn: &mut SqliteConnection,
    prefix: &str,
    limit: i64,
) -> sqlx::Result<Vec<(String, String)>> {
    sqlx::query_as::<_, (String, String)>(
        r#"
        SELECT id, display_name FROM users
        WHERE substr(display_name, 1, length(?)) = ?
        ORDER BY display_name ASC
        LIMIT ?
        "#,
    )
    .bind(prefix)
    .bind(prefix)
    .bind(limit)
    .fetch_all(conn)
    .await
}

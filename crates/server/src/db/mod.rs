pub mod documents;
pub mod invitations;
pub mod models;
pub mod projects;
pub mod users;

use std::{str::FromStr, time::Duration};

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use uuid::Uuid;

/// How long a writer waits for SQLite's write lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        // Ensure the data directory exists
        if let Some(path) = url.strip_prefix("sqlite:") {
            let path = path.split('?').next().unwrap_or(path);
            if let Some(parent) = std::path::Path::new(path).parent() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// A migrated database living in a single in-memory connection.
    #[cfg(test)]
    pub async fn in_memory() -> Self {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        let db = Self { pool };
        db.run_migrations().await.expect("migrations");
        db
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Timestamps are stored as fixed-width RFC 3339 text so that string order is time order.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now() -> String {
    timestamp(Utc::now())
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Short URL-friendly identifier used for project, document and revision slugs.
pub fn new_slug() -> String {
    let mut slug = Uuid::new_v4().simple().to_string();
    slug.truncate(12);
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_sort_lexicographically() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 5).unwrap();
        let later = early + chrono::Duration::microseconds(1);
        let (a, b) = (timestamp(early), timestamp(later));
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(a, "2024-01-01T12:00:05.000000Z");
    }

    #[test]
    fn slugs_are_short_and_distinct() {
        let (a, b) = (new_slug(), new_slug());
        assert_eq!(a.len(), 12);
        assert_ne!(a, b);
    }
}

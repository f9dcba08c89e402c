//! Store-backed fixtures shared by the service tests.

use sqlx::{pool::PoolConnection, Sqlite};
use tempfile::TempDir;

use crate::db::{
    self,
    models::{Document, Project, User},
    Database,
};

pub struct Fixture {
    pub db: Database,
}

impl Fixture {
    pub async fn new() -> Self {
        Self {
            db: Database::in_memory().await,
        }
    }

    /// A migrated database in a temporary file behind a multi-connection pool, for
    /// tests that need real concurrent writers. Keep the directory alive for the test.
    pub async fn file_backed() -> (Self, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("snipshare.db").display());
        let db = Database::connect(&url).await.unwrap();
        db.run_migrations().await.unwrap();
        (Self { db }, dir)
    }

    pub async fn conn(&self) -> PoolConnection<Sqlite> {
        self.db.pool.acquire().await.unwrap()
    }
}

/// Inserts a user whose display name and email are derived from `name`; returns the id.
pub async fn seed_user(fx: &Fixture, name: &str) -> String {
    let user = User {
        id: db::new_id(),
        email: format!("{name}@example.com"),
        password_hash: "unused".into(),
        display_name: Some(name.to_string()),
        created_at: db::now(),
    };
    db::users::insert(&mut *fx.conn().await, &user).await.unwrap();
    user.id
}

pub async fn seed_project(fx: &Fixture, owner_id: &str, public: bool) -> String {
    let now = db::now();
    let project = Project {
        id: db::new_id(),
        slug: db::new_slug(),
        name: "Scratch".into(),
        owner_id: owner_id.to_string(),
        public,
        view_only: false,
        pinned_document_id: None,
        created_at: now.clone(),
        updated_at: now,
    };
    db::projects::insert(&mut *fx.conn().await, &project).await.unwrap();
    project.id
}

pub async fn seed_document(fx: &Fixture, project_id: Option<&str>, content: &str) -> String {
    let now = db::now();
    let document = Document {
        id: db::new_id(),
        slug: db::new_slug(),
        project_id: project_id.map(str::to_string),
        name: "notes".into(),
        content: content.to_string(),
        view_only: false,
        created_at: now.clone(),
        updated_at: now,
    };
    db::documents::insert(&mut *fx.conn().await, &document).await.unwrap();
    document.id
}

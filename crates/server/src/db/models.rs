use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub owner_id: String,
    pub public: bool,
    /// Locks every document of the project against content edits.
    pub view_only: bool,
    pub pinned_document_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
    pub id: String,
    pub slug: String,
    pub project_id: Option<String>,
    pub name: String,
    pub content: String,
    pub view_only: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Revision {
    pub id: String,
    pub slug: String,
    pub document_id: String,
    pub name: String,
    pub content: String,
    pub created_at: String,
}

/// A role a user can hold through a membership row or be offered through an invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberRole {
    Editor,
    Viewer,
}

impl MemberRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MemberRole::Editor => "EDITOR",
            MemberRole::Viewer => "VIEWER",
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl FromStr for MemberRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EDITOR" => Ok(MemberRole::Editor),
            "VIEWER" => Ok(MemberRole::Viewer),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub user_id: String,
    pub role: MemberRole,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInvitation {
    pub user_id: String,
    /// Raw stored role; anything other than EDITOR or VIEWER is a broken row.
    pub role: String,
}

/// Everything the authorization and reconciliation logic needs to know about a project.
#[derive(Debug, Clone)]
pub struct ProjectMembership {
    pub project: Project,
    pub members: Vec<Member>,
    pub invitations: Vec<PendingInvitation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    pub slug: String,
}

/// A user as shown in member lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRef {
    pub id: String,
    pub display_name: Option<String>,
}

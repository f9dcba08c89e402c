//! Bulk invitation reconciliation.
//!
//! The owner submits the roles they want a set of users to end up with. Each user's
//! current standing in the project is compared against that target and turned into
//! at most one mutation; the whole batch is then written in one transaction.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    db::{
        self,
        models::{MemberRole, ProjectMembership},
    },
    error::{AppError, Result},
};

/// Role requested for an invitee. `None` disconnects them from the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetRole {
    Viewer,
    Editor,
    None,
}

impl TargetRole {
    fn member_role(self) -> Option<MemberRole> {
        match self {
            TargetRole::Viewer => Some(MemberRole::Viewer),
            TargetRole::Editor => Some(MemberRole::Editor),
            TargetRole::None => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Invitee {
    pub display_name: String,
    pub role: TargetRole,
}

/// Where a user currently stands in a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing {
    Member(MemberRole),
    /// Pending invitation; `None` when the stored role is unreadable.
    Invited(Option<MemberRole>),
    Outsider,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "role", rename_all = "snake_case")]
pub enum Change {
    Promote,
    Demote,
    RemoveMember,
    /// Create the invitation, or rewrite the role of the pending one.
    Invite(MemberRole),
    RevokeInvitation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mutation {
    pub user_id: String,
    pub change: Change,
}

/// The single-user state transition. `None` means the user already stands where requested.
pub fn transition(standing: Standing, target: TargetRole) -> Option<Change> {
    use MemberRole::{Editor, Viewer};

    match (standing, target) {
        (Standing::Member(Editor), TargetRole::Viewer) => Some(Change::Demote),
        (Standing::Member(Viewer), TargetRole::Editor) => Some(Change::Promote),
        (Standing::Member(_), TargetRole::None) => Some(Change::RemoveMember),
        (Standing::Member(_), _) => None,

        (Standing::Invited(_), TargetRole::None) => Some(Change::RevokeInvitation),
        (Standing::Invited(current), target) => {
            let wanted = target.member_role()?;
            (current != Some(wanted)).then_some(Change::Invite(wanted))
        }

        (Standing::Outsider, target) => target.member_role().map(Change::Invite),
    }
}

pub fn standing_of(membership: &ProjectMembership, user_id: &str) -> Standing {
    if let Some(member) = membership.members.iter().find(|m| m.user_id == user_id) {
        return Standing::Member(member.role);
    }
    match membership.invitations.iter().find(|i| i.user_id == user_id) {
        Some(invitation) => Standing::Invited(invitation.role.parse().ok()),
        None => Standing::Outsider,
    }
}

/// Computes the mutations needed to move every resolved invitee to its target role.
pub fn plan(membership: &ProjectMembership, targets: &[(String, TargetRole)]) -> Vec<Mutation> {
    targets
        .iter()
        .filter_map(|(user_id, target)| {
            transition(standing_of(membership, user_id), *target).map(|change| Mutation {
                user_id: user_id.clone(),
                change,
            })
        })
        .collect()
}

fn ensure_unique_names(invitees: &[Invitee]) -> Result<()> {
    let mut seen = HashSet::with_capacity(invitees.len());
    if invitees.iter().all(|i| seen.insert(i.display_name.as_str())) {
        Ok(())
    } else {
        Err(AppError::bad_request("Duplicate invitees"))
    }
}

async fn apply(conn: &mut SqliteConnection, project_id: &str, mutation: &Mutation) -> Result<()> {
    let user_id = mutation.user_id.as_str();
    match mutation.change {
        Change::Promote => {
            db::projects::upsert_member(conn, project_id, user_id, MemberRole::Editor).await?
        }
        Change::Demote => {
            db::projects::upsert_member(conn, project_id, user_id, MemberRole::Viewer).await?
        }
        Change::RemoveMember => {
            db::projects::remove_member(conn, project_id, user_id).await?;
        }
        Change::Invite(role) => {
            db::invitations::upsert(conn, project_id, user_id, role, &db::now()).await?
        }
        Change::RevokeInvitation => {
            db::invitations::take(conn, project_id, user_id).await?;
        }
    }
    Ok(())
}

/// Reconciles the project's membership against the requested invitee roles.
///
/// Only the owner may call this. Display names that match no user are skipped. The
/// returned plan lists what was written; applying the same request again yields an
/// empty plan.
pub async fn invite(
    pool: &SqlitePool,
    project_id: &str,
    requester: &str,
    invitees: &[Invitee],
) -> Result<Vec<Mutation>> {
    ensure_unique_names(invitees)?;

    let mut tx = pool.begin().await?;

    // Write lock first: concurrent reconciliations of one project then queue up
    // instead of planning against the same membership.
    if !db::projects::lock(&mut *tx, project_id).await? {
        return Err(AppError::not_found("Project not found"));
    }
    let membership = db::projects::find_membership(&mut *tx, project_id)
        .await?
        .ok_or_else(|| AppError::not_found("Project not found"))?;
    let project = &membership.project;
    if project.owner_id != requester {
        tracing::debug!(%project_id, %requester, "non-owner attempted to invite");
        return Err(AppError::unauthorized("Only the owner can invite"));
    }
    db::projects::touch(&mut *tx, &project.id, &db::now()).await?;

    let mut targets = Vec::with_capacity(invitees.len());
    for invitee in invitees {
        let Some(user_id) =
            db::users::find_id_by_display_name(&mut *tx, &invitee.display_name).await?
        else {
            tracing::debug!(display_name = %invitee.display_name, "skipping unknown invitee");
            continue;
        };
        if user_id == project.owner_id {
            return Err(AppError::bad_request(
                "The project owner's role cannot be changed",
            ));
        }
        targets.push((user_id, invitee.role));
    }

    let mutations = plan(&membership, &targets);
    for mutation in &mutations {
        apply(&mut *tx, &project.id, mutation).await?;
    }
    tx.commit().await?;

    tracing::info!(
        project_id = %project.id,
        mutations = mutations.len(),
        "reconciled project membership"
    );
    Ok(mutations)
}

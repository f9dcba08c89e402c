//! Authorization predicates.
//!
//! Everything here is a pure function of a project's membership snapshot and the
//! optional id of whoever is asking. Callers turn a negative answer into an error.

use serde::{Deserialize, Serialize};

use crate::{
    db::models::{MemberRole, ProjectMembership},
    error::{AppError, Result},
};

/// Authority a requester holds over a project, computed per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Owner,
    Editor,
    Viewer,
    /// Not a member, but the resource is public.
    Guest,
    None,
}

impl Role {
    pub fn can_view(self) -> bool {
        !matches!(self, Role::None)
    }

    pub fn can_edit(self) -> bool {
        matches!(self, Role::Owner | Role::Editor)
    }

    pub fn is_owner(self) -> bool {
        matches!(self, Role::Owner)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipSnapshot {
    pub public: bool,
    pub owner_id: String,
    pub editors: Vec<String>,
    pub viewers: Vec<String>,
}

impl From<&ProjectMembership> for MembershipSnapshot {
    fn from(membership: &ProjectMembership) -> Self {
        let mut snapshot = MembershipSnapshot {
            public: membership.project.public,
            owner_id: membership.project.owner_id.clone(),
            ..Default::default()
        };
        for member in &membership.members {
            match member.role {
                MemberRole::Editor => snapshot.editors.push(member.user_id.clone()),
                MemberRole::Viewer => snapshot.viewers.push(member.user_id.clone()),
            }
        }
        snapshot
    }
}

fn contains(ids: &[String], requester: &str) -> bool {
    ids.iter().any(|id| id == requester)
}

pub fn is_view_authorized(snapshot: &MembershipSnapshot, requester: Option<&str>) -> bool {
    if snapshot.public {
        return true;
    }
    let Some(requester) = requester else {
        return false;
    };
    snapshot.owner_id == requester
        || contains(&snapshot.editors, requester)
        || contains(&snapshot.viewers, requester)
}

/// Owners and editors may edit. Viewers and guests never can, public or not.
pub fn is_edit_authorized(snapshot: &MembershipSnapshot, requester: Option<&str>) -> bool {
    let Some(requester) = requester else {
        return false;
    };
    snapshot.owner_id == requester || contains(&snapshot.editors, requester)
}

/// Checked in precedence order so overlapping sets still resolve deterministically.
pub fn get_authority(snapshot: &MembershipSnapshot, requester: Option<&str>) -> Role {
    if let Some(requester) = requester {
        if snapshot.owner_id == requester {
            return Role::Owner;
        }
        if contains(&snapshot.editors, requester) {
            return Role::Editor;
        }
        if contains(&snapshot.viewers, requester) {
            return Role::Viewer;
        }
    }
    if snapshot.public {
        Role::Guest
    } else {
        Role::None
    }
}

pub fn require_view(snapshot: &MembershipSnapshot, requester: Option<&str>) -> Result<Role> {
    if !is_view_authorized(snapshot, requester) {
        tracing::debug!(?requester, "view denied");
        return Err(AppError::unauthorized("Project is not viewable by requester"));
    }
    Ok(get_authority(snapshot, requester))
}

pub fn require_edit(snapshot: &MembershipSnapshot, requester: &str) -> Result<Role> {
    if !is_edit_authorized(snapshot, Some(requester)) {
        tracing::debug!(%requester, "edit denied");
        return Err(AppError::unauthorized("Requester cannot edit this project"));
    }
    Ok(get_authority(snapshot, Some(requester)))
}

pub fn require_owner(snapshot: &MembershipSnapshot, requester: &str) -> Result<()> {
    if !get_authority(snapshot, Some(requester)).is_owner() {
        tracing::debug!(%requester, "owner check failed");
        return Err(AppError::unauthorized("Only the project owner can do this"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn snapshot(public: bool) -> MembershipSnapshot {
        MembershipSnapshot {
            public,
            owner_id: "owner".into(),
            editors: vec!["ed".into()],
            viewers: vec!["vi".into()],
        }
    }

    #[rstest]
    #[case(false, Some("owner"), Role::Owner)]
    #[case(false, Some("ed"), Role::Editor)]
    #[case(false, Some("vi"), Role::Viewer)]
    #[case(false, Some("stranger"), Role::None)]
    #[case(false, None, Role::None)]
    #[case(true, Some("stranger"), Role::Guest)]
    #[case(true, None, Role::Guest)]
    #[case(true, Some("vi"), Role::Viewer)]
    fn authority_table(
        #[case] public: bool,
        #[case] requester: Option<&str>,
        #[case] expected: Role,
    ) {
        assert_eq!(get_authority(&snapshot(public), requester), expected);
    }

    #[test]
    fn viewers_never_edit_public_projects() {
        let snap = snapshot(true);
        assert!(is_view_authorized(&snap, Some("vi")));
        assert!(!is_edit_authorized(&snap, Some("vi")));
        assert!(!is_edit_authorized(&snap, None));
    }

    #[test]
    fn overlapping_sets_resolve_by_precedence() {
        let snap = MembershipSnapshot {
            public: false,
            owner_id: "x".into(),
            editors: vec!["x".into(), "y".into()],
            viewers: vec!["x".into(), "y".into()],
        };
        assert_eq!(get_authority(&snap, Some("x")), Role::Owner);
        assert_eq!(get_authority(&snap, Some("y")), Role::Editor);
    }

    #[test]
    fn require_helpers_map_to_unauthorized() {
        let snap = snapshot(false);
        assert!(matches!(
            require_view(&snap, Some("stranger")),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            require_edit(&snap, "vi"),
            Err(AppError::Unauthorized(_))
        ));
        assert!(require_owner(&snap, "ed").is_err());
        assert_eq!(require_edit(&snap, "ed").unwrap(), Role::Editor);
    }

    fn arb_snapshot() -> impl Strategy<Value = MembershipSnapshot> {
        let id = "[a-e]";
        (
            any::<bool>(),
            id,
            prop::collection::vec(id, 0..4),
            prop::collection::vec(id, 0..4),
        )
            .prop_map(|(public, owner_id, editors, viewers)| MembershipSnapshot {
                public,
                owner_id,
                editors,
                viewers,
            })
    }

    proptest! {
        #[test]
        fn guards_follow_predicates(snap in arb_snapshot(), requester in "[a-f]") {
            prop_assert_eq!(require_view(&snap, Some(requester.as_str())).is_ok(), is_view_authorized(&snap, Some(requester.as_str())));
            prop_assert_eq!(require_edit(&snap, &requester).is_ok(), is_edit_authorized(&snap, Some(requester.as_str())));
            prop_assert_eq!(require_owner(&snap, &requester).is_ok(), snap.owner_id == requester);
        }

        #[test]
        fn view_iff_public_or_member(snap in arb_snapshot(), requester in proptest::option::of("[a-f]")) {
            let member = requester.as_deref().map_or(false, |r| {
                snap.owner_id == r || snap.editors.iter().any(|e| e == r) || snap.viewers.iter().any(|v| v == r)
            });
            prop_assert_eq!(is_view_authorized(&snap, requester.as_deref()), snap.public || member);
        }

        #[test]
        fn authority_agrees_with_predicates(snap in arb_snapshot(), requester in proptest::option::of("[a-f]")) {
            let role = get_authority(&snap, requester.as_deref());
            prop_assert_eq!(role.can_edit(), is_edit_authorized(&snap, requester.as_deref()));
            prop_assert_eq!(role.can_view(), is_view_authorized(&snap, requester.as_deref()));
        }
    }
}

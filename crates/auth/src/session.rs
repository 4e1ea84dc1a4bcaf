//! Session state as an explicit value.
//!
//! The current session is never a free-floating global: whoever owns it holds
//! a `SessionState` and swaps in a new one when the identity provider reports
//! a change.

use serde::{Deserialize, Serialize};

use panelhub_core::ProfileId;

use crate::{AuthzError, RolePermissions, UserProfile, permissions_for};

/// What the identity provider hands back after authenticating someone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub uid: ProfileId,
    pub email: String,
    pub email_verified: bool,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// "Session changed" broadcast payload.
///
/// Providers may repeat a notification with the same identity, or send
/// `SignedOut` while nobody is signed in; consumers must tolerate both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "identity", rename_all = "snake_case")]
pub enum SessionNotification {
    SignedIn(Identity),
    SignedOut,
}

impl SessionNotification {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionNotification::SignedIn(identity) => Some(identity),
            SessionNotification::SignedOut => None,
        }
    }
}

/// Immutable snapshot of the application's session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Startup, before the provider has reported anything.
    #[default]
    Loading,
    SignedOut,
    SignedIn {
        identity: Identity,
        profile: UserProfile,
    },
}

impl SessionState {
    pub fn signed_in(identity: Identity, profile: UserProfile) -> Self {
        SessionState::SignedIn { identity, profile }
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        match self {
            SessionState::SignedIn { profile, .. } => Some(profile),
            _ => None,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::SignedIn { identity, .. } => Some(identity),
            _ => None,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(self, SessionState::SignedIn { .. })
    }

    /// Same snapshot with the profile replaced (after an update was persisted).
    pub fn with_profile(&self, profile: UserProfile) -> Self {
        match self {
            SessionState::SignedIn { identity, .. } => SessionState::SignedIn {
                identity: identity.clone(),
                profile,
            },
            other => other.clone(),
        }
    }
}

/// First gate: is there a session at all?
///
/// Kept separate from the account-status gate, which deliberately treats an
/// absent profile as passing.
pub fn require_session(session: &SessionState) -> Result<&UserProfile, AuthzError> {
    session.profile().ok_or(AuthzError::NoSession)
}

/// Capabilities of whoever holds the session; all-false without a profile.
pub fn effective_permissions(session: &SessionState) -> RolePermissions {
    session
        .profile()
        .map(|p| permissions_for(p.role))
        .unwrap_or(RolePermissions::none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Capability, Role};
    use chrono::Utc;

    fn identity() -> Identity {
        Identity {
            uid: ProfileId::new("uid-7").unwrap(),
            email: "dean@uni.edu".to_string(),
            email_verified: true,
            display_name: Some("Dean Santos".to_string()),
        }
    }

    fn dean_session() -> SessionState {
        let id = identity();
        let mut profile = UserProfile::first_sign_in(&id, Utc::now());
        profile.role = Role::Dean;
        profile.status = None;
        SessionState::signed_in(id, profile)
    }

    #[test]
    fn loading_and_signed_out_have_no_capabilities() {
        assert!(effective_permissions(&SessionState::Loading).is_empty());
        assert!(effective_permissions(&SessionState::SignedOut).is_empty());
    }

    #[test]
    fn signed_in_session_uses_role_table() {
        let perms = effective_permissions(&dean_session());
        assert!(perms.allows(Capability::ApproveRequest));
        assert!(!perms.allows(Capability::ManageBudget));
    }

    #[test]
    fn require_session_rejects_missing_session() {
        assert_eq!(require_session(&SessionState::SignedOut), Err(AuthzError::NoSession));
        assert_eq!(require_session(&SessionState::Loading), Err(AuthzError::NoSession));
        assert!(require_session(&dean_session()).is_ok());
    }

    #[test]
    fn with_profile_replaces_snapshot_only_when_signed_in() {
        let s = dean_session();
        let mut p = s.profile().unwrap().clone();
        p.display_name = "Acting Dean".to_string();
        let next = s.with_profile(p);
        assert_eq!(next.profile().unwrap().display_name, "Acting Dean");
        assert_eq!(s.profile().unwrap().display_name, "Dean Santos");

        let out = SessionState::SignedOut.with_profile(next.profile().unwrap().clone());
        assert_eq!(out, SessionState::SignedOut);
    }

    #[test]
    fn notification_wire_shape() {
        let json = serde_json::to_value(SessionNotification::SignedOut).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "signed_out" }));
        let n = SessionNotification::SignedIn(identity());
        assert_eq!(n.identity().unwrap().email, "dean@uni.edu");
    }
}

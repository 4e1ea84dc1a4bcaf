use serde::Serialize;
use thiserror::Error;

use crate::{Capability, Gatekeeper, ReasonCode, Role, SessionState, permissions_for, require_session};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("not signed in")]
    NoSession,

    #[error("account blocked: {0}")]
    Blocked(ReasonCode),

    #[error("forbidden: missing capability '{0}'")]
    Forbidden(Capability),
}

/// Action-side authorization contract.
///
/// Implement this on actions that need capabilities; the service layer checks
/// them before doing any work.
pub trait RequiresCapabilities {
    fn required_capabilities(&self) -> &[Capability];
}

/// Authorize one capability for the current session.
///
/// Runs the two gates in order (session present, account allowed to proceed)
/// before the capability lookup.
///
/// - No IO
/// - No panics
pub fn authorize(
    session: &SessionState,
    gate: &Gatekeeper,
    required: Capability,
) -> Result<(), AuthzError> {
    let profile = require_session(session)?;

    if let Some(reason) = gate.classify(Some(profile)).reason_code() {
        return Err(AuthzError::Blocked(reason));
    }

    if permissions_for(profile.role).allows(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required))
    }
}

/// Authorize every capability an action declares.
pub fn authorize_action<A: RequiresCapabilities + ?Sized>(
    session: &SessionState,
    gate: &Gatekeeper,
    action: &A,
) -> Result<(), AuthzError> {
    for cap in action.required_capabilities() {
        authorize(session, gate, *cap)?;
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Why a capability check was granted or denied.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub required: Capability,
    pub granted: bool,
    pub role: Option<Role>,
    pub effective_capabilities: Vec<Capability>,
    pub reason: String,
    /// Roles whose table entry would grant the capability.
    pub granting_roles: Vec<Role>,
}

/// Explain the decision [`authorize`] would make.
pub fn explain_authorization(
    session: &SessionState,
    gate: &Gatekeeper,
    required: Capability,
) -> AuthorizationExplanation {
    let granting_roles: Vec<Role> = Role::ALL
        .into_iter()
        .filter(|r| permissions_for(*r).allows(required))
        .collect();

    let role = session.profile().map(|p| p.role);
    let effective_capabilities = role
        .map(|r| permissions_for(r).granted())
        .unwrap_or_default();

    let (granted, reason) = match authorize(session, gate, required) {
        Ok(()) => (
            true,
            format!(
                "role '{}' grants '{}'",
                role.map(|r| r.as_str()).unwrap_or("-"),
                required
            ),
        ),
        Err(AuthzError::NoSession) => (false, "no signed-in session".to_string()),
        Err(AuthzError::Blocked(code)) => (false, format!("account is blocked ({code})")),
        Err(AuthzError::Forbidden(_)) => (
            false,
            format!(
                "role '{}' does not grant '{}'",
                role.map(|r| r.as_str()).unwrap_or("-"),
                required
            ),
        ),
    };

    AuthorizationExplanation {
        required,
        granted,
        role,
        effective_capabilities,
        reason,
        granting_roles,
    }
}

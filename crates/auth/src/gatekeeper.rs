//! Login gatekeeper: may an authenticated account proceed into the app?
//!
//! The check is a pure function of a profile snapshot. It does not decide
//! whether a session exists; that is [`crate::require_session`]'s job and
//! must run first.

use serde::{Deserialize, Serialize};

use crate::UserProfile;

/// Policy toggles for the optional checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatePolicy {
    /// Block accounts whose email address is not verified yet.
    pub require_email_verification: bool,
    /// Block teacher accounts that are not approved yet.
    pub require_teacher_approval: bool,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            require_email_verification: true,
            require_teacher_approval: true,
        }
    }
}

/// Account state as seen by the gate, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateState {
    EmailNotVerified,
    PendingApproval,
    Suspended,
    Active,
}

/// Corrective action the caller should offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReasonCode {
    VerifyEmail,
    WaitApproval,
    ContactSupport,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::VerifyEmail => "verify-email",
            ReasonCode::WaitApproval => "wait-approval",
            ReasonCode::ContactSupport => "contact-support",
        }
    }

    /// Sentence shown alongside the corrective action.
    pub fn message(&self) -> &'static str {
        match self {
            ReasonCode::VerifyEmail => {
                "Please verify your email address before signing in. Check your inbox for the verification link."
            }
            ReasonCode::WaitApproval => {
                "Your account is pending approval. You will be able to sign in once an administrator approves your account."
            }
            ReasonCode::ContactSupport => {
                "Your account has been suspended. Please contact support for assistance."
            }
        }
    }
}

impl core::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GateState {
    pub fn reason_code(&self) -> Option<ReasonCode> {
        match self {
            GateState::EmailNotVerified => Some(ReasonCode::VerifyEmail),
            GateState::PendingApproval => Some(ReasonCode::WaitApproval),
            GateState::Suspended => Some(ReasonCode::ContactSupport),
            GateState::Active => None,
        }
    }

    pub fn message(&self) -> Option<&'static str> {
        self.reason_code().map(|r| r.message())
    }
}

/// Outcome of [`Gatekeeper::evaluate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateDecision {
    pub can_proceed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<ReasonCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<GateState> for GateDecision {
    fn from(state: GateState) -> Self {
        Self {
            can_proceed: state == GateState::Active,
            reason_code: state.reason_code(),
            message: state.message().map(str::to_string),
        }
    }
}

/// Stateless account-status gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Gatekeeper {
    policy: GatePolicy,
}

impl Gatekeeper {
    pub fn new(policy: GatePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> GatePolicy {
        self.policy
    }

    /// Classify a profile; first matching state wins.
    ///
    /// `None` (no session) classifies as `Active`: absence of a session is
    /// handled upstream, not here.
    pub fn classify(&self, profile: Option<&UserProfile>) -> GateState {
        let Some(profile) = profile else {
            return GateState::Active;
        };

        if self.policy.require_email_verification && !profile.email_verified {
            return GateState::EmailNotVerified;
        }
        if self.policy.require_teacher_approval && !profile.is_approved() {
            return GateState::PendingApproval;
        }
        if profile.is_suspended() {
            return GateState::Suspended;
        }
        GateState::Active
    }

    pub fn evaluate(&self, profile: Option<&UserProfile>) -> GateDecision {
        self.classify(profile).into()
    }
}

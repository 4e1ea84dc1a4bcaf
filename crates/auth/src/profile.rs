//! User profile record and its lifecycle transitions.
//!
//! Profiles are values: every transition takes `&self` and returns the next
//! snapshot, so a reader holding the old one never observes a half-applied
//! change.
//!
//! # Invariants
//! - `id`, `email` and `role` never change after creation.
//! - `status` is only ever present on teacher profiles.
//! - `updated_at` is refreshed by every transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use panelhub_core::{DomainError, DomainResult, ProfileId};

use crate::{Identity, Role};

/// Approval sub-state of a teacher account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeacherStatus {
    #[serde(alias = "pending-approval", alias = "pending")]
    PendingApproval,
    Approved,
}

impl core::fmt::Display for TeacherStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TeacherStatus::PendingApproval => f.write_str("pending_approval"),
            TeacherStatus::Approved => f.write_str("approved"),
        }
    }
}

/// Reserved suspension marker. Presence blocks sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suspension {
    pub reason: String,
    pub since: DateTime<Utc>,
}

/// Stored account record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: ProfileId,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TeacherStatus>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspension: Option<Suspension>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

/// What a user picks on the registration form, beyond credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationDetails {
    pub display_name: String,
    pub role: Role,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// Partial update of the descriptive fields.
///
/// `None` leaves a field untouched. `Some("")` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.department.is_none()
            && self.employee_id.is_none()
            && self.phone_number.is_none()
    }
}

fn initial_status(role: Role) -> Option<TeacherStatus> {
    role.requires_approval().then_some(TeacherStatus::PendingApproval)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn fallback_display_name(identity: &Identity) -> String {
    identity
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            identity
                .email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string()
        })
}

impl UserProfile {
    /// Default record for an identity that has no stored profile yet
    /// (first federated sign-in): a teacher awaiting approval.
    pub fn first_sign_in(identity: &Identity, now: DateTime<Utc>) -> Self {
        Self {
            id: identity.uid.clone(),
            email: identity.email.trim().to_lowercase(),
            display_name: fallback_display_name(identity),
            role: Role::Teacher,
            status: initial_status(Role::Teacher),
            email_verified: identity.email_verified,
            department: None,
            employee_id: None,
            phone_number: None,
            suspension: None,
            created_at: now,
            updated_at: now,
            last_login: now,
        }
    }

    /// Record created by the registration form.
    pub fn register(
        identity: &Identity,
        details: RegistrationDetails,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let display_name = details.display_name.trim().to_string();
        if display_name.is_empty() {
            return Err(DomainError::validation("display name cannot be empty"));
        }

        Ok(Self {
            id: identity.uid.clone(),
            email: identity.email.trim().to_lowercase(),
            display_name,
            role: details.role,
            status: initial_status(details.role),
            email_verified: identity.email_verified,
            department: non_blank(details.department),
            employee_id: non_blank(details.employee_id),
            phone_number: non_blank(details.phone_number),
            suspension: None,
            created_at: now,
            updated_at: now,
            last_login: now,
        })
    }

    /// Whether the approval rule is satisfied.
    ///
    /// Teachers need an explicit `approved` status; a missing status counts as
    /// not approved. Every other role is approved regardless of `status`.
    pub fn is_approved(&self) -> bool {
        if self.role.requires_approval() {
            self.status == Some(TeacherStatus::Approved)
        } else {
            true
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspension.is_some()
    }

    fn touched(&self, now: DateTime<Utc>) -> Self {
        Self {
            updated_at: now,
            ..self.clone()
        }
    }

    /// Move a pending teacher to `approved`.
    pub fn approve(&self, now: DateTime<Utc>) -> DomainResult<Self> {
        if !self.role.requires_approval() {
            return Err(DomainError::invariant(format!(
                "role '{}' has no approval state",
                self.role
            )));
        }
        if self.status == Some(TeacherStatus::Approved) {
            return Err(DomainError::conflict("teacher already approved"));
        }

        Ok(Self {
            status: Some(TeacherStatus::Approved),
            ..self.touched(now)
        })
    }

    /// Apply descriptive edits. Identity fields are not reachable from a patch.
    pub fn with_patch(&self, patch: ProfilePatch, now: DateTime<Utc>) -> DomainResult<Self> {
        let mut next = self.touched(now);

        if let Some(name) = patch.display_name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(DomainError::validation("display name cannot be empty"));
            }
            next.display_name = name;
        }
        if patch.department.is_some() {
            next.department = non_blank(patch.department);
        }
        if patch.employee_id.is_some() {
            next.employee_id = non_blank(patch.employee_id);
        }
        if patch.phone_number.is_some() {
            next.phone_number = non_blank(patch.phone_number);
        }

        Ok(next)
    }

    pub fn record_login(&self, now: DateTime<Utc>) -> Self {
        Self {
            last_login: now,
            ..self.touched(now)
        }
    }

    pub fn with_email_verified(&self, verified: bool, now: DateTime<Utc>) -> Self {
        Self {
            email_verified: verified,
            ..self.touched(now)
        }
    }

    pub fn suspend(&self, reason: impl Into<String>, now: DateTime<Utc>) -> DomainResult<Self> {
        if self.is_suspended() {
            return Err(DomainError::conflict("account already suspended"));
        }
        Ok(Self {
            suspension: Some(Suspension {
                reason: reason.into(),
                since: now,
            }),
            ..self.touched(now)
        })
    }

    pub fn reinstate(&self, now: DateTime<Utc>) -> DomainResult<Self> {
        if !self.is_suspended() {
            return Err(DomainError::conflict("account is not suspended"));
        }
        Ok(Self {
            suspension: None,
            ..self.touched(now)
        })
    }
}

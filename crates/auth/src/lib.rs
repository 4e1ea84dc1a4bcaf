//! `panelhub-auth`: account and role authorization model (pure policy).
//!
//! This crate is decoupled from the identity provider, storage and any UI.
//! Callers supply profile snapshots and session values; everything here is a
//! deterministic function of its inputs.

pub mod authorize;
pub mod gatekeeper;
pub mod permissions;
pub mod profile;
pub mod provider_error;
pub mod roles;
pub mod routes;
pub mod session;
pub mod validation;

pub use authorize::{
    AuthorizationExplanation, AuthzError, RequiresCapabilities, authorize, authorize_action,
    explain_authorization,
};
pub use gatekeeper::{GateDecision, GatePolicy, GateState, Gatekeeper, ReasonCode};
pub use permissions::{
    Capability, RolePermissions, permissions_for, permissions_for_optional, permissions_for_stored,
};
pub use profile::{ProfilePatch, RegistrationDetails, Suspension, TeacherStatus, UserProfile};
pub use provider_error::{FALLBACK_MESSAGE, ProviderError, message_for_code};
pub use roles::{Role, UnknownRole};
pub use routes::{Route, default_route_for, landing_route};
pub use session::{
    Identity, SessionNotification, SessionState, effective_permissions, require_session,
};
pub use validation::{
    Field, FieldError, PasswordRule, RegistrationForm, ValidationErrors, password_violations,
    validate_email, validate_password_reset, validate_registration, validate_sign_in,
};

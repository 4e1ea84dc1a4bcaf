//! Identity provider boundary.
//!
//! Credential checks, session issuance and outbound account emails belong to
//! an external service. This module only states what the application needs
//! from it; failures come back as opaque [`ProviderError`] codes.

pub mod in_memory;

use std::sync::Arc;

use panelhub_auth::{Identity, ProviderError};
use panelhub_core::ProfileId;

pub use in_memory::{InMemoryIdentityProvider, OutboundKind, OutboundMessage};

pub trait IdentityProvider: Send + Sync {
    fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity, ProviderError>;

    /// Popup / federated sign-in. Creates the provider account on first use.
    fn sign_in_federated(
        &self,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<Identity, ProviderError>;

    /// Create a password account; the new account is signed in.
    fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Identity, ProviderError>;

    /// Re-read the provider's view of an account (e.g. after the user clicked
    /// a verification link).
    fn reload(&self, uid: &ProfileId) -> Result<Identity, ProviderError>;

    fn send_password_reset(&self, email: &str) -> Result<(), ProviderError>;

    fn send_email_verification(&self, uid: &ProfileId) -> Result<(), ProviderError>;

    /// Invalidate the local session. Takes effect before this returns.
    fn sign_out(&self) -> Result<(), ProviderError>;
}

impl<P> IdentityProvider for Arc<P>
where
    P: IdentityProvider + ?Sized,
{
    fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity, ProviderError> {
        (**self).sign_in_with_password(email, password)
    }

    fn sign_in_federated(
        &self,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<Identity, ProviderError> {
        (**self).sign_in_federated(email, display_name)
    }

    fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Identity, ProviderError> {
        (**self).create_account(email, password, display_name)
    }

    fn reload(&self, uid: &ProfileId) -> Result<Identity, ProviderError> {
        (**self).reload(uid)
    }

    fn send_password_reset(&self, email: &str) -> Result<(), ProviderError> {
        (**self).send_password_reset(email)
    }

    fn send_email_verification(&self, uid: &ProfileId) -> Result<(), ProviderError> {
        (**self).send_email_verification(uid)
    }

    fn sign_out(&self) -> Result<(), ProviderError> {
        (**self).sign_out()
    }
}

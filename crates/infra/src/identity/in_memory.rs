//! In-process identity provider for tests/dev.
//!
//! Behaves like a hosted auth service from the caller's side: opaque error
//! codes, an attempt limit, and a "session changed" broadcast after every
//! sign-in and sign-out. Passwords are held in memory as given; this type is
//! never a credential store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use tracing::{debug, warn};

use panelhub_auth::{Identity, ProviderError, SessionNotification, validate_email};
use panelhub_core::ProfileId;
use panelhub_events::NotificationBus;

use super::IdentityProvider;

const MIN_PROVIDER_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundKind {
    EmailVerification,
    PasswordReset,
}

/// An email the provider would have sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub kind: OutboundKind,
    pub to: String,
}

#[derive(Debug, Clone)]
struct Account {
    uid: ProfileId,
    email: String,
    password: Option<String>,
    email_verified: bool,
    display_name: Option<String>,
    disabled: bool,
    failed_attempts: u32,
}

impl Account {
    fn identity(&self) -> Identity {
        Identity {
            uid: self.uid.clone(),
            email: self.email.clone(),
            email_verified: self.email_verified,
            display_name: self.display_name.clone(),
        }
    }
}

pub struct InMemoryIdentityProvider<B> {
    bus: B,
    max_failed_sign_ins: u32,
    accounts: RwLock<HashMap<String, Account>>,
    outbox: Mutex<Vec<OutboundMessage>>,
    popups_blocked: AtomicBool,
    offline: AtomicBool,
}

fn unavailable() -> ProviderError {
    ProviderError::Unknown("auth/internal-error".to_string())
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

impl<B> InMemoryIdentityProvider<B>
where
    B: NotificationBus<SessionNotification>,
{
    pub fn new(bus: B, max_failed_sign_ins: u32) -> Self {
        Self {
            bus,
            max_failed_sign_ins,
            accounts: RwLock::new(HashMap::new()),
            outbox: Mutex::new(Vec::new()),
            popups_blocked: AtomicBool::new(false),
            offline: AtomicBool::new(false),
        }
    }

    /// Simulate the user following the verification link.
    pub fn confirm_email(&self, email: &str) -> Result<(), ProviderError> {
        let mut accounts = self.accounts.write().map_err(|_| unavailable())?;
        let account = accounts
            .get_mut(&normalize(email))
            .ok_or(ProviderError::UserNotFound)?;
        account.email_verified = true;
        Ok(())
    }

    pub fn disable_account(&self, email: &str) -> Result<(), ProviderError> {
        let mut accounts = self.accounts.write().map_err(|_| unavailable())?;
        let account = accounts
            .get_mut(&normalize(email))
            .ok_or(ProviderError::UserNotFound)?;
        account.disabled = true;
        Ok(())
    }

    pub fn set_popups_blocked(&self, blocked: bool) {
        self.popups_blocked.store(blocked, Ordering::SeqCst);
    }

    /// While offline every call fails with `auth/network-request-failed`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.outbox.lock().map(|o| o.clone()).unwrap_or_default()
    }

    fn ensure_online(&self) -> Result<(), ProviderError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(ProviderError::NetworkRequestFailed)
        } else {
            Ok(())
        }
    }

    fn announce(&self, notification: SessionNotification) {
        if let Err(err) = self.bus.publish(notification) {
            warn!(error = ?err, "failed to publish session notification");
        }
    }

    fn send(&self, kind: OutboundKind, to: &str) -> Result<(), ProviderError> {
        let mut outbox = self.outbox.lock().map_err(|_| unavailable())?;
        outbox.push(OutboundMessage {
            kind,
            to: to.to_string(),
        });
        debug!(?kind, "queued account email");
        Ok(())
    }

    fn signed_in(&self, identity: Identity) -> Identity {
        self.announce(SessionNotification::SignedIn(identity.clone()));
        identity
    }
}

impl<B> IdentityProvider for InMemoryIdentityProvider<B>
where
    B: NotificationBus<SessionNotification>,
{
    fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity, ProviderError> {
        self.ensure_online()?;
        validate_email(email).map_err(|_| ProviderError::InvalidEmail)?;

        let identity = {
            let mut accounts = self.accounts.write().map_err(|_| unavailable())?;
            let account = accounts
                .get_mut(&normalize(email))
                .ok_or(ProviderError::UserNotFound)?;

            if account.disabled {
                return Err(ProviderError::UserDisabled);
            }
            if account.failed_attempts >= self.max_failed_sign_ins {
                return Err(ProviderError::TooManyRequests);
            }

            match account.password.as_deref() {
                Some(stored) if stored == password => {
                    account.failed_attempts = 0;
                    account.identity()
                }
                Some(_) => {
                    account.failed_attempts += 1;
                    return Err(ProviderError::WrongPassword);
                }
                None => return Err(ProviderError::InvalidCredential),
            }
        };

        Ok(self.signed_in(identity))
    }

    fn sign_in_federated(
        &self,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<Identity, ProviderError> {
        self.ensure_online()?;
        if self.popups_blocked.load(Ordering::SeqCst) {
            return Err(ProviderError::PopupBlocked);
        }
        validate_email(email).map_err(|_| ProviderError::InvalidEmail)?;

        let identity = {
            let mut accounts = self.accounts.write().map_err(|_| unavailable())?;
            let key = normalize(email);
            let account = accounts.entry(key.clone()).or_insert_with(|| Account {
                uid: ProfileId::generate(),
                email: key,
                password: None,
                // Federated providers vouch for the address.
                email_verified: true,
                display_name: display_name.map(str::to_string),
                disabled: false,
                failed_attempts: 0,
            });
            if account.disabled {
                return Err(ProviderError::UserDisabled);
            }
            account.identity()
        };

        Ok(self.signed_in(identity))
    }

    fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Identity, ProviderError> {
        self.ensure_online()?;
        validate_email(email).map_err(|_| ProviderError::InvalidEmail)?;
        if password.chars().count() < MIN_PROVIDER_PASSWORD_LENGTH {
            return Err(ProviderError::WeakPassword);
        }

        let identity = {
            let mut accounts = self.accounts.write().map_err(|_| unavailable())?;
            let key = normalize(email);
            if accounts.contains_key(&key) {
                return Err(ProviderError::EmailAlreadyInUse);
            }
            let account = Account {
                uid: ProfileId::generate(),
                email: key.clone(),
                password: Some(password.to_string()),
                email_verified: false,
                display_name: display_name.map(str::to_string),
                disabled: false,
                failed_attempts: 0,
            };
            let identity = account.identity();
            accounts.insert(key, account);
            identity
        };

        Ok(self.signed_in(identity))
    }

    fn reload(&self, uid: &ProfileId) -> Result<Identity, ProviderError> {
        self.ensure_online()?;
        let accounts = self.accounts.read().map_err(|_| unavailable())?;
        accounts
            .values()
            .find(|a| &a.uid == uid)
            .map(Account::identity)
            .ok_or(ProviderError::UserNotFound)
    }

    fn send_password_reset(&self, email: &str) -> Result<(), ProviderError> {
        self.ensure_online()?;
        validate_email(email).map_err(|_| ProviderError::InvalidEmail)?;
        let to = {
            let mut accounts = self.accounts.write().map_err(|_| unavailable())?;
            let account = accounts
                .get_mut(&normalize(email))
                .ok_or(ProviderError::UserNotFound)?;
            // The reset link is the way out of the attempt limit.
            account.failed_attempts = 0;
            account.email.clone()
        };
        self.send(OutboundKind::PasswordReset, &to)
    }

    fn send_email_verification(&self, uid: &ProfileId) -> Result<(), ProviderError> {
        self.ensure_online()?;
        let to = {
            let accounts = self.accounts.read().map_err(|_| unavailable())?;
            let account = accounts
                .values()
                .find(|a| &a.uid == uid)
                .ok_or(ProviderError::UserNotFound)?;
            account.email.clone()
        };
        self.send(OutboundKind::EmailVerification, &to)
    }

    fn sign_out(&self) -> Result<(), ProviderError> {
        self.announce(SessionNotification::SignedOut);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use panelhub_events::{InMemoryNotificationBus, Subscription};

    type Bus = Arc<InMemoryNotificationBus<SessionNotification>>;

    fn provider(max_failed: u32) -> (InMemoryIdentityProvider<Bus>, Subscription<SessionNotification>) {
        let bus: Bus = Arc::new(InMemoryNotificationBus::new());
        let sub = bus.subscribe();
        (InMemoryIdentityProvider::new(bus, max_failed), sub)
    }

    #[test]
    fn create_then_sign_in_broadcasts_each_time() {
        let (p, sub) = provider(5);
        let created = p.create_account("T@Uni.edu", "secret1", Some("T")).unwrap();
        assert_eq!(created.email, "t@uni.edu");
        assert!(!created.email_verified);

        let again = p.sign_in_with_password("t@uni.edu", "secret1").unwrap();
        assert_eq!(again.uid, created.uid);

        let seen = sub.drain();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|n| n.identity().map(|i| &i.uid) == Some(&created.uid)));
    }

    #[test]
    fn duplicate_and_weak_accounts_are_rejected() {
        let (p, _sub) = provider(5);
        p.create_account("a@uni.edu", "secret1", None).unwrap();
        assert_eq!(
            p.create_account("A@uni.edu", "secret2", None),
            Err(ProviderError::EmailAlreadyInUse)
        );
        assert_eq!(p.create_account("b@uni.edu", "123", None), Err(ProviderError::WeakPassword));
        assert_eq!(p.create_account("nope", "secret1", None), Err(ProviderError::InvalidEmail));
    }

    #[test]
    fn repeated_failures_trip_the_attempt_limit() {
        let (p, _sub) = provider(2);
        p.create_account("a@uni.edu", "secret1", None).unwrap();

        assert_eq!(p.sign_in_with_password("a@uni.edu", "x"), Err(ProviderError::WrongPassword));
        assert_eq!(p.sign_in_with_password("a@uni.edu", "y"), Err(ProviderError::WrongPassword));
        assert_eq!(
            p.sign_in_with_password("a@uni.edu", "secret1"),
            Err(ProviderError::TooManyRequests)
        );
    }

    #[test]
    fn password_reset_lifts_the_attempt_limit() {
        let (p, _sub) = provider(1);
        p.create_account("b@uni.edu", "secret1", None).unwrap();

        assert_eq!(p.sign_in_with_password("b@uni.edu", "x"), Err(ProviderError::WrongPassword));
        assert_eq!(
            p.sign_in_with_password("b@uni.edu", "secret1"),
            Err(ProviderError::TooManyRequests)
        );

        p.send_password_reset("b@uni.edu").unwrap();
        assert!(p.sign_in_with_password("b@uni.edu", "secret1").is_ok());
    }

    #[test]
    fn unknown_and_disabled_accounts() {
        let (p, _sub) = provider(5);
        assert_eq!(p.sign_in_with_password("x@uni.edu", "pw"), Err(ProviderError::UserNotFound));

        p.create_account("d@uni.edu", "secret1", None).unwrap();
        p.disable_account("d@uni.edu").unwrap();
        assert_eq!(p.sign_in_with_password("d@uni.edu", "secret1"), Err(ProviderError::UserDisabled));
    }

    #[test]
    fn federated_accounts_are_verified_and_have_no_password() {
        let (p, _sub) = provider(5);
        let id = p.sign_in_federated("g@uni.edu", Some("G. User")).unwrap();
        assert!(id.email_verified);
        assert_eq!(p.sign_in_federated("g@uni.edu", None).unwrap().uid, id.uid);
        assert_eq!(
            p.sign_in_with_password("g@uni.edu", "anything"),
            Err(ProviderError::InvalidCredential)
        );

        p.set_popups_blocked(true);
        assert_eq!(p.sign_in_federated("g@uni.edu", None), Err(ProviderError::PopupBlocked));
    }

    #[test]
    fn emails_land_in_the_outbox() {
        let (p, _sub) = provider(5);
        let id = p.create_account("e@uni.edu", "secret1", None).unwrap();
        p.send_email_verification(&id.uid).unwrap();
        p.send_password_reset("E@uni.edu").unwrap();
        assert_eq!(p.send_password_reset("missing@uni.edu"), Err(ProviderError::UserNotFound));

        assert_eq!(
            p.sent_messages(),
            vec![
                OutboundMessage { kind: OutboundKind::EmailVerification, to: "e@uni.edu".into() },
                OutboundMessage { kind: OutboundKind::PasswordReset, to: "e@uni.edu".into() },
            ]
        );
    }

    #[test]
    fn reload_sees_confirmed_email() {
        let (p, _sub) = provider(5);
        let id = p.create_account("v@uni.edu", "secret1", None).unwrap();
        p.confirm_email("v@uni.edu").unwrap();
        assert!(p.reload(&id.uid).unwrap().email_verified);
    }

    #[test]
    fn offline_provider_reports_network_failure() {
        let (p, _sub) = provider(5);
        p.set_offline(true);
        assert_eq!(
            p.sign_in_with_password("a@uni.edu", "pw"),
            Err(ProviderError::NetworkRequestFailed)
        );
    }

    #[test]
    fn sign_out_broadcasts_null_identity() {
        let (p, sub) = provider(5);
        p.sign_out().unwrap();
        assert_eq!(sub.drain(), vec![SessionNotification::SignedOut]);
    }
}

//! Account flows: registration, sign-in, verification, approval, profile edits.
//!
//! Each flow composes the pure policy pieces from `panelhub-auth` with the two
//! external collaborators (identity provider, profile store) and installs the
//! resulting session in the injected [`SessionContext`].

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use panelhub_auth::{
    AuthzError, Capability, GateDecision, Gatekeeper, Identity, ProfilePatch, ProviderError,
    RegistrationForm, RequiresCapabilities, Role, Route, SessionNotification, SessionState,
    UserProfile, ValidationErrors, authorize_action, explain_authorization, landing_route,
    require_session, validate_password_reset, validate_registration, validate_sign_in,
};
use panelhub_core::{DomainError, ProfileId};
use panelhub_events::NotificationBus;

use crate::identity::IdentityProvider;
use crate::profile_store::{ProfileStore, StoreError};
use crate::session_context::SessionContext;
use crate::session_listener::{ListenerHandle, SessionListener};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("identity provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AccountError {
    /// Sentence safe to show in the form that triggered the flow.
    pub fn user_message(&self) -> String {
        match self {
            AccountError::Validation(errs) => errs
                .first_message()
                .unwrap_or("Please check the highlighted fields.")
                .to_string(),
            AccountError::Provider(e) => e.user_message().to_string(),
            AccountError::Authz(AuthzError::NoSession) => "Please sign in to continue.".to_string(),
            AccountError::Authz(AuthzError::Blocked(reason)) => reason.message().to_string(),
            AccountError::Authz(AuthzError::Forbidden(_)) => {
                "You do not have permission to perform this action.".to_string()
            }
            AccountError::Domain(DomainError::NotFound) | AccountError::Store(StoreError::NotFound(_)) => {
                "The requested account could not be found.".to_string()
            }
            AccountError::Domain(DomainError::Conflict(_)) => {
                "This change has already been made.".to_string()
            }
            AccountError::Domain(DomainError::Validation(_)) => {
                "Please check the highlighted fields.".to_string()
            }
            AccountError::Domain(_) | AccountError::Store(_) => {
                panelhub_auth::FALLBACK_MESSAGE.to_string()
            }
        }
    }
}

/// Result of a completed authentication.
///
/// A blocked account still gets a session (so the UI can offer "resend
/// verification" and similar); `decision` says whether it may proceed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInOutcome {
    pub session: SessionState,
    pub decision: GateDecision,
    pub route: Route,
}

impl SignInOutcome {
    pub fn can_proceed(&self) -> bool {
        self.decision.can_proceed
    }
}

/// Account-management actions and the capabilities each one needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountAction {
    ListPendingTeachers,
    ApproveTeacher,
    SuspendAccount,
    ReinstateAccount,
}

impl RequiresCapabilities for AccountAction {
    fn required_capabilities(&self) -> &[Capability] {
        match self {
            AccountAction::ListPendingTeachers | AccountAction::ApproveTeacher => {
                &[Capability::ApproveTeachers]
            }
            AccountAction::SuspendAccount | AccountAction::ReinstateAccount => {
                &[Capability::ManageUsers]
            }
        }
    }
}

/// Conditional writes retried before a concurrent change is reported.
const MAX_WRITE_ATTEMPTS: u32 = 3;

pub struct AccountService<S, P> {
    store: S,
    provider: P,
    gate: Gatekeeper,
    session: Arc<SessionContext>,
    // Serializes "resolve profile, persist, install session" so a session
    // notification racing a sign-in flow never installs an older snapshot.
    resolving: Mutex<()>,
}

fn provider_failure(op: &'static str, err: ProviderError) -> AccountError {
    warn!(op, code = %err, "identity provider call failed");
    AccountError::Provider(err)
}

impl<S, P> AccountService<S, P>
where
    S: ProfileStore,
    P: IdentityProvider,
{
    pub fn new(store: S, provider: P, gate: Gatekeeper, session: Arc<SessionContext>) -> Self {
        Self {
            store,
            provider,
            gate,
            session,
            resolving: Mutex::new(()),
        }
    }

    pub fn gatekeeper(&self) -> &Gatekeeper {
        &self.gate
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn session_context(&self) -> &Arc<SessionContext> {
        &self.session
    }

    /// Current session snapshot.
    pub fn current_session(&self) -> Arc<SessionState> {
        self.session.current()
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, AccountError> {
        self.resolving
            .lock()
            .map_err(|_| StoreError::Unavailable("session resolution lock poisoned".to_string()).into())
    }

    fn outcome(&self, session: SessionState) -> SignInOutcome {
        let decision = self.gate.evaluate(session.profile());
        let route = landing_route(&session, &self.gate);

        if let Some(profile) = session.profile() {
            match decision.reason_code {
                Some(reason) => info!(
                    profile_id = %profile.id,
                    role = %profile.role,
                    reason_code = %reason,
                    "sign-in blocked by account gate"
                ),
                None => info!(profile_id = %profile.id, role = %profile.role, route = %route, "signed in"),
            }
        }

        SignInOutcome {
            session,
            decision,
            route,
        }
    }

    /// Stored profile for an identity, creating the default one if absent.
    fn fetch_or_create(&self, identity: &Identity, now: DateTime<Utc>) -> Result<UserProfile, AccountError> {
        if let Some(profile) = self.store.fetch(&identity.uid)? {
            return Ok(profile);
        }

        let profile = UserProfile::first_sign_in(identity, now);
        match self.store.create(&profile) {
            Ok(()) => {
                info!(profile_id = %profile.id, "created default profile on first sign-in");
                Ok(profile)
            }
            Err(StoreError::AlreadyExists(_)) => self
                .store
                .fetch(&identity.uid)?
                .ok_or_else(|| StoreError::NotFound(identity.uid.clone()).into()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read, transform and conditionally write one profile.
    ///
    /// When the stored document changed between the read and the write the
    /// transformation is re-applied to the fresh copy, so concurrent
    /// transitions (a suspension during a sign-in, say) are never lost.
    fn modify<F>(&self, id: &ProfileId, mut change: F) -> Result<UserProfile, AccountError>
    where
        F: FnMut(UserProfile) -> Result<UserProfile, AccountError>,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let current = self
                .store
                .fetch(id)?
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            let next = change(current.clone())?;
            if next == current {
                return Ok(next);
            }
            match self.store.replace(&current, &next) {
                Ok(()) => return Ok(next),
                Err(StoreError::Stale(_)) => {
                    debug!(profile_id = %id, attempt, "profile changed concurrently; re-applying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StoreError::Stale(id.clone()).into())
    }

    /// The installed session, provided `claimed` is the same signed-in account.
    ///
    /// Callers hold snapshots; a snapshot kept from before a sign-out (or from
    /// another account) carries no rights.
    fn current_actor(&self, claimed: &SessionState) -> Result<Arc<SessionState>, AccountError> {
        let claimed = require_session(claimed)?;
        let current = self.session.current();
        match current.profile() {
            Some(profile) if profile.id == claimed.id => Ok(current),
            _ => {
                debug!(profile_id = %claimed.id, "session snapshot is no longer installed");
                Err(AuthzError::NoSession.into())
            }
        }
    }

    /// Copy the provider's verification flag into the profile when it changed.
    fn synced(&self, profile: UserProfile, identity: &Identity, now: DateTime<Utc>) -> UserProfile {
        if profile.email_verified == identity.email_verified {
            profile
        } else {
            debug!(profile_id = %profile.id, verified = identity.email_verified, "syncing email verification flag");
            profile.with_email_verified(identity.email_verified, now)
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Authentication
    // ─────────────────────────────────────────────────────────────────────────

    pub fn sign_in(&self, email: &str, password: &str, now: DateTime<Utc>) -> Result<SignInOutcome, AccountError> {
        validate_sign_in(email, password)?;
        let _guard = self.lock()?;
        let identity = self
            .provider
            .sign_in_with_password(email.trim(), password)
            .map_err(|e| provider_failure("sign_in", e))?;
        self.complete_sign_in_locked(identity, now)
    }

    pub fn sign_in_federated(
        &self,
        email: &str,
        display_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<SignInOutcome, AccountError> {
        let _guard = self.lock()?;
        let identity = self
            .provider
            .sign_in_federated(email.trim(), display_name)
            .map_err(|e| provider_failure("sign_in_federated", e))?;
        self.complete_sign_in_locked(identity, now)
    }

    /// Finish authentication for an identity the provider already vouched for
    /// (a federated popup handled outside this service, say).
    pub fn sign_in_with_identity(&self, identity: Identity, now: DateTime<Utc>) -> Result<SignInOutcome, AccountError> {
        let _guard = self.lock()?;
        self.complete_sign_in_locked(identity, now)
    }

    fn complete_sign_in_locked(&self, identity: Identity, now: DateTime<Utc>) -> Result<SignInOutcome, AccountError> {
        self.fetch_or_create(&identity, now)?;
        let profile = self.modify(&identity.uid, |p| Ok(self.synced(p, &identity, now).record_login(now)))?;

        let session = SessionState::signed_in(identity, profile);
        self.session.replace(session.clone());
        Ok(self.outcome(session))
    }

    /// Create a provider account and its profile, then send the verification email.
    pub fn register(&self, form: &RegistrationForm, now: DateTime<Utc>) -> Result<SignInOutcome, AccountError> {
        validate_registration(form)?;
        let _guard = self.lock()?;

        let identity = self
            .provider
            .create_account(
                form.email.trim(),
                &form.password,
                Some(form.details.display_name.trim()),
            )
            .map_err(|e| provider_failure("register", e))?;

        let profile = UserProfile::register(&identity, form.details.clone(), now)?;
        match self.store.create(&profile) {
            Ok(()) => {}
            // A default profile from an earlier first-sign-in path; the
            // registration data is authoritative for a brand-new account.
            Err(StoreError::AlreadyExists(_)) => self.store.update(&profile)?,
            Err(e) => return Err(e.into()),
        }
        info!(profile_id = %profile.id, role = %profile.role, "registered account");

        if let Err(err) = self.provider.send_email_verification(&identity.uid) {
            warn!(profile_id = %profile.id, code = %err, "verification email not sent");
        }

        let session = SessionState::signed_in(identity, profile);
        self.session.replace(session.clone());
        Ok(self.outcome(session))
    }

    pub fn request_password_reset(&self, email: &str) -> Result<(), AccountError> {
        validate_password_reset(email)?;
        self.provider
            .send_password_reset(email.trim())
            .map_err(|e| provider_failure("password_reset", e))
    }

    /// Send another verification email. A no-op for verified accounts.
    pub fn resend_verification(&self, session: &SessionState) -> Result<(), AccountError> {
        let current = self.current_actor(session)?;
        let Some(profile) = current.profile() else {
            return Err(AuthzError::NoSession.into());
        };
        if profile.email_verified {
            return Ok(());
        }
        self.provider
            .send_email_verification(&profile.id)
            .map_err(|e| provider_failure("resend_verification", e))
    }

    /// Re-read the provider account (after the user verified their email,
    /// say) and re-run the gate.
    pub fn refresh_session(&self, session: &SessionState, now: DateTime<Utc>) -> Result<SignInOutcome, AccountError> {
        let _guard = self.lock()?;
        let current = self.current_actor(session)?;
        let id = current
            .profile()
            .map(|p| p.id.clone())
            .ok_or(AuthzError::NoSession)?;

        let identity = self
            .provider
            .reload(&id)
            .map_err(|e| provider_failure("reload", e))?;
        let profile = self.sync_email_verified_locked(&identity, now)?;

        let next = SessionState::signed_in(identity, profile);
        self.session.replace(next.clone());
        Ok(self.outcome(next))
    }

    /// Copy the provider's verification flag into the stored profile.
    pub fn sync_email_verified(&self, identity: &Identity, now: DateTime<Utc>) -> Result<UserProfile, AccountError> {
        let _guard = self.lock()?;
        self.sync_email_verified_locked(identity, now)
    }

    fn sync_email_verified_locked(&self, identity: &Identity, now: DateTime<Utc>) -> Result<UserProfile, AccountError> {
        self.modify(&identity.uid, |p| Ok(self.synced(p, identity, now)))
    }

    pub fn sign_out(&self) -> Result<(), AccountError> {
        let _guard = self.lock()?;
        self.provider
            .sign_out()
            .map_err(|e| provider_failure("sign_out", e))?;
        self.session.replace(SessionState::SignedOut);
        info!("signed out");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Account management
    // ─────────────────────────────────────────────────────────────────────────

    /// Teacher accounts waiting for approval, oldest first.
    pub fn pending_teachers(&self, actor: &SessionState) -> Result<Vec<UserProfile>, AccountError> {
        self.require(actor, AccountAction::ListPendingTeachers)?;
        Ok(self
            .store
            .list()?
            .into_iter()
            .filter(|p| p.role == Role::Teacher && !p.is_approved())
            .collect())
    }

    pub fn approve_teacher(
        &self,
        actor: &SessionState,
        teacher_id: &ProfileId,
        now: DateTime<Utc>,
    ) -> Result<UserProfile, AccountError> {
        let _guard = self.lock()?;
        let actor = self.require(actor, AccountAction::ApproveTeacher)?;
        let approved = self.modify(teacher_id, |p| Ok(p.approve(now)?))?;

        info!(
            profile_id = %approved.id,
            approved_by = %actor.profile().map(|p| p.id.as_str()).unwrap_or_default(),
            "teacher approved"
        );
        Ok(approved)
    }

    pub fn suspend_account(
        &self,
        actor: &SessionState,
        target: &ProfileId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<UserProfile, AccountError> {
        let _guard = self.lock()?;
        self.require(actor, AccountAction::SuspendAccount)?;
        let suspended = self.modify(target, |p| Ok(p.suspend(reason, now)?))?;
        info!(profile_id = %suspended.id, "account suspended");
        Ok(suspended)
    }

    pub fn reinstate_account(
        &self,
        actor: &SessionState,
        target: &ProfileId,
        now: DateTime<Utc>,
    ) -> Result<UserProfile, AccountError> {
        let _guard = self.lock()?;
        self.require(actor, AccountAction::ReinstateAccount)?;
        let reinstated = self.modify(target, |p| Ok(p.reinstate(now)?))?;
        info!(profile_id = %reinstated.id, "account reinstated");
        Ok(reinstated)
    }

    /// Edit the signed-in user's own descriptive fields.
    pub fn update_profile(
        &self,
        session: &SessionState,
        patch: ProfilePatch,
        now: DateTime<Utc>,
    ) -> Result<SessionState, AccountError> {
        let _guard = self.lock()?;
        let current = self.current_actor(session)?;
        if patch.is_empty() {
            return Ok((*current).clone());
        }

        let id = current
            .profile()
            .map(|p| p.id.clone())
            .ok_or(AuthzError::NoSession)?;
        let next = self.modify(&id, |p| Ok(p.with_patch(patch.clone(), now)?))?;

        let next_session = current.with_profile(next);
        self.session.replace(next_session.clone());
        Ok(next_session)
    }

    /// Check `actor` is the installed session and may perform `action`.
    fn require(&self, actor: &SessionState, action: AccountAction) -> Result<Arc<SessionState>, AccountError> {
        let current = self.current_actor(actor)?;
        if let Err(err) = authorize_action(&current, &self.gate, &action) {
            for capability in action.required_capabilities() {
                let explanation = explain_authorization(&current, &self.gate, *capability);
                if !explanation.granted {
                    debug!(
                        action = ?action,
                        reason = %explanation.reason,
                        granting_roles = ?explanation.granting_roles,
                        "authorization denied"
                    );
                    break;
                }
            }
            return Err(err.into());
        }
        Ok(current)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Session notifications
    // ─────────────────────────────────────────────────────────────────────────

    /// Reflect one provider notification into the session context.
    ///
    /// Returns whether the installed snapshot changed. Repeats and redundant
    /// sign-outs are no-ops.
    pub fn handle_notification(
        &self,
        notification: SessionNotification,
        now: DateTime<Utc>,
    ) -> Result<bool, AccountError> {
        let _guard = self.lock()?;

        match notification {
            SessionNotification::SignedOut => Ok(self.session.observe(SessionState::SignedOut)),
            SessionNotification::SignedIn(identity) => {
                self.fetch_or_create(&identity, now)?;
                let profile = self.sync_email_verified_locked(&identity, now)?;
                Ok(self.session.observe(SessionState::signed_in(identity, profile)))
            }
        }
    }
}

impl<S, P> AccountService<S, P>
where
    S: ProfileStore + 'static,
    P: IdentityProvider + 'static,
{
    /// Handler for the session listener, stamping new profiles with the wall clock.
    pub fn session_handler(
        self: &Arc<Self>,
    ) -> impl FnMut(SessionNotification) -> anyhow::Result<()> + Send + use<S, P> {
        let service = Arc::clone(self);
        move |notification| {
            service
                .handle_notification(notification, Utc::now())
                .map(|_| ())
                .map_err(anyhow::Error::from)
        }
    }

    /// Register the application's one long-lived session subscription.
    pub fn listen<B>(self: &Arc<Self>, bus: &B) -> ListenerHandle
    where
        B: NotificationBus<SessionNotification> + ?Sized,
    {
        SessionListener::spawn("session-listener", bus, self.session_handler())
    }
}

//! End-to-end account flows.
//!
//! Provider → bus → session listener → session context, plus the gate and
//! route decisions a client would act on.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeZone, Utc};

use panelhub_auth::{
    AuthzError, Capability, GatePolicy, Gatekeeper, Identity, ProviderError, ReasonCode,
    RegistrationDetails, RegistrationForm, Role, Route, SessionNotification, SessionState,
    TeacherStatus, UserProfile, effective_permissions,
};
use panelhub_core::ProfileId;
use panelhub_events::{InMemoryNotificationBus, NotificationBus};
use panelhub_infra::{
    AccountError, AccountService, AuthConfig, InMemoryIdentityProvider, InMemoryProfileStore,
    ProfileStore, SessionContext, StoreError,
};

type Bus = Arc<InMemoryNotificationBus<SessionNotification>>;
type Service = AccountService<Arc<InMemoryProfileStore>, Arc<InMemoryIdentityProvider<Bus>>>;

struct Harness {
    bus: Bus,
    service: Arc<Service>,
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 8, 12, 9, 30, 0).unwrap()
}

fn harness(config: &AuthConfig) -> Harness {
    let bus: Bus = Arc::new(InMemoryNotificationBus::new());
    let provider = Arc::new(InMemoryIdentityProvider::new(bus.clone(), config.max_failed_sign_ins));
    let service = Arc::new(AccountService::new(
        Arc::new(InMemoryProfileStore::new()),
        provider,
        Gatekeeper::new(config.gate_policy()),
        Arc::new(SessionContext::new()),
    ));
    Harness { bus, service }
}

fn form(email: &str, name: &str, role: Role) -> RegistrationForm {
    RegistrationForm {
        email: email.to_string(),
        password: "Abcdef1!".to_string(),
        confirm_password: "Abcdef1!".to_string(),
        details: RegistrationDetails {
            display_name: name.to_string(),
            role,
            department: Some("College of Engineering".to_string()),
            employee_id: None,
            phone_number: None,
        },
    }
}

fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    done()
}

/// Registered director, verified, signed in; returns the session.
fn director(h: &Harness) -> SessionState {
    h.service
        .register(&form("director@uni.edu", "Dr. Reyes", Role::Director), t0())
        .unwrap();
    h.service.provider().confirm_email("director@uni.edu").unwrap();
    h.service
        .sign_in("director@uni.edu", "Abcdef1!", t0())
        .unwrap()
        .session
}

#[test]
fn teacher_is_verified_then_approved_before_reaching_requests() {
    let h = harness(&AuthConfig::default());

    let registered = h
        .service
        .register(&form("teacher@uni.edu", "Ms. Cruz", Role::Teacher), t0())
        .unwrap();
    assert_eq!(registered.decision.reason_code, Some(ReasonCode::VerifyEmail));
    assert_eq!(registered.route, Route::VerifyEmail);
    let teacher_id = registered.session.profile().unwrap().id.clone();

    h.service.provider().confirm_email("teacher@uni.edu").unwrap();
    let refreshed = h.service.refresh_session(&registered.session, t0()).unwrap();
    assert_eq!(refreshed.decision.reason_code, Some(ReasonCode::WaitApproval));
    assert_eq!(refreshed.route, Route::PendingApproval);
    // Blocked accounts hold a session but none of their role's capabilities.
    assert!(
        panelhub_auth::authorize(&refreshed.session, h.service.gatekeeper(), Capability::CreateRequest)
            .is_err()
    );

    h.service.sign_out().unwrap();
    let director = director(&h);
    let approved = h.service.approve_teacher(&director, &teacher_id, t0()).unwrap();
    assert_eq!(approved.status, Some(TeacherStatus::Approved));
    h.service.sign_out().unwrap();

    let outcome = h.service.sign_in("teacher@uni.edu", "Abcdef1!", t0()).unwrap();
    assert!(outcome.can_proceed());
    assert_eq!(outcome.route, Route::MyRequests);
    assert!(effective_permissions(&outcome.session).can_create_request);
    assert!(!effective_permissions(&outcome.session).can_approve_teachers);
}

#[test]
fn vpaa_lands_on_approvals_without_any_status() {
    let h = harness(&AuthConfig::default());
    h.service.register(&form("vpaa@uni.edu", "VP Santos", Role::Vpaa), t0()).unwrap();
    h.service.provider().confirm_email("vpaa@uni.edu").unwrap();

    let outcome = h.service.sign_in("vpaa@uni.edu", "Abcdef1!", t0()).unwrap();
    let profile = outcome.session.profile().unwrap();
    assert_eq!(profile.status, None);
    assert!(outcome.can_proceed());
    assert_eq!(outcome.route, Route::VpaaApprovals);
}

#[test]
fn attempt_limit_surfaces_the_too_many_requests_sentence() {
    let config = AuthConfig {
        max_failed_sign_ins: 2,
        ..AuthConfig::default()
    };
    let h = harness(&config);
    h.service.register(&form("dean@uni.edu", "Dean Lim", Role::Dean), t0()).unwrap();

    for _ in 0..2 {
        let err = h.service.sign_in("dean@uni.edu", "Nope123!", t0()).unwrap_err();
        assert_eq!(err.user_message(), "Incorrect password. Please try again.");
    }
    let err = h.service.sign_in("dean@uni.edu", "Abcdef1!", t0()).unwrap_err();
    assert_eq!(
        err.user_message(),
        "Too many failed login attempts. Please try again later."
    );
}

#[test]
fn weak_password_is_caught_before_the_provider() {
    let h = harness(&AuthConfig::default());
    let mut f = form("weak@uni.edu", "Weak", Role::Staff);
    f.password = "abc".to_string();
    f.confirm_password = "abc".to_string();

    match h.service.register(&f, t0()).unwrap_err() {
        AccountError::Validation(errs) => {
            let messages: Vec<_> = errs.for_field(panelhub_auth::Field::Password).collect();
            assert!(messages.len() >= 2);
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(h.service.provider().sent_messages().is_empty());
}

#[test]
fn unknown_stored_role_never_grants_a_session() {
    let h = harness(&AuthConfig::default());
    let outcome = h.service.sign_in_federated("odd@uni.edu", None, t0()).unwrap();
    let profile = outcome.session.profile().unwrap().clone();
    h.service.sign_out().unwrap();

    let mut doc = serde_json::to_value(&profile).unwrap();
    doc["role"] = serde_json::json!("superuser");
    h.service.store().insert_raw(profile.id.clone(), doc).unwrap();

    let err = h.service.sign_in_federated("odd@uni.edu", None, t0()).unwrap_err();
    assert!(matches!(err, AccountError::Store(StoreError::Corrupt { .. })));
    assert!(!h.service.current_session().is_signed_in());
    // The listing skips the unreadable document instead of failing.
    assert!(h.service.store().list().unwrap().is_empty());
}

#[test]
fn disabled_policy_checks_let_pending_unverified_teachers_through() {
    let config = AuthConfig::from_lookup(|key| match key {
        "PANELHUB_REQUIRE_EMAIL_VERIFICATION" => Some("false".to_string()),
        "PANELHUB_REQUIRE_TEACHER_APPROVAL" => Some("0".to_string()),
        _ => None,
    })
    .unwrap();
    assert_eq!(
        config.gate_policy(),
        GatePolicy {
            require_email_verification: false,
            require_teacher_approval: false,
        }
    );

    let h = harness(&config);
    let outcome = h
        .service
        .register(&form("fresh@uni.edu", "New Teacher", Role::Teacher), t0())
        .unwrap();
    assert!(outcome.can_proceed());
    assert_eq!(outcome.route, Route::MyRequests);
}

#[test]
fn listener_tracks_provider_session_changes() {
    let config = AuthConfig::default();
    panelhub_observability::init_with(&config.log_config());
    let h = harness(&config);
    let listener = h.service.listen(&h.bus);

    // A session restored by the provider with no local profile yet.
    let identity = Identity {
        uid: ProfileId::new("restored-uid").unwrap(),
        email: "restored@uni.edu".to_string(),
        email_verified: true,
        display_name: Some("Restored User".to_string()),
    };
    h.bus
        .publish(SessionNotification::SignedIn(identity.clone()))
        .unwrap();
    h.bus
        .publish(SessionNotification::SignedIn(identity.clone()))
        .unwrap();

    let service = Arc::clone(&h.service);
    assert!(wait_until(|| service.current_session().is_signed_in()));
    let session = h.service.current_session();
    let profile = session.profile().unwrap();
    assert_eq!(profile.id, identity.uid);
    assert_eq!(profile.role, Role::Teacher);
    assert_eq!(h.service.store().list().unwrap().len(), 1);

    h.bus.publish(SessionNotification::SignedOut).unwrap();
    h.bus.publish(SessionNotification::SignedOut).unwrap();
    assert!(wait_until(|| *service.current_session() == SessionState::SignedOut));

    listener.shutdown();
}

#[test]
fn listener_does_not_undo_a_completed_sign_in() {
    let h = harness(&AuthConfig::default());
    let listener = h.service.listen(&h.bus);

    let outcome = h
        .service
        .sign_in_federated("flow@uni.edu", Some("Flow"), t0())
        .unwrap();

    // Give the listener time to see the provider's broadcast.
    thread::sleep(Duration::from_millis(300));
    assert_eq!(*h.service.current_session(), outcome.session);

    listener.shutdown();
}

// ─────────────────────────────────────────────────────────────────────────────
// Concurrent transitions
// ─────────────────────────────────────────────────────────────────────────────

type WriteHook = Box<dyn FnOnce(&InMemoryProfileStore) + Send>;

/// Store that lets another writer land just before the next write.
#[derive(Default)]
struct InterleavingStore {
    inner: InMemoryProfileStore,
    hook: Mutex<Option<WriteHook>>,
}

impl InterleavingStore {
    fn before_next_write(&self, hook: impl FnOnce(&InMemoryProfileStore) + Send + 'static) {
        *self.hook.lock().unwrap() = Some(Box::new(hook));
    }

    fn run_hook(&self) {
        let hook = self.hook.lock().unwrap().take();
        if let Some(hook) = hook {
            hook(&self.inner);
        }
    }
}

impl ProfileStore for InterleavingStore {
    fn fetch(&self, id: &ProfileId) -> Result<Option<UserProfile>, StoreError> {
        self.inner.fetch(id)
    }

    fn create(&self, profile: &UserProfile) -> Result<(), StoreError> {
        self.inner.create(profile)
    }

    fn update(&self, profile: &UserProfile) -> Result<(), StoreError> {
        self.run_hook();
        self.inner.update(profile)
    }

    fn replace(&self, current: &UserProfile, next: &UserProfile) -> Result<(), StoreError> {
        self.run_hook();
        self.inner.replace(current, next)
    }

    fn list(&self) -> Result<Vec<UserProfile>, StoreError> {
        self.inner.list()
    }
}

type InterleavedService =
    AccountService<Arc<InterleavingStore>, Arc<InMemoryIdentityProvider<Bus>>>;

fn interleaved() -> (Arc<InterleavingStore>, InterleavedService) {
    let bus: Bus = Arc::new(InMemoryNotificationBus::new());
    let store = Arc::new(InterleavingStore::default());
    let service = AccountService::new(
        Arc::clone(&store),
        Arc::new(InMemoryIdentityProvider::new(bus, 5)),
        Gatekeeper::new(GatePolicy::default()),
        Arc::new(SessionContext::new()),
    );
    (store, service)
}

#[test]
fn suspension_landing_during_sign_in_is_kept() {
    let (store, svc) = interleaved();
    let registered = svc.register(&form("late@uni.edu", "Late", Role::Staff), t0()).unwrap();
    let id = registered.session.profile().unwrap().id.clone();
    svc.provider().confirm_email("late@uni.edu").unwrap();
    svc.sign_out().unwrap();

    let suspended_at = t0() + chrono::Duration::minutes(1);
    let target = id.clone();
    store.before_next_write(move |inner| {
        let p = inner.fetch(&target).unwrap().unwrap();
        inner.update(&p.suspend("audit", suspended_at).unwrap()).unwrap();
    });

    let signed_in_at = t0() + chrono::Duration::minutes(2);
    let outcome = svc.sign_in("late@uni.edu", "Abcdef1!", signed_in_at).unwrap();

    assert!(!outcome.can_proceed());
    assert_eq!(outcome.decision.reason_code, Some(ReasonCode::ContactSupport));
    assert_eq!(outcome.route, Route::AccountSuspended);

    let stored = svc.store().fetch(&id).unwrap().unwrap();
    assert!(stored.is_suspended());
    assert_eq!(stored.last_login, signed_in_at);
}

#[test]
fn approval_survives_a_concurrent_login() {
    let (store, svc) = interleaved();
    let teacher = svc.sign_in_federated("t@uni.edu", None, t0()).unwrap();
    let teacher_id = teacher.session.profile().unwrap().id.clone();

    svc.register(&form("dir@uni.edu", "Director", Role::Director), t0()).unwrap();
    svc.provider().confirm_email("dir@uni.edu").unwrap();
    let director = svc.sign_in("dir@uni.edu", "Abcdef1!", t0()).unwrap().session;

    let login_at = t0() + chrono::Duration::hours(3);
    let target = teacher_id.clone();
    store.before_next_write(move |inner| {
        let p = inner.fetch(&target).unwrap().unwrap();
        inner.update(&p.record_login(login_at)).unwrap();
    });

    let approved = svc.approve_teacher(&director, &teacher_id, login_at).unwrap();
    assert_eq!(approved.status, Some(TeacherStatus::Approved));

    let stored = svc.store().fetch(&teacher_id).unwrap().unwrap();
    assert!(stored.is_approved());
    assert_eq!(stored.last_login, login_at);
}

#[test]
fn account_management_needs_the_installed_session() {
    let h = harness(&AuthConfig::default());
    let teacher = h.service.sign_in_federated("t3@uni.edu", None, t0()).unwrap();
    let teacher_id = teacher.session.profile().unwrap().id.clone();
    let director = director(&h);
    h.service.sign_out().unwrap();

    for err in [
        h.service.pending_teachers(&director).map(|_| ()).unwrap_err(),
        h.service.approve_teacher(&director, &teacher_id, t0()).map(|_| ()).unwrap_err(),
        h.service.reinstate_account(&director, &teacher_id, t0()).map(|_| ()).unwrap_err(),
        h.service.resend_verification(&director).unwrap_err(),
    ] {
        assert_eq!(err, AccountError::Authz(AuthzError::NoSession));
    }

    assert_eq!(*h.service.current_session(), SessionState::SignedOut);
    assert_eq!(
        h.service.store().fetch(&teacher_id).unwrap().unwrap().status,
        Some(TeacherStatus::PendingApproval)
    );
}

#[test]
fn password_reset_unlocks_a_throttled_account() {
    let config = AuthConfig {
        max_failed_sign_ins: 1,
        ..AuthConfig::default()
    };
    let h = harness(&config);
    h.service.register(&form("forgetful@uni.edu", "Forgetful", Role::Staff), t0()).unwrap();
    h.service.provider().confirm_email("forgetful@uni.edu").unwrap();

    h.service.sign_in("forgetful@uni.edu", "Wrong123!", t0()).unwrap_err();
    let err = h.service.sign_in("forgetful@uni.edu", "Abcdef1!", t0()).unwrap_err();
    assert_eq!(err, AccountError::Provider(ProviderError::TooManyRequests));

    h.service.request_password_reset("forgetful@uni.edu").unwrap();
    assert!(h.service.sign_in("forgetful@uni.edu", "Abcdef1!", t0()).unwrap().can_proceed());
}

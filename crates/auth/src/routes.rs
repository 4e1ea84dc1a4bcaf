//! Landing routes.

use serde::{Deserialize, Serialize};

use crate::{GateState, Gatekeeper, Role, SessionState};

/// Identifier of a top-level view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Route {
    Loading,
    Login,
    VerifyEmail,
    PendingApproval,
    AccountSuspended,
    /// Generic dashboard; fallback for roles without a dedicated landing view.
    Dashboard,
    MyRequests,
    DirectorDashboard,
    StaffRequests,
    VpaaApprovals,
    BudgetHonorarium,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Loading => "/loading",
            Route::Login => "/login",
            Route::VerifyEmail => "/verify-email",
            Route::PendingApproval => "/pending-approval",
            Route::AccountSuspended => "/account-suspended",
            Route::Dashboard => "/dashboard",
            Route::MyRequests => "/teacher/requests",
            Route::DirectorDashboard => "/director/dashboard",
            Route::StaffRequests => "/staff/requests",
            Route::VpaaApprovals => "/vpaa/approvals",
            Route::BudgetHonorarium => "/budget/honorarium",
        }
    }
}

impl core::fmt::Display for Route {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.path())
    }
}

fn dedicated_route(role: Role) -> Option<Route> {
    match role {
        Role::Teacher => Some(Route::MyRequests),
        Role::Director => Some(Route::DirectorDashboard),
        Role::Staff => Some(Route::StaffRequests),
        Role::Vpaa => Some(Route::VpaaApprovals),
        Role::BudgetOffice => Some(Route::BudgetHonorarium),
        Role::Dean => None,
    }
}

/// Default landing view for a role; never fails.
pub fn default_route_for(role: Role) -> Route {
    dedicated_route(role).unwrap_or(Route::Dashboard)
}

/// Where the app should go for a session snapshot.
///
/// Session presence is checked before the account gate.
pub fn landing_route(session: &SessionState, gate: &Gatekeeper) -> Route {
    match session {
        SessionState::Loading => Route::Loading,
        SessionState::SignedOut => Route::Login,
        SessionState::SignedIn { profile, .. } => match gate.classify(Some(profile)) {
            GateState::EmailNotVerified => Route::VerifyEmail,
            GateState::PendingApproval => Route::PendingApproval,
            GateState::Suspended => Route::AccountSuspended,
            GateState::Active => default_route_for(profile.role),
        },
    }
}

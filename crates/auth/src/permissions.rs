//! Role → capability table.
//!
//! Every role check in the system goes through [`permissions_for`]; views and
//! services never match on `Role` to decide what a user may do.

use serde::{Deserialize, Serialize};

use crate::Role;

/// One named permission flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    CreateRequest,
    ApproveRequest,
    ViewAllRequests,
    ManageUsers,
    ViewReports,
    ManageBudget,
    ApproveTeachers,
    ViewDashboard,
}

impl Capability {
    pub const ALL: [Capability; 8] = [
        Capability::CreateRequest,
        Capability::ApproveRequest,
        Capability::ViewAllRequests,
        Capability::ManageUsers,
        Capability::ViewReports,
        Capability::ManageBudget,
        Capability::ApproveTeachers,
        Capability::ViewDashboard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::CreateRequest => "create-request",
            Capability::ApproveRequest => "approve-request",
            Capability::ViewAllRequests => "view-all-requests",
            Capability::ManageUsers => "manage-users",
            Capability::ViewReports => "view-reports",
            Capability::ManageBudget => "manage-budget",
            Capability::ApproveTeachers => "approve-teachers",
            Capability::ViewDashboard => "view-dashboard",
        }
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fixed capability set of a role.
///
/// Plain booleans (rather than a set) so a missing field is a compile error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolePermissions {
    pub can_create_request: bool,
    pub can_approve_request: bool,
    pub can_view_all_requests: bool,
    pub can_manage_users: bool,
    pub can_view_reports: bool,
    pub can_manage_budget: bool,
    pub can_approve_teachers: bool,
    pub can_view_dashboard: bool,
}

impl RolePermissions {
    /// Every capability denied. Used for absent sessions and unreadable roles.
    pub const fn none() -> Self {
        Self {
            can_create_request: false,
            can_approve_request: false,
            can_view_all_requests: false,
            can_manage_users: false,
            can_view_reports: false,
            can_manage_budget: false,
            can_approve_teachers: false,
            can_view_dashboard: false,
        }
    }

    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::CreateRequest => self.can_create_request,
            Capability::ApproveRequest => self.can_approve_request,
            Capability::ViewAllRequests => self.can_view_all_requests,
            Capability::ManageUsers => self.can_manage_users,
            Capability::ViewReports => self.can_view_reports,
            Capability::ManageBudget => self.can_manage_budget,
            Capability::ApproveTeachers => self.can_approve_teachers,
            Capability::ViewDashboard => self.can_view_dashboard,
        }
    }

    /// Granted capabilities, in declaration order.
    pub fn granted(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|c| self.allows(*c))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::none()
    }
}

const TEACHER: RolePermissions = RolePermissions {
    can_create_request: true,
    can_view_dashboard: true,
    ..RolePermissions::none()
};

const DIRECTOR: RolePermissions = RolePermissions {
    can_create_request: true,
    can_approve_request: true,
    can_view_all_requests: true,
    can_manage_users: true,
    can_view_reports: true,
    can_approve_teachers: true,
    can_view_dashboard: true,
    ..RolePermissions::none()
};

const STAFF: RolePermissions = RolePermissions {
    can_create_request: true,
    can_view_all_requests: true,
    can_view_reports: true,
    can_view_dashboard: true,
    ..RolePermissions::none()
};

const VPAA: RolePermissions = RolePermissions {
    can_approve_request: true,
    can_view_all_requests: true,
    can_manage_users: true,
    can_view_reports: true,
    can_approve_teachers: true,
    can_view_dashboard: true,
    ..RolePermissions::none()
};

const BUDGET_OFFICE: RolePermissions = RolePermissions {
    can_view_all_requests: true,
    can_view_reports: true,
    can_manage_budget: true,
    can_view_dashboard: true,
    ..RolePermissions::none()
};

const DEAN: RolePermissions = RolePermissions {
    can_approve_request: true,
    can_view_all_requests: true,
    can_view_reports: true,
    can_view_dashboard: true,
    ..RolePermissions::none()
};

/// Capability set of a role. Total over [`Role`].
pub fn permissions_for(role: Role) -> RolePermissions {
    match role {
        Role::Teacher => TEACHER,
        Role::Director => DIRECTOR,
        Role::Staff => STAFF,
        Role::Vpaa => VPAA,
        Role::BudgetOffice => BUDGET_OFFICE,
        Role::Dean => DEAN,
    }
}

/// Capability set for a role string read back from storage.
///
/// Unparseable values (corrupt or foreign data) get [`RolePermissions::none`].
pub fn permissions_for_stored(raw: &str) -> RolePermissions {
    raw.parse::<Role>()
        .map(permissions_for)
        .unwrap_or(RolePermissions::none())
}

/// Capability set for an optional role; `None` (no user) denies everything.
pub fn permissions_for_optional(role: Option<Role>) -> RolePermissions {
    role.map(permissions_for).unwrap_or(RolePermissions::none())
}

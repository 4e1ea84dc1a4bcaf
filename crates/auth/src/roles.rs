use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role of a user account.
///
/// The set is closed: every capability lookup, gate check and landing route
/// is defined for exactly these six values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Teacher,
    Director,
    Staff,
    Vpaa,
    BudgetOffice,
    Dean,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Teacher,
        Role::Director,
        Role::Staff,
        Role::Vpaa,
        Role::BudgetOffice,
        Role::Dean,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Director => "director",
            Role::Staff => "staff",
            Role::Vpaa => "vpaa",
            Role::BudgetOffice => "budget-office",
            Role::Dean => "dean",
        }
    }

    /// Human-readable label used in account listings.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Teacher => "Teacher",
            Role::Director => "Research Director",
            Role::Staff => "Research Staff",
            Role::Vpaa => "VP for Academic Affairs",
            Role::BudgetOffice => "Budget Office",
            Role::Dean => "Dean",
        }
    }

    /// Only teacher accounts go through the approval sub-state.
    pub fn requires_approval(&self) -> bool {
        matches!(self, Role::Teacher)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    /// Accepts the canonical kebab-case names plus the snake_case spelling
    /// older records use for `budget_office`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "teacher" => Ok(Role::Teacher),
            "director" => Ok(Role::Director),
            "staff" => Ok(Role::Staff),
            "vpaa" => Ok(Role::Vpaa),
            "budget-office" | "budget_office" => Ok(Role::BudgetOffice),
            "dean" => Ok(Role::Dean),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

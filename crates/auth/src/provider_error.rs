//! Identity-provider error codes and the sentences shown for them.
//!
//! Raw codes go to logs; users only ever see [`ProviderError::user_message`].

use thiserror::Error;

/// Opaque failure reported by the identity provider.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("auth/user-not-found")]
    UserNotFound,
    #[error("auth/wrong-password")]
    WrongPassword,
    #[error("auth/invalid-credential")]
    InvalidCredential,
    #[error("auth/invalid-email")]
    InvalidEmail,
    #[error("auth/user-disabled")]
    UserDisabled,
    #[error("auth/email-already-in-use")]
    EmailAlreadyInUse,
    #[error("auth/weak-password")]
    WeakPassword,
    #[error("auth/too-many-requests")]
    TooManyRequests,
    #[error("auth/network-request-failed")]
    NetworkRequestFailed,
    #[error("auth/popup-blocked")]
    PopupBlocked,
    #[error("auth/popup-closed-by-user")]
    PopupClosedByUser,
    #[error("auth/operation-not-allowed")]
    OperationNotAllowed,
    #[error("auth/requires-recent-login")]
    RequiresRecentLogin,
    #[error("auth/expired-action-code")]
    ExpiredActionCode,
    #[error("auth/invalid-action-code")]
    InvalidActionCode,
    /// Any code not in the table.
    #[error("{0}")]
    Unknown(String),
}

pub const FALLBACK_MESSAGE: &str = "An unexpected error occurred. Please try again.";

impl ProviderError {
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "auth/user-not-found" => ProviderError::UserNotFound,
            "auth/wrong-password" => ProviderError::WrongPassword,
            "auth/invalid-credential" => ProviderError::InvalidCredential,
            "auth/invalid-email" => ProviderError::InvalidEmail,
            "auth/user-disabled" => ProviderError::UserDisabled,
            "auth/email-already-in-use" => ProviderError::EmailAlreadyInUse,
            "auth/weak-password" => ProviderError::WeakPassword,
            "auth/too-many-requests" => ProviderError::TooManyRequests,
            "auth/network-request-failed" => ProviderError::NetworkRequestFailed,
            "auth/popup-blocked" => ProviderError::PopupBlocked,
            "auth/popup-closed-by-user" => ProviderError::PopupClosedByUser,
            "auth/operation-not-allowed" => ProviderError::OperationNotAllowed,
            "auth/requires-recent-login" => ProviderError::RequiresRecentLogin,
            "auth/expired-action-code" => ProviderError::ExpiredActionCode,
            "auth/invalid-action-code" => ProviderError::InvalidActionCode,
            other => ProviderError::Unknown(other.to_string()),
        }
    }

    /// The raw provider code.
    pub fn code(&self) -> String {
        self.to_string()
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            ProviderError::UserNotFound => "No account found with this email address.",
            ProviderError::WrongPassword => "Incorrect password. Please try again.",
            ProviderError::InvalidCredential => {
                "Invalid email or password. Please check your credentials and try again."
            }
            ProviderError::InvalidEmail => "Please enter a valid email address.",
            ProviderError::UserDisabled => "This account has been disabled. Please contact support.",
            ProviderError::EmailAlreadyInUse => "An account with this email address already exists.",
            ProviderError::WeakPassword => "Password is too weak. Please choose a stronger password.",
            ProviderError::TooManyRequests => "Too many failed login attempts. Please try again later.",
            ProviderError::NetworkRequestFailed => {
                "Network error. Please check your internet connection and try again."
            }
            ProviderError::PopupBlocked => {
                "Sign-in popup was blocked by your browser. Please allow popups and try again."
            }
            ProviderError::PopupClosedByUser => "Sign-in was cancelled. Please try again.",
            ProviderError::OperationNotAllowed => {
                "This sign-in method is not enabled. Please contact support."
            }
            ProviderError::RequiresRecentLogin => "Please sign in again to complete this action.",
            ProviderError::ExpiredActionCode => "This link has expired. Please request a new one.",
            ProviderError::InvalidActionCode => "This link is invalid or has already been used.",
            ProviderError::Unknown(_) => FALLBACK_MESSAGE,
        }
    }
}

/// Map a raw code straight to its user-facing sentence.
pub fn message_for_code(code: &str) -> &'static str {
    ProviderError::from_code(code).user_message()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN: [&str; 15] = [
        "auth/user-not-found",
        "auth/wrong-password",
        "auth/invalid-credential",
        "auth/invalid-email",
        "auth/user-disabled",
        "auth/email-already-in-use",
        "auth/weak-password",
        "auth/too-many-requests",
        "auth/network-request-failed",
        "auth/popup-blocked",
        "auth/popup-closed-by-user",
        "auth/operation-not-allowed",
        "auth/requires-recent-login",
        "auth/expired-action-code",
        "auth/invalid-action-code",
    ];

    #[test]
    fn too_many_requests_sentence() {
        assert_eq!(
            message_for_code("auth/too-many-requests"),
            "Too many failed login attempts. Please try again later."
        );
    }

    #[test]
    fn unknown_code_gets_fallback() {
        let e = ProviderError::from_code("auth/x-unknown");
        assert_eq!(e, ProviderError::Unknown("auth/x-unknown".to_string()));
        assert_eq!(e.user_message(), FALLBACK_MESSAGE);
        assert_eq!(e.code(), "auth/x-unknown");
    }

    #[test]
    fn known_codes_round_trip_and_have_specific_messages() {
        for code in KNOWN {
            let e = ProviderError::from_code(code);
            assert_eq!(e.code(), code);
            assert_ne!(e.user_message(), FALLBACK_MESSAGE, "{code}");
            assert!(!e.user_message().contains("auth/"), "{code}");
        }
    }
}

//! Form validation.
//!
//! Purely local: nothing here talks to the identity provider, and every
//! failure is reported against the field that caused it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::RegistrationDetails;

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Email,
    Password,
    ConfirmPassword,
    DisplayName,
}

/// One password strength rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PasswordRule {
    MinLength,
    Uppercase,
    Lowercase,
    Digit,
    SpecialCharacter,
}

impl PasswordRule {
    pub const ALL: [PasswordRule; 5] = [
        PasswordRule::MinLength,
        PasswordRule::Uppercase,
        PasswordRule::Lowercase,
        PasswordRule::Digit,
        PasswordRule::SpecialCharacter,
    ];

    pub fn is_satisfied_by(&self, password: &str) -> bool {
        match self {
            PasswordRule::MinLength => password.chars().count() >= MIN_PASSWORD_LENGTH,
            PasswordRule::Uppercase => password.chars().any(char::is_uppercase),
            PasswordRule::Lowercase => password.chars().any(char::is_lowercase),
            PasswordRule::Digit => password.chars().any(|c| c.is_ascii_digit()),
            PasswordRule::SpecialCharacter => password
                .chars()
                .any(|c| !c.is_alphanumeric() && !c.is_whitespace()),
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            PasswordRule::MinLength => "Password must be at least 8 characters long.",
            PasswordRule::Uppercase => "Password must contain at least one uppercase letter.",
            PasswordRule::Lowercase => "Password must contain at least one lowercase letter.",
            PasswordRule::Digit => "Password must contain at least one number.",
            PasswordRule::SpecialCharacter => {
                "Password must contain at least one special character."
            }
        }
    }
}

/// Every rule the password breaks, in [`PasswordRule::ALL`] order.
pub fn password_violations(password: &str) -> Vec<PasswordRule> {
    PasswordRule::ALL
        .into_iter()
        .filter(|rule| !rule.is_satisfied_by(password))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

/// All field errors of one form submission.
#[derive(Debug, Error, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[error("{} invalid field(s)", .errors.len())]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    fn push(&mut self, field: Field, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn for_field(&self, field: Field) -> impl Iterator<Item = &str> {
        self.errors
            .iter()
            .filter(move |e| e.field == field)
            .map(|e| e.message.as_str())
    }

    /// First message, for forms that show a single inline error.
    pub fn first_message(&self) -> Option<&str> {
        self.errors.first().map(|e| e.message.as_str())
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

/// Format check for an email address. Returns the trimmed address.
pub fn validate_email(email: &str) -> Result<&str, &'static str> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Email is required.");
    }

    let invalid = "Please enter a valid email address.";
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid);
    };
    if local.is_empty() || email.chars().any(char::is_whitespace) {
        return Err(invalid);
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid);
    }

    Ok(email)
}

/// Sign-in form: well-formed email and a non-empty password.
///
/// Strength rules are not applied here; existing accounts may predate them.
pub fn validate_sign_in(email: &str, password: &str) -> Result<(), ValidationErrors> {
    let mut errs = ValidationErrors::default();
    if let Err(msg) = validate_email(email) {
        errs.push(Field::Email, msg);
    }
    if password.is_empty() {
        errs.push(Field::Password, "Password is required.");
    }
    errs.into_result()
}

pub fn validate_password_reset(email: &str) -> Result<(), ValidationErrors> {
    let mut errs = ValidationErrors::default();
    if let Err(msg) = validate_email(email) {
        errs.push(Field::Email, msg);
    }
    errs.into_result()
}

/// Registration form as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(flatten)]
    pub details: RegistrationDetails,
}

pub fn validate_registration(form: &RegistrationForm) -> Result<(), ValidationErrors> {
    let mut errs = ValidationErrors::default();

    if let Err(msg) = validate_email(&form.email) {
        errs.push(Field::Email, msg);
    }
    for rule in password_violations(&form.password) {
        errs.push(Field::Password, rule.message());
    }
    if form.confirm_password != form.password {
        errs.push(Field::ConfirmPassword, "Passwords do not match.");
    }
    if form.details.display_name.trim().is_empty() {
        errs.push(Field::DisplayName, "Full name is required.");
    }

    errs.into_result()
}

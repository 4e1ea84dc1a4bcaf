//! Environment configuration.

use thiserror::Error;

use panelhub_auth::GatePolicy;
use panelhub_observability::LogConfig;

pub const ENV_REQUIRE_EMAIL_VERIFICATION: &str = "PANELHUB_REQUIRE_EMAIL_VERIFICATION";
pub const ENV_REQUIRE_TEACHER_APPROVAL: &str = "PANELHUB_REQUIRE_TEACHER_APPROVAL";
pub const ENV_MAX_FAILED_SIGN_INS: &str = "PANELHUB_MAX_FAILED_SIGN_INS";
pub const ENV_LOG_FILTER: &str = "PANELHUB_LOG_FILTER";
pub const ENV_LOG_JSON: &str = "PANELHUB_LOG_JSON";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub require_email_verification: bool,
    pub require_teacher_approval: bool,
    /// Consecutive failed password sign-ins before the in-memory provider
    /// answers `auth/too-many-requests`.
    pub max_failed_sign_ins: u32,
    pub log_filter: String,
    pub log_json: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            require_email_verification: true,
            require_teacher_approval: true,
            max_failed_sign_ins: 5,
            log_filter: "info".to_string(),
            log_json: true,
        }
    }
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same parsing as [`AuthConfig::from_env`] over an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let require_email_verification = match lookup(ENV_REQUIRE_EMAIL_VERIFICATION) {
            Some(v) => parse_bool(ENV_REQUIRE_EMAIL_VERIFICATION, &v)?,
            None => defaults.require_email_verification,
        };

        let require_teacher_approval = match lookup(ENV_REQUIRE_TEACHER_APPROVAL) {
            Some(v) => parse_bool(ENV_REQUIRE_TEACHER_APPROVAL, &v)?,
            None => defaults.require_teacher_approval,
        };

        let max_failed_sign_ins = match lookup(ENV_MAX_FAILED_SIGN_INS) {
            Some(v) => v.trim().parse::<u32>().map_err(|e| ConfigError::InvalidValue {
                key: ENV_MAX_FAILED_SIGN_INS,
                value: v.clone(),
                reason: e.to_string(),
            })?,
            None => defaults.max_failed_sign_ins,
        };

        let log_filter = lookup(ENV_LOG_FILTER)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.log_filter);

        let log_json = match lookup(ENV_LOG_JSON) {
            Some(v) => parse_bool(ENV_LOG_JSON, &v)?,
            None => defaults.log_json,
        };

        Ok(Self {
            require_email_verification,
            require_teacher_approval,
            max_failed_sign_ins,
            log_filter,
            log_json,
        })
    }

    pub fn gate_policy(&self) -> GatePolicy {
        GatePolicy {
            require_email_verification: self.require_email_verification,
            require_teacher_approval: self.require_teacher_approval,
        }
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            filter: self.log_filter.clone(),
            json: self.log_json,
        }
    }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
            reason: "expected a boolean (true/false, 1/0, yes/no, on/off)".to_string(),
        }),
    }
}

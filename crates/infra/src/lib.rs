//! Infrastructure layer: configuration, identity provider and profile store
//! adapters, session context, and the account flows that tie them together.

pub mod account;
pub mod config;
pub mod identity;
pub mod profile_store;
pub mod session_context;
pub mod session_listener;

pub use account::{AccountAction, AccountError, AccountService, SignInOutcome};
pub use config::{AuthConfig, ConfigError};
pub use identity::{IdentityProvider, InMemoryIdentityProvider, OutboundKind, OutboundMessage};
pub use profile_store::{InMemoryProfileStore, ProfileStore, StoreError};
pub use session_context::SessionContext;
pub use session_listener::{ListenerHandle, SessionListener};

//! `panelhub-core`: shared domain primitives for the research panel system.
//!
//! Pure types only: no IO, no logging setup, no storage.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::ProfileId;

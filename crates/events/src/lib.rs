//! Notification fan-out.
//!
//! Used for the one long-lived "session changed" subscription the application
//! registers at startup. Payload types live with their domain; this crate
//! only moves messages.

pub mod bus;
pub mod in_memory_bus;

pub use bus::{NotificationBus, Subscription};
pub use in_memory_bus::{InMemoryNotificationBus, InMemoryBusError};

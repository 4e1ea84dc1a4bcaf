//! Injected holder of the current session snapshot.

use std::sync::{Arc, RwLock};

use panelhub_auth::SessionState;

/// Current [`SessionState`], shared by reference with whoever needs it.
///
/// Readers get an `Arc` to a complete snapshot; writers swap in a whole new
/// value. There is exactly one of these per application instance and it is
/// passed in explicitly, never reached through a global.
#[derive(Debug, Default)]
pub struct SessionContext {
    current: RwLock<Arc<SessionState>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Arc<SessionState> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Unconditionally install `next`.
    pub fn replace(&self, next: SessionState) -> Arc<SessionState> {
        let next = Arc::new(next);
        match self.current.write() {
            Ok(mut guard) => *guard = Arc::clone(&next),
            Err(poisoned) => *poisoned.into_inner() = Arc::clone(&next),
        }
        next
    }

    /// Install `next` unless it is an older snapshot of the same account.
    ///
    /// Notifications can arrive after a newer profile was already installed
    /// by the flow that caused them; `updated_at` decides which one wins.
    /// Returns whether the snapshot changed.
    pub fn observe(&self, next: SessionState) -> bool {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let (Some(current), Some(incoming)) = (guard.profile(), next.profile()) {
            if current.id == incoming.id && current.updated_at > incoming.updated_at {
                return false;
            }
        }
        if **guard == next {
            return false;
        }

        *guard = Arc::new(next);
        true
    }
}

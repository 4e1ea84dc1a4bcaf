//! In-process bus.

use std::sync::{Mutex, mpsc};

use thiserror::Error;
use tracing::debug;

use crate::bus::{NotificationBus, Subscription};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InMemoryBusError {
    /// Internal lock poisoned by a panicking publisher.
    #[error("notification bus lock poisoned")]
    Poisoned,

    #[error("notification bus closed")]
    Closed,
}

#[derive(Debug)]
struct Inner<M> {
    subscribers: Vec<mpsc::Sender<M>>,
    closed: bool,
}

/// Channel-backed fan-out.
///
/// - No IO / no async
/// - Messages are cloned per subscriber
/// - `close` disconnects every subscription (application teardown)
#[derive(Debug)]
pub struct InMemoryNotificationBus<M> {
    inner: Mutex<Inner<M>>,
}

impl<M> InMemoryNotificationBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live subscriptions as of the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().map(|i| i.subscribers.len()).unwrap_or(0)
    }

    /// Drop all senders. Subscribers see `Disconnected`; later publishes fail.
    pub fn close(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.closed = true;
            inner.subscribers.clear();
        }
    }
}

impl<M> Default for InMemoryNotificationBus<M> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                subscribers: Vec::new(),
                closed: false,
            }),
        }
    }
}

impl<M> NotificationBus<M> for InMemoryNotificationBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut inner = self.inner.lock().map_err(|_| InMemoryBusError::Poisoned)?;
        if inner.closed {
            return Err(InMemoryBusError::Closed);
        }

        let before = inner.subscribers.len();
        inner.subscribers.retain(|tx| tx.send(message.clone()).is_ok());
        let pruned = before - inner.subscribers.len();
        if pruned > 0 {
            debug!(pruned, "dropped disconnected subscribers");
        }

        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();

        // On a poisoned or closed bus the subscription is returned already
        // disconnected.
        if let Ok(mut inner) = self.inner.lock() {
            if !inner.closed {
                inner.subscribers.push(tx);
            }
        }

        Subscription::new(rx)
    }
}

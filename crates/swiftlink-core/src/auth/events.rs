use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::debug;

/// Session lifecycle notifications. Carries no payload beyond its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionEvent {
    /// Credentials were discarded after a failed renewal; the user must log in again.
    Terminated,
}

type Handler = Arc<dyn Fn(SessionEvent) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    handlers: Vec<(u64, Handler)>,
}

/// Publish/subscribe channel for session events.
///
/// Handlers run synchronously on the publishing task, in the order they
/// subscribed. Clones share one subscriber list; the bus lives as long as
/// the client scope that created it.
#[derive(Clone, Default)]
pub struct SessionEventBus {
    inner: Arc<Mutex<Subscribers>>,
}

impl SessionEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(SessionEvent) + Send + Sync + 'static,
    {
        let mut subs = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = subs.next_id;
        subs.next_id += 1;
        subs.handlers.push((id, Arc::new(handler)));

        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    pub fn publish(&self, event: SessionEvent) {
        // Snapshot so handlers may (un)subscribe without deadlocking.
        let handlers: Vec<Handler> = {
            let subs = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            subs.handlers.iter().map(|(_, h)| Arc::clone(h)).collect()
        };
        debug!(?event, subscribers = handlers.len(), "Publishing session event");
        for handler in handlers {
            handler(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handlers
            .len()
    }
}

/// Handle returned by `SessionEventBus::subscribe`.
/// Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    bus: Weak<Mutex<Subscribers>>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            let mut subs = inner.lock().unwrap_or_else(PoisonError::into_inner);
            subs.handlers.retain(|(id, _)| *id != self.id);
        }
    }
}

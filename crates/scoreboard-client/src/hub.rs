//! Ordered subscriber lists with synchronous, serialized delivery
//!
//! A [`Subscribers`] list calls every callback in registration order, on the
//! thread that publishes. Publication rounds and replays to new subscribers
//! pass through a shared [`DeliveryGate`] so they never interleave across
//! threads. A callback may re-enter the hub from inside a round (subscribe,
//! unsubscribe, publish) without deadlocking: the gate is reentrant for the
//! thread that holds it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

/// Shared callback type
pub type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

// ---------------------------------------------------------------------------
// DeliveryGate
// ---------------------------------------------------------------------------

/// Reentrant serialization point for notification rounds.
#[derive(Debug, Default)]
pub struct DeliveryGate {
    lock: ReentrantMutex<()>,
}

impl DeliveryGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn enter(&self) -> ReentrantMutexGuard<'_, ()> {
        self.lock.lock()
    }
}

// ---------------------------------------------------------------------------
// Subscribers
// ---------------------------------------------------------------------------

struct Registry<T> {
    entries: Mutex<Vec<(u64, Callback<T>)>>,
    next_id: AtomicU64,
    gate: Arc<DeliveryGate>,
}

trait Detach: Send + Sync {
    fn detach(&self, id: u64);
}

impl<T: 'static> Detach for Registry<T> {
    fn detach(&self, id: u64) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|(entry, _)| *entry != id);
    }
}

/// Insertion-ordered callback list
pub struct Subscribers<T> {
    registry: Arc<Registry<T>>,
}

impl<T> Clone for Subscribers<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T: 'static> std::fmt::Debug for Subscribers<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers")
            .field("len", &self.len())
            .finish()
    }
}

impl<T: 'static> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new(DeliveryGate::new())
    }
}

impl<T: 'static> Subscribers<T> {
    /// Create a list that serializes delivery through `gate`
    pub fn new(gate: Arc<DeliveryGate>) -> Self {
        Self {
            registry: Arc::new(Registry {
                entries: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                gate,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.registry
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register `callback` without replay
    pub fn subscribe(&self, callback: Callback<T>) -> Subscription {
        self.subscribe_with(callback, || None)
    }

    /// Register `callback` and, while holding the gate, deliver whatever
    /// `replay` yields to it alone.
    pub fn subscribe_with<F>(&self, callback: Callback<T>, replay: F) -> Subscription
    where
        F: FnOnce() -> Option<T>,
    {
        let _gate = self.registry.gate.enter();
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::clone(&callback)));

        if let Some(current) = replay() {
            callback(&current);
        }

        let registry: Arc<dyn Detach> = self.registry.clone();
        Subscription {
            id,
            registry: Arc::downgrade(&registry),
        }
    }

    /// Deliver `value` to every subscriber in registration order
    pub fn publish(&self, value: &T) {
        let _gate = self.registry.gate.enter();
        self.deliver(value);
    }

    /// Run `update` under the gate and deliver its result, if any.
    ///
    /// Lets the caller swap shared state and notify as one step, so a
    /// concurrent replay sees either the old value with no round pending or
    /// the new value after the round.
    pub fn publish_with<F>(&self, update: F) -> bool
    where
        F: FnOnce() -> Option<T>,
    {
        let _gate = self.registry.gate.enter();
        match update() {
            Some(value) => {
                self.deliver(&value);
                true
            }
            None => false,
        }
    }

    fn deliver(&self, value: &T) {
        // Round runs over the list as it was when it began
        let round: Vec<Callback<T>> = self
            .registry
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in round {
            callback(value);
        }
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Handle returned by every `subscribe` call.
///
/// Dropping the handle does **not** unsubscribe; call
/// [`Subscription::unsubscribe`] to remove the callback.
#[must_use = "dropping a Subscription keeps the callback registered; call unsubscribe() to remove it"]
pub struct Subscription {
    id: u64,
    registry: Weak<dyn Detach>,
}

impl Subscription {
    /// Remove exactly this callback. No-op if the list is gone.
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.detach(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

//! Local mirror of server state

use std::sync::{Arc, Mutex};

use scoreboard_core::prelude::*;
use scoreboard_core::{Patch, Snapshot};

use crate::hub::{Callback, DeliveryGate, Subscribers, Subscription};

/// Holds the current [`Snapshot`] and notifies subscribers on every accepted
/// initial-state or patch frame.
pub struct StateStore {
    snapshot: Mutex<Option<Snapshot>>,
    subscribers: Subscribers<Snapshot>,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("has_snapshot", &self.current().is_some())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(DeliveryGate::new())
    }
}

impl StateStore {
    pub fn new(gate: Arc<DeliveryGate>) -> Self {
        Self {
            snapshot: Mutex::new(None),
            subscribers: Subscribers::new(gate),
        }
    }

    pub fn current(&self) -> Option<Snapshot> {
        self.snapshot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Register `callback`; it receives the current snapshot immediately when
    /// one exists
    pub fn subscribe(&self, callback: Callback<Snapshot>) -> Subscription {
        self.subscribers.subscribe_with(callback, || self.current())
    }

    /// Replace the snapshot wholesale and notify.
    ///
    /// A root that is not an object (`null` included) means the server has no
    /// game: the snapshot is cleared, nobody is notified and later patches are
    /// ignored until the next object arrives. Returns whether subscribers were
    /// notified.
    pub fn replace(&self, snapshot: Snapshot) -> bool {
        self.subscribers.publish_with(|| {
            let mut guard = self.snapshot.lock().unwrap_or_else(|e| e.into_inner());
            if snapshot.root().as_object().is_none() {
                warn!("Initial state is not an object; clearing snapshot");
                *guard = None;
                return None;
            }
            *guard = Some(snapshot.clone());
            Some(snapshot)
        })
    }

    /// Apply `patch` to the current snapshot and notify.
    ///
    /// Returns `false` (and notifies nobody) when there is no snapshot yet.
    pub fn apply_patch(&self, patch: &Patch) -> bool {
        self.subscribers.publish_with(|| {
            let mut guard = self.snapshot.lock().unwrap_or_else(|e| e.into_inner());
            let Some(base) = guard.as_ref() else {
                warn!(
                    "Ignoring patch with {} entr(ies): no initial state yet",
                    patch.len()
                );
                return None;
            };
            let next = base.apply(patch);
            *guard = Some(next.clone());
            Some(next)
        })
    }
}

//! Cluster-wide room cache and replication bus
//!
//! Plays the part a shared key-value store plays for separate processes:
//! one authoritative copy per tournament code, a monotonically increasing
//! version per write, a pub/sub channel every worker listens on, and a
//! per-code mutex that serializes read-modify-write cycles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use draft_core::RoomState;
use tokio::sync::{broadcast, OwnedMutexGuard};
use tracing::{debug, error};

use crate::event::AuctionEvent;

/// Index of a worker within a cluster
pub type WorkerId = usize;

/// A committed room write and the events it produced
#[derive(Debug, Clone)]
pub struct RoomUpdate {
    pub code: String,
    pub origin: WorkerId,
    pub state: Arc<RoomState>,
    pub events: Vec<AuctionEvent>,
}

/// Message on the replication bus
#[derive(Debug, Clone)]
pub enum Replication {
    Updated(RoomUpdate),
    Evicted { code: String },
}

impl Replication {
    pub fn code(&self) -> &str {
        match self {
            Replication::Updated(update) => &update.code,
            Replication::Evicted { code } => code,
        }
    }
}

pub struct SharedCache {
    rooms: Mutex<HashMap<String, Arc<RoomState>>>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    next_version: AtomicU64,
    bus: broadcast::Sender<Replication>,
}

fn recover<'a, T>(
    result: std::sync::LockResult<MutexGuard<'a, T>>,
    what: &str,
) -> MutexGuard<'a, T> {
    match result {
        Ok(guard) => guard,
        Err(poisoned) => {
            error!(what, "Cache mutex poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl SharedCache {
    pub fn new(capacity: usize) -> Self {
        let (bus, _) = broadcast::channel(capacity.max(1));
        Self {
            rooms: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            next_version: AtomicU64::new(1),
            bus,
        }
    }

    pub fn get(&self, code: &str) -> Option<Arc<RoomState>> {
        recover(self.rooms.lock(), "rooms").get(code).cloned()
    }

    pub fn version(&self, code: &str) -> Option<u64> {
        recover(self.rooms.lock(), "rooms").get(code).map(|r| r.version)
    }

    /// Store a new copy under a fresh version and return it
    pub fn set(&self, code: &str, mut state: RoomState) -> Arc<RoomState> {
        state.version = self.next_version.fetch_add(1, Ordering::SeqCst);
        let state = Arc::new(state);
        recover(self.rooms.lock(), "rooms").insert(code.to_string(), Arc::clone(&state));
        state
    }

    pub fn remove(&self, code: &str) -> Option<Arc<RoomState>> {
        recover(self.rooms.lock(), "rooms").remove(code)
    }

    pub fn publish(&self, message: Replication) {
        // No subscribers is not an error: nobody is listening yet
        if self.bus.send(message).is_err() {
            debug!("Replication published with no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Replication> {
        self.bus.subscribe()
    }

    /// Acquire the serializing lock for one tournament code
    pub async fn lock(&self, code: &str) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = recover(self.locks.lock(), "locks");
            Arc::clone(locks.entry(code.to_string()).or_default())
        };
        mutex.lock_owned().await
    }

    /// Release a code's lock and forget its mutex unless someone else
    /// is holding or waiting on it
    pub fn unlock_and_forget(&self, code: &str, guard: OwnedMutexGuard<()>) {
        let mut locks = recover(self.locks.lock(), "locks");
        // The map and `guard` each hold one reference
        if locks.get(code).is_some_and(|mutex| Arc::strong_count(mutex) <= 2) {
            locks.remove(code);
        }
        drop(guard);
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        recover(self.locks.lock(), "locks").len()
    }
}

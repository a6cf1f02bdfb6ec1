//! Per-worker room store
//!
//! Reads prefer the worker's own cache while its version matches the shared
//! copy. Writes go through [`RoomStore::begin`] and [`RoomStore::commit`],
//! which hold the per-code lock for the whole read-modify-write cycle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use draft_core::invariants::assert_room_invariants;
use draft_core::{AuctionRepository, Error, Result, RoomState};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info};

use crate::cache::{Replication, RoomUpdate, SharedCache, WorkerId};
use crate::event::AuctionEvent;

/// Durable storage shared by every worker and the persister
pub type SharedStore = Arc<Mutex<dyn AuctionRepository + Send>>;

pub(crate) fn lock_storage(
    storage: &SharedStore,
) -> MutexGuard<'_, dyn AuctionRepository + Send + 'static> {
    match storage.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            error!("Storage mutex poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// An open read-modify-write cycle on one room. Dropping it without a
/// commit releases the lock and leaves the room untouched.
pub struct RoomTxn {
    code: String,
    state: Arc<RoomState>,
    _guard: OwnedMutexGuard<()>,
}

impl RoomTxn {
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn state(&self) -> &RoomState {
        &self.state
    }

    pub fn snapshot(&self) -> Arc<RoomState> {
        Arc::clone(&self.state)
    }
}

pub struct RoomStore {
    worker: WorkerId,
    local: RwLock<HashMap<String, Arc<RoomState>>>,
    shared: Arc<SharedCache>,
    storage: SharedStore,
    default_timer: u32,
}

impl RoomStore {
    pub fn new(
        worker: WorkerId,
        shared: Arc<SharedCache>,
        storage: SharedStore,
        default_timer: u32,
    ) -> Self {
        Self {
            worker,
            local: RwLock::new(HashMap::new()),
            shared,
            storage,
            default_timer,
        }
    }

    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    pub fn shared(&self) -> &Arc<SharedCache> {
        &self.shared
    }

    fn local_get(&self, code: &str) -> Option<Arc<RoomState>> {
        match self.local.read() {
            Ok(local) => local.get(code).cloned(),
            Err(poisoned) => poisoned.into_inner().get(code).cloned(),
        }
    }

    fn local_put(&self, code: &str, state: Arc<RoomState>) {
        let mut local = match self.local.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!(worker = self.worker, "Local cache poisoned, recovering");
                poisoned.into_inner()
            }
        };
        let newer = local.get(code).map_or(true, |current| current.version < state.version);
        if newer {
            local.insert(code.to_string(), state);
        }
    }

    fn local_remove(&self, code: &str) {
        match self.local.write() {
            Ok(mut local) => local.remove(code),
            Err(poisoned) => poisoned.into_inner().remove(code),
        };
    }

    /// Newest known copy without taking the lock
    fn current(&self, code: &str) -> Option<Arc<RoomState>> {
        let shared_version = self.shared.version(code)?;
        if let Some(local) = self.local_get(code) {
            if local.version == shared_version {
                return Some(local);
            }
        }
        let shared = self.shared.get(code)?;
        self.local_put(code, Arc::clone(&shared));
        Some(shared)
    }

    /// Snapshot for reads. Hydrates the room on first access.
    pub async fn get(&self, code: &str) -> Result<Arc<RoomState>> {
        if let Some(room) = self.current(code) {
            return Ok(room);
        }
        Ok(self.begin(code).await?.snapshot())
    }

    /// Lock the room and load its authoritative copy
    pub async fn begin(&self, code: &str) -> Result<RoomTxn> {
        let guard = self.shared.lock(code).await;

        let state = match self.current(code) {
            Some(state) => state,
            None => {
                let hydrated = self.hydrate(code).await?;
                let stored = self.shared.set(code, hydrated);
                self.local_put(code, Arc::clone(&stored));
                self.shared.publish(Replication::Updated(RoomUpdate {
                    code: code.to_string(),
                    origin: self.worker,
                    state: Arc::clone(&stored),
                    events: Vec::new(),
                }));
                info!(code, worker = self.worker, version = stored.version, "Room hydrated");
                stored
            }
        };

        Ok(RoomTxn {
            code: code.to_string(),
            state,
            _guard: guard,
        })
    }

    async fn hydrate(&self, code: &str) -> Result<RoomState> {
        let storage = Arc::clone(&self.storage);
        let lookup = code.to_string();
        let default_timer = self.default_timer;

        let loaded = tokio::task::spawn_blocking(move || {
            let store = lock_storage(&storage);
            store.load_room(&lookup, default_timer)
        })
        .await
        .map_err(|e| Error::PersistenceFailure(format!("hydration task failed: {}", e)))??;

        loaded.ok_or_else(|| Error::TournamentNotFound(code.to_string()))
    }

    /// Publish a new state for the locked room.
    ///
    /// The lock stays held until the transaction is dropped, so durable
    /// jobs queued before that keep per-room order.
    pub fn commit(
        &self,
        txn: &mut RoomTxn,
        state: RoomState,
        events: Vec<AuctionEvent>,
    ) -> Arc<RoomState> {
        assert_room_invariants(&state);

        let stored = self.shared.set(&txn.code, state);
        self.local_put(&txn.code, Arc::clone(&stored));
        debug!(
            code = %txn.code,
            version = stored.version,
            events = events.len(),
            "Room committed"
        );
        self.shared.publish(Replication::Updated(RoomUpdate {
            code: txn.code.clone(),
            origin: self.worker,
            state: Arc::clone(&stored),
            events,
        }));
        txn.state = Arc::clone(&stored);
        stored
    }

    /// Drop the room from every cache
    pub async fn evict(&self, code: &str) {
        let guard = self.shared.lock(code).await;
        self.shared.remove(code);
        self.local_remove(code);
        self.shared.publish(Replication::Evicted {
            code: code.to_string(),
        });
        self.shared.unlock_and_forget(code, guard);
    }

    /// Keep the local cache in step with the bus
    pub fn apply(&self, message: &Replication) {
        match message {
            Replication::Updated(update) => self.local_put(&update.code, Arc::clone(&update.state)),
            Replication::Evicted { code } => self.local_remove(code),
        }
    }

    /// Forget local copies after missing bus messages
    pub fn resync(&self) {
        match self.local.write() {
            Ok(mut local) => local.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

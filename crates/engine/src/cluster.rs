//! Worker pool sharing one room cache, timer registry and persister

use std::sync::Arc;

use draft_core::DraftConfig;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{Replication, SharedCache, WorkerId};
use crate::engine::Engine;
use crate::persist::{PersistFailure, Persister};
use crate::store::{RoomStore, SharedStore};
use crate::timer::TimerRegistry;

pub struct Cluster {
    engines: Vec<Arc<Engine>>,
    shared: Arc<SharedCache>,
    timers: Arc<TimerRegistry>,
    persister: Persister,
    tasks: Vec<JoinHandle<()>>,
}

impl Cluster {
    /// Build `config.server.workers` engines over one storage backend.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn start(storage: SharedStore, config: &DraftConfig) -> Self {
        let workers = config.server.workers.max(1);
        let shared = Arc::new(SharedCache::new(config.auction.replication_capacity));
        let timers = Arc::new(TimerRegistry::new());
        let (persister, failures, writer) =
            Persister::spawn(Arc::clone(&storage), config.persistence.clone());

        let mut tasks = vec![writer];
        let engines: Vec<Arc<Engine>> = (0..workers)
            .map(|worker| {
                let rooms = RoomStore::new(
                    worker,
                    Arc::clone(&shared),
                    Arc::clone(&storage),
                    config.auction.timer_seconds,
                );
                Arc::new(Engine::new(
                    rooms,
                    Arc::clone(&timers),
                    persister.clone(),
                    config.auction.clone(),
                ))
            })
            .collect();

        for engine in &engines {
            // Subscribe here so nothing committed after start is missed
            let bus = engine.subscribe();
            tasks.push(tokio::spawn(replicate(Arc::clone(engine), bus)));
        }
        tasks.push(tokio::spawn(route_failures(Arc::clone(&engines[0]), failures)));

        info!(workers, "Cluster started");
        Self {
            engines,
            shared,
            timers,
            persister,
            tasks,
        }
    }

    pub fn engine(&self, worker: WorkerId) -> Option<&Arc<Engine>> {
        self.engines.get(worker)
    }

    pub fn engines(&self) -> &[Arc<Engine>] {
        &self.engines
    }

    pub fn shared(&self) -> &Arc<SharedCache> {
        &self.shared
    }

    pub fn persister(&self) -> &Persister {
        &self.persister
    }

    /// Wait for every queued durable write
    pub async fn flush(&self) {
        self.persister.flush().await;
    }

    /// Stop timers, drain the write queue and end background tasks
    pub async fn shutdown(self) {
        self.timers.stop_all();
        self.persister.flush().await;
        for task in self.tasks {
            task.abort();
        }
        info!("Cluster stopped");
    }
}

async fn replicate(engine: Arc<Engine>, mut bus: broadcast::Receiver<Replication>) {
    loop {
        match bus.recv().await {
            Ok(message) => engine.rooms().apply(&message),
            Err(RecvError::Lagged(skipped)) => {
                warn!(
                    worker = engine.worker(),
                    skipped,
                    "Replication lagged, dropping local copies"
                );
                engine.rooms().resync();
            }
            Err(RecvError::Closed) => break,
        }
    }
    debug!(worker = engine.worker(), "Replication stopped");
}

async fn route_failures(
    engine: Arc<Engine>,
    mut failures: mpsc::UnboundedReceiver<PersistFailure>,
) {
    while let Some(failure) = failures.recv().await {
        let reason = format!("{} could not be saved: {}", failure.job, failure.reason);
        engine.mark_degraded(&failure.code, reason).await;
    }
}

//! Write-behind persistence
//!
//! Rooms are broadcast first and written afterwards. Jobs are applied in
//! submission order by a single task; each write runs on the blocking pool.
//! Failed writes are retried with exponential backoff, except timer ticks,
//! which are dropped on failure because the next tick supersedes them.

use std::sync::Arc;

use draft_core::config::PersistenceConfig;
use draft_core::{AuctionRow, BidRecord, Error, Result, SaleRecord, SkipVoteRecord};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::store::{lock_storage, SharedStore};

/// One durable side effect of a committed room change
#[derive(Debug, Clone)]
pub enum PersistJob {
    SaveAuction {
        code: String,
        row: AuctionRow,
        /// Timer ticks: one attempt, failures only logged
        best_effort: bool,
    },
    RecordBid {
        code: String,
        bid: BidRecord,
    },
    RecordSkipVote {
        code: String,
        vote: SkipVoteRecord,
    },
    CloseRound {
        code: String,
        sale: Option<SaleRecord>,
        next: AuctionRow,
    },
}

impl PersistJob {
    pub fn code(&self) -> &str {
        match self {
            PersistJob::SaveAuction { code, .. }
            | PersistJob::RecordBid { code, .. }
            | PersistJob::RecordSkipVote { code, .. }
            | PersistJob::CloseRound { code, .. } => code,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PersistJob::SaveAuction { .. } => "SaveAuction",
            PersistJob::RecordBid { .. } => "RecordBid",
            PersistJob::RecordSkipVote { .. } => "RecordSkipVote",
            PersistJob::CloseRound { .. } => "CloseRound",
        }
    }

    fn is_best_effort(&self) -> bool {
        matches!(self, PersistJob::SaveAuction { best_effort: true, .. })
    }
}

/// A job that exhausted its retries
#[derive(Debug, Clone)]
pub struct PersistFailure {
    pub code: String,
    pub job: &'static str,
    pub reason: String,
}

enum Envelope {
    Write(PersistJob),
    Flush(oneshot::Sender<()>),
}

/// Handle for queueing durable writes
#[derive(Clone)]
pub struct Persister {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl Persister {
    /// Start the writer task.
    ///
    /// Returns the handle, the channel on which exhausted jobs are reported,
    /// and the task itself.
    pub fn spawn(
        storage: SharedStore,
        policy: PersistenceConfig,
    ) -> (Self, mpsc::UnboundedReceiver<PersistFailure>, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (failure_tx, failure_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(writer_task(storage, policy, rx, failure_tx));
        (Self { tx }, failure_rx, task)
    }

    /// Queue a job. Never blocks, so it is safe to call under the room lock.
    pub fn submit(&self, job: PersistJob) {
        if let Err(e) = self.tx.send(Envelope::Write(job)) {
            if let Envelope::Write(job) = e.0 {
                error!(code = %job.code(), job = job.name(), "Persister stopped, job dropped");
            }
        }
    }

    /// Wait until every job queued before this call has been handled
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Envelope::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn writer_task(
    storage: SharedStore,
    policy: PersistenceConfig,
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    failures: mpsc::UnboundedSender<PersistFailure>,
) {
    while let Some(envelope) = rx.recv().await {
        match envelope {
            Envelope::Write(job) => write_with_retry(&storage, &policy, job, &failures).await,
            Envelope::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Persister stopped");
}

async fn write_with_retry(
    storage: &SharedStore,
    policy: &PersistenceConfig,
    job: PersistJob,
    failures: &mpsc::UnboundedSender<PersistFailure>,
) {
    let mut attempt = 1;
    loop {
        let err = match apply(Arc::clone(storage), job.clone()).await {
            Ok(()) => return,
            Err(e) => e,
        };

        if job.is_best_effort() {
            warn!(code = %job.code(), job = job.name(), error = %err, "Best-effort write skipped");
            return;
        }

        if attempt >= policy.max_attempts {
            error!(
                code = %job.code(),
                job = job.name(),
                attempts = attempt,
                error = %err,
                "Durable write failed, giving up"
            );
            let _ = failures.send(PersistFailure {
                code: job.code().to_string(),
                job: job.name(),
                reason: err.to_string(),
            });
            return;
        }

        let delay = policy.backoff(attempt);
        warn!(
            code = %job.code(),
            job = job.name(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Durable write failed, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

async fn apply(storage: SharedStore, job: PersistJob) -> Result<()> {
    tokio::task::spawn_blocking(move || {
        let store = lock_storage(&storage);
        match &job {
            PersistJob::SaveAuction { row, .. } => store.save_auction(row),
            PersistJob::RecordBid { bid, .. } => store.record_bid(bid),
            PersistJob::RecordSkipVote { vote, .. } => store.record_skip_vote(vote),
            PersistJob::CloseRound { sale, next, .. } => store.close_round(sale.as_ref(), next),
        }
    })
    .await
    .map_err(|e| Error::PersistenceFailure(format!("write task failed: {}", e)))?
}


#[cfg(test)]
mod tests {
    use super::testing::FlakyStore;
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use draft_core::{Database, RosterRepository, Tournament};

    fn setup(failures: u32) -> (SharedStore, Arc<AtomicU32>, AuctionRow) {
        let db = Database::open_in_memory().unwrap();
        let tournament = Tournament::with_code("Cup".to_string(), "PERS".to_string());
        db.create_tournament(&tournament).unwrap();
        let row = AuctionRow::new(tournament.id, 30);
        let counter = Arc::new(AtomicU32::new(failures));
        let store = FlakyStore {
            inner: db,
            failures: Arc::clone(&counter),
        };
        (Arc::new(Mutex::new(store)), counter, row)
    }

    fn stored_round(storage: &SharedStore) -> Option<u64> {
        let store = lock_storage(storage);
        store
            .load_room("PERS", 30)
            .unwrap()
            .map(|room| room.round)
    }

    fn policy() -> PersistenceConfig {
        PersistenceConfig {
            max_attempts: 3,
            initial_backoff_ms: 10,
            max_backoff_ms: 40,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_is_retried() {
        let (storage, counter, mut row) = setup(2);
        let (persister, mut failures, _task) = Persister::spawn(Arc::clone(&storage), policy());

        row.round = 4;
        persister.submit(PersistJob::SaveAuction {
            code: "PERS".to_string(),
            row,
            best_effort: false,
        });
        persister.flush().await;

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(stored_round(&storage), Some(4));
        assert!(failures.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_are_reported() {
        let (storage, _counter, row) = setup(10);
        let (persister, mut failures, _task) = Persister::spawn(storage, policy());

        persister.submit(PersistJob::CloseRound {
            code: "PERS".to_string(),
            sale: None,
            next: row,
        });
        persister.flush().await;

        let failure = failures.recv().await.unwrap();
        assert_eq!(failure.code, "PERS");
        assert_eq!(failure.job, "CloseRound");
        assert!(failure.reason.contains("disk unavailable"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_best_effort_is_not_retried() {
        let (storage, counter, mut row) = setup(1);
        let (persister, mut failures, _task) = Persister::spawn(Arc::clone(&storage), policy());

        row.current_timer = 12;
        persister.submit(PersistJob::SaveAuction {
            code: "PERS".to_string(),
            row,
            best_effort: true,
        });
        persister.flush().await;

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(failures.try_recv().is_err());
        // First load creates the row with defaults: the tick never landed
        assert_eq!(stored_round(&storage), Some(0));
    }

    #[tokio::test]
    async fn test_jobs_apply_in_order() {
        let (storage, _counter, row) = setup(0);
        let (persister, _failures, _task) = Persister::spawn(Arc::clone(&storage), policy());

        for round in 1..=5 {
            let mut next = row.clone();
            next.round = round;
            persister.submit(PersistJob::SaveAuction {
                code: "PERS".to_string(),
                row: next,
                best_effort: false,
            });
        }
        persister.flush().await;
        assert_eq!(stored_round(&storage), Some(5));
    }
}

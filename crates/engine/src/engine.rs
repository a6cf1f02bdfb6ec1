//! The auction engine for one worker
//!
//! Every mutation follows the same shape: lock the room, apply a round rule
//! to a copy, commit the copy (which broadcasts it), queue the durable
//! writes, then release the lock. A rule that fails drops the copy.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use draft_core::config::AuctionConfig;
use draft_core::invariants::assert_bid_monotonic;
use draft_core::round::{self, Rotation, RoundOutcome};
use draft_core::{BidMode, BidRecord, Countdown, Result, RoomState, SaleRecord, SkipVoteRecord};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cache::{Replication, WorkerId};
use crate::command::Command;
use crate::event::AuctionEvent;
use crate::persist::{PersistJob, Persister};
use crate::store::RoomStore;
use crate::timer::{TimerDriver, TimerPhase, TimerRegistry, TimerStep};

pub struct Engine {
    rooms: RoomStore,
    timers: Arc<TimerRegistry>,
    persister: Persister,
    config: AuctionConfig,
}

impl Engine {
    pub fn new(
        rooms: RoomStore,
        timers: Arc<TimerRegistry>,
        persister: Persister,
        config: AuctionConfig,
    ) -> Self {
        Self {
            rooms,
            timers,
            persister,
            config,
        }
    }

    pub fn worker(&self) -> WorkerId {
        self.rooms.worker()
    }

    pub fn rooms(&self) -> &RoomStore {
        &self.rooms
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Replication> {
        self.rooms.shared().subscribe()
    }

    pub fn timer_phase(&self, code: &str) -> TimerPhase {
        self.timers.phase(code)
    }

    /// Current room snapshot
    pub async fn snapshot(&self, code: &str) -> Result<Arc<RoomState>> {
        self.rooms.get(code).await
    }

    /// Enter a room, restarting its round if it was left running without a timer
    pub async fn join(self: &Arc<Self>, code: &str) -> Result<Arc<RoomState>> {
        let room = self.rooms.get(code).await?;
        if room.is_active && !room.is_paused && self.timers.phase(code) != TimerPhase::Running {
            return self.recover(code).await;
        }
        Ok(room)
    }

    async fn recover(self: &Arc<Self>, code: &str) -> Result<Arc<RoomState>> {
        let mut txn = self.rooms.begin(code).await?;
        let room = txn.state();
        if !room.is_active || room.is_paused || self.timers.phase(code) == TimerPhase::Running {
            return Ok(txn.snapshot());
        }

        if room.current_player.is_some() {
            info!(
                code,
                round = room.round,
                seconds = room.timer_seconds_remaining,
                "Resuming round after restart"
            );
            self.start_timer(room);
            return Ok(txn.snapshot());
        }

        let mut state = room.clone();
        let mut events = Vec::new();
        self.next_player(code, &mut state, None, &mut events);
        let row = state.auction_row();
        let stored = self.rooms.commit(&mut txn, state, events);
        self.persister.submit(PersistJob::SaveAuction {
            code: code.to_string(),
            row,
            best_effort: false,
        });
        if stored.is_biddable() {
            self.start_timer(&stored);
        }
        info!(code, round = stored.round, "Recovered room without a current player");
        Ok(stored)
    }

    /// Apply one client command
    pub async fn dispatch(
        self: &Arc<Self>,
        code: &str,
        command: Command,
    ) -> Result<Arc<RoomState>> {
        let name = command.name();
        let result = match command {
            Command::PlaceBid { captain_id, amount } => {
                self.place_bid(code, captain_id, amount).await
            }
            Command::VoteSkip { captain_id } => self.vote_skip(code, captain_id).await,
            Command::StartAuction => self.start_auction(code).await,
            Command::TogglePause { paused } => self.toggle_pause(code, paused).await,
            Command::ChangeBidMode { mode } => self.change_bid_mode(code, mode).await,
        };

        if let Err(e) = &result {
            if e.is_rejection() {
                debug!(code, command = name, reason = e.code(), "Command rejected");
            } else {
                error!(code, command = name, error = %e, "Command failed");
            }
        }
        result
    }

    async fn place_bid(
        self: &Arc<Self>,
        code: &str,
        captain_id: Uuid,
        amount: u32,
    ) -> Result<Arc<RoomState>> {
        let mut txn = self.rooms.begin(code).await?;
        let mut state = txn.state().clone();
        let before = state.current_bid;

        let accepted = round::place_bid(&mut state, captain_id, amount)?;
        assert_bid_monotonic(before, state.current_bid, code);

        let bid = BidRecord {
            id: Uuid::new_v4(),
            auction_id: state.auction_id,
            captain_id,
            player_id: accepted.player_id,
            round: accepted.round,
            amount,
            created_at: Utc::now(),
        };
        let row = state.auction_row();
        let events = vec![AuctionEvent::BidPlaced {
            captain_id,
            player_id: accepted.player_id,
            round: accepted.round,
            amount,
            display_credits: accepted.display_credits,
            timer_seconds: state.timer_seconds_remaining,
        }];

        let stored = self.rooms.commit(&mut txn, state, events);
        self.persister.submit(PersistJob::RecordBid {
            code: code.to_string(),
            bid,
        });
        self.persister.submit(PersistJob::SaveAuction {
            code: code.to_string(),
            row,
            best_effort: true,
        });
        // Full duration counted from this commit
        self.start_timer(&stored);

        info!(code, round = accepted.round, %captain_id, amount, "Bid accepted");
        Ok(stored)
    }

    async fn vote_skip(self: &Arc<Self>, code: &str, captain_id: Uuid) -> Result<Arc<RoomState>> {
        let mut txn = self.rooms.begin(code).await?;
        let mut state = txn.state().clone();

        let tally = round::vote_skip(&mut state, captain_id)?;
        let round = state.round;
        let player_id = state.current_player.as_ref().map(|p| p.id).unwrap_or_default();
        let vote = SkipVoteRecord {
            auction_id: state.auction_id,
            captain_id,
            player_id,
            round,
            created_at: Utc::now(),
        };

        let mut events = vec![AuctionEvent::SkipVotesUpdated {
            votes: tally.votes.clone(),
            needed: tally.needed,
        }];
        let closed = if tally.quorum_reached {
            let (sale, passed_over) = self.settle(code, &mut state, false, &mut events)?;
            let rotation = self.next_player(code, &mut state, passed_over, &mut events);
            Some((sale, rotation, state.auction_row()))
        } else {
            None
        };

        let stored = self.rooms.commit(&mut txn, state, events);
        self.persister.submit(PersistJob::RecordSkipVote {
            code: code.to_string(),
            vote,
        });

        if let Some((sale, rotation, next)) = closed {
            info!(code, round, votes = tally.votes.len(), "Skip quorum reached");
            self.persister.submit(PersistJob::CloseRound {
                code: code.to_string(),
                sale,
                next,
            });
            match rotation {
                Rotation::Selected(_) => self.start_timer(&stored),
                Rotation::Completed => self.timers.stop(code),
            }
        }
        Ok(stored)
    }

    async fn start_auction(self: &Arc<Self>, code: &str) -> Result<Arc<RoomState>> {
        let mut txn = self.rooms.begin(code).await?;
        let mut state = txn.state().clone();

        let rotation = round::start_auction(&mut state, &mut rand::thread_rng())?;
        let events = vec![
            AuctionEvent::AuctionStarted {
                started_at: state.started_at.unwrap_or_else(Utc::now),
            },
            rotation_event(&state, &rotation),
        ];
        let row = state.auction_row();

        let stored = self.rooms.commit(&mut txn, state, events);
        self.persister.submit(PersistJob::SaveAuction {
            code: code.to_string(),
            row,
            best_effort: false,
        });
        self.start_timer(&stored);
        Ok(stored)
    }

    async fn toggle_pause(self: &Arc<Self>, code: &str, paused: bool) -> Result<Arc<RoomState>> {
        let mut txn = self.rooms.begin(code).await?;
        let mut state = txn.state().clone();

        if !round::set_paused(&mut state, paused)? {
            return Ok(txn.snapshot());
        }

        // Paused during an intermission: the next round opens on resume
        let mut rotated = Vec::new();
        if !paused && state.current_player.is_none() {
            self.next_player(code, &mut state, None, &mut rotated);
        }
        let remaining = state.timer_seconds_remaining;
        let row = state.auction_row();
        let mut events = vec![AuctionEvent::PauseToggled { paused, remaining }];
        events.append(&mut rotated);

        let stored = self.rooms.commit(&mut txn, state, events);
        self.persister.submit(PersistJob::SaveAuction {
            code: code.to_string(),
            row,
            best_effort: false,
        });

        if paused {
            self.timers.pause(code);
        } else if stored.is_biddable() {
            self.start_timer(&stored);
        } else {
            self.timers.stop(code);
        }
        info!(code, paused, remaining, "Pause toggled");
        Ok(stored)
    }

    async fn change_bid_mode(&self, code: &str, mode: BidMode) -> Result<Arc<RoomState>> {
        let mut txn = self.rooms.begin(code).await?;
        let mut state = txn.state().clone();

        if !round::set_bid_mode(&mut state, mode) {
            return Ok(txn.snapshot());
        }
        let row = state.auction_row();
        let events = vec![AuctionEvent::BidModeChanged { mode }];
        let stored = self.rooms.commit(&mut txn, state, events);
        self.persister.submit(PersistJob::SaveAuction {
            code: code.to_string(),
            row,
            best_effort: false,
        });
        Ok(stored)
    }

    /// One timer tick: apply elapsed time and settle the round at zero.
    ///
    /// The next player is not drawn here; the timer waits out the
    /// intermission and then calls [`Engine::open_next_round`].
    pub async fn advance_timer(
        &self,
        code: &str,
        countdown: &mut Countdown,
        elapsed: Duration,
    ) -> TimerStep {
        let mut txn = match self.rooms.begin(code).await {
            Ok(txn) => txn,
            Err(e) => {
                warn!(code, error = %e, "Timer could not load room");
                return TimerStep::Stop;
            }
        };
        if !txn.state().is_biddable() {
            debug!(code, "Room no longer biddable, timer stopping");
            return TimerStep::Stop;
        }

        let mut state = txn.state().clone();
        countdown.sync(state.round, state.timer_seconds_remaining);
        let remaining = countdown.advance(elapsed);
        state.timer_seconds_remaining = remaining;
        let mut events = vec![AuctionEvent::TimerTick {
            round: state.round,
            remaining,
        }];

        if remaining > 0 {
            let row = state.auction_row();
            self.rooms.commit(&mut txn, state, events);
            self.persister.submit(PersistJob::SaveAuction {
                code: code.to_string(),
                row,
                best_effort: true,
            });
            return TimerStep::Continue;
        }

        let (sale, passed_over) = match self.settle(code, &mut state, true, &mut events) {
            Ok(settled) => settled,
            Err(e) => {
                error!(code, error = %e, "Round expiry failed");
                return TimerStep::Stop;
            }
        };
        let next = state.auction_row();
        self.rooms.commit(&mut txn, state, events);
        self.persister.submit(PersistJob::CloseRound {
            code: code.to_string(),
            sale,
            next,
        });

        TimerStep::Intermission {
            gap: self.config.intermission(),
            passed_over,
        }
    }

    /// Put the next player up once the intermission is over
    pub async fn open_next_round(
        &self,
        code: &str,
        countdown: &mut Countdown,
        passed_over: Option<Uuid>,
    ) -> TimerStep {
        let mut txn = match self.rooms.begin(code).await {
            Ok(txn) => txn,
            Err(e) => {
                warn!(code, error = %e, "Timer could not load room");
                return TimerStep::Stop;
            }
        };
        let room = txn.state();
        if !room.is_active || room.is_paused {
            debug!(code, "Room stopped during intermission, timer stopping");
            return TimerStep::Stop;
        }
        if room.current_player.is_some() {
            *countdown = Countdown::new(room.round, room.timer_seconds_remaining);
            return TimerStep::Continue;
        }

        let mut state = room.clone();
        let mut events = Vec::new();
        let rotation = self.next_player(code, &mut state, passed_over, &mut events);
        let row = state.auction_row();
        let stored = self.rooms.commit(&mut txn, state, events);
        self.persister.submit(PersistJob::SaveAuction {
            code: code.to_string(),
            row,
            best_effort: false,
        });

        match rotation {
            Rotation::Selected(_) => {
                *countdown = Countdown::new(stored.round, stored.timer_seconds_remaining);
                TimerStep::Continue
            }
            Rotation::Completed => TimerStep::Stop,
        }
    }

    /// Flag a room whose durable writes could not be completed
    pub async fn mark_degraded(&self, code: &str, reason: String) {
        let mut txn = match self.rooms.begin(code).await {
            Ok(txn) => txn,
            Err(e) => {
                error!(code, error = %e, "Could not load room to mark it degraded");
                return;
            }
        };
        let mut state = txn.state().clone();
        state.degraded = Some(reason.clone());
        error!(code, reason = %reason, "Room degraded");
        self.rooms.commit(&mut txn, state, vec![AuctionEvent::RoomDegraded { reason }]);
    }

    /// Forget a room everywhere; used when its tournament is deleted
    pub async fn evict(&self, code: &str) {
        self.timers.stop(code);
        self.rooms.evict(code).await;
        info!(code, "Room evicted");
    }

    /// Close the open round. Returns the sale, if any, and the player to
    /// leave out of the next draw.
    fn settle(
        &self,
        code: &str,
        state: &mut RoomState,
        allow_sale: bool,
        events: &mut Vec<AuctionEvent>,
    ) -> Result<(Option<SaleRecord>, Option<Uuid>)> {
        let outcome = round::settle_round(state, allow_sale)?;
        let player_id = outcome.player_id();
        let sale = match &outcome {
            RoundOutcome::Sold(sale) => {
                info!(
                    code,
                    player = %sale.entry.player_name,
                    captain = %sale.entry.captain_name,
                    final_bid = sale.entry.final_bid,
                    "Player sold"
                );
                Some(sale.clone())
            }
            RoundOutcome::Passed { round, .. } => {
                info!(code, %player_id, round, "Player passed");
                None
            }
        };
        let passed_over = sale.is_none().then_some(player_id);
        events.push(AuctionEvent::RoundSettled { outcome });
        Ok((sale, passed_over))
    }

    fn next_player(
        &self,
        code: &str,
        state: &mut RoomState,
        passed_over: Option<Uuid>,
        events: &mut Vec<AuctionEvent>,
    ) -> Rotation {
        let rotation = round::rotate(state, &mut rand::thread_rng(), passed_over);
        if rotation == Rotation::Completed {
            info!(code, sold = state.history.len(), "Auction completed");
        }
        events.push(rotation_event(state, &rotation));
        rotation
    }

    fn start_timer(self: &Arc<Self>, room: &RoomState) {
        let countdown = Countdown::new(room.round, room.timer_seconds_remaining);
        self.timers
            .start(&room.tournament_code, countdown, self.config.tick(), Arc::clone(self));
    }
}

fn rotation_event(state: &RoomState, rotation: &Rotation) -> AuctionEvent {
    match rotation {
        Rotation::Selected(player) => AuctionEvent::PlayerSelected {
            player: player.clone(),
            current_bid: state.current_bid,
            round: state.round,
            timer_seconds: state.timer_seconds_remaining,
        },
        Rotation::Completed => AuctionEvent::AuctionCompleted {
            ended_at: state.ended_at.unwrap_or_else(Utc::now),
        },
    }
}

impl TimerDriver for Engine {
    fn advance(
        &self,
        code: &str,
        countdown: &mut Countdown,
        elapsed: Duration,
    ) -> impl Future<Output = TimerStep> + Send {
        self.advance_timer(code, countdown, elapsed)
    }

    fn next_round(
        &self,
        code: &str,
        countdown: &mut Countdown,
        passed_over: Option<Uuid>,
    ) -> impl Future<Output = TimerStep> + Send {
        self.open_next_round(code, countdown, passed_over)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;

    use draft_core::{
        Captain, Database, DraftConfig, Error, Player, PlayerRole, RosterRepository, Tier,
        Tournament, TournamentStatus,
    };

    use crate::cache::Replication;
    use crate::cluster::Cluster;
    use crate::persist::testing::FlakyStore;

    struct Seeded {
        captains: Vec<Uuid>,
    }

    /// Tournament `code` with captains `(tier, credits)` and one player per tier listed
    fn seed(db: &Database, code: &str, captains: &[(u8, u32)], players: &[u8]) -> Seeded {
        let tournament = Tournament::with_code("Cup".to_string(), code.to_string());
        db.create_tournament(&tournament).unwrap();

        let captains = captains
            .iter()
            .enumerate()
            .map(|(i, (tier, credits))| {
                let captain = Captain::new(
                    tournament.id,
                    Uuid::new_v4(),
                    format!("captain-{}", i),
                    Tier::new(*tier).unwrap(),
                    PlayerRole::Flex,
                )
                .with_credits(*credits);
                db.create_captain(&captain).unwrap();
                captain.id
            })
            .collect();

        for (i, tier) in players.iter().enumerate() {
            let player = Player::new(
                tournament.id,
                format!("player-{}", i),
                Tier::new(*tier).unwrap(),
                PlayerRole::Duelist,
            );
            db.create_player(&player).unwrap();
        }
        Seeded { captains }
    }

    fn database() -> Arc<Mutex<Database>> {
        Arc::new(Mutex::new(Database::open_in_memory().unwrap()))
    }

    fn config(workers: usize) -> DraftConfig {
        let mut config = DraftConfig::default();
        config.server.workers = workers;
        config
    }

    fn bid(captain_id: Uuid, amount: u32) -> Command {
        Command::PlaceBid { captain_id, amount }
    }

    fn current_player_id(room: &RoomState) -> Uuid {
        room.current_player.as_ref().unwrap().id
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_player_sells_on_expiry() {
        let db = database();
        let seeded = seed(&db.lock().unwrap(), "SOLO", &[(1, 300), (2, 300)], &[3]);
        let (a, b) = (seeded.captains[0], seeded.captains[1]);
        let cluster = Cluster::start(db.clone(), &config(1));
        let engine = cluster.engine(0).unwrap();

        engine.join("SOLO").await.unwrap();
        let room = engine.dispatch("SOLO", Command::StartAuction).await.unwrap();
        assert_eq!(room.current_bid, 60);
        assert_eq!(room.round, 1);
        assert_eq!(engine.timer_phase("SOLO"), TimerPhase::Running);

        let room = engine.dispatch("SOLO", bid(a, 65)).await.unwrap();
        assert_eq!(room.display_credits()[&a], 235);
        assert_eq!(room.captain(a).unwrap().credits, 300);

        tokio::time::sleep(Duration::from_millis(30_500)).await;
        let room = engine.snapshot("SOLO").await.unwrap();
        assert!(room.unsold_players.is_empty());
        assert_eq!(room.history.len(), 1);
        assert_eq!(room.history[0].final_bid, 65);
        assert_eq!(room.captain(a).unwrap().credits, 235);
        assert_eq!(room.captain(b).unwrap().credits, 300);
        // Sale is on show until the intermission ends
        assert!(room.is_active);
        assert!(room.current_player.is_none());

        tokio::time::sleep(Duration::from_secs(3)).await;
        let room = engine.snapshot("SOLO").await.unwrap();
        assert!(room.is_complete());
        assert_eq!(engine.timer_phase("SOLO"), TimerPhase::Stopped);

        cluster.flush().await;
        let db = db.lock().unwrap();
        let tournament = db.tournaments().find_by_code("SOLO").unwrap().unwrap();
        assert_eq!(tournament.status, TournamentStatus::Completed);

        let captains = db.list_captains(tournament.id).unwrap();
        let winner = captains.iter().find(|c| c.id == a).unwrap();
        assert_eq!(winner.credits, 235);
        assert_eq!(winner.players.len(), 1);
        assert!(winner.has_picked(Tier::new(3).unwrap()));

        let auction = db.auctions().find_for_tournament(tournament.id).unwrap().unwrap();
        assert_eq!(db.auctions().history(auction.id).unwrap().len(), 1);
        assert!(db.list_unsold_players(tournament.id).unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_freezes_remaining_time() {
        let db = database();
        seed(&db.lock().unwrap(), "PAUS", &[(1, 300), (2, 300)], &[3, 4]);
        let cluster = Cluster::start(db, &config(1));
        let engine = cluster.engine(0).unwrap();

        engine.dispatch("PAUS", Command::StartAuction).await.unwrap();
        tokio::time::sleep(Duration::from_millis(13_500)).await;
        assert_eq!(engine.snapshot("PAUS").await.unwrap().timer_seconds_remaining, 17);

        let room = engine
            .dispatch("PAUS", Command::TogglePause { paused: true })
            .await
            .unwrap();
        assert!(room.is_paused);
        assert_eq!(room.timer_seconds_remaining, 17);
        assert_eq!(engine.timer_phase("PAUS"), TimerPhase::Paused);

        // Pausing twice is a no-op
        let again = engine
            .dispatch("PAUS", Command::TogglePause { paused: true })
            .await
            .unwrap();
        assert_eq!(again.version, room.version);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(engine.snapshot("PAUS").await.unwrap().timer_seconds_remaining, 17);

        let room = engine
            .dispatch("PAUS", Command::TogglePause { paused: false })
            .await
            .unwrap();
        assert_eq!(room.timer_seconds_remaining, 17);
        assert_eq!(engine.timer_phase("PAUS"), TimerPhase::Running);

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(engine.snapshot("PAUS").await.unwrap().timer_seconds_remaining, 16);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_quorum_passes_without_sale() {
        let db = database();
        let captains: Vec<(u8, u32)> = (1..=5).map(|tier| (tier, 500)).collect();
        let seeded = seed(&db.lock().unwrap(), "SKIP", &captains, &[1, 2]);
        let ids = seeded.captains;
        let cluster = Cluster::start(db, &config(1));
        let engine = cluster.engine(0).unwrap();

        let room = engine.dispatch("SKIP", Command::StartAuction).await.unwrap();
        let first = current_player_id(&room);
        let opening = room.current_bid;
        engine.dispatch("SKIP", bid(ids[4], opening)).await.unwrap();

        engine.dispatch("SKIP", Command::VoteSkip { captain_id: ids[0] }).await.unwrap();
        let room = engine.dispatch("SKIP", Command::VoteSkip { captain_id: ids[1] }).await.unwrap();
        assert_eq!(room.skip_votes.len(), 2);
        assert_eq!(room.round, 1);

        let dup = engine.dispatch("SKIP", Command::VoteSkip { captain_id: ids[1] }).await;
        assert!(matches!(dup, Err(Error::AlreadyVoted(_))));

        let room = engine.dispatch("SKIP", Command::VoteSkip { captain_id: ids[2] }).await.unwrap();
        assert_eq!(room.round, 2);
        assert_ne!(current_player_id(&room), first);
        assert!(room.skip_votes.is_empty());
        assert!(room.history.is_empty());
        assert_eq!(room.unsold_players.len(), 2);
        assert_eq!(room.timer_seconds_remaining, 30);
        assert!(room.captains.iter().all(|c| c.credits == 500));
        assert_eq!(engine.timer_phase("SKIP"), TimerPhase::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_without_bids_moves_on() {
        let db = database();
        seed(&db.lock().unwrap(), "IDLE", &[(1, 300), (2, 300)], &[3, 4]);
        let cluster = Cluster::start(db, &config(1));
        let engine = cluster.engine(0).unwrap();

        let room = engine.dispatch("IDLE", Command::StartAuction).await.unwrap();
        let first = current_player_id(&room);

        tokio::time::sleep(Duration::from_millis(30_500)).await;
        let room = engine.snapshot("IDLE").await.unwrap();
        assert_eq!(room.round, 1);
        assert!(room.current_player.is_none());
        assert!(room.history.is_empty());
        assert_eq!(room.unsold_players.len(), 2);

        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert!(engine.snapshot("IDLE").await.unwrap().current_player.is_none());

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        let room = engine.snapshot("IDLE").await.unwrap();
        assert_eq!(room.round, 2);
        assert_ne!(current_player_id(&room), first);
        assert_eq!(room.timer_seconds_remaining, 30);
        assert_eq!(engine.timer_phase("IDLE"), TimerPhase::Running);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(engine.snapshot("IDLE").await.unwrap().timer_seconds_remaining, 29);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bid_between_ticks_gets_full_duration() {
        let db = database();
        let seeded = seed(&db.lock().unwrap(), "LATE", &[(1, 300), (2, 300)], &[3, 4]);
        let a = seeded.captains[0];
        let cluster = Cluster::start(db, &config(1));
        let engine = cluster.engine(0).unwrap();

        engine.dispatch("LATE", Command::StartAuction).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10_900)).await;
        let room = engine.dispatch("LATE", bid(a, 65)).await.unwrap();
        assert_eq!(room.timer_seconds_remaining, 30);

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(engine.snapshot("LATE").await.unwrap().timer_seconds_remaining, 29);

        // Under a full round since the bid
        tokio::time::sleep(Duration::from_millis(28_000)).await;
        let room = engine.snapshot("LATE").await.unwrap();
        assert_eq!(room.round, 1);
        assert_eq!(room.current_bidder, Some(a));
        assert_eq!(room.timer_seconds_remaining, 1);
        assert!(room.history.is_empty());

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        let room = engine.snapshot("LATE").await.unwrap();
        assert_eq!(room.history.len(), 1);
        assert_eq!(room.history[0].captain_id, a);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_after_intermission_pause_opens_next_round() {
        let db = database();
        seed(&db.lock().unwrap(), "GAPS", &[(1, 300), (2, 300)], &[3, 4]);
        let cluster = Cluster::start(db, &config(1));
        let engine = cluster.engine(0).unwrap();

        engine.dispatch("GAPS", Command::StartAuction).await.unwrap();
        tokio::time::sleep(Duration::from_millis(31_000)).await;
        let room = engine
            .dispatch("GAPS", Command::TogglePause { paused: true })
            .await
            .unwrap();
        assert!(room.current_player.is_none());
        assert_eq!(engine.timer_phase("GAPS"), TimerPhase::Paused);

        tokio::time::sleep(Duration::from_secs(10)).await;
        let room = engine.snapshot("GAPS").await.unwrap();
        assert!(room.current_player.is_none());
        assert_eq!(room.round, 1);

        let room = engine
            .dispatch("GAPS", Command::TogglePause { paused: false })
            .await
            .unwrap();
        assert_eq!(room.round, 2);
        assert!(room.current_player.is_some());
        assert_eq!(room.timer_seconds_remaining, 30);
        assert_eq!(engine.timer_phase("GAPS"), TimerPhase::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_commands_leave_room_untouched() {
        let db = database();
        let seeded = seed(&db.lock().unwrap(), "RULE", &[(1, 300), (2, 300)], &[3]);
        let (a, b) = (seeded.captains[0], seeded.captains[1]);
        let cluster = Cluster::start(db, &config(1));
        let engine = cluster.engine(0).unwrap();

        let early = engine.dispatch("RULE", bid(a, 60)).await;
        assert!(matches!(early, Err(Error::AuctionNotActive)));

        let room = engine.dispatch("RULE", Command::StartAuction).await.unwrap();
        let version = room.version;

        let low = engine.dispatch("RULE", bid(a, 50)).await;
        assert!(matches!(low, Err(Error::BidTooLow { amount: 50, current: 60 })));
        let stranger = engine.dispatch("RULE", bid(Uuid::new_v4(), 70)).await;
        assert!(matches!(stranger, Err(Error::UnknownCaptain(_))));
        let rich = engine.dispatch("RULE", bid(a, 400)).await;
        assert!(matches!(rich, Err(Error::InsufficientCredits { .. })));
        let restart = engine.dispatch("RULE", Command::StartAuction).await;
        assert!(matches!(restart, Err(Error::AuctionAlreadyActive)));
        assert_eq!(engine.snapshot("RULE").await.unwrap().version, version);

        engine.dispatch("RULE", bid(a, 60)).await.unwrap();
        let same = engine.dispatch("RULE", bid(b, 60)).await;
        assert!(matches!(same, Err(Error::BidTooLow { .. })));

        let room = engine.snapshot("RULE").await.unwrap();
        assert_eq!(room.current_bidder, Some(a));
        assert_eq!(room.current_bid, 60);
    }

    #[tokio::test(start_paused = true)]
    async fn test_workers_share_one_room() {
        let db = database();
        let seeded = seed(&db.lock().unwrap(), "DUAL", &[(1, 300), (2, 300)], &[3]);
        let (a, b) = (seeded.captains[0], seeded.captains[1]);
        let cluster = Cluster::start(db, &config(2));
        let (first, second) = (cluster.engine(0).unwrap(), cluster.engine(1).unwrap());

        first.join("DUAL").await.unwrap();
        second.join("DUAL").await.unwrap();
        first.dispatch("DUAL", Command::StartAuction).await.unwrap();

        second.dispatch("DUAL", bid(a, 70)).await.unwrap();
        let seen = first.snapshot("DUAL").await.unwrap();
        assert_eq!((seen.current_bid, seen.current_bidder), (70, Some(a)));

        first.dispatch("DUAL", bid(b, 75)).await.unwrap();
        let stale = second.dispatch("DUAL", bid(a, 72)).await;
        assert!(matches!(stale, Err(Error::BidTooLow { current: 75, .. })));

        let seen = second.snapshot("DUAL").await.unwrap();
        assert_eq!((seen.current_bid, seen.current_bidder), (75, Some(b)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bid_mode_change_is_broadcast() {
        let db = database();
        seed(&db.lock().unwrap(), "MODE", &[(1, 300)], &[3]);
        let cluster = Cluster::start(db, &config(1));
        let engine = cluster.engine(0).unwrap();
        engine.join("MODE").await.unwrap();

        let mut bus = engine.subscribe();
        let room = engine
            .dispatch("MODE", Command::ChangeBidMode { mode: BidMode::Hidden })
            .await
            .unwrap();
        assert_eq!(room.bid_mode, BidMode::Hidden);

        let Replication::Updated(update) = bus.recv().await.unwrap() else {
            panic!("expected an update");
        };
        assert!(matches!(
            update.events.as_slice(),
            [AuctionEvent::BidModeChanged { mode: BidMode::Hidden }]
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_writes_mark_room_degraded() {
        let db = Database::open_in_memory().unwrap();
        seed(&db, "DEGR", &[(1, 300), (2, 300)], &[3]);
        let store = FlakyStore {
            inner: db,
            failures: Arc::new(AtomicU32::new(1_000)),
        };
        let mut config = config(1);
        config.persistence.max_attempts = 2;
        config.persistence.initial_backoff_ms = 10;
        config.persistence.max_backoff_ms = 20;

        let cluster = Cluster::start(Arc::new(Mutex::new(store)), &config);
        let engine = cluster.engine(0).unwrap();
        engine.dispatch("DEGR", Command::StartAuction).await.unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        let room = engine.snapshot("DEGR").await.unwrap();
        assert!(room.degraded.as_deref().unwrap_or_default().contains("SaveAuction"));
        // The auction itself keeps running
        assert!(room.is_active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_resumes_round_from_storage() {
        let db = database();
        let seeded = seed(&db.lock().unwrap(), "BACK", &[(1, 300), (2, 300)], &[3, 4]);
        let a = seeded.captains[0];

        let before = Cluster::start(db.clone(), &config(1));
        let engine = before.engine(0).unwrap();
        let room = engine.dispatch("BACK", Command::StartAuction).await.unwrap();
        let player = current_player_id(&room);
        engine.dispatch("BACK", bid(a, 65)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        before.shutdown().await;

        let after = Cluster::start(db, &config(1));
        let engine = after.engine(0).unwrap();
        let room = engine.join("BACK").await.unwrap();
        assert!(room.is_active);
        assert_eq!(current_player_id(&room), player);
        assert_eq!((room.current_bid, room.current_bidder), (65, Some(a)));
        assert_eq!(room.timer_seconds_remaining, 25);
        assert_eq!(room.display_credits()[&a], 235);
        assert_eq!(engine.timer_phase("BACK"), TimerPhase::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicted_room_rehydrates_and_recovers_timer() {
        let db = database();
        seed(&db.lock().unwrap(), "EVCT", &[(1, 300), (2, 300)], &[3, 4]);
        let cluster = Cluster::start(db, &config(1));
        let engine = cluster.engine(0).unwrap();

        engine.dispatch("EVCT", Command::StartAuction).await.unwrap();
        cluster.flush().await;
        engine.evict("EVCT").await;
        assert_eq!(engine.timer_phase("EVCT"), TimerPhase::Stopped);
        assert!(cluster.shared().get("EVCT").is_none());

        let room = engine.join("EVCT").await.unwrap();
        assert!(room.is_active);
        assert!(room.current_player.is_some());
        assert_eq!(engine.timer_phase("EVCT"), TimerPhase::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicting_paused_room_clears_its_timer() {
        let db = database();
        seed(&db.lock().unwrap(), "HALT", &[(1, 300), (2, 300)], &[3]);
        let cluster = Cluster::start(db, &config(1));
        let engine = cluster.engine(0).unwrap();

        engine.dispatch("HALT", Command::StartAuction).await.unwrap();
        engine
            .dispatch("HALT", Command::TogglePause { paused: true })
            .await
            .unwrap();
        assert_eq!(engine.timer_phase("HALT"), TimerPhase::Paused);

        engine.evict("HALT").await;
        assert_eq!(engine.timer_phase("HALT"), TimerPhase::Stopped);
    }
}

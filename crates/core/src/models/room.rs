//! Live auction room state

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AuctionRow, BidMode, Captain, HistoryEntry, Player};

/// Authoritative snapshot of one tournament's auction.
///
/// Every worker holds a copy; the shared cache decides which copy is current
/// through `version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomState {
    pub tournament_id: Uuid,
    pub tournament_code: String,
    pub auction_id: Uuid,
    pub version: u64,
    /// Incremented every time a new player is put up
    pub round: u64,
    pub is_active: bool,
    pub is_paused: bool,
    pub bid_mode: BidMode,
    pub timer_seconds_remaining: u32,
    pub timer_duration_seconds: u32,
    pub current_player: Option<Player>,
    pub current_bid: u32,
    pub current_bidder: Option<Uuid>,
    pub skip_votes: BTreeSet<Uuid>,
    /// Credits each captain held when the current round began
    pub round_start_credits: BTreeMap<Uuid, u32>,
    pub captains: Vec<Captain>,
    pub unsold_players: Vec<Player>,
    pub history: Vec<HistoryEntry>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Set when durable writes for this room could not be completed
    pub degraded: Option<String>,
}

impl RoomState {
    /// Empty, inactive room for a freshly created auction row
    pub fn new(tournament_code: String, row: &AuctionRow) -> Self {
        Self {
            tournament_id: row.tournament_id,
            tournament_code,
            auction_id: row.id,
            version: 0,
            round: row.round,
            is_active: row.is_active,
            is_paused: row.is_paused,
            bid_mode: row.bid_mode,
            timer_seconds_remaining: row.current_timer,
            timer_duration_seconds: row.timer_seconds,
            current_player: None,
            current_bid: 0,
            current_bidder: None,
            skip_votes: BTreeSet::new(),
            round_start_credits: BTreeMap::new(),
            captains: Vec::new(),
            unsold_players: Vec::new(),
            history: Vec::new(),
            started_at: row.started_at,
            ended_at: row.ended_at,
            degraded: None,
        }
    }

    pub fn captain(&self, captain_id: Uuid) -> Option<&Captain> {
        self.captains.iter().find(|c| c.id == captain_id)
    }

    pub fn captain_mut(&mut self, captain_id: Uuid) -> Option<&mut Captain> {
        self.captains.iter_mut().find(|c| c.id == captain_id)
    }

    /// A round is open for bids and votes
    pub fn is_biddable(&self) -> bool {
        self.is_active && !self.is_paused && self.current_player.is_some()
    }

    pub fn is_complete(&self) -> bool {
        !self.is_active && self.ended_at.is_some()
    }

    /// Credits shown to the room for a captain during the current round.
    ///
    /// The current bidder sees its round budget minus the standing bid;
    /// everyone else sees the round budget. The ledger is untouched.
    pub fn live_display_credits(&self, captain_id: Uuid) -> Option<u32> {
        let base = self
            .round_start_credits
            .get(&captain_id)
            .copied()
            .or_else(|| self.captain(captain_id).map(|c| c.credits))?;

        if self.current_bidder == Some(captain_id) {
            Some(base.saturating_sub(self.current_bid))
        } else {
            Some(base)
        }
    }

    pub fn display_credits(&self) -> BTreeMap<Uuid, u32> {
        self.captains
            .iter()
            .filter_map(|c| self.live_display_credits(c.id).map(|credits| (c.id, credits)))
            .collect()
    }

    /// Durable projection of the lifecycle fields
    pub fn auction_row(&self) -> AuctionRow {
        AuctionRow {
            id: self.auction_id,
            tournament_id: self.tournament_id,
            is_active: self.is_active,
            is_paused: self.is_paused,
            bid_mode: self.bid_mode,
            timer_seconds: self.timer_duration_seconds,
            current_timer: self.timer_seconds_remaining,
            current_player_id: self.current_player.as_ref().map(|p| p.id),
            round: self.round,
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }
}

//! Auction rows and ledger records

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Tier;
use crate::error::Error;

/// How bids are presented to the room. Arbitration is identical in every mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BidMode {
    #[default]
    Open,
    Hidden,
    Blind,
    Timed,
}

impl BidMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BidMode::Open => "OPEN",
            BidMode::Hidden => "HIDDEN",
            BidMode::Blind => "BLIND",
            BidMode::Timed => "TIMED",
        }
    }
}

impl FromStr for BidMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(BidMode::Open),
            "HIDDEN" => Ok(BidMode::Hidden),
            "BLIND" => Ok(BidMode::Blind),
            "TIMED" => Ok(BidMode::Timed),
            other => Err(Error::InvalidValue(format!("unknown bid mode {}", other))),
        }
    }
}

impl fmt::Display for BidMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable auction row, one per tournament
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionRow {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub is_active: bool,
    pub is_paused: bool,
    pub bid_mode: BidMode,
    pub timer_seconds: u32,
    pub current_timer: u32,
    pub current_player_id: Option<Uuid>,
    pub round: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl AuctionRow {
    pub fn new(tournament_id: Uuid, timer_seconds: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            tournament_id,
            is_active: false,
            is_paused: false,
            bid_mode: BidMode::Open,
            timer_seconds,
            current_timer: timer_seconds,
            current_player_id: None,
            round: 0,
            started_at: None,
            ended_at: None,
        }
    }

    /// Auction ran and has nothing left to sell
    pub fn is_complete(&self) -> bool {
        !self.is_active && self.ended_at.is_some()
    }
}

/// A provisional bid, kept for audit and for rebuilding a round after a restart
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidRecord {
    pub id: Uuid,
    pub auction_id: Uuid,
    pub captain_id: Uuid,
    pub player_id: Uuid,
    pub round: u64,
    pub amount: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkipVoteRecord {
    pub auction_id: Uuid,
    pub captain_id: Uuid,
    pub player_id: Uuid,
    pub round: u64,
    pub created_at: DateTime<Utc>,
}

/// A completed sale as shown in the room history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub player_id: Uuid,
    pub player_name: String,
    pub captain_id: Uuid,
    pub captain_name: String,
    pub tier: Tier,
    pub final_bid: u32,
    pub timestamp: DateTime<Utc>,
}

/// Everything a sale changes in durable storage.
///
/// `captain_credits` is the absolute ledger value after the deduction so
/// that re-applying the record is harmless.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleRecord {
    pub auction_id: Uuid,
    pub entry: HistoryEntry,
    pub captain_credits: u32,
}

//! Events broadcast to every client in a room

use chrono::{DateTime, Utc};
use draft_core::round::RoundOutcome;
use draft_core::{BidMode, Player};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AuctionEvent {
    AuctionStarted {
        started_at: DateTime<Utc>,
    },
    PlayerSelected {
        player: Player,
        current_bid: u32,
        round: u64,
        timer_seconds: u32,
    },
    BidPlaced {
        captain_id: Uuid,
        player_id: Uuid,
        round: u64,
        amount: u32,
        /// Bidder's credits as shown while the bid stands
        display_credits: u32,
        timer_seconds: u32,
    },
    SkipVotesUpdated {
        votes: Vec<Uuid>,
        needed: usize,
    },
    TimerTick {
        round: u64,
        remaining: u32,
    },
    PauseToggled {
        paused: bool,
        remaining: u32,
    },
    BidModeChanged {
        mode: BidMode,
    },
    RoundSettled {
        outcome: RoundOutcome,
    },
    AuctionCompleted {
        ended_at: DateTime<Utc>,
    },
    RoomDegraded {
        reason: String,
    },
}

impl AuctionEvent {
    /// Events after which clients should replace their snapshot
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            AuctionEvent::BidPlaced { .. }
                | AuctionEvent::SkipVotesUpdated { .. }
                | AuctionEvent::TimerTick { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            AuctionEvent::AuctionStarted { .. } => "AuctionStarted",
            AuctionEvent::PlayerSelected { .. } => "PlayerSelected",
            AuctionEvent::BidPlaced { .. } => "BidPlaced",
            AuctionEvent::SkipVotesUpdated { .. } => "SkipVotesUpdated",
            AuctionEvent::TimerTick { .. } => "TimerTick",
            AuctionEvent::PauseToggled { .. } => "PauseToggled",
            AuctionEvent::BidModeChanged { .. } => "BidModeChanged",
            AuctionEvent::RoundSettled { .. } => "RoundSettled",
            AuctionEvent::AuctionCompleted { .. } => "AuctionCompleted",
            AuctionEvent::RoomDegraded { .. } => "RoomDegraded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let event = AuctionEvent::TimerTick { round: 3, remaining: 17 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "TimerTick");
        assert_eq!(json["remaining"], 17);
        assert!(!event.is_structural());

        let settled = AuctionEvent::RoundSettled {
            outcome: RoundOutcome::Passed { player_id: Uuid::nil(), round: 3 },
        };
        let json = serde_json::to_value(&settled).unwrap();
        assert_eq!(json["outcome"]["outcome"], "passed");
        assert!(settled.is_structural());
    }
}

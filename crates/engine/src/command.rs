//! Commands a client can issue against a room

use draft_core::BidMode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Every room mutation a client may request. `Engine::dispatch` handles
/// each variant; host-only variants are authorized before they get here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    PlaceBid { captain_id: Uuid, amount: u32 },
    VoteSkip { captain_id: Uuid },
    StartAuction,
    TogglePause { paused: bool },
    ChangeBidMode { mode: BidMode },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::PlaceBid { .. } => "PlaceBid",
            Command::VoteSkip { .. } => "VoteSkip",
            Command::StartAuction => "StartAuction",
            Command::TogglePause { .. } => "TogglePause",
            Command::ChangeBidMode { .. } => "ChangeBidMode",
        }
    }

    /// Commands only the tournament host may send
    pub fn is_host_only(&self) -> bool {
        matches!(
            self,
            Command::StartAuction | Command::TogglePause { .. } | Command::ChangeBidMode { .. }
        )
    }
}

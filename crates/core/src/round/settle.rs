//! Round settlement and player rotation

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{HistoryEntry, Player, RoomState, SaleRecord};

/// How a round ended
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RoundOutcome {
    Sold(SaleRecord),
    /// No sale; the player stays in the pool
    Passed { player_id: Uuid, round: u64 },
}

impl RoundOutcome {
    pub fn player_id(&self) -> Uuid {
        match self {
            RoundOutcome::Sold(sale) => sale.entry.player_id,
            RoundOutcome::Passed { player_id, .. } => *player_id,
        }
    }
}

/// What happened when the next round was due
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rotation {
    Selected(Player),
    Completed,
}

/// Close the open round.
///
/// With `allow_sale` and a standing bidder the player is sold: the bid is
/// deducted from the bidder's round-start budget into its ledger, the player
/// joins the roster and leaves the pool. Otherwise nothing but the round
/// fields change. Fails without modifying the room if there is no round.
pub fn settle_round(room: &mut RoomState, allow_sale: bool) -> Result<RoundOutcome> {
    let player = room
        .current_player
        .clone()
        .ok_or_else(|| Error::InvalidState("settlement without a current player".into()))?;

    let outcome = match room.current_bidder.filter(|_| allow_sale) {
        Some(bidder) => {
            let final_bid = room.current_bid;
            let budget = room.round_start_credits.get(&bidder).copied().ok_or_else(|| {
                Error::InvalidState(format!("bidder {} has no round budget", bidder))
            })?;
            let credits = budget.checked_sub(final_bid).ok_or_else(|| {
                Error::InvalidState(format!("bid {} exceeds budget {}", final_bid, budget))
            })?;
            let captain = room
                .captain_mut(bidder)
                .ok_or_else(|| Error::InvalidState(format!("bidder {} left the room", bidder)))?;

            captain.credits = credits;
            captain.picked_tiers.push(player.tier);
            let mut drafted = player.clone();
            drafted.captain_id = Some(bidder);
            captain.players.push(drafted);
            let captain_name = captain.name.clone();

            room.unsold_players.retain(|p| p.id != player.id);

            let entry = HistoryEntry {
                id: Uuid::new_v4(),
                player_id: player.id,
                player_name: player.name.clone(),
                captain_id: bidder,
                captain_name,
                tier: player.tier,
                final_bid,
                timestamp: Utc::now(),
            };
            room.history.push(entry.clone());

            RoundOutcome::Sold(SaleRecord {
                auction_id: room.auction_id,
                entry,
                captain_credits: credits,
            })
        }
        None => RoundOutcome::Passed {
            player_id: player.id,
            round: room.round,
        },
    };

    clear_round(room);
    Ok(outcome)
}

fn clear_round(room: &mut RoomState) {
    room.current_player = None;
    room.current_bid = 0;
    room.current_bidder = None;
    room.skip_votes.clear();
    room.round_start_credits.clear();
}

/// Put the next player up, or finish the auction if the pool is empty.
///
/// The draw is uniform over unsold players. `passed_over` is excluded when
/// any other candidate remains.
pub fn rotate<R: Rng + ?Sized>(
    room: &mut RoomState,
    rng: &mut R,
    passed_over: Option<Uuid>,
) -> Rotation {
    debug_assert!(
        room.current_player.is_none(),
        "rotate called with round {} still open",
        room.round
    );

    let candidates: Vec<&Player> = room
        .unsold_players
        .iter()
        .filter(|p| Some(p.id) != passed_over)
        .collect();
    let pick = match candidates.choose(rng) {
        Some(player) => Some((*player).clone()),
        None => room.unsold_players.choose(rng).cloned(),
    };

    let Some(player) = pick else {
        room.is_active = false;
        room.is_paused = false;
        room.timer_seconds_remaining = 0;
        room.ended_at = Some(Utc::now());
        clear_round(room);
        return Rotation::Completed;
    };

    room.round += 1;
    room.current_bid = player.starting_price;
    room.current_bidder = None;
    room.skip_votes.clear();
    room.round_start_credits = room.captains.iter().map(|c| (c.id, c.credits)).collect();
    room.timer_seconds_remaining = room.timer_duration_seconds;
    room.current_player = Some(player.clone());

    debug!(round = room.round, player = %player.name, tier = %player.tier, "Player selected");
    Rotation::Selected(player)
}

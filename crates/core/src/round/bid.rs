//! Bid arbitration

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::RoomState;

/// A bid that passed every rule and now stands as the high bid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidAccepted {
    pub captain_id: Uuid,
    pub player_id: Uuid,
    pub round: u64,
    pub amount: u32,
    /// What the room should show as the bidder's remaining credits
    pub display_credits: u32,
}

/// Validate a bid against the open round and apply it.
///
/// Rules are checked in a fixed order and the first failure is returned.
/// Nothing is modified unless every rule passes. Credits are never deducted
/// here; the standing bid is provisional until the round settles.
pub fn place_bid(room: &mut RoomState, captain_id: Uuid, amount: u32) -> Result<BidAccepted> {
    if !room.is_biddable() {
        return Err(Error::AuctionNotActive);
    }
    let (player_id, player_tier, starting_price) = match &room.current_player {
        Some(p) => (p.id, p.tier, p.starting_price),
        None => return Err(Error::AuctionNotActive),
    };

    let captain = room
        .captain(captain_id)
        .ok_or(Error::UnknownCaptain(captain_id))?;

    // The opening bid may match the starting price; every later bid must raise.
    let opening = room.current_bidder.is_none() && room.current_bid == starting_price;
    let raises = amount > room.current_bid || (opening && amount == room.current_bid);
    if !raises {
        return Err(Error::BidTooLow {
            amount,
            current: room.current_bid,
        });
    }

    let budget = room.round_start_credits.get(&captain_id).copied();
    match budget {
        Some(available) if available >= amount => {}
        _ => {
            return Err(Error::InsufficientCredits {
                amount,
                available: budget.unwrap_or(0),
            })
        }
    }

    if captain.tier == player_tier {
        return Err(Error::OwnTierForbidden(player_tier));
    }
    if captain.has_picked(player_tier) {
        return Err(Error::TierAlreadyFilled(player_tier));
    }

    room.current_bid = amount;
    room.current_bidder = Some(captain_id);
    room.timer_seconds_remaining = room.timer_duration_seconds;

    Ok(BidAccepted {
        captain_id,
        player_id,
        round: room.round,
        amount,
        display_credits: budget.unwrap_or(0).saturating_sub(amount),
    })
}

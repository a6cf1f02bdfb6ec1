//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible room states during development.
//! These checks are compiled out in release builds.

use std::collections::HashSet;

use crate::models::RoomState;

/// Validate that a room's rosters and round fields are internally consistent
pub fn assert_room_invariants(room: &RoomState) {
    let mut owned = HashSet::new();

    for captain in &room.captains {
        let mut tiers = HashSet::new();
        for player in &captain.players {
            debug_assert!(
                player.tier != captain.tier,
                "Captain {} owns {} from its own tier {}",
                captain.name,
                player.name,
                captain.tier
            );
            debug_assert!(
                tiers.insert(player.tier),
                "Captain {} owns two tier {} players",
                captain.name,
                player.tier
            );
            debug_assert!(
                player.captain_id == Some(captain.id),
                "Player {} on {}'s roster has owner {:?}",
                player.name,
                captain.name,
                player.captain_id
            );
            debug_assert!(
                owned.insert(player.id),
                "Player {} appears on more than one roster",
                player.name
            );
        }
    }

    debug_assert!(
        room.unsold_players.iter().all(|p| !p.is_sold() && !owned.contains(&p.id)),
        "Room {} has a drafted player in the pool",
        room.tournament_code
    );

    if let Some(bidder) = room.current_bidder {
        debug_assert!(
            room.captain(bidder).is_some(),
            "Room {} current bidder {} is not a captain",
            room.tournament_code,
            bidder
        );
    }

    debug_assert!(
        room.skip_votes.iter().all(|v| room.captain(*v).is_some()),
        "Room {} has skip votes from non-captains",
        room.tournament_code
    );

    match &room.current_player {
        Some(player) => {
            debug_assert!(
                room.current_bid >= player.starting_price,
                "Room {} bid {} below starting price {}",
                room.tournament_code,
                room.current_bid,
                player.starting_price
            );
        }
        None => {
            debug_assert!(
                room.current_bidder.is_none() && room.skip_votes.is_empty(),
                "Room {} has bids or votes but no player",
                room.tournament_code
            );
        }
    }
}

/// Validate that a bid only ever raised the standing bid
pub fn assert_bid_monotonic(before: u32, after: u32, code: &str) {
    debug_assert!(
        after >= before,
        "Room {} bid went down from {} to {}",
        code,
        before,
        after
    );
}

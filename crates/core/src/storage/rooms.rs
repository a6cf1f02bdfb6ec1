//! Room hydration from durable state

use rusqlite::Connection;
use tracing::{info, instrument, warn};

use super::auctions::AuctionStore;
use super::captains::CaptainStore;
use super::players::PlayerStore;
use super::tournaments::TournamentStore;
use crate::error::Result;
use crate::models::{AuctionRow, RoomState};

/// Rebuild a room for `code`, creating the auction row if this is the first join.
///
/// Only ledger credits are stored, and they change only at settlement, so the
/// round budgets equal the ledger. The standing bid and the votes come from
/// the ledgers of the stored round.
#[instrument(skip(conn))]
pub fn load_room(conn: &Connection, code: &str, default_timer: u32) -> Result<Option<RoomState>> {
    let Some(tournament) = TournamentStore::new(conn).find_by_code(code)? else {
        return Ok(None);
    };

    let auctions = AuctionStore::new(conn);
    let row = match auctions.find_for_tournament(tournament.id)? {
        Some(row) => row,
        None => {
            let row = AuctionRow::new(tournament.id, default_timer);
            auctions.save(&row)?;
            info!(code, auction_id = %row.id, "Created auction row");
            row
        }
    };

    let mut room = RoomState::new(tournament.code.clone(), &row);
    room.captains = CaptainStore::new(conn).list_for_tournament(tournament.id)?;
    room.unsold_players = PlayerStore::new(conn).list_unsold(tournament.id)?;
    room.history = auctions.history(row.id)?;

    let current = row
        .current_player_id
        .and_then(|id| room.unsold_players.iter().find(|p| p.id == id).cloned());

    match (row.current_player_id, current) {
        (Some(_), Some(player)) => {
            room.round_start_credits = room.captains.iter().map(|c| (c.id, c.credits)).collect();
            room.current_bid = player.starting_price;

            let bids = auctions.bids_for_round(row.id, row.round, player.id)?;
            if let Some(top) = bids.iter().filter(|b| room.captain(b.captain_id).is_some()).last() {
                room.current_bid = top.amount.max(player.starting_price);
                room.current_bidder = Some(top.captain_id);
            }

            room.skip_votes = auctions
                .skip_votes_for_round(row.id, row.round, player.id)?
                .into_iter()
                .map(|v| v.captain_id)
                .filter(|id| room.captain(*id).is_some())
                .collect();
            room.current_player = Some(player);
        }
        (Some(player_id), None) => {
            // Sold (or removed) before the next round was stored
            warn!(code, %player_id, round = row.round, "Dropping stale current player");
            room.timer_seconds_remaining = room.timer_duration_seconds;
        }
        (None, _) => {}
    }

    Ok(Some(room))
}

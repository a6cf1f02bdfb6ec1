//! Auction lifecycle controls: start, pause, bid mode

use chrono::Utc;
use rand::Rng;
use tracing::info;

use super::settle::{rotate, Rotation};
use crate::error::{Error, Result};
use crate::models::{BidMode, RoomState};

/// Activate the auction and put the first player up.
///
/// An empty pool is rejected and leaves the room untouched.
pub fn start_auction<R: Rng + ?Sized>(room: &mut RoomState, rng: &mut R) -> Result<Rotation> {
    if room.is_active {
        return Err(Error::AuctionAlreadyActive);
    }
    if room.unsold_players.is_empty() {
        return Err(Error::NoAvailablePlayers);
    }

    room.is_active = true;
    room.is_paused = false;
    room.started_at = Some(Utc::now());
    room.ended_at = None;
    room.current_player = None;

    let rotation = rotate(room, rng, None);
    info!(code = %room.tournament_code, round = room.round, "Auction started");
    Ok(rotation)
}

/// Freeze or unfreeze the round. Returns whether anything changed.
///
/// The remaining seconds stay as they are so that resuming continues from
/// the same value.
pub fn set_paused(room: &mut RoomState, paused: bool) -> Result<bool> {
    if !room.is_active {
        return Err(Error::AuctionNotActive);
    }
    if room.is_paused == paused {
        return Ok(false);
    }
    room.is_paused = paused;
    Ok(true)
}

/// Change how bids are presented. Returns whether anything changed.
pub fn set_bid_mode(room: &mut RoomState, mode: BidMode) -> bool {
    if room.bid_mode == mode {
        return false;
    }
    room.bid_mode = mode;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::round::fixtures::{open_room, rng, room_with};

    #[test]
    fn test_start_selects_first_player() {
        let mut room = room_with(&[(1, 200), (2, 275)], &[3, 4]);
        let rotation = start_auction(&mut room, &mut rng()).unwrap();

        let Rotation::Selected(player) = rotation else {
            panic!("expected a player");
        };
        assert!(room.is_active);
        assert!(!room.is_paused);
        assert!(room.started_at.is_some());
        assert_eq!(room.round, 1);
        assert_eq!(room.current_bid, player.starting_price);
        assert_eq!(room.round_start_credits.len(), 2);
        assert_eq!(room.timer_seconds_remaining, room.timer_duration_seconds);
    }

    #[test]
    fn test_start_twice_rejected() {
        let mut room = open_room(&[(1, 200)], &[3]);
        let before = room.clone();
        assert!(matches!(
            start_auction(&mut room, &mut rng()),
            Err(Error::AuctionAlreadyActive)
        ));
        assert_eq!(room, before);
    }

    #[test]
    fn test_start_with_empty_pool() {
        let mut room = room_with(&[(1, 200)], &[]);
        assert!(matches!(
            start_auction(&mut room, &mut rng()),
            Err(Error::NoAvailablePlayers)
        ));
        assert!(!room.is_active);
    }

    #[test]
    fn test_pause_keeps_remaining_time() {
        let mut room = open_room(&[(1, 200)], &[3]);
        room.timer_seconds_remaining = 17;

        assert!(set_paused(&mut room, true).unwrap());
        assert!(!set_paused(&mut room, true).unwrap());
        assert_eq!(room.timer_seconds_remaining, 17);
        assert!(!room.is_biddable());

        assert!(set_paused(&mut room, false).unwrap());
        assert_eq!(room.timer_seconds_remaining, 17);
        assert!(room.is_biddable());
    }

    #[test]
    fn test_pause_inactive_rejected() {
        let mut room = room_with(&[(1, 200)], &[3]);
        assert!(matches!(set_paused(&mut room, true), Err(Error::AuctionNotActive)));
    }

    #[test]
    fn test_bid_mode_change_any_time() {
        let mut room = room_with(&[(1, 200)], &[3]);
        assert!(set_bid_mode(&mut room, BidMode::Blind));
        assert!(!set_bid_mode(&mut room, BidMode::Blind));
        assert_eq!(room.bid_mode, BidMode::Blind);
    }
}

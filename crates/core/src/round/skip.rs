//! Skip-vote tallying

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::RoomState;

/// Votes needed to force the round closed: ceil(captains / 2)
pub fn skip_quorum(captain_count: usize) -> usize {
    captain_count.div_ceil(2)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipTally {
    pub votes: Vec<Uuid>,
    pub needed: usize,
    pub quorum_reached: bool,
}

/// Current tally for the open round
pub fn tally(room: &RoomState) -> SkipTally {
    let needed = skip_quorum(room.captains.len());
    SkipTally {
        votes: room.skip_votes.iter().copied().collect(),
        needed,
        quorum_reached: needed > 0 && room.skip_votes.len() >= needed,
    }
}

/// Record a captain's vote to pass on the current player
pub fn vote_skip(room: &mut RoomState, captain_id: Uuid) -> Result<SkipTally> {
    if !room.is_biddable() {
        return Err(Error::AuctionNotActive);
    }
    if room.captain(captain_id).is_none() {
        return Err(Error::UnknownCaptain(captain_id));
    }
    if room.skip_votes.contains(&captain_id) {
        return Err(Error::AlreadyVoted(captain_id));
    }

    room.skip_votes.insert(captain_id);
    Ok(tally(room))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::round::fixtures::{open_room, room_with};

    #[test]
    fn test_quorum_formula() {
        assert_eq!(skip_quorum(1), 1);
        assert_eq!(skip_quorum(2), 1);
        assert_eq!(skip_quorum(4), 2);
        assert_eq!(skip_quorum(5), 3);
        assert_eq!(skip_quorum(6), 3);
    }

    #[test]
    fn test_third_of_five_reaches_quorum() {
        let mut room = open_room(&[(1, 200), (2, 275), (3, 350), (4, 425), (5, 500)], &[2]);
        let ids: Vec<Uuid> = room.captains.iter().map(|c| c.id).collect();

        assert!(!vote_skip(&mut room, ids[0]).unwrap().quorum_reached);
        assert!(!vote_skip(&mut room, ids[1]).unwrap().quorum_reached);
        let tally = vote_skip(&mut room, ids[2]).unwrap();
        assert!(tally.quorum_reached);
        assert_eq!(tally.needed, 3);
        assert_eq!(tally.votes.len(), 3);
    }

    #[test]
    fn test_double_vote_rejected() {
        let mut room = open_room(&[(1, 200), (2, 275), (3, 350)], &[4]);
        let voter = room.captains[0].id;
        vote_skip(&mut room, voter).unwrap();
        assert!(matches!(
            vote_skip(&mut room, voter),
            Err(Error::AlreadyVoted(id)) if id == voter
        ));
        assert_eq!(room.skip_votes.len(), 1);
    }

    #[test]
    fn test_vote_preconditions() {
        let mut room = room_with(&[(1, 200)], &[4]);
        let voter = room.captains[0].id;
        assert!(matches!(vote_skip(&mut room, voter), Err(Error::AuctionNotActive)));

        let mut room = open_room(&[(1, 200)], &[4]);
        assert!(matches!(
            vote_skip(&mut room, Uuid::new_v4()),
            Err(Error::UnknownCaptain(_))
        ));
        assert!(room.skip_votes.is_empty());
    }
}

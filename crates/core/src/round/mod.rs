//! Round rules.
//!
//! Pure functions over [`RoomState`](crate::models::RoomState). Callers hold
//! the room lock; nothing in here touches storage, clocks or the network.

mod bid;
mod control;
mod settle;
mod skip;

pub use bid::{place_bid, BidAccepted};
pub use control::{set_bid_mode, set_paused, start_auction};
pub use settle::{rotate, settle_round, Rotation, RoundOutcome};
pub use skip::{skip_quorum, tally, vote_skip, SkipTally};

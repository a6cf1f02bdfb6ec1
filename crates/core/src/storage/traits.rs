//! Storage repository traits
//!
//! These traits define the storage interface, allowing for different
//! implementations (SQLite, mock, a flaky wrapper in tests).

use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    AuctionRow, BidRecord, Captain, Player, RoomState, SaleRecord, SkipVoteRecord, Tournament,
};

/// Auction state and ledger operations used by the engine
pub trait AuctionRepository {
    /// Rebuild a room from durable state, creating the auction row on first use.
    ///
    /// Returns `None` if no tournament has this code.
    fn load_room(&self, code: &str, default_timer: u32) -> Result<Option<RoomState>>;

    /// Create or update the auction row
    fn save_auction(&self, row: &AuctionRow) -> Result<()>;

    /// Append to the bid ledger
    fn record_bid(&self, bid: &BidRecord) -> Result<()>;

    /// Append to the skip-vote ledger
    fn record_skip_vote(&self, vote: &SkipVoteRecord) -> Result<()>;

    /// Apply a closed round atomically: the optional sale and the next auction row
    fn close_round(&self, sale: Option<&SaleRecord>, next: &AuctionRow) -> Result<()>;
}

/// Minimal roster operations for seeding rooms
pub trait RosterRepository {
    fn create_tournament(&self, tournament: &Tournament) -> Result<()>;

    fn find_tournament_by_code(&self, code: &str) -> Result<Option<Tournament>>;

    /// Insert a captain with its ledger credits and picked tiers
    fn create_captain(&self, captain: &Captain) -> Result<()>;

    fn create_player(&self, player: &Player) -> Result<()>;

    /// Captains with their picked tiers and drafted players
    fn list_captains(&self, tournament_id: Uuid) -> Result<Vec<Captain>>;

    fn list_unsold_players(&self, tournament_id: Uuid) -> Result<Vec<Player>>;
}

/// Combined storage interface
pub trait Storage: AuctionRepository + RosterRepository {}

impl<T> Storage for T where T: AuctionRepository + RosterRepository {}

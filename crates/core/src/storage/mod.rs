//! SQLite storage layer for the draft auction

mod auctions;
mod captains;
mod migrations;
mod parse;
mod players;
mod rooms;
mod tournaments;
mod traits;

use rusqlite::Connection;
use std::path::Path;
use tracing::instrument;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    AuctionRow, BidRecord, Captain, Player, RoomState, SaleRecord, SkipVoteRecord, Tournament,
};

pub use auctions::AuctionStore;
pub use captains::CaptainStore;
pub use players::PlayerStore;
pub use tournaments::TournamentStore;
pub use traits::{AuctionRepository, RosterRepository, Storage};

/// Main database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initialize database schema via migrations
    fn init(&self) -> Result<()> {
        migrations::run_migrations(&self.conn)?;
        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> u32 {
        self.conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    pub fn tournaments(&self) -> TournamentStore<'_> {
        TournamentStore::new(&self.conn)
    }

    pub fn captains(&self) -> CaptainStore<'_> {
        CaptainStore::new(&self.conn)
    }

    pub fn players(&self) -> PlayerStore<'_> {
        PlayerStore::new(&self.conn)
    }

    pub fn auctions(&self) -> AuctionStore<'_> {
        AuctionStore::new(&self.conn)
    }
}

impl AuctionRepository for Database {
    fn load_room(&self, code: &str, default_timer: u32) -> Result<Option<RoomState>> {
        rooms::load_room(&self.conn, code, default_timer)
    }

    fn save_auction(&self, row: &AuctionRow) -> Result<()> {
        self.auctions().save(row)
    }

    fn record_bid(&self, bid: &BidRecord) -> Result<()> {
        self.auctions().record_bid(bid)
    }

    fn record_skip_vote(&self, vote: &SkipVoteRecord) -> Result<()> {
        self.auctions().record_skip_vote(vote)
    }

    fn close_round(&self, sale: Option<&SaleRecord>, next: &AuctionRow) -> Result<()> {
        self.auctions().close_round(sale, next)
    }
}

impl RosterRepository for Database {
    fn create_tournament(&self, tournament: &Tournament) -> Result<()> {
        self.tournaments().create(tournament)
    }

    fn find_tournament_by_code(&self, code: &str) -> Result<Option<Tournament>> {
        self.tournaments().find_by_code(code)
    }

    fn create_captain(&self, captain: &Captain) -> Result<()> {
        self.captains().create(captain)
    }

    fn create_player(&self, player: &Player) -> Result<()> {
        self.players().create(player)
    }

    fn list_captains(&self, tournament_id: Uuid) -> Result<Vec<Captain>> {
        self.captains().list_for_tournament(tournament_id)
    }

    fn list_unsold_players(&self, tournament_id: Uuid) -> Result<Vec<Player>> {
        self.players().list_unsold(tournament_id)
    }
}

//! Auction row and ledger storage operations

use rusqlite::{params, Connection, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::captains::CaptainStore;
use super::parse::{
    parse_datetime, parse_datetime_opt, parse_enum, parse_tier, parse_uuid, parse_uuid_opt,
    OptionalExt,
};
use super::players::PlayerStore;
use super::tournaments::TournamentStore;
use crate::error::Result;
use crate::models::{AuctionRow, BidRecord, HistoryEntry, SaleRecord, SkipVoteRecord};

fn auction_from_row(row: &Row<'_>) -> rusqlite::Result<AuctionRow> {
    Ok(AuctionRow {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        tournament_id: parse_uuid(&row.get::<_, String>(1)?)?,
        is_active: row.get(2)?,
        is_paused: row.get(3)?,
        bid_mode: parse_enum(&row.get::<_, String>(4)?)?,
        timer_seconds: row.get(5)?,
        current_timer: row.get(6)?,
        current_player_id: parse_uuid_opt(row.get::<_, Option<String>>(7)?)?,
        round: row.get(8)?,
        started_at: parse_datetime_opt(row.get::<_, Option<String>>(9)?)?,
        ended_at: parse_datetime_opt(row.get::<_, Option<String>>(10)?)?,
    })
}

pub struct AuctionStore<'a> {
    conn: &'a Connection,
}

impl<'a> AuctionStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    #[instrument(skip(self))]
    pub fn find_for_tournament(&self, tournament_id: Uuid) -> Result<Option<AuctionRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, tournament_id, is_active, is_paused, bid_mode, timer_seconds,
                        current_timer, current_player_id, round, started_at, ended_at
                 FROM auctions WHERE tournament_id = ?1",
                params![tournament_id.to_string()],
                auction_from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Insert or overwrite the auction row
    #[instrument(skip(self, row), fields(auction_id = %row.id, round = row.round))]
    pub fn save(&self, row: &AuctionRow) -> Result<()> {
        self.conn.execute(
            "INSERT INTO auctions (id, tournament_id, is_active, is_paused, bid_mode, timer_seconds,
                                   current_timer, current_player_id, round, started_at, ended_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(id) DO UPDATE SET
                is_active = excluded.is_active,
                is_paused = excluded.is_paused,
                bid_mode = excluded.bid_mode,
                timer_seconds = excluded.timer_seconds,
                current_timer = excluded.current_timer,
                current_player_id = excluded.current_player_id,
                round = excluded.round,
                started_at = excluded.started_at,
                ended_at = excluded.ended_at",
            params![
                row.id.to_string(),
                row.tournament_id.to_string(),
                row.is_active,
                row.is_paused,
                row.bid_mode.as_str(),
                row.timer_seconds,
                row.current_timer,
                row.current_player_id.map(|p| p.to_string()),
                row.round,
                row.started_at.map(|t| t.to_rfc3339()),
                row.ended_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        TournamentStore::new(self.conn).sync_status(row)
    }

    #[instrument(skip(self, bid), fields(round = bid.round, amount = bid.amount))]
    pub fn record_bid(&self, bid: &BidRecord) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO auction_bids (id, auction_id, captain_id, player_id, round, amount, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                bid.id.to_string(),
                bid.auction_id.to_string(),
                bid.captain_id.to_string(),
                bid.player_id.to_string(),
                bid.round,
                bid.amount,
                bid.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    #[instrument(skip(self, vote), fields(round = vote.round))]
    pub fn record_skip_vote(&self, vote: &SkipVoteRecord) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO auction_skip_votes (auction_id, captain_id, player_id, round, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                vote.auction_id.to_string(),
                vote.captain_id.to_string(),
                vote.player_id.to_string(),
                vote.round,
                vote.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Bids of one round for one player, lowest first
    pub fn bids_for_round(&self, auction_id: Uuid, round: u64, player_id: Uuid) -> Result<Vec<BidRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, auction_id, captain_id, player_id, round, amount, created_at
             FROM auction_bids WHERE auction_id = ?1 AND round = ?2 AND player_id = ?3
             ORDER BY amount, created_at",
        )?;
        let bids = stmt
            .query_map(
                params![auction_id.to_string(), round, player_id.to_string()],
                |row| {
                    Ok(BidRecord {
                        id: parse_uuid(&row.get::<_, String>(0)?)?,
                        auction_id: parse_uuid(&row.get::<_, String>(1)?)?,
                        captain_id: parse_uuid(&row.get::<_, String>(2)?)?,
                        player_id: parse_uuid(&row.get::<_, String>(3)?)?,
                        round: row.get(4)?,
                        amount: row.get(5)?,
                        created_at: parse_datetime(&row.get::<_, String>(6)?)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(bids)
    }

    pub fn skip_votes_for_round(&self, auction_id: Uuid, round: u64, player_id: Uuid) -> Result<Vec<SkipVoteRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT auction_id, captain_id, player_id, round, created_at
             FROM auction_skip_votes WHERE auction_id = ?1 AND round = ?2 AND player_id = ?3",
        )?;
        let votes = stmt
            .query_map(
                params![auction_id.to_string(), round, player_id.to_string()],
                |row| {
                    Ok(SkipVoteRecord {
                        auction_id: parse_uuid(&row.get::<_, String>(0)?)?,
                        captain_id: parse_uuid(&row.get::<_, String>(1)?)?,
                        player_id: parse_uuid(&row.get::<_, String>(2)?)?,
                        round: row.get(3)?,
                        created_at: parse_datetime(&row.get::<_, String>(4)?)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(votes)
    }

    /// Completed sales, oldest first
    #[instrument(skip(self))]
    pub fn history(&self, auction_id: Uuid) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, player_id, player_name, captain_id, captain_name, tier, final_bid, timestamp
             FROM auction_history WHERE auction_id = ?1 ORDER BY timestamp, rowid",
        )?;
        let entries = stmt
            .query_map(params![auction_id.to_string()], |row| {
                Ok(HistoryEntry {
                    id: parse_uuid(&row.get::<_, String>(0)?)?,
                    player_id: parse_uuid(&row.get::<_, String>(1)?)?,
                    player_name: row.get(2)?,
                    captain_id: parse_uuid(&row.get::<_, String>(3)?)?,
                    captain_name: row.get(4)?,
                    tier: parse_tier(row.get(5)?)?,
                    final_bid: row.get(6)?,
                    timestamp: parse_datetime(&row.get::<_, String>(7)?)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Apply a closed round in one transaction.
    ///
    /// Every statement writes absolute values or ignores duplicates, so a
    /// retry after a partial failure converges on the same state.
    #[instrument(skip(self, sale, next), fields(auction_id = %next.id, round = next.round))]
    pub fn close_round(&self, sale: Option<&SaleRecord>, next: &AuctionRow) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        if let Some(sale) = sale {
            let entry = &sale.entry;
            let captains = CaptainStore::new(&tx);
            captains.set_credits(entry.captain_id, sale.captain_credits)?;
            captains.add_picked_tier(entry.captain_id, entry.tier)?;
            PlayerStore::new(&tx).set_owner(entry.player_id, entry.captain_id)?;

            tx.execute(
                "INSERT OR IGNORE INTO auction_history
                    (id, auction_id, player_id, player_name, captain_id, captain_name, tier, final_bid, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    entry.id.to_string(),
                    sale.auction_id.to_string(),
                    entry.player_id.to_string(),
                    entry.player_name,
                    entry.captain_id.to_string(),
                    entry.captain_name,
                    entry.tier.get(),
                    entry.final_bid,
                    entry.timestamp.to_rfc3339(),
                ],
            )?;
            debug!(player = %entry.player_name, captain = %entry.captain_name, final_bid = entry.final_bid, "Sale recorded");
        }

        AuctionStore::new(&tx).save(next)?;
        tx.commit()?;
        Ok(())
    }
}

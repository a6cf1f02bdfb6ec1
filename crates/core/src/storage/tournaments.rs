//! Tournament storage operations

use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_datetime, parse_enum, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::{AuctionRow, Tournament, TournamentStatus};

pub struct TournamentStore<'a> {
    conn: &'a Connection,
}

fn tournament_from_row(row: &Row<'_>) -> rusqlite::Result<Tournament> {
    Ok(Tournament {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        code: row.get(1)?,
        name: row.get(2)?,
        status: parse_enum(&row.get::<_, String>(3)?)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?)?,
    })
}

impl<'a> TournamentStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    #[instrument(skip(self, tournament), fields(code = %tournament.code))]
    pub fn create(&self, tournament: &Tournament) -> Result<()> {
        self.conn.execute(
            "INSERT INTO tournaments (id, code, name, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                tournament.id.to_string(),
                tournament.code,
                tournament.name,
                tournament.status.as_str(),
                tournament.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn find_by_code(&self, code: &str) -> Result<Option<Tournament>> {
        let tournament = self
            .conn
            .query_row(
                "SELECT id, code, name, status, created_at FROM tournaments WHERE code = ?1",
                params![code],
                tournament_from_row,
            )
            .optional()?;
        Ok(tournament)
    }

    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Tournament>> {
        let tournament = self
            .conn
            .query_row(
                "SELECT id, code, name, status, created_at FROM tournaments WHERE id = ?1",
                params![id.to_string()],
                tournament_from_row,
            )
            .optional()?;
        Ok(tournament)
    }

    #[instrument(skip(self))]
    pub fn set_status(&self, id: Uuid, status: TournamentStatus) -> Result<()> {
        self.conn.execute(
            "UPDATE tournaments SET status = ?1 WHERE id = ?2 AND status != ?1",
            params![status.as_str(), id.to_string()],
        )?;
        Ok(())
    }

    /// Follow the auction lifecycle: running means ACTIVE, finished means COMPLETED
    pub fn sync_status(&self, row: &AuctionRow) -> Result<()> {
        if row.is_active {
            self.set_status(row.tournament_id, TournamentStatus::Active)
        } else if row.is_complete() {
            self.set_status(row.tournament_id, TournamentStatus::Completed)
        } else {
            Ok(())
        }
    }
}

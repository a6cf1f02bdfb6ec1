//! Player pool storage operations

use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{
    parse_enum, parse_specialities, parse_tier, parse_uuid, parse_uuid_opt, OptionalExt,
};
use crate::error::Result;
use crate::models::Player;

const PLAYER_COLUMNS: &str =
    "id, tournament_id, name, tier, role, starting_price, specialities, captain_id";

fn player_from_row(row: &Row<'_>) -> rusqlite::Result<Player> {
    Ok(Player {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        tournament_id: parse_uuid(&row.get::<_, String>(1)?)?,
        name: row.get(2)?,
        tier: parse_tier(row.get(3)?)?,
        role: parse_enum(&row.get::<_, String>(4)?)?,
        starting_price: row.get(5)?,
        specialities: parse_specialities(&row.get::<_, String>(6)?)?,
        captain_id: parse_uuid_opt(row.get::<_, Option<String>>(7)?)?,
    })
}

pub struct PlayerStore<'a> {
    conn: &'a Connection,
}

impl<'a> PlayerStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    #[instrument(skip(self, player), fields(player = %player.name, tier = %player.tier))]
    pub fn create(&self, player: &Player) -> Result<()> {
        self.conn.execute(
            "INSERT INTO players (id, tournament_id, name, tier, role, starting_price, specialities, captain_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                player.id.to_string(),
                player.tournament_id.to_string(),
                player.name,
                player.tier.get(),
                player.role.as_str(),
                player.starting_price,
                serde_json::to_string(&player.specialities)?,
                player.captain_id.map(|c| c.to_string()),
            ],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Player>> {
        let player = self
            .conn
            .query_row(
                &format!("SELECT {} FROM players WHERE id = ?1", PLAYER_COLUMNS),
                params![id.to_string()],
                player_from_row,
            )
            .optional()?;
        Ok(player)
    }

    /// Players still in the pool, in insertion order
    #[instrument(skip(self))]
    pub fn list_unsold(&self, tournament_id: Uuid) -> Result<Vec<Player>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM players WHERE tournament_id = ?1 AND captain_id IS NULL ORDER BY rowid",
            PLAYER_COLUMNS
        ))?;
        let players = stmt
            .query_map(params![tournament_id.to_string()], player_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(players)
    }

    #[instrument(skip(self))]
    pub fn list_for_captain(&self, captain_id: Uuid) -> Result<Vec<Player>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM players WHERE captain_id = ?1 ORDER BY tier",
            PLAYER_COLUMNS
        ))?;
        let players = stmt
            .query_map(params![captain_id.to_string()], player_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(players)
    }

    /// Assign an owner. Idempotent for the same captain.
    pub fn set_owner(&self, player_id: Uuid, captain_id: Uuid) -> Result<()> {
        self.conn.execute(
            "UPDATE players SET captain_id = ?1 WHERE id = ?2",
            params![captain_id.to_string(), player_id.to_string()],
        )?;
        Ok(())
    }
}

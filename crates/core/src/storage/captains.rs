//! Captain storage operations

use rusqlite::{params, Connection};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_enum, parse_tier, parse_uuid};
use super::players::PlayerStore;
use crate::error::Result;
use crate::models::{Captain, Tier};

pub struct CaptainStore<'a> {
    conn: &'a Connection,
}

impl<'a> CaptainStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    #[instrument(skip(self, captain), fields(captain = %captain.name, tier = %captain.tier))]
    pub fn create(&self, captain: &Captain) -> Result<()> {
        self.conn.execute(
            "INSERT INTO captains (id, tournament_id, user_id, name, tier, role, credits)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                captain.id.to_string(),
                captain.tournament_id.to_string(),
                captain.user_id.to_string(),
                captain.name,
                captain.tier.get(),
                captain.role.as_str(),
                captain.credits,
            ],
        )?;
        for tier in &captain.picked_tiers {
            self.add_picked_tier(captain.id, *tier)?;
        }
        Ok(())
    }

    /// Captains of a tournament, fully loaded, in insertion order
    #[instrument(skip(self))]
    pub fn list_for_tournament(&self, tournament_id: Uuid) -> Result<Vec<Captain>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, tournament_id, user_id, name, tier, role, credits
             FROM captains WHERE tournament_id = ?1 ORDER BY rowid",
        )?;

        let mut captains = stmt
            .query_map(params![tournament_id.to_string()], |row| {
                Ok(Captain {
                    id: parse_uuid(&row.get::<_, String>(0)?)?,
                    tournament_id: parse_uuid(&row.get::<_, String>(1)?)?,
                    user_id: parse_uuid(&row.get::<_, String>(2)?)?,
                    name: row.get(3)?,
                    tier: parse_tier(row.get(4)?)?,
                    role: parse_enum(&row.get::<_, String>(5)?)?,
                    credits: row.get(6)?,
                    picked_tiers: Vec::new(),
                    players: Vec::new(),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let players = PlayerStore::new(self.conn);
        for captain in &mut captains {
            captain.picked_tiers = self.picked_tiers(captain.id)?;
            captain.players = players.list_for_captain(captain.id)?;
        }
        Ok(captains)
    }

    pub fn picked_tiers(&self, captain_id: Uuid) -> Result<Vec<Tier>> {
        let mut stmt = self.conn.prepare(
            "SELECT tier FROM captain_picked_tiers WHERE captain_id = ?1 ORDER BY rowid",
        )?;
        let tiers = stmt
            .query_map(params![captain_id.to_string()], |row| parse_tier(row.get(0)?))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tiers)
    }

    /// Record a drafted tier. Re-adding the same tier is a no-op.
    pub fn add_picked_tier(&self, captain_id: Uuid, tier: Tier) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO captain_picked_tiers (captain_id, tier) VALUES (?1, ?2)",
            params![captain_id.to_string(), tier.get()],
        )?;
        Ok(())
    }

    /// Write the absolute ledger value
    pub fn set_credits(&self, captain_id: Uuid, credits: u32) -> Result<()> {
        self.conn.execute(
            "UPDATE captains SET credits = ?1 WHERE id = ?2",
            params![credits, captain_id.to_string()],
        )?;
        Ok(())
    }
}

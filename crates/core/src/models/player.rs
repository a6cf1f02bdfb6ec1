//! Player model - the unit being auctioned

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PlayerRole, Tier};

/// A player in the draft pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub name: String,
    pub tier: Tier,
    pub role: PlayerRole,
    pub starting_price: u32,
    /// Preferred sub-roles, most preferred first
    pub specialities: Vec<String>,
    pub captain_id: Option<Uuid>,
}

impl Player {
    pub fn new(tournament_id: Uuid, name: String, tier: Tier, role: PlayerRole) -> Self {
        Self {
            id: Uuid::new_v4(),
            tournament_id,
            name,
            tier,
            role,
            starting_price: tier.starting_price(),
            specialities: Vec::new(),
            captain_id: None,
        }
    }

    pub fn with_specialities(mut self, specialities: Vec<String>) -> Self {
        self.specialities = specialities;
        self
    }

    pub fn is_sold(&self) -> bool {
        self.captain_id.is_some()
    }
}

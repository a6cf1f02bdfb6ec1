//! Captain model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Player, PlayerRole, Tier};

/// A team captain bidding in the auction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Captain {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub tier: Tier,
    pub role: PlayerRole,
    /// Ledger credits. Only settlement changes this value.
    pub credits: u32,
    pub picked_tiers: Vec<Tier>,
    pub players: Vec<Player>,
}

impl Captain {
    pub fn new(
        tournament_id: Uuid,
        user_id: Uuid,
        name: String,
        tier: Tier,
        role: PlayerRole,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tournament_id,
            user_id,
            name,
            tier,
            role,
            credits: tier.starting_credits(),
            picked_tiers: Vec::new(),
            players: Vec::new(),
        }
    }

    pub fn with_credits(mut self, credits: u32) -> Self {
        self.credits = credits;
        self
    }

    pub fn has_picked(&self, tier: Tier) -> bool {
        self.picked_tiers.contains(&tier)
    }

    /// Can this captain ever bid on a player of `tier`?
    pub fn may_draft(&self, tier: Tier) -> bool {
        self.tier != tier && !self.has_picked(tier)
    }
}

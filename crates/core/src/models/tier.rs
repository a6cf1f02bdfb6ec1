//! Skill tiers and player roles

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Skill tier from 1 (best) to 5
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Tier(u8);

impl Tier {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Result<Self, Error> {
        Self::try_from(value)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Opening price for a player of this tier
    pub fn starting_price(self) -> u32 {
        match self.0 {
            1 => 100,
            2 => 80,
            3 => 60,
            4 => 40,
            _ => 20,
        }
    }

    /// Default budget for a captain of this tier
    pub fn starting_credits(self) -> u32 {
        match self.0 {
            1 => 200,
            2 => 275,
            3 => 350,
            4 => 425,
            _ => 500,
        }
    }

    /// All tiers, best first
    pub fn all() -> impl Iterator<Item = Tier> {
        (Self::MIN..=Self::MAX).map(Tier)
    }
}

impl TryFrom<u8> for Tier {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Tier(value))
        } else {
            Err(Error::InvalidValue(format!("tier {} out of range 1-5", value)))
        }
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> u8 {
        tier.0
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// In-game role of a player or captain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerRole {
    Duelist,
    Initiator,
    Controller,
    Sentinel,
    Flex,
}

impl PlayerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerRole::Duelist => "DUELIST",
            PlayerRole::Initiator => "INITIATOR",
            PlayerRole::Controller => "CONTROLLER",
            PlayerRole::Sentinel => "SENTINEL",
            PlayerRole::Flex => "FLEX",
        }
    }
}

impl FromStr for PlayerRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DUELIST" => Ok(PlayerRole::Duelist),
            "INITIATOR" => Ok(PlayerRole::Initiator),
            "CONTROLLER" => Ok(PlayerRole::Controller),
            "SENTINEL" => Ok(PlayerRole::Sentinel),
            "FLEX" => Ok(PlayerRole::Flex),
            other => Err(Error::InvalidValue(format!("unknown role {}", other))),
        }
    }
}

impl fmt::Display for PlayerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Tournament model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TournamentStatus {
    Upcoming,
    Active,
    Completed,
}

impl TournamentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentStatus::Upcoming => "UPCOMING",
            TournamentStatus::Active => "ACTIVE",
            TournamentStatus::Completed => "COMPLETED",
        }
    }
}

impl FromStr for TournamentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UPCOMING" => Ok(TournamentStatus::Upcoming),
            "ACTIVE" => Ok(TournamentStatus::Active),
            "COMPLETED" => Ok(TournamentStatus::Completed),
            other => Err(Error::InvalidValue(format!("unknown tournament status {}", other))),
        }
    }
}

impl fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tournament, addressed by its short join code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tournament {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub status: TournamentStatus,
    pub created_at: DateTime<Utc>,
}

impl Tournament {
    pub fn new(name: String) -> Self {
        Self::with_code(name, generate_code())
    }

    pub fn with_code(name: String, code: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            code,
            name,
            status: TournamentStatus::Upcoming,
            created_at: Utc::now(),
        }
    }
}

/// Generate a random 4-character join code
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

//! Error types for the draft core

use thiserror::Error;
use uuid::Uuid;

use crate::models::Tier;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Auction is not active")]
    AuctionNotActive,

    #[error("Auction is already running")]
    AuctionAlreadyActive,

    #[error("Unknown captain: {0}")]
    UnknownCaptain(Uuid),

    #[error("Bid of {amount} is too low (current bid is {current})")]
    BidTooLow { amount: u32, current: u32 },

    #[error("Insufficient credits: bid {amount}, round budget {available}")]
    InsufficientCredits { amount: u32, available: u32 },

    #[error("Captains cannot bid on their own tier ({0})")]
    OwnTierForbidden(Tier),

    #[error("Captain already drafted a tier {0} player")]
    TierAlreadyFilled(Tier),

    #[error("Captain {0} already voted to skip")]
    AlreadyVoted(Uuid),

    #[error("No available players")]
    NoAvailablePlayers,

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Tournament not found: {0}")]
    TournamentNotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Stable code sent to clients alongside a rejection
    pub fn code(&self) -> &'static str {
        match self {
            Error::AuctionNotActive => "AuctionNotActive",
            Error::AuctionAlreadyActive => "AuctionAlreadyActive",
            Error::UnknownCaptain(_) => "UnknownCaptain",
            Error::BidTooLow { .. } => "BidTooLow",
            Error::InsufficientCredits { .. } => "InsufficientCredits",
            Error::OwnTierForbidden(_) => "OwnTierForbidden",
            Error::TierAlreadyFilled(_) => "TierAlreadyFilled",
            Error::AlreadyVoted(_) => "AlreadyVoted",
            Error::NoAvailablePlayers => "NoAvailablePlayers",
            Error::PersistenceFailure(_) | Error::Database(_) => "PersistenceFailure",
            Error::TournamentNotFound(_) => "TournamentNotFound",
            Error::InvalidState(_) => "InvalidState",
            Error::InvalidValue(_) => "InvalidValue",
            Error::Config(_) => "Config",
            Error::Io(_) => "Io",
            Error::Serialization(_) => "Serialization",
        }
    }

    /// True for rejections caused by the request itself rather than the system
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::AuctionNotActive
                | Error::AuctionAlreadyActive
                | Error::UnknownCaptain(_)
                | Error::BidTooLow { .. }
                | Error::InsufficientCredits { .. }
                | Error::OwnTierForbidden(_)
                | Error::TierAlreadyFilled(_)
                | Error::AlreadyVoted(_)
                | Error::NoAvailablePlayers
                | Error::TournamentNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

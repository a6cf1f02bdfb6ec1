//! Draft Core Library
//!
//! Models, round rules, countdown arithmetic, configuration and storage for
//! the live draft auction.

pub mod clock;
pub mod config;
pub mod error;
pub mod invariants;
pub mod models;
pub mod round;
pub mod storage;

pub use clock::Countdown;
pub use config::{ConfigError, DraftConfig};
pub use error::{Error, Result};
pub use models::*;
pub use storage::{AuctionRepository, Database, RosterRepository, Storage};

//! Data models for the draft auction

mod auction;
mod captain;
mod player;
mod room;
mod tier;
mod tournament;

pub use auction::*;
pub use captain::*;
pub use player::*;
pub use room::*;
pub use tier::*;
pub use tournament::*;

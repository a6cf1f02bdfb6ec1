//! Live auction engine: room cache, command dispatch, round timers and
//! write-behind persistence.

pub mod cache;
pub mod cluster;
pub mod command;
pub mod engine;
pub mod event;
pub mod persist;
pub mod store;
pub mod timer;

pub use cache::{Replication, RoomUpdate, SharedCache, WorkerId};
pub use cluster::Cluster;
pub use command::Command;
pub use engine::Engine;
pub use event::AuctionEvent;
pub use persist::{PersistFailure, PersistJob, Persister};
pub use store::{RoomStore, RoomTxn, SharedStore};
pub use timer::{TimerDriver, TimerPhase, TimerRegistry, TimerStep};

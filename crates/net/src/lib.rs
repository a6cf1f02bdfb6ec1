//! Draft live channel
//!
//! TCP transport between auction rooms and their clients.
//!
//! # Architecture
//!
//! - **Server**: one per worker, serves every room through that worker's engine
//! - **Client**: joins one room and exchanges commands and events
//! - **Protocol**: Length-prefixed JSON messages
//!
//! # Usage
//!
//! ```ignore
//! let server = Server::start(addr, Arc::clone(cluster.engine(0).unwrap())).await?;
//!
//! let (mut client, room) = Client::connect(server.addr(), "K7Q2XP").await?;
//! client.place_bid(captain_id, 65).await?;
//! while let Some(msg) = client.next_message().await {
//!     match msg {
//!         ServerMessage::Event { event } => { /* handle */ }
//!         _ => {}
//!     }
//! }
//! ```

pub mod client;
pub mod error;
mod frame;
pub mod protocol;
pub mod server;

pub use client::{Client, ConnectionState};
pub use error::{Error, Result};
pub use protocol::{ClientMessage, ServerMessage};
pub use server::Server;

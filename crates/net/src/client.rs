//! TCP client for the live channel

use std::net::SocketAddr;
use std::sync::Arc;

use draft_core::RoomState;
use draft_engine::Command;
use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{ClientMessage, ServerMessage};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

enum Outgoing {
    Send(ClientMessage),
    Disconnect,
}

/// A joined connection to one auction room
pub struct Client {
    state: Arc<RwLock<ConnectionState>>,
    inbox: mpsc::Receiver<ServerMessage>,
    outbox: mpsc::Sender<Outgoing>,
}

impl Client {
    /// Connect and join `tournament_code`, returning the initial snapshot
    pub async fn connect(addr: SocketAddr, tournament_code: &str) -> Result<(Self, RoomState)> {
        info!(addr = %addr, code = tournament_code, "Connecting to server");

        let stream = TcpStream::connect(addr).await?;
        let (mut reader, mut writer) = tokio::io::split(stream);

        let join = ClientMessage::Join {
            tournament_code: tournament_code.to_string(),
        };
        write_frame(&mut writer, &join).await?;

        let room = match read_frame(&mut reader).await? {
            ServerMessage::Joined { room, .. } => room,
            ServerMessage::Rejected { code, message } => {
                warn!(code = %code, message = %message, "Join rejected");
                return Err(Error::Rejected { code, message });
            }
            other => {
                return Err(Error::Protocol(format!("Expected Joined, got {:?}", other)));
            }
        };

        let state = Arc::new(RwLock::new(ConnectionState::Connected));
        let (inbox_tx, inbox) = mpsc::channel(256);
        let (outbox, outbox_rx) = mpsc::channel(64);
        tokio::spawn(connection_task(reader, writer, Arc::clone(&state), inbox_tx, outbox_rx));

        Ok((Client { state, inbox, outbox }, room))
    }

    /// Next message from the server; `None` once the connection is gone
    pub async fn next_message(&mut self) -> Option<ServerMessage> {
        self.inbox.recv().await
    }

    pub async fn send_command(&self, command: Command) -> Result<()> {
        self.send(ClientMessage::Command { command }).await
    }

    pub async fn place_bid(&self, captain_id: Uuid, amount: u32) -> Result<()> {
        self.send_command(Command::PlaceBid { captain_id, amount }).await
    }

    pub async fn vote_skip(&self, captain_id: Uuid) -> Result<()> {
        self.send_command(Command::VoteSkip { captain_id }).await
    }

    pub async fn ping(&self) -> Result<()> {
        self.send(ClientMessage::Ping).await
    }

    pub async fn disconnect(&self) {
        let _ = self.outbox.send(Outgoing::Disconnect).await;
    }

    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    async fn send(&self, msg: ClientMessage) -> Result<()> {
        self.outbox
            .send(Outgoing::Send(msg))
            .await
            .map_err(|_| Error::NotConnected)
    }
}

async fn connection_task(
    reader: ReadHalf<TcpStream>,
    mut writer: WriteHalf<TcpStream>,
    state: Arc<RwLock<ConnectionState>>,
    inbox: mpsc::Sender<ServerMessage>,
    mut outbox: mpsc::Receiver<Outgoing>,
) {
    // Reads run in their own task: a frame must never be abandoned half-read
    let mut read_task = tokio::spawn(read_loop(reader, inbox));

    loop {
        tokio::select! {
            _ = &mut read_task => break,

            outgoing = outbox.recv() => {
                match outgoing {
                    Some(Outgoing::Send(msg)) => {
                        if let Err(e) = write_frame(&mut writer, &msg).await {
                            warn!(error = %e, "Write error");
                            break;
                        }
                    }
                    Some(Outgoing::Disconnect) | None => {
                        debug!("Disconnect requested");
                        break;
                    }
                }
            }
        }
    }

    read_task.abort();
    *state.write().await = ConnectionState::Disconnected;
}

async fn read_loop(mut reader: ReadHalf<TcpStream>, inbox: mpsc::Sender<ServerMessage>) {
    loop {
        match read_frame::<_, ServerMessage>(&mut reader).await {
            Ok(ServerMessage::ServerShutdown) => {
                info!("Server shutting down");
                let _ = inbox.send(ServerMessage::ServerShutdown).await;
                break;
            }
            Ok(msg) => {
                if inbox.send(msg).await.is_err() {
                    break;
                }
            }
            Err(Error::ConnectionClosed) => {
                debug!("Server closed connection");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Read error");
                break;
            }
        }
    }
}

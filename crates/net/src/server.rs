//! Per-worker TCP server for the live channel
//!
//! Each connection joins one tournament room. Commands go to this worker's
//! engine; room changes made on any worker reach the client through the
//! replication bus.

use std::net::SocketAddr;
use std::sync::Arc;

use draft_core::RoomState;
use draft_engine::{AuctionEvent, Engine, Replication, RoomUpdate, WorkerId};
use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{ClientMessage, ServerMessage};

/// Messages queued per connection before fan-out waits on the client
const OUTBOX_CAPACITY: usize = 256;

/// Worker server handle
pub struct Server {
    addr: SocketAddr,
    worker: WorkerId,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Bind `addr` and serve rooms through `engine`
    pub async fn start(addr: SocketAddr, engine: Arc<Engine>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let bound_addr = listener.local_addr()?;
        let worker = engine.worker();

        info!(addr = %bound_addr, worker, "Server started");

        let (shutdown_tx, _) = broadcast::channel(1);
        tokio::spawn(accept_loop(listener, engine, shutdown_tx.clone()));

        Ok(Server {
            addr: bound_addr,
            worker,
            shutdown_tx,
        })
    }

    /// Get the server's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    /// Stop accepting and tell every connected client
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        info!(worker = self.worker, "Server shutdown initiated");
    }
}

async fn accept_loop(
    listener: TcpListener,
    engine: Arc<Engine>,
    shutdown_tx: broadcast::Sender<()>,
) {
    let mut shutdown_rx = shutdown_tx.subscribe();
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(addr = %addr, "New connection");
                        tokio::spawn(handle_connection(
                            stream,
                            addr,
                            Arc::clone(&engine),
                            shutdown_tx.subscribe(),
                        ));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!(worker = engine.worker(), "Accept loop shutting down");
                break;
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    engine: Arc<Engine>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let (mut reader, writer) = tokio::io::split(stream);
    let (msg_tx, msg_rx) = mpsc::channel(OUTBOX_CAPACITY);
    let writer_handle = tokio::spawn(writer_task(writer, msg_rx));

    // Subscribed before the snapshot is taken so nothing in between is lost
    let bus = engine.subscribe();
    let (code, room) = match handle_join(&mut reader, &engine).await {
        Ok(joined) => joined,
        Err(e) => {
            warn!(addr = %addr, error = %e, "Join failed");
            if let Error::Rejected { code, message } = e {
                let _ = msg_tx.send(ServerMessage::Rejected { code, message }).await;
            }
            drop(msg_tx);
            let _ = writer_handle.await;
            return;
        }
    };

    info!(addr = %addr, code = %code, worker = engine.worker(), "Client joined");

    let version = room.version;
    if msg_tx.send(ServerMessage::joined(&room)).await.is_err() {
        return;
    }
    let fanout = tokio::spawn(fan_out(
        code.clone(),
        version,
        bus,
        msg_tx.clone(),
        Arc::clone(&engine),
    ));

    loop {
        tokio::select! {
            result = read_frame::<_, ClientMessage>(&mut reader) => {
                match result {
                    Ok(msg) => handle_message(msg, &code, &engine, &msg_tx).await,
                    Err(Error::ConnectionClosed) => {
                        debug!(code = %code, "Connection closed");
                        break;
                    }
                    Err(e) => {
                        warn!(code = %code, error = %e, "Read error");
                        break;
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                let _ = msg_tx.send(ServerMessage::ServerShutdown).await;
                break;
            }
        }
    }

    fanout.abort();
    let _ = fanout.await;
    drop(msg_tx);
    let _ = writer_handle.await;

    info!(addr = %addr, code = %code, "Client disconnected");
}

/// The first frame must be a join for a known tournament
async fn handle_join(
    reader: &mut ReadHalf<TcpStream>,
    engine: &Arc<Engine>,
) -> Result<(String, Arc<RoomState>)> {
    match read_frame(reader).await? {
        ClientMessage::Join { tournament_code } => {
            let room = engine
                .join(&tournament_code)
                .await
                .map_err(|e| Error::Rejected {
                    code: e.code().to_string(),
                    message: e.to_string(),
                })?;
            Ok((tournament_code, room))
        }
        _ => Err(Error::Rejected {
            code: "Protocol".to_string(),
            message: "Expected Join".to_string(),
        }),
    }
}

/// Writer task - sends messages to the client
async fn writer_task(mut writer: WriteHalf<TcpStream>, mut rx: mpsc::Receiver<ServerMessage>) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &msg).await {
            debug!(error = %e, "Write failed");
            break;
        }
    }
}

async fn handle_message(
    msg: ClientMessage,
    code: &str,
    engine: &Arc<Engine>,
    outbox: &mpsc::Sender<ServerMessage>,
) {
    match msg {
        ClientMessage::Command { command } => {
            // Accepted commands reach everyone, this client included, through fan-out
            if let Err(e) = engine.dispatch(code, command).await {
                let _ = outbox.send(ServerMessage::rejected(&e)).await;
            }
        }
        ClientMessage::Ping => {
            let _ = outbox.send(ServerMessage::Pong).await;
        }
        ClientMessage::Join { .. } => {
            let _ = outbox
                .send(ServerMessage::Rejected {
                    code: "Protocol".to_string(),
                    message: "Already joined".to_string(),
                })
                .await;
        }
    }
}

/// Forward one room's updates to one client
async fn fan_out(
    code: String,
    mut last_version: u64,
    mut bus: broadcast::Receiver<Replication>,
    outbox: mpsc::Sender<ServerMessage>,
    engine: Arc<Engine>,
) {
    loop {
        let outgoing = match bus.recv().await {
            Ok(Replication::Updated(update)) if update.code == code => {
                if update.state.version <= last_version {
                    continue;
                }
                last_version = update.state.version;
                room_messages(&update)
            }
            Ok(Replication::Evicted { code: evicted }) if evicted == code => {
                debug!(code = %code, "Room evicted");
                continue;
            }
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                warn!(code = %code, skipped, "Fan-out lagged, sending full state");
                match engine.snapshot(&code).await {
                    Ok(room) => {
                        last_version = room.version;
                        vec![ServerMessage::state(&room)]
                    }
                    Err(e) => {
                        warn!(code = %code, error = %e, "Could not load room after lag");
                        continue;
                    }
                }
            }
            Err(RecvError::Closed) => break,
        };

        for msg in outgoing {
            if outbox.send(msg).await.is_err() {
                return;
            }
        }
    }
}

/// Events first, then a full snapshot when the round's shape changed
fn room_messages(update: &RoomUpdate) -> Vec<ServerMessage> {
    let mut messages: Vec<ServerMessage> = update
        .events
        .iter()
        .cloned()
        .map(|event| ServerMessage::Event { event })
        .collect();

    if update.events.is_empty() || update.events.iter().any(AuctionEvent::is_structural) {
        messages.push(ServerMessage::state(&update.state));
    }
    messages
}

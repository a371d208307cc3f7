//! TCP server for the adapter
//!
//! Accepts connections, enforces the hello handshake and per-client `seq`
//! ordering, forwards requests to the engine and streams engine events to
//! every client that asked for them.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tracing::{debug, info, warn};

use tile_swap_core::{GridError, SwapOutcome};
use tile_swap_engine::{Controller, EngineError, EngineEvent, EngineHandle, FallAcks};

use crate::protocol::*;
use crate::types::{Coord, FallId, GridEvent};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub protocol_version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7878,
            protocol_version: PROTOCOL_VERSION.to_string(),
        }
    }
}

impl ServerConfig {
    /// Create from `TILE_SWAP_HOST` / `TILE_SWAP_PORT`
    pub fn from_env() -> Self {
        use std::env;

        let host = env::var("TILE_SWAP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("TILE_SWAP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(7878);

        Self {
            host,
            port,
            protocol_version: PROTOCOL_VERSION.to_string(),
        }
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }

    /// Check if the adapter is disabled via environment
    pub fn is_disabled() -> bool {
        std::env::var("TILE_SWAP_ADAPTER_DISABLED")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }
}

/// Handle to a connected client
struct ClientHandle {
    id: u64,
    handshaken: bool,
    stream_events: bool,
    last_seq: Option<u64>,
    tx: mpsc::UnboundedSender<String>,
}

/// Shared server state
struct ServerState {
    config: ServerConfig,
    engine: EngineHandle,
    clients: RwLock<Vec<ClientHandle>>,
    /// Sequence counter for server-initiated messages
    out_seq: AtomicU64,
}

impl ServerState {
    fn next_seq(&self) -> u64 {
        self.out_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    async fn is_handshaken(&self, client_id: u64) -> bool {
        let clients = self.clients.read().await;
        clients
            .iter()
            .find(|c| c.id == client_id)
            .map(|c| c.handshaken)
            .unwrap_or(false)
    }

    async fn streams_events(&self, client_id: u64) -> bool {
        let clients = self.clients.read().await;
        clients
            .iter()
            .any(|c| c.id == client_id && c.stream_events)
    }

    async fn check_and_update_seq(&self, client_id: u64, seq: u64) -> bool {
        let mut clients = self.clients.write().await;
        let Some(client) = clients.iter_mut().find(|c| c.id == client_id) else {
            return true;
        };

        match client.last_seq {
            Some(prev) if seq <= prev => false,
            _ => {
                client.last_seq = Some(seq);
                true
            }
        }
    }

    async fn broadcast(&self, line: String) {
        let clients = self.clients.read().await;
        for c in clients.iter().filter(|c| c.handshaken && c.stream_events) {
            let _ = c.tx.send(line.clone());
        }
    }
}

fn encode<T: Serialize>(msg: &T) -> Option<String> {
    match serde_json::to_string(msg) {
        Ok(line) => Some(line),
        Err(e) => {
            warn!(error = %e, "failed to encode outbound message");
            None
        }
    }
}

fn send<T: Serialize>(tx: &mpsc::UnboundedSender<String>, msg: &T) {
    if let Some(line) = encode(msg) {
        let _ = tx.send(line);
    }
}

fn out_of_order(seq: u64) -> ErrorMessage {
    create_error(seq, ErrorCode::InvalidCommand, "seq must be strictly increasing")
}

fn error_code(err: &EngineError) -> ErrorCode {
    match err {
        EngineError::Grid(GridError::OutOfBounds { .. }) => ErrorCode::OutOfBounds,
        EngineError::Grid(GridError::NotAdjacent { .. }) => ErrorCode::NotAdjacent,
        EngineError::Grid(_) => ErrorCode::InvalidCommand,
        EngineError::Backpressure => ErrorCode::Backpressure,
        EngineError::Closed => ErrorCode::EngineClosed,
    }
}

/// Start the TCP server.
///
/// `ready_tx` receives the bound address once the listener is up (port 0
/// binds an ephemeral port).
pub async fn run_server(
    config: ServerConfig,
    engine: EngineHandle,
    ready_tx: Option<oneshot::Sender<SocketAddr>>,
) -> anyhow::Result<()> {
    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    let bound = listener.local_addr()?;
    info!(%bound, "adapter listening");
    if let Some(tx) = ready_tx {
        let _ = tx.send(bound);
    }

    let events = engine.subscribe();
    let state = Arc::new(ServerState {
        config,
        engine,
        clients: RwLock::new(Vec::new()),
        out_seq: AtomicU64::new(0),
    });

    tokio::spawn(forward_events(Arc::clone(&state), events));

    let mut client_id_counter = 0u64;
    loop {
        let (socket, addr) = listener.accept().await?;
        client_id_counter += 1;
        let client_id = client_id_counter;
        info!(client_id, %addr, "client connected");

        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_client(socket, client_id, state).await {
                warn!(client_id, error = %e, "client error");
            }
            info!(client_id, "client disconnected");
        });
    }
}

/// Engine event stream -> every streaming client
async fn forward_events(state: Arc<ServerState>, mut events: broadcast::Receiver<EngineEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let settled = matches!(event.event, GridEvent::GridSettled);
                if let Some(line) = encode(&create_event(state.next_seq(), event)) {
                    state.broadcast(line).await;
                }
                if settled {
                    let obs = build_observation(state.next_seq(), &state.engine.observe());
                    if let Some(line) = encode(&obs) {
                        state.broadcast(line).await;
                    }
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                // Lost fall events can never be reported back.
                let released = state.engine.release_falls();
                warn!(skipped, released, "event stream lagged; resyncing clients");
                let obs = build_observation(state.next_seq(), &state.engine.observe());
                if let Some(line) = encode(&obs) {
                    state.broadcast(line).await;
                }
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    debug!("event forwarder stopped");
}

/// Handle a single client connection
async fn handle_client(
    socket: TcpStream,
    client_id: u64,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let (reader, mut writer) = tokio::io::split(socket);
    let mut reader = BufReader::new(reader);

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    // Cascades this client starts wait on its fall reports only while it
    // stays connected.
    let (presence, controller) = Controller::new();
    {
        let mut clients = state.clients.write().await;
        clients.push(ClientHandle {
            id: client_id,
            handshaken: false,
            stream_events: false,
            last_seq: None,
            tx: tx.clone(),
        });
    }

    let write_task = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if writer.write_all(line.as_bytes()).await.is_err()
                || writer.write_all(b"\n").await.is_err()
                || writer.flush().await.is_err()
            {
                break;
            }
        }
    });

    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let msg = match parse_message(trimmed) {
            Ok(msg) => msg,
            Err(e) => {
                let seq = extract_seq_best_effort(trimmed).unwrap_or(0);
                warn!(client_id, error = %e, "unparsable message");
                let message = format!("JSON parse error: {e}");
                send(&tx, &create_error(seq, ErrorCode::InvalidCommand, &message));
                continue;
            }
        };

        let seq = msg.seq();
        let handshaken = state.is_handshaken(client_id).await;

        if let ParsedMessage::Hello(hello) = msg {
            if handshaken && !state.check_and_update_seq(client_id, seq).await {
                send(&tx, &out_of_order(seq));
                continue;
            }
            if !same_major(&hello.protocol_version, &state.config.protocol_version) {
                warn!(client_id, version = %hello.protocol_version, "protocol mismatch");
                send(
                    &tx,
                    &create_error(
                        seq,
                        ErrorCode::ProtocolMismatch,
                        &format!("Protocol version {} not supported", hello.protocol_version),
                    ),
                );
                break;
            }

            {
                let mut clients = state.clients.write().await;
                if let Some(client) = clients.iter_mut().find(|c| c.id == client_id) {
                    client.handshaken = true;
                    client.stream_events = hello.stream_events;
                    client.last_seq = Some(seq);
                }
            }
            info!(client_id, name = %hello.client.name, "client handshaken");

            let observation = state.engine.observe();
            let snapshot = &observation.snapshot;
            send(
                &tx,
                &create_welcome(
                    seq,
                    &state.config.protocol_version,
                    client_id,
                    (snapshot.width, snapshot.height),
                    state.engine.palette_size(),
                ),
            );
            if hello.stream_events {
                send(&tx, &build_observation(state.next_seq(), &observation));
            }
            continue;
        }

        if !handshaken {
            let error = create_error(seq, ErrorCode::HandshakeRequired, "Send hello first");
            send(&tx, &error);
            continue;
        }
        if !state.check_and_update_seq(client_id, seq).await {
            send(&tx, &out_of_order(seq));
            continue;
        }

        match msg {
            ParsedMessage::Hello(_) => {}
            ParsedMessage::Swap(pair) => {
                // Awaiting the outcome must not stall this reader; the client
                // still has to report falls while the swap waits in the queue.
                let engine = state.engine.clone();
                let tx = tx.clone();
                let acks = if state.streams_events(client_id).await {
                    FallAcks::Controller(controller.clone())
                } else {
                    FallAcks::Auto
                };
                tokio::spawn(async move {
                    let from = Coord::from(pair.from);
                    let to = Coord::from(pair.to);
                    match engine.request_swap_with(from, to, acks).await {
                        Ok(SwapOutcome::Accepted(matched)) => {
                            let cells = matched.iter().map(WireCoord::from).collect();
                            send(&tx, &create_swap_result(seq, cells));
                        }
                        Ok(SwapOutcome::Rejected) => {
                            send(&tx, &create_swap_result(seq, Vec::new()));
                        }
                        Err(e) => {
                            debug!(%from, %to, error = %e, "swap refused");
                            send(&tx, &create_error(seq, error_code(&e), &e.to_string()));
                        }
                    }
                });
            }
            ParsedMessage::CanSwap(pair) => {
                let allowed = state.engine.can_swap(pair.from.into(), pair.to.into());
                send(&tx, &create_can_swap_result(seq, allowed));
            }
            ParsedMessage::FallComplete(done) => {
                if !state.engine.notify_fall_complete(FallId(done.fall)) {
                    debug!(client_id, fall = done.fall, "ignored unknown fall id");
                }
                send(&tx, &create_ack(seq, None));
            }
            ParsedMessage::ToggleMode(_) => {
                let engine = state.engine.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    match engine.toggle_mode().await {
                        Ok(mode) => send(&tx, &create_ack(seq, Some(mode))),
                        Err(e) => {
                            send(&tx, &create_error(seq, error_code(&e), &e.to_string()));
                        }
                    }
                });
            }
            ParsedMessage::Snapshot(_) => {
                send(&tx, &build_observation(seq, &state.engine.observe()));
            }
            ParsedMessage::Unknown(_) => {
                let error = create_error(seq, ErrorCode::InvalidCommand, "Unknown message type");
                send(&tx, &error);
            }
        }
    }

    {
        let mut clients = state.clients.write().await;
        clients.retain(|c| c.id != client_id);
    }

    drop(presence);
    drop(tx);
    let _ = write_task.await;
    Ok(())
}

fn same_major(requested: &str, ours: &str) -> bool {
    let major = |v: &str| v.split('.').next().map(str::to_string);
    major(requested).is_some() && major(requested) == major(ours)
}

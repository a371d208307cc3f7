//! Protocol module - JSON message types for the tile-swap adapter
//!
//! Line-delimited JSON. Every message carries `type`, `seq` and `ts`
//! (timestamp in ms). Client `seq` values must strictly increase.

use serde::{Deserialize, Serialize};

use tile_swap_engine::{EngineEvent, Observation};

use crate::types::{Coord, GridEvent, PaletteMode};

pub const PROTOCOL_VERSION: &str = "1.0.0";

// ============== Client -> Engine Messages ==============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HelloType {
    #[serde(rename = "hello")]
    Hello,
}

impl Default for HelloType {
    fn default() -> Self {
        Self::Hello
    }
}

/// Client hello message (first message on a connection)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloMessage {
    #[serde(rename = "type")]
    #[serde(default)]
    pub msg_type: HelloType,
    pub seq: u64,
    #[serde(default)]
    pub ts: u64,
    pub client: ClientInfo,
    pub protocol_version: String,
    /// Receive engine events and observations without asking
    #[serde(default = "default_true")]
    pub stream_events: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

/// Grid position on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WireCoord {
    pub x: u8,
    pub y: u8,
}

impl From<Coord> for WireCoord {
    fn from(c: Coord) -> Self {
        Self { x: c.x, y: c.y }
    }
}

impl From<WireCoord> for Coord {
    fn from(c: WireCoord) -> Self {
        Coord::new(c.x, c.y)
    }
}

/// `swap` and `can_swap` share this body
#[derive(Debug, Clone, Deserialize)]
pub struct PairMessage {
    pub seq: u64,
    #[serde(default)]
    pub ts: u64,
    pub from: WireCoord,
    pub to: WireCoord,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FallCompleteMessage {
    pub seq: u64,
    #[serde(default)]
    pub ts: u64,
    pub fall: u64,
}

/// Messages that carry nothing but a sequence number
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BareMessage {
    pub seq: u64,
    #[serde(default)]
    pub ts: u64,
}

// ============== Engine -> Client Messages ==============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WelcomeType {
    #[serde(rename = "welcome")]
    Welcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AckType {
    #[serde(rename = "ack")]
    Ack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AckStatus {
    #[serde(rename = "ok")]
    Ok,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorType {
    #[serde(rename = "error")]
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwapResultType {
    #[serde(rename = "swap_result")]
    SwapResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanSwapResultType {
    #[serde(rename = "can_swap_result")]
    CanSwapResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "event")]
    Event,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObservationType {
    #[serde(rename = "observation")]
    Observation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "handshake_required")]
    HandshakeRequired,
    #[serde(rename = "protocol_mismatch")]
    ProtocolMismatch,
    #[serde(rename = "invalid_command")]
    InvalidCommand,
    #[serde(rename = "out_of_bounds")]
    OutOfBounds,
    #[serde(rename = "not_adjacent")]
    NotAdjacent,
    #[serde(rename = "backpressure")]
    Backpressure,
    #[serde(rename = "engine_closed")]
    EngineClosed,
}

/// Welcome message (response to hello)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomeMessage {
    #[serde(rename = "type")]
    pub msg_type: WelcomeType,
    pub seq: u64,
    pub ts: u64,
    pub protocol_version: String,
    pub client_id: u64,
    pub width: u8,
    pub height: u8,
    pub palette_size: usize,
}

/// Acknowledgment for `fall_complete` and `toggle_mode`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckMessage {
    #[serde(rename = "type")]
    pub msg_type: AckType,
    pub seq: u64,
    pub ts: u64,
    pub status: AckStatus,
    /// Mode after a toggle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<WireMode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMessage {
    #[serde(rename = "type")]
    pub msg_type: ErrorType,
    pub seq: u64,
    pub ts: u64,
    pub code: ErrorCode,
    pub message: String,
}

/// Outcome of a `swap` request; sent before the cascade starts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapResultMessage {
    #[serde(rename = "type")]
    pub msg_type: SwapResultType,
    pub seq: u64,
    pub ts: u64,
    pub accepted: bool,
    /// Cells of the runs the swap formed, empty when rejected
    pub matched: Vec<WireCoord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanSwapResultMessage {
    #[serde(rename = "type")]
    pub msg_type: CanSwapResultType,
    pub seq: u64,
    pub ts: u64,
    pub allowed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireMode {
    #[serde(rename = "visible")]
    Visible,
    #[serde(rename = "hidden")]
    Hidden,
}

impl From<PaletteMode> for WireMode {
    fn from(mode: PaletteMode) -> Self {
        match mode {
            PaletteMode::Visible => Self::Visible,
            PaletteMode::Hidden => Self::Hidden,
        }
    }
}

/// Engine event on the wire, tagged by `event`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WireEvent {
    CellChanged {
        x: u8,
        y: u8,
        token: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
    },
    TokenMoved {
        from: WireCoord,
        to: WireCoord,
        token: u8,
        fall: u64,
    },
    TokenSpawned {
        at: WireCoord,
        token: u8,
        fall: u64,
    },
    TokensMatched {
        token: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
        count: u32,
    },
    SwapAccepted {
        from: WireCoord,
        to: WireCoord,
    },
    SwapRejected {
        from: WireCoord,
        to: WireCoord,
    },
    ModeToggled {
        mode: WireMode,
    },
    GridSettled,
}

impl From<EngineEvent> for WireEvent {
    fn from(value: EngineEvent) -> Self {
        let EngineEvent { event, kind } = value;
        match event {
            GridEvent::CellChanged { at, token } => Self::CellChanged {
                x: at.x,
                y: at.y,
                token: token.0,
                kind,
            },
            GridEvent::TokenMoved {
                from,
                to,
                token,
                fall,
            } => Self::TokenMoved {
                from: from.into(),
                to: to.into(),
                token: token.0,
                fall: fall.0,
            },
            GridEvent::TokenSpawned { at, token, fall } => Self::TokenSpawned {
                at: at.into(),
                token: token.0,
                fall: fall.0,
            },
            GridEvent::TokensMatched { token, count } => Self::TokensMatched {
                token: token.0,
                kind,
                count,
            },
            GridEvent::SwapAccepted { from, to } => Self::SwapAccepted {
                from: from.into(),
                to: to.into(),
            },
            GridEvent::SwapRejected { from, to } => Self::SwapRejected {
                from: from.into(),
                to: to.into(),
            },
            GridEvent::ModeToggled { mode } => Self::ModeToggled { mode: mode.into() },
            GridEvent::GridSettled => Self::GridSettled,
        }
    }
}

/// Streamed engine event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub msg_type: EventType,
    pub seq: u64,
    pub ts: u64,
    #[serde(flatten)]
    pub event: WireEvent,
}

/// Full grid state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationMessage {
    #[serde(rename = "type")]
    pub msg_type: ObservationType,
    pub seq: u64,
    pub ts: u64,
    pub width: u8,
    pub height: u8,
    /// Token indices, `cells[y][x]`
    pub cells: Vec<Vec<u8>>,
    /// Displayed kinds, `kinds[y][x]`
    pub kinds: Vec<Vec<String>>,
    pub mode: WireMode,
    pub settled: bool,
    pub seed: u32,
    pub swap_count: u32,
    pub pass_count: u32,
    pub state_hash: StateHash,
}

/// Deterministic state hash serialized as 16 lowercase hex digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateHash(pub u64);

impl Serialize for StateHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(&format_args!("{:016x}", self.0))
    }
}

impl<'de> Deserialize<'de> for StateHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        u64::from_str_radix(s.trim(), 16)
            .map(StateHash)
            .map_err(|_| serde::de::Error::custom("invalid hex"))
    }
}

// ============== Message Parsing ==============

/// Parsed incoming message
#[derive(Debug, Clone)]
pub enum ParsedMessage {
    Hello(HelloMessage),
    Swap(PairMessage),
    CanSwap(PairMessage),
    FallComplete(FallCompleteMessage),
    ToggleMode(BareMessage),
    Snapshot(BareMessage),
    Unknown(UnknownMessage),
}

impl ParsedMessage {
    pub fn seq(&self) -> u64 {
        match self {
            ParsedMessage::Hello(m) => m.seq,
            ParsedMessage::Swap(m) | ParsedMessage::CanSwap(m) => m.seq,
            ParsedMessage::FallComplete(m) => m.seq,
            ParsedMessage::ToggleMode(m) | ParsedMessage::Snapshot(m) => m.seq,
            ParsedMessage::Unknown(m) => m.seq,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownMessage {
    pub seq: u64,
}

const KNOWN_TYPES: [&str; 6] = [
    "hello",
    "swap",
    "can_swap",
    "fall_complete",
    "toggle_mode",
    "snapshot",
];

/// Parse a JSON message from a string
pub fn parse_message(json: &str) -> Result<ParsedMessage, serde_json::Error> {
    #[derive(Debug, Deserialize)]
    #[serde(tag = "type", rename_all = "snake_case")]
    enum InboundMessage {
        Hello(HelloMessage),
        Swap(PairMessage),
        CanSwap(PairMessage),
        FallComplete(FallCompleteMessage),
        ToggleMode(BareMessage),
        Snapshot(BareMessage),
    }

    match serde_json::from_str::<InboundMessage>(json) {
        Ok(InboundMessage::Hello(m)) => Ok(ParsedMessage::Hello(m)),
        Ok(InboundMessage::Swap(m)) => Ok(ParsedMessage::Swap(m)),
        Ok(InboundMessage::CanSwap(m)) => Ok(ParsedMessage::CanSwap(m)),
        Ok(InboundMessage::FallComplete(m)) => Ok(ParsedMessage::FallComplete(m)),
        Ok(InboundMessage::ToggleMode(m)) => Ok(ParsedMessage::ToggleMode(m)),
        Ok(InboundMessage::Snapshot(m)) => Ok(ParsedMessage::Snapshot(m)),
        Err(e) => {
            // An unknown type is answered with an error, not dropped as garbage.
            #[derive(Debug, Deserialize)]
            struct Header {
                #[serde(rename = "type")]
                msg_type: Option<String>,
                seq: Option<u64>,
            }
            let header = serde_json::from_str::<Header>(json)?;
            let msg_type = header.msg_type.as_deref().unwrap_or("unknown");
            if !KNOWN_TYPES.contains(&msg_type) {
                return Ok(ParsedMessage::Unknown(UnknownMessage {
                    seq: header.seq.unwrap_or(0),
                }));
            }
            Err(e)
        }
    }
}

/// Pull `seq` out of a line that failed to parse
pub fn extract_seq_best_effort(s: &str) -> Option<u64> {
    let start = s.find("\"seq\"")?;
    let after_key = &s[start + 5..];
    let colon = after_key.find(':')?;
    let rest = after_key[colon + 1..].trim_start();
    let end = rest
        .as_bytes()
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if end == 0 {
        return None;
    }
    rest[..end].parse::<u64>().ok()
}

// ============== Utility Functions ==============

/// Create a hello message
pub fn create_hello(seq: u64, client_name: &str, protocol_version: &str) -> HelloMessage {
    HelloMessage {
        msg_type: HelloType::Hello,
        seq,
        ts: current_timestamp_ms(),
        client: ClientInfo {
            name: client_name.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        protocol_version: protocol_version.to_string(),
        stream_events: true,
    }
}

pub fn create_welcome(
    seq: u64,
    protocol_version: &str,
    client_id: u64,
    (width, height): (u8, u8),
    palette_size: usize,
) -> WelcomeMessage {
    WelcomeMessage {
        msg_type: WelcomeType::Welcome,
        seq,
        ts: current_timestamp_ms(),
        protocol_version: protocol_version.to_string(),
        client_id,
        width,
        height,
        palette_size,
    }
}

pub fn create_ack(seq: u64, mode: Option<PaletteMode>) -> AckMessage {
    AckMessage {
        msg_type: AckType::Ack,
        seq,
        ts: current_timestamp_ms(),
        status: AckStatus::Ok,
        mode: mode.map(WireMode::from),
    }
}

pub fn create_error(seq: u64, code: ErrorCode, message: &str) -> ErrorMessage {
    ErrorMessage {
        msg_type: ErrorType::Error,
        seq,
        ts: current_timestamp_ms(),
        code,
        message: message.to_string(),
    }
}

pub fn create_swap_result(seq: u64, matched: Vec<WireCoord>) -> SwapResultMessage {
    SwapResultMessage {
        msg_type: SwapResultType::SwapResult,
        seq,
        ts: current_timestamp_ms(),
        accepted: !matched.is_empty(),
        matched,
    }
}

pub fn create_can_swap_result(seq: u64, allowed: bool) -> CanSwapResultMessage {
    CanSwapResultMessage {
        msg_type: CanSwapResultType::CanSwapResult,
        seq,
        ts: current_timestamp_ms(),
        allowed,
    }
}

pub fn create_event(seq: u64, event: EngineEvent) -> EventMessage {
    EventMessage {
        msg_type: EventType::Event,
        seq,
        ts: current_timestamp_ms(),
        event: event.into(),
    }
}

pub fn build_observation(seq: u64, observation: &Observation) -> ObservationMessage {
    let snapshot = &observation.snapshot;
    ObservationMessage {
        msg_type: ObservationType::Observation,
        seq,
        ts: current_timestamp_ms(),
        width: snapshot.width,
        height: snapshot.height,
        cells: snapshot.cells.clone(),
        kinds: observation.kinds.clone(),
        mode: snapshot.mode.into(),
        settled: snapshot.settled,
        seed: snapshot.seed,
        swap_count: snapshot.swap_count,
        pass_count: snapshot.pass_count,
        state_hash: StateHash(observation.state_hash),
    }
}

/// Get current timestamp in milliseconds
fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

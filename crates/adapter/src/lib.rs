//! Adapter module - drive the engine over a TCP socket with JSON messages
//!
//! External clients (bots, renderers, test harnesses) connect to a TCP
//! socket and exchange line-delimited JSON with the engine.
//!
//! # Protocol Overview
//!
//! 1. **Connection**: client connects (default: 127.0.0.1:7878)
//! 2. **Handshake**: client sends `hello`, server responds with `welcome`
//!    and, when `stream_events` is set, an initial `observation`
//! 3. **Requests**: `swap`, `can_swap`, `fall_complete`, `toggle_mode`,
//!    `snapshot`, each with a strictly increasing `seq`
//! 4. **Streaming**: every engine event is forwarded as an `event`; a fresh
//!    `observation` follows each `grid_settled`
//!
//! A renderer animating the cascade must answer every `token_moved` and
//! `token_spawned` event with a `fall_complete` carrying its `fall` id. The
//! engine does not rescan the grid until all falls of a pass have been
//! reported (unless it runs with `TILE_SWAP_AUTO_FALLS`).
//!
//! # Environment Variables
//!
//! - `TILE_SWAP_HOST`: bind address (default: "127.0.0.1")
//! - `TILE_SWAP_PORT`: port number (default: 7878)
//! - `TILE_SWAP_ADAPTER_DISABLED`: set to "1" or "true" to run headless
//!
//! # Example Protocol Flow
//!
//! ```text
//! Client -> Server: {"type":"hello","seq":1,"client":{"name":"bot","version":"1.0.0"},"protocol_version":"1.0.0"}
//! Server -> Client: {"type":"welcome","seq":1,"ts":1700000000000,"protocol_version":"1.0.0","client_id":1,"width":8,"height":8,"palette_size":5}
//! Client -> Server: {"type":"swap","seq":2,"from":{"x":4,"y":2},"to":{"x":4,"y":3}}
//! Server -> Client: {"type":"swap_result","seq":2,"ts":1700000000001,"accepted":true,"matched":[{"x":2,"y":3},{"x":3,"y":3},{"x":4,"y":3}]}
//! Server -> Client: {"type":"event","seq":7,"ts":1700000000701,"event":"token_spawned","at":{"x":2,"y":0},"token":3,"fall":1}
//! Client -> Server: {"type":"fall_complete","seq":3,"fall":1}
//! Server -> Client: {"type":"ack","seq":3,"ts":1700000000900,"status":"ok"}
//! ```

pub mod protocol;
pub mod server;

pub use tile_swap_types as types;

pub use protocol::*;
pub use server::{run_server, ServerConfig};

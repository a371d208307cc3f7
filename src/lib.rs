//! Tile Swap (workspace facade crate).
//!
//! Exposes `tile_swap::{types, core, engine, adapter}` while the
//! implementation lives in dedicated crates under `crates/`.

pub use tile_swap_adapter as adapter;
pub use tile_swap_core as core;
pub use tile_swap_engine as engine;
pub use tile_swap_types as types;

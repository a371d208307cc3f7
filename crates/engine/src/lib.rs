//! Async engine - drives a [`Session`](tile_swap_core::Session) in real time
//!
//! The rule crate is synchronous and instantaneous. This crate adds the
//! timing around it: the snap-back wait after a rejected swap, the animation
//! wait after an accepted one, the cascade start delay, and the fall barrier
//! that keeps the next rescan from running before every token has landed.
//!
//! ```no_run
//! use tile_swap_engine::{spawn, EngineConfig};
//! use tile_swap_engine::types::Coord;
//!
//! # async fn demo() -> Result<(), tile_swap_engine::EngineError> {
//! let (handle, task) = spawn(EngineConfig::instant())?;
//! let outcome = handle.request_swap(Coord::new(0, 0), Coord::new(1, 0)).await?;
//! println!("accepted: {}", outcome.is_accepted());
//! handle.shutdown().await?;
//! let _ = task.await;
//! # Ok(())
//! # }
//! ```

pub mod barrier;
pub mod config;
pub mod controller;
pub mod driver;
pub mod error;

pub use tile_swap_types as types;

pub use barrier::FallBarrier;
pub use config::EngineConfig;
pub use controller::{Controller, ControllerGuard, FallAcks};
pub use driver::{spawn, Engine, EngineCommand, EngineEvent, EngineHandle, Observation};
pub use error::{EngineError, Result};

//! Core rule engine - pure, deterministic, and testable
//!
//! This crate holds every rule of the tile-matching game. It has **no
//! dependencies** on rendering, networking, or async runtimes, making it:
//!
//! - **Deterministic**: the same seed and swaps produce identical boards
//! - **Transactional**: a rejected swap or failed pass leaves the grid as it was
//! - **Portable**: it runs under the async engine, in tests, or headless
//!
//! # Module Structure
//!
//! - [`grid`]: the W x H token grid and its anti-run initial fill
//! - [`matcher`]: full-board and through-cell run detection sharing one primitive
//! - [`swap`]: the try / detect / commit-or-rollback swap protocol
//! - [`cascade`]: remove, compact, refill, rescan until quiet
//! - [`palette`]: visible/hidden palette pair and mode toggle
//! - [`rng`]: seeded LCG behind every random draw
//! - [`session`]: one game's state, counters and event buffer
//! - [`snapshot`]: observer copies with a stable state hash
//!
//! # Example
//!
//! ```
//! use tile_swap_core::{Grid, Palettes, Session, SwapOutcome};
//! use tile_swap_core::types::Coord;
//!
//! // Row 0 is A A B C; moving the A below the B up completes A A A.
//! let grid = Grid::from_letters(&["AABC", "BCAD", "CDBE", "DEDB"]).unwrap();
//! let mut session = Session::with_grid(grid, Palettes::default_names(), 7).unwrap();
//!
//! let outcome = session.request_swap(Coord::new(2, 1), Coord::new(2, 0)).unwrap();
//! assert!(matches!(outcome, SwapOutcome::Accepted(ref m) if m.len() == 3));
//!
//! let report = session.resolve_all().unwrap();
//! assert!(report.settled);
//! assert!(session.is_settled());
//! ```

pub mod cascade;
pub mod error;
pub mod grid;
pub mod matcher;
pub mod palette;
pub mod rng;
pub mod session;
pub mod snapshot;
pub mod swap;

pub use tile_swap_types as types;

// Re-export commonly used types for convenience
pub use cascade::{resolve, resolve_pass, CascadePass, FallIds, ResolutionReport, Reward};
pub use error::{GridError, Result};
pub use grid::Grid;
pub use matcher::{find_matches, find_matches_through, find_runs, MatchSet, Run};
pub use palette::Palettes;
pub use rng::SimpleRng;
pub use session::Session;
pub use snapshot::{Fnv1aHasher, GridSnapshot};
pub use swap::{can_swap, try_swap, SwapOutcome};

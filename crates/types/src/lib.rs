//! Core types module - shared data structures and constants
//!
//! This module defines the fundamental types used throughout the workspace.
//! All types are pure data structures with no external dependencies, making them
//! usable in any context (rule engine, async driver, wire protocol).
//!
//! # Grid Dimensions
//!
//! The default playfield is 8x8:
//!
//! - **Width**: 8 columns (x indexed 0-7, left to right)
//! - **Height**: 8 rows (y indexed 0-7, top to bottom)
//! - **Gravity**: tokens fall toward larger `y`; refills appear at `y = 0`
//!
//! # Timing Constants
//!
//! Timing values are in milliseconds:
//!
//! | Constant | Value | Description |
//! |----------|-------|-------------|
//! | `SWAP_ANIMATION_MS` | 500 | Wait after an accepted swap before resolving |
//! | `SNAP_BACK_MS` | 1000 | Wait after a rejected swap before the next command |
//! | `CASCADE_START_DELAY_MS` | 200 | Wait before the first cascade pass |
//!
//! # Examples
//!
//! ```
//! use tile_swap_types::{Coord, PaletteMode, GRID_HEIGHT, GRID_WIDTH};
//!
//! let a = Coord::new(3, 3);
//! assert!(a.is_adjacent(Coord::new(3, 4)));
//! assert!(!a.is_adjacent(Coord::new(4, 4)));
//!
//! assert_eq!(PaletteMode::Visible.toggled(), PaletteMode::Hidden);
//!
//! assert_eq!(GRID_WIDTH, 8);
//! assert_eq!(GRID_HEIGHT, 8);
//! ```

use std::fmt;

/// Default grid width in cells (8 columns)
pub const GRID_WIDTH: u8 = 8;

/// Default grid height in cells (8 rows)
pub const GRID_HEIGHT: u8 = 8;

/// Shortest run of identical tokens that counts as a match
pub const MIN_RUN: usize = 3;

/// Smallest palette that can always populate a grid without a pre-existing run
pub const MIN_PALETTE_SIZE: usize = 3;

/// Accepted swap animation window (500ms)
pub const SWAP_ANIMATION_MS: u32 = 500;

/// Rejected swap snap-back window (1000ms)
pub const SNAP_BACK_MS: u32 = 1000;

/// Delay before the first cascade pass (200ms)
pub const CASCADE_START_DELAY_MS: u32 = 200;


/// A cell position on the grid
///
/// `x` is the column, `y` is the row (0 = top). Ordering is row-major
/// (by `y`, then `x`), which is also the scan order of the initial fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coord {
    pub x: u8,
    pub y: u8,
}

impl Coord {
    pub const fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    /// Manhattan distance between two cells
    pub fn distance(self, other: Coord) -> u16 {
        (self.x.abs_diff(other.x) as u16) + (self.y.abs_diff(other.y) as u16)
    }

    /// True when the cells share an edge (diagonals do not count)
    pub fn is_adjacent(self, other: Coord) -> bool {
        self.distance(other) == 1
    }
}

impl PartialOrd for Coord {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Coord {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(u8, u8)> for Coord {
    fn from((x, y): (u8, u8)) -> Self {
        Self { x, y }
    }
}

/// Token stored in a grid cell
///
/// The value is an index into the palette pair, so it keeps its meaning
/// across a palette mode toggle. Only the rendered kind changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(pub u8);

impl TokenId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of one outstanding fall animation
///
/// Every token moved or spawned by a cascade pass gets a fresh id. The
/// animation layer reports it back once the token has landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FallId(pub u64);

/// Which palette of the pair is currently rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PaletteMode {
    /// Daylight palette (initial)
    #[default]
    Visible,
    /// Night palette
    Hidden,
}

impl PaletteMode {
    pub fn toggled(self) -> Self {
        match self {
            PaletteMode::Visible => PaletteMode::Hidden,
            PaletteMode::Hidden => PaletteMode::Visible,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaletteMode::Visible => "visible",
            PaletteMode::Hidden => "hidden",
        }
    }
}

/// Facts emitted by the rule engine for renderers and reward collectors.
///
/// Events are buffered by the session in the order they happen and drained
/// by whoever drives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridEvent {
    /// A cell's stored (or displayed) token changed
    CellChanged { at: Coord, token: TokenId },
    /// A surviving token fell during compaction
    TokenMoved {
        from: Coord,
        to: Coord,
        token: TokenId,
        fall: FallId,
    },
    /// A fresh token entered the grid at `at`
    TokenSpawned {
        at: Coord,
        token: TokenId,
        fall: FallId,
    },
    /// Reward fact for one affected column: `token` is the column's top-most
    /// matched token, `count` the cells cleared by the whole pass
    TokensMatched { token: TokenId, count: u32 },
    /// A swap created at least one run and was committed
    SwapAccepted { from: Coord, to: Coord },
    /// A swap created no run and was rolled back
    SwapRejected { from: Coord, to: Coord },
    /// The active palette flipped
    ModeToggled { mode: PaletteMode },
    /// Cascade resolution finished; the grid holds no runs
    GridSettled,
}

impl GridEvent {
    /// Token this event is about, if any
    pub fn token(&self) -> Option<TokenId> {
        match self {
            GridEvent::CellChanged { token, .. }
            | GridEvent::TokenMoved { token, .. }
            | GridEvent::TokenSpawned { token, .. }
            | GridEvent::TokensMatched { token, .. } => Some(*token),
            _ => None,
        }
    }

    /// Fall animation this event starts, if any
    pub fn fall(&self) -> Option<FallId> {
        match self {
            GridEvent::TokenMoved { fall, .. } | GridEvent::TokenSpawned { fall, .. } => {
                Some(*fall)
            }
            _ => None,
        }
    }
}

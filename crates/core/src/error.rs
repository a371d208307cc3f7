use thiserror::Error;

use crate::types::{Coord, TokenId};

pub type Result<T> = std::result::Result<T, GridError>;

/// Failures of the rule engine.
///
/// A rejected swap is not an error; it is reported as
/// [`SwapOutcome::Rejected`](crate::swap::SwapOutcome::Rejected).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("cell {at} is outside the {width}x{height} grid")]
    OutOfBounds { at: Coord, width: u8, height: u8 },

    #[error("cells {from} and {to} are not adjacent")]
    NotAdjacent { from: Coord, to: Coord },

    #[error("palette needs at least {min} token kinds, got {len}")]
    PaletteTooSmall { len: usize, min: usize },

    #[error("palettes differ in length: visible {visible}, hidden {hidden}")]
    PaletteMismatch { visible: usize, hidden: usize },

    #[error("grid shape is invalid: {reason}")]
    InvalidShape { reason: String },

    #[error("token {token} is not in a palette of {len} kinds")]
    UnknownToken { token: TokenId, len: usize },

    #[error("grid is still resolving a cascade")]
    Unsettled,
}

impl GridError {
    pub fn invalid_shape(reason: impl Into<String>) -> Self {
        Self::InvalidShape {
            reason: reason.into(),
        }
    }
}

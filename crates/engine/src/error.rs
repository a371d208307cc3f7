use thiserror::Error;

use tile_swap_core::GridError;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Grid(#[from] GridError),

    #[error("engine has stopped")]
    Closed,

    #[error("command queue is full")]
    Backpressure,
}

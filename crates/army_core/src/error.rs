//! Error types for the game simulation.

use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all game simulation errors.
///
/// None of these abort a tick. Callers inside the scheduler log them and
/// skip the operation that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// Attack against an ally, a dead unit, or something that is not a unit.
    #[error("Invalid attack target: {0}")]
    InvalidTarget(String),

    /// A random free cell was requested but every cell is occupied.
    #[error("No available position on the grid")]
    NoAvailablePosition,

    /// Production or a debug spawn named an archetype that does not exist.
    #[error("Unknown archetype: {0}")]
    UnknownArchetype(String),

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}

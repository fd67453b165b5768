//! Error types for the layout optimizer.

use thiserror::Error;

use crate::types::{InstanceId, SpecId};

/// Result type alias for layout operations.
pub type Result<T> = std::result::Result<T, LayoutError>;

/// Precondition failures. A piece that does not fit is reported in
/// `LayoutResult::unplaced`, never through this type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("invalid roll dimensions {width}x{length}: both must be non-zero")]
    InvalidRollDimensions { width: u32, length: u32 },

    #[error("fixed pieces {first} and {second} overlap")]
    OverlappingFixedPieces { first: InstanceId, second: InstanceId },

    #[error("fixed piece {0} lies outside the roll")]
    FixedPieceOutOfBounds(InstanceId),

    #[error("piece {0} has no fixed position to complete with")]
    MissingFixedPosition(InstanceId),

    #[error("fixed position for piece {0} does not match its dimensions")]
    FixedPositionMismatch(InstanceId),

    #[error("piece {0} has fixed positions but is not completed, or more positions than units")]
    UnusedFixedPositions(SpecId),

    #[error("{count} pending pieces exceed the limit of {limit}")]
    TooManyPieces { count: usize, limit: usize },

    #[error("invalid piece {width}x{height} with quantity {quantity}: all must be non-zero")]
    InvalidPieceDimensions { width: u32, height: u32, quantity: u32 },

    #[error("piece {0} is completed; un-complete it before changing its size or quantity")]
    CompletedPieceLocked(SpecId),

    #[error("unknown piece {0}")]
    UnknownPiece(SpecId),

    #[error("unknown project {0}")]
    UnknownProject(u64),
}

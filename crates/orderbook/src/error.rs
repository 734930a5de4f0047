//! Order book error types.

use thiserror::Error;

/// Reasons a raw update record cannot become a price level.
///
/// These are recovered locally: the record is skipped and the rest of its
/// batch is still applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// The record is not a JSON array.
    #[error("record is not an array: {0}")]
    NotAnArray(String),

    /// Fewer than the two mandatory positional elements.
    #[error("record has {0} elements, need at least price and volume")]
    TooFewElements(usize),

    /// More elements than a republish record carries.
    #[error("record has {0} elements, at most 4 are allowed")]
    TooManyElements(usize),

    /// Price missing, not decimal, or not positive.
    #[error("invalid price: {0}")]
    InvalidPrice(String),

    /// Volume missing, not decimal, or negative.
    #[error("invalid volume: {0}")]
    InvalidVolume(String),
}

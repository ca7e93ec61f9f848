//! Protocol-level error types.

use thiserror::Error;

/// Errors produced while framing or decoding lines.
///
/// Command-level invalidity is not an error: the parser carries it as a
/// flag on the [`crate::Intent`] so the server decides the user-visible
/// consequence uniformly.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line too long: {actual} bytes (limit {limit})")]
    LineTooLong { actual: usize, limit: usize },

    #[error("line is not valid utf-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

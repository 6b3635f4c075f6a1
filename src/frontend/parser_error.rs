use thiserror::Error;

use crate::frontend::token::SourceLocation;

/// A parsing diagnostic with source location.
///
/// The parser recovers from unexpected tokens by skipping one token, so a
/// single parse can report several of these. Locations are 1-based; for
/// errors at end-of-input the parser falls back to the last consumed
/// token's location so positions are never `0:0`.
#[derive(Debug, Clone, Error)]
#[error("{location}: {message}")]
pub struct ParserError {
    pub message: String,
    pub location: SourceLocation,
}

impl ParserError {
    pub fn new(message: impl Into<String>, location: SourceLocation) -> Self {
        ParserError {
            message: message.into(),
            location,
        }
    }
}

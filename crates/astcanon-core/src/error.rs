//! Error types for astcanon
//!
//! All fallible operations return `Result<T, Error>`.
//! Canonicalization itself never fails; errors come from the edges
//! (reading the document, decoding its shape, writing the result).

use thiserror::Error;

/// Prefix carried by the deserializer when it meets a value that is neither
/// a mapping, a list, nor a JSON primitive.
pub(crate) const UNSUPPORTED_SHAPE: &str = "unsupported shape";

/// astcanon error types
#[derive(Debug, Error)]
pub enum Error {
    /// Input is not a well-formed structured-data document
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A value that cannot be represented as Record, Sequence or Scalar
    #[error("Unsupported shape: {0}")]
    UnsupportedShape(String),

    /// Reading input or writing output failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The canonical tree could not be encoded
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            return Error::Io(err.into());
        }
        // serde_json keeps a custom message as the head of its Display text,
        // so the visitor's prefix is the only way to tell the two apart.
        let msg = err.to_string();
        match msg.strip_prefix(UNSUPPORTED_SHAPE) {
            Some(rest) => Error::UnsupportedShape(rest.trim_start_matches(": ").to_string()),
            None => Error::ParseError(msg),
        }
    }
}

/// Result type alias for astcanon operations
pub type Result<T> = std::result::Result<T, Error>;

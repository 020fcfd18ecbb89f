//! Error types for the command buffer codec

use thiserror::Error;

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors raised while encoding or decoding a command buffer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Buffer cannot even hold the size prefix
    #[error("Buffer of {len} bytes is smaller than the {prefix}-byte size prefix")]
    MissingPrefix {
        len: usize,
        prefix: usize,
    },

    /// Declared size runs past the bytes actually available
    #[error("Declared size {declared} exceeds the {available} bytes available")]
    DeclaredSizeOverflow {
        declared: u64,
        available: usize,
    },

    /// Discriminant does not name a known command
    #[error("Unknown command discriminant {discriminant} at offset {offset}")]
    UnknownCommand {
        discriminant: u32,
        offset: usize,
    },

    /// A record would extend past the declared end
    #[error("Truncated record at offset {offset}: need {needed} bytes, {remaining} remain")]
    TruncatedRecord {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    /// Writer ran out of room
    #[error("Command buffer full: {needed} bytes needed, {remaining} remain")]
    BufferFull {
        needed: usize,
        remaining: usize,
    },

    /// Null buffer pointer handed across the boundary
    #[error("Null command buffer")]
    NullBuffer,
}

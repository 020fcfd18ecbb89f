//! Error types for arena allocation

use thiserror::Error;

/// Result type for arena operations
pub type Result<T> = std::result::Result<T, ArenaError>;

/// Errors that can occur while reserving or carving the arena
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArenaError {
    /// The requested size is zero or does not fit the address space
    #[error("Invalid arena size: {0} bytes")]
    InvalidSize(u64),

    /// The system refused the allocation
    #[error("Failed to allocate arena of {size} bytes")]
    AllocationFailed {
        size: u64,
    },

    /// Not enough room left to carve a region
    #[error("Arena exhausted: {requested} bytes requested, {available} available")]
    Exhausted {
        requested: u64,
        available: u64,
    },
}

//! Error types shared across the synapse engine workspace.
//!
//! This module provides a C-compatible error enum and a `Result` type alias,
//! mirroring the header's `error_flag` word so a UI-side poll can translate
//! one directly into the other.

use core::fmt;

/// Error codes surfaced by the engine.
///
/// Uses `#[repr(C)]` for a stable, FFI-compatible layout. The discriminants
/// match the codes written into the shared region's error flag.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineError {
    /// No error occurred.
    Ok = 0,
    /// A zone allocator (Zone A or Zone B) has no free capacity left.
    AllocExhausted = -1,
    /// The command ring is full; the submit was dropped.
    RingFull = -2,
    /// Synapse traversal detected a cycle with no quota remaining.
    ChainLoop = -3,
    /// A command referenced a pointer that does not resolve to a live node.
    InvalidPointer = -4,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Ok => write!(f, "no error"),
            EngineError::AllocExhausted => write!(f, "allocator exhausted"),
            EngineError::RingFull => write!(f, "command ring full"),
            EngineError::ChainLoop => write!(f, "synapse chain loop detected"),
            EngineError::InvalidPointer => write!(f, "invalid node pointer"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EngineError {}

impl EngineError {
    /// The raw `i32` code stored in the header's error flag word.
    #[inline]
    pub const fn code(self) -> i32 {
        self as i32
    }
}

/// Result type alias for synapse engine operations.
pub type Result<T> = core::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_spec_values() {
        assert_eq!(EngineError::Ok.code(), 0);
        assert_eq!(EngineError::AllocExhausted.code(), -1);
        assert_eq!(EngineError::RingFull.code(), -2);
        assert_eq!(EngineError::ChainLoop.code(), -3);
        assert_eq!(EngineError::InvalidPointer.code(), -4);
    }

    #[test]
    fn display_is_human_readable() {
        assert_eq!(EngineError::RingFull.to_string(), "command ring full");
    }
}

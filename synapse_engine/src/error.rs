//! Engine-level errors: everything a [`crate::bridge::Bridge`] call can fail
//! with, including the lower-level [`synapse_core::EngineError`] codes
//! surfaced by the audio thread through the header's error flag.

pub use synapse_core::error::EngineError as CoreError;

/// Errors returned by engine construction and bridge operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// A lower-level allocator or traversal fault, as reported by the audio
    /// thread via the header's error flag.
    #[error("core error: {0}")]
    Core(CoreError),

    /// A command could not be submitted because the ring was full.
    #[error("command ring is full, submit was dropped")]
    RingFull,

    /// A [`crate::bridge::NodeHandle::SourceId`] was not found in the
    /// Bridge's local cache — either it was never inserted with a nonzero
    /// source id, or it has already been deleted.
    #[error("source id {0} is out of range")]
    SourceIdOutOfRange(u32),

    /// A command referenced a node pointer that is not currently live.
    #[error("pointer {0} does not resolve to a live node")]
    InvalidPointer(u32),

    /// A synapse weight fell outside `0..=MAX_WEIGHT`.
    #[error("synapse weight {0} exceeds the maximum of {1}")]
    WeightOutOfRange(u32, u32),
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        EngineError::Core(err)
    }
}

impl EngineError {
    /// The raw `i32` code this error corresponds to in the header's error
    /// flag word (§6). Bridge-level variants map onto the same codes the
    /// audio thread itself would have set for the equivalent fault, so a UI
    /// caller can compare [`crate::bridge::Bridge::poll_error`]'s return
    /// value against either a `CoreError` code or this one interchangeably.
    pub const fn code(&self) -> i32 {
        match self {
            EngineError::Core(err) => err.code(),
            EngineError::RingFull => CoreError::RingFull.code(),
            EngineError::SourceIdOutOfRange(_) => CoreError::InvalidPointer.code(),
            EngineError::InvalidPointer(_) => CoreError::InvalidPointer.code(),
            EngineError::WeightOutOfRange(_, _) => CoreError::InvalidPointer.code(),
        }
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

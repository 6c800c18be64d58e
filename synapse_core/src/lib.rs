//! # synapse_core
//!
//! Foundational, allocation-free mechanisms shared by the synapse engine crates.

pub mod error;
pub mod random;
pub mod spsc;
pub mod stack_vec;

pub use error::{EngineError, Result};
pub use random::XorShift32;
pub use spsc::{Consumer, Producer, SpscRingBuffer};
pub use stack_vec::StackVec;

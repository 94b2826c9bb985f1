//! Error taxonomy for problem construction and simulation.

use thiserror::Error;

/// Errors raised while building a jump problem or stepping a trajectory.
///
/// All variants are fatal to the trajectory: a corrupted rate or state has
/// no meaningful recovery, so the simulator never retries.
#[derive(Debug, Error)]
pub enum NrmError {
    /// Constant-rate jumps have opaque rate functions, so their dependencies
    /// cannot be derived from stoichiometry.
    #[error("constant-rate jumps require an explicit dependency graph")]
    MissingDependencyGraph,

    /// A rate function returned a negative or NaN intensity.
    #[error("jump {jump} evaluated to an invalid rate {rate}")]
    InvalidRateKind { jump: usize, rate: f64 },

    /// A priority-queue operation referenced a jump id the heap does not
    /// track. Internal bug guard.
    #[error("priority queue does not track jump {jump}")]
    HeapInvariantViolation { jump: usize },

    /// `execute_jump` was called with every schedule parked at infinity,
    /// i.e. before initialization or after the process was absorbed.
    #[error("no finite jump is pending execution")]
    NoPendingJump,

    /// An input array had the wrong dimensions.
    #[error("shape mismatch: {0}")]
    Shape(String),

    /// An input value was out of range or inconsistent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

//! Next Reaction Method core for continuous-time Markov jump processes.
//!
//! This module provides:
//! - JumpSet / MassActionJump / ConstantRateJump: the two rate-model flavors
//! - DependencyGraph: which intensities to re-evaluate after a firing
//! - IndexedPriorityQueue: min-heap over firing times with O(log M) re-keying
//! - NrmAggregator: the Gibson-Bruck scheduling state machine
//! - JumpIntegrator + simulate_path: host-side trajectory driver
//! - simulate_trajectories_parallel: seeded Rayon ensembles

pub mod aggregator;
pub mod depgraph;
pub mod error;
pub mod integrator;
pub mod pqueue;
pub mod rates;
pub mod simulate;

pub use aggregator::{JumpProblem, NrmAggregator};
pub use depgraph::DependencyGraph;
pub use error::NrmError;
pub use integrator::JumpIntegrator;
pub use pqueue::IndexedPriorityQueue;
pub use rates::{ConstantRateJump, JumpSet, MassActionJump, Reactant, SpeciesChange};
pub use simulate::{
    sample_final_states, simulate_path, simulate_trajectories_parallel, SimulationConfig,
    Trajectory,
};

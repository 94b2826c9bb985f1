//! Trajectory driver and parallel ensemble simulation.
//!
//! One trajectory owns an integrator, an aggregator, and a seeded RNG; the
//! problem itself is shared immutably. Ensembles fan out over trajectory
//! indices with Rayon, each index deriving its own seed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use super::aggregator::JumpProblem;
use super::error::NrmError;
use super::integrator::JumpIntegrator;

/// Configuration for one trajectory.
#[derive(Clone, Copy, Debug)]
pub struct SimulationConfig {
    /// Final simulated time.
    pub t_end: f64,
    /// Record `(t, u)` before and/or after each jump. Both on by default,
    /// which yields the piecewise-constant staircase.
    pub save_positions: (bool, bool),
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            t_end: 10.0,
            save_positions: (true, true),
        }
    }
}

/// Recorded `(t, u)` samples of one trajectory, stored flat.
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
    times: Vec<f64>,
    states: Vec<f64>,
    num_species: usize,
}

impl Trajectory {
    fn new(num_species: usize) -> Self {
        Self {
            times: Vec::new(),
            states: Vec::new(),
            num_species,
        }
    }

    fn push(&mut self, t: f64, u: &[f64]) {
        self.times.push(t);
        self.states.extend_from_slice(u);
    }

    /// Number of recorded samples.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn num_species(&self) -> usize {
        self.num_species
    }

    /// State at sample `k`.
    pub fn state(&self, k: usize) -> &[f64] {
        &self.states[k * self.num_species..(k + 1) * self.num_species]
    }

    /// Last recorded state.
    pub fn final_state(&self) -> &[f64] {
        self.state(self.len() - 1)
    }

    fn last_matches(&self, t: f64, u: &[f64]) -> bool {
        match self.times.last() {
            Some(&last_t) => {
                last_t == t && &self.states[self.states.len() - self.num_species..] == u
            }
            None => false,
        }
    }

    /// Flat `(len × num_species)` sample buffer.
    pub fn states_flat(&self) -> &[f64] {
        &self.states
    }
}

/// Simulate a single trajectory from `u0` at `t0` until `t_end`.
///
/// The loop is the NRM contract: peek the pending jump, stop once its time
/// reaches `end_time` (infinite schedules stop too), advance the integrator,
/// execute. The state the loop stopped at is always the final sample: at
/// `t_end` for a finite horizon, at the absorption time when every schedule
/// is parked at infinity.
pub fn simulate_path<R: Rng>(
    problem: &JumpProblem,
    u0: &[f64],
    p: &[f64],
    t0: f64,
    config: &SimulationConfig,
    rng: R,
) -> Result<Trajectory, NrmError> {
    if u0.len() != problem.num_species() {
        return Err(NrmError::Shape(format!(
            "initial state length {} does not match number of species {}",
            u0.len(),
            problem.num_species()
        )));
    }

    let mut integrator = JumpIntegrator::new(u0, t0, config.t_end);
    let mut agg = problem.aggregator(rng);
    agg.initialize(&integrator, p)?;

    let mut trajectory = Trajectory::new(problem.num_species());
    trajectory.push(integrator.time(), integrator.state());

    loop {
        let (t_next, _) = agg.peek_next();
        if t_next >= agg.end_time() {
            break;
        }
        if config.save_positions.0 {
            trajectory.push(t_next, integrator.state());
        }
        integrator.advance_to(t_next);
        agg.execute_jump(&mut integrator, p)?;
        if config.save_positions.1 {
            trajectory.push(integrator.time(), integrator.state());
        }
    }

    if config.t_end.is_finite() {
        integrator.advance_to(config.t_end);
    }
    if !trajectory.last_matches(integrator.time(), integrator.state()) {
        trajectory.push(integrator.time(), integrator.state());
    }
    Ok(trajectory)
}

/// Simulate `n_trajectories` independent trajectories in parallel.
///
/// Trajectory `i` is seeded with `seed + i`, so results are reproducible
/// and independent of the Rayon schedule.
pub fn simulate_trajectories_parallel(
    problem: &JumpProblem,
    u0: &[f64],
    p: &[f64],
    t0: f64,
    config: &SimulationConfig,
    n_trajectories: usize,
    seed: u64,
) -> Result<Vec<Trajectory>, NrmError> {
    (0..n_trajectories)
        .into_par_iter()
        .map(|i| {
            let rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(i as u64));
            simulate_path(problem, u0, p, t0, config, rng)
        })
        .collect()
}

/// Final states of a parallel ensemble, flattened to
/// `(n_trajectories × num_species)`.
pub fn sample_final_states(
    problem: &JumpProblem,
    u0: &[f64],
    p: &[f64],
    t0: f64,
    config: &SimulationConfig,
    n_trajectories: usize,
    seed: u64,
) -> Result<Vec<f64>, NrmError> {
    let final_only = SimulationConfig {
        t_end: config.t_end,
        save_positions: (false, false),
    };
    let trajectories = simulate_trajectories_parallel(
        problem,
        u0,
        p,
        t0,
        &final_only,
        n_trajectories,
        seed,
    )?;

    let mut finals = Vec::with_capacity(n_trajectories * problem.num_species());
    for trajectory in &trajectories {
        finals.extend_from_slice(trajectory.final_state());
    }
    Ok(finals)
}

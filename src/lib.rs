use numpy::{PyArray1, PyArray2, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub mod nrm;

use nrm::{
    sample_final_states, simulate_path, DependencyGraph, JumpProblem, JumpSet, MassActionJump,
    NrmError, SimulationConfig,
};

impl From<NrmError> for PyErr {
    fn from(err: NrmError) -> Self {
        PyValueError::new_err(err.to_string())
    }
}

/// Build a mass-action jump problem from a net-stoichiometry matrix.
///
/// Rows are reactions, columns species; negative entries are consumed
/// reactants. The dependency graph is derived from the stoichiometry unless
/// the caller supplies one.
fn build_problem(
    stoich: PyReadonlyArray2<i32>,
    rate_constants: PyReadonlyArray1<f64>,
    dep_graph: Option<Vec<Vec<usize>>>,
) -> Result<JumpProblem, NrmError> {
    let stoich = stoich.as_array();
    let n_reactions = stoich.shape()[0];
    let n_species = stoich.shape()[1];
    if n_reactions == 0 || n_species == 0 {
        return Err(NrmError::InvalidArgument(
            "stoichiometry must contain at least one reaction and one species".into(),
        ));
    }

    let rates = rate_constants.as_array();
    if rates.len() != n_reactions {
        return Err(NrmError::Shape(format!(
            "rate constant length {} does not match reaction count {}",
            rates.len(),
            n_reactions
        )));
    }

    let jumps = (0..n_reactions)
        .map(|i| {
            let row: Vec<i32> = (0..n_species).map(|s| stoich[[i, s]]).collect();
            MassActionJump::from_stoichiometry(rates[i], &row)
        })
        .collect();

    JumpProblem::new(
        n_species,
        JumpSet::new(jumps, Vec::new()),
        dep_graph.map(DependencyGraph::from_adjacency),
    )
}

fn read_initial_state(u0: &PyReadonlyArray1<f64>) -> Result<Vec<f64>, NrmError> {
    u0.as_slice()
        .map(|slice| slice.to_vec())
        .map_err(|_| NrmError::Shape("initial state array must be contiguous".into()))
}

/// Simulate an ensemble of NRM trajectories and return the final states.
///
/// # Arguments
/// * `stoich` - (n_reactions, n_species) net stoichiometry matrix
/// * `rate_constants` - (n_reactions,) mass-action rate constants
/// * `u0` - (n_species,) shared initial state
/// * `t_end` - Final simulated time
/// * `n_trajectories` - Number of independent trajectories
/// * `seed` - Base RNG seed (trajectory i uses seed + i)
/// * `dep_graph` - Optional dependency graph overriding the derived one
///
/// # Returns
/// * (n_trajectories, n_species) array of final states
#[pyfunction]
#[pyo3(signature = (stoich, rate_constants, u0, t_end, n_trajectories, seed, dep_graph=None))]
fn simulate_nrm_ensemble<'py>(
    py: Python<'py>,
    stoich: PyReadonlyArray2<i32>,
    rate_constants: PyReadonlyArray1<f64>,
    u0: PyReadonlyArray1<f64>,
    t_end: f64,
    n_trajectories: usize,
    seed: u64,
    dep_graph: Option<Vec<Vec<usize>>>,
) -> PyResult<Bound<'py, PyArray2<f64>>> {
    if n_trajectories == 0 {
        return Err(PyValueError::new_err(
            "number of trajectories must be greater than zero",
        ));
    }
    if !t_end.is_finite() || t_end <= 0.0 {
        return Err(PyValueError::new_err("t_end must be positive and finite"));
    }

    let problem = build_problem(stoich, rate_constants, dep_graph)?;
    let initial = read_initial_state(&u0)?;
    let config = SimulationConfig {
        t_end,
        save_positions: (false, false),
    };

    let finals = py.allow_threads(|| {
        sample_final_states(&problem, &initial, &[], 0.0, &config, n_trajectories, seed)
    })?;

    let rows: Vec<Vec<f64>> = finals
        .chunks(problem.num_species())
        .map(|chunk| chunk.to_vec())
        .collect();
    PyArray2::from_vec2(py, &rows).map_err(|_| PyValueError::new_err("failed to export data"))
}

/// Simulate a single NRM trajectory and return its recorded samples.
///
/// # Arguments
/// * `stoich` - (n_reactions, n_species) net stoichiometry matrix
/// * `rate_constants` - (n_reactions,) mass-action rate constants
/// * `u0` - (n_species,) initial state
/// * `t_end` - Final simulated time
/// * `seed` - RNG seed
/// * `save_pre` - Record the state just before each jump
/// * `save_post` - Record the state just after each jump
/// * `dep_graph` - Optional dependency graph overriding the derived one
///
/// # Returns
/// * Tuple of (times, states): (n_samples,) and (n_samples, n_species)
#[pyfunction]
#[pyo3(signature = (stoich, rate_constants, u0, t_end, seed, save_pre=true, save_post=true, dep_graph=None))]
fn simulate_nrm_trajectory<'py>(
    py: Python<'py>,
    stoich: PyReadonlyArray2<i32>,
    rate_constants: PyReadonlyArray1<f64>,
    u0: PyReadonlyArray1<f64>,
    t_end: f64,
    seed: u64,
    save_pre: bool,
    save_post: bool,
    dep_graph: Option<Vec<Vec<usize>>>,
) -> PyResult<(Bound<'py, PyArray1<f64>>, Bound<'py, PyArray2<f64>>)> {
    if !t_end.is_finite() || t_end <= 0.0 {
        return Err(PyValueError::new_err("t_end must be positive and finite"));
    }

    let problem = build_problem(stoich, rate_constants, dep_graph)?;
    let initial = read_initial_state(&u0)?;
    let config = SimulationConfig {
        t_end,
        save_positions: (save_pre, save_post),
    };

    let trajectory = py.allow_threads(|| {
        let rng = ChaCha8Rng::seed_from_u64(seed);
        simulate_path(&problem, &initial, &[], 0.0, &config, rng)
    })?;

    let times = PyArray1::from_vec(py, trajectory.times().to_vec());
    let rows: Vec<Vec<f64>> = (0..trajectory.len())
        .map(|k| trajectory.state(k).to_vec())
        .collect();
    let states = PyArray2::from_vec2(py, &rows)
        .map_err(|_| PyValueError::new_err("failed to export data"))?;
    Ok((times, states))
}

#[pymodule]
fn nextreaction_rust(_py: Python<'_>, module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_function(wrap_pyfunction!(simulate_nrm_ensemble, module)?)?;
    module.add_function(wrap_pyfunction!(simulate_nrm_trajectory, module)?)?;
    Ok(())
}

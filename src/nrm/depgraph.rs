//! Dependency graph: which intensities must be re-evaluated after a firing.
//!
//! Derived from stoichiometry for mass-action models, or supplied by the
//! caller when opaque rate functions are present. Adjacency lists are kept
//! sorted ascending so the update loop consumes random draws in a fixed
//! order.

use super::error::NrmError;
use super::rates::MassActionJump;

/// For each jump `i`, the set `D(i)` of jumps whose intensity may change
/// when `i` fires. Always contains `i` itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependencyGraph {
    deps: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Wrap a caller-supplied adjacency, adding self-loops and normalizing
    /// each list to sorted, deduplicated order. Idempotent.
    pub fn from_adjacency(deps: Vec<Vec<usize>>) -> Self {
        let mut graph = Self { deps };
        graph.normalize();
        graph
    }

    /// Derive the graph from mass-action stoichiometry: `j ∈ D(i)` iff the
    /// net change of `i` touches a species that is a reactant of `j`.
    pub fn from_mass_action(num_species: usize, jumps: &[MassActionJump]) -> Self {
        let mut species_dependents: Vec<Vec<usize>> = vec![Vec::new(); num_species];
        for (idx, jump) in jumps.iter().enumerate() {
            for reactant in &jump.reactants {
                species_dependents[reactant.species].push(idx);
            }
        }

        let deps = jumps
            .iter()
            .map(|jump| {
                let mut list = Vec::new();
                for change in &jump.net_change {
                    list.extend_from_slice(&species_dependents[change.species]);
                }
                list
            })
            .collect();

        let mut graph = Self { deps };
        graph.normalize();
        graph
    }

    /// Check adjacency indices against the jump count.
    pub fn validate(&self, num_jumps: usize) -> Result<(), NrmError> {
        if self.deps.len() != num_jumps {
            return Err(NrmError::Shape(format!(
                "dependency graph has {} entries but the problem has {} jumps",
                self.deps.len(),
                num_jumps
            )));
        }
        for (idx, list) in self.deps.iter().enumerate() {
            if let Some(&bad) = list.iter().find(|&&dep| dep >= num_jumps) {
                return Err(NrmError::InvalidArgument(format!(
                    "dependency list of jump {} references unknown jump {}",
                    idx, bad
                )));
            }
        }
        Ok(())
    }

    /// Dependents of jump `i`, ascending.
    pub fn of(&self, i: usize) -> &[usize] {
        &self.deps[i]
    }

    /// Number of jumps covered.
    pub fn len(&self) -> usize {
        self.deps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    fn normalize(&mut self) {
        for (idx, list) in self.deps.iter_mut().enumerate() {
            list.push(idx);
            list.sort_unstable();
            list.dedup();
        }
    }
}

/// Resolve the graph for a problem: verbatim user graph with self-loops, or
/// stoichiometric derivation when every jump is mass-action.
pub fn resolve_dependency_graph(
    num_species: usize,
    mass_action: &[MassActionJump],
    num_constant_rate: usize,
    user_graph: Option<DependencyGraph>,
) -> Result<DependencyGraph, NrmError> {
    let num_jumps = mass_action.len() + num_constant_rate;
    match user_graph {
        Some(graph) => {
            graph.validate(num_jumps)?;
            Ok(graph)
        }
        None if num_constant_rate > 0 => Err(NrmError::MissingDependencyGraph),
        None => Ok(DependencyGraph::from_mass_action(num_species, mass_action)),
    }
}

//! Rate model for the two jump flavors.
//!
//! Mass-action jumps carry a declarative stoichiometry and evaluate a
//! closed-form intensity; constant-rate jumps carry opaque rate and affect
//! functions. Both are indexed through a single [`JumpSet`], mass-action
//! block first.

use super::integrator::JumpIntegrator;

/// Opaque intensity function `(u, p, t) -> rate`.
pub type RateFn = Box<dyn Fn(&[f64], &[f64], f64) -> f64 + Send + Sync>;

/// Opaque state mutation applied when the jump fires.
pub type AffectFn = Box<dyn Fn(&mut JumpIntegrator) + Send + Sync>;

/// One reactant of a mass-action jump with its multiplicity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reactant {
    pub species: usize,
    pub count: u32,
}

/// Net change applied to one species when a mass-action jump fires.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpeciesChange {
    pub species: usize,
    pub delta: f64,
}

/// Mass-action jump: intensity `k · Π u[s]·(u[s]-1)·…·(u[s]-ν+1)`.
///
/// Falling-factorial convention without the `1/ν!` scaling; the rate
/// constant absorbs any combinatoric factor.
#[derive(Clone, Debug)]
pub struct MassActionJump {
    pub rate_constant: f64,
    pub reactants: Vec<Reactant>,
    pub net_change: Vec<SpeciesChange>,
}

impl MassActionJump {
    /// Create a jump from explicit reactants and net stoichiometry.
    pub fn new(
        rate_constant: f64,
        reactants: Vec<Reactant>,
        net_change: Vec<SpeciesChange>,
    ) -> Self {
        Self {
            rate_constant,
            reactants,
            net_change,
        }
    }

    /// Build a jump from one row of a net-stoichiometry matrix.
    ///
    /// Negative entries are consumed reactants (multiplicity = magnitude),
    /// every nonzero entry contributes to the net change.
    pub fn from_stoichiometry(rate_constant: f64, row: &[i32]) -> Self {
        let reactants = row
            .iter()
            .enumerate()
            .filter_map(|(species, &delta)| {
                (delta < 0).then_some(Reactant {
                    species,
                    count: (-delta) as u32,
                })
            })
            .collect();
        let net_change = row
            .iter()
            .enumerate()
            .filter_map(|(species, &delta)| {
                (delta != 0).then_some(SpeciesChange {
                    species,
                    delta: delta as f64,
                })
            })
            .collect();
        Self::new(rate_constant, reactants, net_change)
    }

    /// Evaluate the intensity at state `u`.
    ///
    /// A reactant demand exceeding the available amount yields 0, so
    /// continuous amounts below the multiplicity never produce a negative
    /// factor.
    pub fn rate(&self, u: &[f64]) -> f64 {
        let mut rate = self.rate_constant;
        for reactant in &self.reactants {
            let available = u[reactant.species];
            if available < reactant.count as f64 {
                return 0.0;
            }
            rate *= falling_factorial(available, reactant.count);
        }
        rate
    }
}

/// Constant-rate jump: intensity fixed between events but free to depend on
/// `(u, p, t)` at event boundaries.
pub struct ConstantRateJump {
    pub rate: RateFn,
    pub affect: AffectFn,
}

impl ConstantRateJump {
    pub fn new<F, G>(rate: F, affect: G) -> Self
    where
        F: Fn(&[f64], &[f64], f64) -> f64 + Send + Sync + 'static,
        G: Fn(&mut JumpIntegrator) + Send + Sync + 'static,
    {
        Self {
            rate: Box::new(rate),
            affect: Box::new(affect),
        }
    }
}

impl std::fmt::Debug for ConstantRateJump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstantRateJump").finish_non_exhaustive()
    }
}

/// All jumps of a problem, indexed `0..num_jumps()` with the mass-action
/// block first.
#[derive(Debug, Default)]
pub struct JumpSet {
    mass_action: Vec<MassActionJump>,
    constant_rate: Vec<ConstantRateJump>,
}

impl JumpSet {
    pub fn new(mass_action: Vec<MassActionJump>, constant_rate: Vec<ConstantRateJump>) -> Self {
        Self {
            mass_action,
            constant_rate,
        }
    }

    /// Number of mass-action jumps (`M_ma`).
    pub fn num_majumps(&self) -> usize {
        self.mass_action.len()
    }

    /// Number of constant-rate jumps (`M_cr`).
    pub fn num_constant_rate(&self) -> usize {
        self.constant_rate.len()
    }

    /// Total number of jumps (`M`).
    pub fn num_jumps(&self) -> usize {
        self.mass_action.len() + self.constant_rate.len()
    }

    /// The mass-action block, for dependency derivation.
    pub fn mass_action(&self) -> &[MassActionJump] {
        &self.mass_action
    }

    /// Evaluate the intensity of jump `rx` at `(u, p, t)`.
    pub fn eval_rate(&self, rx: usize, u: &[f64], p: &[f64], t: f64) -> f64 {
        if rx < self.mass_action.len() {
            self.mass_action[rx].rate(u)
        } else {
            (self.constant_rate[rx - self.mass_action.len()].rate)(u, p, t)
        }
    }

    /// Apply the affect of jump `rx` to the integrator state.
    pub fn apply_affect(&self, rx: usize, integrator: &mut JumpIntegrator) {
        if rx < self.mass_action.len() {
            let u = integrator.state_mut();
            for change in &self.mass_action[rx].net_change {
                u[change.species] += change.delta;
            }
        } else {
            (self.constant_rate[rx - self.mass_action.len()].affect)(integrator);
        }
    }

    /// Largest species index any jump touches, if one exists.
    pub fn max_species_index(&self) -> Option<usize> {
        self.mass_action
            .iter()
            .flat_map(|jump| {
                jump.reactants
                    .iter()
                    .map(|r| r.species)
                    .chain(jump.net_change.iter().map(|c| c.species))
            })
            .max()
    }
}

/// `value · (value-1) · … · (value-count+1)`; 1.0 for `count == 0`.
#[inline]
fn falling_factorial(value: f64, count: u32) -> f64 {
    let mut acc = 1.0;
    for i in 0..count {
        acc *= value - i as f64;
    }
    acc
}

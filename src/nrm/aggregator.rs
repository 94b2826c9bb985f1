//! Next Reaction Method aggregator.
//!
//! Keeps one tentative absolute firing time per jump in an indexed min-heap
//! and, after each firing, re-evaluates only the jumps listed in the
//! dependency graph. Rates that changed without firing keep their previously
//! drawn waiting time through the Gibson-Bruck rescaling, so each event
//! costs O(|D| log M) instead of O(M).

use rand::Rng;

use super::depgraph::{resolve_dependency_graph, DependencyGraph};
use super::error::NrmError;
use super::integrator::JumpIntegrator;
use super::pqueue::IndexedPriorityQueue;
use super::rates::JumpSet;

/// A jump process ready to simulate: the jumps plus their resolved
/// dependency graph. Shared immutably across trajectories.
#[derive(Debug)]
pub struct JumpProblem {
    num_species: usize,
    jumps: JumpSet,
    dep_graph: DependencyGraph,
}

impl JumpProblem {
    /// Validate the jumps and resolve the dependency graph.
    ///
    /// Fails with [`NrmError::MissingDependencyGraph`] when constant-rate
    /// jumps are present and no graph was supplied; a supplied graph is used
    /// verbatim apart from self-loop augmentation.
    pub fn new(
        num_species: usize,
        jumps: JumpSet,
        dep_graph: Option<DependencyGraph>,
    ) -> Result<Self, NrmError> {
        if let Some(max_species) = jumps.max_species_index() {
            if max_species >= num_species {
                return Err(NrmError::InvalidArgument(format!(
                    "jump references species {} but the problem has {} species",
                    max_species, num_species
                )));
            }
        }
        let dep_graph = resolve_dependency_graph(
            num_species,
            jumps.mass_action(),
            jumps.num_constant_rate(),
            dep_graph,
        )?;
        Ok(Self {
            num_species,
            jumps,
            dep_graph,
        })
    }

    pub fn num_species(&self) -> usize {
        self.num_species
    }

    pub fn num_jumps(&self) -> usize {
        self.jumps.num_jumps()
    }

    pub fn jumps(&self) -> &JumpSet {
        &self.jumps
    }

    pub fn dependency_graph(&self) -> &DependencyGraph {
        &self.dep_graph
    }

    /// Create a fresh aggregator for one trajectory, owning `rng`.
    pub fn aggregator<R: Rng>(&self, rng: R) -> NrmAggregator<'_, R> {
        NrmAggregator::new(&self.jumps, &self.dep_graph, rng)
    }
}

/// Per-trajectory NRM state machine.
pub struct NrmAggregator<'a, R: Rng> {
    jumps: &'a JumpSet,
    dep_graph: &'a DependencyGraph,
    cur_rates: Vec<f64>,
    pq: IndexedPriorityQueue,
    next_jump_time: f64,
    next_jump: usize,
    prev_jump: Option<usize>,
    end_time: f64,
    rng: R,
}

impl<'a, R: Rng> NrmAggregator<'a, R> {
    fn new(jumps: &'a JumpSet, dep_graph: &'a DependencyGraph, rng: R) -> Self {
        let num_jumps = jumps.num_jumps();
        Self {
            jumps,
            dep_graph,
            cur_rates: vec![0.0; num_jumps],
            pq: IndexedPriorityQueue::new(&vec![f64::INFINITY; num_jumps]),
            next_jump_time: f64::INFINITY,
            next_jump: 0,
            prev_jump: None,
            end_time: f64::INFINITY,
            rng,
        }
    }

    /// Evaluate every rate at the integrator's current `(u, t)`, draw one
    /// `Exp(1)` per positive-rate jump, and build the schedule.
    ///
    /// Reads `end_time` from the integrator; this is the only inspection of
    /// the handle the aggregator performs.
    pub fn initialize(&mut self, integrator: &JumpIntegrator, p: &[f64]) -> Result<(), NrmError> {
        self.end_time = integrator.end_time();
        let u = integrator.state();
        let t = integrator.time();

        let num_jumps = self.jumps.num_jumps();
        let mut times = vec![f64::INFINITY; num_jumps];
        for rx in 0..num_jumps {
            let rate = self.checked_rate(rx, self.jumps.eval_rate(rx, u, p, t))?;
            self.cur_rates[rx] = rate;
            if rate > 0.0 {
                times[rx] = t + randexp(&mut self.rng) / rate;
            }
        }
        self.pq = IndexedPriorityQueue::new(&times);
        self.prev_jump = None;
        self.refresh_next();
        Ok(())
    }

    /// The pending `(time, jump)` pair. Pure.
    pub fn peek_next(&self) -> (f64, usize) {
        (self.next_jump_time, self.next_jump)
    }

    /// Fire the pending jump: apply its affect to the integrator state, then
    /// re-evaluate and reschedule every dependent jump.
    ///
    /// The caller advances the integrator to `peek_next().0` first. The heap
    /// is fully consistent when this returns. Fails with
    /// [`NrmError::NoPendingJump`] when every schedule is parked at infinity,
    /// so a caller that overruns absorption cannot fire a zero-rate jump.
    pub fn execute_jump(
        &mut self,
        integrator: &mut JumpIntegrator,
        p: &[f64],
    ) -> Result<(), NrmError> {
        if !self.next_jump_time.is_finite() {
            return Err(NrmError::NoPendingJump);
        }
        let fired = self.next_jump;
        self.jumps.apply_affect(fired, integrator);
        self.prev_jump = Some(fired);
        self.update_dependent_rates(fired, integrator.state(), p, integrator.time())?;
        self.refresh_next();
        Ok(())
    }

    /// Jump that fired last, if any.
    pub fn prev_jump(&self) -> Option<usize> {
        self.prev_jump
    }

    /// Trajectory end time recorded at initialization.
    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    /// Intensities as of the last evaluation point.
    pub fn current_rates(&self) -> &[f64] {
        &self.cur_rates
    }

    /// Scheduled absolute firing time of one jump.
    pub fn scheduled_time(&self, rx: usize) -> Result<f64, NrmError> {
        self.pq.time_of(rx)
    }

    /// Re-evaluate the rates of `D(fired)` in ascending id order and push
    /// the rescaled firing times into the heap.
    fn update_dependent_rates(
        &mut self,
        fired: usize,
        u: &[f64],
        p: &[f64],
        t: f64,
    ) -> Result<(), NrmError> {
        let deps = self.dep_graph.of(fired);
        for &rx in deps {
            let old_rate = self.cur_rates[rx];
            let new_rate = self.checked_rate(rx, self.jumps.eval_rate(rx, u, p, t))?;
            self.cur_rates[rx] = new_rate;
            let new_time = self.reschedule(rx, fired, old_rate, new_rate, t)?;
            self.pq.update(rx, new_time)?;
        }
        Ok(())
    }

    /// Gibson-Bruck rescheduling.
    ///
    /// The fired jump and any jump whose rate was zero draw a fresh `Exp(1)`;
    /// a still-pending jump keeps its drawn waiting time, stretched by the
    /// rate ratio. `τ_old` is read before the heap entry is overwritten.
    fn reschedule(
        &mut self,
        rx: usize,
        fired: usize,
        old_rate: f64,
        new_rate: f64,
        t: f64,
    ) -> Result<f64, NrmError> {
        if new_rate <= 0.0 {
            return Ok(f64::INFINITY);
        }
        if rx == fired || old_rate <= 0.0 {
            Ok(t + randexp(&mut self.rng) / new_rate)
        } else {
            let tau_old = self.pq.time_of(rx)?;
            Ok(t + (old_rate / new_rate) * (tau_old - t))
        }
    }

    fn checked_rate(&self, rx: usize, rate: f64) -> Result<f64, NrmError> {
        if rate < 0.0 || rate.is_nan() {
            return Err(NrmError::InvalidRateKind { jump: rx, rate });
        }
        Ok(rate)
    }

    fn refresh_next(&mut self) {
        match self.pq.peek_min() {
            Some((time, id)) => {
                self.next_jump_time = time;
                self.next_jump = id;
            }
            None => {
                self.next_jump_time = f64::INFINITY;
                self.next_jump = 0;
            }
        }
    }
}

/// Standard exponential variate, as the inversion `-ln(U)`.
fn randexp<R: Rng>(rng: &mut R) -> f64 {
    -rng.gen::<f64>().ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nrm::rates::{ConstantRateJump, MassActionJump};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn mass_action_problem(num_species: usize, rows: &[(f64, Vec<i32>)]) -> JumpProblem {
        let jumps = rows
            .iter()
            .map(|(k, row)| MassActionJump::from_stoichiometry(*k, row))
            .collect();
        JumpProblem::new(num_species, JumpSet::new(jumps, Vec::new()), None).unwrap()
    }

    fn step<R: Rng>(
        agg: &mut NrmAggregator<'_, R>,
        integrator: &mut JumpIntegrator,
    ) -> (f64, usize) {
        let (t_next, rx) = agg.peek_next();
        integrator.advance_to(t_next);
        agg.execute_jump(integrator, &[]).unwrap();
        (t_next, rx)
    }

    #[test]
    fn test_pure_death_fires_exactly_five_times() {
        // S1: A -> 0 with k = 1 and u0 = [5].
        let problem = mass_action_problem(1, &[(1.0, vec![-1])]);
        let mut integrator = JumpIntegrator::new(&[5.0], 0.0, f64::INFINITY);
        let mut agg = problem.aggregator(ChaCha8Rng::seed_from_u64(42));
        agg.initialize(&integrator, &[]).unwrap();

        for _ in 0..5 {
            let (t_next, _) = agg.peek_next();
            assert!(t_next.is_finite());
            step(&mut agg, &mut integrator);
        }

        assert_eq!(integrator.state(), &[0.0]);
        assert!(agg.peek_next().0.is_infinite());
    }

    #[test]
    fn test_first_jump_matches_initial_draws() {
        // S2: A -> 0 (k=1) and B -> 0 (k=2) with u0 = [10, 10]. The winner
        // is argmin over the two initial exponentials scaled by the rates;
        // the common factor 10 cancels, leaving argmin(E1/1, E2/2).
        let seed = 2024;
        let problem = mass_action_problem(2, &[(1.0, vec![-1, 0]), (2.0, vec![0, -1])]);
        let integrator = JumpIntegrator::new(&[10.0, 10.0], 0.0, f64::INFINITY);
        let mut agg = problem.aggregator(ChaCha8Rng::seed_from_u64(seed));
        agg.initialize(&integrator, &[]).unwrap();

        let mut replay = ChaCha8Rng::seed_from_u64(seed);
        let e1 = randexp(&mut replay);
        let e2 = randexp(&mut replay);
        let expected = if e1 / 10.0 <= e2 / 20.0 { 0 } else { 1 };

        let (t_first, first) = agg.peek_next();
        assert_eq!(first, expected);
        assert_eq!(t_first, (e1 / 10.0).min(e2 / 20.0));
    }

    #[test]
    fn test_dependent_jump_is_rescaled_not_redrawn() {
        // S3: two A + B -> ... jumps with k = 0.5 and u0 = [4, 3, 0, 0].
        // Whichever fires, the other goes from rate 6.0 to 3.0 and keeps its
        // drawn waiting time stretched by the ratio.
        let problem = mass_action_problem(
            4,
            &[(0.5, vec![-1, -1, 1, 0]), (0.5, vec![-1, -1, 0, 1])],
        );
        let mut integrator = JumpIntegrator::new(&[4.0, 3.0, 0.0, 0.0], 0.0, f64::INFINITY);
        let mut agg = problem.aggregator(ChaCha8Rng::seed_from_u64(7));
        agg.initialize(&integrator, &[]).unwrap();

        let (t_fire, fired) = agg.peek_next();
        let other = 1 - fired;
        let tau_old = agg.scheduled_time(other).unwrap();

        integrator.advance_to(t_fire);
        agg.execute_jump(&mut integrator, &[]).unwrap();

        assert_eq!(agg.current_rates()[other], 3.0);
        let expected = t_fire + (6.0 / 3.0) * (tau_old - t_fire);
        let actual = agg.scheduled_time(other).unwrap();
        assert!(
            (actual - expected).abs() <= 1e-12 * expected.abs().max(1.0),
            "rescaled time {} != expected {}",
            actual,
            expected
        );
    }

    #[test]
    fn test_rate_to_zero_parks_jump_until_revived() {
        // S5: both B-consuming jumps die when the single B is consumed and
        // revive with fresh draws once the birth jump replenishes it.
        let problem = mass_action_problem(
            1,
            &[(100.0, vec![-1]), (0.1, vec![-1]), (5.0, vec![1])],
        );
        let mut integrator = JumpIntegrator::new(&[1.0], 0.0, f64::INFINITY);
        let mut agg = problem.aggregator(ChaCha8Rng::seed_from_u64(3));
        agg.initialize(&integrator, &[]).unwrap();
        assert_eq!(agg.current_rates(), &[100.0, 0.1, 5.0]);

        let (t1, first) = step(&mut agg, &mut integrator);
        assert!(first == 0 || first == 1, "a consuming jump fires first");
        assert_eq!(integrator.state(), &[0.0]);
        assert_eq!(agg.current_rates()[0], 0.0);
        assert_eq!(agg.current_rates()[1], 0.0);
        assert!(agg.scheduled_time(0).unwrap().is_infinite());
        assert!(agg.scheduled_time(1).unwrap().is_infinite());

        // Only the birth jump remains schedulable.
        let (t2, second) = agg.peek_next();
        assert_eq!(second, 2);
        assert!(t2.is_finite() && t2 >= t1);
        step(&mut agg, &mut integrator);

        // Revived with fresh exponentials, scheduled after the current time.
        assert_eq!(agg.current_rates()[0], 100.0);
        assert_eq!(agg.current_rates()[1], 0.1);
        for rx in 0..2 {
            let tau = agg.scheduled_time(rx).unwrap();
            assert!(tau.is_finite() && tau >= t2);
        }
    }

    #[test]
    fn test_execute_without_pending_jump_is_rejected() {
        let problem = mass_action_problem(1, &[(1.0, vec![-1])]);
        let mut integrator = JumpIntegrator::new(&[0.0], 0.0, f64::INFINITY);
        let mut agg = problem.aggregator(ChaCha8Rng::seed_from_u64(1));
        agg.initialize(&integrator, &[]).unwrap();
        assert!(agg.peek_next().0.is_infinite());

        assert!(matches!(
            agg.execute_jump(&mut integrator, &[]),
            Err(NrmError::NoPendingJump)
        ));
        // The phantom firing must not have touched the state.
        assert_eq!(integrator.state(), &[0.0]);
    }

    #[test]
    fn test_execute_before_initialize_is_rejected() {
        let problem = mass_action_problem(1, &[(1.0, vec![-1])]);
        let mut integrator = JumpIntegrator::new(&[5.0], 0.0, f64::INFINITY);
        let mut agg = problem.aggregator(ChaCha8Rng::seed_from_u64(1));
        assert!(matches!(
            agg.execute_jump(&mut integrator, &[]),
            Err(NrmError::NoPendingJump)
        ));
    }

    #[test]
    fn test_all_infinite_schedule_peeks_infinity() {
        // S6: every rate zero at t0, so every entry is parked at infinity.
        let problem = mass_action_problem(1, &[(1.0, vec![-1]), (2.0, vec![-1])]);
        let integrator = JumpIntegrator::new(&[0.0], 0.0, f64::INFINITY);
        let mut agg = problem.aggregator(ChaCha8Rng::seed_from_u64(11));
        agg.initialize(&integrator, &[]).unwrap();

        let (time, _) = agg.peek_next();
        assert!(time.is_infinite());
    }

    #[test]
    fn test_heap_matches_rates_across_trajectory() {
        // Birth-death chain; after every event the recorded top equals the
        // scan minimum and infinite schedules coincide with zero rates.
        let problem = mass_action_problem(1, &[(4.0, vec![1]), (1.0, vec![-1])]);
        let mut integrator = JumpIntegrator::new(&[2.0], 0.0, f64::INFINITY);
        let mut agg = problem.aggregator(ChaCha8Rng::seed_from_u64(5));
        agg.initialize(&integrator, &[]).unwrap();

        let mut prev_time = 0.0;
        for _ in 0..200 {
            let (t_next, _) = step(&mut agg, &mut integrator);
            assert!(t_next >= prev_time, "event times must be non-decreasing");
            prev_time = t_next;

            let scan = (0..problem.num_jumps())
                .map(|rx| agg.scheduled_time(rx).unwrap())
                .fold(f64::INFINITY, f64::min);
            assert_eq!(agg.peek_next().0, scan);
            for rx in 0..problem.num_jumps() {
                let infinite = agg.scheduled_time(rx).unwrap().is_infinite();
                let zero_rate = agg.current_rates()[rx] == 0.0;
                assert_eq!(infinite, zero_rate);
            }
        }
    }

    #[test]
    fn test_identical_seeds_yield_identical_event_sequences() {
        let problem = mass_action_problem(
            2,
            &[
                (3.0, vec![1, 0]),
                (1.0, vec![-1, 0]),
                (0.5, vec![-1, 1]),
                (0.8, vec![0, -1]),
            ],
        );

        let run = |seed: u64| {
            let mut integrator = JumpIntegrator::new(&[4.0, 0.0], 0.0, f64::INFINITY);
            let mut agg = problem.aggregator(ChaCha8Rng::seed_from_u64(seed));
            agg.initialize(&integrator, &[]).unwrap();
            (0..100)
                .map(|_| step(&mut agg, &mut integrator))
                .collect::<Vec<_>>()
        };

        assert_eq!(run(17), run(17));
        assert_ne!(run(17), run(18));
    }

    #[test]
    fn test_peek_next_is_pure() {
        let problem = mass_action_problem(1, &[(1.0, vec![-1])]);
        let integrator = JumpIntegrator::new(&[5.0], 0.0, f64::INFINITY);
        let mut agg = problem.aggregator(ChaCha8Rng::seed_from_u64(1));
        agg.initialize(&integrator, &[]).unwrap();
        assert_eq!(agg.peek_next(), agg.peek_next());
    }

    #[test]
    fn test_negative_rate_is_rejected_at_evaluation() {
        let jumps = JumpSet::new(
            Vec::new(),
            vec![ConstantRateJump::new(|_u, _p, _t| -1.0, |_i| {})],
        );
        let graph = crate::nrm::depgraph::DependencyGraph::from_adjacency(vec![vec![0]]);
        let problem = JumpProblem::new(1, jumps, Some(graph)).unwrap();

        let integrator = JumpIntegrator::new(&[0.0], 0.0, 1.0);
        let mut agg = problem.aggregator(ChaCha8Rng::seed_from_u64(1));
        let err = agg.initialize(&integrator, &[]).unwrap_err();
        assert!(matches!(
            err,
            NrmError::InvalidRateKind { jump: 0, rate } if rate == -1.0
        ));
    }

    #[test]
    fn test_nan_rate_is_rejected_at_evaluation() {
        let jumps = JumpSet::new(
            Vec::new(),
            vec![ConstantRateJump::new(|_u, _p, _t| f64::NAN, |_i| {})],
        );
        let graph = crate::nrm::depgraph::DependencyGraph::from_adjacency(vec![vec![0]]);
        let problem = JumpProblem::new(1, jumps, Some(graph)).unwrap();

        let integrator = JumpIntegrator::new(&[0.0], 0.0, 1.0);
        let mut agg = problem.aggregator(ChaCha8Rng::seed_from_u64(1));
        assert!(matches!(
            agg.initialize(&integrator, &[]),
            Err(NrmError::InvalidRateKind { jump: 0, .. })
        ));
    }

    #[test]
    fn test_constant_rate_jump_reads_params_and_time() {
        // One opaque birth whose intensity comes from p; affects go through
        // the integrator handle.
        let jumps = JumpSet::new(
            Vec::new(),
            vec![ConstantRateJump::new(
                |_u, p, _t| p[0],
                |integrator| integrator.state_mut()[0] += 1.0,
            )],
        );
        let graph = crate::nrm::depgraph::DependencyGraph::from_adjacency(vec![vec![0]]);
        let problem = JumpProblem::new(1, jumps, Some(graph)).unwrap();

        let mut integrator = JumpIntegrator::new(&[0.0], 0.0, f64::INFINITY);
        let mut agg = problem.aggregator(ChaCha8Rng::seed_from_u64(9));
        agg.initialize(&integrator, &[2.5]).unwrap();
        assert_eq!(agg.current_rates(), &[2.5]);

        let (t_next, rx) = agg.peek_next();
        assert_eq!(rx, 0);
        integrator.advance_to(t_next);
        agg.execute_jump(&mut integrator, &[2.5]).unwrap();
        assert_eq!(integrator.state(), &[1.0]);
        assert_eq!(agg.prev_jump(), Some(0));
    }

    #[test]
    fn test_build_without_graph_fails_for_opaque_rates() {
        // S4: one opaque rate and no dependency graph.
        let jumps = JumpSet::new(
            Vec::new(),
            vec![ConstantRateJump::new(|_u, _p, _t| 1.0, |_i| {})],
        );
        assert!(matches!(
            JumpProblem::new(1, jumps, None),
            Err(NrmError::MissingDependencyGraph)
        ));
    }

    #[test]
    fn test_problem_rejects_out_of_range_species() {
        let jumps = JumpSet::new(
            vec![MassActionJump::from_stoichiometry(1.0, &[0, -1])],
            Vec::new(),
        );
        assert!(matches!(
            JumpProblem::new(1, jumps, None),
            Err(NrmError::InvalidArgument(_))
        ));
    }
}

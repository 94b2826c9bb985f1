//! Host-side integrator handle threaded through jump affects.

/// Carrier for the state vector and simulated time during one trajectory.
///
/// The integrator owns `u`; the aggregator only borrows it per operation and
/// reads `end_time` once at initialization. Affect functions receive a
/// mutable handle and reach the state through [`state_mut`](Self::state_mut).
#[derive(Clone, Debug)]
pub struct JumpIntegrator {
    u: Vec<f64>,
    t: f64,
    end_time: f64,
}

impl JumpIntegrator {
    /// Create an integrator positioned at `t0` with a copy of `u0`.
    pub fn new(u0: &[f64], t0: f64, end_time: f64) -> Self {
        Self {
            u: u0.to_vec(),
            t: t0,
            end_time,
        }
    }

    /// Current state vector.
    pub fn state(&self) -> &[f64] {
        &self.u
    }

    /// Write access to the state vector. Affects mutate `u` through this.
    pub fn state_mut(&mut self) -> &mut [f64] {
        &mut self.u
    }

    /// Current simulated time.
    pub fn time(&self) -> f64 {
        self.t
    }

    /// Advance simulated time to the next event.
    pub fn advance_to(&mut self, t: f64) {
        self.t = t;
    }

    /// Final time of the trajectory.
    pub fn end_time(&self) -> f64 {
        self.end_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_access_and_advance() {
        let mut integrator = JumpIntegrator::new(&[2.0, 0.0], 0.0, 5.0);
        integrator.state_mut()[1] += 1.0;
        integrator.advance_to(1.25);

        assert_eq!(integrator.state(), &[2.0, 1.0]);
        assert_eq!(integrator.time(), 1.25);
        assert_eq!(integrator.end_time(), 5.0);
    }
}

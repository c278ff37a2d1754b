//! Finite-horizon discrete-time LQR via the Riccati recursion.
//!
//! The closed-form baseline for linear dynamics `x' = A x + B u` and
//! per-step cost `0.5 (x' Q x + u' R u)` over `T` steps with no terminal
//! cost. The regression tests hold the iterative solvers to this solution.

use nalgebra::{SMatrix, SVector};

use hindsight_core::error::SolverError;

// ---------------------------------------------------------------------------
// LqrRollout
// ---------------------------------------------------------------------------

/// Rollout of the optimal policy: states (`T + 1`), controls (`T`), and the
/// per-step costs (`T`).
#[derive(Debug, Clone)]
pub struct LqrRollout<const XDIM: usize, const UDIM: usize> {
    pub states: Vec<SVector<f64, XDIM>>,
    pub controls: Vec<SVector<f64, UDIM>>,
    pub costs: Vec<f64>,
}

impl<const XDIM: usize, const UDIM: usize> LqrRollout<XDIM, UDIM> {
    /// Sum of the per-step costs.
    pub fn total_cost(&self) -> f64 {
        self.costs.iter().sum()
    }
}

// ---------------------------------------------------------------------------
// FiniteHorizonLqr
// ---------------------------------------------------------------------------

/// Exact LQR over a fixed horizon.
#[derive(Debug, Clone)]
pub struct FiniteHorizonLqr<const XDIM: usize, const UDIM: usize> {
    a: SMatrix<f64, XDIM, XDIM>,
    b: SMatrix<f64, XDIM, UDIM>,
    q: SMatrix<f64, XDIM, XDIM>,
    r: SMatrix<f64, UDIM, UDIM>,
    feedback: Vec<SMatrix<f64, UDIM, XDIM>>,
}

impl<const XDIM: usize, const UDIM: usize> FiniteHorizonLqr<XDIM, UDIM> {
    pub const fn new(
        a: SMatrix<f64, XDIM, XDIM>,
        b: SMatrix<f64, XDIM, UDIM>,
        q: SMatrix<f64, XDIM, XDIM>,
        r: SMatrix<f64, UDIM, UDIM>,
    ) -> Self {
        Self {
            a,
            b,
            q,
            r,
            feedback: Vec::new(),
        }
    }

    /// Run the Riccati recursion over `horizon` steps, storing `K_t` for
    /// t = 0..T-1. The value matrix after the last step is zero (all cost
    /// is running cost), so `K_{T-1}` is always zero.
    ///
    /// # Errors
    ///
    /// [`SolverError::SingularControlHessian`] if `R + B' V B` is not
    /// invertible at some step (R not positive definite).
    pub fn solve(&mut self, horizon: usize) -> Result<(), SolverError> {
        if horizon < 2 {
            return Err(SolverError::HorizonTooShort(horizon));
        }

        self.feedback = vec![SMatrix::zeros(); horizon];
        let mut value = SMatrix::<f64, XDIM, XDIM>::zeros();

        for t in (0..horizon).rev() {
            let hessian = self.r + self.b.transpose() * value * self.b;
            let Some(inverse) = hessian.try_inverse() else {
                return Err(SolverError::SingularControlHessian { t });
            };
            let feedback = -inverse * (self.b.transpose() * value * self.a);

            let closed_loop = self.a + self.b * feedback;
            value = self.q
                + feedback.transpose() * self.r * feedback
                + closed_loop.transpose() * value * closed_loop;
            value = (value + value.transpose()) * 0.5;

            self.feedback[t] = feedback;
        }
        Ok(())
    }

    /// The gain `K_t`. Panics if `solve` has not run or `t` is out of range.
    pub fn feedback(&self, t: usize) -> &SMatrix<f64, UDIM, XDIM> {
        &self.feedback[t]
    }

    /// Roll out `u_t = K_t x_t` from `x0` over the solved horizon.
    pub fn forward_pass(&self, x0: &SVector<f64, XDIM>) -> LqrRollout<XDIM, UDIM> {
        let horizon = self.feedback.len();
        let mut states = Vec::with_capacity(horizon + 1);
        let mut controls = Vec::with_capacity(horizon);
        let mut costs = Vec::with_capacity(horizon);

        states.push(*x0);
        for t in 0..horizon {
            let x = states[t];
            let u = self.feedback[t] * x;
            costs.push(
                0.5 * ((x.transpose() * self.q * x)[(0, 0)]
                    + (u.transpose() * self.r * u)[(0, 0)]),
            );
            states.push(self.a * x + self.b * u);
            controls.push(u);
        }

        LqrRollout { states, controls, costs }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix1, Matrix2, Vector1};

    #[test]
    fn rejects_short_horizon() {
        let mut lqr = FiniteHorizonLqr::new(
            Matrix1::new(1.0),
            Matrix1::new(1.0),
            Matrix1::new(1.0),
            Matrix1::new(1.0),
        );
        assert!(matches!(lqr.solve(1), Err(SolverError::HorizonTooShort(1))));
    }

    #[test]
    fn scalar_recursion_matches_hand_computation() {
        let (a, b, q, r) = (0.9, 1.0, 1.0, 0.1);
        let mut lqr = FiniteHorizonLqr::new(
            Matrix1::new(a),
            Matrix1::new(b),
            Matrix1::new(q),
            Matrix1::new(r),
        );
        lqr.solve(2).unwrap();

        // Last step: V = 0 so K_1 = 0, then V_1 = Q.
        assert_relative_eq!(lqr.feedback(1)[(0, 0)], 0.0, epsilon = 1e-14);

        // First step against V_1 = q.
        let k0 = -(b * q * a) / (r + b * q * b);
        assert_relative_eq!(lqr.feedback(0)[(0, 0)], k0, epsilon = 1e-12);
    }

    #[test]
    fn rollout_has_consistent_sizes_and_costs() {
        let mut lqr = FiniteHorizonLqr::new(
            Matrix2::new(1.0, 0.1, 0.0, 1.0),
            SMatrix::<f64, 2, 1>::new(0.0, 0.1),
            Matrix2::identity(),
            Matrix1::new(0.5),
        );
        lqr.solve(10).unwrap();
        let rollout = lqr.forward_pass(&nalgebra::Vector2::new(1.0, 0.0));

        assert_eq!(rollout.states.len(), 11);
        assert_eq!(rollout.controls.len(), 10);
        assert_eq!(rollout.costs.len(), 10);
        assert_relative_eq!(
            rollout.total_cost(),
            rollout.costs.iter().sum::<f64>(),
            epsilon = 1e-14
        );
    }

    #[test]
    fn optimal_gain_beats_perturbed_gain() {
        let (a, b, q, r) = (0.9, 1.0, 1.0, 0.1);
        let mut lqr = FiniteHorizonLqr::new(
            Matrix1::new(a),
            Matrix1::new(b),
            Matrix1::new(q),
            Matrix1::new(r),
        );
        let horizon = 8;
        lqr.solve(horizon).unwrap();
        let optimal = lqr.forward_pass(&Vector1::new(1.0)).total_cost();

        // Roll out with every gain nudged; cost must not improve.
        for delta in [-0.1, 0.1] {
            let mut x = Vector1::new(1.0);
            let mut cost = 0.0;
            for t in 0..horizon {
                let u = (lqr.feedback(t) + Matrix1::new(delta)) * x;
                cost += 0.5 * (q * x[0] * x[0] + r * u[0] * u[0]);
                x = Vector1::new(a * x[0] + b * u[0]);
            }
            assert!(cost >= optimal - 1e-12);
        }
    }

    #[test]
    fn singular_r_reported() {
        let mut lqr = FiniteHorizonLqr::new(
            Matrix1::new(1.0),
            Matrix1::new(1.0),
            Matrix1::new(1.0),
            Matrix1::new(0.0),
        );
        assert!(matches!(
            lqr.solve(4),
            Err(SolverError::SingularControlHessian { .. })
        ));
    }
}

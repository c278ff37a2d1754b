//! Single-chain iterative LQR.
//!
//! Alternates a backward sweep of damped Bellman backups with a forward
//! rollout under a backtracking line search, until the relative cost change
//! drops below the convergence threshold.

use nalgebra::{SMatrix, SVector};
use tracing::{debug, info};

use hindsight_core::error::{HindsightError, SolverError};
use hindsight_core::options::SolveOptions;
use hindsight_core::problem::{Dynamics, RunningCost, TerminalCost};
use hindsight_core::report::SolveReport;
use hindsight_math::{linearize_dynamics, quadratize_running_cost, quadratize_terminal_cost};

use crate::backup::bellman_backup;

/// Step-size decay for the backtracking line search.
pub(crate) const STEP_DECAY: f64 = 0.5;

// ---------------------------------------------------------------------------
// Rollout
// ---------------------------------------------------------------------------

/// Result of a forward pass: the visited states (`T + 1`), the applied
/// controls (`T`), and the summed cost including the terminal term.
#[derive(Debug, Clone)]
pub struct Rollout<const XDIM: usize, const UDIM: usize> {
    pub states: Vec<SVector<f64, XDIM>>,
    pub controls: Vec<SVector<f64, UDIM>>,
    pub cost: f64,
}

// ---------------------------------------------------------------------------
// IlqrSolver
// ---------------------------------------------------------------------------

/// iLQR solver over a single dynamics/cost chain.
///
/// Owns the nominal trajectory `(xhat, uhat)` and the affine policy
/// `(K_t, k_t)`; `solve()` refines them in place, and the `compute_control` /
/// `forward_pass` queries read them afterwards.
pub struct IlqrSolver<D, C, F, const XDIM: usize, const UDIM: usize>
where
    D: Dynamics<XDIM, UDIM>,
    C: RunningCost<XDIM, UDIM>,
    F: TerminalCost<XDIM>,
{
    dynamics: D,
    running_cost: C,
    terminal_cost: F,
    xhat: Vec<SVector<f64, XDIM>>,
    uhat: Vec<SVector<f64, UDIM>>,
    feedback: Vec<SMatrix<f64, UDIM, XDIM>>,
    feedforward: Vec<SVector<f64, UDIM>>,
}

impl<D, C, F, const XDIM: usize, const UDIM: usize> IlqrSolver<D, C, F, XDIM, UDIM>
where
    D: Dynamics<XDIM, UDIM>,
    C: RunningCost<XDIM, UDIM>,
    F: TerminalCost<XDIM>,
{
    /// Create a solver with empty state. The first `solve()` must not be a
    /// warm start.
    pub fn new(dynamics: D, running_cost: C, terminal_cost: F) -> Self {
        Self {
            dynamics,
            running_cost,
            terminal_cost,
            xhat: Vec::new(),
            uhat: Vec::new(),
            feedback: Vec::new(),
            feedforward: Vec::new(),
        }
    }

    /// Create a solver seeded with a nominal trajectory and zero gains.
    ///
    /// Useful for warm starts from an external solution (e.g. an exact LQR
    /// rollout) and for running a single `backward_pass` about a known
    /// trajectory.
    ///
    /// # Errors
    ///
    /// [`SolverError::HorizonTooShort`] if fewer than two controls are given,
    /// or a `WarmStartMismatch` if `states` is not one longer than
    /// `controls`.
    pub fn with_nominal(
        dynamics: D,
        running_cost: C,
        terminal_cost: F,
        states: Vec<SVector<f64, XDIM>>,
        controls: Vec<SVector<f64, UDIM>>,
    ) -> Result<Self, SolverError> {
        if controls.len() < 2 {
            return Err(SolverError::HorizonTooShort(controls.len()));
        }
        if states.len() != controls.len() + 1 {
            return Err(SolverError::WarmStartMismatch {
                have: states.len(),
                expected: controls.len() + 1,
            });
        }
        let horizon = controls.len();
        Ok(Self {
            dynamics,
            running_cost,
            terminal_cost,
            xhat: states,
            uhat: controls,
            feedback: vec![SMatrix::zeros(); horizon],
            feedforward: vec![SVector::zeros(); horizon],
        })
    }

    /// Number of timesteps in the stored trajectory.
    ///
    /// Panics if the internal buffers have drifted out of step; that would
    /// be a solver bug, not a caller error.
    pub fn horizon(&self) -> usize {
        let horizon = self.uhat.len();
        assert_eq!(horizon, self.feedforward.len());
        assert_eq!(horizon, self.feedback.len());
        assert_eq!(horizon + 1, self.xhat.len());
        horizon
    }

    /// Nominal states `xhat[0..=T]` from the last accepted iteration.
    pub fn nominal_states(&self) -> &[SVector<f64, XDIM>] {
        &self.xhat
    }

    /// Nominal controls `uhat[0..T]` from the last accepted iteration.
    pub fn nominal_controls(&self) -> &[SVector<f64, UDIM>] {
        &self.uhat
    }

    /// Feedback gains `K[0..T]`.
    pub fn feedback_gains(&self) -> &[SMatrix<f64, UDIM, XDIM>] {
        &self.feedback
    }

    /// Feed-forward terms `k[0..T]`.
    pub fn feedforward_terms(&self) -> &[SVector<f64, UDIM>] {
        &self.feedforward
    }

    /// The policy at timestep `t` evaluated at `x`, with the feed-forward
    /// term scaled by `alpha` (`alpha = 1` gives the plain policy).
    pub fn compute_control(
        &self,
        x: &SVector<f64, XDIM>,
        t: usize,
        alpha: f64,
    ) -> SVector<f64, UDIM> {
        let offset = x - self.xhat[t];
        self.feedback[t] * offset + self.feedforward[t] * alpha + self.uhat[t]
    }

    /// Roll the policy out from `x_init` with step size `alpha`.
    ///
    /// Read-only: the nominal trajectory is not touched.
    ///
    /// # Errors
    ///
    /// [`SolverError::NonFiniteCost`] if the rollout produces a non-finite
    /// state or cost.
    pub fn forward_pass(
        &self,
        x_init: &SVector<f64, XDIM>,
        alpha: f64,
    ) -> Result<Rollout<XDIM, UDIM>, SolverError> {
        let horizon = self.horizon();
        let mut states = Vec::with_capacity(horizon + 1);
        let mut controls = Vec::with_capacity(horizon);

        states.push(*x_init);
        let mut cost = 0.0;
        for t in 0..horizon {
            let u = self.compute_control(&states[t], t, alpha);
            cost += self.running_cost.cost(&states[t], &u, t);

            let next = self.dynamics.step(&states[t], &u);
            if !cost.is_finite() || !next.iter().all(|v| v.is_finite()) {
                return Err(SolverError::NonFiniteCost { t });
            }
            controls.push(u);
            states.push(next);
        }
        cost += self.terminal_cost.cost(&states[horizon]);
        if !cost.is_finite() {
            return Err(SolverError::NonFiniteCost { t: horizon });
        }

        Ok(Rollout { states, controls, cost })
    }

    /// Recompute the gains about the current nominal trajectory.
    ///
    /// One damped Bellman sweep from the terminal quadratization down to
    /// t = 0. `solve()` calls this each iteration; it is public so a
    /// caller holding a known-good trajectory can refresh the policy
    /// without running the line search.
    ///
    /// # Errors
    ///
    /// [`SolverError::SingularControlHessian`] from any backup step.
    pub fn backward_pass(&mut self, mu: f64) -> Result<(), SolverError> {
        let horizon = self.horizon();

        let terminal = quadratize_terminal_cost(&self.terminal_cost, &self.xhat[horizon]);
        let mut value = terminal.q;
        let mut value_grad = terminal.grad.transpose();

        for t in (0..horizon).rev() {
            let (a, b) = linearize_dynamics(&self.dynamics, &self.xhat[t], &self.uhat[t]);
            let cost = quadratize_running_cost(&self.running_cost, t, &self.xhat[t], &self.uhat[t]);
            let step = bellman_backup(t, mu, &a, &b, &cost, &value, &value_grad)?;
            self.feedback[t] = step.feedback;
            self.feedforward[t] = step.feedforward;
            value = step.value;
            value_grad = step.value_grad;
        }
        Ok(())
    }

    /// Optimize the trajectory from `x_init` over `horizon` steps.
    ///
    /// Cold starts reset the state to zero gains, `u_nominal` controls and
    /// zero states; warm starts drop the first `options.t_offset` steps of
    /// the previous solution and continue from there.
    ///
    /// # Errors
    ///
    /// Precondition violations (horizon, options, warm-start sizes) are
    /// reported before the first iteration. `SingularControlHessian`,
    /// `NonFiniteCost` and `LineSearchFailed` abort the solve, leaving the
    /// last accepted trajectory in place. Running out of iterations is not
    /// an error; the report carries `converged = false`.
    pub fn solve(
        &mut self,
        horizon: usize,
        x_init: &SVector<f64, XDIM>,
        u_nominal: &SVector<f64, UDIM>,
        options: &SolveOptions,
    ) -> Result<SolveReport, HindsightError> {
        options.validate()?;
        if horizon < 2 {
            return Err(SolverError::HorizonTooShort(horizon).into());
        }

        if options.warm_start {
            let have = self.feedback.len();
            if have <= options.t_offset {
                return Err(SolverError::WarmStartTooShort {
                    have,
                    t_offset: options.t_offset,
                }
                .into());
            }
            self.feedback.drain(..options.t_offset);
            self.feedforward.drain(..options.t_offset);
            self.uhat.drain(..options.t_offset);
            self.xhat.drain(..options.t_offset);
            if self.feedback.len() != horizon {
                return Err(SolverError::WarmStartMismatch {
                    have: self.feedback.len(),
                    expected: horizon,
                }
                .into());
            }
            assert_eq!(self.xhat.len(), horizon + 1);
        } else {
            self.feedback = vec![SMatrix::zeros(); horizon];
            self.feedforward = vec![SVector::zeros(); horizon];
            self.uhat = vec![*u_nominal; horizon];
            self.xhat = vec![SVector::zeros(); horizon + 1];
        }

        let mut old_cost = f64::INFINITY;
        let mut report = SolveReport {
            iterations: options.max_iters,
            converged: false,
            final_cost: f64::NAN,
            final_ratio: f64::NAN,
        };

        for iter in 0..options.max_iters {
            // Backtracking line search on the feed-forward scale.
            let mut alpha = options.start_alpha;
            let mut halvings = 0_u32;
            let (rollout, new_cost, ratio) = loop {
                let rollout = self.forward_pass(x_init, alpha)?;
                let new_cost = rollout.cost;
                let ratio = ((old_cost - new_cost) / new_cost).abs();
                if new_cost < old_cost || ratio < options.cost_convg_ratio {
                    break (rollout, new_cost, ratio);
                }
                halvings += 1;
                if halvings >= options.max_line_search_steps {
                    return Err(SolverError::LineSearchFailed { halvings }.into());
                }
                alpha *= STEP_DECAY;
            };

            // Accept: the rollout becomes the nominal trajectory.
            self.xhat = rollout.states;
            self.uhat = rollout.controls;

            if options.verbose {
                info!(
                    iter,
                    alpha,
                    cost_ratio = ratio,
                    new_cost,
                    old_cost,
                    "iLQR iteration"
                );
            }

            report.iterations = iter;
            report.final_cost = new_cost;
            report.final_ratio = ratio;

            if ratio < options.cost_convg_ratio {
                report.converged = true;
                break;
            }
            old_cost = new_cost;

            self.backward_pass(options.mu)?;
        }

        if !report.converged {
            report.iterations = options.max_iters;
        }
        debug!(
            iterations = report.iterations,
            converged = report.converged,
            final_cost = report.final_cost,
            "iLQR solve finished"
        );
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

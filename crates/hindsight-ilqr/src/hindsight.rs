//! Hindsight iLQR: a probability-weighted ensemble of trajectories with a
//! shared first-stage control.
//!
//! Each branch is one hypothesis about the dynamics/cost pair the agent may
//! face. The realized control at t = 0 is the same across branches (the
//! agent does not yet know which branch is active), so the backward pass
//! sweeps every branch down to t = 1 and then solves one probability-
//! weighted subproblem for the shared `(K_0, k_0)`.

use nalgebra::{SMatrix, SVector};
use tracing::{debug, info};

use hindsight_core::error::{HindsightError, SolverError};
use hindsight_core::options::SolveOptions;
use hindsight_core::problem::{Dynamics, RunningCost, TerminalCost};
use hindsight_core::report::SolveReport;
use hindsight_math::{
    is_equal, linearize_dynamics, quadratize_running_cost, quadratize_terminal_cost,
};

use crate::backup::bellman_backup;
use crate::solver::{Rollout, STEP_DECAY};

/// Tolerance on the total branch probability.
const PROBABILITY_SUM_TOL: f64 = 1e-3;

/// Tolerance for the shared-first-slot equality assertion. The per-branch
/// rollouts evaluate the same affine law at the same initial state, so the
/// slots agree to rounding.
const SHARED_SLOT_TOL: f64 = 1e-12;

// ---------------------------------------------------------------------------
// Branch
// ---------------------------------------------------------------------------

/// One hypothesis: its own dynamics, costs and probability, plus the
/// trajectory and gains the solver maintains for it.
///
/// A plain record, not a hierarchy; the callbacks are boxed so branches with
/// different closure types can live in one collection.
pub struct Branch<const XDIM: usize, const UDIM: usize> {
    dynamics: Box<dyn Dynamics<XDIM, UDIM>>,
    running_cost: Box<dyn RunningCost<XDIM, UDIM>>,
    terminal_cost: Box<dyn TerminalCost<XDIM>>,
    probability: f64,
    xhat: Vec<SVector<f64, XDIM>>,
    uhat: Vec<SVector<f64, UDIM>>,
    feedback: Vec<SMatrix<f64, UDIM, XDIM>>,
    feedforward: Vec<SVector<f64, UDIM>>,
}

impl<const XDIM: usize, const UDIM: usize> Branch<XDIM, UDIM> {
    /// Bundle a dynamics/cost hypothesis with its probability.
    pub fn new(
        dynamics: impl Dynamics<XDIM, UDIM> + 'static,
        running_cost: impl RunningCost<XDIM, UDIM> + 'static,
        terminal_cost: impl TerminalCost<XDIM> + 'static,
        probability: f64,
    ) -> Self {
        Self {
            dynamics: Box::new(dynamics),
            running_cost: Box::new(running_cost),
            terminal_cost: Box::new(terminal_cost),
            probability,
            xhat: Vec::new(),
            uhat: Vec::new(),
            feedback: Vec::new(),
            feedforward: Vec::new(),
        }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Nominal states from the last accepted iteration.
    pub fn nominal_states(&self) -> &[SVector<f64, XDIM>] {
        &self.xhat
    }

    /// Nominal controls from the last accepted iteration.
    pub fn nominal_controls(&self) -> &[SVector<f64, UDIM>] {
        &self.uhat
    }

    pub fn feedback_gains(&self) -> &[SMatrix<f64, UDIM, XDIM>] {
        &self.feedback
    }

    pub fn feedforward_terms(&self) -> &[SVector<f64, UDIM>] {
        &self.feedforward
    }

    /// This branch's policy at timestep `t`, feed-forward scaled by `alpha`.
    fn control(&self, x: &SVector<f64, XDIM>, t: usize, alpha: f64) -> SVector<f64, UDIM> {
        let offset = x - self.xhat[t];
        self.feedback[t] * offset + self.feedforward[t] * alpha + self.uhat[t]
    }

    fn rollout(
        &self,
        x_init: &SVector<f64, XDIM>,
        alpha: f64,
    ) -> Result<Rollout<XDIM, UDIM>, SolverError> {
        let horizon = self.uhat.len();
        let mut states = Vec::with_capacity(horizon + 1);
        let mut controls = Vec::with_capacity(horizon);

        states.push(*x_init);
        let mut cost = 0.0;
        for t in 0..horizon {
            let u = self.control(&states[t], t, alpha);
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
}

// ---------------------------------------------------------------------------
// HindsightSolver
// ---------------------------------------------------------------------------

/// iLQR over a branch ensemble with a shared first-stage control.
pub struct HindsightSolver<const XDIM: usize, const UDIM: usize> {
    branches: Vec<Branch<XDIM, UDIM>>,
    xhat0: SVector<f64, XDIM>,
    uhat0: SVector<f64, UDIM>,
    feedback0: SMatrix<f64, UDIM, XDIM>,
    feedforward0: SVector<f64, UDIM>,
}

impl<const XDIM: usize, const UDIM: usize> HindsightSolver<XDIM, UDIM> {
    /// Build a solver over the given branches.
    ///
    /// # Errors
    ///
    /// Rejects an empty branch list, probabilities outside `[0, 1]`, and a
    /// probability total off 1 by more than `1e-3`.
    pub fn new(branches: Vec<Branch<XDIM, UDIM>>) -> Result<Self, SolverError> {
        let solver = Self {
            branches,
            xhat0: SVector::zeros(),
            uhat0: SVector::zeros(),
            feedback0: SMatrix::zeros(),
            feedforward0: SVector::zeros(),
        };
        solver.validate_probabilities()?;
        Ok(solver)
    }

    fn validate_probabilities(&self) -> Result<(), SolverError> {
        if self.branches.is_empty() {
            return Err(SolverError::NoBranches);
        }
        for branch in &self.branches {
            if !(0.0..=1.0).contains(&branch.probability) {
                return Err(SolverError::BranchProbabilityOutOfRange(branch.probability));
            }
        }
        let total = self.total_branch_probability();
        if (total - 1.0).abs() > PROBABILITY_SUM_TOL {
            return Err(SolverError::BranchProbabilitySum(total));
        }
        Ok(())
    }

    pub fn total_branch_probability(&self) -> f64 {
        self.branches.iter().map(|b| b.probability).sum()
    }

    pub fn num_branches(&self) -> usize {
        self.branches.len()
    }

    pub fn branch(&self, branch_num: usize) -> &Branch<XDIM, UDIM> {
        &self.branches[branch_num]
    }

    /// Reweight one branch. The new total is validated at the next
    /// `solve()`.
    ///
    /// # Errors
    ///
    /// Rejects probabilities outside `[0, 1]`.
    pub fn set_branch_probability(
        &mut self,
        branch_num: usize,
        probability: f64,
    ) -> Result<(), SolverError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(SolverError::BranchProbabilityOutOfRange(probability));
        }
        self.branches[branch_num].probability = probability;
        Ok(())
    }

    /// Shared initial state of the nominal trajectories.
    pub fn shared_initial_state(&self) -> &SVector<f64, XDIM> {
        &self.xhat0
    }

    /// Shared initial control of the nominal trajectories.
    pub fn shared_initial_control(&self) -> &SVector<f64, UDIM> {
        &self.uhat0
    }

    /// Shared feedback gain at t = 0.
    pub fn shared_feedback(&self) -> &SMatrix<f64, UDIM, XDIM> {
        &self.feedback0
    }

    /// Shared feed-forward term at t = 0.
    pub fn shared_feedforward(&self) -> &SVector<f64, UDIM> {
        &self.feedforward0
    }

    /// Number of timesteps in the stored trajectories.
    ///
    /// Panics if the per-branch buffers have drifted out of step; that
    /// would be a solver bug.
    pub fn horizon(&self) -> usize {
        assert!(!self.branches.is_empty());
        let first = &self.branches[0];
        let horizon = first.uhat.len();
        assert_eq!(horizon, first.feedforward.len());
        assert_eq!(horizon, first.feedback.len());
        assert_eq!(horizon + 1, first.xhat.len());
        horizon
    }

    /// The shared policy at t = 0 evaluated at `x0`.
    pub fn compute_first_control(&self, x0: &SVector<f64, XDIM>) -> SVector<f64, UDIM> {
        let offset = x0 - self.xhat0;
        self.feedback0 * offset + self.feedforward0 + self.uhat0
    }

    /// Branch `branch_num`'s policy at timestep `t`, feed-forward scaled by
    /// `alpha`.
    pub fn compute_control(
        &self,
        branch_num: usize,
        x: &SVector<f64, XDIM>,
        t: usize,
        alpha: f64,
    ) -> SVector<f64, UDIM> {
        self.branches[branch_num].control(x, t, alpha)
    }

    /// Roll branch `branch_num` out from `x_init` with step size `alpha`.
    ///
    /// Read-only.
    ///
    /// # Errors
    ///
    /// [`SolverError::NonFiniteCost`] on a non-finite state or cost.
    pub fn forward_pass(
        &self,
        branch_num: usize,
        x_init: &SVector<f64, XDIM>,
        alpha: f64,
    ) -> Result<Rollout<XDIM, UDIM>, SolverError> {
        self.branches[branch_num].rollout(x_init, alpha)
    }

    /// Probability-weighted expected cost of a rollout across all branches.
    fn expected_cost(
        &self,
        x_init: &SVector<f64, XDIM>,
        alpha: f64,
    ) -> Result<f64, SolverError> {
        let mut expected = 0.0;
        for branch in &self.branches {
            expected += branch.probability * branch.rollout(x_init, alpha)?.cost;
        }
        Ok(expected)
    }

    /// Optimize the branch ensemble from `x_init` over `horizon` steps.
    ///
    /// The line search backtracks on the probability-weighted expected cost
    /// with one `alpha` shared across branches. Every iteration re-merges
    /// the first-stage subproblem so `(K_0, k_0, xhat_0, uhat_0)` stay
    /// identical across branches.
    ///
    /// # Errors
    ///
    /// Same contract as the single-chain
    /// [`IlqrSolver::solve`](crate::solver::IlqrSolver::solve), plus the
    /// branch-probability preconditions.
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
        self.validate_probabilities()?;

        if options.warm_start {
            self.warm_start_init(horizon, x_init, u_nominal, options.t_offset)?;
        } else {
            self.xhat0 = SVector::zeros();
            self.uhat0 = *u_nominal;
            self.feedback0 = SMatrix::zeros();
            self.feedforward0 = SVector::zeros();
            for branch in &mut self.branches {
                branch.feedback = vec![SMatrix::zeros(); horizon];
                branch.feedforward = vec![SVector::zeros(); horizon];
                branch.uhat = vec![*u_nominal; horizon];
                branch.xhat = vec![SVector::zeros(); horizon + 1];
            }
        }

        let mut old_cost = f64::INFINITY;
        let mut report = SolveReport {
            iterations: options.max_iters,
            converged: false,
            final_cost: f64::NAN,
            final_ratio: f64::NAN,
        };

        for iter in 0..options.max_iters {
            // Line search on the expected cost, alpha shared across branches.
            let mut alpha = options.start_alpha;
            let mut halvings = 0_u32;
            let (new_cost, ratio) = loop {
                let expected = self.expected_cost(x_init, alpha)?;
                let ratio = ((old_cost - expected) / expected).abs();
                if expected < old_cost || ratio < options.cost_convg_ratio {
                    break (expected, ratio);
                }
                halvings += 1;
                if halvings >= options.max_line_search_steps {
                    return Err(SolverError::LineSearchFailed { halvings }.into());
                }
                alpha *= STEP_DECAY;
            };

            // Commit the accepted step size: one more rollout per branch
            // becomes its nominal trajectory.
            for branch_num in 0..self.branches.len() {
                let rollout = self.branches[branch_num].rollout(x_init, alpha)?;
                let branch = &mut self.branches[branch_num];
                branch.xhat = rollout.states;
                branch.uhat = rollout.controls;
            }
            // Identical across branches by the shared-first-control
            // invariant; branch 0 is as good as any.
            self.xhat0 = self.branches[0].xhat[0];
            self.uhat0 = self.branches[0].uhat[0];

            if options.verbose {
                info!(
                    iter,
                    alpha,
                    cost_ratio = ratio,
                    new_cost,
                    old_cost,
                    "hindsight iLQR iteration"
                );
            }

            report.iterations = iter;
            report.final_cost = new_cost;
            report.final_ratio = ratio;
            old_cost = new_cost;

            if ratio < options.cost_convg_ratio {
                report.converged = true;
                break;
            }

            self.backward_pass(options.mu)?;
        }

        if !report.converged {
            report.iterations = options.max_iters;
        }
        debug!(
            iterations = report.iterations,
            converged = report.converged,
            final_cost = report.final_cost,
            branches = self.branches.len(),
            "hindsight solve finished"
        );
        Ok(report)
    }

    /// Drop the first `t_offset` steps of every branch and rebuild the
    /// shared first slot: `(xhat0, uhat0)` from the caller, `(K0, k0)` as
    /// the probability-weighted average of the branch gains that slid into
    /// slot 0.
    fn warm_start_init(
        &mut self,
        horizon: usize,
        x_init: &SVector<f64, XDIM>,
        u_nominal: &SVector<f64, UDIM>,
        t_offset: usize,
    ) -> Result<(), SolverError> {
        self.xhat0 = *x_init;
        self.uhat0 = *u_nominal;
        self.feedback0 = SMatrix::zeros();
        self.feedforward0 = SVector::zeros();

        for branch in &mut self.branches {
            let have = branch.feedback.len();
            if have <= t_offset {
                return Err(SolverError::WarmStartTooShort { have, t_offset });
            }
            branch.feedback.drain(..t_offset);
            branch.feedforward.drain(..t_offset);
            branch.uhat.drain(..t_offset);
            branch.xhat.drain(..t_offset);
            if branch.feedback.len() != horizon {
                return Err(SolverError::WarmStartMismatch {
                    have: branch.feedback.len(),
                    expected: horizon,
                });
            }
            assert_eq!(branch.xhat.len(), horizon + 1);

            self.feedback0 += branch.feedback[0] * branch.probability;
            self.feedforward0 += branch.feedforward[0] * branch.probability;
        }

        for branch in &mut self.branches {
            branch.feedback[0] = self.feedback0;
            branch.feedforward[0] = self.feedforward0;
            branch.xhat[0] = self.xhat0;
            branch.uhat[0] = self.uhat0;
        }
        Ok(())
    }

    /// Per-branch damped sweeps down to t = 1, then the probability-weighted
    /// merge for the shared t = 0 control law.
    fn backward_pass(&mut self, mu: f64) -> Result<(), SolverError> {
        let horizon = self.horizon();

        // Each branch backs up its own value function to the t = 1 boundary.
        let mut boundaries = Vec::with_capacity(self.branches.len());
        for branch in &mut self.branches {
            let terminal =
                quadratize_terminal_cost(branch.terminal_cost.as_ref(), &branch.xhat[horizon]);
            let mut value = terminal.q;
            let mut value_grad = terminal.grad.transpose();

            for t in (1..horizon).rev() {
                let (a, b) = linearize_dynamics(
                    branch.dynamics.as_ref(),
                    &branch.xhat[t],
                    &branch.uhat[t],
                );
                let cost = quadratize_running_cost(
                    branch.running_cost.as_ref(),
                    t,
                    &branch.xhat[t],
                    &branch.uhat[t],
                );
                let step = bellman_backup(t, mu, &a, &b, &cost, &value, &value_grad)?;
                branch.feedback[t] = step.feedback;
                branch.feedforward[t] = step.feedforward;
                value = step.value;
                value_grad = step.value_grad;
            }
            boundaries.push((value, value_grad));
        }

        // Merge: one LM-damped subproblem over the probability-weighted
        // branch models, all linearized at the shared (xhat0, uhat0).
        let mut weighted_hessian = SMatrix::<f64, UDIM, UDIM>::zeros();
        let mut weighted_feedback_term = SMatrix::<f64, UDIM, XDIM>::zeros();
        let mut weighted_feedforward_term = SVector::<f64, UDIM>::zeros();
        let mut weighted_r = SMatrix::<f64, UDIM, UDIM>::zeros();
        let mut weighted_p = SMatrix::<f64, XDIM, UDIM>::zeros();
        let mut weighted_grad_u = SVector::<f64, UDIM>::zeros();

        for (branch, (value1, grad1)) in self.branches.iter().zip(&boundaries) {
            let p = branch.probability;
            let (a, b) = linearize_dynamics(branch.dynamics.as_ref(), &self.xhat0, &self.uhat0);
            let inflated = value1 + SMatrix::<f64, XDIM, XDIM>::identity() * mu;

            weighted_hessian += (b.transpose() * inflated * b) * p;
            weighted_feedback_term += (b.transpose() * inflated * a) * p;
            weighted_feedforward_term += (b.transpose() * grad1.transpose()) * p;

            let cost =
                quadratize_running_cost(branch.running_cost.as_ref(), 0, &self.xhat0, &self.uhat0);
            weighted_r += cost.r * p;
            weighted_p += cost.p * p;
            weighted_grad_u += cost.grad_u * p;
        }

        let merged_hessian = weighted_r + weighted_hessian;
        let Some(inverse) = merged_hessian.try_inverse() else {
            return Err(SolverError::SingularControlHessian { t: 0 });
        };
        let neg_inv = -inverse;
        self.feedback0 = neg_inv * (weighted_p.transpose() + weighted_feedback_term);
        self.feedforward0 = neg_inv * (weighted_grad_u + weighted_feedforward_term);

        // Every branch gets the shared law; the first slots must already
        // agree across branches, so check rather than assume.
        for branch in &mut self.branches {
            branch.feedback[0] = self.feedback0;
            branch.feedforward[0] = self.feedforward0;
            assert!(
                is_equal(&branch.xhat[0], &self.xhat0, SHARED_SLOT_TOL),
                "branch initial state diverged from the shared slot"
            );
            assert!(
                is_equal(&branch.uhat[0], &self.uhat0, SHARED_SLOT_TOL),
                "branch initial control diverged from the shared slot"
            );
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! One-step Bellman backup with Levenberg-Marquardt damping.
//!
//! Given the quadratic value model at t+1 and the local linear-quadratic
//! model of dynamics and cost at t, solves the damped control subproblem and
//! propagates the value model to t.

use nalgebra::{SMatrix, SVector};

use hindsight_core::error::SolverError;
use hindsight_math::{symmetrize, CostQuadratic};

/// Gradient of the quadratic cost-to-go model, stored as a row vector so the
/// backup reads like the math.
pub type ValueGradient<const XDIM: usize> = SMatrix<f64, 1, XDIM>;

/// Output of one backup step: the affine control law at t and the value
/// model propagated to t.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackupStep<const XDIM: usize, const UDIM: usize> {
    pub feedback: SMatrix<f64, UDIM, XDIM>,
    pub feedforward: SVector<f64, UDIM>,
    pub value: SMatrix<f64, XDIM, XDIM>,
    pub value_grad: ValueGradient<XDIM>,
}

/// Solve the damped one-step subproblem at time `t`.
///
/// `a`, `b` are the dynamics Jacobians and `cost` the cost quadratization at
/// the nominal `(x_t, u_t)`; `value_next`/`grad_next` the model at t+1.
///
/// # Errors
///
/// [`SolverError::SingularControlHessian`] when `R + B' (V + mu I) B` is not
/// invertible; a larger `mu` conditions it.
pub fn bellman_backup<const XDIM: usize, const UDIM: usize>(
    t: usize,
    mu: f64,
    a: &SMatrix<f64, XDIM, XDIM>,
    b: &SMatrix<f64, XDIM, UDIM>,
    cost: &CostQuadratic<XDIM, UDIM>,
    value_next: &SMatrix<f64, XDIM, XDIM>,
    grad_next: &ValueGradient<XDIM>,
) -> Result<BackupStep<XDIM, UDIM>, SolverError> {
    // Eigenvalue inflation for the control solve.
    let inflated = value_next + SMatrix::<f64, XDIM, XDIM>::identity() * mu;

    let hessian = cost.r + b.transpose() * inflated * b;
    let Some(hessian_inv) = hessian.try_inverse() else {
        return Err(SolverError::SingularControlHessian { t });
    };
    let neg_inv = -hessian_inv;

    let feedback = neg_inv * (cost.p.transpose() + b.transpose() * inflated * a);
    let feedforward = neg_inv * (cost.grad_u + b.transpose() * grad_next.transpose());

    if !feedback.iter().all(|v| v.is_finite()) || !feedforward.iter().all(|v| v.is_finite()) {
        return Err(SolverError::SingularControlHessian { t });
    }

    // The value propagation uses the raw V_{t+1}, not the inflated matrix:
    // damping conditions the control solve, it must not bias the cost-to-go.
    let closed_loop = a + b * feedback;
    let value = cost.q
        + (cost.p * feedback) * 2.0
        + feedback.transpose() * cost.r * feedback
        + closed_loop.transpose() * value_next * closed_loop;
    let value = symmetrize(&value);

    let value_grad = feedforward.transpose() * cost.p.transpose()
        + feedforward.transpose() * cost.r * feedback
        + cost.grad_x.transpose()
        + cost.grad_u.transpose() * feedback
        + feedforward.transpose() * b.transpose() * value_next * closed_loop
        + grad_next * closed_loop;

    Ok(BackupStep {
        feedback,
        feedforward,
        value,
        value_grad,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

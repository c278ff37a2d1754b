//! Finite-difference linearization and quadratization.
//!
//! The solvers treat these as opaque: any implementation accurate to
//! finite-difference precision works. Central differences are used
//! throughout; step sizes are fixed module constants so results are
//! deterministic across runs.

use nalgebra::{SMatrix, SVector};

use hindsight_core::problem::{Dynamics, RunningCost, TerminalCost};

/// Relative central-difference step for first derivatives (Jacobians,
/// gradients).
const FIRST_ORDER_STEP: f64 = 1e-5;

/// Relative central-difference step for second derivatives (Hessian
/// blocks).
const SECOND_ORDER_STEP: f64 = 1e-4;

/// Per-coordinate step: scaled by the coordinate's magnitude so the
/// difference quotient keeps its relative accuracy far from the origin.
fn step(scale: f64, coordinate: f64) -> f64 {
    scale * (1.0 + coordinate.abs())
}

// ---------------------------------------------------------------------------
// Quadratic cost models
// ---------------------------------------------------------------------------

/// Second-order model of a running cost at one `(x, u, t)`:
/// Hessian blocks `Q = d2c/dx2`, `R = d2c/du2`, `P = d2c/dxdu` and the
/// gradients. `Q` and `R` are symmetric by construction but not necessarily
/// positive semidefinite; the backup's Levenberg-Marquardt term compensates.
#[derive(Debug, Clone, Copy)]
pub struct CostQuadratic<const XDIM: usize, const UDIM: usize> {
    pub q: SMatrix<f64, XDIM, XDIM>,
    pub r: SMatrix<f64, UDIM, UDIM>,
    pub p: SMatrix<f64, XDIM, UDIM>,
    pub grad_x: SVector<f64, XDIM>,
    pub grad_u: SVector<f64, UDIM>,
}

/// Second-order model of a terminal cost at one state.
#[derive(Debug, Clone, Copy)]
pub struct TerminalQuadratic<const XDIM: usize> {
    pub q: SMatrix<f64, XDIM, XDIM>,
    pub grad: SVector<f64, XDIM>,
}

// ---------------------------------------------------------------------------
// Dynamics linearization
// ---------------------------------------------------------------------------

/// Jacobians `A = df/dx` and `B = df/du` at `(x, u)`.
pub fn linearize_dynamics<D, const XDIM: usize, const UDIM: usize>(
    dynamics: &D,
    x: &SVector<f64, XDIM>,
    u: &SVector<f64, UDIM>,
) -> (SMatrix<f64, XDIM, XDIM>, SMatrix<f64, XDIM, UDIM>)
where
    D: Dynamics<XDIM, UDIM> + ?Sized,
{
    let mut a = SMatrix::<f64, XDIM, XDIM>::zeros();
    let mut b = SMatrix::<f64, XDIM, UDIM>::zeros();

    for j in 0..XDIM {
        let h = step(FIRST_ORDER_STEP, x[j]);
        let mut xp = *x;
        let mut xm = *x;
        xp[j] += h;
        xm[j] -= h;
        let column = (dynamics.step(&xp, u) - dynamics.step(&xm, u)) / (2.0 * h);
        a.set_column(j, &column);
    }
    for j in 0..UDIM {
        let h = step(FIRST_ORDER_STEP, u[j]);
        let mut up = *u;
        let mut um = *u;
        up[j] += h;
        um[j] -= h;
        let column = (dynamics.step(x, &up) - dynamics.step(x, &um)) / (2.0 * h);
        b.set_column(j, &column);
    }

    (a, b)
}

// ---------------------------------------------------------------------------
// Cost quadratization
// ---------------------------------------------------------------------------

/// Gradients and symmetric Hessian blocks of the running cost at `(x, u, t)`.
pub fn quadratize_running_cost<C, const XDIM: usize, const UDIM: usize>(
    cost: &C,
    t: usize,
    x: &SVector<f64, XDIM>,
    u: &SVector<f64, UDIM>,
) -> CostQuadratic<XDIM, UDIM>
where
    C: RunningCost<XDIM, UDIM> + ?Sized,
{
    let eval_x = |x: &SVector<f64, XDIM>| cost.cost(x, u, t);
    let eval_u = |u: &SVector<f64, UDIM>| cost.cost(x, u, t);

    let grad_x = gradient(&eval_x, x);
    let grad_u = gradient(&eval_u, u);
    let q = hessian(&eval_x, x);
    let r = hessian(&eval_u, u);

    // Mixed block P[i][j] = d2c / dx_i du_j.
    let mut p = SMatrix::<f64, XDIM, UDIM>::zeros();
    for i in 0..XDIM {
        let hx = step(SECOND_ORDER_STEP, x[i]);
        let mut xp = *x;
        let mut xm = *x;
        xp[i] += hx;
        xm[i] -= hx;
        for j in 0..UDIM {
            let hu = step(SECOND_ORDER_STEP, u[j]);
            let mut up = *u;
            let mut um = *u;
            up[j] += hu;
            um[j] -= hu;
            p[(i, j)] = (cost.cost(&xp, &up, t) - cost.cost(&xp, &um, t)
                - cost.cost(&xm, &up, t)
                + cost.cost(&xm, &um, t))
                / (4.0 * hx * hu);
        }
    }

    CostQuadratic { q, r, p, grad_x, grad_u }
}

/// Gradient and symmetric Hessian of the terminal cost at `x`.
pub fn quadratize_terminal_cost<F, const XDIM: usize>(
    cost: &F,
    x: &SVector<f64, XDIM>,
) -> TerminalQuadratic<XDIM>
where
    F: TerminalCost<XDIM> + ?Sized,
{
    let eval = |x: &SVector<f64, XDIM>| cost.cost(x);
    TerminalQuadratic {
        q: hessian(&eval, x),
        grad: gradient(&eval, x),
    }
}

// ---------------------------------------------------------------------------
// Scalar-field helpers
// ---------------------------------------------------------------------------

fn gradient<F, const N: usize>(f: &F, v: &SVector<f64, N>) -> SVector<f64, N>
where
    F: Fn(&SVector<f64, N>) -> f64,
{
    let mut grad = SVector::<f64, N>::zeros();
    for i in 0..N {
        let h = step(FIRST_ORDER_STEP, v[i]);
        let mut vp = *v;
        let mut vm = *v;
        vp[i] += h;
        vm[i] -= h;
        grad[i] = (f(&vp) - f(&vm)) / (2.0 * h);
    }
    grad
}

/// Symmetric Hessian of a scalar field: second central differences on the
/// diagonal, four-point mixed differences off it (computed once per pair).
fn hessian<F, const N: usize>(f: &F, v: &SVector<f64, N>) -> SMatrix<f64, N, N>
where
    F: Fn(&SVector<f64, N>) -> f64,
{
    let center = f(v);
    let mut hess = SMatrix::<f64, N, N>::zeros();

    for i in 0..N {
        let hi = step(SECOND_ORDER_STEP, v[i]);
        let mut vp = *v;
        let mut vm = *v;
        vp[i] += hi;
        vm[i] -= hi;
        hess[(i, i)] = (f(&vp) - 2.0 * center + f(&vm)) / (hi * hi);

        for j in (i + 1)..N {
            let hj = step(SECOND_ORDER_STEP, v[j]);
            let mut vpp = vp;
            let mut vpm = vp;
            let mut vmp = vm;
            let mut vmm = vm;
            vpp[j] += hj;
            vpm[j] -= hj;
            vmp[j] += hj;
            vmm[j] -= hj;
            let mixed = (f(&vpp) - f(&vpm) - f(&vmp) + f(&vmm)) / (4.0 * hi * hj);
            hess[(i, j)] = mixed;
            hess[(j, i)] = mixed;
        }
    }

    hess
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix2, Vector1, Vector2};

    #[test]
    fn linearize_recovers_linear_dynamics_exactly() {
        let a = Matrix2::new(0.9, 0.1, -0.2, 1.1);
        let b = SMatrix::<f64, 2, 1>::new(0.5, 1.0);
        let dynamics = move |x: &Vector2<f64>, u: &Vector1<f64>| a * x + b * u;

        let (a_est, b_est) =
            linearize_dynamics(&dynamics, &Vector2::new(0.3, -0.7), &Vector1::new(2.0));
        assert_relative_eq!(a_est, a, epsilon = 1e-9);
        assert_relative_eq!(b_est, b, epsilon = 1e-9);
    }

    #[test]
    fn linearize_nonlinear_dynamics() {
        // x' = [x0 * cos(u), x1 + x0^2]
        let dynamics = |x: &Vector2<f64>, u: &Vector1<f64>| {
            Vector2::new(x[0] * u[0].cos(), x[1] + x[0] * x[0])
        };
        let x = Vector2::new(2.0, 1.0);
        let u = Vector1::new(0.5);

        let (a, b) = linearize_dynamics(&dynamics, &x, &u);
        assert_relative_eq!(a[(0, 0)], 0.5_f64.cos(), epsilon = 1e-8);
        assert_relative_eq!(a[(1, 0)], 4.0, epsilon = 1e-8);
        assert_relative_eq!(a[(1, 1)], 1.0, epsilon = 1e-8);
        assert_relative_eq!(b[(0, 0)], -2.0 * 0.5_f64.sin(), epsilon = 1e-8);
    }

    #[test]
    fn quadratize_recovers_quadratic_cost() {
        let q = Matrix2::new(2.0, 0.5, 0.5, 1.0);
        let r = Matrix2::new(3.0, -0.2, -0.2, 0.8);
        let cost = move |x: &Vector2<f64>, u: &Vector2<f64>, _t: usize| {
            0.5 * ((x.transpose() * q * x)[(0, 0)] + (u.transpose() * r * u)[(0, 0)])
        };

        let x = Vector2::new(1.0, -2.0);
        let u = Vector2::new(0.5, 0.25);
        let model = quadratize_running_cost(&cost, 0, &x, &u);

        assert_relative_eq!(model.q, q, epsilon = 1e-5);
        assert_relative_eq!(model.r, r, epsilon = 1e-5);
        assert_relative_eq!(model.p, Matrix2::zeros(), epsilon = 1e-5);
        assert_relative_eq!(model.grad_x, q * x, epsilon = 1e-7);
        assert_relative_eq!(model.grad_u, r * u, epsilon = 1e-7);
    }

    #[test]
    fn quadratize_captures_cross_terms() {
        // c = x0 * u0 has P = [[1]], everything else zero.
        let cost = |x: &Vector1<f64>, u: &Vector1<f64>, _t: usize| x[0] * u[0];
        let model =
            quadratize_running_cost(&cost, 0, &Vector1::new(0.7), &Vector1::new(-0.3));
        assert_relative_eq!(model.p[(0, 0)], 1.0, epsilon = 1e-6);
        assert_relative_eq!(model.q[(0, 0)], 0.0, epsilon = 1e-6);
        assert_relative_eq!(model.r[(0, 0)], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn quadratize_terminal_matches_analytic() {
        let q = Matrix2::new(10.0, 0.0, 0.0, 10.0);
        let goal = Vector2::new(1.0, 2.0);
        let cost = move |x: &Vector2<f64>| {
            let dx = x - goal;
            0.5 * (dx.transpose() * q * dx)[(0, 0)]
        };

        let x = Vector2::new(-1.0, 0.5);
        let model = quadratize_terminal_cost(&cost, &x);
        assert_relative_eq!(model.q, q, epsilon = 1e-4);
        assert_relative_eq!(model.grad, q * (x - goal), epsilon = 1e-6);
    }

    #[test]
    fn hessian_is_symmetric_for_nonsymmetric_field() {
        let f = |v: &Vector2<f64>| v[0].powi(3) * v[1] + (v[1] * 2.0).sin();
        let h = hessian(&f, &Vector2::new(0.4, 0.9));
        assert_relative_eq!(h, h.transpose(), epsilon = 1e-12);
    }
}

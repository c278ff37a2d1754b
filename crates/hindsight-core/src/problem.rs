use nalgebra::{SMatrix, SVector};

// ---------------------------------------------------------------------------
// Dynamics
// ---------------------------------------------------------------------------

/// Discrete-time dynamics `f(x, u) -> x'`.
///
/// Must be deterministic and continuously differentiable at every point the
/// solver evaluates. Control limits, if any, belong inside the
/// implementation; the solvers never clamp.
pub trait Dynamics<const XDIM: usize, const UDIM: usize> {
    /// Propagate the state one step under control `u`.
    fn step(&self, x: &SVector<f64, XDIM>, u: &SVector<f64, UDIM>) -> SVector<f64, XDIM>;
}

impl<F, const XDIM: usize, const UDIM: usize> Dynamics<XDIM, UDIM> for F
where
    F: Fn(&SVector<f64, XDIM>, &SVector<f64, UDIM>) -> SVector<f64, XDIM>,
{
    fn step(&self, x: &SVector<f64, XDIM>, u: &SVector<f64, UDIM>) -> SVector<f64, XDIM> {
        self(x, u)
    }
}

// ---------------------------------------------------------------------------
// RunningCost
// ---------------------------------------------------------------------------

/// Per-step cost `c(x, u, t) -> f64` with a zero-based step index.
pub trait RunningCost<const XDIM: usize, const UDIM: usize> {
    fn cost(&self, x: &SVector<f64, XDIM>, u: &SVector<f64, UDIM>, t: usize) -> f64;
}

impl<F, const XDIM: usize, const UDIM: usize> RunningCost<XDIM, UDIM> for F
where
    F: Fn(&SVector<f64, XDIM>, &SVector<f64, UDIM>, usize) -> f64,
{
    fn cost(&self, x: &SVector<f64, XDIM>, u: &SVector<f64, UDIM>, t: usize) -> f64 {
        self(x, u, t)
    }
}

// ---------------------------------------------------------------------------
// TerminalCost
// ---------------------------------------------------------------------------

/// Cost on the final state, `cT(x) -> f64`.
pub trait TerminalCost<const XDIM: usize> {
    fn cost(&self, x: &SVector<f64, XDIM>) -> f64;
}

impl<F, const XDIM: usize> TerminalCost<XDIM> for F
where
    F: Fn(&SVector<f64, XDIM>) -> f64,
{
    fn cost(&self, x: &SVector<f64, XDIM>) -> f64 {
        self(x)
    }
}

// ---------------------------------------------------------------------------
// Linear-quadratic building blocks
// ---------------------------------------------------------------------------

/// Linear dynamics `x' = A x + B u` as a [`Dynamics`] implementation.
#[derive(Debug, Clone, Copy)]
pub struct LinearDynamics<const XDIM: usize, const UDIM: usize> {
    pub a: SMatrix<f64, XDIM, XDIM>,
    pub b: SMatrix<f64, XDIM, UDIM>,
}

impl<const XDIM: usize, const UDIM: usize> LinearDynamics<XDIM, UDIM> {
    pub const fn new(a: SMatrix<f64, XDIM, XDIM>, b: SMatrix<f64, XDIM, UDIM>) -> Self {
        Self { a, b }
    }
}

impl<const XDIM: usize, const UDIM: usize> Dynamics<XDIM, UDIM> for LinearDynamics<XDIM, UDIM> {
    fn step(&self, x: &SVector<f64, XDIM>, u: &SVector<f64, UDIM>) -> SVector<f64, XDIM> {
        self.a * x + self.b * u
    }
}

/// Time-invariant quadratic cost `0.5 (x' Q x + u' R u)`.
///
/// Serves as both the running and the terminal cost (the control term is
/// ignored for the latter), which is exactly what the LQR regression
/// problems need.
#[derive(Debug, Clone, Copy)]
pub struct QuadraticCost<const XDIM: usize, const UDIM: usize> {
    pub q: SMatrix<f64, XDIM, XDIM>,
    pub r: SMatrix<f64, UDIM, UDIM>,
}

impl<const XDIM: usize, const UDIM: usize> QuadraticCost<XDIM, UDIM> {
    pub const fn new(q: SMatrix<f64, XDIM, XDIM>, r: SMatrix<f64, UDIM, UDIM>) -> Self {
        Self { q, r }
    }
}

impl<const XDIM: usize, const UDIM: usize> RunningCost<XDIM, UDIM>
    for QuadraticCost<XDIM, UDIM>
{
    fn cost(&self, x: &SVector<f64, XDIM>, u: &SVector<f64, UDIM>, _t: usize) -> f64 {
        0.5 * ((x.transpose() * self.q * x)[(0, 0)] + (u.transpose() * self.r * u)[(0, 0)])
    }
}

/// A terminal cost that is identically zero.
///
/// The LQR regression problems charge only running cost over the horizon.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroTerminalCost;

impl<const XDIM: usize> TerminalCost<XDIM> for ZeroTerminalCost {
    fn cost(&self, _x: &SVector<f64, XDIM>) -> f64 {
        0.0
    }
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
    fn closures_implement_the_traits() {
        let dynamics = |x: &Vector2<f64>, u: &Vector1<f64>| x + Vector2::new(u[0], 0.0);
        let running = |x: &Vector2<f64>, _u: &Vector1<f64>, t: usize| x.norm() + t as f64;
        let terminal = |x: &Vector2<f64>| x.norm_squared();

        let x = Vector2::new(1.0, 2.0);
        let u = Vector1::new(0.5);
        assert_relative_eq!(
            Dynamics::step(&dynamics, &x, &u),
            Vector2::new(1.5, 2.0),
            epsilon = 1e-12
        );
        assert_relative_eq!(
            RunningCost::cost(&running, &x, &u, 3),
            x.norm() + 3.0,
            epsilon = 1e-12
        );
        assert_relative_eq!(TerminalCost::cost(&terminal, &x), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn linear_dynamics_step() {
        let dyn_ = LinearDynamics::new(
            Matrix2::new(1.0, 0.1, 0.0, 1.0),
            SMatrix::<f64, 2, 1>::new(0.0, 0.1),
        );
        let next = dyn_.step(&Vector2::new(1.0, 2.0), &Vector1::new(3.0));
        assert_relative_eq!(next, Vector2::new(1.2, 2.3), epsilon = 1e-12);
    }

    #[test]
    fn quadratic_cost_matches_closed_form() {
        let cost = QuadraticCost::new(Matrix2::identity(), SMatrix::<f64, 1, 1>::new(2.0));
        let c = cost.cost(&Vector2::new(3.0, 4.0), &Vector1::new(2.0), 0);
        // 0.5 * (9 + 16) + 0.5 * 2 * 4
        assert_relative_eq!(c, 16.5, epsilon = 1e-12);
    }

    #[test]
    fn zero_terminal_cost_is_zero() {
        let c: f64 = TerminalCost::<2>::cost(&ZeroTerminalCost, &Vector2::new(5.0, -5.0));
        assert_eq!(c, 0.0);
    }
}

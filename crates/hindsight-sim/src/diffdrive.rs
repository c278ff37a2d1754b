//! Differential-drive (unicycle) kinematics.

use nalgebra::{SVector, Vector2, Vector3};

use hindsight_core::problem::Dynamics;

/// State layout: `[x, y, theta]`.
pub const STATE_DIM: usize = 3;
/// Control layout: `[v, omega]`, forward and angular velocity.
pub const CONTROL_DIM: usize = 2;

pub const POS_X: usize = 0;
pub const POS_Y: usize = 1;
pub const THETA: usize = 2;

/// Differential-drive robot integrated with RK4 over a fixed timestep.
///
/// Control limits are clamped here, inside the dynamics: the solvers never
/// clamp, so saturation is part of the model they linearize.
#[derive(Debug, Clone)]
pub struct DiffDrive {
    dt: f64,
    /// `[min, max]` applied to both control components.
    control_limits: [f64; 2],
}

impl DiffDrive {
    /// A drive with the given integration timestep and no effective control
    /// limits.
    pub const fn new(dt: f64) -> Self {
        Self {
            dt,
            control_limits: [f64::NEG_INFINITY, f64::INFINITY],
        }
    }

    /// Clamp both control components to `[min, max]`.
    #[must_use]
    pub const fn with_control_limits(mut self, limits: [f64; 2]) -> Self {
        self.control_limits = limits;
        self
    }

    pub const fn dt(&self) -> f64 {
        self.dt
    }

    fn clamp(&self, u: &Vector2<f64>) -> Vector2<f64> {
        Vector2::new(
            u[0].clamp(self.control_limits[0], self.control_limits[1]),
            u[1].clamp(self.control_limits[0], self.control_limits[1]),
        )
    }
}

/// Unicycle velocity field: `xdot = v cos(theta), ydot = v sin(theta),
/// thetadot = omega`.
fn derivative(x: &Vector3<f64>, u: &Vector2<f64>) -> Vector3<f64> {
    Vector3::new(u[0] * x[THETA].cos(), u[0] * x[THETA].sin(), u[1])
}

impl Dynamics<STATE_DIM, CONTROL_DIM> for DiffDrive {
    fn step(
        &self,
        x: &SVector<f64, STATE_DIM>,
        u: &SVector<f64, CONTROL_DIM>,
    ) -> SVector<f64, STATE_DIM> {
        let u = self.clamp(u);
        rk4_step(x, &u, self.dt, derivative)
    }
}

/// One classical Runge-Kutta step of `xdot = f(x, u)` with `u` held
/// constant.
pub(crate) fn rk4_step<const XDIM: usize, const UDIM: usize>(
    x: &SVector<f64, XDIM>,
    u: &SVector<f64, UDIM>,
    dt: f64,
    f: impl Fn(&SVector<f64, XDIM>, &SVector<f64, UDIM>) -> SVector<f64, XDIM>,
) -> SVector<f64, XDIM> {
    let k1 = f(x, u);
    let k2 = f(&(x + k1 * (dt / 2.0)), u);
    let k3 = f(&(x + k2 * (dt / 2.0)), u);
    let k4 = f(&(x + k3 * dt), u);
    x + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (dt / 6.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn drives_straight_along_heading() {
        let drive = DiffDrive::new(0.1);
        let x0 = Vector3::new(0.0, 0.0, FRAC_PI_2);
        let x1 = drive.step(&x0, &Vector2::new(1.0, 0.0));

        // Heading +y at unit speed for 0.1 s.
        assert_relative_eq!(x1[POS_X], 0.0, epsilon = 1e-12);
        assert_relative_eq!(x1[POS_Y], 0.1, epsilon = 1e-12);
        assert_relative_eq!(x1[THETA], FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn pure_rotation_keeps_position() {
        let drive = DiffDrive::new(0.5);
        let x0 = Vector3::new(1.0, 2.0, 0.0);
        let x1 = drive.step(&x0, &Vector2::new(0.0, 1.0));

        assert_relative_eq!(x1[POS_X], 1.0, epsilon = 1e-12);
        assert_relative_eq!(x1[POS_Y], 2.0, epsilon = 1e-12);
        assert_relative_eq!(x1[THETA], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn constant_turn_traces_a_circle() {
        // v = omega = 1: unit-radius circle, closed after 2*pi seconds.
        let steps = 200;
        let dt = 2.0 * PI / steps as f64;
        let drive = DiffDrive::new(dt);
        let mut x = Vector3::new(0.0, 0.0, 0.0);
        let u = Vector2::new(1.0, 1.0);
        for _ in 0..steps {
            x = drive.step(&x, &u);
        }
        assert_relative_eq!(x[POS_X], 0.0, epsilon = 1e-3);
        assert_relative_eq!(x[POS_Y], 0.0, epsilon = 1e-3);
        assert_relative_eq!(x[THETA], 2.0 * PI, epsilon = 1e-9);
    }

    #[test]
    fn control_limits_saturate() {
        let drive = DiffDrive::new(0.1).with_control_limits([-5.0, 5.0]);
        let x0 = Vector3::new(0.0, 0.0, 0.0);
        let capped = drive.step(&x0, &Vector2::new(100.0, 0.0));
        let at_limit = drive.step(&x0, &Vector2::new(5.0, 0.0));
        assert_relative_eq!(capped, at_limit, epsilon = 1e-12);
    }
}

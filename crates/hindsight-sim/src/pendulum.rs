//! Torque-actuated pendulum.

use nalgebra::{SVector, Vector1, Vector2};

use hindsight_core::problem::Dynamics;

use crate::diffdrive::rk4_step;

/// State layout: `[theta, thetadot]`, with `theta = 0` hanging down.
pub const STATE_DIM: usize = 2;
/// Control layout: `[torque]`.
pub const CONTROL_DIM: usize = 1;

/// Pendulum with viscous damping, integrated with RK4.
///
/// `thetadotdot = (u - m g l sin(theta) - damping thetadot) / (m l^2)`
#[derive(Debug, Clone)]
pub struct Pendulum {
    dt: f64,
    mass: f64,
    length: f64,
    damping: f64,
    gravity: f64,
}

impl Pendulum {
    /// Unit mass and length, light damping, standard gravity.
    pub const fn new(dt: f64) -> Self {
        Self {
            dt,
            mass: 1.0,
            length: 1.0,
            damping: 0.1,
            gravity: 9.81,
        }
    }

    #[must_use]
    pub const fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    #[must_use]
    pub const fn with_length(mut self, length: f64) -> Self {
        self.length = length;
        self
    }

    #[must_use]
    pub const fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    pub const fn dt(&self) -> f64 {
        self.dt
    }

    fn derivative(&self, x: &Vector2<f64>, u: &Vector1<f64>) -> Vector2<f64> {
        let inertia = self.mass * self.length * self.length;
        let torque_gravity = self.mass * self.gravity * self.length * x[0].sin();
        Vector2::new(x[1], (u[0] - torque_gravity - self.damping * x[1]) / inertia)
    }
}

impl Dynamics<STATE_DIM, CONTROL_DIM> for Pendulum {
    fn step(
        &self,
        x: &SVector<f64, STATE_DIM>,
        u: &SVector<f64, CONTROL_DIM>,
    ) -> SVector<f64, STATE_DIM> {
        rk4_step(x, u, self.dt, |x, u| self.derivative(x, u))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

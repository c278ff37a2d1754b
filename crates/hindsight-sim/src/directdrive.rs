//! Direct velocity control of a planar point.

use nalgebra::{SVector, Vector2};

use hindsight_core::problem::Dynamics;

/// State layout: `[x, y]`.
pub const STATE_DIM: usize = 2;
/// Control layout: `[vx, vy]`, the commanded velocity.
pub const CONTROL_DIM: usize = 2;

/// A point robot whose velocity is commanded directly: `x' = x + dt u`.
///
/// The simplest member of the simulator family; its dynamics are exactly
/// linear, which makes it a convenient sanity target for the solvers.
#[derive(Debug, Clone)]
pub struct DirectDrive {
    dt: f64,
    control_limits: [f64; 2],
}

impl DirectDrive {
    pub const fn new(dt: f64) -> Self {
        Self {
            dt,
            control_limits: [f64::NEG_INFINITY, f64::INFINITY],
        }
    }

    /// Clamp both velocity components to `[min, max]`.
    #[must_use]
    pub const fn with_control_limits(mut self, limits: [f64; 2]) -> Self {
        self.control_limits = limits;
        self
    }

    pub const fn dt(&self) -> f64 {
        self.dt
    }
}

impl Dynamics<STATE_DIM, CONTROL_DIM> for DirectDrive {
    fn step(
        &self,
        x: &SVector<f64, STATE_DIM>,
        u: &SVector<f64, CONTROL_DIM>,
    ) -> SVector<f64, STATE_DIM> {
        let u = Vector2::new(
            u[0].clamp(self.control_limits[0], self.control_limits[1]),
            u[1].clamp(self.control_limits[0], self.control_limits[1]),
        );
        x + u * self.dt
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn integrates_commanded_velocity() {
        let drive = DirectDrive::new(0.25);
        let x1 = drive.step(&Vector2::new(1.0, -1.0), &Vector2::new(2.0, 4.0));
        assert_relative_eq!(x1, Vector2::new(1.5, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn saturates_at_limits() {
        let drive = DirectDrive::new(1.0).with_control_limits([-1.0, 1.0]);
        let x1 = drive.step(&Vector2::zeros(), &Vector2::new(10.0, -10.0));
        assert_relative_eq!(x1, Vector2::new(1.0, -1.0), epsilon = 1e-12);
    }
}

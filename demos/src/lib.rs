//! Shared scenario configuration for the demo binaries.

use nalgebra::{Matrix2, Matrix3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

use hindsight_core::options::SolveOptions;
use hindsight_sim::{CircleWorld, ObstaclePenalty};

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_dt() -> f64 {
    1.0 / 6.0
}
const fn default_horizon() -> usize {
    150
}
const fn default_x0() -> [f64; 3] {
    [0.0, -25.0, std::f64::consts::PI]
}
const fn default_goal() -> [f64; 3] {
    [0.0, 25.0, std::f64::consts::PI]
}
const fn default_u_nominal() -> [f64; 2] {
    [2.5, 1.5]
}
const fn default_q_position() -> f64 {
    1e-3
}
const fn default_q_heading() -> f64 {
    0.1
}
const fn default_q_terminal() -> f64 {
    10.0
}
const fn default_r_control() -> f64 {
    0.1
}
const fn default_control_limits() -> [f64; 2] {
    [-5.0, 5.0]
}
const fn default_world_bounds() -> [f64; 4] {
    [-30.0, 30.0, -30.0, 30.0]
}

// ---------------------------------------------------------------------------
// DiffDriveScenario
// ---------------------------------------------------------------------------

/// The diff-drive goal-reaching experiment, loadable from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffDriveScenario {
    /// Integration timestep in seconds.
    #[serde(default = "default_dt")]
    pub dt: f64,

    /// Number of control steps.
    #[serde(default = "default_horizon")]
    pub horizon: usize,

    /// Start pose `[x, y, theta]`.
    #[serde(default = "default_x0")]
    pub x0: [f64; 3],

    /// Goal pose `[x, y, theta]`.
    #[serde(default = "default_goal")]
    pub goal: [f64; 3],

    /// Nominal control `[v, omega]` the cost pulls toward.
    #[serde(default = "default_u_nominal")]
    pub u_nominal: [f64; 2],

    /// Running position weight (x and y).
    #[serde(default = "default_q_position")]
    pub q_position: f64,

    /// Running heading weight.
    #[serde(default = "default_q_heading")]
    pub q_heading: f64,

    /// Terminal weight on all three state components.
    #[serde(default = "default_q_terminal")]
    pub q_terminal: f64,

    /// Control deviation weight.
    #[serde(default = "default_r_control")]
    pub r_control: f64,

    /// Saturation applied inside the dynamics.
    #[serde(default = "default_control_limits")]
    pub control_limits: [f64; 2],

    /// World bounding box `[xmin, xmax, ymin, ymax]`.
    #[serde(default = "default_world_bounds")]
    pub world_bounds: [f64; 4],

    /// Soft collision penalty (off by default, like the reference cost).
    #[serde(default)]
    pub penalty: ObstaclePenalty,

    /// Solver parameters.
    #[serde(default)]
    pub solve: SolveOptions,
}

impl Default for DiffDriveScenario {
    fn default() -> Self {
        Self {
            dt: default_dt(),
            horizon: default_horizon(),
            x0: default_x0(),
            goal: default_goal(),
            u_nominal: default_u_nominal(),
            q_position: default_q_position(),
            q_heading: default_q_heading(),
            q_terminal: default_q_terminal(),
            r_control: default_r_control(),
            control_limits: default_control_limits(),
            world_bounds: default_world_bounds(),
            penalty: ObstaclePenalty::default(),
            solve: SolveOptions::default()
                .with_max_iters(300)
                .with_cost_convg_ratio(1e-4)
                .with_verbose(true),
        }
    }
}

impl DiffDriveScenario {
    /// Parse a scenario from TOML; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns the TOML parse error.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn x0(&self) -> Vector3<f64> {
        Vector3::from(self.x0)
    }

    pub fn goal(&self) -> Vector3<f64> {
        Vector3::from(self.goal)
    }

    pub fn u_nominal(&self) -> Vector2<f64> {
        Vector2::from(self.u_nominal)
    }

    /// Running state weight matrix.
    pub fn q(&self) -> Matrix3<f64> {
        let mut q = Matrix3::identity() * self.q_position;
        q[(2, 2)] = self.q_heading;
        q
    }

    /// Terminal state weight matrix.
    pub fn q_terminal(&self) -> Matrix3<f64> {
        Matrix3::identity() * self.q_terminal
    }

    /// Control deviation weight matrix.
    pub fn r(&self) -> Matrix2<f64> {
        Matrix2::identity() * self.r_control
    }

    /// The empty world for this scenario's bounds.
    pub fn world(&self) -> CircleWorld {
        let [xmin, xmax, ymin, ymax] = self.world_bounds;
        CircleWorld::new(xmin, xmax, ymin, ymax)
    }

    /// Running cost closure: quadratic pull to the goal and nominal control
    /// plus the (usually disabled) obstacle penalty.
    pub fn running_cost(
        &self,
        world: CircleWorld,
    ) -> impl Fn(&Vector3<f64>, &Vector2<f64>, usize) -> f64 + use<> {
        let q = self.q();
        let r = self.r();
        let goal = self.goal();
        let u_nominal = self.u_nominal();
        let penalty = self.penalty;
        move |x, u, _t| {
            let dx = x - goal;
            let du = u - u_nominal;
            let quadratic =
                0.5 * ((dx.transpose() * q * dx)[(0, 0)] + (du.transpose() * r * du)[(0, 0)]);
            quadratic + penalty.cost(&world, &Vector2::new(x[0], x[1]))
        }
    }

    /// Terminal cost closure.
    pub fn terminal_cost(&self) -> impl Fn(&Vector3<f64>) -> f64 + use<> {
        let q_terminal = self.q_terminal();
        let goal = self.goal();
        move |x| {
            let dx = x - goal;
            0.5 * (dx.transpose() * q_terminal * dx)[(0, 0)]
        }
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
    fn empty_toml_gives_defaults() {
        let scenario = DiffDriveScenario::from_toml_str("").unwrap();
        assert_eq!(scenario, DiffDriveScenario::default());
    }

    #[test]
    fn toml_overrides_selected_fields() {
        let scenario = DiffDriveScenario::from_toml_str(
            "horizon = 50\nq_heading = 0.5\n\n[solve]\nmax_iters = 10\n",
        )
        .unwrap();
        assert_eq!(scenario.horizon, 50);
        assert_relative_eq!(scenario.q_heading, 0.5);
        assert_eq!(scenario.solve.max_iters, 10);
        // Untouched fields keep their defaults.
        assert_relative_eq!(scenario.dt, 1.0 / 6.0);
    }

    #[test]
    fn cost_closures_match_config() {
        let scenario = DiffDriveScenario::default();
        let running = scenario.running_cost(scenario.world());
        let terminal = scenario.terminal_cost();

        // At the goal with nominal control both costs vanish.
        assert_relative_eq!(
            running(&scenario.goal(), &scenario.u_nominal(), 0),
            0.0,
            epsilon = 1e-12
        );
        assert_relative_eq!(terminal(&scenario.goal()), 0.0, epsilon = 1e-12);

        // One unit of heading error costs q_heading / 2.
        let mut x = scenario.goal();
        x[2] += 1.0;
        assert_relative_eq!(
            running(&x, &scenario.u_nominal(), 0),
            scenario.q_heading / 2.0,
            epsilon = 1e-12
        );
    }
}

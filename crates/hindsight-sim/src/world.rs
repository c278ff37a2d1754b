//! Planar world with a rectangular boundary and circular obstacles.

use std::fmt;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Circle
// ---------------------------------------------------------------------------

/// A circular obstacle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub radius: f64,
    pub center: [f64; 2],
}

impl Circle {
    pub const fn new(radius: f64, center: [f64; 2]) -> Self {
        Self { radius, center }
    }

    /// Signed distance from `position` to the obstacle surface (negative
    /// inside).
    pub fn distance(&self, position: &Vector2<f64>) -> f64 {
        (position - Vector2::new(self.center[0], self.center[1])).norm() - self.radius
    }
}

// ---------------------------------------------------------------------------
// CircleWorld
// ---------------------------------------------------------------------------

/// Axis-aligned bounding box plus obstacles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircleWorld {
    /// `[xmin, xmax, ymin, ymax]`.
    dimensions: [f64; 4],
    obstacles: Vec<Circle>,
}

impl CircleWorld {
    pub const fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Self {
        Self {
            dimensions: [xmin, xmax, ymin, ymax],
            obstacles: Vec::new(),
        }
    }

    pub fn add_obstacle(&mut self, radius: f64, center: Vector2<f64>) {
        self.obstacles.push(Circle::new(radius, [center[0], center[1]]));
    }

    /// `[xmin, xmax, ymin, ymax]`.
    pub const fn dimensions(&self) -> [f64; 4] {
        self.dimensions
    }

    pub fn obstacles(&self) -> &[Circle] {
        &self.obstacles
    }

    /// Distance from `position` to the nearest wall, reduced by
    /// `robot_radius` (negative when the robot overlaps the boundary).
    pub fn boundary_distance(&self, position: &Vector2<f64>, robot_radius: f64) -> f64 {
        let [xmin, xmax, ymin, ymax] = self.dimensions;
        let walls = [
            position[0] - xmin,
            xmax - position[0],
            position[1] - ymin,
            ymax - position[1],
        ];
        walls.into_iter().fold(f64::INFINITY, f64::min) - robot_radius
    }
}

/// Text form consumed by the plotting scripts: bounding box on line 1, then
/// one obstacle per line as `radius x y`.
impl fmt::Display for CircleWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [xmin, xmax, ymin, ymax] = self.dimensions;
        writeln!(f, "{xmin} {xmax} {ymin} {ymax}")?;
        for obstacle in &self.obstacles {
            writeln!(
                f,
                "{} {} {}",
                obstacle.radius, obstacle.center[0], obstacle.center[1]
            )?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ObstaclePenalty
// ---------------------------------------------------------------------------

const fn default_obstacle_factor() -> f64 {
    10.0
}
const fn default_scale_factor() -> f64 {
    0.1
}
const fn default_robot_radius() -> f64 {
    // iRobot Create diameter / 2.
    3.35 / 2.0
}

/// Exponential proximity penalty on walls and obstacles.
///
/// Disabled by default: the reference diff-drive cost keeps the term
/// switched off, but the solvers accept it as part of any running cost when
/// a scenario wants soft collision avoidance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObstaclePenalty {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_obstacle_factor")]
    pub obstacle_factor: f64,
    #[serde(default = "default_scale_factor")]
    pub scale_factor: f64,
    #[serde(default = "default_robot_radius")]
    pub robot_radius: f64,
}

impl Default for ObstaclePenalty {
    fn default() -> Self {
        Self {
            enabled: false,
            obstacle_factor: default_obstacle_factor(),
            scale_factor: default_scale_factor(),
            robot_radius: default_robot_radius(),
        }
    }
}

impl ObstaclePenalty {
    #[must_use]
    pub const fn enabled(mut self) -> Self {
        self.enabled = true;
        self
    }

    /// Penalty at `position`: `factor * exp(-scale * distance)` summed over
    /// the four walls and every obstacle. Zero when disabled.
    pub fn cost(&self, world: &CircleWorld, position: &Vector2<f64>) -> f64 {
        if !self.enabled {
            return 0.0;
        }

        let [xmin, xmax, ymin, ymax] = world.dimensions();
        let wall_distances = [
            position[0] - xmin,
            xmax - position[0],
            position[1] - ymin,
            ymax - position[1],
        ];

        let mut cost = 0.0;
        for wall in wall_distances {
            let dist = wall - self.robot_radius;
            cost += self.obstacle_factor * (-self.scale_factor * dist).exp();
        }
        for obstacle in world.obstacles() {
            let dist = obstacle.distance(position) - self.robot_radius;
            cost += self.obstacle_factor * (-self.scale_factor * dist).exp();
        }
        cost
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

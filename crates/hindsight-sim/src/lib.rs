//! Example plants for the hindsight trajectory optimizers.
//!
//! Each simulator implements the
//! [`Dynamics`](hindsight_core::problem::Dynamics) callback contract:
//! fixed-timestep discrete dynamics with control saturation handled inside
//! the model, so the solvers see a smooth (clamped) system and never clamp
//! themselves.

pub mod diffdrive;
pub mod directdrive;
pub mod pendulum;
pub mod world;

pub use diffdrive::DiffDrive;
pub use directdrive::DirectDrive;
pub use pendulum::Pendulum;
pub use world::{Circle, CircleWorld, ObstaclePenalty};

//! Shared fixtures for the hindsight test suites: seeded RNG and random
//! linear-quadratic problem generation.

pub mod problems;
pub mod rng;

pub use problems::{random_matrix, random_psd, random_vector, RandomLqProblem};
pub use rng::seeded_rng;

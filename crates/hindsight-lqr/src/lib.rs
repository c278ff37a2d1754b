//! Exact finite-horizon LQR.
//!
//! [`FiniteHorizonLqr`] is the closed-form Riccati baseline the iterative
//! solvers are regression-tested against; [`LqrTree`] generalizes the same
//! backup over a probabilistic tree of linear-quadratic plan nodes.

pub mod riccati;
pub mod tree;

pub use riccati::{FiniteHorizonLqr, LqrRollout};
pub use tree::{LqrTree, PlanNode, PlanNodeSpec, TreeError};

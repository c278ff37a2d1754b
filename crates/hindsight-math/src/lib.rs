//! Dense small-matrix helpers and finite-difference models for the
//! hindsight solvers.
//!
//! Pure numerics with no solver state: approximate equality, defensive
//! symmetrization, PSD checks, and the central-difference linearization /
//! quadratization the iLQR backward pass consumes.

pub mod matrix;
pub mod numdiff;

pub use matrix::{is_equal, is_symmetric_psd, symmetrize, EQUALITY_EPS};
pub use numdiff::{
    linearize_dynamics, quadratize_running_cost, quadratize_terminal_cost, CostQuadratic,
    TerminalQuadratic,
};

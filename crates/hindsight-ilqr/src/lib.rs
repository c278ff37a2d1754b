//! Iterative LQR solvers for discrete-time, finite-horizon optimal control.
//!
//! Two solvers share one backward-pass core:
//!
//! - [`IlqrSolver`]: classic iLQR on a single dynamics/cost chain, with a
//!   backtracking line search over the feed-forward scale and
//!   Levenberg-Marquardt damping in the control subproblem.
//! - [`HindsightSolver`]: the multi-branch generalization that optimizes a
//!   probability-weighted trajectory ensemble under a shared first-stage
//!   control.
//!
//! Both leave the caller with a nominal trajectory and time-varying affine
//! policies `u_t = K_t (x - xhat_t) + k_t + uhat_t` that locally stabilize
//! it.

pub mod backup;
pub mod hindsight;
pub mod solver;

pub use backup::{bellman_backup, BackupStep, ValueGradient};
pub use hindsight::{Branch, HindsightSolver};
pub use solver::{IlqrSolver, Rollout};

pub mod prelude {
    pub use crate::backup::{bellman_backup, BackupStep};
    pub use crate::hindsight::{Branch, HindsightSolver};
    pub use crate::solver::{IlqrSolver, Rollout};
    pub use hindsight_core::prelude::*;
}

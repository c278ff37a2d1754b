use serde::{Deserialize, Serialize};

use crate::error::OptionsError;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_mu() -> f64 {
    0.0
}
const fn default_max_iters() -> usize {
    100
}
const fn default_cost_convg_ratio() -> f64 {
    1e-4
}
const fn default_start_alpha() -> f64 {
    1.0
}
const fn default_max_line_search_steps() -> u32 {
    50
}

// ---------------------------------------------------------------------------
// SolveOptions
// ---------------------------------------------------------------------------

/// Parameters for one `solve()` call.
///
/// The defaults match the diff-drive experiment: no Levenberg-Marquardt
/// damping, full initial step, convergence once the relative cost change
/// drops below `1e-4`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveOptions {
    /// Levenberg-Marquardt regularizer added to the next-step value matrix
    /// inside the control subproblem (default: 0).
    #[serde(default = "default_mu")]
    pub mu: f64,

    /// Maximum outer (backward + forward) iterations (default: 100).
    #[serde(default = "default_max_iters")]
    pub max_iters: usize,

    /// Relative cost-change threshold for convergence (default: 1e-4).
    #[serde(default = "default_cost_convg_ratio")]
    pub cost_convg_ratio: f64,

    /// Initial line-search step size alpha (default: 1.0).
    #[serde(default = "default_start_alpha")]
    pub start_alpha: f64,

    /// Safety cap on step-size halvings within one line search (default: 50).
    /// Unreachable for well-posed problems.
    #[serde(default = "default_max_line_search_steps")]
    pub max_line_search_steps: u32,

    /// Log per-iteration diagnostics through `tracing`.
    #[serde(default)]
    pub verbose: bool,

    /// Reuse the trajectory and gains from a previous solve instead of
    /// reinitializing.
    #[serde(default)]
    pub warm_start: bool,

    /// On warm start, drop this many leading steps from the stored
    /// trajectory and gains before reuse.
    #[serde(default)]
    pub t_offset: usize,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            mu: default_mu(),
            max_iters: default_max_iters(),
            cost_convg_ratio: default_cost_convg_ratio(),
            start_alpha: default_start_alpha(),
            max_line_search_steps: default_max_line_search_steps(),
            verbose: false,
            warm_start: false,
            t_offset: 0,
        }
    }
}

impl SolveOptions {
    /// Set the Levenberg-Marquardt parameter.
    #[must_use]
    pub const fn with_mu(mut self, mu: f64) -> Self {
        self.mu = mu;
        self
    }

    /// Set the outer-iteration cap.
    #[must_use]
    pub const fn with_max_iters(mut self, max_iters: usize) -> Self {
        self.max_iters = max_iters;
        self
    }

    /// Set the relative cost-change convergence threshold.
    #[must_use]
    pub const fn with_cost_convg_ratio(mut self, ratio: f64) -> Self {
        self.cost_convg_ratio = ratio;
        self
    }

    /// Set the initial line-search step size.
    #[must_use]
    pub const fn with_start_alpha(mut self, alpha: f64) -> Self {
        self.start_alpha = alpha;
        self
    }

    /// Enable per-iteration logging.
    #[must_use]
    pub const fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Warm-start from the state of a previous solve, dropping the first
    /// `t_offset` steps.
    #[must_use]
    pub const fn with_warm_start(mut self, t_offset: usize) -> Self {
        self.warm_start = true;
        self.t_offset = t_offset;
        self
    }

    /// Validate parameter ranges. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.mu < 0.0 {
            return Err(OptionsError::NegativeMu(self.mu));
        }
        if self.max_iters == 0 {
            return Err(OptionsError::ZeroMaxIters);
        }
        if self.cost_convg_ratio <= 0.0 {
            return Err(OptionsError::NonPositiveConvergenceRatio(
                self.cost_convg_ratio,
            ));
        }
        if self.start_alpha <= 0.0 {
            return Err(OptionsError::NonPositiveStartAlpha(self.start_alpha));
        }
        if self.max_line_search_steps == 0 {
            return Err(OptionsError::ZeroLineSearchSteps);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

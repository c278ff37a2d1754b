use thiserror::Error;

/// Top-level error type for the hindsight workspace.
#[derive(Debug, Error)]
pub enum HindsightError {
    #[error("Options error: {0}")]
    Options(#[from] OptionsError),

    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),
}

/// Solver-parameter validation errors.
///
/// Raised by [`SolveOptions::validate`](crate::options::SolveOptions::validate)
/// before any iteration runs.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum OptionsError {
    #[error("mu must be >= 0, got {0}")]
    NegativeMu(f64),

    #[error("max_iters must be > 0")]
    ZeroMaxIters,

    #[error("cost_convg_ratio must be > 0, got {0}")]
    NonPositiveConvergenceRatio(f64),

    #[error("start_alpha must be > 0, got {0}")]
    NonPositiveStartAlpha(f64),

    #[error("max_line_search_steps must be > 0")]
    ZeroLineSearchSteps,
}

/// Runtime errors from the iLQR solvers.
///
/// Precondition variants are raised at the `solve()` boundary before the
/// first iteration; the numeric variants abort the current solve and leave
/// the nominal trajectory in its last accepted state.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SolverError {
    #[error("Horizon too short: T={0} (must be >= 2)")]
    HorizonTooShort(usize),

    #[error("Singular control Hessian at t={t}; retry with a larger mu")]
    SingularControlHessian { t: usize },

    #[error("Non-finite cost or state in forward pass at t={t}")]
    NonFiniteCost { t: usize },

    #[error("Line search stalled after {halvings} step-size halvings")]
    LineSearchFailed { halvings: u32 },

    #[error("Warm start has {have} steps, need more than t_offset={t_offset}")]
    WarmStartTooShort { have: usize, t_offset: usize },

    #[error("Warm start has {have} steps after the offset, horizon needs {expected}")]
    WarmStartMismatch { have: usize, expected: usize },

    #[error("Branch set is empty")]
    NoBranches,

    #[error("Branch probability {0} is outside [0, 1]")]
    BranchProbabilityOutOfRange(f64),

    #[error("Branch probabilities sum to {0}, expected 1")]
    BranchProbabilitySum(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hindsight_error_from_options_error() {
        let err = OptionsError::NegativeMu(-0.5);
        let top: HindsightError = err.into();
        assert!(matches!(top, HindsightError::Options(_)));
        assert!(top.to_string().contains("-0.5"));
    }

    #[test]
    fn hindsight_error_from_solver_error() {
        let err = SolverError::SingularControlHessian { t: 7 };
        let top: HindsightError = err.into();
        assert!(matches!(top, HindsightError::Solver(_)));
        assert!(top.to_string().contains("t=7"));
    }

    #[test]
    fn solver_error_is_copy() {
        let err = SolverError::NoBranches;
        let err2 = err; // Copy
        assert_eq!(err, err2);
    }

    #[test]
    fn options_error_display_messages() {
        assert_eq!(
            OptionsError::NegativeMu(-1.0).to_string(),
            "mu must be >= 0, got -1"
        );
        assert_eq!(OptionsError::ZeroMaxIters.to_string(), "max_iters must be > 0");
        assert_eq!(
            OptionsError::NonPositiveConvergenceRatio(0.0).to_string(),
            "cost_convg_ratio must be > 0, got 0"
        );
        assert_eq!(
            OptionsError::NonPositiveStartAlpha(-2.0).to_string(),
            "start_alpha must be > 0, got -2"
        );
    }

    #[test]
    fn solver_error_display_messages() {
        assert_eq!(
            SolverError::HorizonTooShort(1).to_string(),
            "Horizon too short: T=1 (must be >= 2)"
        );
        assert_eq!(
            SolverError::LineSearchFailed { halvings: 50 }.to_string(),
            "Line search stalled after 50 step-size halvings"
        );
        assert_eq!(
            SolverError::WarmStartMismatch { have: 10, expected: 12 }.to_string(),
            "Warm start has 10 steps after the offset, horizon needs 12"
        );
        assert_eq!(
            SolverError::BranchProbabilitySum(0.8).to_string(),
            "Branch probabilities sum to 0.8, expected 1"
        );
    }
}

// ---------------------------------------------------------------------------
// SolveReport
// ---------------------------------------------------------------------------

/// Outcome of a `solve()` call.
///
/// An exhausted iteration budget is not an error: the solver keeps its best
/// trajectory and reports `converged = false` so the caller can decide
/// whether to continue with a warm start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveReport {
    /// Zero-based index of the iteration at which convergence was detected,
    /// or `max_iters` if the budget ran out.
    pub iterations: usize,
    /// Whether the relative cost change dropped below the threshold.
    pub converged: bool,
    /// Total cost of the accepted nominal trajectory.
    pub final_cost: f64,
    /// Relative cost change at the last accepted step.
    pub final_ratio: f64,
}

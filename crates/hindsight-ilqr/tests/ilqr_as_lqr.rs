//! Holds the iterative solver to the exact LQR solution on random
//! linear-quadratic problems: seeded at the optimum it must reproduce it,
//! seeded randomly it must reach it in two backward/forward passes, and
//! once converged another pass must change nothing.

use approx::assert_relative_eq;

use hindsight_core::prelude::*;
use hindsight_ilqr::IlqrSolver;
use hindsight_lqr::FiniteHorizonLqr;
use hindsight_test_utils::{seeded_rng, RandomLqProblem};

const WEAKER_TOL: f64 = 1e-3;
const TOL: f64 = 1e-5;
const TIGHTER_TOL: f64 = 1e-7;

type LqSolver<const X: usize, const U: usize> =
    IlqrSolver<LinearDynamics<X, U>, QuadraticCost<X, U>, ZeroTerminalCost, X, U>;

fn lq_reference<const X: usize, const U: usize>(
    problem: &RandomLqProblem<X, U>,
    horizon: usize,
) -> hindsight_lqr::LqrRollout<X, U> {
    let mut lqr = FiniteHorizonLqr::new(problem.a, problem.b, problem.q, problem.r);
    lqr.solve(horizon).unwrap();
    lqr.forward_pass(&problem.x0)
}

/// Seed iLQR with the exact LQR trajectory; one backward+forward pass must
/// reproduce it.
fn check_with_lqr_initialization<const X: usize, const U: usize>(seed: u64, horizon: usize) {
    let problem = RandomLqProblem::<X, U>::generate(&mut seeded_rng(seed), 1e-11, 1e-1);
    let reference = lq_reference(&problem, horizon);
    let reference_cost = reference.total_cost();

    let mut solver = LqSolver::with_nominal(
        LinearDynamics::new(problem.a, problem.b),
        QuadraticCost::new(problem.q, problem.r),
        ZeroTerminalCost,
        reference.states.clone(),
        reference.controls.clone(),
    )
    .unwrap();

    solver.backward_pass(0.0).unwrap();
    let rollout = solver.forward_pass(&problem.x0, 1.0).unwrap();

    for t in 0..horizon {
        assert_relative_eq!(rollout.states[t], reference.states[t], epsilon = TOL);
        assert_relative_eq!(rollout.controls[t], reference.controls[t], epsilon = TOL);
    }
    assert_relative_eq!(rollout.cost, reference_cost, epsilon = TOL);

    // Another backward+forward pass must not move the solution.
    solver.backward_pass(0.0).unwrap();
    let again = solver.forward_pass(&problem.x0, 1.0).unwrap();
    assert_relative_eq!(again.cost, rollout.cost, epsilon = TIGHTER_TOL);
    for t in 0..horizon {
        assert_relative_eq!(again.states[t], rollout.states[t], epsilon = TOL);
        assert_relative_eq!(again.controls[t], rollout.controls[t], epsilon = TOL);
    }
}

/// Seed iLQR with a random rollout; two backward+forward passes are a
/// perfect Newton step to the LQR optimum.
fn check_converges_to_lqr<const X: usize, const U: usize>(seed: u64, horizon: usize) {
    let problem = RandomLqProblem::<X, U>::generate(&mut seeded_rng(seed), 1e-11, 1e-3);
    let reference = lq_reference(&problem, horizon);

    // Random controls rolled through the true dynamics.
    let mut rng = seeded_rng(seed.wrapping_add(1));
    let dynamics = LinearDynamics::new(problem.a, problem.b);
    let mut states = vec![problem.x0];
    let mut controls = Vec::with_capacity(horizon);
    for t in 0..horizon {
        let u = hindsight_test_utils::random_vector::<U>(&mut rng);
        states.push(Dynamics::step(&dynamics, &states[t], &u));
        controls.push(u);
    }

    let mut solver = LqSolver::with_nominal(
        dynamics,
        QuadraticCost::new(problem.q, problem.r),
        ZeroTerminalCost,
        states,
        controls,
    )
    .unwrap();

    let options = SolveOptions::default()
        .with_max_iters(2)
        .with_cost_convg_ratio(1e-12)
        .with_warm_start(0);
    solver
        .solve(horizon, &problem.x0, &nalgebra::SVector::zeros(), &options)
        .unwrap();

    let rollout = solver.forward_pass(&problem.x0, 1.0).unwrap();
    for t in 0..horizon {
        assert_relative_eq!(rollout.states[t], reference.states[t], epsilon = WEAKER_TOL);
        assert_relative_eq!(rollout.controls[t], reference.controls[t], epsilon = WEAKER_TOL);
    }
    assert_relative_eq!(rollout.cost, reference.total_cost(), epsilon = TOL);

    // Converged: a further pass changes nothing.
    solver.backward_pass(0.0).unwrap();
    let again = solver.forward_pass(&problem.x0, 1.0).unwrap();
    assert_relative_eq!(again.cost, rollout.cost, epsilon = TIGHTER_TOL);
}

#[test]
fn lqr_initialization_square_and_rectangular() {
    check_with_lqr_initialization::<5, 5>(1, 2);
    check_with_lqr_initialization::<5, 2>(1, 2);
    check_with_lqr_initialization::<5, 2>(1, 8);
}

#[test]
fn lqr_initialization_long_horizon() {
    check_with_lqr_initialization::<5, 2>(1, 150);
    check_with_lqr_initialization::<1, 1>(1, 150);
    check_with_lqr_initialization::<1, 1>(1, 2);
}

#[test]
fn converges_from_random_initialization() {
    check_converges_to_lqr::<8, 2>(2, 4);
    check_converges_to_lqr::<5, 5>(2, 8);
    check_converges_to_lqr::<3, 2>(2, 4);
    check_converges_to_lqr::<3, 2>(2, 8);
    check_converges_to_lqr::<3, 2>(2, 50);
    check_converges_to_lqr::<1, 1>(2, 8);
}

#[test]
fn horizon_of_one_is_rejected() {
    let problem = RandomLqProblem::<3, 2>::generate(&mut seeded_rng(3), 1e-11, 1e-1);

    let mut lqr = FiniteHorizonLqr::new(problem.a, problem.b, problem.q, problem.r);
    assert!(matches!(lqr.solve(1), Err(SolverError::HorizonTooShort(1))));

    let mut solver = LqSolver::new(
        LinearDynamics::new(problem.a, problem.b),
        QuadraticCost::new(problem.q, problem.r),
        ZeroTerminalCost,
    );
    let result = solver.solve(
        1,
        &problem.x0,
        &nalgebra::SVector::zeros(),
        &SolveOptions::default(),
    );
    assert!(matches!(
        result,
        Err(HindsightError::Solver(SolverError::HorizonTooShort(1)))
    ));
}

/// Scenario S1: scalar problem against the Riccati recursion, solved cold.
#[test]
fn scalar_lqr_match_from_zero_trajectories() {
    use nalgebra::{Matrix1, Vector1};

    let (a, b, q, r) = (
        Matrix1::new(0.9),
        Matrix1::new(1.0),
        Matrix1::new(1.0),
        Matrix1::new(0.1),
    );
    let horizon = 8;
    let x0 = Vector1::new(1.0);

    let mut lqr = FiniteHorizonLqr::new(a, b, q, r);
    lqr.solve(horizon).unwrap();
    let reference = lqr.forward_pass(&x0);

    let mut solver = LqSolver::new(
        LinearDynamics::new(a, b),
        QuadraticCost::new(q, r),
        ZeroTerminalCost,
    );
    let options = SolveOptions::default()
        .with_max_iters(20)
        .with_cost_convg_ratio(1e-10);
    let report = solver.solve(horizon, &x0, &Vector1::zeros(), &options).unwrap();
    assert!(report.converged);

    let rollout = solver.forward_pass(&x0, 1.0).unwrap();
    for t in 0..horizon {
        assert_relative_eq!(rollout.states[t], reference.states[t], epsilon = TOL);
        assert_relative_eq!(rollout.controls[t], reference.controls[t], epsilon = TOL);
    }
    assert_relative_eq!(rollout.cost, reference.total_cost(), epsilon = TOL);
}

/// Identical inputs give bitwise identical solves.
#[test]
fn solve_is_deterministic() {
    let run = || {
        let problem = RandomLqProblem::<4, 2>::generate(&mut seeded_rng(9), 1e-11, 1e-2);
        let mut solver = LqSolver::new(
            LinearDynamics::new(problem.a, problem.b),
            QuadraticCost::new(problem.q, problem.r),
            ZeroTerminalCost,
        );
        let options = SolveOptions::default().with_max_iters(10);
        solver
            .solve(12, &problem.x0, &nalgebra::SVector::zeros(), &options)
            .unwrap();
        solver.forward_pass(&problem.x0, 1.0).unwrap()
    };

    let first = run();
    let second = run();
    assert_eq!(first.cost.to_bits(), second.cost.to_bits());
    for (a, b) in first.states.iter().zip(&second.states) {
        assert_eq!(a, b);
    }
    for (a, b) in first.controls.iter().zip(&second.controls) {
        assert_eq!(a, b);
    }
}

/// Accepted cost never increases across outer iterations (checked through
/// deterministic reruns with growing iteration budgets).
#[test]
fn accepted_cost_is_monotone() {
    use nalgebra::{Vector1, Vector2};

    // Mildly nonlinear scalar plant so convergence takes several steps.
    let dynamics =
        |x: &Vector1<f64>, u: &Vector2<f64>| Vector1::new(x[0] + 0.1 * (u[0] - x[0].sin() + 0.2 * u[1]));
    let cost = |x: &Vector1<f64>, u: &Vector2<f64>, _t: usize| {
        0.5 * (4.0 * x[0] * x[0] + 0.1 * u.norm_squared())
    };
    let terminal = |x: &Vector1<f64>| 5.0 * x[0] * x[0];

    let mut costs = Vec::new();
    for max_iters in 1..=6 {
        let mut solver = IlqrSolver::new(dynamics, cost, terminal);
        let options = SolveOptions::default()
            .with_max_iters(max_iters)
            .with_cost_convg_ratio(1e-12);
        let report = solver
            .solve(20, &Vector1::new(2.0), &Vector2::zeros(), &options)
            .unwrap();
        costs.push(report.final_cost);
    }

    for pair in costs.windows(2) {
        assert!(pair[1] <= pair[0] + 1e-12, "cost increased: {pair:?}");
    }
}

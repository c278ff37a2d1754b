//! Hindsight planning for a diff-drive robot that may or may not face an
//! obstacle.
//!
//! Two branches share the first control: in one world the passage ahead is
//! blocked, in the other it is clear. The solver commits to a single
//! opening move that hedges between the hypotheses, then each branch's
//! trajectory specializes.
//!
//! Run: `cargo run -p hindsight-demos --bin diffdrive_hindsight`

use nalgebra::Vector2;

use hindsight_demos::DiffDriveScenario;
use hindsight_ilqr::{Branch, HindsightSolver};
use hindsight_record::{states_to_file, world_to_file};
use hindsight_sim::DiffDrive;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    println!("=== Diff-Drive Hindsight Example ===\n");

    // ---------------------------------------------------------------
    // 1. Two world hypotheses
    // ---------------------------------------------------------------
    let mut scenario = DiffDriveScenario::default();
    // The hedge only matters if proximity hurts.
    scenario.penalty.enabled = true;

    let mut blocked_world = scenario.world();
    blocked_world.add_obstacle(2.0, Vector2::new(0.0, -13.5));
    let clear_world = scenario.world();

    let obstacle_probability = 0.7;
    println!(
        "Obstacle ahead with probability {obstacle_probability}, clear with {:.1}",
        1.0 - obstacle_probability
    );

    // ---------------------------------------------------------------
    // 2. Build the branches and solve
    // ---------------------------------------------------------------
    let make_drive =
        || DiffDrive::new(scenario.dt).with_control_limits(scenario.control_limits);
    let branches = vec![
        Branch::new(
            make_drive(),
            scenario.running_cost(blocked_world.clone()),
            scenario.terminal_cost(),
            obstacle_probability,
        ),
        Branch::new(
            make_drive(),
            scenario.running_cost(clear_world),
            scenario.terminal_cost(),
            1.0 - obstacle_probability,
        ),
    ];

    let mut solver = HindsightSolver::new(branches).expect("invalid branch set");
    let start = std::time::Instant::now();
    let report = solver
        .solve(
            scenario.horizon,
            &scenario.x0(),
            &scenario.u_nominal(),
            &scenario.solve,
        )
        .expect("hindsight solve failed");
    println!(
        "\nSolved in {:.3} s: {} iterations, converged = {}, expected cost = {:.4}",
        start.elapsed().as_secs_f64(),
        report.iterations,
        report.converged,
        report.final_cost
    );

    // ---------------------------------------------------------------
    // 3. Inspect the shared opening move and per-branch outcomes
    // ---------------------------------------------------------------
    let u0 = solver.compute_first_control(&scenario.x0());
    println!("Shared first control: v = {:+.3}, omega = {:+.3}", u0[0], u0[1]);

    for branch_num in 0..solver.num_branches() {
        let states = solver.branch(branch_num).nominal_states();
        let last = states[states.len() - 1];
        println!(
            "Branch {branch_num} (p = {:.1}): final pose ({:+.3}, {:+.3}, {:+.3})",
            solver.branch(branch_num).probability(),
            last[0],
            last[1],
            last[2]
        );

        let fname = format!("states_branch{branch_num}.csv");
        states_to_file(&fname, &scenario.x0(), &scenario.goal(), states)
            .expect("failed to write branch states");
        println!("  wrote {fname}");
    }
    world_to_file("obstacles.csv", &blocked_world).expect("failed to write obstacles.csv");
    println!("Wrote obstacles.csv");
}

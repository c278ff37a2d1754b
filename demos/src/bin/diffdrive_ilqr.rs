//! Differential-drive goal reaching with iLQR.
//!
//! Drives from (0, -25) to (0, 25) with a heading term that forces a proper
//! turn-around, then re-runs the solved policy as a controller and writes
//! the trajectory and world files for plotting.
//!
//! Run: `cargo run -p hindsight-demos --bin diffdrive_ilqr`

use nalgebra::Vector2;

use hindsight_demos::DiffDriveScenario;
use hindsight_ilqr::IlqrSolver;
use hindsight_record::{states_to_file, world_to_file};
use hindsight_sim::DiffDrive;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    println!("=== Diff-Drive iLQR Example ===\n");

    // ---------------------------------------------------------------
    // 1. Scenario and world
    // ---------------------------------------------------------------
    let scenario = DiffDriveScenario::default();
    let mut world = scenario.world();
    world.add_obstacle(2.0, Vector2::new(0.0, -13.5));

    println!(
        "Horizon {} steps at dt = {:.4} s, start {:?}, goal {:?}",
        scenario.horizon, scenario.dt, scenario.x0, scenario.goal
    );

    // ---------------------------------------------------------------
    // 2. Solve
    // ---------------------------------------------------------------
    let drive = DiffDrive::new(scenario.dt).with_control_limits(scenario.control_limits);
    let mut solver = IlqrSolver::new(
        drive,
        scenario.running_cost(world.clone()),
        scenario.terminal_cost(),
    );

    let start = std::time::Instant::now();
    let report = solver
        .solve(
            scenario.horizon,
            &scenario.x0(),
            &scenario.u_nominal(),
            &scenario.solve,
        )
        .expect("diff-drive solve failed");
    println!(
        "\nSolved in {:.3} s: {} iterations, converged = {}, cost = {:.4}",
        start.elapsed().as_secs_f64(),
        report.iterations,
        report.converged,
        report.final_cost
    );

    // ---------------------------------------------------------------
    // 3. Run the policy as a controller
    // ---------------------------------------------------------------
    let controller_drive =
        DiffDrive::new(scenario.dt).with_control_limits(scenario.control_limits);
    let running = scenario.running_cost(world.clone());
    let terminal = scenario.terminal_cost();

    let mut x = scenario.x0();
    let mut states = vec![x];
    let mut rollout_cost = 0.0;
    for t in 0..scenario.horizon {
        let u = solver.compute_control(&x, t, 1.0);
        rollout_cost += running(&x, &u, t);
        x = hindsight_core::problem::Dynamics::step(&controller_drive, &x, &u);
        states.push(x);
    }
    rollout_cost += terminal(&x);

    let position_error = (x - scenario.goal()).fixed_rows::<2>(0).norm();
    println!(
        "Rollout: final pose ({:+.3}, {:+.3}, {:+.3}), position error {:.3}, cost {:.4}",
        x[0], x[1], x[2], position_error, rollout_cost
    );

    // ---------------------------------------------------------------
    // 4. Persist artifacts
    // ---------------------------------------------------------------
    states_to_file("states.csv", &scenario.x0(), &scenario.goal(), &states)
        .expect("failed to write states.csv");
    world_to_file("obstacles.csv", &world).expect("failed to write obstacles.csv");
    println!("\nWrote states.csv and obstacles.csv");
}

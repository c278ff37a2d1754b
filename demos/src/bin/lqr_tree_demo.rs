//! Exact LQR over a probabilistic tree of plan nodes.
//!
//! Builds a two-level tree for a planar double integrator where the second
//! step splits into a likely and an unlikely outcome, backs the value
//! function up from the leaves, and prints the resulting gains.
//!
//! Run: `cargo run -p hindsight-demos --bin lqr_tree_demo`

use nalgebra::{Matrix2, SMatrix, Vector2};

use hindsight_lqr::{LqrTree, PlanNodeSpec};

fn main() {
    println!("=== LQR-Tree Example ===\n");

    // Planar double integrator (position + velocity, force input).
    let dt = 0.1;
    let a = Matrix2::new(1.0, dt, 0.0, 1.0);
    let b = SMatrix::<f64, 2, 1>::new(0.0, dt);
    let q = Matrix2::identity();
    let r = SMatrix::<f64, 1, 1>::new(0.5);

    let mut tree = LqrTree::new(a, b, q, r);
    let children = tree
        .add_children(
            tree.root(),
            vec![
                PlanNodeSpec::new(a, b, q, r, 0.4),
                PlanNodeSpec::new(a, b, q, r, 0.6),
            ],
        )
        .expect("child probabilities must sum to 1");
    println!(
        "Tree: root 0 with children {children:?} (probabilities 0.4 / 0.6)"
    );

    tree.bellman_tree_backup().expect("tree backup failed");
    tree.forward_pass(&Vector2::new(1.0, 0.0));

    for index in 0..tree.len() {
        let node = tree.node(index);
        println!(
            "node {index}: depth {} p = {:.1}  K = [{:+.4}, {:+.4}]  x = ({:+.3}, {:+.3})",
            node.depth(),
            node.probability,
            node.feedback[(0, 0)],
            node.feedback[(0, 1)],
            node.x[0],
            node.x[1]
        );
    }

    // Leaves carry no future value, so their V is exactly Q and their gain
    // is zero; the root's gain is solved against the probability-weighted
    // child values.
    let root = tree.node(0);
    println!(
        "\nroot value matrix:\n[{:+.4} {:+.4}]\n[{:+.4} {:+.4}]",
        root.value[(0, 0)],
        root.value[(0, 1)],
        root.value[(1, 0)],
        root.value[(1, 1)]
    );
}

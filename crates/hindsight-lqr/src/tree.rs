//! Exact LQR backup over a probabilistic tree of linear-quadratic plan
//! nodes.
//!
//! Each node carries fixed `(A, B, Q, R)` and a probability; the children of
//! a node are the mutually exclusive outcomes of its step and their
//! probabilities sum to one. The backup is the degenerate case of the
//! hindsight sweep where dynamics and cost are already quadratic, so no
//! line search is needed: value matrices flow from the leaves to the root
//! through probability-weighted averages.
//!
//! Nodes live in an arena (`Vec` plus integer indices, root at 0); parent
//! and child links are indices, which keeps the structure acyclic and
//! cheaply traversable in both directions.

use nalgebra::{SMatrix, SVector};
use thiserror::Error;

/// Tolerance on a sibling group's total probability.
const PROBABILITY_EPS: f64 = 1e-5;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from tree construction and backup.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TreeError {
    #[error("Child probabilities sum to {0}, expected 1")]
    ProbabilitySum(f64),

    #[error("Node index {0} out of bounds")]
    InvalidNode(usize),

    #[error("Leaves are not all at the same depth")]
    UnevenLeafDepth,

    #[error("Singular control term in the backup at node {0}")]
    SingularControlTerm(usize),
}

// ---------------------------------------------------------------------------
// PlanNode
// ---------------------------------------------------------------------------

/// The linear-quadratic data for one node, before insertion.
#[derive(Debug, Clone)]
pub struct PlanNodeSpec<const XDIM: usize, const UDIM: usize> {
    pub a: SMatrix<f64, XDIM, XDIM>,
    pub b: SMatrix<f64, XDIM, UDIM>,
    pub q: SMatrix<f64, XDIM, XDIM>,
    pub r: SMatrix<f64, UDIM, UDIM>,
    pub probability: f64,
}

impl<const XDIM: usize, const UDIM: usize> PlanNodeSpec<XDIM, UDIM> {
    pub const fn new(
        a: SMatrix<f64, XDIM, XDIM>,
        b: SMatrix<f64, XDIM, UDIM>,
        q: SMatrix<f64, XDIM, XDIM>,
        r: SMatrix<f64, UDIM, UDIM>,
        probability: f64,
    ) -> Self {
        Self { a, b, q, r, probability }
    }
}

/// An arena-resident plan node: the fixed LQ data plus the backup results
/// (`feedback`, `value`) and the linearization point set by the forward
/// pass.
#[derive(Debug, Clone)]
pub struct PlanNode<const XDIM: usize, const UDIM: usize> {
    pub a: SMatrix<f64, XDIM, XDIM>,
    pub b: SMatrix<f64, XDIM, UDIM>,
    pub q: SMatrix<f64, XDIM, XDIM>,
    pub r: SMatrix<f64, UDIM, UDIM>,
    pub probability: f64,
    /// Feedback gain `K` from the last backup.
    pub feedback: SMatrix<f64, UDIM, XDIM>,
    /// Value matrix `V` from the last backup.
    pub value: SMatrix<f64, XDIM, XDIM>,
    /// State linearization point from the last forward pass.
    pub x: SVector<f64, XDIM>,
    /// Control linearization point from the last forward pass.
    pub u: SVector<f64, UDIM>,
    parent: Option<usize>,
    children: Vec<usize>,
    depth: usize,
}

impl<const XDIM: usize, const UDIM: usize> PlanNode<XDIM, UDIM> {
    fn from_spec(spec: PlanNodeSpec<XDIM, UDIM>, parent: Option<usize>, depth: usize) -> Self {
        Self {
            a: spec.a,
            b: spec.b,
            q: spec.q,
            r: spec.r,
            probability: spec.probability,
            feedback: SMatrix::zeros(),
            value: SMatrix::zeros(),
            x: SVector::zeros(),
            u: SVector::zeros(),
            parent,
            children: Vec::new(),
            depth,
        }
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn children(&self) -> &[usize] {
        &self.children
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

// ---------------------------------------------------------------------------
// LqrTree
// ---------------------------------------------------------------------------

/// Arena-allocated LQR tree. The root is index 0 with probability 1.
pub struct LqrTree<const XDIM: usize, const UDIM: usize> {
    nodes: Vec<PlanNode<XDIM, UDIM>>,
}

impl<const XDIM: usize, const UDIM: usize> LqrTree<XDIM, UDIM> {
    /// Create a tree holding only the root node.
    pub fn new(
        a: SMatrix<f64, XDIM, XDIM>,
        b: SMatrix<f64, XDIM, UDIM>,
        q: SMatrix<f64, XDIM, XDIM>,
        r: SMatrix<f64, UDIM, UDIM>,
    ) -> Self {
        let root = PlanNode::from_spec(PlanNodeSpec::new(a, b, q, r, 1.0), None, 0);
        Self { nodes: vec![root] }
    }

    /// Index of the root node.
    pub const fn root(&self) -> usize {
        0
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> &PlanNode<XDIM, UDIM> {
        &self.nodes[index]
    }

    /// Attach a sibling group under `parent` and return the new indices.
    ///
    /// # Errors
    ///
    /// [`TreeError::InvalidNode`] for a bad parent index,
    /// [`TreeError::ProbabilitySum`] when the group's probabilities do not
    /// sum to 1 within `1e-5`.
    pub fn add_children(
        &mut self,
        parent: usize,
        specs: Vec<PlanNodeSpec<XDIM, UDIM>>,
    ) -> Result<Vec<usize>, TreeError> {
        if parent >= self.nodes.len() {
            return Err(TreeError::InvalidNode(parent));
        }
        let total: f64 = specs.iter().map(|s| s.probability).sum();
        if (total - 1.0).abs() > PROBABILITY_EPS {
            return Err(TreeError::ProbabilitySum(total));
        }

        let depth = self.nodes[parent].depth + 1;
        let mut indices = Vec::with_capacity(specs.len());
        for spec in specs {
            let index = self.nodes.len();
            self.nodes.push(PlanNode::from_spec(spec, Some(parent), depth));
            self.nodes[parent].children.push(index);
            indices.push(index);
        }
        Ok(indices)
    }

    /// Indices of all leaf nodes.
    pub fn leaf_indices(&self) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|&i| self.nodes[i].is_leaf())
            .collect()
    }

    /// Set every node's linearization point by propagating from `x0`:
    /// `u = K x` at each node, `x_child = A x + B u`.
    pub fn forward_pass(&mut self, x0: &SVector<f64, XDIM>) {
        // Depth-first with an explicit stack; order within a level is
        // irrelevant since siblings only read their parent's output.
        let mut stack = vec![(self.root(), *x0)];
        while let Some((index, x)) = stack.pop() {
            let node = &mut self.nodes[index];
            let u = node.feedback * x;
            node.x = x;
            node.u = u;
            let next = node.a * x + node.b * u;
            for &child in &self.nodes[index].children {
                stack.push((child, next));
            }
        }
    }

    /// Back the value function up from the leaves to the root.
    ///
    /// Leaves are seeded with a zero future value, so a leaf ends up with
    /// `K = 0` and `V = Q`. Each internal node aggregates
    /// `Vtilde = sum_k p_k V_k` over its children and solves the exact LQR
    /// subproblem against it.
    ///
    /// # Errors
    ///
    /// [`TreeError::UnevenLeafDepth`] unless all leaves share one depth;
    /// [`TreeError::SingularControlTerm`] if `R + B' Vtilde B` is not
    /// invertible at some node.
    pub fn bellman_tree_backup(&mut self) -> Result<(), TreeError> {
        let leaves = self.leaf_indices();
        let Some(&first) = leaves.first() else {
            return Ok(());
        };
        let leaf_depth = self.nodes[first].depth;
        if leaves.iter().any(|&i| self.nodes[i].depth != leaf_depth) {
            return Err(TreeError::UnevenLeafDepth);
        }

        for &leaf in &leaves {
            self.backup_node(leaf, &SMatrix::zeros())?;
        }

        // Equal-depth leaves mean every shallower node is internal, so the
        // levels can be walked straight up.
        for depth in (0..leaf_depth).rev() {
            for index in 0..self.nodes.len() {
                if self.nodes[index].depth != depth {
                    continue;
                }
                let mut aggregate = SMatrix::<f64, XDIM, XDIM>::zeros();
                for &child in &self.nodes[index].children {
                    aggregate += self.nodes[child].value * self.nodes[child].probability;
                }
                self.backup_node(index, &aggregate)?;
            }
        }
        Ok(())
    }

    /// Solve one node's control policy and value against the future value
    /// `Vtilde`.
    fn backup_node(
        &mut self,
        index: usize,
        value_next: &SMatrix<f64, XDIM, XDIM>,
    ) -> Result<(), TreeError> {
        let node = &self.nodes[index];
        let hessian = node.r + node.b.transpose() * value_next * node.b;
        let Some(inverse) = hessian.try_inverse() else {
            return Err(TreeError::SingularControlTerm(index));
        };
        let feedback = -inverse * (node.b.transpose() * value_next * node.a);

        let closed_loop = node.a + node.b * feedback;
        let value = node.q
            + feedback.transpose() * node.r * feedback
            + closed_loop.transpose() * value_next * closed_loop;

        let node = &mut self.nodes[index];
        node.feedback = feedback;
        node.value = value;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Random problem generators for the solver regression tests.

use nalgebra::{DMatrix, SMatrix, SVector};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Minimum condition number forced onto [`random_psd`] output so the
/// generated cost matrices are never trivially well-scaled.
const MIN_CONDITION: f64 = 10.0;

/// Uniform entries in `[-1, 1]`.
pub fn random_vector<const N: usize>(rng: &mut ChaCha8Rng) -> SVector<f64, N> {
    SVector::from_fn(|_, _| rng.gen_range(-1.0..=1.0))
}

/// Uniform entries in `[-1, 1]`.
pub fn random_matrix<const R: usize, const C: usize>(rng: &mut ChaCha8Rng) -> SMatrix<f64, R, C> {
    SMatrix::from_fn(|_, _| rng.gen_range(-1.0..=1.0))
}

/// Random symmetric PSD matrix with every eigenvalue at least `min_eig`.
///
/// Draws a random matrix, symmetrizes it, clamps the eigenvalues from below
/// and stretches the largest one if the spectrum came out too flat, then
/// recomposes.
pub fn random_psd<const N: usize>(rng: &mut ChaCha8Rng, min_eig: f64) -> SMatrix<f64, N, N> {
    let raw = DMatrix::<f64>::from_fn(N, N, |_, _| 10.0 * rng.gen_range(-1.0..=1.0));
    let symmetric = (&raw + raw.transpose()) / 2.0;

    let eigen = symmetric.symmetric_eigen();
    let mut eigenvalues = eigen.eigenvalues.clone();
    for value in eigenvalues.iter_mut() {
        *value = value.max(min_eig);
    }

    let smallest = eigenvalues.iter().copied().fold(f64::INFINITY, f64::min);
    let (largest_index, largest) = eigenvalues
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |acc, item| {
            if item.1 > acc.1 { item } else { acc }
        });
    if largest / smallest < MIN_CONDITION {
        eigenvalues[largest_index] = smallest * MIN_CONDITION;
    }

    let recomposed = &eigen.eigenvectors
        * DMatrix::from_diagonal(&eigenvalues)
        * eigen.eigenvectors.transpose();
    SMatrix::from_fn(|i, j| recomposed[(i, j)])
}

/// A random linear-quadratic problem: dense `A`, `B` with entries in
/// `[-1, 1]`, PSD `Q` and strictly positive definite `R`.
pub struct RandomLqProblem<const XDIM: usize, const UDIM: usize> {
    pub a: SMatrix<f64, XDIM, XDIM>,
    pub b: SMatrix<f64, XDIM, UDIM>,
    pub q: SMatrix<f64, XDIM, XDIM>,
    pub r: SMatrix<f64, UDIM, UDIM>,
    pub x0: SVector<f64, XDIM>,
}

impl<const XDIM: usize, const UDIM: usize> RandomLqProblem<XDIM, UDIM> {
    /// Generate a problem with the given eigenvalue floors for `Q` and `R`.
    pub fn generate(rng: &mut ChaCha8Rng, q_min_eig: f64, r_min_eig: f64) -> Self {
        Self {
            a: random_matrix(rng),
            b: random_matrix(rng),
            q: random_psd(rng, q_min_eig),
            r: random_psd(rng, r_min_eig),
            x0: random_vector(rng),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

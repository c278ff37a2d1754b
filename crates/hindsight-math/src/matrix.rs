//! Small dense-matrix helpers shared by the solvers and tests.

use nalgebra::{Cholesky, SMatrix};

/// Default tolerance for [`is_equal`].
pub const EQUALITY_EPS: f64 = 1e-10;

/// Elementwise approximate equality: every entry of `a - b` within `tol`.
pub fn is_equal<const R: usize, const C: usize>(
    a: &SMatrix<f64, R, C>,
    b: &SMatrix<f64, R, C>,
    tol: f64,
) -> bool {
    (a - b).iter().all(|d| d.abs() <= tol)
}

/// Average a square matrix with its transpose.
///
/// The value-function backup accumulates tiny asymmetries over a long
/// horizon; this keeps the quadratic model symmetric.
#[must_use]
pub fn symmetrize<const N: usize>(m: &SMatrix<f64, N, N>) -> SMatrix<f64, N, N> {
    (m + m.transpose()) * 0.5
}

/// Whether `m` is symmetric and positive semidefinite.
///
/// Symmetry is checked elementwise; semidefiniteness through a Cholesky
/// factorization of `m + tol * I`, which tolerates zero eigenvalues up to
/// `tol`.
pub fn is_symmetric_psd<const N: usize>(m: &SMatrix<f64, N, N>, tol: f64) -> bool {
    if !is_equal(m, &m.transpose(), tol.max(EQUALITY_EPS)) {
        return false;
    }
    let shifted = m + SMatrix::<f64, N, N>::identity() * tol;
    Cholesky::new(shifted).is_some()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix2, Matrix3};

    #[test]
    fn is_equal_respects_tolerance() {
        let a = Matrix2::new(1.0, 2.0, 3.0, 4.0);
        let b = a.add_scalar(1e-12);
        assert!(is_equal(&a, &b, 1e-10));
        assert!(!is_equal(&a, &b.add_scalar(1e-3), 1e-10));
    }

    #[test]
    fn symmetrize_produces_symmetric_matrix() {
        let m = Matrix3::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0);
        let s = symmetrize(&m);
        assert_relative_eq!(s, s.transpose(), epsilon = 1e-14);
        assert_relative_eq!(s[(0, 1)], 3.0, epsilon = 1e-14);
    }

    #[test]
    fn identity_is_psd() {
        assert!(is_symmetric_psd(&Matrix2::identity(), 1e-10));
    }

    #[test]
    fn negative_definite_is_not_psd() {
        let m = Matrix2::new(-1.0, 0.0, 0.0, -2.0);
        assert!(!is_symmetric_psd(&m, 1e-10));
    }

    #[test]
    fn asymmetric_is_not_psd() {
        let m = Matrix2::new(1.0, 0.5, -0.5, 1.0);
        assert!(!is_symmetric_psd(&m, 1e-10));
    }

    #[test]
    fn zero_matrix_is_psd() {
        assert!(is_symmetric_psd(&Matrix2::zeros(), 1e-10));
    }
}

//! Solver for the damped normal equations.
//!
//! The damped Gauss-Newton matrix is symmetric and, with any positive
//! damping, positive definite in exact arithmetic. In practice a Jacobian
//! column can be identically zero (a parameter the model ignores, or a column
//! the finite differences could not fill) and the matrix is then singular or
//! close to it. The solve must still return something usable: the damping
//! loop rejects a poor step and retries with a larger λ.
//!
//! Factorizations are tried in order: faer's LDLᵀ, then its Bunch-Kaufman
//! LBLᵀ (2×2 pivots, so a zero diagonal is fine), then a nalgebra SVD. A
//! factorized solution is only taken when it is finite and actually solves
//! the system.

use crate::error::{FitError, Result};
use crate::utils::matrix_convert::{
    faer_column_to_ndarray, nalgebra_vec_to_ndarray, ndarray_to_faer, ndarray_to_nalgebra,
    ndarray_vec_to_faer, ndarray_vec_to_nalgebra,
};
use faer::linalg::solvers::{Lblt, Ldlt, Solve};
use faer::Side;
use ndarray::{Array1, Array2};

/// Relative residual a factorized solution must reach to be accepted.
const RESIDUAL_TOLERANCE: f64 = 1e-8;

/// Singular values below this are ignored by the SVD fallback.
const SVD_TOLERANCE: f64 = 1e-12;

const SVD_MAX_ITERATIONS: usize = 1000;

/// Solve `a · x = b` for symmetric `a`.
///
/// A singular or badly conditioned system yields a finite, possibly
/// degenerate, solution; a system with non-finite entries yields zeros.
/// Fails with [`FitError::DimensionMismatch`] on shape errors and with
/// [`FitError::LinearAlgebraError`] when even the SVD gives up.
pub fn solve_symmetric(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = b.len();
    if a.nrows() != n || a.ncols() != n {
        return Err(FitError::DimensionMismatch(format!(
            "expected a {}x{} matrix, got {}x{}",
            n,
            n,
            a.nrows(),
            a.ncols()
        )));
    }
    if n == 0 {
        return Ok(Array1::zeros(0));
    }
    if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
        log::warn!("linear solve: non-finite system, returning a zero step");
        return Ok(Array1::zeros(n));
    }

    let a_faer = ndarray_to_faer(a);

    if let Ok(ldlt) = Ldlt::new(a_faer.as_ref(), Side::Lower) {
        let mut rhs = ndarray_vec_to_faer(b);
        ldlt.solve_in_place(rhs.as_mut());
        let x = faer_column_to_ndarray(&rhs);
        if solves(a, b, &x) {
            return Ok(x);
        }
    }

    let lblt = Lblt::new(a_faer.as_ref(), Side::Lower);
    let mut rhs = ndarray_vec_to_faer(b);
    lblt.solve_in_place(rhs.as_mut());
    let x = faer_column_to_ndarray(&rhs);
    if solves(a, b, &x) {
        return Ok(x);
    }

    log::warn!("linear solve: LDLᵀ and LBLᵀ failed, falling back to SVD");
    solve_svd(a, b).ok_or_else(|| {
        FitError::LinearAlgebraError(format!("no factorization solved the {}x{} system", n, n))
    })
}

/// Whether `x` is finite and `‖a·x − b‖` is small relative to the system.
fn solves(a: &Array2<f64>, b: &Array1<f64>, x: &Array1<f64>) -> bool {
    if !x.iter().all(|v| v.is_finite()) {
        return false;
    }
    let norm = |v: &Array1<f64>| v.iter().map(|e| e * e).sum::<f64>().sqrt();
    let a_norm = a.iter().map(|e| e * e).sum::<f64>().sqrt();
    let residual = norm(&(a.dot(x) - b));
    residual <= RESIDUAL_TOLERANCE * (a_norm * norm(x) + norm(b)).max(f64::MIN_POSITIVE)
}

fn solve_svd(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let svd = ndarray_to_nalgebra(a).try_svd(true, true, f64::EPSILON, SVD_MAX_ITERATIONS)?;
    let x = svd.solve(&ndarray_vec_to_nalgebra(b), SVD_TOLERANCE).ok()?;
    let x = nalgebra_vec_to_ndarray(&x);
    x.iter().all(|v| v.is_finite()).then_some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn residual_norm(a: &Array2<f64>, x: &Array1<f64>, b: &Array1<f64>) -> f64 {
        (a.dot(x) - b).iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    #[test]
    fn test_spd_system() {
        let a = array![[4.0, 1.0, 0.5], [1.0, 3.0, 0.2], [0.5, 0.2, 2.0]];
        let b = array![1.0, 2.0, 3.0];
        let x = solve_symmetric(&a, &b).unwrap();
        assert!(residual_norm(&a, &x, &b) < 1e-12);
    }

    #[test]
    fn test_indefinite_system_needs_pivoting() {
        // zero leading diagonal, plain LDLᵀ without pivoting divides by zero
        let a = array![[0.0, 2.0, 1.0], [2.0, 5.0, 0.0], [1.0, 0.0, -3.0]];
        let b = array![3.0, -1.0, 2.0];
        let x = solve_symmetric(&a, &b).unwrap();
        assert!(x.iter().all(|v| v.is_finite()));
        assert!(residual_norm(&a, &x, &b) < 1e-10);
    }

    #[test]
    fn test_zero_diagonal_needs_two_by_two_pivot() {
        // no diagonal pivot exists at all
        let a = array![[0.0, 1.0], [1.0, 0.0]];
        let b = array![1.0, 1.0];
        let x = solve_symmetric(&a, &b).unwrap();
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 1.0, epsilon = 1e-12);

        let b = array![2.0, -3.0];
        let x = solve_symmetric(&a, &b).unwrap();
        assert_relative_eq!(x[0], -3.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_singular_system_is_finite() {
        // second parameter never affects the residuals
        let a = array![[2.0, 0.0], [0.0, 0.0]];
        let b = array![4.0, 0.0];
        let x = solve_symmetric(&a, &b).unwrap();
        assert!(x.iter().all(|v| v.is_finite()));
        assert_relative_eq!(x[0], 2.0, epsilon = 1e-10);
        assert!(residual_norm(&a, &x, &b) < 1e-10);

        let a = array![[1.0, 1.0], [1.0, 1.0]];
        let b = array![2.0, 2.0];
        let x = solve_symmetric(&a, &b).unwrap();
        assert!(x.iter().all(|v| v.is_finite()));
        assert!(residual_norm(&a, &x, &b) < 1e-10);
    }

    #[test]
    fn test_inconsistent_singular_system_gives_least_squares() {
        // no exact solution; the SVD returns the minimum-norm least-squares one
        let a = array![[1.0, 0.0], [0.0, 0.0]];
        let b = array![3.0, 1.0];
        let x = solve_symmetric(&a, &b).unwrap();
        assert_relative_eq!(x[0], 3.0, epsilon = 1e-10);
        assert_relative_eq!(x[1], 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_empty_and_mismatched() {
        let x = solve_symmetric(&Array2::zeros((0, 0)), &Array1::zeros(0)).unwrap();
        assert!(x.is_empty());
        assert!(matches!(
            solve_symmetric(&Array2::zeros((2, 3)), &Array1::zeros(2)),
            Err(FitError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_non_finite_input_gives_zero_step() {
        let a = array![[f64::NAN, 0.0], [0.0, 1.0]];
        let b = array![1.0, 1.0];
        assert_eq!(solve_symmetric(&a, &b).unwrap(), array![0.0, 0.0]);
    }
}

//! Numerical helpers for the optimizer.

pub mod finite_difference;
pub mod linear_solve;
pub mod matrix_convert;

// Re-export commonly used utilities
pub use finite_difference::{jacobian, DifferenceSteps, JacobianContext};
pub use linear_solve::solve_symmetric;
pub use matrix_convert::{
    faer_column_to_ndarray, nalgebra_vec_to_ndarray, ndarray_to_faer, ndarray_to_nalgebra,
    ndarray_vec_to_faer, ndarray_vec_to_nalgebra,
};

#[cfg(feature = "parallel")]
pub use finite_difference::jacobian_parallel;

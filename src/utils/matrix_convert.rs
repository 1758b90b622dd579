//! Conversions between ndarray and the linear algebra backends.
//!
//! The optimizer works on ndarray throughout. The damped system is factorized
//! with faer; nalgebra is only reached for its SVD when both faer
//! factorizations fail.
//!
//! ndarray is row-major by default and faer is column-major, so the faer
//! conversions copy element by element.

use faer::Mat;
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};

/// Convert an ndarray Array2 to a faer Mat.
pub fn ndarray_to_faer(arr: &Array2<f64>) -> Mat<f64> {
    Mat::from_fn(arr.nrows(), arr.ncols(), |i, j| arr[[i, j]])
}

/// Convert an ndarray Array1 to a single-column faer Mat, the right-hand
/// side layout faer's solvers work on in place.
pub fn ndarray_vec_to_faer(arr: &Array1<f64>) -> Mat<f64> {
    Mat::from_fn(arr.len(), 1, |i, _| arr[i])
}

/// Read the first column of a faer Mat into an ndarray Array1.
pub fn faer_column_to_ndarray(mat: &Mat<f64>) -> Array1<f64> {
    if mat.ncols() == 0 {
        return Array1::zeros(0);
    }
    (0..mat.nrows()).map(|i| mat[(i, 0)]).collect()
}

/// Convert an ndarray Array2 to a nalgebra DMatrix.
pub fn ndarray_to_nalgebra(arr: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(arr.nrows(), arr.ncols(), |i, j| arr[[i, j]])
}

/// Convert an ndarray Array1 to a nalgebra DVector.
pub fn ndarray_vec_to_nalgebra(arr: &Array1<f64>) -> DVector<f64> {
    DVector::from_iterator(arr.len(), arr.iter().copied())
}

/// Convert a nalgebra DVector to an ndarray Array1.
pub fn nalgebra_vec_to_ndarray(vec: &DVector<f64>) -> Array1<f64> {
    vec.iter().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_faer_layout_preserved() {
        let arr = Array2::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let mat = ndarray_to_faer(&arr);
        assert_eq!((mat.nrows(), mat.ncols()), (2, 3));
        assert_relative_eq!(mat[(0, 2)], 3.0);
        assert_relative_eq!(mat[(1, 0)], 4.0);
    }

    #[test]
    fn test_faer_column() {
        let arr = Array1::from_vec(vec![1.0, -2.0, 3.5]);
        let col = ndarray_vec_to_faer(&arr);
        assert_eq!((col.nrows(), col.ncols()), (3, 1));
        assert_relative_eq!(col[(1, 0)], -2.0);
        assert_eq!(faer_column_to_ndarray(&col), arr);
    }

    #[test]
    fn test_nalgebra_layout_preserved() {
        let arr = Array2::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let mat = ndarray_to_nalgebra(&arr);
        assert_eq!(mat.shape(), (2, 3));
        assert_relative_eq!(mat[(0, 2)], 3.0);
        assert_relative_eq!(mat[(1, 0)], 4.0);
    }

    #[test]
    fn test_nalgebra_vector() {
        let arr = Array1::from_vec(vec![1.0, -2.0, 3.5]);
        let vec = ndarray_vec_to_nalgebra(&arr);
        assert_eq!(vec.len(), 3);
        assert_relative_eq!(vec[1], -2.0);
        assert_eq!(nalgebra_vec_to_ndarray(&vec), arr);
    }

    #[test]
    fn test_empty_matrix() {
        let arr = Array2::<f64>::zeros((0, 0));
        assert_eq!(ndarray_to_nalgebra(&arr).shape(), (0, 0));
        assert_eq!(ndarray_to_faer(&arr).nrows(), 0);
    }
}

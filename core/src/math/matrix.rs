use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, ArrayView1, ArrayView2};

/// Singular values below this fraction of the largest count as zero.
const RANK_TOLERANCE: f64 = 1e-10;

pub struct MatrixHelper;

impl MatrixHelper {
    /// Linear least squares `design * x ≈ rhs` through an SVD of the design
    /// matrix. Returns `None` when the design is rank deficient.
    pub fn least_squares(design: ArrayView2<f64>, rhs: ArrayView1<f64>) -> Option<Array1<f64>> {
        let (rows, cols) = design.dim();
        if cols == 0 || rows < cols || rows != rhs.len() {
            return None;
        }

        let a = DMatrix::from_fn(rows, cols, |i, j| design[[i, j]]);
        let b = DVector::from_iterator(rows, rhs.iter().copied());
        let svd = a.svd(true, true);

        let largest = svd.singular_values.max();
        if !largest.is_finite() || largest <= 0.0 {
            return None;
        }
        let eps = largest * RANK_TOLERANCE;
        if svd.rank(eps) < cols {
            return None;
        }

        let x = svd.solve(&b, eps).ok()?;
        x.iter()
            .all(|v| v.is_finite())
            .then(|| Array1::from_iter(x.iter().copied()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn square_system_is_solved_exactly() {
        let a = array![[2.0, 1.0, -1.0], [-3.0, -1.0, 2.0], [-2.0, 1.0, 2.0]];
        let b = array![8.0, -11.0, -3.0];
        let x = MatrixHelper::least_squares(a.view(), b.view()).unwrap();
        assert!((x[0] - 2.0).abs() < 1e-10);
        assert!((x[1] - 3.0).abs() < 1e-10);
        assert!((x[2] + 1.0).abs() < 1e-10);
    }

    #[test]
    fn rank_deficient_design_is_rejected() {
        let design = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]];
        let rhs = array![1.0, 2.0, 3.0];
        assert!(MatrixHelper::least_squares(design.view(), rhs.view()).is_none());
    }

    #[test]
    fn least_squares_fits_line() {
        let design = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];
        let rhs = array![1.0, 3.0, 5.0, 7.0];
        let coeffs = MatrixHelper::least_squares(design.view(), rhs.view()).unwrap();
        assert!((coeffs[0] - 1.0).abs() < 1e-10);
        assert!((coeffs[1] - 2.0).abs() < 1e-10);
    }

    #[test]
    fn nearly_collinear_columns_keep_precision() {
        // Third column differs from the second by 1e-6 per row; the normal
        // equations would square that conditioning.
        let n = 200;
        let design = Array2::from_shape_fn((n, 3), |(i, j)| {
            let t = i as f64 / n as f64;
            match j {
                0 => 1.0,
                1 => t,
                _ => t + 1e-6 * ((i * 7919) % 13) as f64,
            }
        });
        let truth = [0.5, -1.25, 2.0];
        let rhs = Array1::from_shape_fn(n, |i| (0..3).map(|j| design[[i, j]] * truth[j]).sum());
        let coeffs = MatrixHelper::least_squares(design.view(), rhs.view()).unwrap();
        for (c, t) in coeffs.iter().zip(truth) {
            assert!((c - t).abs() < 1e-4, "coefficient {c} vs {t}");
        }
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let design = array![[1.0, 0.0], [1.0, 1.0]];
        let rhs = array![1.0];
        assert!(MatrixHelper::least_squares(design.view(), rhs.view()).is_none());
    }
}

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use super::sampling::bilinear_sample;
use crate::prelude::Image;

/// Polynomial coordinate map removing the optical distortion of one beam.
///
/// An output pixel `(x, y)` is read from the input at
/// `(Σ kx[i][j]·yⁱ·xʲ, Σ ky[i][j]·yⁱ·xʲ)`. Samples falling outside the input
/// are set to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistortionMap {
    pub kx: Vec<Vec<f64>>,
    pub ky: Vec<Vec<f64>>,
}

impl Default for DistortionMap {
    fn default() -> Self {
        Self::identity()
    }
}

impl DistortionMap {
    pub fn identity() -> Self {
        Self {
            kx: vec![vec![0.0, 1.0], vec![0.0, 0.0]],
            ky: vec![vec![0.0, 0.0], vec![1.0, 0.0]],
        }
    }

    pub fn is_identity(&self) -> bool {
        let expected = Self::identity();
        poly_matches(&self.kx, &expected.kx) && poly_matches(&self.ky, &expected.ky)
    }

    /// Source coordinates for output pixel `(x, y)`.
    pub fn source_xy(&self, x: f64, y: f64) -> [f64; 2] {
        [eval_poly(&self.kx, x, y), eval_poly(&self.ky, x, y)]
    }

    /// Resample `image` through the map.
    pub fn apply(&self, image: ArrayView2<f32>) -> Image {
        if self.is_identity() {
            return image.to_owned();
        }
        Array2::from_shape_fn(image.dim(), |(y, x)| {
            let [sx, sy] = self.source_xy(x as f64, y as f64);
            bilinear_sample(image, sx, sy).unwrap_or(0.0)
        })
    }
}

fn eval_poly(coeffs: &[Vec<f64>], x: f64, y: f64) -> f64 {
    let mut total = 0.0;
    let mut y_pow = 1.0;
    for row in coeffs {
        let mut x_pow = 1.0;
        for &k in row {
            total += k * y_pow * x_pow;
            x_pow *= x;
        }
        y_pow *= y;
    }
    total
}

/// Equality up to trailing zero terms.
fn poly_matches(lhs: &[Vec<f64>], rhs: &[Vec<f64>]) -> bool {
    let rows = lhs.len().max(rhs.len());
    (0..rows).all(|i| {
        let a = lhs.get(i).map(Vec::as_slice).unwrap_or(&[]);
        let b = rhs.get(i).map(Vec::as_slice).unwrap_or(&[]);
        let cols = a.len().max(b.len());
        (0..cols).all(|j| a.get(j).copied().unwrap_or(0.0) == b.get(j).copied().unwrap_or(0.0))
    })
}

//! Direct least-squares circle fitting to radial edge samples.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::edge::EdgeSample;
use crate::math::{MatrixHelper, StatsHelper};
use crate::prelude::{ReduceError, ReduceResult};

/// Circle given as a center offset `(x, y)` and a radius `r > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    x: f64,
    y: f64,
    r: f64,
}

impl Circle {
    pub fn new(x: f64, y: f64, r: f64) -> ReduceResult<Self> {
        if !(x.is_finite() && y.is_finite() && r.is_finite()) || r <= 0.0 {
            return Err(ReduceError::DegenerateGeometry(format!(
                "invalid circle x={x} y={y} r={r}"
            )));
        }
        Ok(Self { x, y, r })
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn r(&self) -> f64 {
        self.r
    }

    pub fn center(&self) -> [f64; 2] {
        [self.x, self.y]
    }

    /// Same circle with its center moved by `(dx, dy)`.
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            r: self.r,
        }
    }

    /// Radius the circle implies along direction `theta` from the origin,
    /// `x·cosθ + y·sinθ + sqrt(r² − (x·sinθ − y·cosθ)²)`.
    pub fn radius_at(&self, theta: f64) -> f64 {
        let (sin, cos) = theta.sin_cos();
        let perp = self.x * sin - self.y * cos;
        self.x * cos + self.y * sin + (self.r * self.r - perp * perp).sqrt()
    }
}

/// Fit outcome with residual statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircleFit {
    pub circle: Circle,
    /// RMS radial residual of the samples used (pixels).
    pub rms: f64,
    pub n_used: usize,
    pub n_rejected: usize,
}

/// Stateless circle fitter.
pub struct CircleFitter;

impl CircleFitter {
    /// Fit all finite samples. The center is relative to the scan origin.
    ///
    /// Solves the linearised form `x² + y² = 2a·x + 2b·y + c` in one
    /// least-squares step; `r² = c + a² + b²`.
    pub fn fit(samples: &[EdgeSample]) -> ReduceResult<Circle> {
        let points: Vec<[f64; 2]> = samples
            .iter()
            .filter(|s| s.radius.is_finite())
            .map(|s| [s.radius * s.theta.cos(), s.radius * s.theta.sin()])
            .collect();
        fit_points(&points)
    }

    /// Fit, drop samples whose residual exceeds `k_sigma` times the RMS (and
    /// window-boundary hits), then refit once.
    pub fn fit_clipped(samples: &[EdgeSample], k_sigma: f64) -> ReduceResult<CircleFit> {
        let finite: Vec<EdgeSample> = samples.iter().copied().filter(|s| s.radius.is_finite()).collect();
        let interior: Vec<EdgeSample> = finite.iter().copied().filter(|s| s.is_usable()).collect();
        let first_pass = if interior.len() >= 3 { interior } else { finite };

        let circle = Self::fit(&first_pass)?;
        let residuals = radial_residuals(&circle, &first_pass);
        let rms = StatsHelper::rms(&residuals);
        let limit = (k_sigma * rms).max(0.25);

        let kept: Vec<EdgeSample> = first_pass
            .iter()
            .zip(&residuals)
            .filter(|(_, res)| res.abs() <= limit)
            .map(|(s, _)| *s)
            .collect();

        let n_rejected = samples.len() - kept.len();
        if kept.len() == first_pass.len() || kept.len() < 3 {
            return Ok(CircleFit {
                circle,
                rms,
                n_used: first_pass.len(),
                n_rejected: samples.len() - first_pass.len(),
            });
        }

        let refit = Self::fit(&kept)?;
        let rms = StatsHelper::rms(&radial_residuals(&refit, &kept));
        Ok(CircleFit {
            circle: refit,
            rms,
            n_used: kept.len(),
            n_rejected,
        })
    }
}

/// Signed distance of each sample from the fitted circle.
fn radial_residuals(circle: &Circle, samples: &[EdgeSample]) -> Vec<f64> {
    samples
        .iter()
        .map(|s| {
            let px = s.radius * s.theta.cos() - circle.x;
            let py = s.radius * s.theta.sin() - circle.y;
            px.hypot(py) - circle.r
        })
        .collect()
}

fn fit_points(points: &[[f64; 2]]) -> ReduceResult<Circle> {
    let n = points.len();
    if n < 3 {
        return Err(ReduceError::InsufficientData(format!(
            "circle fit needs at least 3 edge samples, got {n}"
        )));
    }

    // Shift to the centroid for conditioning.
    let mean_x = points.iter().map(|p| p[0]).sum::<f64>() / n as f64;
    let mean_y = points.iter().map(|p| p[1]).sum::<f64>() / n as f64;

    let mut design = Array2::<f64>::zeros((n, 3));
    let mut rhs = Array1::<f64>::zeros(n);
    for (i, p) in points.iter().enumerate() {
        let u = p[0] - mean_x;
        let v = p[1] - mean_y;
        design[[i, 0]] = 2.0 * u;
        design[[i, 1]] = 2.0 * v;
        design[[i, 2]] = 1.0;
        rhs[i] = u * u + v * v;
    }

    let coeffs = MatrixHelper::least_squares(design.view(), rhs.view()).ok_or_else(|| {
        ReduceError::InsufficientData(format!("{n} edge samples are collinear"))
    })?;
    let (a, b, c) = (coeffs[0], coeffs[1], coeffs[2]);
    let r2 = c + a * a + b * b;
    if r2 <= 0.0 {
        return Err(ReduceError::DegenerateGeometry(format!(
            "circle fit produced non-positive squared radius {r2}"
        )));
    }
    Circle::new(mean_x + a, mean_y + b, r2.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::TAU;

    fn samples_on(circle: &Circle, n: usize) -> Vec<EdgeSample> {
        (0..n)
            .map(|k| {
                let theta = TAU * k as f64 / n as f64;
                EdgeSample {
                    theta,
                    radius: circle.radius_at(theta),
                    at_boundary: false,
                }
            })
            .collect()
    }

    #[test]
    fn exact_samples_recover_circle() {
        let truth = Circle::new(3.5, -2.25, 180.0).unwrap();
        let fitted = CircleFitter::fit(&samples_on(&truth, 360)).unwrap();
        assert!((fitted.x() - 3.5).abs() < 1e-9);
        assert!((fitted.y() + 2.25).abs() < 1e-9);
        assert!((fitted.r() - 180.0).abs() < 1e-9);
    }

    #[test]
    fn too_few_samples_is_insufficient_data() {
        let truth = Circle::new(0.0, 0.0, 10.0).unwrap();
        let samples = samples_on(&truth, 2);
        assert!(matches!(
            CircleFitter::fit(&samples),
            Err(ReduceError::InsufficientData(_))
        ));
    }

    #[test]
    fn repeated_point_is_rejected() {
        let samples = vec![
            EdgeSample {
                theta: 0.5,
                radius: 10.0,
                at_boundary: false,
            };
            5
        ];
        assert!(CircleFitter::fit(&samples).is_err());
    }

    #[test]
    fn clipping_removes_outliers() {
        let truth = Circle::new(1.0, 2.0, 50.0).unwrap();
        let mut samples = samples_on(&truth, 90);
        samples[10].radius += 12.0;
        samples[40].radius -= 9.0;
        samples[41].radius = f64::NAN;
        let fit = CircleFitter::fit_clipped(&samples, 3.0).unwrap();
        assert!((fit.circle.x() - 1.0).abs() < 1e-6);
        assert!((fit.circle.y() - 2.0).abs() < 1e-6);
        assert!((fit.circle.r() - 50.0).abs() < 1e-6);
        assert_eq!(fit.n_rejected, 3);
    }

    #[test]
    fn circle_rejects_non_positive_radius() {
        assert!(Circle::new(0.0, 0.0, 0.0).is_err());
        assert!(Circle::new(f64::NAN, 0.0, 1.0).is_err());
    }
}

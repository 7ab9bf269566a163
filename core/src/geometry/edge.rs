//! Radial edge scanning around a guessed circle.
//!
//! For each scan angle the intensity profile is sampled along the ray over
//! `[guess - half_width, guess + half_width]`, differentiated, and the radius
//! of the derivative extremum with the requested sign is reported.

use std::f64::consts::TAU;

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use super::sampling::bilinear_sample;

/// Sign convention for the radial derivative at an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polarity {
    /// Rising edge (`dI/dr > 0`), e.g. the occulter rim.
    Pos,
    /// Falling edge (`dI/dr < 0`), e.g. the field stop.
    Neg,
}

/// One measured edge point in polar coordinates around the scan center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeSample {
    /// Scan angle in radians, `[0, 2π)`.
    pub theta: f64,
    /// Edge radius in pixels; NaN when the ray left the image.
    pub radius: f64,
    /// Extremum fell on the first or last sample of the window.
    pub at_boundary: bool,
}

impl EdgeSample {
    pub fn is_usable(&self) -> bool {
        self.radius.is_finite() && !self.at_boundary
    }
}

/// Configuration for radial edge scanning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeScanConfig {
    /// Number of scan angles covering the full circle.
    pub n_angles: usize,
    /// Half-width of the radial search window (pixels).
    pub half_width: f64,
    /// Step along each ray (pixels).
    pub r_step: f64,
    /// Refine the extremum with a three-point parabola.
    pub subpixel: bool,
}

impl Default for EdgeScanConfig {
    fn default() -> Self {
        Self {
            n_angles: 360,
            half_width: 12.0,
            r_step: 0.5,
            subpixel: true,
        }
    }
}

/// Scans an image along radii from a fixed center.
#[derive(Clone, Copy)]
pub struct RadialEdgeFinder<'a> {
    image: ArrayView2<'a, f32>,
    center: [f64; 2],
}

impl<'a> RadialEdgeFinder<'a> {
    /// `center` is `[x, y]` in pixel coordinates of `image`.
    pub fn new(image: ArrayView2<'a, f32>, center: [f64; 2]) -> Self {
        Self { image, center }
    }

    /// Produce one [`EdgeSample`] per scan angle. Outliers are kept; the
    /// circle fit deals with them.
    pub fn scan(&self, radius_guess: f64, cfg: &EdgeScanConfig, polarity: Polarity) -> Vec<EdgeSample> {
        let n_angles = cfg.n_angles.max(1);
        let step = cfg.r_step.max(1e-3);
        let n_r = ((2.0 * cfg.half_width.max(step)) / step).round() as usize + 1;
        let r_start = radius_guess - cfg.half_width.max(step);

        let mut profile = vec![0.0f32; n_r];
        let mut derivative = vec![0.0f32; n_r];

        (0..n_angles)
            .map(|k| {
                let theta = TAU * k as f64 / n_angles as f64;
                let (sin, cos) = theta.sin_cos();
                let mut complete = true;
                for (j, value) in profile.iter_mut().enumerate() {
                    let r = r_start + j as f64 * step;
                    match bilinear_sample(self.image, self.center[0] + r * cos, self.center[1] + r * sin) {
                        Some(v) if v.is_finite() => *value = v,
                        _ => {
                            complete = false;
                            break;
                        }
                    }
                }
                if !complete {
                    return EdgeSample {
                        theta,
                        radius: f64::NAN,
                        at_boundary: true,
                    };
                }

                radial_derivative_into(&profile, step as f32, &mut derivative);
                let idx = peak_idx(&derivative, polarity);
                let at_boundary = idx == 0 || idx + 1 == n_r;
                let offset = if cfg.subpixel && !at_boundary {
                    parabola_vertex(derivative[idx - 1], derivative[idx], derivative[idx + 1])
                } else {
                    0.0
                };

                EdgeSample {
                    theta,
                    radius: r_start + (idx as f64 + offset) * step,
                    at_boundary,
                }
            })
            .collect()
    }
}

/// Index of the strongest derivative response for the requested polarity.
pub fn peak_idx(values: &[f32], polarity: Polarity) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        let better = match polarity {
            Polarity::Pos => v > values[best],
            Polarity::Neg => v < values[best],
        };
        if better {
            best = i;
        }
    }
    best
}

/// Central-difference derivative; the end samples use one-sided differences.
pub fn radial_derivative_into(values: &[f32], step: f32, out: &mut [f32]) {
    let n = values.len();
    debug_assert_eq!(out.len(), n);
    if n == 0 {
        return;
    }
    if n == 1 {
        out[0] = 0.0;
        return;
    }

    out[0] = (values[1] - values[0]) / step;
    for i in 1..(n - 1) {
        out[i] = (values[i + 1] - values[i - 1]) / (2.0 * step);
    }
    out[n - 1] = (values[n - 1] - values[n - 2]) / step;
}

/// Vertex offset (in samples, within ±0.5) of the parabola through three
/// equally spaced values centered on the middle one.
fn parabola_vertex(left: f32, mid: f32, right: f32) -> f64 {
    let denom = (left - 2.0 * mid + right) as f64;
    if denom.abs() < 1e-12 {
        return 0.0;
    }
    (0.5 * (left - right) as f64 / denom).clamp(-0.5, 0.5)
}

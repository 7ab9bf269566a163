//! Closed-form Gaussian through three equally spaced samples.

/// Line profile `peak * exp(-(λ - λc - shift)² / width²)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianFit {
    /// Line-center offset from the middle sample (same unit as `d_lambda`).
    pub shift: f64,
    /// 1/e half-width.
    pub width: f64,
    pub peak: f64,
}

/// Fit through `(−d, i1)`, `(0, i2)`, `(+d, i3)`.
///
/// `None` when any intensity is non-positive or the samples are not
/// concave in log space; callers turn that into a NaN pixel.
pub fn three_point(i1: f64, i2: f64, i3: f64, d_lambda: f64) -> Option<GaussianFit> {
    if !(i1 > 0.0 && i2 > 0.0 && i3 > 0.0) || d_lambda == 0.0 {
        return None;
    }
    let a = (i3 / i2).ln();
    let b = (i1 / i2).ln();
    let curvature = a + b;
    if !(curvature < 0.0) {
        return None;
    }
    let width_sq = -2.0 * d_lambda * d_lambda / curvature;
    let shift = width_sq * (a - b) / (4.0 * d_lambda);
    let peak = i2 * (shift * shift / width_sq).exp();
    let fit = GaussianFit {
        shift,
        width: width_sq.sqrt(),
        peak,
    };
    (fit.shift.is_finite() && fit.width.is_finite() && fit.peak.is_finite()).then_some(fit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(peak: f64, center: f64, width: f64, x: f64) -> f64 {
        peak * (-((x - center) / width).powi(2)).exp()
    }

    #[test]
    fn symmetric_profile_has_zero_shift() {
        let d = 0.12;
        let (w, p) = (0.07, 20.0);
        let fit = three_point(profile(p, 0.0, w, -d), p, profile(p, 0.0, w, d), d).unwrap();
        assert_eq!(fit.shift, 0.0);
        assert!((fit.width - w).abs() < 1e-12);
        assert!((fit.peak - p).abs() < 1e-9);
    }

    #[test]
    fn recovers_shifted_line() {
        let d = 0.12;
        let (center, w, p) = (0.015, 0.065, 8.0);
        let samples: Vec<f64> = [-d, 0.0, d].iter().map(|&x| profile(p, center, w, x)).collect();
        let fit = three_point(samples[0], samples[1], samples[2], d).unwrap();
        assert!((fit.shift - center).abs() < 1e-12);
        assert!((fit.width - w).abs() < 1e-12);
        assert!((fit.peak - p).abs() < 1e-9);
        assert!(fit.peak >= samples[1]);
    }

    #[test]
    fn degenerate_samples_have_no_fit() {
        assert!(three_point(0.0, 1.0, 1.0, 0.1).is_none());
        assert!(three_point(1.0, 1.0, 1.0, 0.1).is_none());
        assert!(three_point(2.0, 1.0, 2.0, 0.1).is_none());
        assert!(three_point(1.0, 2.0, 1.0, 0.0).is_none());
        assert!(three_point(f64::NAN, 2.0, 1.0, 0.1).is_none());
    }
}

//! Removal of the instrumental east–west velocity trend and the
//! self-consistent rest wavelength.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::context::{WaveConstants, SPEED_OF_LIGHT_KMS};
use crate::math::{MatrixHelper, StatsHelper};
use crate::prelude::{Image, StageNotes};
use crate::telemetry::LogManager;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DopplerConfig {
    /// Warn when the fitted temperature trend (km/s per unit fractional
    /// peak intensity) exceeds this magnitude.
    pub temp_trend_warn: f64,
    /// Fewer good pixels than this skips the trend fit.
    pub min_good_pixels: usize,
    /// Derive the rest wavelength from the corrected velocities.
    pub auto_rest_wavelength: bool,
}

impl Default for DopplerConfig {
    fn default() -> Self {
        Self {
            temp_trend_warn: 0.5,
            min_good_pixels: 50,
            auto_rest_wavelength: true,
        }
    }
}

/// Fitted trend coefficients, km/s.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendFit {
    pub offset: f64,
    /// Per occulter radius of east–west displacement.
    pub east_west: f64,
    /// Per unit fractional peak intensity; `None` when only the spatial
    /// trend could be fitted.
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct DopplerCorrection {
    /// Published velocity, km/s.
    pub velocity: Image,
    pub rest_wavelength: f64,
    /// Median corrected velocity removed when deriving the rest wavelength.
    pub velocity_offset: f64,
    pub trend: Option<TrendFit>,
    pub n_good: usize,
    pub notes: StageNotes,
}

pub struct DopplerCorrector<'a> {
    config: &'a DopplerConfig,
    constants: &'a WaveConstants,
}

impl<'a> DopplerCorrector<'a> {
    pub fn new(config: &'a DopplerConfig, constants: &'a WaveConstants) -> Self {
        Self { config, constants }
    }

    /// `velocity` is NaN wherever the pixel failed the quality gates; every
    /// finite pixel with a finite `peak` is used in the fit.
    pub fn correct(
        &self,
        velocity: &Image,
        peak: &Image,
        disk_center: [f64; 2],
        occulter_radius: f64,
        logger: &LogManager,
    ) -> DopplerCorrection {
        let mut notes = StageNotes::default();
        let good: Vec<(usize, f64, f64)> = velocity
            .indexed_iter()
            .filter_map(|((y, x), &v)| {
                let p = peak[[y, x]];
                (v.is_finite() && p.is_finite()).then_some((x, v as f64, p as f64))
            })
            .collect();
        let n_good = good.len();
        let scale = if occulter_radius > 0.0 { occulter_radius } else { 1.0 };
        let xn = |x: usize| (x as f64 - disk_center[0]) / scale;

        let trend = if n_good < self.config.min_good_pixels {
            let message = format!(
                "only {n_good} good velocity pixels (need {}); skipping trend correction",
                self.config.min_good_pixels
            );
            logger.warn(&message);
            notes.warn(message);
            None
        } else {
            let fit = self.fit_trend(&good, &xn);
            if fit.is_none() {
                let message = format!(
                    "velocity trend is unconstrained over {n_good} good pixels; skipping trend correction"
                );
                logger.warn(&message);
                notes.warn(message);
            }
            fit
        };

        if let Some(TrendFit {
            temperature: Some(t),
            ..
        }) = trend
        {
            if t.abs() > self.config.temp_trend_warn {
                let message = format!("temperature trend {t:.3} km/s exceeds {:.3}; correction is suspect", self.config.temp_trend_warn);
                logger.warn(&message);
                notes.warn(message);
            }
        }

        let east_west = trend.map(|fit| fit.east_west).unwrap_or(0.0);
        let mut corrected = Array2::from_elem(velocity.dim(), f32::NAN);
        for ((y, x), &v) in velocity.indexed_iter() {
            if v.is_finite() {
                corrected[[y, x]] = (v as f64 - east_west * xn(x)) as f32;
            }
        }

        let mut rest_wavelength = self.constants.rest_wavelength;
        let mut velocity_offset = 0.0;
        if self.config.auto_rest_wavelength {
            let values: Vec<f64> = corrected.iter().map(|&v| v as f64).collect();
            match StatsHelper::median(&values) {
                Some(offset) => {
                    velocity_offset = offset;
                    rest_wavelength += offset * self.constants.nominal_wavelength / SPEED_OF_LIGHT_KMS;
                    corrected.mapv_inplace(|v| (v as f64 - offset) as f32);
                    notes.note(format!("rest wavelength {rest_wavelength:.5} nm (offset {offset:.3} km/s)"));
                }
                None => {
                    let message = "no good velocity pixels; using tabulated rest wavelength".to_string();
                    logger.warn(&message);
                    notes.warn(message);
                }
            }
        }

        if let Some(fit) = trend {
            logger.debug(&format!(
                "doppler trend: offset {:.3} east-west {:.3} temperature {:?} over {n_good} pixels",
                fit.offset, fit.east_west, fit.temperature
            ));
        }

        DopplerCorrection {
            velocity: corrected,
            rest_wavelength,
            velocity_offset,
            trend,
            n_good,
            notes,
        }
    }

    fn fit_trend(&self, good: &[(usize, f64, f64)], xn: &impl Fn(usize) -> f64) -> Option<TrendFit> {
        let peaks: Vec<f64> = good.iter().map(|g| g.2).collect();
        let median_peak = StatsHelper::median(&peaks).filter(|m| *m != 0.0);
        let rhs = ndarray::Array1::from_iter(good.iter().map(|g| g.1));

        if let Some(median_peak) = median_peak {
            let design = Array2::from_shape_fn((good.len(), 3), |(row, col)| match col {
                0 => 1.0,
                1 => xn(good[row].0),
                _ => (good[row].2 - median_peak) / median_peak,
            });
            if let Some(c) = MatrixHelper::least_squares(design.view(), rhs.view()) {
                return Some(TrendFit {
                    offset: c[0],
                    east_west: c[1],
                    temperature: Some(c[2]),
                });
            }
        }

        let design = Array2::from_shape_fn((good.len(), 2), |(row, col)| match col {
            0 => 1.0,
            _ => xn(good[row].0),
        });
        MatrixHelper::least_squares(design.view(), rhs.view()).map(|c| TrendFit {
            offset: c[0],
            east_west: c[1],
            temperature: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{InstrumentContext, WaveType};

    fn maps(f: impl Fn(usize, usize) -> (f32, f32)) -> (Image, Image) {
        let v = Array2::from_shape_fn((20, 20), |(y, x)| f(y, x).0);
        let p = Array2::from_shape_fn((20, 20), |(y, x)| f(y, x).1);
        (v, p)
    }

    #[test]
    fn removes_east_west_trend_and_median_offset() {
        let ctx = InstrumentContext::default();
        let constants = ctx.waves.lookup(WaveType::Fe1074).unwrap();
        let corrector = DopplerCorrector::new(&ctx.doppler, constants);
        // v = 2 + 3 * (x - 9.5) / 10 with uniform peak.
        let (v, p) = maps(|_, x| ((2.0 + 0.3 * (x as f64 - 9.5)) as f32, 15.0));
        let out = corrector.correct(&v, &p, [9.5, 9.5], 10.0, &LogManager::new());

        let fit = out.trend.unwrap();
        assert!((fit.east_west - 3.0).abs() < 1e-4);
        assert_eq!(fit.temperature, None);
        assert!((out.velocity_offset - 2.0).abs() < 1e-4);
        assert!(out.velocity.iter().all(|v| v.abs() < 1e-4));
        let expected_rest = constants.rest_wavelength + 2.0 * constants.nominal_wavelength / SPEED_OF_LIGHT_KMS;
        assert!((out.rest_wavelength - expected_rest).abs() < 1e-8);
        assert!(out.notes.warnings.is_empty());
    }

    #[test]
    fn temperature_trend_is_fitted_but_not_removed() {
        let ctx = InstrumentContext::default();
        let constants = ctx.waves.lookup(WaveType::Fe1079).unwrap();
        let config = DopplerConfig {
            auto_rest_wavelength: false,
            ..Default::default()
        };
        let corrector = DopplerCorrector::new(&config, constants);
        // Peak varies with y only; velocity carries 2 km/s per unit fraction.
        let (v, p) = maps(|y, x| {
            let peak = 10.0 + (y as f64 - 9.5) * 0.2;
            let frac = (peak - 10.0) / 10.0;
            ((0.1 * (x as f64 - 9.5) + 2.0 * frac) as f32, peak as f32)
        });
        let out = corrector.correct(&v, &p, [9.5, 9.5], 10.0, &LogManager::new());
        let fit = out.trend.unwrap();
        assert!((fit.east_west - 1.0).abs() < 1e-3);
        assert!((fit.temperature.unwrap() - 2.0).abs() < 1e-2);
        assert_eq!(out.rest_wavelength, constants.rest_wavelength);
        assert_eq!(out.notes.warnings.len(), 1);
        // Only the spatial part is subtracted.
        let expected = v[[0, 3]] - 0.1 * (3.0 - 9.5);
        assert!((out.velocity[[0, 3]] - expected).abs() < 1e-3);
    }

    #[test]
    fn too_few_pixels_skips_the_fit() {
        let ctx = InstrumentContext::default();
        let constants = ctx.waves.lookup(WaveType::Fe1074).unwrap();
        let corrector = DopplerCorrector::new(&ctx.doppler, constants);
        let (v, p) = maps(|y, x| if y == 0 && x < 10 { (1.0, 5.0) } else { (f32::NAN, f32::NAN) });
        let out = corrector.correct(&v, &p, [9.5, 9.5], 10.0, &LogManager::new());
        assert!(out.trend.is_none());
        assert_eq!(out.n_good, 10);
        assert!(!out.notes.warnings.is_empty());
        assert_eq!(out.velocity[[0, 0]], 0.0);
        assert!(out.velocity[[5, 5]].is_nan());
    }

    #[test]
    fn unconstrained_trend_is_reported() {
        let ctx = InstrumentContext::default();
        let constants = ctx.waves.lookup(WaveType::Fe1074).unwrap();
        let config = DopplerConfig {
            min_good_pixels: 10,
            ..Default::default()
        };
        let corrector = DopplerCorrector::new(&config, constants);
        // Every good pixel sits in column 4, so the east-west slope is free.
        let (v, p) = maps(|y, x| if x == 4 { (1.0 + 0.01 * y as f32, 8.0) } else { (f32::NAN, 8.0) });
        let out = corrector.correct(&v, &p, [9.5, 9.5], 10.0, &LogManager::new());
        assert_eq!(out.n_good, 20);
        assert!(out.trend.is_none());
        assert_eq!(out.notes.warnings.len(), 1);
        assert!(out.notes.warnings[0].contains("unconstrained"));
        assert!(out.velocity[[0, 4]].is_finite());
        assert!(out.velocity[[0, 5]].is_nan());
    }
}

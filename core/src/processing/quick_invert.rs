//! Polarization and line-parameter maps from the three tunes nearest line
//! center.

use ndarray::Array2;
use serde::Serialize;

use super::doppler::DopplerCorrection;
use super::gaussian;
use crate::context::{InstrumentContext, WaveConstants, WaveType, SPEED_OF_LIGHT_KMS};
use crate::interface::{CenterTunes, Stokes, WavelengthStack};
use crate::prelude::{Image, Mask, ReduceError, ReduceResult};

/// `radial_azimuth` value where there is no signal.
pub const RADIAL_AZIMUTH_FILL: f32 = -999.0;

/// Maps before the Doppler correction.
#[derive(Debug, Clone)]
pub struct RawInversion {
    pub intensity: Image,
    pub q: Image,
    pub u: Image,
    pub linear_pol: Image,
    pub azimuth: Image,
    pub radial_azimuth: Image,
    /// Line-of-sight velocity (km/s), NaN where the velocity gate fails.
    pub velocity: Image,
    /// Line FWHM (km/s), NaN where the velocity gate fails.
    pub line_width: Image,
    pub peak_intensity: Image,
    pub tunes: CenterTunes,
    /// Pixels passing the velocity gate.
    pub n_velocity: usize,
}

/// Published per-pixel maps.
#[derive(Debug, Clone, Serialize)]
pub struct QuickInvertResult {
    pub intensity: Image,
    pub q: Image,
    pub u: Image,
    pub linear_pol: Image,
    pub azimuth: Image,
    pub radial_azimuth: Image,
    pub raw_velocity: Image,
    pub corrected_velocity: Image,
    pub line_width: Image,
    pub peak_intensity: Image,
    /// Rest wavelength the corrected velocity is referenced to (nm).
    pub rest_wavelength: f64,
}

impl RawInversion {
    pub fn finish(self, correction: DopplerCorrection) -> QuickInvertResult {
        QuickInvertResult {
            intensity: self.intensity,
            q: self.q,
            u: self.u,
            linear_pol: self.linear_pol,
            azimuth: self.azimuth,
            radial_azimuth: self.radial_azimuth,
            raw_velocity: self.velocity,
            corrected_velocity: correction.velocity,
            line_width: self.line_width,
            peak_intensity: self.peak_intensity,
            rest_wavelength: correction.rest_wavelength,
        }
    }
}

/// Azimuth of linear polarization in degrees, `[0, 180)`.
pub fn azimuth_deg(q: f64, u: f64) -> f64 {
    let az = 0.5 * u.atan2(q).to_degrees();
    if az < 0.0 {
        az + 180.0
    } else {
        az
    }
}

/// Azimuth relative to the radial direction `theta_deg`, `[-90, 90)`.
pub fn radial_azimuth_deg(azimuth: f64, theta_deg: f64) -> f64 {
    (azimuth - theta_deg + 90.0).rem_euclid(180.0) - 90.0
}

pub struct QuickInvertEngine<'a> {
    wave: WaveType,
    constants: &'a WaveConstants,
    fwhm_factor: f64,
}

impl<'a> QuickInvertEngine<'a> {
    pub fn new(ctx: &'a InstrumentContext, wave: WaveType) -> ReduceResult<Self> {
        Ok(Self {
            wave,
            constants: ctx.waves.lookup(wave)?,
            fwhm_factor: ctx.fwhm_factor,
        })
    }

    pub fn wave(&self) -> WaveType {
        self.wave
    }

    pub fn constants(&self) -> &WaveConstants {
        self.constants
    }

    /// Compute the gated maps. `disk_center` is the occulter center `[x, y]`
    /// used for the radial azimuth.
    pub fn invert(&self, stack: &WavelengthStack, mask: &Mask, disk_center: [f64; 2]) -> ReduceResult<RawInversion> {
        let shape = stack.shape();
        if mask.dim() != shape {
            return Err(ReduceError::Configuration(format!(
                "mask shape {:?} does not match image shape {shape:?}",
                mask.dim()
            )));
        }
        let k = self.constants;
        let tunes = stack.center_tunes(k.rest_wavelength)?;
        let [blue, center, red] = tunes.indices;
        let i1 = stack.require_plane(Stokes::I, blue)?;
        let i2 = stack.require_plane(Stokes::I, center)?;
        let i3 = stack.require_plane(Stokes::I, red)?;
        let q_in = stack.require_plane(Stokes::Q, center)?;
        let u_in = stack.require_plane(Stokes::U, center)?;

        let kms_per_nm = SPEED_OF_LIGHT_KMS / k.nominal_wavelength;
        let nan = || Array2::from_elem(shape, f32::NAN);
        let mut out = RawInversion {
            intensity: Array2::zeros(shape),
            q: nan(),
            u: nan(),
            linear_pol: nan(),
            azimuth: nan(),
            radial_azimuth: nan(),
            velocity: nan(),
            line_width: nan(),
            peak_intensity: nan(),
            tunes,
            n_velocity: 0,
        };

        for ((y, x), &m) in mask.indexed_iter() {
            let m = m as f64;
            let intensity = i2[[y, x]] as f64;
            if !(m > 0.0 && intensity > 0.0) {
                out.azimuth[[y, x]] = 0.0;
                out.radial_azimuth[[y, x]] = RADIAL_AZIMUTH_FILL;
                continue;
            }
            out.intensity[[y, x]] = (intensity * m) as f32;

            if intensity >= k.polarization_int_min && intensity <= k.int_max {
                let q = q_in[[y, x]] as f64 * m;
                let u = u_in[[y, x]] as f64 * m;
                let azimuth = azimuth_deg(q, u);
                let theta = (y as f64 - disk_center[1]).atan2(x as f64 - disk_center[0]).to_degrees();
                out.q[[y, x]] = q as f32;
                out.u[[y, x]] = u as f32;
                out.linear_pol[[y, x]] = q.hypot(u) as f32;
                out.azimuth[[y, x]] = azimuth as f32;
                out.radial_azimuth[[y, x]] = radial_azimuth_deg(azimuth, theta) as f32;
            }

            if intensity < k.velocity_int_min || intensity > k.int_max {
                continue;
            }
            let Some(fit) = gaussian::three_point(
                i1[[y, x]] as f64,
                intensity,
                i3[[y, x]] as f64,
                tunes.d_lambda,
            ) else {
                continue;
            };
            let fwhm = fit.width * kms_per_nm * self.fwhm_factor;
            if fit.peak < intensity || fwhm < k.fwhm_min_kms || fwhm > k.fwhm_max_kms {
                continue;
            }
            let velocity = (tunes.center_wavelength + fit.shift - k.rest_wavelength) * kms_per_nm;
            out.velocity[[y, x]] = velocity as f32;
            out.line_width[[y, x]] = fwhm as f32;
            out.peak_intensity[[y, x]] = fit.peak as f32;
            out.n_velocity += 1;
        }

        Ok(out)
    }
}

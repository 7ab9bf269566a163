//! Immutable per-run calibration context.
//!
//! Loaded once and passed by reference to every component. Nothing in the
//! core mutates it, so it is shared freely across files processed in
//! parallel.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::geometry::distortion::DistortionMap;
use crate::geometry::edge::EdgeScanConfig;
use crate::mask::MaskDefaults;
use crate::prelude::{ReduceError, ReduceResult};
use crate::processing::doppler::DopplerConfig;

/// Speed of light in km/s.
pub const SPEED_OF_LIGHT_KMS: f64 = 299_792.458;

/// Observed spectral line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WaveType {
    #[serde(rename = "1074")]
    Fe1074,
    #[serde(rename = "1079")]
    Fe1079,
    #[serde(rename = "1083")]
    He1083,
}

impl WaveType {
    pub const ALL: [WaveType; 3] = [WaveType::Fe1074, WaveType::Fe1079, WaveType::He1083];

    pub fn nanometers(self) -> u32 {
        match self {
            WaveType::Fe1074 => 1074,
            WaveType::Fe1079 => 1079,
            WaveType::He1083 => 1083,
        }
    }
}

impl TryFrom<u32> for WaveType {
    type Error = ReduceError;

    fn try_from(value: u32) -> ReduceResult<Self> {
        WaveType::ALL
            .into_iter()
            .find(|wave| wave.nanometers() == value)
            .ok_or(ReduceError::UnknownWaveType(value))
    }
}

impl FromStr for WaveType {
    type Err = ReduceError;

    fn from_str(s: &str) -> ReduceResult<Self> {
        let value: u32 = s
            .trim()
            .parse()
            .map_err(|_| ReduceError::Configuration(format!("wave type '{s}' is not a number")))?;
        WaveType::try_from(value)
    }
}

impl fmt::Display for WaveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.nanometers())
    }
}

/// Per-line constants: reference wavelengths and quality-gate thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveConstants {
    /// Rest wavelength used as the velocity zero point (nm).
    pub rest_wavelength: f64,
    /// Nominal wavelength used to scale shifts into velocities (nm).
    pub nominal_wavelength: f64,
    /// Minimum center intensity for velocity output.
    pub velocity_int_min: f64,
    /// Maximum center intensity for velocity and polarization output.
    pub int_max: f64,
    /// Minimum center intensity for polarization output.
    pub polarization_int_min: f64,
    /// Accepted line FWHM range (km/s) for velocity output.
    pub fwhm_min_kms: f64,
    pub fwhm_max_kms: f64,
}

/// Lookup table of [`WaveConstants`] keyed by [`WaveType`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaveTable(BTreeMap<WaveType, WaveConstants>);

impl WaveTable {
    pub fn new(entries: BTreeMap<WaveType, WaveConstants>) -> Self {
        Self(entries)
    }

    pub fn lookup(&self, wave: WaveType) -> ReduceResult<&WaveConstants> {
        self.0.get(&wave).ok_or_else(|| {
            ReduceError::Configuration(format!("no calibration constants for wave type {wave}"))
        })
    }
}

impl Default for WaveTable {
    fn default() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            WaveType::Fe1074,
            WaveConstants {
                rest_wavelength: 1074.62,
                nominal_wavelength: 1074.7,
                velocity_int_min: 1.0,
                int_max: 60.0,
                polarization_int_min: 0.5,
                fwhm_min_kms: 20.0,
                fwhm_max_kms: 120.0,
            },
        );
        entries.insert(
            WaveType::Fe1079,
            WaveConstants {
                rest_wavelength: 1079.78,
                nominal_wavelength: 1079.8,
                velocity_int_min: 0.25,
                int_max: 60.0,
                polarization_int_min: 0.25,
                fwhm_min_kms: 20.0,
                fwhm_max_kms: 120.0,
            },
        );
        entries.insert(
            WaveType::He1083,
            WaveConstants {
                rest_wavelength: 1083.0,
                nominal_wavelength: 1083.0,
                velocity_int_min: 1.0,
                int_max: 1000.0,
                polarization_int_min: 0.5,
                fwhm_min_kms: 20.0,
                fwhm_max_kms: 150.0,
            },
        );
        Self(entries)
    }
}

/// Distortion maps for the two beams.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamDistortion {
    pub beam1: DistortionMap,
    pub beam2: DistortionMap,
}

/// Shared calibration data for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentContext {
    /// Full detector frame edge length (pixels).
    pub frame_size: usize,
    /// Beam sub-image edge length (pixels).
    pub beam_size: usize,
    pub waves: WaveTable,
    /// Converts a Gaussian 1/e half-width into a FWHM.
    pub fwhm_factor: f64,
    pub mask: MaskDefaults,
    /// Calibrated occulter radius (pixels) keyed by occulter ID.
    pub occulter_radii: BTreeMap<String, f64>,
    pub distortion: BeamDistortion,
    pub edges: EdgeScanConfig,
    pub doppler: DopplerConfig,
}

impl Default for InstrumentContext {
    fn default() -> Self {
        let occulter_radii = [
            ("1", 224.0),
            ("2", 228.0),
            ("3", 232.0),
            ("4", 236.0),
            ("31", 231.0),
            ("41", 235.0),
        ]
        .into_iter()
        .map(|(id, radius)| (id.to_string(), radius))
        .collect();

        Self {
            frame_size: 1024,
            beam_size: 620,
            waves: WaveTable::default(),
            fwhm_factor: 2.0 * std::f64::consts::LN_2.sqrt(),
            mask: MaskDefaults::default(),
            occulter_radii,
            distortion: BeamDistortion::default(),
            edges: EdgeScanConfig::default(),
            doppler: DopplerConfig::default(),
        }
    }
}

impl InstrumentContext {
    pub fn occulter_radius(&self, occulter_id: &str) -> ReduceResult<f64> {
        self.occulter_radii
            .get(occulter_id.trim())
            .copied()
            .ok_or_else(|| {
                ReduceError::Configuration(format!("unknown occulter ID '{occulter_id}'"))
            })
    }

    pub fn from_json(contents: &str) -> ReduceResult<Self> {
        serde_json::from_str(contents)
            .map_err(|err| ReduceError::Configuration(format!("parsing context: {err}")))
    }
}

//! Averaged observation containers and the wavelength stack parsed from them.

use serde::{Deserialize, Serialize};

use super::header::Header;
use crate::prelude::{Image, ReduceError, ReduceResult};

/// One image plane with its own header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extension {
    pub header: Header,
    #[serde(with = "super::non_finite::image")]
    pub data: Image,
}

/// A multi-extension observation: primary header plus image planes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub name: String,
    pub primary: Header,
    pub extensions: Vec<Extension>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stokes {
    I = 0,
    Q = 1,
    U = 2,
    V = 3,
}

/// Indices of the three tunes bracketing line center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenterTunes {
    /// Blue, center and red tune indices.
    pub indices: [usize; 3],
    /// Wavelength of the center tune (nm).
    pub center_wavelength: f64,
    /// Mean tune spacing around the center (nm).
    pub d_lambda: f64,
}

/// Planes indexed by `(stokes, tune)` plus the tune wavelengths.
///
/// Extensions are Stokes-major: all tunes of I, then Q, then U and so on. The
/// trailing block of `ntune` planes is background and is dropped.
#[derive(Debug, Clone)]
pub struct WavelengthStack {
    planes: Vec<Image>,
    wavelengths: Vec<f64>,
    ntune: usize,
    nstokes: usize,
}

impl WavelengthStack {
    pub fn parse(observation: &Observation) -> ReduceResult<Self> {
        let primary = &observation.primary;
        let ntune = primary
            .get_i64("NTUNE")
            .or_else(|| primary.get_i64("NTUNES"))
            .ok_or_else(|| ReduceError::MissingKeyword("NTUNE".into()))?;
        if ntune <= 0 {
            return Err(ReduceError::Configuration(format!("NTUNE is {ntune}")));
        }
        let ntune = ntune as usize;

        let n_ext = observation.extensions.len();
        if n_ext % ntune != 0 {
            return Err(ReduceError::Configuration(format!(
                "{n_ext} extensions is not a multiple of NTUNE={ntune}"
            )));
        }
        let nstokes = (n_ext / ntune).saturating_sub(1);
        if nstokes < 3 {
            return Err(ReduceError::InsufficientStokesData { found: nstokes });
        }

        let shape = observation.extensions[0].data.dim();
        if let Some(bad) = observation.extensions.iter().position(|ext| ext.data.dim() != shape) {
            return Err(ReduceError::Configuration(format!(
                "extension {} has shape {:?}, expected {shape:?}",
                bad + 1,
                observation.extensions[bad].data.dim()
            )));
        }

        let wavelengths = observation.extensions[..ntune]
            .iter()
            .map(|ext| ext.header.require_f64("WAVELENG"))
            .collect::<ReduceResult<Vec<_>>>()?;

        let planes = observation.extensions[..nstokes * ntune]
            .iter()
            .map(|ext| ext.data.clone())
            .collect();

        Ok(Self {
            planes,
            wavelengths,
            ntune,
            nstokes,
        })
    }

    pub fn ntune(&self) -> usize {
        self.ntune
    }

    pub fn nstokes(&self) -> usize {
        self.nstokes
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    pub fn shape(&self) -> (usize, usize) {
        self.planes.first().map(|p| p.dim()).unwrap_or((0, 0))
    }

    pub fn plane(&self, stokes: Stokes, tune: usize) -> Option<&Image> {
        let s = stokes as usize;
        if s >= self.nstokes || tune >= self.ntune {
            return None;
        }
        self.planes.get(s * self.ntune + tune)
    }

    /// Same as [`plane`](Self::plane) with the failure reported as an error.
    pub fn require_plane(&self, stokes: Stokes, tune: usize) -> ReduceResult<&Image> {
        self.plane(stokes, tune).ok_or_else(|| {
            ReduceError::InsufficientData(format!("no {stokes:?} plane at tune {tune}"))
        })
    }

    /// The three consecutive tunes nearest `rest_wavelength`.
    ///
    /// Wavelengths must strictly increase with tune index.
    pub fn center_tunes(&self, rest_wavelength: f64) -> ReduceResult<CenterTunes> {
        if self.ntune < 3 {
            return Err(ReduceError::InsufficientData(format!(
                "{} tunes, need at least 3",
                self.ntune
            )));
        }
        if let Some(pair) = self.wavelengths.windows(2).find(|w| !(w[1] > w[0])) {
            return Err(ReduceError::Configuration(format!(
                "tune wavelengths are not increasing ({} then {})",
                pair[0], pair[1]
            )));
        }

        let nearest = self
            .wavelengths
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1 - rest_wavelength).abs().total_cmp(&(b.1 - rest_wavelength).abs()))
            .map(|(i, _)| i)
            .unwrap_or(1);
        let center = nearest.clamp(1, self.ntune - 2);

        let w = &self.wavelengths;
        Ok(CenterTunes {
            indices: [center - 1, center, center + 1],
            center_wavelength: w[center],
            d_lambda: 0.5 * (w[center + 1] - w[center - 1]),
        })
    }
}

//! Quick-invert product layout.

use serde::{Deserialize, Serialize};

use super::header::Header;
use super::ReduceRequest;
use crate::math::StatsHelper;
use crate::prelude::Image;
use crate::processing::QuickInvertResult;

pub const INTENSITY: &str = "Center wavelength intensity";
pub const STOKES_Q: &str = "Center wavelength Q";
pub const STOKES_U: &str = "Center wavelength U";
pub const LINEAR_POL: &str = "Linear polarization";
pub const AZIMUTH: &str = "Azimuth";
pub const CORRECTED_VELOCITY: &str = "Corrected LOS velocity";
pub const LINE_WIDTH: &str = "Line width (FWHM)";
pub const RADIAL_AZIMUTH: &str = "Radial azimuth";
pub const PEAK_INTENSITY: &str = "Peak intensity";
pub const UNCORRECTED_VELOCITY: &str = "Uncorrected LOS velocity";

/// Primary keywords that describe the observing plan and do not apply to
/// the product.
const DROPPED_KEYWORDS: [&str; 2] = ["OBS_PLAN", "OBS_ID"];

/// Named image extension of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductExtension {
    pub name: String,
    pub header: Header,
    #[serde(with = "super::non_finite::image")]
    pub data: Image,
}

impl ProductExtension {
    /// Header gets `EXTNAME` and NaN-ignoring `DATAMIN`/`DATAMAX`. A plane
    /// with no finite pixel records NaN for both.
    pub fn new(name: &str, data: Image) -> Self {
        let mut header = Header::new();
        header.set_with_comment("EXTNAME", name, None);
        let (lo, hi) = StatsHelper::finite_range(data.iter())
            .map(|(lo, hi)| (lo as f64, hi as f64))
            .unwrap_or((f64::NAN, f64::NAN));
        header.set_with_comment("DATAMIN", lo, Some("minimum finite value"));
        header.set_with_comment("DATAMAX", hi, Some("maximum finite value"));
        Self {
            name: name.to_string(),
            header,
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub primary: Header,
    pub extensions: Vec<ProductExtension>,
}

impl Product {
    /// Build the product in its fixed extension order.
    pub fn assemble(
        input_primary: &Header,
        request: &ReduceRequest,
        result: &QuickInvertResult,
        include_peak: bool,
        include_uncorrected: bool,
    ) -> Self {
        let mut extensions = vec![
            ProductExtension::new(INTENSITY, result.intensity.clone()),
            ProductExtension::new(STOKES_Q, result.q.clone()),
            ProductExtension::new(STOKES_U, result.u.clone()),
            ProductExtension::new(LINEAR_POL, result.linear_pol.clone()),
            ProductExtension::new(AZIMUTH, result.azimuth.clone()),
        ];

        let mut velocity = ProductExtension::new(CORRECTED_VELOCITY, result.corrected_velocity.clone());
        velocity.header.set_with_comment(
            "RESTWVL",
            result.rest_wavelength,
            Some("rest wavelength [nm]"),
        );
        extensions.push(velocity);
        extensions.push(ProductExtension::new(LINE_WIDTH, result.line_width.clone()));
        extensions.push(ProductExtension::new(RADIAL_AZIMUTH, result.radial_azimuth.clone()));

        if include_peak {
            extensions.push(ProductExtension::new(PEAK_INTENSITY, result.peak_intensity.clone()));
        }
        if include_uncorrected {
            extensions.push(ProductExtension::new(UNCORRECTED_VELOCITY, result.raw_velocity.clone()));
        }

        let mut primary = input_primary.clone();
        for key in DROPPED_KEYWORDS {
            primary.delete(key);
        }
        primary.set_with_comment("METHOD", request.method.as_str(), Some("averaging method"));
        primary.set_with_comment("N_EXT", extensions.len(), Some("number of extensions"));
        primary.set_with_comment(
            "VERSION",
            env!("CARGO_PKG_VERSION"),
            Some("reduction core version"),
        );

        Self {
            name: request.output_name(),
            primary,
            extensions,
        }
    }

    pub fn extension(&self, name: &str) -> Option<&ProductExtension> {
        self.extensions.iter().find(|ext| ext.name == name)
    }

    pub fn extension_names(&self) -> Vec<&str> {
        self.extensions.iter().map(|ext| ext.name.as_str()).collect()
    }
}

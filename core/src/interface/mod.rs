//! Boundary with the file layer: headers, input stacks, output products and
//! the traits the driver implements to feed and receive them.

pub mod header;
pub mod non_finite;
pub mod product;
pub mod stack;

pub use header::{Header, HeaderCard, HeaderValue};
pub use product::{Product, ProductExtension};
pub use stack::{CenterTunes, Extension, Observation, Stokes, WavelengthStack};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::context::WaveType;
use crate::prelude::{ReduceError, ReduceResult};

/// How the input stack was averaged over the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AveragingMethod {
    Mean,
    Median,
}

impl AveragingMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            AveragingMethod::Mean => "mean",
            AveragingMethod::Median => "median",
        }
    }
}

impl FromStr for AveragingMethod {
    type Err = ReduceError;

    fn from_str(s: &str) -> ReduceResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(AveragingMethod::Mean),
            "median" => Ok(AveragingMethod::Median),
            other => Err(ReduceError::Configuration(format!(
                "unknown averaging method '{other}'"
            ))),
        }
    }
}

impl fmt::Display for AveragingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of work: an averaged observation for a date and line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReduceRequest {
    /// Observing date, `YYYYMMDD`.
    pub date: String,
    pub wave_type: WaveType,
    pub method: AveragingMethod,
    /// Synoptic program instead of the waves program.
    #[serde(default)]
    pub synoptic: bool,
    /// Input stack synthesized from a denser wavelength scan.
    #[serde(default)]
    pub synthetic: bool,
}

impl ReduceRequest {
    fn program(&self) -> String {
        let plan = if self.synoptic { "synoptic" } else { "waves" };
        if self.synthetic {
            format!("{plan}.synthetic")
        } else {
            plan.to_string()
        }
    }

    /// Name of the averaged input file.
    pub fn input_name(&self) -> String {
        format!(
            "{}.comp.{}.{}.{}.fts",
            self.date,
            self.wave_type,
            self.method,
            self.program()
        )
    }

    /// Name of the quick-invert product.
    pub fn output_name(&self) -> String {
        format!(
            "{}.comp.{}.quick_invert.{}.{}.fts",
            self.date,
            self.wave_type,
            self.method,
            self.program()
        )
    }
}

/// Reads the averaged observation for a request.
pub trait ObservationSource {
    /// `Ok(None)` when the input is absent or empty.
    fn load(&self, request: &ReduceRequest) -> ReduceResult<Option<Observation>>;
}

/// Persists an assembled product.
pub trait ProductSink {
    fn write(&self, request: &ReduceRequest, product: &Product) -> ReduceResult<()>;
}

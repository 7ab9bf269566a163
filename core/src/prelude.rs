use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Single image plane, indexed `[y, x]` with `y = 0` at the bottom row.
pub type Image = Array2<f32>;

/// Multiplicative pixel selector with the same shape as an [`Image`].
pub type Mask = Array2<f32>;

/// Broad failure classes used by the driver to decide what to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Configuration,
    InsufficientData,
    DegenerateGeometry,
    MissingInput,
    Output,
}

/// Common error type for calibration and inversion.
#[derive(thiserror::Error, Debug)]
pub enum ReduceError {
    #[error("unknown wave type {0} (expected 1074, 1079 or 1083)")]
    UnknownWaveType(u32),
    #[error("missing required header keyword {0}")]
    MissingKeyword(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("insufficient data: {0}")]
    InsufficientData(String),
    #[error("insufficient Stokes data: found {found} planes, need at least 3")]
    InsufficientStokesData { found: usize },
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),
    #[error("missing input: {0}")]
    MissingInput(String),
    #[error("writing product failed: {0}")]
    Output(String),
}

impl ReduceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReduceError::UnknownWaveType(_)
            | ReduceError::MissingKeyword(_)
            | ReduceError::Configuration(_) => ErrorKind::Configuration,
            ReduceError::InsufficientData(_) | ReduceError::InsufficientStokesData { .. } => {
                ErrorKind::InsufficientData
            }
            ReduceError::DegenerateGeometry(_) => ErrorKind::DegenerateGeometry,
            ReduceError::MissingInput(_) => ErrorKind::MissingInput,
            ReduceError::Output(_) => ErrorKind::Output,
        }
    }
}

pub type ReduceResult<T> = Result<T, ReduceError>;

/// Notes accumulated by a stage for the audit trail and the run summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageNotes {
    pub notes: Vec<String>,
    pub warnings: Vec<String>,
}

impl StageNotes {
    pub fn note(&mut self, message: impl Into<String>) {
        self.notes.push(message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn extend(&mut self, other: StageNotes) {
        self.notes.extend(other.notes);
        self.warnings.extend(other.warnings);
    }
}

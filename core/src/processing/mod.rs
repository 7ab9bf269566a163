//! Quick inversion of an averaged observation into physical maps.

pub mod doppler;
pub mod gaussian;
pub mod quick_invert;
pub mod reduce;

pub use doppler::{DopplerConfig, DopplerCorrection, DopplerCorrector, TrendFit};
pub use gaussian::GaussianFit;
pub use quick_invert::{QuickInvertEngine, QuickInvertResult, RawInversion};
pub use reduce::{reduce_observation, ReduceOptions, ReductionSummary};

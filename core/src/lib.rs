//! Geometric calibration and quick inversion for a two-beam coronal
//! polarimeter.
//!
//! Geometry flows from [`geometry`] into [`mask`]; the mask and the averaged
//! wavelength stack feed [`processing`], which writes products through the
//! traits in [`interface`]. All shared calibration lives in an immutable
//! [`context::InstrumentContext`].

pub mod context;
pub mod geometry;
pub mod interface;
pub mod mask;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod telemetry;

#[cfg(test)]
mod test_utils;

pub use context::{InstrumentContext, WaveType};
pub use prelude::{ErrorKind, ReduceError, ReduceResult};

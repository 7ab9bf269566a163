//! Per-file reduction: parse, mask, invert, correct, assemble and write.

use serde::{Deserialize, Serialize};

use super::doppler::{DopplerCorrector, TrendFit};
use super::quick_invert::QuickInvertEngine;
use crate::context::{InstrumentContext, WaveType};
use crate::interface::{
    AveragingMethod, Observation, ObservationSource, Product, ProductSink, ReduceRequest, WavelengthStack,
};
use crate::mask::{MaskBuilder, MaskConfig};
use crate::prelude::{ErrorKind, ReduceResult, StageNotes};
use crate::telemetry::LogManager;

/// Per-run options that are not instrument calibration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReduceOptions {
    pub mask: MaskConfig,
    /// Append the fitted peak intensity extension.
    pub include_peak: bool,
    /// Append the velocity before trend correction.
    pub include_uncorrected: bool,
}

/// What one reduction produced, for the run report.
#[derive(Debug, Clone, Serialize)]
pub struct ReductionSummary {
    pub input: String,
    pub output: String,
    pub wave_type: WaveType,
    pub method: AveragingMethod,
    pub extensions: usize,
    pub masked_pixels: usize,
    pub velocity_pixels: usize,
    pub rest_wavelength: f64,
    pub trend: Option<TrendFit>,
    pub notes: StageNotes,
}

/// Reduce one averaged observation.
///
/// A missing input is logged as a warning and yields `Ok(None)`. Any other
/// failure is logged with the file name and returned; it concerns this file
/// only.
pub fn reduce_observation(
    ctx: &InstrumentContext,
    request: &ReduceRequest,
    options: &ReduceOptions,
    source: &dyn ObservationSource,
    sink: &dyn ProductSink,
) -> ReduceResult<Option<ReductionSummary>> {
    let logger = LogManager::for_file(request.input_name());

    let observation = match source.load(request) {
        Ok(Some(observation)) => observation,
        Ok(None) => {
            logger.warn("input not found; nothing to reduce");
            return Ok(None);
        }
        Err(err) if err.kind() == ErrorKind::MissingInput => {
            logger.warn(&err.to_string());
            return Ok(None);
        }
        Err(err) => {
            logger.error(&format!("reading input failed: {err}"));
            return Err(err);
        }
    };

    match run(ctx, request, options, &observation, sink, &logger) {
        Ok(summary) => {
            logger.record(&format!(
                "wrote {} ({} extensions, {} velocity pixels, rest wavelength {:.4} nm)",
                summary.output, summary.extensions, summary.velocity_pixels, summary.rest_wavelength
            ));
            Ok(Some(summary))
        }
        Err(err) => {
            logger.error(&format!("{:?} error: {err}", err.kind()));
            Err(err)
        }
    }
}

fn run(
    ctx: &InstrumentContext,
    request: &ReduceRequest,
    options: &ReduceOptions,
    observation: &Observation,
    sink: &dyn ProductSink,
    logger: &LogManager,
) -> ReduceResult<ReductionSummary> {
    let engine = QuickInvertEngine::new(ctx, request.wave_type)?;
    let stack = WavelengthStack::parse(observation)?;
    logger.debug(&format!(
        "{} tunes x {} Stokes planes of {:?}",
        stack.ntune(),
        stack.nstokes(),
        stack.shape()
    ));

    let (mask, geometry) =
        MaskBuilder::new(ctx, options.mask.clone()).build_from_header(&observation.primary, stack.shape())?;
    let masked_pixels = mask.iter().filter(|&&m| m == 0.0).count();
    logger.debug(&format!(
        "mask: occulter r={:.2} field r={:.2} post {:.1} overlap {:.1}; {masked_pixels} pixels excluded",
        geometry.occulter_radius, geometry.field_radius, geometry.post_angle, geometry.overlap_angle
    ));

    let raw = engine.invert(&stack, &mask, geometry.occulter_center)?;
    logger.record(&format!(
        "inverted tunes {:?} (d_lambda {:.4} nm): {} pixels pass the velocity gate",
        raw.tunes.indices, raw.tunes.d_lambda, raw.n_velocity
    ));

    let correction = DopplerCorrector::new(&ctx.doppler, engine.constants()).correct(
        &raw.velocity,
        &raw.peak_intensity,
        geometry.occulter_center,
        geometry.occulter_radius,
        logger,
    );
    let trend = correction.trend;
    let notes = correction.notes.clone();
    let velocity_pixels = raw.n_velocity;
    let result = raw.finish(correction);

    let product = Product::assemble(
        &observation.primary,
        request,
        &result,
        options.include_peak,
        options.include_uncorrected,
    );
    sink.write(request, &product)?;

    Ok(ReductionSummary {
        input: request.input_name(),
        output: product.name.clone(),
        wave_type: request.wave_type,
        method: request.method,
        extensions: product.extensions.len(),
        masked_pixels,
        velocity_pixels,
        rest_wavelength: result.rest_wavelength,
        trend,
        notes,
    })
}

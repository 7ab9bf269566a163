//! Geometric calibration: locate the occulter and field stop in each beam and
//! assemble the full-frame geometry.

pub mod annulus;
pub mod circle;
pub mod distortion;
pub mod edge;
pub mod model;
pub mod post;
pub mod sampling;

pub use annulus::{AnnulusGuess, AnnulusLocator, AnnulusResult};
pub use circle::{Circle, CircleFit, CircleFitter};
pub use distortion::DistortionMap;
pub use edge::{EdgeSample, EdgeScanConfig, Polarity, RadialEdgeFinder};
pub use model::{overlap_angle, Beam, BeamLayout, FlatGeometry, GeometryModel};

use ndarray::ArrayView2;
use serde::Serialize;

use crate::context::InstrumentContext;
use crate::prelude::{ReduceError, ReduceResult, StageNotes};
use crate::telemetry::LogManager;

/// Outcome of calibrating one raw frame.
#[derive(Debug, Clone, Serialize)]
pub struct GeometryCalibration {
    pub model: GeometryModel,
    pub beam1: AnnulusResult,
    pub beam2: AnnulusResult,
    pub notes: StageNotes,
}

/// Split the frame into beams, remove distortion, locate both annuli, resolve
/// the post angles and assemble the [`GeometryModel`].
pub fn calibrate_geometry(
    ctx: &InstrumentContext,
    frame: ArrayView2<f32>,
    flat: &FlatGeometry,
    logger: &LogManager,
) -> ReduceResult<GeometryCalibration> {
    let layout = BeamLayout::new(ctx.frame_size, ctx.beam_size)?;
    let locator = AnnulusLocator::new(&ctx.edges);
    let mut notes = StageNotes::default();

    let mut beams = Vec::with_capacity(2);
    let mut post_angles = [0.0; 2];
    for (slot, (beam, other, distortion, calibrated_post)) in [
        (Beam::One, Beam::Two, &ctx.distortion.beam1, flat.post_angle1),
        (Beam::Two, Beam::One, &ctx.distortion.beam2, flat.post_angle2),
    ]
    .into_iter()
    .enumerate()
    {
        let raw = layout.extract(frame, beam)?;
        let corrected = distortion.apply(raw.view());
        let result = locator.locate(corrected.view(), flat.guess(beam))?;
        for warning in &result.notes.warnings {
            logger.warn(&format!("beam {}: {warning}", slot + 1));
        }
        for note in &result.notes.notes {
            logger.debug(&format!("beam {}: {note}", slot + 1));
        }

        post_angles[slot] = match calibrated_post {
            Some(angle) => angle,
            None => {
                // The other beam's field stop lands in this sub-image where
                // the beams share frame pixels.
                let [ax, ay] = layout.center_in_frame(beam);
                let [bx, by] = layout.center_in_frame(other);
                let other_field = flat.guess(other).field.translated(bx - ax, by - ay);
                let angle = post::find_post_angle(
                    corrected.view(),
                    &result.occulter.circle,
                    &result.field.circle,
                    Some(&other_field),
                )
                .ok_or_else(|| {
                    ReduceError::InsufficientData(format!("no occulter post found in beam {}", slot + 1))
                })?;
                notes.note(format!("beam {}: detected post angle {angle:.1}", slot + 1));
                angle
            }
        };
        beams.push(result);
    }

    let beam2 = beams.pop().ok_or_else(|| ReduceError::InsufficientData("beam 2 missing".into()))?;
    let beam1 = beams.pop().ok_or_else(|| ReduceError::InsufficientData("beam 1 missing".into()))?;
    let model = GeometryModel::assemble(&layout, &beam1, &beam2, flat, post_angles);
    if model.delta_x == 0.0 {
        notes.warn(format!(
            "flat occulter delta_x is zero; overlap angle set to {:.0}",
            model.overlap_angle
        ));
    }
    logger.record(&format!(
        "geometry: occulter r=({:.2}, {:.2}) field r=({:.2}, {:.2}) overlap {:.2} deg",
        model.occulter1.r(),
        model.occulter2.r(),
        model.field1.r(),
        model.field2.r(),
        model.overlap_angle
    ));
    notes.extend(beam1.notes.clone());
    notes.extend(beam2.notes.clone());

    Ok(GeometryCalibration {
        model,
        beam1,
        beam2,
        notes,
    })
}

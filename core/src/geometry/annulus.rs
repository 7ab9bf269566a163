use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use super::circle::{Circle, CircleFit, CircleFitter};
use super::edge::{EdgeSample, EdgeScanConfig, Polarity, RadialEdgeFinder};
use super::sampling::image_center;
use crate::prelude::{ReduceResult, StageNotes};

/// Residual clipping threshold used for both edges.
const CLIP_SIGMA: f64 = 3.0;

/// Starting guesses for one beam, as offsets from the sub-image center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnulusGuess {
    pub occulter: Circle,
    pub field: Circle,
}

/// Occulter and field-stop circles for one sub-image.
///
/// Centers are offsets from the sub-image center. The raw edge samples are
/// kept for diagnostics only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnulusResult {
    pub occulter: CircleFit,
    pub field: CircleFit,
    pub occulter_samples: Vec<EdgeSample>,
    pub field_samples: Vec<EdgeSample>,
    pub notes: StageNotes,
}

/// Locates the occulter (rising edge) and field stop (falling edge) in a
/// distortion-corrected sub-image.
pub struct AnnulusLocator<'a> {
    config: &'a EdgeScanConfig,
}

impl<'a> AnnulusLocator<'a> {
    pub fn new(config: &'a EdgeScanConfig) -> Self {
        Self { config }
    }

    pub fn locate(&self, sub_image: ArrayView2<f32>, guess: &AnnulusGuess) -> ReduceResult<AnnulusResult> {
        let mut notes = StageNotes::default();
        let (occulter, occulter_samples) =
            self.locate_edge(sub_image, &guess.occulter, Polarity::Pos, "occulter", &mut notes)?;
        let (field, field_samples) =
            self.locate_edge(sub_image, &guess.field, Polarity::Neg, "field stop", &mut notes)?;

        Ok(AnnulusResult {
            occulter,
            field,
            occulter_samples,
            field_samples,
            notes,
        })
    }

    fn locate_edge(
        &self,
        sub_image: ArrayView2<f32>,
        guess: &Circle,
        polarity: Polarity,
        label: &str,
        notes: &mut StageNotes,
    ) -> ReduceResult<(CircleFit, Vec<EdgeSample>)> {
        let [cx, cy] = image_center(sub_image);
        let finder = RadialEdgeFinder::new(sub_image, [cx + guess.x(), cy + guess.y()]);
        let samples = finder.scan(guess.r(), self.config, polarity);

        let boundary_hits = samples.iter().filter(|s| s.at_boundary).count();
        if boundary_hits > 0 {
            notes.warn(format!(
                "{label}: {boundary_hits}/{} rays peaked at the search window boundary",
                samples.len()
            ));
        }

        let mut fit = CircleFitter::fit_clipped(&samples, CLIP_SIGMA)?;
        // Scan-centered -> sub-image-centered.
        fit.circle = fit.circle.translated(guess.x(), guess.y());
        notes.note(format!(
            "{label}: x={:.3} y={:.3} r={:.3} rms={:.3} used={} rejected={}",
            fit.circle.x(),
            fit.circle.y(),
            fit.circle.r(),
            fit.rms,
            fit.n_used,
            fit.n_rejected
        ));
        Ok((fit, samples))
    }
}

//! Full-frame geometry assembled from the two beam sub-images.

use ndarray::{s, ArrayView2};
use serde::{Deserialize, Serialize};

use super::annulus::{AnnulusGuess, AnnulusResult};
use super::circle::Circle;
use crate::interface::Header;
use crate::prelude::{Image, ReduceError, ReduceResult};

/// One of the two sub-images produced by the polarizing beam splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Beam {
    /// Upper-left sub-image.
    One,
    /// Lower-right sub-image.
    Two,
}

/// Placement of the beam sub-images within the detector frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeamLayout {
    pub frame_size: usize,
    pub beam_size: usize,
}

impl BeamLayout {
    pub fn new(frame_size: usize, beam_size: usize) -> ReduceResult<Self> {
        if beam_size == 0 || beam_size > frame_size {
            return Err(ReduceError::Configuration(format!(
                "beam size {beam_size} does not fit frame size {frame_size}"
            )));
        }
        Ok(Self {
            frame_size,
            beam_size,
        })
    }

    /// Frame pixel `[x, y]` of the sub-image's first pixel (row 0 is the
    /// bottom of the frame).
    pub fn corner(&self, beam: Beam) -> [usize; 2] {
        let far = self.frame_size - self.beam_size;
        match beam {
            Beam::One => [0, far],
            Beam::Two => [far, 0],
        }
    }

    /// Frame coordinates of the sub-image center.
    pub fn center_in_frame(&self, beam: Beam) -> [f64; 2] {
        let [x0, y0] = self.corner(beam);
        let half = (self.beam_size as f64 - 1.0) / 2.0;
        [x0 as f64 + half, y0 as f64 + half]
    }

    pub fn extract(&self, frame: ArrayView2<f32>, beam: Beam) -> ReduceResult<Image> {
        let (h, w) = frame.dim();
        if h != self.frame_size || w != self.frame_size {
            return Err(ReduceError::Configuration(format!(
                "frame is {w}x{h}, expected {n}x{n}",
                n = self.frame_size
            )));
        }
        let [x0, y0] = self.corner(beam);
        Ok(frame
            .slice(s![y0..y0 + self.beam_size, x0..x0 + self.beam_size])
            .to_owned())
    }

    /// Move a sub-image-relative circle into frame coordinates.
    pub fn to_frame(&self, beam: Beam, circle: &Circle) -> Circle {
        let [cx, cy] = self.center_in_frame(beam);
        circle.translated(cx, cy)
    }
}

/// Geometry guesses derived from the flat field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlatGeometry {
    pub beam1: AnnulusGuess,
    pub beam2: AnnulusGuess,
    /// Calibrated post angles (degrees); `None` asks for detection.
    #[serde(default)]
    pub post_angle1: Option<f64>,
    #[serde(default)]
    pub post_angle2: Option<f64>,
}

impl FlatGeometry {
    pub fn guess(&self, beam: Beam) -> &AnnulusGuess {
        match beam {
            Beam::One => &self.beam1,
            Beam::Two => &self.beam2,
        }
    }
}

/// Occulter and field-stop circles of both beams in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometryModel {
    pub occulter1: Circle,
    pub occulter2: Circle,
    pub field1: Circle,
    pub field2: Circle,
    pub post_angle1: f64,
    pub post_angle2: f64,
    pub delta_x: f64,
    pub delta_y: f64,
    /// `atan(delta_y / delta_x)` in degrees.
    pub overlap_angle: f64,
}

/// Overlap angle in degrees from the flat occulter center delta.
///
/// `delta_x = 0` falls back to ±90° by the sign of `delta_y`; when both are
/// zero the beams coincide and 0° is returned.
pub fn overlap_angle(delta_x: f64, delta_y: f64) -> f64 {
    if delta_x == 0.0 {
        if delta_y == 0.0 {
            log::warn!("beam centers coincide; overlap angle defaults to 0");
            return 0.0;
        }
        return 90.0_f64.copysign(delta_y);
    }
    (delta_y / delta_x).atan().to_degrees()
}

impl GeometryModel {
    /// Pure coordinate bookkeeping; no fitting happens here.
    pub fn assemble(
        layout: &BeamLayout,
        beam1: &AnnulusResult,
        beam2: &AnnulusResult,
        flat: &FlatGeometry,
        post_angles: [f64; 2],
    ) -> Self {
        let delta_x = flat.beam2.occulter.x() - flat.beam1.occulter.x();
        let delta_y = flat.beam2.occulter.y() - flat.beam1.occulter.y();
        Self {
            occulter1: layout.to_frame(Beam::One, &beam1.occulter.circle),
            occulter2: layout.to_frame(Beam::Two, &beam2.occulter.circle),
            field1: layout.to_frame(Beam::One, &beam1.field.circle),
            field2: layout.to_frame(Beam::Two, &beam2.field.circle),
            post_angle1: post_angles[0],
            post_angle2: post_angles[1],
            delta_x,
            delta_y,
            overlap_angle: overlap_angle(delta_x, delta_y),
        }
    }

    pub fn mean_occulter_radius(&self) -> f64 {
        0.5 * (self.occulter1.r() + self.occulter2.r())
    }

    pub fn mean_field_radius(&self) -> f64 {
        0.5 * (self.field1.r() + self.field2.r())
    }

    /// Field-stop center minus occulter center, averaged over both beams.
    pub fn mean_field_offset(&self) -> [f64; 2] {
        [
            0.5 * ((self.field1.x() - self.occulter1.x()) + (self.field2.x() - self.occulter2.x())),
            0.5 * ((self.field1.y() - self.occulter1.y()) + (self.field2.y() - self.occulter2.y())),
        ]
    }

    pub fn mean_post_angle(&self) -> f64 {
        let (a, b) = (self.post_angle1.to_radians(), self.post_angle2.to_radians());
        let mean = (a.sin() + b.sin()).atan2(a.cos() + b.cos()).to_degrees();
        mean.rem_euclid(360.0)
    }

    /// Write current-schema geometry keywords for an occulter-centered
    /// `image_size` square image. Pixel keywords are 1-based.
    pub fn to_header(&self, header: &mut Header, image_size: usize) {
        let crpix = (image_size as f64 - 1.0) / 2.0 + 1.0;
        let [fdx, fdy] = self.mean_field_offset();
        header.set_with_comment("CRPIX1", crpix, Some("occulter center x (1-based)"));
        header.set_with_comment("CRPIX2", crpix, Some("occulter center y (1-based)"));
        header.set_with_comment("FRPIX1", crpix + fdx, Some("field stop center x (1-based)"));
        header.set_with_comment("FRPIX2", crpix + fdy, Some("field stop center y (1-based)"));
        header.set_with_comment("FRADIUS", self.mean_field_radius(), Some("field stop radius [px]"));
        header.set_with_comment("ORADIUS", self.mean_occulter_radius(), Some("occulter radius [px]"));
        header.set_with_comment("POSTPANG", self.mean_post_angle(), Some("post angle [deg]"));
        header.set_with_comment("OVRLPANG", self.overlap_angle, Some("overlap angle [deg]"));
    }
}

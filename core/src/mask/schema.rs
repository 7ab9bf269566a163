//! Geometry keywords in the two header schemas.
//!
//! Legacy headers carry per-beam averaged circles (`OCRAD1/2`, `FCENX1/2`,
//! `FCENY1/2`, `FCRAD1/2`) with 0-based field centers. Current headers carry
//! one field circle in 1-based `FRPIX1/2`, the occulter ID, and the post,
//! overlap and P angles. Both converge to [`MaskGeometry`].

use serde::{Deserialize, Serialize};

use crate::context::InstrumentContext;
use crate::geometry::overlap_angle;
use crate::interface::Header;
use crate::prelude::{ReduceError, ReduceResult};

/// Image geometry in 0-based pixel coordinates, shared by both schemas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaskGeometry {
    pub occulter_center: [f64; 2],
    pub occulter_radius: f64,
    pub field_center: [f64; 2],
    pub field_radius: f64,
    /// Post direction in the image (degrees, counter-clockwise from +x).
    pub post_angle: f64,
    /// Overlap direction in the image (degrees).
    pub overlap_angle: f64,
    /// Distance between the occulter and field-stop centers (pixels).
    pub center_offset: f64,
}

/// Raw header values for one schema.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderGeometry {
    Legacy {
        crpix: [f64; 2],
        occulter_radii: [f64; 2],
        field_x: [f64; 2],
        field_y: [f64; 2],
        field_radii: [f64; 2],
    },
    Current {
        crpix: [f64; 2],
        frpix: [f64; 2],
        occulter_id: String,
        frame_occulter_radius: Option<f64>,
        field_radius: f64,
        post_angle: f64,
        overlap_angle: f64,
        p_angle: f64,
    },
}

fn pair(header: &Header, a: &str, b: &str) -> ReduceResult<[f64; 2]> {
    Ok([header.require_f64(a)?, header.require_f64(b)?])
}

fn mean(values: [f64; 2]) -> f64 {
    0.5 * (values[0] + values[1])
}

impl HeaderGeometry {
    /// Pick the schema from the keywords present.
    pub fn from_header(header: &Header) -> ReduceResult<Self> {
        if header.contains("OCRAD1") {
            return Ok(HeaderGeometry::Legacy {
                crpix: pair(header, "CRPIX1", "CRPIX2")?,
                occulter_radii: pair(header, "OCRAD1", "OCRAD2")?,
                field_x: pair(header, "FCENX1", "FCENX2")?,
                field_y: pair(header, "FCENY1", "FCENY2")?,
                field_radii: pair(header, "FCRAD1", "FCRAD2")?,
            });
        }
        if header.contains("FRPIX1") {
            return Ok(HeaderGeometry::Current {
                crpix: pair(header, "CRPIX1", "CRPIX2")?,
                frpix: pair(header, "FRPIX1", "FRPIX2")?,
                occulter_id: header.require_string("OCC-ID")?,
                frame_occulter_radius: header.get_f64("ORADIUS"),
                field_radius: header.require_f64("FRADIUS")?,
                post_angle: header.require_f64("POSTPANG")?,
                overlap_angle: header.require_f64("OVRLPANG")?,
                p_angle: header.require_f64("SOLAR_P0")?,
            });
        }
        Err(ReduceError::MissingKeyword("OCRAD1 or FRPIX1".into()))
    }

    /// Resolve to image geometry. `frame_radius` selects the header's
    /// per-frame occulter radius over the calibrated table value.
    pub fn resolve(&self, ctx: &InstrumentContext, frame_radius: bool) -> ReduceResult<MaskGeometry> {
        match self {
            HeaderGeometry::Legacy {
                crpix,
                occulter_radii,
                field_x,
                field_y,
                field_radii,
            } => {
                let occulter_center = [crpix[0] - 1.0, crpix[1] - 1.0];
                let field_center = [mean(*field_x), mean(*field_y)];
                let dx = field_center[0] - occulter_center[0];
                let dy = field_center[1] - occulter_center[1];
                Ok(MaskGeometry {
                    occulter_center,
                    occulter_radius: mean(*occulter_radii),
                    field_center,
                    field_radius: mean(*field_radii),
                    post_angle: ctx.mask.legacy_post_angle,
                    overlap_angle: overlap_angle(dx, dy),
                    center_offset: dx.hypot(dy),
                })
            }
            HeaderGeometry::Current {
                crpix,
                frpix,
                occulter_id,
                frame_occulter_radius,
                field_radius,
                post_angle,
                overlap_angle,
                p_angle,
            } => {
                let occulter_radius = if frame_radius {
                    frame_occulter_radius.ok_or_else(|| ReduceError::MissingKeyword("ORADIUS".into()))?
                } else {
                    ctx.occulter_radius(occulter_id)?
                };
                let occulter_center = [crpix[0] - 1.0, crpix[1] - 1.0];
                let field_center = [frpix[0] - 1.0, frpix[1] - 1.0];
                let dx = field_center[0] - occulter_center[0];
                let dy = field_center[1] - occulter_center[1];
                Ok(MaskGeometry {
                    occulter_center,
                    occulter_radius,
                    field_center,
                    field_radius: *field_radius,
                    post_angle: post_angle - p_angle,
                    overlap_angle: overlap_angle - p_angle,
                    center_offset: dx.hypot(dy),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy_header() -> Header {
        let mut h = Header::new();
        for (key, value) in [
            ("CRPIX1", 310.5),
            ("CRPIX2", 310.5),
            ("OCRAD1", 226.0),
            ("OCRAD2", 228.0),
            ("FCENX1", 311.5),
            ("FCENX2", 311.5),
            ("FCENY1", 309.5),
            ("FCENY2", 309.5),
            ("FCRAD1", 297.0),
            ("FCRAD2", 299.0),
        ] {
            h.set(key, value);
        }
        h
    }

    fn current_header() -> Header {
        let mut h = Header::new();
        for (key, value) in [
            ("CRPIX1", 310.5),
            ("CRPIX2", 310.5),
            ("FRPIX1", 312.5),
            ("FRPIX2", 310.5),
            ("FRADIUS", 298.0),
            ("ORADIUS", 229.5),
            ("POSTPANG", 190.0),
            ("OVRLPANG", 12.0),
            ("SOLAR_P0", 10.0),
        ] {
            h.set(key, value);
        }
        h.set("OCC-ID", "3");
        h
    }

    #[test]
    fn legacy_schema_averages_beams_with_zero_based_field_center() {
        let ctx = InstrumentContext::default();
        let geometry = HeaderGeometry::from_header(&legacy_header()).unwrap().resolve(&ctx, false).unwrap();
        assert_eq!(geometry.occulter_center, [309.5, 309.5]);
        assert_eq!(geometry.field_center, [311.5, 309.5]);
        assert_eq!(geometry.occulter_radius, 227.0);
        assert_eq!(geometry.field_radius, 298.0);
        assert_eq!(geometry.center_offset, 2.0);
        assert_eq!(geometry.overlap_angle, 0.0);
        assert_eq!(geometry.post_angle, ctx.mask.legacy_post_angle);
    }

    #[test]
    fn current_schema_uses_one_based_field_center_and_table_radius() {
        let ctx = InstrumentContext::default();
        let parsed = HeaderGeometry::from_header(&current_header()).unwrap();
        let geometry = parsed.resolve(&ctx, false).unwrap();
        assert_eq!(geometry.field_center, [311.5, 309.5]);
        assert_eq!(geometry.occulter_radius, 232.0);
        assert_eq!(geometry.post_angle, 180.0);
        assert_eq!(geometry.overlap_angle, 2.0);

        let per_frame = parsed.resolve(&ctx, true).unwrap();
        assert_eq!(per_frame.occulter_radius, 229.5);
    }

    #[test]
    fn current_schema_errors() {
        let ctx = InstrumentContext::default();
        let mut header = current_header();
        header.set("OCC-ID", "77");
        let parsed = HeaderGeometry::from_header(&header).unwrap();
        assert!(matches!(parsed.resolve(&ctx, false), Err(ReduceError::Configuration(_))));

        header.delete("ORADIUS");
        let parsed = HeaderGeometry::from_header(&header).unwrap();
        assert!(matches!(parsed.resolve(&ctx, true), Err(ReduceError::MissingKeyword(_))));

        header.delete("SOLAR_P0");
        assert!(matches!(
            HeaderGeometry::from_header(&header),
            Err(ReduceError::MissingKeyword(key)) if key == "SOLAR_P0"
        ));
    }

    #[test]
    fn header_without_geometry_is_rejected() {
        assert!(HeaderGeometry::from_header(&Header::new()).is_err());
    }
}

//! Validity mask construction.
//!
//! The combined mask is the elementwise product of the disk, field, post and
//! overlap masks, so adding an exclusion can only shrink it.

pub mod schema;
pub mod shapes;

pub use schema::{HeaderGeometry, MaskGeometry};

use serde::{Deserialize, Serialize};

use crate::context::InstrumentContext;
use crate::interface::Header;
use crate::prelude::{Mask, ReduceError, ReduceResult};

/// Calibrated mask defaults carried in the run context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskDefaults {
    /// Pixels added to the occulter radius.
    pub occulter_offset: f64,
    /// Pixels removed from the field-stop radius.
    pub field_offset: f64,
    /// Full angular width of the post wedge (degrees).
    pub post_width_deg: f64,
    /// Post angle assumed for legacy headers (degrees).
    pub legacy_post_angle: f64,
}

impl Default for MaskDefaults {
    fn default() -> Self {
        Self {
            occulter_offset: 2.0,
            field_offset: 3.0,
            post_width_deg: 8.0,
            legacy_post_angle: 180.0,
        }
    }
}

/// Per-call mask options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskConfig {
    /// Override the calibrated occulter overmask margin.
    pub occulter_offset: Option<f64>,
    /// Override the calibrated field-stop overmask margin.
    pub field_offset: Option<f64>,
    /// Skip the post exclusion.
    pub no_post: bool,
    /// Use the header's per-frame occulter radius instead of the table.
    pub image_occulter_radius: bool,
}

/// The four component masks, kept separately for inspection.
#[derive(Debug, Clone)]
pub struct MaskComponents {
    pub disk: Mask,
    pub field: Mask,
    pub post: Mask,
    pub overlap: Mask,
}

impl MaskComponents {
    pub fn combine(&self) -> Mask {
        &self.disk * &self.field * &self.post * &self.overlap
    }
}

pub struct MaskBuilder<'a> {
    ctx: &'a InstrumentContext,
    config: MaskConfig,
}

impl<'a> MaskBuilder<'a> {
    pub fn new(ctx: &'a InstrumentContext, config: MaskConfig) -> Self {
        Self { ctx, config }
    }

    /// Parse whichever geometry schema the header carries.
    pub fn geometry_from_header(&self, header: &Header) -> ReduceResult<MaskGeometry> {
        HeaderGeometry::from_header(header)?.resolve(self.ctx, self.config.image_occulter_radius)
    }

    pub fn build_from_header(&self, header: &Header, shape: (usize, usize)) -> ReduceResult<(Mask, MaskGeometry)> {
        let geometry = self.geometry_from_header(header)?;
        Ok((self.build(&geometry, shape)?, geometry))
    }

    pub fn build(&self, geometry: &MaskGeometry, shape: (usize, usize)) -> ReduceResult<Mask> {
        Ok(self.components(geometry, shape)?.combine())
    }

    pub fn components(&self, geometry: &MaskGeometry, shape: (usize, usize)) -> ReduceResult<MaskComponents> {
        let values = [
            geometry.occulter_center[0],
            geometry.occulter_center[1],
            geometry.field_center[0],
            geometry.field_center[1],
            geometry.occulter_radius,
            geometry.field_radius,
            geometry.post_angle,
            geometry.overlap_angle,
            geometry.center_offset,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ReduceError::DegenerateGeometry(format!(
                "non-finite mask geometry {geometry:?}"
            )));
        }

        let defaults = &self.ctx.mask;
        let occulter_offset = self.config.occulter_offset.unwrap_or(defaults.occulter_offset);
        let field_offset = self.config.field_offset.unwrap_or(defaults.field_offset);
        let field_radius = geometry.field_radius - field_offset;

        let disk = shapes::disk_mask(shape, geometry.occulter_center, geometry.occulter_radius + occulter_offset);
        let field = shapes::field_mask(shape, geometry.field_center, field_radius);
        let post = if self.config.no_post {
            Mask::ones(shape)
        } else {
            shapes::post_mask(shape, geometry.occulter_center, geometry.post_angle, defaults.post_width_deg)
        };
        let overlap = shapes::overlap_mask(
            shape,
            geometry.field_center,
            geometry.overlap_angle,
            field_radius,
            geometry.center_offset,
        );

        Ok(MaskComponents {
            disk,
            field,
            post,
            overlap,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Circle, GeometryModel};

    fn geometry() -> MaskGeometry {
        MaskGeometry {
            occulter_center: [50.0, 50.0],
            occulter_radius: 15.0,
            field_center: [51.0, 50.0],
            field_radius: 40.0,
            post_angle: 270.0,
            overlap_angle: 0.0,
            center_offset: 1.0,
        }
    }

    fn with_offsets(occulter: f64, field: f64) -> MaskConfig {
        MaskConfig {
            occulter_offset: Some(occulter),
            field_offset: Some(field),
            ..Default::default()
        }
    }

    #[test]
    fn combined_mask_is_product_of_components() {
        let ctx = InstrumentContext::default();
        let builder = MaskBuilder::new(&ctx, MaskConfig::default());
        let parts = builder.components(&geometry(), (101, 101)).unwrap();
        let mask = parts.combine();
        for ((idx, &value), ((&d, &f), (&p, &o))) in mask.indexed_iter().zip(
            parts
                .disk
                .iter()
                .zip(parts.field.iter())
                .zip(parts.post.iter().zip(parts.overlap.iter())),
        ) {
            assert_eq!(value, d * f * p * o, "pixel {idx:?}");
        }
        // Inside the occulter, in the annulus, below the post.
        assert_eq!(mask[[50, 50]], 0.0);
        assert_eq!(mask[[50, 25]], 1.0);
        assert_eq!(mask[[25, 50]], 0.0);
    }

    #[test]
    fn larger_offsets_only_shrink_the_mask() {
        let ctx = InstrumentContext::default();
        let shape = (101, 101);
        let offsets = [-2.0, 0.0, 1.5, 4.0];
        for pair in offsets.windows(2) {
            let loose = MaskBuilder::new(&ctx, with_offsets(pair[0], pair[0]))
                .build(&geometry(), shape)
                .unwrap();
            let tight = MaskBuilder::new(&ctx, with_offsets(pair[1], pair[1]))
                .build(&geometry(), shape)
                .unwrap();
            for (l, t) in loose.iter().zip(tight.iter()) {
                assert!(t <= l, "offset {} kept a pixel {} dropped", pair[1], pair[0]);
            }
        }
    }

    #[test]
    fn no_post_keeps_the_wedge() {
        let ctx = InstrumentContext::default();
        let config = MaskConfig {
            no_post: true,
            ..Default::default()
        };
        let mask = MaskBuilder::new(&ctx, config).build(&geometry(), (101, 101)).unwrap();
        assert_eq!(mask[[25, 50]], 1.0);
    }

    #[test]
    fn both_schemas_give_the_same_mask() {
        let ctx = InstrumentContext::default();
        let mut legacy = Header::new();
        for (key, value) in [
            ("CRPIX1", 51.0),
            ("CRPIX2", 51.0),
            ("OCRAD1", 15.0),
            ("OCRAD2", 15.0),
            ("FCENX1", 51.0),
            ("FCENX2", 51.0),
            ("FCENY1", 50.0),
            ("FCENY2", 50.0),
            ("FCRAD1", 40.0),
            ("FCRAD2", 40.0),
        ] {
            legacy.set(key, value);
        }
        let mut current = Header::new();
        for (key, value) in [
            ("CRPIX1", 51.0),
            ("CRPIX2", 51.0),
            ("FRPIX1", 52.0),
            ("FRPIX2", 51.0),
            ("FRADIUS", 40.0),
            ("ORADIUS", 15.0),
            ("POSTPANG", ctx.mask.legacy_post_angle),
            ("OVRLPANG", 0.0),
            ("SOLAR_P0", 0.0),
        ] {
            current.set(key, value);
        }
        current.set("OCC-ID", "1");

        let config = MaskConfig {
            image_occulter_radius: true,
            ..Default::default()
        };
        let builder = MaskBuilder::new(&ctx, config);
        let (a, ga) = builder.build_from_header(&legacy, (101, 101)).unwrap();
        let (b, gb) = builder.build_from_header(&current, (101, 101)).unwrap();
        assert_eq!(ga, gb);
        assert_eq!(a, b);
    }

    #[test]
    fn calibrated_geometry_feeds_the_builder() {
        let ctx = InstrumentContext::default();
        let c = |x, y, r| Circle::new(x, y, r).unwrap();
        let model = GeometryModel {
            occulter1: c(310.0, 712.0, 20.0),
            occulter2: c(712.0, 310.0, 22.0),
            field1: c(311.0, 712.0, 45.0),
            field2: c(713.0, 310.0, 45.0),
            post_angle1: 90.0,
            post_angle2: 90.0,
            delta_x: 1.0,
            delta_y: 0.0,
            overlap_angle: 0.0,
        };
        let mut header = Header::new();
        model.to_header(&mut header, 121);
        header.set("OCC-ID", "1");
        header.set("SOLAR_P0", 0.0);

        let config = MaskConfig {
            image_occulter_radius: true,
            ..Default::default()
        };
        let (mask, geometry) = MaskBuilder::new(&ctx, config)
            .build_from_header(&header, (121, 121))
            .unwrap();
        assert_eq!(geometry.occulter_center, [60.0, 60.0]);
        assert_eq!(geometry.occulter_radius, 21.0);
        assert_eq!(mask[[60, 60]], 0.0);
        assert_eq!(mask[[60, 90]], 1.0);
        assert_eq!(mask[[90, 60]], 0.0);
    }

    #[test]
    fn non_finite_geometry_is_degenerate() {
        let ctx = InstrumentContext::default();
        let mut bad = geometry();
        bad.overlap_angle = f64::NAN;
        assert!(matches!(
            MaskBuilder::new(&ctx, MaskConfig::default()).build(&bad, (11, 11)),
            Err(ReduceError::DegenerateGeometry(_))
        ));
    }
}

use compcore::geometry::{AnnulusGuess, Beam, BeamLayout, Circle, FlatGeometry};
use compcore::InstrumentContext;
use ndarray::{s, Array2};
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::profile::GeneratorConfig;

/// True occulter offsets from each beam center, pixels.
const BEAM_OFFSETS: [(f64, f64); 2] = [(1.5, -0.5), (-1.0, 2.0)];

/// One beam: dark occulter, bright annulus, dark beyond the field stop and a
/// dimmed post wedge. Edges are anti-aliased over one pixel.
fn beam_image(size: usize, occulter: (f64, f64, f64), field: (f64, f64, f64), post_angle: f64, rng: &mut StdRng, noise: f64) -> Array2<f32> {
    let c = (size as f64 - 1.0) / 2.0;
    let (sin, cos) = post_angle.to_radians().sin_cos();
    Array2::from_shape_fn((size, size), |(y, x)| {
        let dx = x as f64 - c - occulter.0;
        let dy = y as f64 - c - occulter.1;
        let ro = dx.hypot(dy);
        let rf = (x as f64 - c - field.0).hypot(y as f64 - c - field.1);
        let mut value = 100.0 * (ro - occulter.2 + 0.5).clamp(0.0, 1.0) * (field.2 - rf + 0.5).clamp(0.0, 1.0);
        if dx * cos + dy * sin > 0.0 && (-dx * sin + dy * cos).abs() <= 6.0 {
            value *= 0.1;
        }
        if noise > 0.0 {
            value += 100.0 * rng.gen_range(-noise..noise);
        }
        value as f32
    })
}

/// Synthetic raw detector frame and the flat-field guesses that go with it.
pub fn raw_frame(ctx: &InstrumentContext, config: &GeneratorConfig) -> anyhow::Result<(Array2<f32>, FlatGeometry)> {
    let layout = BeamLayout::new(ctx.frame_size, ctx.beam_size)?;
    let occulter_radius = ctx.occulter_radius(&config.occulter_id)?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut frame = Array2::<f32>::zeros((ctx.frame_size, ctx.frame_size));

    for (beam, offset) in [Beam::One, Beam::Two].into_iter().zip(BEAM_OFFSETS) {
        let sub = beam_image(
            ctx.beam_size,
            (offset.0, offset.1, occulter_radius),
            (config.field_offset[0], config.field_offset[1], config.field_radius),
            config.post_angle,
            &mut rng,
            config.noise,
        );
        // Beams share a corner of the frame; their light adds there.
        let [x0, y0] = layout.corner(beam);
        let mut region = frame.slice_mut(s![y0..y0 + ctx.beam_size, x0..x0 + ctx.beam_size]);
        region += &sub;
    }

    // Guesses are rounded the way a flat-field fit would report them.
    let guess = |offset: (f64, f64)| -> anyhow::Result<AnnulusGuess> {
        Ok(AnnulusGuess {
            occulter: Circle::new(offset.0.round(), offset.1.round(), occulter_radius.round() + 1.0)?,
            field: Circle::new(config.field_offset[0], config.field_offset[1], config.field_radius - 2.0)?,
        })
    };
    let flat = FlatGeometry {
        beam1: guess(BEAM_OFFSETS[0])?,
        beam2: guess(BEAM_OFFSETS[1])?,
        post_angle1: None,
        post_angle2: None,
    };
    Ok((frame, flat))
}

#[cfg(test)]
mod tests {
    use super::*;
    use compcore::geometry::calibrate_geometry;
    use compcore::telemetry::LogManager;

    #[test]
    fn calibration_recovers_the_template_geometry() {
        let mut ctx = InstrumentContext {
            frame_size: 256,
            beam_size: 150,
            ..Default::default()
        };
        ctx.occulter_radii.insert("1".into(), 40.0);
        let config = GeneratorConfig {
            field_radius: 65.0,
            field_offset: [0.0, 0.0],
            noise: 0.002,
            ..Default::default()
        };
        let (frame, flat) = raw_frame(&ctx, &config).unwrap();
        let calib = calibrate_geometry(&ctx, frame.view(), &flat, &LogManager::for_file("template")).unwrap();

        let layout = BeamLayout::new(256, 150).unwrap();
        let [c1x, c1y] = layout.center_in_frame(Beam::One);
        assert!((calib.model.occulter1.x() - (c1x + 1.5)).abs() < 0.5);
        assert!((calib.model.occulter1.y() - (c1y - 0.5)).abs() < 0.5);
        assert!((calib.model.occulter2.r() - 40.0).abs() < 0.5);
        assert!((calib.model.field1.r() - 65.0).abs() < 0.5);
        assert!((calib.model.post_angle1 - 270.0).abs() <= 3.0, "post angle {}", calib.model.post_angle1);
        assert!((calib.model.post_angle2 - 270.0).abs() <= 3.0, "post angle {}", calib.model.post_angle2);
    }

    #[test]
    fn full_frame_post_angles_ignore_the_shared_corner() {
        let ctx = InstrumentContext::default();
        let config = GeneratorConfig::default();
        let (frame, flat) = raw_frame(&ctx, &config).unwrap();
        let calib = calibrate_geometry(&ctx, frame.view(), &flat, &LogManager::for_file("template")).unwrap();

        let model = calib.model;
        assert!((model.post_angle1 - 270.0).abs() <= 3.0, "post angle {}", model.post_angle1);
        assert!((model.post_angle2 - 270.0).abs() <= 3.0, "post angle {}", model.post_angle2);
        assert!((model.mean_post_angle() - 270.0).abs() <= 3.0);
        assert!((model.occulter1.r() - 224.0).abs() < 0.5);
    }
}

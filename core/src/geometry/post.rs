//! Occulter post detection.
//!
//! The post holding the occulter shows up as the darkest direction on a ring
//! just outside the occulter edge.

use ndarray::ArrayView2;

use super::circle::Circle;
use super::sampling::{bilinear_sample, image_center};
use crate::math::StatsHelper;

/// Distance beyond the occulter edge where the ring starts (pixels).
const RING_MARGIN: f64 = 6.0;
/// Radial extent of the ring (pixels).
const RING_WIDTH: f64 = 10.0;
const N_ANGLES: usize = 360;
/// Circular box smoothing half-window (samples).
const SMOOTH_HALF: usize = 2;
/// The darkest direction must fall below this fraction of the median.
const MIN_CONTRAST: f64 = 0.8;

/// Gap kept inside the field stop so the ring never reads its dark edge.
const FIELD_MARGIN: f64 = 2.0;

/// Position angle of the post in degrees, counter-clockwise from +x, or
/// `None` when no direction is clearly darker than the rest of the ring.
///
/// Only samples inside `field` and outside `exclude` (the other beam's field
/// stop where the beams share frame pixels) count. Directions left with no
/// sample are ignored; at least half of the ring must remain. Circles are
/// relative to the sub-image center.
pub fn find_post_angle(
    sub_image: ArrayView2<f32>,
    occulter: &Circle,
    field: &Circle,
    exclude: Option<&Circle>,
) -> Option<f64> {
    let [cx, cy] = image_center(sub_image);
    let (ox, oy) = (cx + occulter.x(), cy + occulter.y());
    let r_inner = occulter.r() + RING_MARGIN;
    let usable = |x: f64, y: f64| {
        let (dx, dy) = (x - cx, y - cy);
        let in_field = (dx - field.x()).hypot(dy - field.y()) <= field.r() - FIELD_MARGIN;
        let in_other = exclude.is_some_and(|other| (dx - other.x()).hypot(dy - other.y()) <= other.r());
        in_field && !in_other
    };

    let ring: Vec<f64> = (0..N_ANGLES)
        .map(|k| {
            let theta = (k as f64 * 360.0 / N_ANGLES as f64).to_radians();
            let (sin, cos) = theta.sin_cos();
            let values: Vec<f64> = (0..=RING_WIDTH as usize)
                .filter_map(|step| {
                    let r = r_inner + step as f64;
                    let (x, y) = (ox + r * cos, oy + r * sin);
                    if !usable(x, y) {
                        return None;
                    }
                    bilinear_sample(sub_image, x, y).map(f64::from)
                })
                .collect();
            StatsHelper::mean(&values).unwrap_or(f64::NAN)
        })
        .collect();

    if ring.iter().filter(|v| v.is_finite()).count() < N_ANGLES / 2 {
        return None;
    }

    let smoothed: Vec<f64> = (0..N_ANGLES)
        .map(|k| {
            if !ring[k].is_finite() {
                return f64::NAN;
            }
            let window: Vec<f64> = (0..=2 * SMOOTH_HALF)
                .map(|offset| ring[(k + N_ANGLES + offset - SMOOTH_HALF) % N_ANGLES])
                .filter(|v| v.is_finite())
                .collect();
            window.iter().sum::<f64>() / window.len() as f64
        })
        .collect();

    let finite: Vec<f64> = smoothed.iter().copied().filter(|v| v.is_finite()).collect();
    let median = StatsHelper::median(&finite)?;
    let (darkest, value) = smoothed
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .min_by(|a, b| a.1.total_cmp(&b.1))?;
    if median <= 0.0 || value > MIN_CONTRAST * median {
        return None;
    }
    Some(darkest as f64 * 360.0 / N_ANGLES as f64)
}

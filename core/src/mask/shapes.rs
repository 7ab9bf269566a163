//! Component masks. Each returns 1 where pixels are kept and 0 where excluded.

use ndarray::Array2;

use crate::prelude::Mask;

fn polar_map(shape: (usize, usize), center: [f64; 2], f: impl Fn(f64, f64) -> bool) -> Mask {
    Array2::from_shape_fn(shape, |(y, x)| {
        let dx = x as f64 - center[0];
        let dy = y as f64 - center[1];
        if f(dx, dy) {
            1.0
        } else {
            0.0
        }
    })
}

/// 1 outside the occulter disk of `radius`, 0 on and inside it.
pub fn disk_mask(shape: (usize, usize), center: [f64; 2], radius: f64) -> Mask {
    let r2 = radius * radius;
    polar_map(shape, center, |dx, dy| dx * dx + dy * dy > r2)
}

/// 1 inside the field stop of `radius`, 0 outside.
pub fn field_mask(shape: (usize, usize), center: [f64; 2], radius: f64) -> Mask {
    let r2 = radius * radius;
    polar_map(shape, center, |dx, dy| dx * dx + dy * dy < r2)
}

/// 0 inside the angular wedge of full width `width_deg` centered on
/// `angle_deg` (counter-clockwise from +x), 1 elsewhere.
pub fn post_mask(shape: (usize, usize), center: [f64; 2], angle_deg: f64, width_deg: f64) -> Mask {
    let half = 0.5 * width_deg;
    polar_map(shape, center, |dx, dy| {
        if dx == 0.0 && dy == 0.0 {
            return true;
        }
        let theta = dy.atan2(dx).to_degrees();
        angular_distance(theta, angle_deg) > half
    })
}

/// 0 beyond the chord where the other beam's field no longer overlaps this
/// one: pixels whose projection onto the `angle_deg` direction exceeds
/// `field_radius - offset`.
pub fn overlap_mask(shape: (usize, usize), center: [f64; 2], angle_deg: f64, field_radius: f64, offset: f64) -> Mask {
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let cutoff = field_radius - offset.abs();
    polar_map(shape, center, |dx, dy| dx * cos + dy * sin <= cutoff)
}

/// Smallest absolute difference between two angles in degrees, `[0, 180]`.
pub fn angular_distance(a_deg: f64, b_deg: f64) -> f64 {
    let diff = (a_deg - b_deg).rem_euclid(360.0);
    diff.min(360.0 - diff)
}

//! Synthetic fixtures shared by unit tests.

use ndarray::Array2;

use crate::interface::{Extension, Header, Observation};

/// Dark occulter disk, bright annulus and dark surround beyond the field
/// stop, with a small deterministic ripple standing in for noise.
///
/// Circles are `(x, y, r)` with centers offset from the image center.
pub fn annulus_image(size: usize, occ: (f64, f64, f64), field: (f64, f64, f64), ripple: f32) -> Array2<f32> {
    let c = (size as f64 - 1.0) / 2.0;
    Array2::from_shape_fn((size, size), |(y, x)| {
        let ro = ((x as f64 - c - occ.0).powi(2) + (y as f64 - c - occ.1).powi(2)).sqrt();
        let rf = ((x as f64 - c - field.0).powi(2) + (y as f64 - c - field.1).powi(2)).sqrt();
        let outside_occ = (ro - occ.2 + 0.5).clamp(0.0, 1.0);
        let inside_field = (field.2 - rf + 0.5).clamp(0.0, 1.0);
        let noise = ripple * (((x * 7 + y * 13) % 11) as f32 / 10.0 - 0.5);
        (10.0 * outside_occ * inside_field) as f32 + noise
    })
}

/// Darken a wedge of half-width `half_width_px` pixels running outward from
/// `center` (image coordinates) at `angle_deg`.
pub fn paint_post(image: &mut Array2<f32>, center: [f64; 2], angle_deg: f64, half_width_px: f64) {
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    for ((y, x), value) in image.indexed_iter_mut() {
        let dx = x as f64 - center[0];
        let dy = y as f64 - center[1];
        let along = dx * cos + dy * sin;
        let across = -dx * sin + dy * cos;
        if along > 0.0 && across.abs() <= half_width_px {
            *value *= 0.1;
        }
    }
}

/// Averaged observation of a Gaussian emission line sampled at
/// `wavelengths`. `line(y, x)` gives `(peak, center_nm, width_nm)` per pixel;
/// Q and U are fixed fractions of I. Four Stokes blocks plus background.
pub fn line_observation(
    wavelengths: &[f64],
    shape: (usize, usize),
    line: impl Fn(usize, usize) -> (f64, f64, f64),
    pol: (f64, f64),
) -> Observation {
    let mut primary = Header::new();
    primary.set("NTUNE", wavelengths.len());
    primary.set("OBS_PLAN", "synoptic");
    primary.set("OBS_ID", "test");

    let mut extensions = Vec::new();
    for block in 0..5 {
        for &wave in wavelengths {
            let data = Array2::from_shape_fn(shape, |(y, x)| {
                let (peak, center, width) = line(y, x);
                let i = peak * (-((wave - center) / width).powi(2)).exp();
                let value = match block {
                    0 => i,
                    1 => pol.0 * i,
                    2 => pol.1 * i,
                    _ => 0.0,
                };
                value as f32
            });
            let mut header = Header::new();
            header.set("WAVELENG", wave);
            extensions.push(Extension { header, data });
        }
    }
    Observation {
        name: "synthetic".into(),
        primary,
        extensions,
    }
}

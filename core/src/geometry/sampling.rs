use ndarray::ArrayView2;

/// Sample an image at a sub-pixel position with bilinear interpolation.
///
/// Pixel centers sit at integer coordinates, `x` along columns and `y` along
/// rows. Returns `None` when any of the four neighbours is out of bounds.
#[inline]
pub fn bilinear_sample(image: ArrayView2<f32>, x: f64, y: f64) -> Option<f32> {
    let (h, w) = image.dim();
    if w < 2 || h < 2 || !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
        return None;
    }
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    if x0 >= w - 1 || y0 >= h - 1 {
        // Exact hits on the last row/column are still valid samples.
        if x0 < w && y0 < h && x == x0 as f64 && y == y0 as f64 {
            return Some(image[[y0, x0]]);
        }
        return None;
    }

    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;
    let p00 = image[[y0, x0]];
    let p10 = image[[y0, x0 + 1]];
    let p01 = image[[y0 + 1, x0]];
    let p11 = image[[y0 + 1, x0 + 1]];

    Some(
        (1.0 - fx) * (1.0 - fy) * p00
            + fx * (1.0 - fy) * p10
            + (1.0 - fx) * fy * p01
            + fx * fy * p11,
    )
}

/// Geometric center of an image in pixel coordinates `[x, y]`.
pub fn image_center(image: ArrayView2<f32>) -> [f64; 2] {
    let (h, w) = image.dim();
    [(w as f64 - 1.0) / 2.0, (h as f64 - 1.0) / 2.0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn bilinear_midpoint_averages_neighbours() {
        let mut img = Array2::<f32>::zeros((4, 4));
        img[[1, 1]] = 100.0;
        img[[1, 2]] = 200.0;
        img[[2, 1]] = 100.0;
        img[[2, 2]] = 200.0;
        let value = bilinear_sample(img.view(), 1.5, 1.5).unwrap();
        assert!((value - 150.0).abs() < 1e-4);
    }

    #[test]
    fn out_of_bounds_is_none() {
        let img = Array2::<f32>::ones((4, 4));
        assert!(bilinear_sample(img.view(), -0.1, 1.0).is_none());
        assert!(bilinear_sample(img.view(), 3.5, 1.0).is_none());
        assert_eq!(bilinear_sample(img.view(), 3.0, 3.0), Some(1.0));
    }

    #[test]
    fn center_of_even_image_is_between_pixels() {
        let img = Array2::<f32>::zeros((6, 4));
        assert_eq!(image_center(img.view()), [1.5, 2.5]);
    }
}

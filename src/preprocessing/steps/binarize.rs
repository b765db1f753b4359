use crate::error::MicrError;
use image::{GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;

/// Sigma matching a 3x3 Gaussian kernel.
const BLUR_SIGMA: f32 = 0.8;

/// Gaussian-weighted adaptive threshold, inverse-binary.
///
/// The output polarity is foreground = bright: ink pixels come out 255 on
/// a black background. The per-pixel threshold is the Gaussian-weighted
/// neighbourhood mean minus `c`, saturated into the valid intensity range,
/// and a pixel is foreground when it does not exceed that threshold.
pub fn apply(image: &GrayImage, block_size: u32, c: i32) -> Result<GrayImage, MicrError> {
    if block_size < 3 || block_size % 2 == 0 {
        return Err(MicrError::Configuration(format!(
            "adaptive threshold block size must be odd and at least 3, got {block_size}"
        )));
    }

    let smoothed = gaussian_blur_f32(image, BLUR_SIGMA);
    let local_mean = gaussian_blur_f32(&smoothed, block_sigma(block_size));

    Ok(GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let threshold = (local_mean.get_pixel(x, y).0[0] as i32 - c).clamp(0, 255);
        if smoothed.get_pixel(x, y).0[0] as i32 > threshold {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    }))
}

/// Sigma equivalent of a Gaussian kernel of the given odd size.
fn block_sigma(block_size: u32) -> f32 {
    0.3 * ((block_size - 1) as f32 * 0.5 - 1.0) + 0.8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster;

    #[test]
    fn all_white_input_has_no_foreground() {
        let img = GrayImage::from_pixel(40, 30, Luma([255]));
        let out = apply(&img, 19, 1).unwrap();
        assert_eq!(raster::foreground_count(&out), 0);
    }

    #[test]
    fn all_black_input_is_all_foreground() {
        let img = GrayImage::from_pixel(40, 30, Luma([0]));
        let out = apply(&img, 19, 1).unwrap();
        assert_eq!(raster::foreground_count(&out), (40 * 30) as u64);
    }

    #[test]
    fn dark_text_becomes_bright_foreground() {
        let mut img = GrayImage::from_pixel(60, 20, Luma([240]));
        for x in 20..40 {
            for y in 8..12 {
                img.put_pixel(x, y, Luma([20]));
            }
        }
        let out = apply(&img, 19, 1).unwrap();
        assert!(raster::is_set(&out, 30, 10));
        assert!(!raster::is_set(&out, 5, 5));
    }

    #[test]
    fn even_block_size_is_a_configuration_error() {
        let img = GrayImage::new(10, 10);
        assert!(apply(&img, 4, 1).is_err());
        assert!(apply(&img, 1, 1).is_err());
    }
}

//! Rectangular-kernel morphology.
//!
//! The fixed small kernels used here (2x2 for the speckle clean, 25x1 for
//! fusing text into bars during deskew) are not expressible with the
//! distance-transform morphology helpers, so the min/max windows are
//! computed directly.

use super::polarity::Polarity;
use image::{GrayImage, Luma};

/// Speckle-clean kernel edge length.
const CLEAN_KERNEL: u32 = 2;

/// Erode with a `kw` x `kh` rectangular kernel anchored at the top-left.
pub fn erode_rect(img: &GrayImage, kw: u32, kh: u32) -> GrayImage {
    window_extreme(img, kw, kh, true)
}

/// Dilate with a `kw` x `kh` rectangular kernel anchored at the top-left.
pub fn dilate_rect(img: &GrayImage, kw: u32, kh: u32) -> GrayImage {
    window_extreme(img, kw, kh, false)
}

fn window_extreme(img: &GrayImage, kw: u32, kh: u32, min: bool) -> GrayImage {
    let (w, h) = img.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let mut out = if min { u8::MAX } else { u8::MIN };
        for dy in 0..kh {
            for dx in 0..kw {
                let sx = x + dx;
                let sy = y + dy;
                if sx < w && sy < h {
                    let v = img.get_pixel(sx, sy).0[0];
                    out = if min { out.min(v) } else { out.max(v) };
                }
            }
        }
        Luma([out])
    })
}

/// Morphological speckle clean with a 2x2 kernel.
///
/// On a light background ink is dark, so open (erode then dilate) removes
/// bright speckles; on a dark background the order flips.
pub fn apply(image: &GrayImage, polarity: Polarity) -> GrayImage {
    match polarity {
        Polarity::LightBackground => {
            dilate_rect(&erode_rect(image, CLEAN_KERNEL, CLEAN_KERNEL), CLEAN_KERNEL, CLEAN_KERNEL)
        }
        Polarity::DarkBackground => {
            erode_rect(&dilate_rect(image, CLEAN_KERNEL, CLEAN_KERNEL), CLEAN_KERNEL, CLEAN_KERNEL)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erode_removes_isolated_bright_pixel() {
        let mut img = GrayImage::new(8, 8);
        img.put_pixel(4, 4, Luma([255]));
        let out = erode_rect(&img, 2, 2);
        assert!(out.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn dilate_grows_bright_region() {
        let mut img = GrayImage::new(8, 8);
        img.put_pixel(4, 4, Luma([255]));
        let out = dilate_rect(&img, 2, 2);
        assert_eq!(out.get_pixel(3, 3).0[0], 255);
        assert_eq!(out.get_pixel(4, 4).0[0], 255);
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn light_background_clean_is_an_open() {
        // A lone bright speck on black must not survive erode-then-dilate.
        let mut img = GrayImage::new(8, 8);
        img.put_pixel(4, 4, Luma([255]));
        let out = apply(&img, Polarity::LightBackground);
        assert!(out.pixels().all(|p| p.0[0] == 0));
        // The flipped order (close) keeps it.
        let out = apply(&img, Polarity::DarkBackground);
        assert!(out.pixels().any(|p| p.0[0] == 255));
    }
}

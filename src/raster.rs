//! Helpers over `GrayImage` rasters.
//!
//! Every raster that flows into geometric analysis has foreground = bright:
//! ink pixels are 255, background 0. The binarizer establishes that
//! polarity; these helpers assume it.

use crate::geometry::Rect;
use image::{imageops, GrayImage};

pub const FOREGROUND: u8 = 255;
pub const BACKGROUND: u8 = 0;

/// Pixels at or above this value count as foreground.
const SET_LEVEL: u8 = 128;

/// Bounds-checked foreground test. Out-of-image coordinates are unset.
pub fn is_set(img: &GrayImage, x: i32, y: i32) -> bool {
    if x < 0 || y < 0 || x >= img.width() as i32 || y >= img.height() as i32 {
        return false;
    }
    img.get_pixel(x as u32, y as u32).0[0] >= SET_LEVEL
}

pub fn set_px(img: &mut GrayImage, x: i32, y: i32) {
    if x >= 0 && y >= 0 && x < img.width() as i32 && y < img.height() as i32 {
        img.get_pixel_mut(x as u32, y as u32).0[0] = FOREGROUND;
    }
}

pub fn clear_px(img: &mut GrayImage, x: i32, y: i32) {
    if x >= 0 && y >= 0 && x < img.width() as i32 && y < img.height() as i32 {
        img.get_pixel_mut(x as u32, y as u32).0[0] = BACKGROUND;
    }
}

/// Number of foreground pixels in the raster.
pub fn foreground_count(img: &GrayImage) -> u64 {
    img.pixels().filter(|p| p.0[0] >= SET_LEVEL).count() as u64
}

/// Copy of the sub-raster covered by `rect` (clamped to the image).
pub fn crop(img: &GrayImage, rect: &Rect) -> GrayImage {
    let r = rect.clamped(img.width(), img.height());
    imageops::crop_imm(img, r.x as u32, r.y as u32, r.width as u32, r.height as u32).to_image()
}

/// Mean intensity of a uniform `steps` x `steps` grid sample (cell centres).
pub fn grid_mean(img: &GrayImage, steps: u32) -> f64 {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 || steps == 0 {
        return 0.0;
    }
    let mut sum = 0u64;
    for gy in 0..steps {
        for gx in 0..steps {
            let x = (w * (2 * gx + 1)) / (2 * steps);
            let y = (h * (2 * gy + 1)) / (2 * steps);
            sum += img.get_pixel(x.min(w - 1), y.min(h - 1)).0[0] as u64;
        }
    }
    sum as f64 / (steps * steps) as f64
}

/// Length of the contiguous horizontal run of set pixels through (x, y).
/// Zero when (x, y) itself is unset.
pub fn horizontal_run(img: &GrayImage, x: i32, y: i32) -> i32 {
    if !is_set(img, x, y) {
        return 0;
    }
    let mut left = x;
    while is_set(img, left - 1, y) {
        left -= 1;
    }
    let mut right = x;
    while is_set(img, right + 1, y) {
        right += 1;
    }
    right - left + 1
}

/// Length of the contiguous vertical run of set pixels through (x, y).
pub fn vertical_run(img: &GrayImage, x: i32, y: i32) -> i32 {
    if !is_set(img, x, y) {
        return 0;
    }
    let mut top = y;
    while is_set(img, x, top - 1) {
        top -= 1;
    }
    let mut bottom = y;
    while is_set(img, x, bottom + 1) {
        bottom += 1;
    }
    bottom - top + 1
}

/// Tightest rectangle around the foreground pixels inside `within`, or
/// `None` when that region holds no foreground.
pub fn tight_foreground_rect(img: &GrayImage, within: &Rect) -> Option<Rect> {
    let r = within.clamped(img.width(), img.height());
    let (mut x0, mut y0, mut x1, mut y1) = (i32::MAX, i32::MAX, i32::MIN, i32::MIN);
    for y in r.y..r.bottom() {
        for x in r.x..r.right() {
            if is_set(img, x, y) {
                x0 = x0.min(x);
                y0 = y0.min(y);
                x1 = x1.max(x);
                y1 = y1.max(y);
            }
        }
    }
    if x1 < x0 {
        None
    } else {
        Some(Rect::from_min_max(x0, y0, x1, y1))
    }
}

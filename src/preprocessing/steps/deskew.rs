use super::morph;
use crate::geometry::{polygon_area, Rect};
use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::contrast::otsu_level;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use imageproc::geometry::min_area_rect;

/// Sigma matching a 7x7 Gaussian kernel.
const BLUR_SIGMA: f32 = 1.4;
/// Wide flat kernel that fuses a text row into one horizontal bar.
const BAR_KERNEL_WIDTH: u32 = 25;
/// Candidate bars must exceed this size...
const MIN_BAR_WIDTH: i32 = 120;
const MIN_BAR_HEIGHT: i32 = 10;
/// ...and stay shorter than this.
const MAX_BAR_HEIGHT: i32 = 100;
/// Rotations below this are noise.
const MIN_ANGLE_DEGREES: f64 = 0.1;

/// Deskew by finding the most bar-like text contour and levelling it.
///
/// When no candidate bar is found the image is returned unrotated.
pub fn apply(image: &GrayImage) -> GrayImage {
    let angle = match detect_angle(image) {
        Some(a) if a.abs() >= MIN_ANGLE_DEGREES => a,
        _ => return image.clone(),
    };

    tracing::debug!("deskew: correcting {:.2} degrees", angle);
    rotate_about_center(
        image,
        -(angle.to_radians() as f32),
        Interpolation::Bicubic,
        Luma([255u8]),
    )
}

/// Detect the skew angle in degrees, or `None` without a candidate bar.
fn detect_angle(image: &GrayImage) -> Option<f64> {
    let blurred = gaussian_blur_f32(image, BLUR_SIGMA);
    let level = otsu_level(&blurred);

    // Invert-binarize: dark text becomes bright foreground.
    let binary = GrayImage::from_fn(blurred.width(), blurred.height(), |x, y| {
        if blurred.get_pixel(x, y).0[0] <= level {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });

    let bars = morph::dilate_rect(&binary, BAR_KERNEL_WIDTH, 1);

    let mut best: Option<(f64, Vec<imageproc::point::Point<i32>>)> = None;
    for contour in find_contours::<i32>(&bars) {
        if contour.border_type != BorderType::Outer || contour.parent.is_some() {
            continue;
        }
        let rect = match Rect::bounding(&contour.points) {
            Some(r) => r,
            None => continue,
        };
        if rect.touches_border(bars.width(), bars.height()) {
            continue;
        }
        if rect.width <= MIN_BAR_WIDTH
            || rect.height <= MIN_BAR_HEIGHT
            || rect.height >= MAX_BAR_HEIGHT
        {
            continue;
        }
        let filled = polygon_area(&contour.points).max(1.0);
        let ratio = rect.area() as f64 / filled;
        if best.as_ref().map_or(true, |(r, _)| ratio < *r) {
            best = Some((ratio, contour.points));
        }
    }

    let (_, points) = best?;
    Some(rotated_rect_angle(&points))
}

/// Correction angle from the minimum-area rotated rectangle of a contour.
///
/// The first rectangle edge plays the role of the width; when it is the
/// short edge the long edge is perpendicular, so the angle shifts by 90
/// before wrapping back into [-90, 90).
fn rotated_rect_angle(points: &[imageproc::point::Point<i32>]) -> f64 {
    let corners = min_area_rect(points);
    let e1 = (
        (corners[1].x - corners[0].x) as f64,
        (corners[1].y - corners[0].y) as f64,
    );
    let e2 = (
        (corners[2].x - corners[1].x) as f64,
        (corners[2].y - corners[1].y) as f64,
    );
    let width = (e1.0 * e1.0 + e1.1 * e1.1).sqrt();
    let height = (e2.0 * e2.0 + e2.1 * e2.1).sqrt();

    let alpha = wrap_half_turn(e1.1.atan2(e1.0).to_degrees());
    if width < height {
        wrap_half_turn(alpha - 90.0)
    } else {
        alpha
    }
}

/// Wrap an angle into [-90, 90).
fn wrap_half_turn(mut degrees: f64) -> f64 {
    while degrees >= 90.0 {
        degrees -= 180.0;
    }
    while degrees < -90.0 {
        degrees += 180.0;
    }
    degrees
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with_bar(rotate: bool) -> GrayImage {
        let mut img = GrayImage::from_pixel(400, 200, Luma([255]));
        for x in 50i32..350 {
            // Slope of 1 px down per 20 px right is just under 3 degrees.
            let shift = if rotate { (x - 50) / 20 } else { 0 };
            for y in 0..16 {
                img.put_pixel(x as u32, (90 + shift + y) as u32, Luma([0]));
            }
        }
        img
    }

    #[test]
    fn straight_bar_needs_no_correction() {
        let angle = detect_angle(&page_with_bar(false)).unwrap();
        assert!(angle.abs() < 1.0, "got {angle}");
    }

    #[test]
    fn sloped_bar_is_detected() {
        let angle = detect_angle(&page_with_bar(true)).unwrap();
        assert!(angle.abs() > 1.0 && angle.abs() < 6.0, "got {angle}");
    }

    #[test]
    fn apply_preserves_dimensions() {
        let out = apply(&page_with_bar(true));
        assert_eq!(out.width(), 400);
        assert_eq!(out.height(), 200);
    }
}

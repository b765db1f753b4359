//! Anchor selection: the contour best matching the reference "0" glyph.
//!
//! The MICR row is always the lowest text on a cheque, so candidates are
//! scanned bottom-up and the search stops early once a match is good
//! enough. The winning contour seeds line construction.

use crate::detect::contour::Contour;
use crate::geometry::Rect;
use crate::raster;
use image::{imageops, imageops::FilterType, GrayImage};
use imageproc::template_matching::{match_template, MatchTemplateMethod};

/// Glyph comparison tile edge length.
pub const TILE_SIZE: u32 = 36;

#[derive(Debug, Clone, Copy)]
pub struct AnchorMatch {
    /// Index into the contour list
    pub index: usize,
    /// Normalized cross-correlation scaled to 0-100
    pub score: f64,
}

/// Crop a contour region and normalize it to the comparison tile size.
pub fn glyph_tile(image: &GrayImage, rect: &Rect) -> GrayImage {
    let region = raster::crop(image, rect);
    imageops::resize(&region, TILE_SIZE, TILE_SIZE, FilterType::Triangle)
}

/// Normalized cross-correlation of two equal-size tiles, scaled to 0-100.
pub fn match_score(tile: &GrayImage, template: &GrayImage) -> f64 {
    let result = match_template(
        tile,
        template,
        MatchTemplateMethod::CrossCorrelationNormalized,
    );
    let value = result.get_pixel(0, 0).0[0] as f64;
    if !value.is_finite() {
        // All-black tiles make the normalization term vanish.
        return 0.0;
    }
    (value * 100.0).clamp(0.0, 100.0)
}

/// Find the line anchor among `contours`, scanning bottom-up.
///
/// Returns `None` when nothing scores above zero; the caller treats that
/// as a soft detection failure.
pub fn find_anchor(
    image: &GrayImage,
    contours: &[Contour],
    zero_template: &GrayImage,
    stop_score: u8,
) -> Option<AnchorMatch> {
    let mut order: Vec<usize> = (0..contours.len()).collect();
    order.sort_by_key(|&i| (-contours[i].rect.y, contours[i].rect.x));

    let mut best: Option<AnchorMatch> = None;
    for index in order {
        let tile = glyph_tile(image, &contours[index].rect);
        let score = match_score(&tile, zero_template);
        if score <= 0.0 {
            continue;
        }
        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(AnchorMatch { index, score });
        }
        if score >= stop_score as f64 {
            break;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::contour::{Contour, SizeClass};

    /// Hollow rectangle roughly shaped like the E-13B zero.
    fn draw_zero(img: &mut GrayImage, x0: i32, y0: i32, degrade: bool) {
        for y in 0..16 {
            for x in 0..12 {
                let edge = x < 3 || x >= 9 || y < 3 || y >= 13;
                if edge && !(degrade && y < 6) {
                    raster::set_px(img, x0 + x, y0 + y);
                }
            }
        }
    }

    fn contour_at(rect: Rect, index: usize) -> Contour {
        Contour {
            points: Vec::new(),
            rect,
            filled_area: 1.0,
            index,
            size: SizeClass::Unknown,
            in_line: false,
            overlap_adjusted: false,
            orig: None,
        }
    }

    #[test]
    fn bottom_copy_wins_over_higher_copy() {
        let mut img = GrayImage::new(120, 80);
        // Degraded copy high up, exact copy near the bottom.
        draw_zero(&mut img, 30, 10, true);
        draw_zero(&mut img, 60, 60, false);

        let mut template_img = GrayImage::new(12, 16);
        draw_zero(&mut template_img, 0, 0, false);
        let template = imageops::resize(&template_img, TILE_SIZE, TILE_SIZE, FilterType::Triangle);

        let contours = vec![
            contour_at(Rect::new(30, 10, 12, 16), 0),
            contour_at(Rect::new(60, 60, 12, 16), 1),
        ];

        let anchor = find_anchor(&img, &contours, &template, 90).unwrap();
        assert_eq!(anchor.index, 1);
        assert!(anchor.score >= 90.0, "score {}", anchor.score);
    }

    #[test]
    fn empty_candidate_list_has_no_anchor() {
        let img = GrayImage::new(10, 10);
        let template = GrayImage::from_pixel(TILE_SIZE, TILE_SIZE, image::Luma([255]));
        assert!(find_anchor(&img, &[], &template, 90).is_none());
    }
}

//! Overlap correction: erase ink reaching into the MICR band from above.
//!
//! Works on a padded copy of the line's bounding region, so the caller
//! re-runs detection on the returned raster. Every pass only clears
//! pixels; foreground never grows here.

mod crossing;
mod curve;

use crate::config::Config;
use crate::detect::line::Line;
use crate::raster;
use curve::{Curve, Halt};
use image::{GrayImage, Luma};
use imageproc::drawing::draw_polygon_mut;

/// Cap on crossing continuations per top-border run.
const MAX_SECTIONS: usize = 8;
/// HV thinning settles long before this.
const MAX_THINNING_ITERATIONS: usize = 100;

#[derive(Debug, Clone, Copy)]
pub struct OverlapConfig {
    /// Padding around the line rectangle for the working region
    pub padding: i32,
    /// Divergence, in degrees, at which an edge stops against ink it
    /// cannot follow
    pub max_delta: f64,
}

impl Default for OverlapConfig {
    fn default() -> Self {
        Self {
            padding: 5,
            max_delta: 20.0,
        }
    }
}

impl OverlapConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            padding: config.overlap_padding,
            ..Default::default()
        }
    }
}

/// Produce the corrected working raster for a line that reported overlap.
pub fn correct(image: &GrayImage, line: &Line, cfg: &OverlapConfig) -> GrayImage {
    let roi_rect = line
        .rect
        .padded(cfg.padding, cfg.padding)
        .clamped(image.width(), image.height());
    let mut roi = raster::crop(image, &roi_rect);

    let runs = top_border_runs(&roi);
    tracing::debug!("overlap: {} top-border ink runs in {:?}", runs.len(), roi_rect);
    for run in runs {
        clear_stroke(&mut roi, run, cfg.max_delta);
    }

    clear_padding(&mut roi, cfg.padding);
    vertical_thickness_clear(&mut roi, line.thresholds.vertical_thickness);
    hv_thin(
        &mut roi,
        line.thresholds.min_horizontal_run,
        line.thresholds.min_vertical_run,
        MAX_THINNING_ITERATIONS,
    );
    roi
}

/// X-runs of set pixels along the ROI's top border.
fn top_border_runs(roi: &GrayImage) -> Vec<(i32, i32)> {
    let mut runs = Vec::new();
    let mut start: Option<i32> = None;
    for x in 0..roi.width() as i32 {
        if raster::is_set(roi, x, 0) {
            start.get_or_insert(x);
        } else if let Some(s) = start.take() {
            runs.push((s, x - 1));
        }
    }
    if let Some(s) = start {
        runs.push((s, roi.width() as i32 - 1));
    }
    runs
}

/// Follow one top-border run down through the ROI, erasing the stroke
/// section by section until it ends or refuses to cross a character body.
fn clear_stroke(roi: &mut GrayImage, run: (i32, i32), max_delta: f64) {
    let mut section = Curve::seed((run.0, 0), (run.1, 0));
    for _ in 0..MAX_SECTIONS {
        match section.follow(roi, max_delta) {
            Halt::StrokeEnd => {
                erase_curve(roi, &section);
                return;
            }
            Halt::Intersection { edge } => {
                let continuation = crossing::attempt(roi, &section, edge);
                erase_curve(roi, &section);
                match continuation {
                    Some(c) => section = crossing::continuation_curve(&c),
                    None => return,
                }
            }
        }
    }
    erase_curve(roi, &section);
}

/// Erase the closed region between a curve's two edges.
fn erase_curve(roi: &mut GrayImage, section: &Curve) {
    let poly = section.polygon();
    if poly.len() >= 3 {
        let mut mask = GrayImage::new(roi.width(), roi.height());
        draw_polygon_mut(&mut mask, &poly, Luma([255u8]));
        for (x, y, m) in mask.enumerate_pixels() {
            if m.0[0] > 0 {
                raster::clear_px(roi, x as i32, y as i32);
            }
        }
    }
    // Degenerate outlines still clear their own trail.
    for (x, y) in section.traced_pixels() {
        raster::clear_px(roi, x, y);
    }
}

/// Zero the pad-wide strips on all four sides.
fn clear_padding(roi: &mut GrayImage, pad: i32) {
    let (w, h) = (roi.width() as i32, roi.height() as i32);
    let pad = pad.clamp(0, w.min(h));
    for y in 0..h {
        for x in 0..w {
            if x < pad || y < pad || x >= w - pad || y >= h - pad {
                raster::clear_px(roi, x, y);
            }
        }
    }
}

/// Erase every vertical run of set pixels no longer than `threshold`.
fn vertical_thickness_clear(roi: &mut GrayImage, threshold: i32) {
    let (w, h) = (roi.width() as i32, roi.height() as i32);
    for x in 0..w {
        let mut y = 0;
        while y < h {
            if !raster::is_set(roi, x, y) {
                y += 1;
                continue;
            }
            let mut end = y;
            while end + 1 < h && raster::is_set(roi, x, end + 1) {
                end += 1;
            }
            if end - y + 1 <= threshold {
                for yy in y..=end {
                    raster::clear_px(roi, x, yy);
                }
            }
            y = end + 1;
        }
    }
}

/// Repeatedly erase pixels whose horizontal and vertical runs are both
/// below their thresholds.
fn hv_thin(roi: &mut GrayImage, min_h: i32, min_v: i32, max_iterations: usize) {
    for _ in 0..max_iterations {
        let mut doomed: Vec<(i32, i32)> = Vec::new();
        for y in 0..roi.height() as i32 {
            for x in 0..roi.width() as i32 {
                if !raster::is_set(roi, x, y) {
                    continue;
                }
                if raster::horizontal_run(roi, x, y) < min_h
                    && raster::vertical_run(roi, x, y) < min_v
                {
                    doomed.push((x, y));
                }
            }
        }
        if doomed.is_empty() {
            break;
        }
        for (x, y) in doomed {
            raster::clear_px(roi, x, y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::contour::{self, ContourFilter};
    use crate::detect::line;
    use crate::geometry::Rect;

    fn blob(img: &mut GrayImage, rect: Rect) {
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                raster::set_px(img, x, y);
            }
        }
    }

    #[test]
    fn hv_thin_removes_specks_and_keeps_blocks() {
        let mut img = GrayImage::new(30, 30);
        blob(&mut img, Rect::new(5, 5, 10, 10));
        raster::set_px(&mut img, 25, 25);
        raster::set_px(&mut img, 26, 25);

        hv_thin(&mut img, 4, 4, MAX_THINNING_ITERATIONS);

        assert!(raster::is_set(&img, 8, 8));
        assert!(!raster::is_set(&img, 25, 25));
        assert!(!raster::is_set(&img, 26, 25));
    }

    #[test]
    fn vertical_thickness_clear_drops_short_runs() {
        let mut img = GrayImage::new(10, 30);
        // Short run of 3, tall run of 12.
        for y in 2..5 {
            raster::set_px(&mut img, 2, y);
        }
        for y in 10..22 {
            raster::set_px(&mut img, 5, y);
        }
        vertical_thickness_clear(&mut img, 4);
        assert!(!raster::is_set(&img, 2, 3));
        assert!(raster::is_set(&img, 5, 15));
    }

    #[test]
    fn top_border_runs_are_detected() {
        let mut img = GrayImage::new(20, 5);
        for x in 3..6 {
            raster::set_px(&mut img, x, 0);
        }
        for x in 10..12 {
            raster::set_px(&mut img, x, 0);
        }
        assert_eq!(top_border_runs(&img), vec![(3, 5), (10, 11)]);
    }

    #[test]
    fn correction_erases_overhanging_stroke_and_keeps_characters() {
        let mut img = GrayImage::new(260, 100);
        for i in 0..5 {
            if i == 2 {
                continue;
            }
            blob(&mut img, Rect::new(10 + i * 20, 40, 12, 16));
        }
        // A stroke from above fused with the missing character.
        blob(&mut img, Rect::new(52, 5, 4, 51));
        blob(&mut img, Rect::new(50, 40, 12, 16));

        let contours = contour::extract(&img, &ContourFilter::default());
        let anchor_index = contours
            .iter()
            .position(|c| c.rect == Rect::new(10, 40, 12, 16))
            .unwrap();
        let built = line::build(&img, &contours, anchor_index, 8);
        assert!(built.overlap);

        let roi_rect = built.rect.padded(5, 5).clamped(260, 100);
        let before = raster::foreground_count(&raster::crop(&img, &roi_rect));
        let roi = correct(&img, &built, &OverlapConfig::default());

        // Erase-only: the corrected region cannot out-ink its source.
        assert!(raster::foreground_count(&roi) < before);
        // The stroke above the character band is gone...
        let roi_x = built.rect.x - 5;
        let roi_y = built.rect.y - 5;
        assert!(!raster::is_set(&roi, 53 - roi_x, 37 - roi_y));
        // ...while character body pixels survive.
        assert!(raster::is_set(&roi, 35 - roi_x, 48 - roi_y));
    }
}

//! Line construction from an anchor contour.
//!
//! A line grows from the anchor in two passes: a neighbour sweep that
//! accepts contours sharing the anchor's vertical band, then a projection
//! recovery pass that places synthetic character rectangles into suspicious
//! gaps and pulls overlap-contaminated contours back in, restricted to the
//! projected region.

use crate::detect::contour::{Contour, SizeClass};
use crate::geometry::{x_distance, Rect};
use crate::raster;
use image::GrayImage;

/// Anti-hang cap; the recovery typically settles within 1-3 iterations.
const MAX_PROJECTION_ITERATIONS: usize = 10;

/// Accepted contours may be up to this much wider than the anchor.
const WIDTH_SLACK: f64 = 1.25;

/// Projection rectangles sit this many minimum gaps away from their
/// neighbour.
const PROJECTION_GAP_FACTOR: f64 = 1.3;

/// Character-size thresholds derived from the anchor contour.
#[derive(Debug, Clone, Copy)]
pub struct LineThresholds {
    pub min_area: f64,
    pub max_area: f64,
    pub min_height: f64,
    pub max_width: i32,
    pub max_height: i32,
    pub containment_pad: i32,
    pub min_horizontal_run: i32,
    pub min_vertical_run: i32,
    pub vertical_thickness: i32,
}

impl LineThresholds {
    pub fn from_anchor(anchor: &Rect) -> Self {
        let area = anchor.area() as f64;
        let width = anchor.width as f64;
        let height = anchor.height as f64;
        Self {
            min_area: 0.47 * area,
            max_area: 1.25 * area,
            min_height: 0.9 * height,
            max_width: anchor.width,
            max_height: anchor.height,
            containment_pad: (0.25 * height) as i32,
            min_horizontal_run: (0.3 * width).round() as i32,
            min_vertical_run: (0.3 * height).round() as i32,
            vertical_thickness: (0.25 * height).round() as i32,
        }
    }

    pub fn categorize(&self, rect: &Rect) -> SizeClass {
        let area = rect.area() as f64;
        if area > self.max_area {
            SizeClass::Large
        } else if area < self.min_area || (rect.height as f64) < self.min_height {
            SizeClass::Small
        } else {
            SizeClass::Medium
        }
    }
}

/// A horizontal row of related contours with derived thresholds.
#[derive(Debug, Clone)]
pub struct Line {
    /// On-line contours, sorted ascending by X
    pub contours: Vec<Contour>,
    /// Union of the on-line contour rectangles
    pub rect: Rect,
    /// Set when projection recovery pulled in restricted contours
    pub overlap: bool,
    pub thresholds: LineThresholds,
    pub anchor_rect: Rect,
    /// Smallest X-gap observed between accepted Medium contours
    pub min_x_gap: i32,
}

/// Build a line from the anchor at `anchor_index` within `contours`.
///
/// `default_gap` substitutes for the measured Medium gap when the sweep
/// never sees two Medium contours side by side.
pub fn build(
    image: &GrayImage,
    contours: &[Contour],
    anchor_index: usize,
    default_gap: i32,
) -> Line {
    let anchor_rect = contours[anchor_index].rect;
    let thresholds = LineThresholds::from_anchor(&anchor_rect);

    let mut all: Vec<Contour> = contours.to_vec();
    for c in &mut all {
        c.size = thresholds.categorize(&c.rect);
    }
    let anchor_pos = all
        .iter()
        .position(|c| c.index == contours[anchor_index].index)
        .unwrap_or(anchor_index);
    all[anchor_pos].in_line = true;

    let mut accepted: Vec<Contour> = vec![all[anchor_pos].clone()];
    let mut holding: Vec<Contour> = Vec::new();
    let mut min_x_gap: Option<i32> = None;

    // Sweep right of the anchor, then left, tracking the last accepted
    // contour as the local reference.
    for direction in [1i32, -1i32] {
        let mut lc = all[anchor_pos].clone();
        let mut pos = anchor_pos as i32 + direction;
        while pos >= 0 && (pos as usize) < all.len() {
            let candidate = &all[pos as usize];
            pos += direction;

            if !candidate.rect.y_range().intersects(&lc.rect.y_range()) {
                continue;
            }

            let padded = lc
                .rect
                .y_range()
                .padded(thresholds.containment_pad, image.height() as i32 - 1);
            let narrow = (candidate.rect.width as f64) <= WIDTH_SLACK * thresholds.max_width as f64;

            if narrow && padded.contains(&candidate.rect.y_range()) {
                let mut accepted_contour = candidate.clone();
                accepted_contour.in_line = true;
                if accepted_contour.size == SizeClass::Medium {
                    if lc.size == SizeClass::Medium {
                        let gap = x_distance(&lc.rect, &accepted_contour.rect);
                        min_x_gap = Some(min_x_gap.map_or(gap, |g: i32| g.min(gap)));
                    }
                    lc = accepted_contour.clone();
                }
                accepted.push(accepted_contour);
            } else {
                holding.push(candidate.clone());
            }
        }
    }

    accepted.sort_by_key(|c| (c.rect.x, c.rect.y));

    let mut line = Line {
        rect: union_rect(&accepted).unwrap_or(anchor_rect),
        contours: accepted,
        overlap: false,
        thresholds,
        anchor_rect,
        min_x_gap: min_x_gap.unwrap_or(default_gap),
    };

    recover_projections(image, &mut line, &mut holding);
    line.rect = union_rect(&line.contours).unwrap_or(anchor_rect);
    line
}

/// Fill gaps between accepted contours with projection rectangles and pull
/// in holding-list contours that intersect them.
fn recover_projections(image: &GrayImage, line: &mut Line, holding: &mut Vec<Contour>) {
    for _ in 0..MAX_PROJECTION_ITERATIONS {
        line.contours.sort_by_key(|c| (c.rect.x, c.rect.y));
        let projections = emit_projections(image, line);
        if projections.is_empty() {
            break;
        }

        let mut inserted = false;
        holding.retain(|candidate| {
            let hit = projections.iter().find(|p| p.intersects(&candidate.rect));
            let projection = match hit {
                Some(p) => p,
                None => return true,
            };
            match restrict_to(image, candidate, projection) {
                Some(restricted) => {
                    let mut c = restricted;
                    c.size = line.thresholds.categorize(&c.rect);
                    c.in_line = true;
                    line.contours.push(c);
                    inserted = true;
                    false
                }
                None => true,
            }
        });

        if !inserted {
            break;
        }
        line.overlap = true;
    }
    line.contours.sort_by_key(|c| (c.rect.x, c.rect.y));
}

/// Walk the accepted contours in both directions and place a projection
/// rectangle wherever the gap to the next contour could hide a character.
fn emit_projections(image: &GrayImage, line: &Line) -> Vec<Rect> {
    let t = &line.thresholds;
    let trigger_gap = t.max_width + line.min_x_gap;
    let offset = (PROJECTION_GAP_FACTOR * line.min_x_gap as f64) as i32;
    let mut projections: Vec<Rect> = Vec::new();

    let mut push = |rect: Rect| {
        let inside = rect.x >= 0
            && rect.y >= 0
            && rect.right() <= image.width() as i32
            && rect.bottom() <= image.height() as i32;
        if inside && !projections.iter().any(|p| p.intersects(&rect)) {
            projections.push(rect);
        }
    };

    // Left to right.
    let mut last_medium_y = line.anchor_rect.y;
    for pair in line.contours.windows(2) {
        if pair[0].size == SizeClass::Medium {
            last_medium_y = pair[0].rect.y;
        }
        if x_distance(&pair[0].rect, &pair[1].rect) > trigger_gap {
            push(Rect::new(
                pair[0].rect.right() + offset,
                last_medium_y,
                t.max_width,
                t.max_height,
            ));
        }
    }

    // Right to left.
    let mut last_medium_y = line.anchor_rect.y;
    for pair in line.contours.windows(2).rev() {
        if pair[1].size == SizeClass::Medium {
            last_medium_y = pair[1].rect.y;
        }
        if x_distance(&pair[0].rect, &pair[1].rect) > trigger_gap {
            push(Rect::new(
                pair[1].rect.x - offset - t.max_width,
                last_medium_y,
                t.max_width,
                t.max_height,
            ));
        }
    }

    projections
}

/// Clone `candidate` restricted to its foreground pixels inside
/// `projection`. The unrestricted rectangle is preserved for debugging.
fn restrict_to(image: &GrayImage, candidate: &Contour, projection: &Rect) -> Option<Contour> {
    let window = candidate.rect.intersection(projection)?;
    let tight = raster::tight_foreground_rect(image, &window)?;
    let mut restricted = candidate.clone();
    restricted.orig = Some(candidate.rect);
    restricted.rect = tight;
    restricted.overlap_adjusted = true;
    Some(restricted)
}

fn union_rect(contours: &[Contour]) -> Option<Rect> {
    let mut iter = contours.iter();
    let first = iter.next()?.rect;
    Some(iter.fold(first, |acc, c| acc.union(&c.rect)))
}

//! Character segmentation of a finalized line.
//!
//! Medium contours become characters directly; everything else is buffered
//! and grouped through projected character rectangles probed out from the
//! nearest reliable neighbour. Each emitted character then receives a type:
//!
//! 1. inside a root (anchor) rectangle,
//! 2. vertically contained by a reliable neighbour's estimate rectangle,
//! 3. adjacent with believable overlap into the neighbour's band,
//! 4. everything else, dropped from the output.

use crate::config::Config;
use crate::detect::contour::SizeClass;
use crate::detect::line::Line;
use crate::geometry::{x_distance, MinMax, Rect};
use crate::raster;
use image::GrayImage;

/// One segmented character region.
#[derive(Debug, Clone)]
pub struct Character {
    /// Positions of the source contours in the line's contour list
    pub contour_indices: Vec<usize>,
    pub rect: Rect,
    /// Type 1-3 in the output; 0 marks a not-yet-typed character
    pub kind: u8,
    /// Rectangle before a snap-to-neighbour adjustment
    pub adjusted_from: Option<Rect>,
    pub index: usize,
    from_medium: bool,
}

impl Character {
    /// Free-standing character over a region, for callers that bypass
    /// segmentation.
    pub fn from_rect(rect: Rect, kind: u8) -> Self {
        Self {
            contour_indices: Vec::new(),
            rect,
            kind,
            adjusted_from: None,
            index: 0,
            from_medium: false,
        }
    }
}

/// Gap statistics computed from Medium contours only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineStats {
    pub max_width: i32,
    pub avg_width: f64,
    pub min_dist_between: i32,
    pub max_dist_between: i32,
    pub avg_dist_between: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct SegmentConfig {
    pub max_char_width: i32,
    pub max_char_height: i32,
    pub max_space_between_chars_of_word: i32,
    pub max_space_between_words: i32,
}

impl SegmentConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_char_width: config.max_char_width,
            max_char_height: config.max_char_height,
            max_space_between_chars_of_word: config.max_space_between_chars_of_word,
            max_space_between_words: config.max_space_between_words,
        }
    }
}

/// Result of segmenting one line.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Characters of type 1-3, sorted ascending by X
    pub characters: Vec<Character>,
    /// Final line bounding rectangle
    pub bounds: Rect,
    pub stats: LineStats,
}

/// Segment `line` into typed characters.
///
/// `root_rects` are the regions granting type 1 membership; callers pass
/// the anchor rectangle unless a stronger prior exists.
pub fn segment(
    image: &GrayImage,
    line: &Line,
    cfg: &SegmentConfig,
    root_rects: &[Rect],
) -> Segmentation {
    let stats = compute_stats(line, cfg);
    let mut characters = iterate_characters(image, line, &stats);

    assign_types(image, line, cfg, root_rects, &mut characters);
    characters.retain(|c| c.kind != 0);
    sort_and_index(&mut characters);

    let bounds = line_bounds(image, line, &characters);
    Segmentation {
        characters,
        bounds,
        stats,
    }
}

fn compute_stats(line: &Line, cfg: &SegmentConfig) -> LineStats {
    let mediums: Vec<&Rect> = line
        .contours
        .iter()
        .filter(|c| c.size == SizeClass::Medium)
        .map(|c| &c.rect)
        .collect();

    let mut stats = LineStats::default();
    if mediums.is_empty() {
        stats.min_dist_between = cfg.max_space_between_chars_of_word;
        return stats;
    }

    stats.max_width = mediums.iter().map(|r| r.width).max().unwrap_or(0);
    stats.avg_width =
        mediums.iter().map(|r| r.width as f64).sum::<f64>() / mediums.len() as f64;

    let gaps: Vec<i32> = mediums
        .windows(2)
        .map(|pair| x_distance(pair[0], pair[1]))
        .collect();
    if gaps.is_empty() {
        stats.min_dist_between = cfg.max_space_between_chars_of_word;
        return stats;
    }
    stats.min_dist_between = gaps.iter().copied().min().unwrap_or(0);
    // A stray far contour must not stretch the probe windows.
    stats.max_dist_between = gaps
        .iter()
        .copied()
        .max()
        .unwrap_or(0)
        .min(cfg.max_space_between_words);
    stats.avg_dist_between = gaps.iter().map(|&g| g as f64).sum::<f64>() / gaps.len() as f64;
    stats
}

/// Left-to-right scan emitting Medium singles and probed groups.
fn iterate_characters(image: &GrayImage, line: &Line, stats: &LineStats) -> Vec<Character> {
    let mut characters: Vec<Character> = Vec::new();
    let mut buffer: Vec<usize> = Vec::new();

    for (i, contour) in line.contours.iter().enumerate() {
        if contour.size != SizeClass::Medium {
            buffer.push(i);
            continue;
        }

        // Resolve what accumulated between the previous character and this
        // Medium before emitting it.
        probe_right(image, line, stats, &mut characters, &mut buffer);
        probe_left(image, line, stats, &contour.rect, &mut characters, &mut buffer);

        characters.push(Character {
            contour_indices: vec![i],
            rect: contour.rect,
            kind: 0,
            adjusted_from: None,
            index: 0,
            from_medium: true,
        });
    }
    probe_right(image, line, stats, &mut characters, &mut buffer);

    // Buffered contours never pulled into a group are dropped.
    sort_and_index(&mut characters);
    characters
}

/// Probe rightward from the last emitted character until no group forms.
fn probe_right(
    image: &GrayImage,
    line: &Line,
    stats: &LineStats,
    characters: &mut Vec<Character>,
    buffer: &mut Vec<usize>,
) {
    loop {
        let prev = match characters.last() {
            Some(c) => c.rect,
            None => return,
        };
        let window = Rect::new(
            prev.right() + stats.min_dist_between,
            prev.y,
            stats.max_width.max(1),
            prev.height,
        );
        match group_in_window(image, line, &window, buffer) {
            Some(c) => characters.push(c),
            None => return,
        }
    }
}

/// Probe leftward from the upcoming Medium character. The window widens by
/// the observed gap spread to catch characters drifting out of rhythm.
fn probe_left(
    image: &GrayImage,
    line: &Line,
    stats: &LineStats,
    upcoming: &Rect,
    characters: &mut Vec<Character>,
    buffer: &mut Vec<usize>,
) {
    let width = (stats.max_width + (stats.max_dist_between - stats.min_dist_between)).max(1);
    let mut right_edge = upcoming.x;
    loop {
        let window = Rect::new(
            right_edge - stats.min_dist_between - width,
            upcoming.y,
            width,
            upcoming.height,
        );
        match group_in_window(image, line, &window, buffer) {
            Some(c) => {
                right_edge = c.rect.x;
                characters.push(c);
            }
            None => return,
        }
    }
}

/// Group buffered contours intersecting `window` into one character.
///
/// Large contours contribute only their portion inside the window. The
/// group is emitted when its bounding rectangle clears the line's minimum
/// character area.
fn group_in_window(
    image: &GrayImage,
    line: &Line,
    window: &Rect,
    buffer: &mut Vec<usize>,
) -> Option<Character> {
    let mut members: Vec<usize> = Vec::new();
    let mut bounds: Option<Rect> = None;

    for &idx in buffer.iter() {
        let contour = &line.contours[idx];
        let hit = match contour.rect.intersection(window) {
            Some(h) => h,
            None => continue,
        };
        let piece = if contour.size == SizeClass::Large {
            match raster::tight_foreground_rect(image, &hit) {
                Some(t) => t,
                None => continue,
            }
        } else {
            contour.rect
        };
        members.push(idx);
        bounds = Some(bounds.map_or(piece, |b| b.union(&piece)));
    }

    let rect = bounds?;
    if (rect.area() as f64) <= line.thresholds.min_area {
        return None;
    }
    buffer.retain(|idx| !members.contains(idx));
    Some(Character {
        contour_indices: members,
        rect,
        kind: 0,
        adjusted_from: None,
        index: 0,
        from_medium: false,
    })
}

fn sort_and_index(characters: &mut [Character]) {
    characters.sort_by_key(|c| (c.rect.x, c.rect.y));
    for (i, c) in characters.iter_mut().enumerate() {
        c.index = i;
    }
}

/// Apply the four typing passes in order.
fn assign_types(
    image: &GrayImage,
    line: &Line,
    cfg: &SegmentConfig,
    root_rects: &[Rect],
    characters: &mut Vec<Character>,
) {
    // Type 1: inside a root rectangle.
    for c in characters.iter_mut() {
        if root_rects.iter().any(|root| root.contains(&c.rect)) {
            c.kind = 1;
        }
    }

    // Type 2: vertically inside a reliable neighbour's estimate rectangle,
    // left-to-right then right-to-left.
    let pad = line.thresholds.containment_pad;
    for i in 1..characters.len() {
        if characters[i].kind != 0 {
            continue;
        }
        let nb = &characters[i - 1];
        if reliable(nb) && estimate_band(&nb.rect, cfg, pad).contains(&characters[i].rect.y_range())
        {
            characters[i].kind = 2;
        }
    }
    for i in (0..characters.len().saturating_sub(1)).rev() {
        if characters[i].kind != 0 {
            continue;
        }
        let nb = &characters[i + 1];
        if reliable(nb) && estimate_band(&nb.rect, cfg, pad).contains(&characters[i].rect.y_range())
        {
            characters[i].kind = 2;
        }
    }

    // Rectangle adjust: snap still-untyped characters beside a typed
    // neighbour into its vertical band.
    for i in 0..characters.len() {
        if characters[i].kind != 0 {
            continue;
        }
        let neighbour = [i.checked_sub(1), Some(i + 1)]
            .into_iter()
            .flatten()
            .filter(|&j| j < characters.len())
            .find(|&j| characters[j].kind == 1 || characters[j].kind == 2)
            .map(|j| characters[j].rect);
        if let Some(nb) = neighbour {
            let old = characters[i].rect;
            let band = Rect::new(old.x, nb.y, old.width, nb.height);
            let snapped = match raster::tight_foreground_rect(image, &band) {
                Some(t) => Rect::new(t.x, nb.y, t.width, nb.height),
                None => Rect::new(old.x, nb.y, old.width, nb.height),
            };
            characters[i].adjusted_from = Some(old);
            characters[i].rect = snapped;
        }
    }
    sort_and_index(characters);

    // Type 3: adjacency plus a bottom reaching past the neighbour's middle.
    for i in 0..characters.len() {
        if characters[i].kind != 0 {
            continue;
        }
        let left = i.checked_sub(1).map(|j| characters[j].rect);
        let right = (i + 1 < characters.len()).then(|| characters[i + 1].rect);
        let candidate = characters[i].rect;

        let near_hit = |nb: &Rect, to_right: bool| {
            let x = if to_right { nb.right() } else { nb.x - nb.width };
            let near = Rect::new(x, nb.y, nb.width, nb.height);
            near.intersects(&candidate) && candidate.bottom() > nb.mid_y()
        };

        let snap = match (left, right) {
            (Some(nb), _) if near_hit(&nb, true) => Some(nb),
            (_, Some(nb)) if near_hit(&nb, false) => Some(nb),
            _ => None,
        };
        if let Some(nb) = snap {
            characters[i].kind = 3;
            characters[i].adjusted_from.get_or_insert(candidate);
            characters[i].rect = Rect::new(candidate.x, nb.y, candidate.width, nb.height);
        }
    }
}

fn reliable(c: &Character) -> bool {
    c.from_medium || c.kind == 1 || c.kind == 2
}

/// Vertical band of a containment-padded estimate rectangle of the
/// configured maximum character height, placed adjacent to `neighbour`.
fn estimate_band(neighbour: &Rect, cfg: &SegmentConfig, pad: i32) -> MinMax {
    MinMax::new(neighbour.y - pad, neighbour.y + cfg.max_char_height - 1 + pad)
}

/// Final line bounding rectangle.
///
/// X extent comes from types 1-3; Y extent from types 1-2 only, so a
/// signature overhang typed 3 widens but never deepens the line.
fn line_bounds(image: &GrayImage, line: &Line, characters: &[Character]) -> Rect {
    const PAD_X: i32 = 5;

    let xs: Vec<&Character> = characters.iter().filter(|c| c.kind <= 3).collect();
    let ys: Vec<&Character> = characters.iter().filter(|c| c.kind <= 2).collect();
    if xs.is_empty() || ys.is_empty() {
        // Soft fallback: union of everything on the line.
        let mut iter = line.contours.iter();
        return iter
            .next()
            .map(|first| {
                iter.fold(first.rect, |acc, c| acc.union(&c.rect))
            })
            .unwrap_or(line.rect);
    }

    let x_min = xs.iter().map(|c| c.rect.x).min().unwrap_or(0);
    let x_max = xs.iter().map(|c| c.rect.x_max()).max().unwrap_or(0);
    let y_min = ys.iter().map(|c| c.rect.y).min().unwrap_or(0);
    let y_max = ys.iter().map(|c| c.rect.y_max()).max().unwrap_or(0);

    Rect::from_min_max(x_min - PAD_X, y_min, x_max + PAD_X, y_max)
        .clamped(image.width(), image.height())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::contour::{self, ContourFilter};
    use crate::detect::line;

    fn blob(img: &mut GrayImage, rect: Rect) {
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                raster::set_px(img, x, y);
            }
        }
    }

    fn cfg() -> SegmentConfig {
        SegmentConfig {
            max_char_width: 28,
            max_char_height: 30,
            max_space_between_chars_of_word: 15,
            max_space_between_words: 200,
        }
    }

    fn build_line(img: &GrayImage, anchor_rect: Rect) -> line::Line {
        let contours = contour::extract(img, &ContourFilter::default());
        let anchor_index = contours
            .iter()
            .position(|c| c.rect == anchor_rect)
            .expect("anchor contour present");
        line::build(img, &contours, anchor_index, 15)
    }

    #[test]
    fn medium_contours_become_typed_characters() {
        let mut img = GrayImage::new(220, 60);
        for i in 0..6 {
            blob(&mut img, Rect::new(10 + i * 20, 20, 12, 16));
        }
        let line = build_line(&img, Rect::new(10, 20, 12, 16));
        let seg = segment(&img, &line, &cfg(), &[line.anchor_rect]);

        assert_eq!(seg.characters.len(), 6);
        // The anchor region grants type 1 to the anchor character itself.
        assert!(seg.characters.iter().any(|c| c.kind == 1));
        for c in &seg.characters {
            assert!(matches!(c.kind, 1..=3));
            assert!(seg.bounds.contains(&c.rect), "char {:?} outside {:?}", c.rect, seg.bounds);
        }
        for pair in seg.characters.windows(2) {
            assert!(pair[0].rect.x < pair[1].rect.x);
        }
    }

    #[test]
    fn split_character_pieces_group_into_one() {
        let mut img = GrayImage::new(220, 60);
        for i in 0..3 {
            blob(&mut img, Rect::new(10 + i * 20, 20, 12, 16));
        }
        // A character broken into two small fragments right of the row.
        blob(&mut img, Rect::new(70, 20, 5, 16));
        blob(&mut img, Rect::new(77, 20, 5, 16));

        let line = build_line(&img, Rect::new(10, 20, 12, 16));
        let seg = segment(&img, &line, &cfg(), &[line.anchor_rect]);

        assert_eq!(seg.characters.len(), 4);
        let grouped = seg
            .characters
            .iter()
            .find(|c| c.contour_indices.len() == 2)
            .expect("fragments grouped");
        assert_eq!(grouped.rect, Rect::new(70, 20, 12, 16));
    }

    #[test]
    fn stats_come_from_medium_contours_only() {
        let mut img = GrayImage::new(220, 60);
        for i in 0..3 {
            blob(&mut img, Rect::new(10 + i * 20, 20, 12, 16));
        }
        blob(&mut img, Rect::new(70, 22, 4, 12));
        let line = build_line(&img, Rect::new(10, 20, 12, 16));
        let stats = compute_stats(&line, &cfg());
        assert_eq!(stats.max_width, 12);
        assert_eq!(stats.min_dist_between, 8);
        assert_eq!(stats.max_dist_between, 8);
    }

    #[test]
    fn trailing_fragments_group_and_keep_bounds_shallow() {
        let mut img = GrayImage::new(260, 90);
        for i in 0..5 {
            blob(&mut img, Rect::new(10 + i * 20, 40, 12, 16));
        }
        // Two narrow fragments one gap right of the row, slightly above it.
        blob(&mut img, Rect::new(112, 38, 4, 19));
        blob(&mut img, Rect::new(117, 38, 4, 19));

        let line = build_line(&img, Rect::new(10, 40, 12, 16));
        let seg = segment(&img, &line, &cfg(), &[line.anchor_rect]);

        assert_eq!(seg.characters.len(), 6);
        let y_max = seg.bounds.y_max();
        assert!(y_max <= 57, "bounds deepened to {y_max}");
    }

    #[test]
    fn deep_overhang_is_snapped_and_typed_3() {
        let img = GrayImage::new(120, 100);
        let root = Rect::new(10, 40, 12, 16);
        let mut chars = vec![
            Character {
                contour_indices: vec![0],
                rect: root,
                kind: 0,
                adjusted_from: None,
                index: 0,
                from_medium: true,
            },
            // Tall stroke next to the root character, reaching far below
            // the estimate band.
            Character {
                contour_indices: vec![1],
                rect: Rect::new(23, 44, 6, 31),
                kind: 0,
                adjusted_from: None,
                index: 1,
                from_medium: false,
            },
        ];

        let line = line::Line {
            contours: Vec::new(),
            rect: root,
            overlap: false,
            thresholds: crate::detect::line::LineThresholds::from_anchor(&root),
            anchor_rect: root,
            min_x_gap: 8,
        };
        assign_types(&img, &line, &cfg(), &[root], &mut chars);

        assert_eq!(chars[0].kind, 1);
        assert_eq!(chars[1].kind, 3);
        // Snapped into the neighbour's vertical band.
        assert_eq!(chars[1].rect.y, root.y);
        assert_eq!(chars[1].rect.height, root.height);
        assert!(chars[1].adjusted_from.is_some());
    }
}

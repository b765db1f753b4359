//! Connected-component extraction and filtering.

use crate::config::Config;
use crate::geometry::{polygon_area, Rect};
use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometry::approximate_polygon_dp;
use imageproc::point::Point;

/// Douglas-Peucker tolerance for polygonal approximation.
const APPROX_EPSILON: f64 = 1.0;

/// Size class relative to the per-line character thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeClass {
    Small,
    Medium,
    Large,
    #[default]
    Unknown,
}

/// One connected foreground region.
#[derive(Debug, Clone)]
pub struct Contour {
    /// Polygonally-approximated outline
    pub points: Vec<Point<i32>>,
    pub rect: Rect,
    /// Vertex area of the outline, at least 1
    pub filled_area: f64,
    /// Dense index after filtering and X-sort
    pub index: usize,
    pub size: SizeClass,
    pub in_line: bool,
    pub overlap_adjusted: bool,
    /// Rectangle before an overlap restriction, kept for debugging
    pub orig: Option<Rect>,
}

impl Contour {
    pub fn mid_x(&self) -> i32 {
        self.rect.mid_x()
    }

    pub fn rect_area(&self) -> i64 {
        self.rect.area()
    }
}

/// Image borders a contour may not touch.
#[derive(Debug, Clone, Copy, Default)]
pub struct Borders {
    pub top: bool,
    pub bottom: bool,
    pub left: bool,
    pub right: bool,
}

/// Bounds applied to freshly traced contours. `None` disables a bound.
#[derive(Debug, Clone, Default)]
pub struct ContourFilter {
    pub min_width: Option<i32>,
    pub max_width: Option<i32>,
    pub min_height: Option<i32>,
    pub max_height: Option<i32>,
    pub min_area: Option<f64>,
    pub max_area: Option<f64>,
    pub forbidden_borders: Borders,
}

impl ContourFilter {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_width: Some(config.min_contour_width),
            min_height: Some(config.min_contour_height),
            min_area: Some(config.min_contour_area as f64),
            ..Default::default()
        }
    }

    fn accepts(&self, rect: &Rect, filled_area: f64, width: u32, height: u32) -> bool {
        if self.min_width.is_some_and(|v| rect.width < v)
            || self.max_width.is_some_and(|v| rect.width > v)
            || self.min_height.is_some_and(|v| rect.height < v)
            || self.max_height.is_some_and(|v| rect.height > v)
            || self.min_area.is_some_and(|v| filled_area < v)
            || self.max_area.is_some_and(|v| filled_area > v)
        {
            return false;
        }
        let b = &self.forbidden_borders;
        if b.top && rect.y <= 0 {
            return false;
        }
        if b.left && rect.x <= 0 {
            return false;
        }
        if b.bottom && rect.bottom() >= height as i32 {
            return false;
        }
        if b.right && rect.right() >= width as i32 {
            return false;
        }
        true
    }
}

/// Trace external contours, filter them, and return survivors sorted
/// ascending by rectangle X with dense indices.
pub fn extract(image: &GrayImage, filter: &ContourFilter) -> Vec<Contour> {
    let mut contours = Vec::new();

    for raw in find_contours::<i32>(image) {
        if raw.border_type != BorderType::Outer || raw.parent.is_some() {
            continue;
        }
        if raw.points.is_empty() {
            continue;
        }
        let points = approximate_polygon_dp(&raw.points, APPROX_EPSILON, true);
        let rect = match Rect::bounding(&raw.points) {
            Some(r) => r,
            None => continue,
        };
        let filled_area = polygon_area(&points).max(1.0);

        if !filter.accepts(&rect, filled_area, image.width(), image.height()) {
            continue;
        }

        contours.push(Contour {
            points,
            rect,
            filled_area,
            index: 0,
            size: SizeClass::Unknown,
            in_line: false,
            overlap_adjusted: false,
            orig: None,
        });
    }

    contours.sort_by_key(|c| (c.rect.x, c.rect.y));
    for (i, c) in contours.iter_mut().enumerate() {
        c.index = i;
    }
    contours
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster;
    use image::GrayImage;

    fn blob(img: &mut GrayImage, rect: Rect) {
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                raster::set_px(img, x, y);
            }
        }
    }

    #[test]
    fn extracts_sorted_filtered_components() {
        let mut img = GrayImage::new(120, 40);
        blob(&mut img, Rect::new(60, 10, 10, 12));
        blob(&mut img, Rect::new(20, 12, 8, 10));
        // Single-pixel noise, removed by the minimum bounds.
        raster::set_px(&mut img, 100, 5);

        let filter = ContourFilter {
            min_width: Some(3),
            min_height: Some(7),
            min_area: Some(20.0),
            ..Default::default()
        };
        let contours = extract(&img, &filter);

        assert_eq!(contours.len(), 2);
        assert!(contours[0].rect.x < contours[1].rect.x);
        assert_eq!(contours[0].index, 0);
        assert_eq!(contours[1].index, 1);
        for c in &contours {
            assert!(c.rect_area() as f64 >= c.filled_area);
            assert!(c.filled_area >= 1.0);
            assert!(c.rect.x >= 0 && c.rect.right() <= 120);
            assert!(c.rect.y >= 0 && c.rect.bottom() <= 40);
        }
    }

    #[test]
    fn forbidden_border_discards_touching_contours() {
        let mut img = GrayImage::new(60, 30);
        blob(&mut img, Rect::new(0, 5, 10, 10));
        blob(&mut img, Rect::new(30, 5, 10, 10));

        let filter = ContourFilter {
            forbidden_borders: Borders { left: true, ..Default::default() },
            ..Default::default()
        };
        let contours = extract(&img, &filter);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].rect.x, 30);
    }
}

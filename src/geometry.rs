//! Integer pixel geometry shared by the detection pipeline.
//!
//! Coordinates are pixel offsets with the origin at the top-left, X growing
//! rightward and Y growing downward. Rectangles are half-inclusive on the
//! right/bottom; the closed (min/max) form round-trips exactly with
//! `width = x_max - x_min + 1`.

use imageproc::point::Point;

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    /// Create a rectangle; width and height clamp to at least 1.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Build from closed-interval corner coordinates (both ends inclusive).
    pub fn from_min_max(x_min: i32, y_min: i32, x_max: i32, y_max: i32) -> Self {
        Self::new(x_min, y_min, x_max - x_min + 1, y_max - y_min + 1)
    }

    /// Tight bounding rectangle of a non-empty point set.
    pub fn bounding(points: &[Point<i32>]) -> Option<Self> {
        let first = points.first()?;
        let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            x0 = x0.min(p.x);
            y0 = y0.min(p.y);
            x1 = x1.max(p.x);
            y1 = y1.max(p.y);
        }
        Some(Self::from_min_max(x0, y0, x1, y1))
    }

    /// One past the rightmost column.
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// One past the bottom row.
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Rightmost column (inclusive).
    pub fn x_max(&self) -> i32 {
        self.x + self.width - 1
    }

    /// Bottom row (inclusive).
    pub fn y_max(&self) -> i32 {
        self.y + self.height - 1
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    pub fn mid_x(&self) -> i32 {
        self.x + self.width / 2
    }

    pub fn mid_y(&self) -> i32 {
        self.y + self.height / 2
    }

    pub fn x_range(&self) -> MinMax {
        MinMax::new(self.x, self.x_max())
    }

    pub fn y_range(&self) -> MinMax {
        MinMax::new(self.y, self.y_max())
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// True when `other` lies entirely inside `self`. Reflexive.
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// True when the rectangles share at least one pixel. Symmetric.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        if !self.intersects(other) {
            return None;
        }
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.x_max().min(other.x_max());
        let y1 = self.y_max().min(other.y_max());
        Some(Rect::from_min_max(x0, y0, x1, y1))
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect::from_min_max(
            self.x.min(other.x),
            self.y.min(other.y),
            self.x_max().max(other.x_max()),
            self.y_max().max(other.y_max()),
        )
    }

    /// Grow by `dx` on the left/right and `dy` on the top/bottom.
    pub fn padded(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x - dx, self.y - dy, self.width + 2 * dx, self.height + 2 * dy)
    }

    /// Clip to an image of the given dimensions.
    pub fn clamped(&self, image_width: u32, image_height: u32) -> Rect {
        let x0 = self.x.max(0);
        let y0 = self.y.max(0);
        let x1 = self.x_max().min(image_width as i32 - 1);
        let y1 = self.y_max().min(image_height as i32 - 1);
        Rect::from_min_max(x0, y0, x1.max(x0), y1.max(y0))
    }

    /// True when the rectangle touches any border of an image of the given
    /// dimensions.
    pub fn touches_border(&self, image_width: u32, image_height: u32) -> bool {
        self.x <= 0
            || self.y <= 0
            || self.right() >= image_width as i32
            || self.bottom() >= image_height as i32
    }
}

/// Horizontal gap between two rectangles, zero when they overlap in X.
pub fn x_distance(a: &Rect, b: &Rect) -> i32 {
    if b.x >= a.right() {
        b.x - a.right()
    } else if a.x >= b.right() {
        a.x - b.right()
    } else {
        0
    }
}

/// Closed integer interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinMax {
    pub min: i32,
    pub max: i32,
}

impl MinMax {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn len(&self) -> i32 {
        self.max - self.min
    }

    pub fn contains_value(&self, v: i32) -> bool {
        v >= self.min && v <= self.max
    }

    pub fn contains(&self, other: &MinMax) -> bool {
        other.min >= self.min && other.max <= self.max
    }

    pub fn intersects(&self, other: &MinMax) -> bool {
        self.min <= other.max && other.min <= self.max
    }

    /// Fraction of `self` covered by the overlap with `other`, in [0, 1].
    pub fn fraction_intersects(&self, other: &MinMax) -> f64 {
        let len = self.len();
        if len <= 0 {
            return 0.0;
        }
        let overlap = self.max.min(other.max) - self.min.max(other.min);
        if overlap <= 0 {
            return 0.0;
        }
        overlap as f64 / len as f64
    }

    /// Pad both ends; the upper end clips to `max_value`.
    pub fn padded(&self, pad: i32, max_value: i32) -> MinMax {
        MinMax::new(self.min - pad, (self.max + pad).min(max_value))
    }
}

/// Least-squares direction of a short pixel chain, in degrees.
///
/// 0 is rightward, 90 upward (screen Y grows downward), wrapped to
/// [0, 360). The chain order fixes the sign: the returned direction points
/// from the first point toward the last. Fewer than two distinct points
/// yield 0.
pub fn compute_degree(points: &[Point<i32>]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.x as f64).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.y as f64).sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for p in points {
        let dx = p.x as f64 - cx;
        let dy = p.y as f64 - cy;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    if sxx == 0.0 && syy == 0.0 {
        return 0.0;
    }

    // Regress along the dominant axis to keep the fit stable for
    // near-vertical chains.
    let (mut vx, mut vy) = if sxx >= syy {
        (1.0, sxy / sxx)
    } else {
        (sxy / syy, 1.0)
    };

    // Orient along the chain.
    let tx = (points[points.len() - 1].x - points[0].x) as f64;
    let ty = (points[points.len() - 1].y - points[0].y) as f64;
    if vx * tx + vy * ty < 0.0 {
        vx = -vx;
        vy = -vy;
    }

    let degrees = (-vy).atan2(vx).to_degrees();
    (degrees + 360.0) % 360.0
}

/// Absolute shoelace area of the closed polygon given by `points`.
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0i64;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        twice_area += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
    }
    (twice_area.abs() as f64) / 2.0
}

/// Angular distance between two directions, wrapped to [0, 180]. Symmetric.
pub fn degree_delta(a: f64, b: f64) -> f64 {
    let d = (a - b).abs() % 360.0;
    if d > 180.0 {
        360.0 - d
    } else {
        d
    }
}

/// Average of two directions, handling the 0/360 wrap.
pub fn degree_average(a: f64, b: f64) -> f64 {
    let mean = (a + b) / 2.0;
    if (a - b).abs() > 180.0 {
        (mean + 180.0) % 360.0
    } else {
        mean % 360.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: i32, y: i32) -> Point<i32> {
        Point::new(x, y)
    }

    #[test]
    fn min_max_round_trips_with_rect() {
        let r = Rect::from_min_max(10, 20, 14, 29);
        assert_eq!(r.width, 5);
        assert_eq!(r.height, 10);
        assert_eq!(r.x_max(), 14);
        assert_eq!(r.y_max(), 29);
    }

    #[test]
    fn contains_is_reflexive() {
        let r = Rect::new(3, 4, 10, 20);
        assert!(r.contains(&r));
    }

    #[test]
    fn intersects_is_symmetric() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 10, 10);
        let c = Rect::new(50, 50, 5, 5);
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
        assert!(!c.intersects(&a));
    }

    #[test]
    fn fraction_intersects_half_overlap() {
        let a = MinMax::new(0, 100);
        let b = MinMax::new(50, 150);
        assert!((a.fraction_intersects(&b) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn x_distance_between_separated_rects() {
        let a = Rect::new(26, 33, 15, 8);
        let b = Rect::new(105, 28, 9, 10);
        assert_eq!(x_distance(&a, &b), 64);
        assert_eq!(x_distance(&b, &a), 64);
    }

    #[test]
    fn x_distance_zero_when_overlapping() {
        let a = Rect::new(0, 0, 20, 5);
        let b = Rect::new(10, 0, 20, 5);
        assert_eq!(x_distance(&a, &b), 0);
    }

    #[test]
    fn degree_of_cardinal_and_diagonal_chains() {
        let cases: [(f64, (i32, i32)); 8] = [
            (0.0, (1, 0)),
            (45.0, (1, -1)),
            (90.0, (0, -1)),
            (135.0, (-1, -1)),
            (180.0, (-1, 0)),
            (225.0, (-1, 1)),
            (270.0, (0, 1)),
            (315.0, (1, 1)),
        ];
        for (expected, (dx, dy)) in cases {
            let pts = [p(0, 0), p(dx, dy), p(2 * dx, 2 * dy), p(3 * dx, 3 * dy)];
            let got = compute_degree(&pts);
            assert!(
                degree_delta(got, expected) < 1.0,
                "chain step ({dx},{dy}): expected {expected}, got {got}"
            );
        }
    }

    #[test]
    fn degree_of_nearly_flat_chain() {
        let got = compute_degree(&[p(0, 0), p(50, -1), p(100, -2)]);
        assert!((got - 1.0).abs() <= 1.0, "got {got}");
    }

    #[test]
    fn degree_of_nearly_vertical_chain() {
        let got = compute_degree(&[p(0, 0), p(1, -50), p(2, -100)]);
        assert!((got - 89.0).abs() <= 1.0, "got {got}");
    }

    #[test]
    fn degree_delta_is_symmetric_and_bounded() {
        let pairs = [(10.0, 350.0), (0.0, 180.0), (90.0, 270.1), (359.0, 1.0)];
        for (a, b) in pairs {
            let d1 = degree_delta(a, b);
            let d2 = degree_delta(b, a);
            assert!((d1 - d2).abs() < 1e-9);
            assert!((0.0..=180.0).contains(&d1));
        }
        assert!((degree_delta(10.0, 350.0) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn degree_average_handles_wrap() {
        assert!((degree_average(350.0, 10.0) - 0.0).abs() < 1e-9);
        assert!((degree_average(90.0, 110.0) - 100.0).abs() < 1e-9);
    }
}

//! Edge-pair tracing of ink strokes entering the MICR band from above.
//!
//! A `Curve` owns two `Edge`s seeded at the ends of one top-border ink run.
//! Both edges follow the stroke boundary downward, kept roughly level with
//! each other, until the stroke ends, the edges meet, or the local
//! direction diverges from the opposite edge hard enough to signal a
//! character body. Points live in a flat arena indexed by id; edges hold
//! ordered id lists and cross-references are ids, never owning links.

use crate::geometry::{compute_degree, degree_delta};
use crate::raster;
use image::GrayImage;
use imageproc::point::Point;
use std::collections::HashMap;

/// Neighbour offsets by direction index: index `i` points at `45 * i`
/// degrees, 0 = right, 90 = up (screen Y grows downward).
pub(super) const NEIGHBORS: [(i32, i32); 8] = [
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Direction index pointing down, the entry direction of top-border seeds.
const ENTRY_DOWN: u8 = 6;

/// An edge keeps learning (no divergence stop) until it holds this many
/// points, enough to make the degree window meaningful.
const LEARN_POINTS: usize = 5;

/// Hard cap on arena size per curve section.
const MAX_POINTS: usize = 4096;

/// Degree window: one point behind, three ahead.
const WINDOW_BACK: usize = 1;
const WINDOW_AHEAD: usize = 3;

pub(super) fn opposite(dir: u8) -> u8 {
    (dir + 4) % 8
}

pub(super) fn rotate(dir: u8, step: i8) -> u8 {
    ((dir as i8 + step).rem_euclid(8)) as u8
}

/// Degree of a neighbour direction index.
pub(super) fn dir_degrees(dir: u8) -> f64 {
    dir as f64 * 45.0
}

#[derive(Debug, Clone)]
pub(super) struct CurvePoint {
    pub x: i32,
    pub y: i32,
    /// Direction index travelled to reach this point
    pub entry_dir: u8,
    /// Distance to the nearest point on the other edge
    pub width: Option<f64>,
    /// Arena id of that nearest point
    pub nearest: Option<usize>,
}

#[derive(Debug)]
pub(super) struct Edge {
    /// Rotation sense when scanning neighbours: +1 or -1
    pub sense: i8,
    pub point_ids: Vec<usize>,
    pub done: bool,
    pub paused: bool,
    last_gap: f64,
}

impl Edge {
    fn new(sense: i8) -> Self {
        Self {
            sense,
            point_ids: Vec::new(),
            done: false,
            paused: false,
            last_gap: 0.0,
        }
    }
}

/// Why a follow pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Halt {
    /// Stroke ended or the edges met; the accumulated points bound it.
    StrokeEnd,
    /// Direction diverged against a character body; crossing may continue.
    Intersection { edge: usize },
}

pub(super) struct Curve {
    pub arena: Vec<CurvePoint>,
    pub edges: [Edge; 2],
    /// Pixel -> owning edge, for edges-met detection
    membership: HashMap<(i32, i32), usize>,
}

impl Curve {
    /// Seed a curve from the two ends of a top-border ink run. The left
    /// end scans counter-clockwise, the right end clockwise, so both hug
    /// the outside of the stroke.
    pub fn seed(left: (i32, i32), right: (i32, i32)) -> Self {
        Self::seed_with_dir(left, right, ENTRY_DOWN)
    }

    /// Seed a continuation section whose travel direction is already known.
    pub fn seed_with_dir(left: (i32, i32), right: (i32, i32), entry_dir: u8) -> Self {
        let mut curve = Self {
            arena: Vec::new(),
            edges: [Edge::new(1), Edge::new(-1)],
            membership: HashMap::new(),
        };
        curve.push_point(0, left.0, left.1, entry_dir);
        curve.push_point(1, right.0, right.1, entry_dir);
        curve
    }

    fn push_point(&mut self, edge: usize, x: i32, y: i32, entry_dir: u8) -> usize {
        let id = self.arena.len();
        self.arena.push(CurvePoint {
            x,
            y,
            entry_dir,
            width: None,
            nearest: None,
        });
        self.edges[edge].point_ids.push(id);
        self.membership.insert((x, y), edge);
        id
    }

    /// Follow both edges until the curve halts.
    pub fn follow(&mut self, roi: &GrayImage, max_delta: f64) -> Halt {
        let mut turn = 0usize;
        loop {
            if self.edges.iter().all(|e| e.done) {
                return Halt::StrokeEnd;
            }
            if self.arena.len() >= MAX_POINTS {
                return Halt::StrokeEnd;
            }

            // Alternate edges; a paused or finished edge yields its turn.
            let edge_index = if !self.edges[turn % 2].done && !self.edges[turn % 2].paused {
                turn % 2
            } else if !self.edges[(turn + 1) % 2].done && !self.edges[(turn + 1) % 2].paused {
                (turn + 1) % 2
            } else if self.edges.iter().any(|e| !e.done) {
                // Both survivors paused: release them.
                for e in self.edges.iter_mut() {
                    e.paused = false;
                }
                if self.edges[turn % 2].done {
                    (turn + 1) % 2
                } else {
                    turn % 2
                }
            } else {
                return Halt::StrokeEnd;
            };
            turn += 1;

            match self.step(roi, edge_index) {
                StepOutcome::Moved(id) => {
                    self.measure(edge_index, id);
                    if self.should_halt(edge_index, id, max_delta) {
                        return Halt::Intersection { edge: edge_index };
                    }
                    self.balance(edge_index, id);
                }
                StepOutcome::MetOtherEdge => return Halt::StrokeEnd,
                StepOutcome::Dead => self.edges[edge_index].done = true,
            }
        }
    }

    /// Advance one edge by one boundary pixel.
    fn step(&mut self, roi: &GrayImage, edge_index: usize) -> StepOutcome {
        let edge = &self.edges[edge_index];
        let last_id = match edge.point_ids.last() {
            Some(&id) => id,
            None => return StepOutcome::Dead,
        };
        let last = &self.arena[last_id];
        let (px, py) = (last.x, last.y);

        // Scan from just past the backtrack direction, rotating in the
        // edge's sense; the first set neighbour continues the boundary.
        let start = rotate(opposite(last.entry_dir), edge.sense);
        let sense = edge.sense;
        for k in 0..8u8 {
            let dir = rotate(start, sense * k as i8);
            let (dx, dy) = NEIGHBORS[dir as usize];
            let (nx, ny) = (px + dx, py + dy);
            if !raster::is_set(roi, nx, ny) {
                continue;
            }
            match self.membership.get(&(nx, ny)).copied() {
                Some(owner) if owner != edge_index => return StepOutcome::MetOtherEdge,
                Some(_) => return StepOutcome::Dead,
                None => {
                    let id = self.push_point(edge_index, nx, ny, dir);
                    return StepOutcome::Moved(id);
                }
            }
        }
        StepOutcome::Dead
    }

    /// Record width and nearest-point data for a fresh point.
    fn measure(&mut self, edge_index: usize, id: usize) {
        let other = &self.edges[1 - edge_index];
        let p = (self.arena[id].x, self.arena[id].y);
        let mut best: Option<(usize, f64)> = None;
        for &oid in &other.point_ids {
            let o = &self.arena[oid];
            let d = distance(p, (o.x, o.y));
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((oid, d));
            }
        }
        if let Some((oid, d)) = best {
            self.arena[id].nearest = Some(oid);
            self.arena[id].width = Some(d);
        }
    }

    /// Pause an edge that is pulling ahead of its sibling.
    fn balance(&mut self, edge_index: usize, id: usize) {
        let other_last = self.edges[1 - edge_index]
            .point_ids
            .last()
            .map(|&oid| (self.arena[oid].x, self.arena[oid].y));
        let p = (self.arena[id].x, self.arena[id].y);
        if let Some(o) = other_last {
            let gap = distance(p, o);
            let edge = &mut self.edges[edge_index];
            if gap > edge.last_gap && edge.point_ids.len() > 1 {
                edge.paused = true;
            }
            edge.last_gap = gap;
            self.edges[1 - edge_index].paused = false;
        }
    }

    /// Divergence test against the opposite edge, skipped while learning.
    fn should_halt(&self, edge_index: usize, id: usize, max_delta: f64) -> bool {
        if self.edges[edge_index].point_ids.len() < LEARN_POINTS {
            return false;
        }
        self.delta_at(edge_index, id)
            .map_or(false, |delta| delta > max_delta)
    }

    /// degreeDelta between a point's local direction and the direction at
    /// its nearest point on the other edge.
    pub fn delta_at(&self, edge_index: usize, id: usize) -> Option<f64> {
        let nearest = self.arena[id].nearest?;
        let own = self.degree_at(edge_index, id)?;
        let other = self.degree_at(1 - edge_index, nearest)?;
        Some(degree_delta(own, other))
    }

    /// Least-squares direction over the chain window around a point.
    pub fn degree_at(&self, edge_index: usize, id: usize) -> Option<f64> {
        let ids = &self.edges[edge_index].point_ids;
        let pos = ids.iter().position(|&pid| pid == id)?;
        let lo = pos.saturating_sub(WINDOW_BACK);
        let hi = (pos + WINDOW_AHEAD).min(ids.len() - 1);
        let window: Vec<Point<i32>> = ids[lo..=hi]
            .iter()
            .map(|&pid| Point::new(self.arena[pid].x, self.arena[pid].y))
            .collect();
        if window.len() < 2 {
            // Fall back to the travel direction into the point.
            return Some(dir_degrees(self.arena[id].entry_dir));
        }
        Some(compute_degree(&window))
    }

    /// Closed outline: first edge forward, second edge reversed.
    pub fn polygon(&self) -> Vec<Point<i32>> {
        let mut points: Vec<Point<i32>> = Vec::new();
        for &id in &self.edges[0].point_ids {
            points.push(Point::new(self.arena[id].x, self.arena[id].y));
        }
        for &id in self.edges[1].point_ids.iter().rev() {
            points.push(Point::new(self.arena[id].x, self.arena[id].y));
        }
        points.dedup();
        while points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        points
    }

    /// Every traced pixel, for erasure of degenerate outlines.
    pub fn traced_pixels(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.arena.iter().map(|p| (p.x, p.y))
    }
}

enum StepOutcome {
    Moved(usize),
    MetOtherEdge,
    Dead,
}

pub(super) fn distance(a: (i32, i32), b: (i32, i32)) -> f64 {
    let dx = (a.0 - b.0) as f64;
    let dy = (a.1 - b.1) as f64;
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster;
    use image::GrayImage;

    /// Vertical 3-wide stroke from the top border down to y=14.
    fn straight_stroke() -> GrayImage {
        let mut img = GrayImage::new(20, 20);
        for y in 0..15 {
            for x in 8..11 {
                raster::set_px(&mut img, x, y);
            }
        }
        img
    }

    #[test]
    fn neighbour_indexing_round_trips() {
        for dir in 0..8u8 {
            assert_eq!(opposite(opposite(dir)), dir);
            assert_eq!(rotate(rotate(dir, 1), -1), dir);
        }
        assert_eq!(NEIGHBORS[0], (1, 0));
        assert_eq!(NEIGHBORS[2], (0, -1));
        assert_eq!(NEIGHBORS[6], (0, 1));
    }

    #[test]
    fn straight_stroke_is_followed_to_its_end() {
        let roi = straight_stroke();
        let mut curve = Curve::seed((8, 0), (10, 0));
        // The halt kind at a stroke end depends on whether the edges meet
        // before the corner turn trips the divergence test; either way the
        // trace must reach the bottom and stay on the stroke.
        let _ = curve.follow(&roi, 20.0);

        let max_y = curve.arena.iter().map(|p| p.y).max().unwrap();
        assert!(max_y >= 12, "only reached y={max_y}");
        for p in &curve.arena {
            assert!(raster::is_set(&roi, p.x, p.y));
        }
    }

    #[test]
    fn polygon_outline_covers_the_stroke_sides() {
        let roi = straight_stroke();
        let mut curve = Curve::seed((8, 0), (10, 0));
        curve.follow(&roi, 20.0);
        let poly = curve.polygon();
        assert!(poly.len() >= 4);
        let xs: Vec<i32> = poly.iter().map(|p| p.x).collect();
        assert!(xs.iter().any(|&x| x <= 8));
        assert!(xs.iter().any(|&x| x >= 10));
    }
}

//! Crossing a character-body intersection during curve following.
//!
//! When an edge halts against thicker ink, the stroke may continue on the
//! far side. The crossing walks back to the most parallel recent edge
//! point, pushes through the intersection along the averaged stroke
//! direction, then probes sideways for the stroke's far boundary to seed
//! the next curve section.

use super::curve::{dir_degrees, Curve, NEIGHBORS};
use crate::geometry::{degree_average, degree_delta};
use crate::raster;
use image::GrayImage;

/// How many edge points to reconsider behind the halt.
const MAX_STEPS_BACK: usize = 4;
/// A walk-back point this parallel is taken immediately.
const GOOD_SMALL_DELTA: f64 = 15.0;
/// Extra forward steps beyond the walk-back distance.
const PROBE_START_STEPS: usize = 2;
/// Forward probe attempts after the initial push.
const MAX_FORWARD_PROBES: usize = 20;
/// Perpendicular reach factor over the local stroke width.
const PROBE_REACH_FACTOR: f64 = 1.1;

/// Seeds for the next curve section on the far side of an intersection.
#[derive(Debug, Clone, Copy)]
pub(super) struct Continuation {
    pub left_seed: (i32, i32),
    pub right_seed: (i32, i32),
    pub entry_dir: u8,
}

/// Attempt to cross the intersection `curve` halted against on
/// `halted_edge`. `None` means the stroke could not be pushed through.
pub(super) fn attempt(
    roi: &GrayImage,
    curve: &Curve,
    halted_edge: usize,
) -> Option<Continuation> {
    let (point_id, steps_back) = walk_back(curve, halted_edge)?;

    let point = &curve.arena[point_id];
    let nearest_id = point.nearest?;
    let nearest = &curve.arena[nearest_id];
    let width = point.width?;

    let own_degree = curve.degree_at(halted_edge, point_id)?;
    let other_degree = curve.degree_at(1 - halted_edge, nearest_id)?;
    let direction = degree_average(own_degree, other_degree);

    let mid = (
        (point.x + nearest.x) / 2,
        (point.y + nearest.y) / 2,
    );

    // Push through the intersection; every stepped pixel must be ink.
    let push_steps = steps_back + PROBE_START_STEPS;
    let mut cursor = mid;
    for _ in 0..push_steps {
        cursor = walk_toward(cursor, direction);
        if !raster::is_set(roi, cursor.0, cursor.1) {
            return None;
        }
    }

    // Keep stepping forward, probing sideways for the far boundary.
    let reach = (width * PROBE_REACH_FACTOR).ceil() as i32;
    for _ in 0..MAX_FORWARD_PROBES {
        cursor = walk_toward(cursor, direction);
        if !raster::is_set(roi, cursor.0, cursor.1) {
            return None;
        }
        let right = probe_side(roi, cursor, direction - 90.0, reach);
        let left = probe_side(roi, cursor, direction + 90.0, reach);
        if let (Some(l), Some(r)) = (left, right) {
            return Some(Continuation {
                left_seed: l,
                right_seed: r,
                entry_dir: nearest_dir(direction),
            });
        }
    }
    None
}

/// Walk back along the halted edge looking for the point most parallel to
/// the other edge. Returns the chosen point and how far back it sits.
fn walk_back(curve: &Curve, edge_index: usize) -> Option<(usize, usize)> {
    let ids = &curve.edges[edge_index].point_ids;
    let mut best: Option<(usize, usize, f64)> = None;

    for back in 0..MAX_STEPS_BACK.min(ids.len()) {
        let id = ids[ids.len() - 1 - back];
        let delta = match curve.delta_at(edge_index, id) {
            Some(d) => d,
            None => continue,
        };
        if delta < GOOD_SMALL_DELTA {
            return Some((id, back));
        }
        if best.map_or(true, |(_, _, bd)| delta < bd) {
            best = Some((id, back, delta));
        }
    }
    best.map(|(id, back, _)| (id, back))
}

/// One step of the 8-neighbour walker toward a target degree.
fn walk_toward(from: (i32, i32), degrees: f64) -> (i32, i32) {
    let dir = nearest_dir(degrees);
    let (dx, dy) = NEIGHBORS[dir as usize];
    (from.0 + dx, from.1 + dy)
}

/// Neighbour index closest to a direction in degrees.
fn nearest_dir(degrees: f64) -> u8 {
    let mut best = 0u8;
    let mut best_delta = f64::MAX;
    for dir in 0..8u8 {
        let delta = degree_delta(dir_degrees(dir), degrees);
        if delta < best_delta {
            best_delta = delta;
            best = dir;
        }
    }
    best
}

/// Walk perpendicular from `from` until the ink runs out, up to `reach`
/// pixels. Returns the last ink pixel before the first unset one, the
/// boundary the next curve section grows from.
fn probe_side(
    roi: &GrayImage,
    from: (i32, i32),
    degrees: f64,
    reach: i32,
) -> Option<(i32, i32)> {
    let mut prev = from;
    let mut cursor = from;
    for _ in 0..reach.max(1) {
        cursor = walk_toward(cursor, degrees);
        if !raster::is_set(roi, cursor.0, cursor.1) {
            return Some(prev);
        }
        prev = cursor;
    }
    None
}

/// Seed entry direction helper shared with the corrector.
pub(super) fn continuation_curve(c: &Continuation) -> Curve {
    Curve::seed_with_dir(c.left_seed, c.right_seed, c.entry_dir)
}

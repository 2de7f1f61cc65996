//! Cubic Bezier subdivision.
//!
//! Two flavors serve the two halves of the pipeline:
//!
//! - fixed-point midpoint splitting plus the split predicate the RLE
//!   rasterizer drives its explicit subdivision stack with;
//! - a float adaptive flattener the stroke side uses to turn cubics into
//!   polylines before offsetting.

use crate::basics::{Coord, Point, SubPoint, ONE_PIXEL};

/// Maximum recursion depth of a cubic subdivision. The rasterizer's arc
/// stack holds `3 * MAX_SPLIT_DEPTH + 1` points.
pub const MAX_SPLIT_DEPTH: usize = 32;

/// Point capacity of a subdivision stack.
pub const ARC_STACK_LEN: usize = 3 * MAX_SPLIT_DEPTH + 1;

// ============================================================================
// Fixed-point subdivision
// ============================================================================

/// Split the cubic in `arc[0..4]` at t = 1/2, in place.
///
/// On entry `arc[0..4]` holds the curve (either endpoint order); on exit
/// `arc[0..7]` holds the two halves sharing `arc[3]`, with the half nearer
/// `arc[3..7]` replacing the original start. Integer midpoint arithmetic
/// keeps the result deterministic.
pub fn split_cubic(arc: &mut [SubPoint]) {
    debug_assert!(arc.len() >= 7);

    arc[6].x = arc[3].x;
    let mut c = arc[1].x;
    let mut d = arc[2].x;
    let mut a = (arc[0].x + c) / 2;
    let mut b = (arc[3].x + d) / 2;
    arc[1].x = a;
    arc[5].x = b;
    c = (c + d) / 2;
    a = (a + c) / 2;
    b = (b + c) / 2;
    arc[2].x = a;
    arc[4].x = b;
    arc[3].x = (a + b) / 2;

    arc[6].y = arc[3].y;
    c = arc[1].y;
    d = arc[2].y;
    a = (arc[0].y + c) / 2;
    b = (arc[3].y + d) / 2;
    arc[1].y = a;
    arc[5].y = b;
    c = (c + d) / 2;
    a = (a + c) / 2;
    b = (b + c) / 2;
    arc[2].y = a;
    arc[4].y = b;
    arc[3].y = (a + b) / 2;
}

/// Split/draw decision for the cubic in `arc[0..4]`, where `arc[0]` and
/// `arc[3]` are the endpoints and `arc[1..3]` the control points.
///
/// Splits when:
/// - the chord length risks overflowing the edge function (`> i16::MAX`);
/// - either control point strays farther from the chord than
///   `L · ONE_PIXEL / 6`;
/// - either chord/control angle is acute (a "super curvy" segment whose
///   deviation the distance test underestimates).
pub fn cubic_needs_split(arc: &[SubPoint]) -> bool {
    let diff = arc[3] - arc[0];
    let l = diff.length_approx();

    if l > i16::MAX as Coord {
        return true;
    }

    let s_limit = l as i64 * (ONE_PIXEL / 6) as i64;

    let diff1 = arc[1] - arc[0];
    let s = (diff.y as i64 * diff1.x as i64 - diff.x as i64 * diff1.y as i64).abs();
    if s > s_limit {
        return true;
    }

    let diff2 = arc[2] - arc[0];
    let s = (diff.y as i64 * diff2.x as i64 - diff.x as i64 * diff2.y as i64).abs();
    if s > s_limit {
        return true;
    }

    if diff1.x as i64 * (diff1.x - diff.x) as i64 + diff1.y as i64 * (diff1.y - diff.y) as i64 > 0
        || diff2.x as i64 * (diff2.x - diff.x) as i64
            + diff2.y as i64 * (diff2.y - diff.y) as i64
            > 0
    {
        return true;
    }

    false
}

// ============================================================================
// Float adaptive flattening
// ============================================================================

/// Default flatness tolerance in pixels for stroke-side flattening.
pub const FLATTEN_TOLERANCE: f32 = 0.25;

/// Adaptively flatten a cubic to line endpoints, invoking `emit` for every
/// vertex after `p0` (so a polyline already positioned at `p0` can be
/// extended in place). Subdivides until both control points sit within
/// `tolerance` of the chord.
pub fn flatten_cubic(
    p0: Point,
    c1: Point,
    c2: Point,
    p1: Point,
    tolerance: f32,
    emit: &mut impl FnMut(Point),
) {
    flatten_rec(p0, c1, c2, p1, tolerance.max(1e-3), 0, emit);
    emit(p1);
}

fn flatten_rec(
    p0: Point,
    c1: Point,
    c2: Point,
    p1: Point,
    tolerance: f32,
    depth: usize,
    emit: &mut impl FnMut(Point),
) {
    if depth >= MAX_SPLIT_DEPTH {
        return;
    }

    // Perpendicular distance of both controls from the chord.
    let dx = p1.x - p0.x;
    let dy = p1.y - p0.y;
    let d1 = ((c1.x - p1.x) * dy - (c1.y - p1.y) * dx).abs();
    let d2 = ((c2.x - p1.x) * dy - (c2.y - p1.y) * dx).abs();
    let d = d1 + d2;
    if d * d <= tolerance * (dx * dx + dy * dy) {
        return;
    }

    // de Casteljau at t = 1/2.
    let mid = |a: Point, b: Point| Point::new((a.x + b.x) * 0.5, (a.y + b.y) * 0.5);
    let p01 = mid(p0, c1);
    let p12 = mid(c1, c2);
    let p23 = mid(c2, p1);
    let p012 = mid(p01, p12);
    let p123 = mid(p12, p23);
    let p0123 = mid(p012, p123);

    flatten_rec(p0, p01, p012, p0123, tolerance, depth + 1, emit);
    emit(p0123);
    flatten_rec(p0123, p123, p23, p1, tolerance, depth + 1, emit);
}

// ============================================================================
// Tests
// ============================================================================

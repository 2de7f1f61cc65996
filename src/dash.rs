//! Arc-length dash segmentation.
//!
//! The dasher walks each flattened sub-path by accumulated segment length
//! against a repeating on/off pattern and emits the "on" stretches as open
//! polylines for the stroker. Every sub-path restarts the pattern at
//! phase 0. Non-positive pattern entries are skipped; a pattern with no
//! usable length disables dashing entirely.

use crate::basics::Point;
use crate::stroke::Polyline;

/// Total pattern length below which dashing is a no-op.
const DASH_EPSILON: f32 = 1e-4;

/// Split `polylines` into dash polylines according to `pattern`
/// (alternating on/off lengths, repeated; an odd-length pattern repeats
/// with inverted phase, so `[5]` means 5 on, 5 off).
///
/// Returns `None` when the pattern has no usable length, in which case
/// the caller strokes the input unmodified.
pub fn dash_polylines(polylines: &[Polyline], pattern: &[f32]) -> Option<Vec<Polyline>> {
    let dashes: Vec<f32> = if pattern.len() % 2 == 1 {
        pattern.iter().chain(pattern.iter()).copied().collect()
    } else {
        pattern.to_vec()
    };

    let total: f32 = dashes.iter().filter(|d| **d > 0.0).sum();
    if dashes.iter().any(|d| *d < 0.0) || total <= DASH_EPSILON {
        return None;
    }

    let mut out = Vec::new();
    for polyline in polylines {
        dash_one(polyline, &dashes, &mut out);
    }
    Some(out)
}

fn dash_one(polyline: &Polyline, dashes: &[f32], out: &mut Vec<Polyline>) {
    if polyline.pts.len() < 2 {
        return;
    }

    // A closed sub-path is walked as an open one with the closing segment
    // appended; the dashes themselves are always open.
    let mut pts: Vec<Point> = polyline.pts.clone();
    if polyline.closed && pts.first() != pts.last() {
        pts.push(pts[0]);
    }

    let mut dash_idx = 0usize;
    let mut dash_rest = next_positive(dashes, &mut dash_idx);
    let mut on = dash_idx % 2 == 0;
    let mut current: Vec<Point> = Vec::new();
    if on {
        current.push(pts[0]);
    }

    for seg in pts.windows(2) {
        let (a, b) = (seg[0], seg[1]);
        let len = a.distance(b);
        if len <= 0.0 {
            continue;
        }
        let mut t = 0.0_f32;
        while len - t > dash_rest {
            t += dash_rest;
            let p = Point::new(a.x + (b.x - a.x) * t / len, a.y + (b.y - a.y) * t / len);
            if on {
                current.push(p);
                flush(out, &mut current);
            }
            // The phase follows the pattern index; skipped zero entries
            // can leave it unchanged (an on-run continues through a
            // zero-length gap).
            dash_idx += 1;
            dash_rest = next_positive(dashes, &mut dash_idx);
            on = dash_idx % 2 == 0;
            if on {
                current.clear();
                current.push(p);
            }
        }
        dash_rest -= len - t;
        if on {
            current.push(b);
        }
    }

    if on {
        flush(out, &mut current);
    }
}

/// Advance `idx` past non-positive entries (wrapping) and return the
/// length of the entry it lands on.
fn next_positive(dashes: &[f32], idx: &mut usize) -> f32 {
    let n = dashes.len();
    for _ in 0..n {
        let d = dashes[*idx % n];
        if d > 0.0 {
            *idx %= n;
            return d;
        }
        *idx += 1;
    }
    0.0
}

fn flush(out: &mut Vec<Polyline>, current: &mut Vec<Point>) {
    if current.len() >= 2 {
        out.push(Polyline {
            pts: core::mem::take(current),
            closed: false,
        });
    } else {
        current.clear();
    }
}

// ============================================================================
// Tests
// ============================================================================

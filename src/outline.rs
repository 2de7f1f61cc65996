//! Canonical flattened path: the outline buffer.
//!
//! An outline is the rasterizer's input: fixed-point points (26.6), a
//! parallel tag array marking each point as an on-curve endpoint or a cubic
//! control point, and the index of the last point of every contour.
//!
//! Structural invariants:
//! - a contour never starts with a control point;
//! - control points come in consecutive pairs, preceded and followed by
//!   on-curve points;
//! - `contour_ends` is strictly increasing.

use crate::basics::{to_outline_coord, Coord, FillRule, Point, SubPoint};

// ============================================================================
// PointType
// ============================================================================

/// Per-point tag in an outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointType {
    /// On-curve endpoint of a line or a cubic.
    Line,
    /// Off-curve cubic control point.
    Cubic,
}

// ============================================================================
// Outline
// ============================================================================

/// A flattened-path buffer in 26.6 fixed point.
#[derive(Debug, Clone, Default)]
pub struct Outline {
    pub points: Vec<SubPoint>,
    pub types: Vec<PointType>,
    pub contour_ends: Vec<u32>,
    pub fill_rule: FillRule,
    /// Index of the first point of the contour being built.
    contour_start: usize,
}

impl Outline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all geometry, keep capacity. Fill rule is preserved.
    pub fn clear(&mut self) {
        self.points.clear();
        self.types.clear();
        self.contour_ends.clear();
        self.contour_start = 0;
    }

    pub fn reserve(&mut self, contours: usize, points: usize) {
        self.points.reserve(points);
        self.types.reserve(points);
        self.contour_ends.reserve(contours);
    }

    pub fn is_empty(&self) -> bool {
        self.contour_ends.is_empty()
    }

    /// Begin a new contour. An unterminated previous contour is closed
    /// implicitly at its last point.
    pub fn move_to(&mut self, p: Point) {
        self.end_contour();
        self.contour_start = self.points.len();
        self.push(p, PointType::Line);
    }

    pub fn line_to(&mut self, p: Point) {
        self.push(p, PointType::Line);
    }

    pub fn cubic_to(&mut self, c1: Point, c2: Point, p: Point) {
        self.push(c1, PointType::Cubic);
        self.push(c2, PointType::Cubic);
        self.push(p, PointType::Line);
    }

    /// Close the current contour: a closing edge back to the contour's
    /// first point is appended only when the current point differs.
    pub fn close(&mut self) {
        if self.points.len() <= self.contour_start {
            return;
        }
        let first = self.points[self.contour_start];
        if *self.points.last().unwrap() != first {
            self.points.push(first);
            self.types.push(PointType::Line);
        }
        self.end_contour();
        self.contour_start = self.points.len();
    }

    /// Same entry points, fixed-point flavor: used by generators that
    /// already work in outline units.
    pub fn push_fixed(&mut self, p: SubPoint, ty: PointType) {
        self.points.push(p);
        self.types.push(ty);
    }

    pub fn move_to_fixed(&mut self, p: SubPoint) {
        self.end_contour();
        self.contour_start = self.points.len();
        self.push_fixed(p, PointType::Line);
    }

    /// Record the end of the contour under construction, if it has at
    /// least one edge.
    pub fn end_contour(&mut self) {
        let len = self.points.len();
        if len > self.contour_start + 1 {
            self.contour_ends.push((len - 1) as u32);
            self.contour_start = len;
        } else if len > self.contour_start {
            // Degenerate single-point contour: drop it.
            self.points.truncate(self.contour_start);
            self.types.truncate(self.contour_start);
        }
    }

    /// Iterate contours as `(start, end)` inclusive point-index ranges.
    pub fn contours(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let ends = &self.contour_ends;
        (0..ends.len()).map(move |i| {
            let start = if i == 0 { 0 } else { ends[i - 1] as usize + 1 };
            (start, ends[i] as usize)
        })
    }

    /// Structural validation of the tag/contour invariants.
    pub fn is_valid(&self) -> bool {
        if self.points.len() != self.types.len() {
            return false;
        }
        let mut prev_end: Option<u32> = None;
        for &end in &self.contour_ends {
            if end as usize >= self.points.len() {
                return false;
            }
            if let Some(p) = prev_end {
                if end <= p {
                    return false;
                }
            }
            prev_end = Some(end);
        }
        for (start, end) in self.contours() {
            if self.types[start] == PointType::Cubic {
                return false;
            }
            let mut i = start + 1;
            while i <= end {
                if self.types[i] == PointType::Cubic {
                    // Needs a second control and an on-curve endpoint.
                    if i + 2 > end
                        || self.types[i + 1] != PointType::Cubic
                        || self.types[i + 2] != PointType::Line
                    {
                        return false;
                    }
                    i += 3;
                } else {
                    i += 1;
                }
            }
        }
        true
    }

    /// Bounding box over all points, in whole pixels (min inclusive,
    /// max exclusive). `None` for an empty outline.
    pub fn bbox(&self) -> Option<(Coord, Coord, Coord, Coord)> {
        if self.points.is_empty() {
            return None;
        }
        let mut min_x = Coord::MAX;
        let mut min_y = Coord::MAX;
        let mut max_x = Coord::MIN;
        let mut max_y = Coord::MIN;
        for p in &self.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        use crate::basics::OUTLINE_BITS;
        Some((
            min_x >> OUTLINE_BITS,
            min_y >> OUTLINE_BITS,
            (max_x + (1 << OUTLINE_BITS) - 1) >> OUTLINE_BITS,
            (max_y + (1 << OUTLINE_BITS) - 1) >> OUTLINE_BITS,
        ))
    }

    #[inline]
    fn push(&mut self, p: Point, ty: PointType) {
        self.points
            .push(SubPoint::new(to_outline_coord(p.x), to_outline_coord(p.y)));
        self.types.push(ty);
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Stroke outline generation.
//!
//! The stroker consumes flattened polylines and produces a new closed
//! outline whose filled area is the stroked region: two offset chains a
//! half-width either side of the center line, joined at each vertex by a
//! miter, round arc, or bevel, and capped at the ends of open sub-paths.
//! An open sub-path yields one closed contour (out along the left offset,
//! back along the right); a closed sub-path yields an outer and an inner
//! contour whose windings cancel under the non-zero rule.

use crate::basics::{FillRule, Point};
use crate::outline::Outline;

/// Coincident-vertex threshold: closer than this and the vertex is merged.
pub const VERTEX_DIST_EPSILON: f32 = 1e-5;

// ============================================================================
// Parameters
// ============================================================================

/// Line cap style for open sub-path endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrokeCap {
    #[default]
    Butt,
    Square,
    Round,
}

/// Join style at interior vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrokeJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

// ============================================================================
// Polyline
// ============================================================================

/// A flattened sub-path: straight segments only.
#[derive(Debug, Clone, Default)]
pub struct Polyline {
    pub pts: Vec<Point>,
    pub closed: bool,
}

// ============================================================================
// Vertex list with distances
// ============================================================================

/// A stroke vertex: position plus distance to the following vertex.
#[derive(Debug, Clone, Copy)]
struct StrokeVertex {
    x: f32,
    y: f32,
    dist: f32,
}

/// Build the vertex list, merging coincident neighbors. For a closed
/// sub-path the wrap-around distance lands on the last vertex.
fn build_vertices(polyline: &Polyline) -> Vec<StrokeVertex> {
    let mut v: Vec<StrokeVertex> = Vec::with_capacity(polyline.pts.len());
    for p in &polyline.pts {
        if let Some(last) = v.last_mut() {
            let d = Point::new(last.x, last.y).distance(*p);
            if d <= VERTEX_DIST_EPSILON {
                continue;
            }
            last.dist = d;
        }
        v.push(StrokeVertex {
            x: p.x,
            y: p.y,
            dist: 0.0,
        });
    }
    if polyline.closed && v.len() > 1 {
        let first = v[0];
        let last = *v.last().unwrap();
        let d = Point::new(last.x, last.y).distance(Point::new(first.x, first.y));
        if d <= VERTEX_DIST_EPSILON {
            v.pop();
            if let Some(last) = v.last_mut() {
                last.dist = Point::new(last.x, last.y).distance(Point::new(first.x, first.y));
            }
        } else if let Some(last) = v.last_mut() {
            last.dist = d;
        }
    }
    v
}

// ============================================================================
// Stroker
// ============================================================================

/// Stroke geometry calculator: width, cap, join, miter limit.
#[derive(Debug, Clone)]
pub struct Stroker {
    /// Half the stroke width.
    width: f32,
    miter_limit: f32,
    cap: StrokeCap,
    join: StrokeJoin,
}

impl Stroker {
    pub fn new(width: f32, cap: StrokeCap, join: StrokeJoin, miter_limit: f32) -> Self {
        Self {
            width: width * 0.5,
            miter_limit: miter_limit.max(1.0),
            cap,
            join,
        }
    }

    /// Angular step that keeps a round arc within 1/8 px of the true
    /// circle of radius `width`.
    fn arc_step(&self) -> f32 {
        (self.width / (self.width + 0.125)).acos() * 2.0
    }

    /// Cap vertices at endpoint `v0`, where `v1` is the adjacent vertex
    /// and `len` their distance.
    fn calc_cap(&self, out: &mut Vec<Point>, v0: StrokeVertex, v1: StrokeVertex, len: f32) {
        let dx1 = (v1.y - v0.y) / len * self.width;
        let dy1 = (v1.x - v0.x) / len * self.width;

        match self.cap {
            StrokeCap::Round => {
                let da = self.arc_step();
                let n = (core::f32::consts::PI / da) as i32;
                let da = core::f32::consts::PI / (n + 1) as f32;

                out.push(Point::new(v0.x - dx1, v0.y + dy1));
                let mut a1 = dy1.atan2(-dx1) + da;
                for _ in 0..n {
                    out.push(Point::new(
                        v0.x + a1.cos() * self.width,
                        v0.y + a1.sin() * self.width,
                    ));
                    a1 += da;
                }
                out.push(Point::new(v0.x + dx1, v0.y - dy1));
            }
            cap => {
                let (dx2, dy2) = if cap == StrokeCap::Square {
                    (dy1, dx1)
                } else {
                    (0.0, 0.0)
                };
                out.push(Point::new(v0.x - dx1 - dx2, v0.y + dy1 - dy2));
                out.push(Point::new(v0.x + dx1 - dx2, v0.y - dy1 - dy2));
            }
        }
    }

    /// Join vertices where `v0 → v1 → v2` meet; `len1`, `len2` are the
    /// segment lengths.
    fn calc_join(
        &self,
        out: &mut Vec<Point>,
        v0: StrokeVertex,
        v1: StrokeVertex,
        v2: StrokeVertex,
        len1: f32,
        len2: f32,
    ) {
        let dx1 = self.width * (v1.y - v0.y) / len1;
        let dy1 = self.width * (v1.x - v0.x) / len1;
        let dx2 = self.width * (v2.y - v1.y) / len2;
        let dy2 = self.width * (v2.x - v1.x) / len2;

        let cp = cross(v0, v1, v2);
        if cp > 0.0 {
            // Turning toward this offset side: the two offset endpoints
            // land inside the stroke body; a plain bevel keeps the
            // outline simple and the overlap cancels under non-zero fill.
            out.push(Point::new(v1.x + dx1, v1.y - dy1));
            out.push(Point::new(v1.x + dx2, v1.y - dy2));
        } else {
            match self.join {
                StrokeJoin::Miter => {
                    self.calc_miter(out, v0, v1, v2, dx1, dy1, dx2, dy2);
                }
                StrokeJoin::Round => {
                    self.calc_arc(out, v1.x, v1.y, dx1, -dy1, dx2, -dy2);
                }
                StrokeJoin::Bevel => {
                    out.push(Point::new(v1.x + dx1, v1.y - dy1));
                    out.push(Point::new(v1.x + dx2, v1.y - dy2));
                }
            }
        }
    }

    /// Circular arc from offset direction (dx1, dy1) to (dx2, dy2) around
    /// (x, y), approximated by chord steps within the arc tolerance.
    #[allow(clippy::too_many_arguments)]
    fn calc_arc(&self, out: &mut Vec<Point>, x: f32, y: f32, dx1: f32, dy1: f32, dx2: f32, dy2: f32) {
        let a1 = dy1.atan2(dx1);
        let mut a2 = dy2.atan2(dx2);
        if a1 > a2 {
            a2 += 2.0 * core::f32::consts::PI;
        }

        let da = self.arc_step();
        let n = ((a2 - a1) / da) as i32;
        let da = (a2 - a1) / (n + 1) as f32;

        out.push(Point::new(x + dx1, y + dy1));
        let mut a = a1 + da;
        for _ in 0..n {
            out.push(Point::new(x + a.cos() * self.width, y + a.sin() * self.width));
            a += da;
        }
        out.push(Point::new(x + dx2, y + dy2));
    }

    /// Miter join, degrading to a bevel when the miter point would exceed
    /// the miter limit or the offset segments are parallel.
    #[allow(clippy::too_many_arguments)]
    fn calc_miter(
        &self,
        out: &mut Vec<Point>,
        v0: StrokeVertex,
        v1: StrokeVertex,
        v2: StrokeVertex,
        dx1: f32,
        dy1: f32,
        dx2: f32,
        dy2: f32,
    ) {
        let lim = self.width * self.miter_limit;

        if let Some((xi, yi)) = intersect(
            v0.x + dx1,
            v0.y - dy1,
            v1.x + dx1,
            v1.y - dy1,
            v1.x + dx2,
            v1.y - dy2,
            v2.x + dx2,
            v2.y - dy2,
        ) {
            let di = Point::new(v1.x, v1.y).distance(Point::new(xi, yi));
            if di <= lim {
                out.push(Point::new(xi, yi));
                return;
            }
        }

        out.push(Point::new(v1.x + dx1, v1.y - dy1));
        out.push(Point::new(v1.x + dx2, v1.y - dy2));
    }

    // ------------------------------------------------------------------
    // Sub-path stroking
    // ------------------------------------------------------------------

    /// Stroke one sub-path into `outline` (one closed contour for an open
    /// sub-path, outer + inner contours for a closed one).
    pub fn stroke_polyline(&self, outline: &mut Outline, polyline: &Polyline) {
        let v = build_vertices(polyline);
        let n = v.len();
        if n < 2 {
            return;
        }
        // A "closed" pair of vertices degrades to an open segment.
        let closed = polyline.closed && n >= 3;

        let mut pts: Vec<Point> = Vec::new();

        if closed {
            // Outer chain, forward.
            for i in 0..n {
                let prev = v[(i + n - 1) % n];
                let next = v[(i + 1) % n];
                self.calc_join(&mut pts, prev, v[i], next, prev.dist, v[i].dist);
            }
            emit_contour(outline, &pts);

            // Inner chain, reversed.
            pts.clear();
            for i in (0..n).rev() {
                let prev = v[(i + n - 1) % n];
                let next = v[(i + 1) % n];
                self.calc_join(&mut pts, next, v[i], prev, v[i].dist, prev.dist);
            }
            emit_contour(outline, &pts);
        } else {
            // Start cap, forward joins, end cap, reverse joins: one loop.
            self.calc_cap(&mut pts, v[0], v[1], v[0].dist);
            for i in 1..n - 1 {
                self.calc_join(&mut pts, v[i - 1], v[i], v[i + 1], v[i - 1].dist, v[i].dist);
            }
            self.calc_cap(&mut pts, v[n - 1], v[n - 2], v[n - 2].dist);
            for i in (1..n - 1).rev() {
                self.calc_join(&mut pts, v[i + 1], v[i], v[i - 1], v[i].dist, v[i - 1].dist);
            }
            emit_contour(outline, &pts);
        }
    }
}

/// Generate the stroked outline of a set of flattened sub-paths.
pub fn stroke_outline(
    polylines: &[Polyline],
    width: f32,
    cap: StrokeCap,
    join: StrokeJoin,
    miter_limit: f32,
) -> Outline {
    let stroker = Stroker::new(width, cap, join, miter_limit);
    let mut outline = Outline::new();
    outline.fill_rule = FillRule::NonZero;
    for polyline in polylines {
        stroker.stroke_polyline(&mut outline, polyline);
    }
    outline
}

fn emit_contour(outline: &mut Outline, pts: &[Point]) {
    if pts.len() < 3 {
        return;
    }
    outline.move_to(pts[0]);
    for p in &pts[1..] {
        outline.line_to(*p);
    }
    outline.close();
}

#[inline]
fn cross(v0: StrokeVertex, v1: StrokeVertex, v2: StrokeVertex) -> f32 {
    (v2.x - v1.x) * (v1.y - v0.y) - (v2.y - v1.y) * (v1.x - v0.x)
}

/// Intersection of the lines (x1,y1)-(x2,y2) and (x3,y3)-(x4,y4).
#[allow(clippy::too_many_arguments)]
fn intersect(
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    x3: f32,
    y3: f32,
    x4: f32,
    y4: f32,
) -> Option<(f32, f32)> {
    let num = (y1 - y3) * (x4 - x3) - (x1 - x3) * (y4 - y3);
    let den = (x2 - x1) * (y4 - y3) - (y2 - y1) * (x4 - x3);
    if den.abs() < 1e-10 {
        return None;
    }
    let r = num / den;
    Some((x1 + (x2 - x1) * r, y1 + (y2 - y1) * r))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn open_line(pts: &[(f32, f32)]) -> Polyline {
        Polyline {
            pts: pts.iter().map(|&(x, y)| Point::new(x, y)).collect(),
            closed: false,
        }
    }

    fn bounds(outline: &Outline) -> (f32, f32, f32, f32) {
        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;
        for p in &outline.points {
            let x = p.x as f32 / 64.0;
            let y = p.y as f32 / 64.0;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        (min_x, min_y, max_x, max_y)
    }

    #[test]
    fn test_butt_stroke_is_rectangle() {
        let o = stroke_outline(
            &[open_line(&[(1.0, 4.0), (7.0, 4.0)])],
            2.0,
            StrokeCap::Butt,
            StrokeJoin::Miter,
            4.0,
        );
        assert_eq!(o.contour_ends.len(), 1);
        let (x0, y0, x1, y1) = bounds(&o);
        assert!((x0 - 1.0).abs() < 1e-3 && (x1 - 7.0).abs() < 1e-3);
        assert!((y0 - 3.0).abs() < 1e-3 && (y1 - 5.0).abs() < 1e-3);
        assert!(o.is_valid());
    }

    #[test]
    fn test_square_cap_extends_by_half_width() {
        let o = stroke_outline(
            &[open_line(&[(2.0, 0.0), (8.0, 0.0)])],
            2.0,
            StrokeCap::Square,
            StrokeJoin::Miter,
            4.0,
        );
        let (x0, _, x1, _) = bounds(&o);
        assert!((x0 - 1.0).abs() < 1e-3, "x0 = {}", x0);
        assert!((x1 - 9.0).abs() < 1e-3, "x1 = {}", x1);
    }

    #[test]
    fn test_round_cap_stays_within_half_width() {
        let o = stroke_outline(
            &[open_line(&[(0.0, 0.0), (10.0, 0.0)])],
            4.0,
            StrokeCap::Round,
            StrokeJoin::Miter,
            4.0,
        );
        let (x0, y0, x1, y1) = bounds(&o);
        assert!(x0 >= -2.001 && x1 <= 12.001);
        assert!(y0 >= -2.001 && y1 <= 2.001);
        // the cap arc adds vertices beyond the 4 corners
        assert!(o.points.len() > 8);
    }

    #[test]
    fn test_miter_join_sharp_corner() {
        // Right angle: miter length = w/2 · √2, within the default limit.
        let o = stroke_outline(
            &[open_line(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)])],
            2.0,
            StrokeCap::Butt,
            StrokeJoin::Miter,
            4.0,
        );
        let (_, _, x1, _) = bounds(&o);
        // miter corner reaches (11, -1)
        assert!((x1 - 11.0).abs() < 1e-3, "x1 = {}", x1);
    }

    #[test]
    fn test_miter_degrades_to_bevel_past_limit() {
        // Nearly reversing path: the miter point would run far away.
        let sharp = stroke_outline(
            &[open_line(&[(0.0, 0.0), (10.0, 0.0), (0.0, 1.0)])],
            2.0,
            StrokeCap::Butt,
            StrokeJoin::Miter,
            4.0,
        );
        let (_, _, x1, _) = bounds(&sharp);
        // beveled: no vertex beyond endpoint + miter limit · half width
        assert!(x1 <= 10.0 + 4.0, "x1 = {}", x1);
    }

    #[test]
    fn test_bevel_join_vertex_count() {
        let o = stroke_outline(
            &[open_line(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)])],
            2.0,
            StrokeCap::Butt,
            StrokeJoin::Bevel,
            4.0,
        );
        // 2 caps (2 pts each) + outer bevel (2 pts) + inner bevel (2 pts)
        // + closing point
        assert!(o.points.len() >= 8);
    }

    #[test]
    fn test_round_join_adds_arc_vertices() {
        let bevel = stroke_outline(
            &[open_line(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)])],
            4.0,
            StrokeCap::Butt,
            StrokeJoin::Bevel,
            4.0,
        );
        let round = stroke_outline(
            &[open_line(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)])],
            4.0,
            StrokeCap::Butt,
            StrokeJoin::Round,
            4.0,
        );
        assert!(round.points.len() > bevel.points.len());
    }

    #[test]
    fn test_closed_polyline_two_contours() {
        let square = Polyline {
            pts: vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0),
                Point::new(0.0, 10.0),
            ],
            closed: true,
        };
        let o = stroke_outline(&[square], 2.0, StrokeCap::Butt, StrokeJoin::Miter, 4.0);
        assert_eq!(o.contour_ends.len(), 2, "outer and inner rings");
        let (x0, y0, x1, y1) = bounds(&o);
        assert!((x0 + 1.0).abs() < 1e-3 && (x1 - 11.0).abs() < 1e-3);
        assert!((y0 + 1.0).abs() < 1e-3 && (y1 - 11.0).abs() < 1e-3);
    }

    #[test]
    fn test_degenerate_inputs_produce_nothing() {
        // single point / coincident points
        let o = stroke_outline(
            &[
                open_line(&[(1.0, 1.0)]),
                open_line(&[(2.0, 2.0), (2.0, 2.0)]),
            ],
            2.0,
            StrokeCap::Butt,
            StrokeJoin::Miter,
            4.0,
        );
        assert!(o.is_empty());
    }

    #[test]
    fn test_coincident_vertices_merged() {
        let o = stroke_outline(
            &[open_line(&[(0.0, 0.0), (0.0, 0.0), (10.0, 0.0)])],
            2.0,
            StrokeCap::Butt,
            StrokeJoin::Miter,
            4.0,
        );
        assert_eq!(o.contour_ends.len(), 1);
    }

    #[test]
    fn test_stroke_outline_uses_nonzero_fill() {
        let o = stroke_outline(
            &[open_line(&[(0.0, 0.0), (5.0, 0.0)])],
            1.0,
            StrokeCap::Butt,
            StrokeJoin::Miter,
            4.0,
        );
        assert_eq!(o.fill_rule, FillRule::NonZero);
    }
}

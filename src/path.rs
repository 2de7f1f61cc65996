//! Public path model.
//!
//! The loader/builder side hands the renderer paths as a command stream
//! over a parallel point array. Commands and points are stored separately
//! so a path can be duplicated, measured, and replayed cheaply.

use crate::basics::Point;
use crate::error::{Error, Result};

// ============================================================================
// PathCommand
// ============================================================================

/// One step of a path. `MoveTo` consumes one point, `LineTo` one,
/// `CubicTo` three (two controls then the endpoint), `Close` none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathCommand {
    MoveTo,
    LineTo,
    CubicTo,
    Close,
}

impl PathCommand {
    /// Number of points the command consumes from the point array.
    #[inline]
    pub fn point_count(self) -> usize {
        match self {
            PathCommand::MoveTo | PathCommand::LineTo => 1,
            PathCommand::CubicTo => 3,
            PathCommand::Close => 0,
        }
    }
}

// ============================================================================
// Path
// ============================================================================

/// Growable path storage: a command sequence and its point array.
#[derive(Debug, Clone, Default)]
pub struct Path {
    cmds: Vec<PathCommand>,
    pts: Vec<Point>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cmds: usize, pts: usize) -> Self {
        Self {
            cmds: Vec::with_capacity(cmds),
            pts: Vec::with_capacity(pts),
        }
    }

    pub fn clear(&mut self) {
        self.cmds.clear();
        self.pts.clear();
    }

    pub fn reserve(&mut self, cmds: usize, pts: usize) {
        self.cmds.reserve(cmds);
        self.pts.reserve(pts);
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    pub fn commands(&self) -> &[PathCommand] {
        &self.cmds
    }

    pub fn points(&self) -> &[Point] {
        &self.pts
    }

    pub fn move_to(&mut self, p: Point) {
        self.cmds.push(PathCommand::MoveTo);
        self.pts.push(p);
    }

    pub fn line_to(&mut self, p: Point) {
        self.cmds.push(PathCommand::LineTo);
        self.pts.push(p);
    }

    pub fn cubic_to(&mut self, c1: Point, c2: Point, p: Point) {
        self.cmds.push(PathCommand::CubicTo);
        self.pts.push(c1);
        self.pts.push(c2);
        self.pts.push(p);
    }

    pub fn close(&mut self) {
        self.cmds.push(PathCommand::Close);
    }

    /// Append an axis-aligned rectangle as a closed contour.
    pub fn append_rect(&mut self, x: f32, y: f32, w: f32, h: f32) -> Result<()> {
        if w <= 0.0 || h <= 0.0 {
            return Err(Error::InvalidArguments);
        }
        self.move_to(Point::new(x, y));
        self.line_to(Point::new(x + w, y));
        self.line_to(Point::new(x + w, y + h));
        self.line_to(Point::new(x, y + h));
        self.close();
        Ok(())
    }

    /// Append a circle as four cubic arcs.
    pub fn append_circle(&mut self, cx: f32, cy: f32, radius: f32) -> Result<()> {
        if radius <= f32::EPSILON {
            return Err(Error::InvalidArguments);
        }
        // Cubic arc constant for a quarter circle.
        const K: f32 = 0.552_284_75;
        let k = radius * K;
        self.move_to(Point::new(cx + radius, cy));
        self.cubic_to(
            Point::new(cx + radius, cy + k),
            Point::new(cx + k, cy + radius),
            Point::new(cx, cy + radius),
        );
        self.cubic_to(
            Point::new(cx - k, cy + radius),
            Point::new(cx - radius, cy + k),
            Point::new(cx - radius, cy),
        );
        self.cubic_to(
            Point::new(cx - radius, cy - k),
            Point::new(cx - k, cy - radius),
            Point::new(cx, cy - radius),
        );
        self.cubic_to(
            Point::new(cx + k, cy - radius),
            Point::new(cx + radius, cy - k),
            Point::new(cx + radius, cy),
        );
        self.close();
        Ok(())
    }

    /// Axis-aligned bounds over control points (conservative for cubics).
    /// `None` for an empty path.
    pub fn bounds(&self) -> Option<(f32, f32, f32, f32)> {
        if self.pts.is_empty() {
            return None;
        }
        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;
        for p in &self.pts {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some((min_x, min_y, max_x - min_x, max_y - min_y))
    }

    /// Walk the path, yielding each command with its points resolved.
    pub fn segments(&self) -> PathSegments<'_> {
        PathSegments {
            path: self,
            cmd: 0,
            pt: 0,
        }
    }
}

/// One resolved path step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    MoveTo(Point),
    LineTo(Point),
    CubicTo(Point, Point, Point),
    Close,
}

/// Iterator over a path's resolved segments.
pub struct PathSegments<'a> {
    path: &'a Path,
    cmd: usize,
    pt: usize,
}

impl Iterator for PathSegments<'_> {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        let cmd = *self.path.cmds.get(self.cmd)?;
        self.cmd += 1;
        let pts = &self.path.pts;
        let seg = match cmd {
            PathCommand::MoveTo => Segment::MoveTo(*pts.get(self.pt)?),
            PathCommand::LineTo => Segment::LineTo(*pts.get(self.pt)?),
            PathCommand::CubicTo => {
                let c1 = *pts.get(self.pt)?;
                let c2 = *pts.get(self.pt + 1)?;
                let p = *pts.get(self.pt + 2)?;
                Segment::CubicTo(c1, c2, p)
            }
            PathCommand::Close => Segment::Close,
        };
        self.pt += cmd.point_count();
        Some(seg)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_path() {
        let p = Path::new();
        assert!(p.is_empty());
        assert!(p.bounds().is_none());
        assert_eq!(p.segments().count(), 0);
    }

    #[test]
    fn test_rect_segments() {
        let mut p = Path::new();
        p.append_rect(1.0, 2.0, 10.0, 20.0).unwrap();
        let segs: Vec<_> = p.segments().collect();
        assert_eq!(segs.len(), 5);
        assert_eq!(segs[0], Segment::MoveTo(Point::new(1.0, 2.0)));
        assert_eq!(segs[4], Segment::Close);
    }

    #[test]
    fn test_rect_rejects_degenerate() {
        let mut p = Path::new();
        assert_eq!(p.append_rect(0.0, 0.0, 0.0, 5.0), Err(Error::InvalidArguments));
        assert!(p.is_empty());
    }

    #[test]
    fn test_circle_rejects_zero_radius() {
        let mut p = Path::new();
        assert_eq!(p.append_circle(0.0, 0.0, 0.0), Err(Error::InvalidArguments));
    }

    #[test]
    fn test_circle_commands() {
        let mut p = Path::new();
        p.append_circle(0.0, 0.0, 10.0).unwrap();
        let cubics = p
            .commands()
            .iter()
            .filter(|c| **c == PathCommand::CubicTo)
            .count();
        assert_eq!(cubics, 4);
    }

    #[test]
    fn test_bounds() {
        let mut p = Path::new();
        p.move_to(Point::new(-5.0, 2.0));
        p.line_to(Point::new(15.0, 12.0));
        let (x, y, w, h) = p.bounds().unwrap();
        assert_eq!((x, y, w, h), (-5.0, 2.0, 20.0, 10.0));
    }

    #[test]
    fn test_cubic_segment_points() {
        let mut p = Path::new();
        p.move_to(Point::new(0.0, 0.0));
        p.cubic_to(
            Point::new(1.0, 1.0),
            Point::new(2.0, 2.0),
            Point::new(3.0, 0.0),
        );
        let segs: Vec<_> = p.segments().collect();
        assert_eq!(
            segs[1],
            Segment::CubicTo(
                Point::new(1.0, 1.0),
                Point::new(2.0, 2.0),
                Point::new(3.0, 0.0)
            )
        );
    }

    #[test]
    fn test_clear_resets() {
        let mut p = Path::new();
        p.append_rect(0.0, 0.0, 1.0, 1.0).unwrap();
        p.clear();
        assert!(p.is_empty());
        assert!(p.points().is_empty());
    }
}

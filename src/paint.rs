//! The paint tree: what callers hand the renderer.
//!
//! A paint is a tagged variant over the three node kinds: a `Shape` (path
//! plus fill and stroke), a `Picture` (raster image), and a `Scene` (an
//! ordered list of child paints sharing a transform, opacity, and optional
//! composite target). No child holds a reference back to its parent; the
//! scene owns its children outright.
//!
//! Property setters record their change in the paint's update-flag set;
//! the renderer's prepare step consumes the set and clears it, so an
//! unchanged paint re-prepares for free.

use crate::basics::UpdateFlags;
use crate::color::Color;
use crate::error::{Error, Result};
use crate::matrix::{Matrix, RenderTransform, MATRIX_EPSILON};
use crate::path::Path;
use crate::stroke::{StrokeCap, StrokeJoin};
use std::sync::Arc;

// ============================================================================
// Fills
// ============================================================================

/// Behavior of a gradient outside its [0, 1] parameter range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillSpread {
    /// Clamp to the terminal stop colors.
    #[default]
    Pad,
    /// Mirror back and forth.
    Reflect,
    /// Tile the gradient.
    Repeat,
}

/// One gradient color stop. Offsets are clamped to [0, 1] at build time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    pub offset: f32,
    pub color: Color,
}

/// Linear gradient between two endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearGradient {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub stops: Vec<ColorStop>,
    pub spread: FillSpread,
}

impl LinearGradient {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            stops: Vec::new(),
            spread: FillSpread::default(),
        }
    }

    /// Append a color stop. Non-finite offsets are rejected; offsets are
    /// clamped to [0, 1] when the color table is built.
    pub fn add_stop(&mut self, offset: f32, color: Color) -> Result<()> {
        if !offset.is_finite() {
            return Err(Error::InvalidArguments);
        }
        self.stops.push(ColorStop { offset, color });
        Ok(())
    }
}

/// Radial gradient around a center point.
#[derive(Debug, Clone, PartialEq)]
pub struct RadialGradient {
    pub cx: f32,
    pub cy: f32,
    pub radius: f32,
    pub stops: Vec<ColorStop>,
    pub spread: FillSpread,
}

impl RadialGradient {
    /// A radius at or below epsilon is rejected.
    pub fn new(cx: f32, cy: f32, radius: f32) -> Result<Self> {
        if radius < f32::EPSILON {
            return Err(Error::InvalidArguments);
        }
        Ok(Self {
            cx,
            cy,
            radius,
            stops: Vec::new(),
            spread: FillSpread::default(),
        })
    }

    /// Append a color stop. Non-finite offsets are rejected; offsets are
    /// clamped to [0, 1] when the color table is built.
    pub fn add_stop(&mut self, offset: f32, color: Color) -> Result<()> {
        if !offset.is_finite() {
            return Err(Error::InvalidArguments);
        }
        self.stops.push(ColorStop { offset, color });
        Ok(())
    }
}

/// A shape or stroke fill.
#[derive(Debug, Clone, PartialEq)]
pub enum Fill {
    Solid(Color),
    Linear(LinearGradient),
    Radial(RadialGradient),
}

// ============================================================================
// Stroke
// ============================================================================

/// Stroke description carried by a shape. The stroke fill is independent
/// of the shape fill (a solid color or its own gradient).
#[derive(Debug, Clone)]
pub struct Stroke {
    pub width: f32,
    pub fill: Fill,
    pub cap: StrokeCap,
    pub join: StrokeJoin,
    /// Ratio of miter length to half stroke width before a miter degrades
    /// to a bevel.
    pub miter_limit: f32,
    pub dash: Option<Vec<f32>>,
}

impl Default for Stroke {
    fn default() -> Self {
        Self {
            width: 0.0,
            fill: Fill::Solid(Color::new(0, 0, 0, 0)),
            cap: StrokeCap::default(),
            join: StrokeJoin::default(),
            miter_limit: 4.0,
            dash: None,
        }
    }
}

// ============================================================================
// Shape
// ============================================================================

/// A path with fill and stroke attributes.
#[derive(Debug, Clone, Default)]
pub struct Shape {
    pub path: Path,
    pub fill: Option<Fill>,
    pub stroke: Option<Stroke>,
    pub fill_rule: crate::basics::FillRule,
    transform: Option<RenderTransform>,
    opacity: u8,
    flags: UpdateFlags,
}

impl Shape {
    pub fn new() -> Self {
        Self {
            opacity: 255,
            ..Self::default()
        }
    }

    pub fn set_fill(&mut self, fill: Fill) {
        match &fill {
            Fill::Solid(_) => self.flags |= UpdateFlags::COLOR,
            _ => self.flags |= UpdateFlags::GRADIENT,
        }
        self.fill = Some(fill);
    }

    pub fn set_fill_rule(&mut self, rule: crate::basics::FillRule) {
        self.fill_rule = rule;
        self.flags |= UpdateFlags::PATH;
    }

    /// Mark the path changed; call after mutating `path` directly.
    pub fn touch_path(&mut self) {
        self.flags |= UpdateFlags::PATH;
    }

    fn stroke_mut(&mut self) -> &mut Stroke {
        self.flags |= UpdateFlags::STROKE;
        self.stroke.get_or_insert_with(Stroke::default)
    }

    pub fn set_stroke_width(&mut self, width: f32) {
        self.stroke_mut().width = width;
    }

    pub fn set_stroke_fill(&mut self, fill: Fill) {
        self.stroke_mut().fill = fill;
    }

    pub fn set_stroke_cap(&mut self, cap: StrokeCap) {
        self.stroke_mut().cap = cap;
    }

    pub fn set_stroke_join(&mut self, join: StrokeJoin) {
        self.stroke_mut().join = join;
    }

    pub fn set_stroke_miter_limit(&mut self, limit: f32) {
        self.stroke_mut().miter_limit = limit;
    }

    pub fn set_stroke_dash(&mut self, pattern: &[f32]) -> Result<()> {
        if pattern.is_empty() {
            return Err(Error::InvalidArguments);
        }
        self.stroke_mut().dash = Some(pattern.to_vec());
        Ok(())
    }
}

// ============================================================================
// Picture
// ============================================================================

/// A premultiplied raster image.
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub data: Vec<u32>,
    pub w: u32,
    pub h: u32,
}

/// A raster image node. Until an image is loaded into it, size queries
/// report `InsufficientCondition`.
#[derive(Debug, Clone, Default)]
pub struct Picture {
    pub bitmap: Option<Arc<Bitmap>>,
    transform: Option<RenderTransform>,
    opacity: u8,
    flags: UpdateFlags,
}

impl Picture {
    pub fn new() -> Self {
        Self {
            opacity: 255,
            ..Self::default()
        }
    }

    /// Attach decoded image data (premultiplied, row-major, `w * h`).
    pub fn load(&mut self, data: Vec<u32>, w: u32, h: u32) -> Result<()> {
        if w == 0 || h == 0 || data.len() != (w as usize) * (h as usize) {
            return Err(Error::InvalidArguments);
        }
        self.bitmap = Some(Arc::new(Bitmap { data, w, h }));
        self.flags |= UpdateFlags::IMAGE;
        Ok(())
    }

    pub fn size(&self) -> Result<(u32, u32)> {
        match &self.bitmap {
            Some(b) => Ok((b.w, b.h)),
            None => Err(Error::InsufficientCondition),
        }
    }

    /// View box of the loaded content. Raster content spans its pixel
    /// bounds.
    pub fn viewbox(&self) -> Result<(f32, f32, f32, f32)> {
        let (w, h) = self.size()?;
        Ok((0.0, 0.0, w as f32, h as f32))
    }
}

// ============================================================================
// Composite
// ============================================================================

/// How an off-screen composite target blends back into its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompositeMethod {
    /// Plain source-over.
    #[default]
    None,
    /// Keep destination alpha only where the mask covers.
    ClipPath,
    /// Erase destination alpha where the mask covers.
    AlphaMask,
    /// Keep destination alpha where the inverted mask covers.
    InvAlphaMask,
}

// ============================================================================
// Scene
// ============================================================================

/// An ordered group of child paints.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub paints: Vec<Paint>,
    transform: Option<RenderTransform>,
    opacity: u8,
    flags: UpdateFlags,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            opacity: 255,
            ..Self::default()
        }
    }

    pub fn push(&mut self, paint: Paint) {
        self.paints.push(paint);
    }
}

// ============================================================================
// Paint — the tagged variant
// ============================================================================

/// Any node of the paint tree.
#[derive(Debug, Clone)]
pub enum Paint {
    Shape(Shape),
    Picture(Picture),
    Scene(Scene),
}

macro_rules! dispatch {
    ($self:expr, $p:ident => $body:expr) => {
        match $self {
            Paint::Shape($p) => $body,
            Paint::Picture($p) => $body,
            Paint::Scene($p) => $body,
        }
    };
}

/// Transform/opacity/flag state shared by every paint kind. The concrete
/// types implement this; `Paint` forwards by dispatch on the tag.
pub trait PaintNode {
    fn transform_state(&mut self) -> &mut Option<RenderTransform>;
    fn flags_mut(&mut self) -> &mut UpdateFlags;
    fn flags(&self) -> UpdateFlags;
    fn opacity(&self) -> u8;
    fn set_opacity_value(&mut self, opacity: u8);

    fn translate(&mut self, x: f32, y: f32) -> Result<()> {
        let rt = self.transform_state().get_or_insert_with(RenderTransform::new);
        if (x - rt.x).abs() <= MATRIX_EPSILON && (y - rt.y).abs() <= MATRIX_EPSILON {
            return Ok(());
        }
        rt.x = x;
        rt.y = y;
        *self.flags_mut() |= UpdateFlags::TRANSFORM;
        Ok(())
    }

    fn rotate(&mut self, degree: f32) -> Result<()> {
        let rt = self.transform_state().get_or_insert_with(RenderTransform::new);
        if (degree - rt.degree).abs() <= MATRIX_EPSILON {
            return Ok(());
        }
        rt.degree = degree;
        *self.flags_mut() |= UpdateFlags::TRANSFORM;
        Ok(())
    }

    fn scale(&mut self, factor: f32) -> Result<()> {
        let rt = self.transform_state().get_or_insert_with(RenderTransform::new);
        if (factor - rt.scale).abs() <= MATRIX_EPSILON {
            return Ok(());
        }
        rt.scale = factor;
        *self.flags_mut() |= UpdateFlags::TRANSFORM;
        Ok(())
    }

    fn set_transform(&mut self, m: Matrix) -> Result<()> {
        self.transform_state()
            .get_or_insert_with(RenderTransform::new)
            .override_with(m);
        *self.flags_mut() |= UpdateFlags::TRANSFORM;
        Ok(())
    }

    fn set_opacity(&mut self, opacity: u8) {
        if self.opacity() != opacity {
            self.set_opacity_value(opacity);
            *self.flags_mut() |= UpdateFlags::OPACITY;
        }
    }

    /// Recompose and return the effective transform, if any.
    fn update_transform(&mut self) -> Option<RenderTransform> {
        let rt = self.transform_state().as_mut()?;
        if rt.update() {
            Some(*rt)
        } else {
            None
        }
    }

    /// Take and clear the pending flag set.
    fn take_flags(&mut self) -> UpdateFlags {
        let f = self.flags();
        *self.flags_mut() = UpdateFlags::empty();
        f
    }
}

macro_rules! impl_paint_node {
    ($ty:ty) => {
        impl PaintNode for $ty {
            fn transform_state(&mut self) -> &mut Option<RenderTransform> {
                &mut self.transform
            }
            fn flags_mut(&mut self) -> &mut UpdateFlags {
                &mut self.flags
            }
            fn flags(&self) -> UpdateFlags {
                self.flags
            }
            fn opacity(&self) -> u8 {
                self.opacity
            }
            fn set_opacity_value(&mut self, opacity: u8) {
                self.opacity = opacity;
            }
        }
    };
}

impl_paint_node!(Shape);
impl_paint_node!(Picture);
impl_paint_node!(Scene);

impl Paint {
    pub fn opacity(&self) -> u8 {
        dispatch!(self, p => p.opacity())
    }

    pub fn flags(&self) -> UpdateFlags {
        dispatch!(self, p => p.flags())
    }

    pub fn take_flags(&mut self) -> UpdateFlags {
        dispatch!(self, p => p.take_flags())
    }

    pub fn update_transform(&mut self) -> Option<RenderTransform> {
        dispatch!(self, p => p.update_transform())
    }

    /// Untransformed bounds `(x, y, w, h)` of the node.
    pub fn bounds(&self) -> Result<(f32, f32, f32, f32)> {
        match self {
            Paint::Shape(s) => s.path.bounds().ok_or(Error::InsufficientCondition),
            Paint::Picture(p) => {
                let (w, h) = p.size()?;
                Ok((0.0, 0.0, w as f32, h as f32))
            }
            Paint::Scene(sc) => {
                let mut min_x = f32::MAX;
                let mut min_y = f32::MAX;
                let mut max_x = f32::MIN;
                let mut max_y = f32::MIN;
                for child in &sc.paints {
                    let (x, y, w, h) = child.bounds()?;
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x + w);
                    max_y = max_y.max(y + h);
                }
                if sc.paints.is_empty() {
                    return Err(Error::InsufficientCondition);
                }
                Ok((min_x, min_y, max_x - min_x, max_y - min_y))
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basics::Point;

    #[test]
    fn test_radial_rejects_zero_radius() {
        assert!(RadialGradient::new(0.0, 0.0, 0.0).is_err());
        assert!(RadialGradient::new(0.0, 0.0, 1.0).is_ok());
    }

    #[test]
    fn test_add_stop_rejects_non_finite_offset() {
        let c = Color::new(1, 2, 3, 255);

        let mut g = LinearGradient::new(0.0, 0.0, 10.0, 0.0);
        assert_eq!(g.add_stop(f32::NAN, c), Err(Error::InvalidArguments));
        assert_eq!(g.add_stop(f32::INFINITY, c), Err(Error::InvalidArguments));
        assert!(g.add_stop(0.5, c).is_ok());
        assert_eq!(g.stops.len(), 1);

        let mut r = RadialGradient::new(0.0, 0.0, 1.0).unwrap();
        assert_eq!(r.add_stop(f32::NEG_INFINITY, c), Err(Error::InvalidArguments));
        assert!(r.add_stop(1.0, c).is_ok());
        assert_eq!(r.stops.len(), 1);
    }

    #[test]
    fn test_shape_setters_mark_flags() {
        let mut s = Shape::new();
        assert!(s.flags().is_empty());

        s.set_fill(Fill::Solid(Color::new(1, 2, 3, 255)));
        assert!(s.flags().contains(UpdateFlags::COLOR));

        s.set_stroke_width(2.0);
        assert!(s.flags().contains(UpdateFlags::STROKE));

        s.translate(5.0, 5.0).unwrap();
        assert!(s.flags().contains(UpdateFlags::TRANSFORM));

        let f = s.take_flags();
        assert!(!f.is_empty());
        assert!(s.flags().is_empty());
    }

    #[test]
    fn test_gradient_fill_marks_gradient_flag() {
        let mut s = Shape::new();
        s.set_fill(Fill::Linear(LinearGradient::new(0.0, 0.0, 10.0, 0.0)));
        assert!(s.flags().contains(UpdateFlags::GRADIENT));
    }

    #[test]
    fn test_unchanged_setter_short_circuits() {
        let mut s = Shape::new();
        s.translate(3.0, 4.0).unwrap();
        s.take_flags();
        // same values again: no flag
        s.translate(3.0, 4.0).unwrap();
        assert!(s.flags().is_empty());
    }

    #[test]
    fn test_opacity_change_tracked() {
        let mut s = Shape::new();
        assert_eq!(s.opacity(), 255);
        s.set_opacity(255);
        assert!(s.flags().is_empty());
        s.set_opacity(128);
        assert!(s.flags().contains(UpdateFlags::OPACITY));
    }

    #[test]
    fn test_picture_unloaded_size_fails() {
        let p = Picture::new();
        assert_eq!(p.size(), Err(Error::InsufficientCondition));
    }

    #[test]
    fn test_picture_load_validates() {
        let mut p = Picture::new();
        assert_eq!(p.load(vec![0; 3], 2, 2), Err(Error::InvalidArguments));
        assert!(p.load(vec![0; 4], 2, 2).is_ok());
        assert_eq!(p.size(), Ok((2, 2)));
        assert_eq!(p.viewbox(), Ok((0.0, 0.0, 2.0, 2.0)));
    }

    #[test]
    fn test_stroke_dash_rejects_empty() {
        let mut s = Shape::new();
        assert_eq!(s.set_stroke_dash(&[]), Err(Error::InvalidArguments));
        assert!(s.set_stroke_dash(&[4.0, 2.0]).is_ok());
        assert_eq!(s.stroke.as_ref().unwrap().dash.as_deref(), Some(&[4.0, 2.0][..]));
    }

    #[test]
    fn test_scene_bounds_union() {
        let mut a = Shape::new();
        a.path.append_rect(0.0, 0.0, 4.0, 4.0).unwrap();
        let mut b = Shape::new();
        b.path.append_rect(10.0, 10.0, 2.0, 2.0).unwrap();

        let mut scene = Scene::new();
        scene.push(Paint::Shape(a));
        scene.push(Paint::Shape(b));

        let bounds = Paint::Scene(scene).bounds().unwrap();
        assert_eq!(bounds, (0.0, 0.0, 12.0, 12.0));
    }

    #[test]
    fn test_empty_scene_bounds_fails() {
        assert_eq!(
            Paint::Scene(Scene::new()).bounds(),
            Err(Error::InsufficientCondition)
        );
    }

    #[test]
    fn test_update_transform_composition() {
        let mut s = Shape::new();
        s.path.move_to(Point::new(0.0, 0.0));
        s.translate(10.0, 0.0).unwrap();
        s.scale(2.0).unwrap();
        let rt = Paint::Shape(s).update_transform().unwrap();
        let p = rt.m.apply(Point::new(1.0, 0.0));
        assert!((p.x - 12.0).abs() < 1e-4);
    }
}

//! Affine transforms.
//!
//! A row-major 3×3 matrix plus `RenderTransform`, the decomposed
//! translation/rotation/uniform-scale triple the scene graph hands the
//! renderer. The third row is carried but the pipeline only ever produces
//! affine values for it.

use crate::basics::Point;

/// Epsilon for matrix/transform float comparisons.
pub const MATRIX_EPSILON: f32 = 1e-6;

// ============================================================================
// Matrix
// ============================================================================

/// Row-major 3×3 matrix.
///
/// ```text
///   | e11 e12 e13 |       x' = x·e11 + y·e12 + e13
///   | e21 e22 e23 |       y' = x·e21 + y·e22 + e23
///   | e31 e32 e33 |
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub e11: f32,
    pub e12: f32,
    pub e13: f32,
    pub e21: f32,
    pub e22: f32,
    pub e23: f32,
    pub e31: f32,
    pub e32: f32,
    pub e33: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix {
    pub const fn identity() -> Self {
        Self {
            e11: 1.0,
            e12: 0.0,
            e13: 0.0,
            e21: 0.0,
            e22: 1.0,
            e23: 0.0,
            e31: 0.0,
            e32: 0.0,
            e33: 1.0,
        }
    }

    pub fn is_identity(&self) -> bool {
        (self.e11 - 1.0).abs() < MATRIX_EPSILON
            && self.e12.abs() < MATRIX_EPSILON
            && self.e13.abs() < MATRIX_EPSILON
            && self.e21.abs() < MATRIX_EPSILON
            && (self.e22 - 1.0).abs() < MATRIX_EPSILON
            && self.e23.abs() < MATRIX_EPSILON
    }

    pub fn translation(tx: f32, ty: f32) -> Self {
        let mut m = Self::identity();
        m.e13 = tx;
        m.e23 = ty;
        m
    }

    pub fn scaling(s: f32) -> Self {
        let mut m = Self::identity();
        m.e11 = s;
        m.e22 = s;
        m
    }

    pub fn rotation(degree: f32) -> Self {
        let rad = degree.to_radians();
        let (sin, cos) = rad.sin_cos();
        let mut m = Self::identity();
        m.e11 = cos;
        m.e12 = -sin;
        m.e21 = sin;
        m.e22 = cos;
        m
    }

    /// `self · rhs` (apply `rhs` first, then `self`).
    pub fn multiply(&self, rhs: &Matrix) -> Matrix {
        Matrix {
            e11: self.e11 * rhs.e11 + self.e12 * rhs.e21 + self.e13 * rhs.e31,
            e12: self.e11 * rhs.e12 + self.e12 * rhs.e22 + self.e13 * rhs.e32,
            e13: self.e11 * rhs.e13 + self.e12 * rhs.e23 + self.e13 * rhs.e33,
            e21: self.e21 * rhs.e11 + self.e22 * rhs.e21 + self.e23 * rhs.e31,
            e22: self.e21 * rhs.e12 + self.e22 * rhs.e22 + self.e23 * rhs.e32,
            e23: self.e21 * rhs.e13 + self.e22 * rhs.e23 + self.e23 * rhs.e33,
            e31: self.e31 * rhs.e11 + self.e32 * rhs.e21 + self.e33 * rhs.e31,
            e32: self.e31 * rhs.e12 + self.e32 * rhs.e22 + self.e33 * rhs.e32,
            e33: self.e31 * rhs.e13 + self.e32 * rhs.e23 + self.e33 * rhs.e33,
        }
    }

    /// Map a point through the affine part of the matrix.
    #[inline]
    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            p.x * self.e11 + p.y * self.e12 + self.e13,
            p.x * self.e21 + p.y * self.e22 + self.e23,
        )
    }

    /// Inverse of the affine part. `None` when the matrix is singular.
    pub fn invert(&self) -> Option<Matrix> {
        let det = self.e11 * self.e22 - self.e12 * self.e21;
        if det.abs() < MATRIX_EPSILON * MATRIX_EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let e11 = self.e22 * inv_det;
        let e12 = -self.e12 * inv_det;
        let e21 = -self.e21 * inv_det;
        let e22 = self.e11 * inv_det;
        Some(Matrix {
            e11,
            e12,
            e13: -(e11 * self.e13 + e12 * self.e23),
            e21,
            e22,
            e23: -(e21 * self.e13 + e22 * self.e23),
            e31: 0.0,
            e32: 0.0,
            e33: 1.0,
        })
    }

    /// Average magnitude of the two row vectors: the uniform-scale
    /// approximation used to scale stroke widths.
    pub fn scale_factor(&self) -> f32 {
        let sx = (self.e11 * self.e11 + self.e21 * self.e21).sqrt();
        let sy = (self.e12 * self.e12 + self.e22 * self.e22).sqrt();
        (sx + sy) * 0.5
    }
}

// ============================================================================
// RenderTransform
// ============================================================================

/// Decomposed transform: translation, rotation degree, uniform scale, with
/// an optional user-supplied matrix override.
///
/// `update()` recomposes `m = T · R · S` unless the override is active.
#[derive(Debug, Clone, Copy)]
pub struct RenderTransform {
    pub m: Matrix,
    pub x: f32,
    pub y: f32,
    pub degree: f32,
    pub scale: f32,
    pub overriding: bool,
}

impl Default for RenderTransform {
    fn default() -> Self {
        Self {
            m: Matrix::identity(),
            x: 0.0,
            y: 0.0,
            degree: 0.0,
            scale: 1.0,
            overriding: false,
        }
    }
}

impl RenderTransform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the composed matrix with a caller-supplied one; the
    /// decomposed fields are ignored from here on.
    pub fn override_with(&mut self, m: Matrix) {
        self.m = m;
        self.overriding = true;
    }

    /// Recompose `m` from the decomposed fields. Returns `false` when the
    /// transform has collapsed to nothing visible (zero scale).
    pub fn update(&mut self) -> bool {
        if self.overriding {
            return true;
        }
        if self.scale.abs() < MATRIX_EPSILON {
            return false;
        }
        let mut m = Matrix::scaling(self.scale);
        if self.degree.abs() > MATRIX_EPSILON {
            m = Matrix::rotation(self.degree).multiply(&m);
        }
        self.m = Matrix::translation(self.x, self.y).multiply(&m);
        true
    }

    /// Effective transform of a child under a parent: the product of the
    /// two composed matrices.
    pub fn combined(parent: &RenderTransform, child: &RenderTransform) -> RenderTransform {
        let mut out = RenderTransform::new();
        out.m = parent.m.multiply(&child.m);
        out.overriding = true;
        out
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_identity_apply() {
        let m = Matrix::identity();
        let p = m.apply(Point::new(3.0, 4.0));
        assert!(close(p.x, 3.0) && close(p.y, 4.0));
        assert!(m.is_identity());
    }

    #[test]
    fn test_translation() {
        let m = Matrix::translation(10.0, -5.0);
        let p = m.apply(Point::new(1.0, 1.0));
        assert!(close(p.x, 11.0) && close(p.y, -4.0));
    }

    #[test]
    fn test_rotation_90() {
        let m = Matrix::rotation(90.0);
        let p = m.apply(Point::new(1.0, 0.0));
        assert!(close(p.x, 0.0) && close(p.y, 1.0), "got {:?}", p);
    }

    #[test]
    fn test_multiply_order() {
        // Translate after scale: T·S maps (1,0) -> (2,0) -> (12, 0)
        let t = Matrix::translation(10.0, 0.0);
        let s = Matrix::scaling(2.0);
        let m = t.multiply(&s);
        let p = m.apply(Point::new(1.0, 0.0));
        assert!(close(p.x, 12.0) && close(p.y, 0.0));
    }

    #[test]
    fn test_invert_roundtrip() {
        let m = Matrix::translation(3.0, 7.0).multiply(&Matrix::rotation(30.0));
        let inv = m.invert().unwrap();
        let p = Point::new(5.0, -2.0);
        let q = inv.apply(m.apply(p));
        assert!(close(q.x, p.x) && close(q.y, p.y), "got {:?}", q);
    }

    #[test]
    fn test_invert_singular() {
        let mut m = Matrix::identity();
        m.e11 = 0.0;
        m.e22 = 0.0;
        assert!(m.invert().is_none());
    }

    #[test]
    fn test_scale_factor() {
        assert!(close(Matrix::scaling(3.0).scale_factor(), 3.0));
        assert!(close(Matrix::rotation(45.0).scale_factor(), 1.0));
    }

    #[test]
    fn test_render_transform_compose() {
        let mut rt = RenderTransform::new();
        rt.x = 10.0;
        rt.y = 0.0;
        rt.scale = 2.0;
        assert!(rt.update());
        let p = rt.m.apply(Point::new(1.0, 0.0));
        assert!(close(p.x, 12.0) && close(p.y, 0.0));
    }

    #[test]
    fn test_render_transform_zero_scale_fails() {
        let mut rt = RenderTransform::new();
        rt.scale = 0.0;
        assert!(!rt.update());
    }

    #[test]
    fn test_render_transform_override_wins() {
        let mut rt = RenderTransform::new();
        rt.override_with(Matrix::translation(1.0, 2.0));
        rt.scale = 100.0; // ignored
        assert!(rt.update());
        let p = rt.m.apply(Point::new(0.0, 0.0));
        assert!(close(p.x, 1.0) && close(p.y, 2.0));
    }

    #[test]
    fn test_combined_is_product() {
        let mut a = RenderTransform::new();
        a.x = 5.0;
        a.update();
        let mut b = RenderTransform::new();
        b.scale = 2.0;
        b.update();
        let c = RenderTransform::combined(&a, &b);
        let p = c.m.apply(Point::new(1.0, 0.0));
        assert!(close(p.x, 7.0) && close(p.y, 0.0));
    }
}

//! Per-shape render data.
//!
//! `prepare` turns a shape snapshot into everything the single-threaded
//! render pass needs: fill spans, stroke spans, the transformed bounding
//! box, and prepared gradient tables. The work happens on a worker thread
//! against that worker's scratch outlines; only the compact results are
//! kept. The update-flag set drives incremental re-preparation: an empty
//! set reuses the cached data in full.

use std::sync::Arc;

use crate::basics::{BBox, FillRule, Point, UpdateFlags};
use crate::clip::clip_path;
use crate::color::Colorspace;
use crate::curve::{flatten_cubic, FLATTEN_TOLERANCE};
use crate::gradient::FillData;
use crate::matrix::Matrix;
use crate::mempool::Scratch;
use crate::outline::Outline;
use crate::paint::{Bitmap, Fill, Shape, Stroke};
use crate::path::{Path, Segment};
use crate::rle::{rle_render, Rle};
use crate::stroke::{Polyline, Stroker};

// ============================================================================
// ShapeData
// ============================================================================

/// Render-ready state of one shape. Reused across frames; regenerated
/// piecewise according to the update flags.
#[derive(Debug, Default)]
pub struct ShapeData {
    pub fill_rle: Rle,
    pub stroke_rle: Rle,
    /// Transformed bounds of fill and stroke, clipped to the viewport.
    pub bbox: BBox,
    pub fill: Option<Fill>,
    pub stroke_fill: Option<Fill>,
    pub fill_data: Option<FillData>,
    pub stroke_fill_data: Option<FillData>,
    pub opacity: u8,
    /// Cleared when preparation failed; an invalid shape renders as a
    /// no-op.
    pub valid: bool,
}

// ============================================================================
// Outline generation
// ============================================================================

/// Decompose `path` into a fixed-point outline under `matrix`.
pub fn gen_outline(path: &Path, matrix: &Matrix, fill_rule: FillRule, outline: &mut Outline) {
    outline.clear();
    outline.fill_rule = fill_rule;
    for seg in path.segments() {
        match seg {
            Segment::MoveTo(p) => outline.move_to(matrix.apply(p)),
            Segment::LineTo(p) => outline.line_to(matrix.apply(p)),
            Segment::CubicTo(c1, c2, p) => {
                outline.cubic_to(matrix.apply(c1), matrix.apply(c2), matrix.apply(p))
            }
            Segment::Close => outline.close(),
        }
    }
    outline.end_contour();
}

/// Flatten `path` into device-space polylines for the stroke side.
pub fn flatten_polylines(path: &Path, matrix: &Matrix) -> Vec<Polyline> {
    let mut out: Vec<Polyline> = Vec::new();
    let mut current = Polyline::default();
    let mut pos = Point::default();

    let mut flush = |poly: &mut Polyline| {
        if poly.pts.len() >= 2 {
            out.push(core::mem::take(poly));
        } else {
            poly.pts.clear();
            poly.closed = false;
        }
    };

    for seg in path.segments() {
        match seg {
            Segment::MoveTo(p) => {
                flush(&mut current);
                pos = matrix.apply(p);
                current.pts.push(pos);
            }
            Segment::LineTo(p) => {
                pos = matrix.apply(p);
                current.pts.push(pos);
            }
            Segment::CubicTo(c1, c2, p) => {
                let c1 = matrix.apply(c1);
                let c2 = matrix.apply(c2);
                let to = matrix.apply(p);
                flatten_cubic(pos, c1, c2, to, FLATTEN_TOLERANCE, &mut |q| {
                    current.pts.push(q)
                });
                pos = to;
            }
            Segment::Close => {
                current.closed = true;
                flush(&mut current);
            }
        }
    }
    flush(&mut current);
    out
}

// ============================================================================
// Preparation
// ============================================================================

fn outline_bbox(outline: &Outline, viewport: &BBox) -> BBox {
    match outline.bbox() {
        Some((min_x, min_y, max_x, max_y)) => {
            let mut b = BBox::new(min_x, min_y, max_x, max_y);
            if b.intersect(viewport) {
                b
            } else {
                BBox::default()
            }
        }
        None => BBox::default(),
    }
}

fn union_bbox(a: BBox, b: BBox) -> BBox {
    if a.is_empty() {
        return b;
    }
    if b.is_empty() {
        return a;
    }
    BBox::new(
        a.min.x.min(b.min.x),
        a.min.y.min(b.min.y),
        a.max.x.max(b.max.x),
        a.max.y.max(b.max.y),
    )
}

/// Regenerate `data` from a shape snapshot.
///
/// `flags` selects what to rebuild; geometry flags rebuild the RLEs,
/// color/gradient flags only refresh the paint side. Rasterization
/// failures mark the data invalid instead of propagating: the shape is
/// skipped at render time and the frame survives.
#[allow(clippy::too_many_arguments)]
pub fn update_shape(
    data: &mut ShapeData,
    shape: &Shape,
    matrix: &Matrix,
    opacity: u8,
    viewport: &BBox,
    cs: Colorspace,
    clips: &[Arc<Rle>],
    flags: UpdateFlags,
    scratch: &mut Scratch,
    anti_alias: bool,
) {
    data.opacity = opacity;
    if flags.is_empty() {
        return;
    }

    data.valid = true;

    let geometry = flags
        .intersects(UpdateFlags::PATH | UpdateFlags::TRANSFORM);
    let stroke_changed = geometry || flags.contains(UpdateFlags::STROKE);

    // Fill geometry.
    if geometry {
        if shape.fill.is_some() {
            gen_outline(&shape.path, matrix, shape.fill_rule, &mut scratch.outline);
            let bbox = outline_bbox(&scratch.outline, viewport);
            if bbox.is_empty() {
                data.fill_rle.reset();
            } else if rle_render(
                &mut data.fill_rle,
                &scratch.outline,
                &bbox,
                viewport,
                anti_alias,
                &mut scratch.band_size,
            )
            .is_err()
            {
                data.valid = false;
                data.fill_rle.reset();
            }
            for clip in clips {
                clip_path(&mut data.fill_rle, clip);
            }
        } else {
            data.fill_rle.reset();
        }
    }

    // Stroke geometry.
    if stroke_changed {
        match &shape.stroke {
            Some(stroke) if stroke.width * matrix.scale_factor() > 0.0 => {
                gen_stroke_rle(data, shape, stroke, matrix, viewport, clips, scratch, anti_alias);
            }
            _ => data.stroke_rle.reset(),
        }
    }

    // Paint side.
    if flags.intersects(
        UpdateFlags::COLOR | UpdateFlags::GRADIENT | UpdateFlags::PATH | UpdateFlags::TRANSFORM,
    ) {
        data.fill = shape.fill.clone();
        data.fill_data = shape
            .fill
            .as_ref()
            .and_then(|f| FillData::prepare(f, matrix, cs));
    }
    if stroke_changed || flags.intersects(UpdateFlags::COLOR | UpdateFlags::GRADIENT) {
        data.stroke_fill = shape.stroke.as_ref().map(|s| s.fill.clone());
        data.stroke_fill_data = shape
            .stroke
            .as_ref()
            .and_then(|s| FillData::prepare(&s.fill, matrix, cs));
    }

    data.bbox = union_bbox(
        data.fill_rle.bbox().unwrap_or_default(),
        data.stroke_rle.bbox().unwrap_or_default(),
    );
}

#[allow(clippy::too_many_arguments)]
fn gen_stroke_rle(
    data: &mut ShapeData,
    shape: &Shape,
    stroke: &Stroke,
    matrix: &Matrix,
    viewport: &BBox,
    clips: &[Arc<Rle>],
    scratch: &mut Scratch,
    anti_alias: bool,
) {
    let polylines = flatten_polylines(&shape.path, matrix);
    let polylines = match &stroke.dash {
        Some(pattern) => match crate::dash::dash_polylines(&polylines, pattern) {
            Some(dashed) => dashed,
            None => polylines,
        },
        None => polylines,
    };

    let width = stroke.width * matrix.scale_factor();
    let stroker = Stroker::new(width, stroke.cap, stroke.join, stroke.miter_limit);
    scratch.stroke_outline.clear();
    scratch.stroke_outline.fill_rule = FillRule::NonZero;
    for polyline in &polylines {
        stroker.stroke_polyline(&mut scratch.stroke_outline, polyline);
    }

    let bbox = outline_bbox(&scratch.stroke_outline, viewport);
    if bbox.is_empty() {
        data.stroke_rle.reset();
        return;
    }
    if rle_render(
        &mut data.stroke_rle,
        &scratch.stroke_outline,
        &bbox,
        viewport,
        anti_alias,
        &mut scratch.band_size,
    )
    .is_err()
    {
        data.valid = false;
        data.stroke_rle.reset();
        return;
    }
    for clip in clips {
        clip_path(&mut data.stroke_rle, clip);
    }
}

// ============================================================================
// ImageData
// ============================================================================

/// Render-ready state of one picture.
#[derive(Debug, Default)]
pub struct ImageData {
    pub rle: Rle,
    pub bbox: BBox,
    pub bitmap: Option<Arc<Bitmap>>,
    /// Device-to-image transform for sampling.
    pub inv: Matrix,
    pub opacity: u8,
    pub valid: bool,
}

/// Regenerate `data` for a picture under `matrix`: the image quad is
/// rasterized like any outline, sampling happens at render time through
/// the inverse transform.
#[allow(clippy::too_many_arguments)]
pub fn update_image(
    data: &mut ImageData,
    bitmap: &Arc<Bitmap>,
    matrix: &Matrix,
    opacity: u8,
    viewport: &BBox,
    clips: &[Arc<Rle>],
    flags: UpdateFlags,
    scratch: &mut Scratch,
) {
    data.opacity = opacity;
    if flags.is_empty() {
        return;
    }

    data.valid = true;
    data.bitmap = Some(Arc::clone(bitmap));
    data.inv = matrix.invert().unwrap_or_else(Matrix::identity);

    let mut quad = Path::new();
    let w = bitmap.w as f32;
    let h = bitmap.h as f32;
    if quad.append_rect(0.0, 0.0, w, h).is_err() {
        data.valid = false;
        return;
    }

    gen_outline(&quad, matrix, FillRule::NonZero, &mut scratch.outline);
    let bbox = outline_bbox(&scratch.outline, viewport);
    if bbox.is_empty() {
        data.rle.reset();
        data.bbox = BBox::default();
        return;
    }
    if rle_render(
        &mut data.rle,
        &scratch.outline,
        &bbox,
        viewport,
        true,
        &mut scratch.band_size,
    )
    .is_err()
    {
        data.valid = false;
        data.rle.reset();
        return;
    }
    for clip in clips {
        clip_path(&mut data.rle, clip);
    }
    data.bbox = data.rle.bbox().unwrap_or_default();
}

// ============================================================================
// Tests
// ============================================================================

//! # softvg
//!
//! A software 2D vector graphics rasterizer: declarative scenes of filled
//! and stroked paths become premultiplied pixels through a span pipeline.
//!
//! The pipeline, stage by stage:
//!
//! 1. **Paint tree** — shapes, pictures, and scenes with fills, strokes,
//!    transforms, and composite methods
//! 2. **Outline** — paths flatten into fixed-point contours (cubics are
//!    subdivided on demand)
//! 3. **Stroke/dash generation** — a stroked path becomes a new filled
//!    outline with caps and joins
//! 4. **RLE rasterization** — outlines become run-length coverage spans
//!    with 8-bit anti-aliasing, under a fixed cell-memory budget with
//!    automatic band subdivision
//! 5. **Span clipping** — rectangle, path-intersection, and alpha-mask
//!    clipping merge span lists without touching pixels
//! 6. **Compositing** — spans blend into the destination surface as solid
//!    colors, gradients, or bilinear-sampled images
//!
//! Per-shape preparation (stages 2–5) runs concurrently on a worker pool;
//! the final blend (stage 6) is single-threaded over the caller's buffer.

// Foundation types & math
pub mod basics;
pub mod color;
pub mod error;
pub mod matrix;

// Public data model
pub mod paint;
pub mod path;

// Geometry pipeline
pub mod curve;
pub mod dash;
pub mod outline;
pub mod stroke;

// Rasterization & compositing
pub mod clip;
pub mod gradient;
pub mod raster;
pub mod rle;
pub mod surface;

// Runtime
pub mod mempool;
pub mod renderer;
pub mod scheduler;
pub mod shape_gen;

pub use basics::{FillRule, Point, UpdateFlags};
pub use color::{Color, Colorspace};
pub use error::{Error, Result};
pub use matrix::{Matrix, RenderTransform};
pub use paint::{
    ColorStop, CompositeMethod, Fill, FillSpread, LinearGradient, Paint, PaintNode, Picture,
    RadialGradient, Scene, Shape, Stroke,
};
pub use path::{Path, PathCommand};
pub use renderer::{Engine, RenderData, Renderer};
pub use stroke::{StrokeCap, StrokeJoin};
pub use surface::Surface;

//! The renderer façade.
//!
//! `Engine::init` owns the process-wide resources (worker pool, scratch
//! outlines) behind a handle, so tests and embedders get isolated
//! instances; dropping the last handle joins the workers. A `Renderer`
//! drives the two-phase frame: `prepare_*` schedules per-paint tasks on
//! the pool, `pre_render` is the barrier, then the `render_*` calls blend
//! spans into the caller's surface from a single thread.
//!
//! The only legal frame sequence is
//! `prepare* → pre_render → render* → post_render → sync`.

use std::sync::Arc;

use crate::basics::{BBox, Coord, UpdateFlags};
use crate::color::Colorspace;
use crate::error::{Error, Result};
use crate::matrix::{Matrix, RenderTransform};
use crate::mempool::MemPool;
use crate::paint::{Bitmap, CompositeMethod, Fill, Picture, Shape};
use crate::raster::{blit_composite, raster_gradient_rle, raster_image_rle, raster_solid_rle};
use crate::rle::Rle;
use crate::scheduler::{Task, TaskCell, TaskScheduler};
use crate::shape_gen::{update_image, update_shape, ImageData, ShapeData};
use crate::surface::{CompBuffer, Surface};

// ============================================================================
// Engine
// ============================================================================

/// Process-wide rasterizer resources: the task scheduler and the
/// per-worker memory pool.
pub struct Engine {
    scheduler: Arc<TaskScheduler>,
    mpool: Arc<MemPool>,
}

impl Engine {
    /// Allocate the worker pool and scratch slots. `threads == 0`
    /// downgrades every renderer to synchronous preparation.
    pub fn init(threads: usize) -> Engine {
        Engine {
            scheduler: Arc::new(TaskScheduler::new(threads)),
            mpool: Arc::new(MemPool::new(threads)),
        }
    }

    /// Worker count matching the machine, for callers without a policy.
    pub fn default_threads() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    /// Tear down: equivalent to dropping the handle. Workers join when
    /// the last renderer sharing them is gone.
    pub fn term(self) {}
}

// ============================================================================
// Prepare tasks
// ============================================================================

/// Prepare task for a shape: flatten, stroke, rasterize, clip.
pub struct ShapeTask {
    shape: Shape,
    matrix: Matrix,
    opacity: u8,
    clips: Vec<RenderData>,
    flags: UpdateFlags,
    viewport: BBox,
    cs: Colorspace,
    anti_alias: bool,
    mpool: Arc<MemPool>,
    pub data: ShapeData,
}

impl Task for ShapeTask {
    fn run(&mut self, tid: usize) {
        let clip_rles = resolve_clips(&self.clips);
        let mut scratch = self.mpool.acquire(tid);
        update_shape(
            &mut self.data,
            &self.shape,
            &self.matrix,
            self.opacity,
            &self.viewport,
            self.cs,
            &clip_rles,
            self.flags,
            &mut scratch,
            self.anti_alias,
        );
    }
}

/// Prepare task for a picture.
pub struct ImageTask {
    bitmap: Arc<Bitmap>,
    matrix: Matrix,
    opacity: u8,
    clips: Vec<RenderData>,
    flags: UpdateFlags,
    viewport: BBox,
    mpool: Arc<MemPool>,
    pub data: ImageData,
}

impl Task for ImageTask {
    fn run(&mut self, tid: usize) {
        let clip_rles = resolve_clips(&self.clips);
        let mut scratch = self.mpool.acquire(tid);
        update_image(
            &mut self.data,
            &self.bitmap,
            &self.matrix,
            self.opacity,
            &self.viewport,
            &clip_rles,
            self.flags,
            &mut scratch,
        );
    }
}

/// Clip sources must have been requested before the clipped paint; the
/// FIFO queue then guarantees they complete first, so this wait cannot
/// deadlock.
fn resolve_clips(clips: &[RenderData]) -> Vec<Arc<Rle>> {
    clips
        .iter()
        .map(|c| {
            c.join();
            c.clip_rle()
        })
        .collect()
}

// ============================================================================
// RenderData
// ============================================================================

/// Opaque handle to a paint's prepared state. Cheap to clone; the same
/// handle is passed back on the next frame's prepare to reuse buffers.
#[derive(Clone)]
pub enum RenderData {
    Shape(Arc<TaskCell<ShapeTask>>),
    Image(Arc<TaskCell<ImageTask>>),
}

impl RenderData {
    /// Await this paint's outstanding preparation.
    pub fn join(&self) {
        match self {
            RenderData::Shape(c) => c.get(),
            RenderData::Image(c) => c.get(),
        }
    }

    /// Pixel bounds of the prepared paint.
    pub fn bbox(&self) -> BBox {
        self.join();
        match self {
            RenderData::Shape(c) => c.lock().data.bbox,
            RenderData::Image(c) => c.lock().data.bbox,
        }
    }

    /// Snapshot of the span region used when this paint clips another.
    fn clip_rle(&self) -> Arc<Rle> {
        match self {
            RenderData::Shape(c) => Arc::new(c.lock().data.fill_rle.clone()),
            RenderData::Image(c) => Arc::new(c.lock().data.rle.clone()),
        }
    }

    fn ptr_eq(&self, other: &RenderData) -> bool {
        match (self, other) {
            (RenderData::Shape(a), RenderData::Shape(b)) => Arc::ptr_eq(a, b),
            (RenderData::Image(a), RenderData::Image(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// ============================================================================
// Renderer
// ============================================================================

struct ActiveComp {
    buffer: CompBuffer,
    method: CompositeMethod,
    opacity: u8,
}

/// Drives prepare/render frames against one target description.
pub struct Renderer {
    scheduler: Arc<TaskScheduler>,
    mpool: Arc<MemPool>,
    tasks: Vec<RenderData>,
    target_w: u32,
    target_h: u32,
    cs: Colorspace,
    anti_alias: bool,
    comp_pool: Vec<CompBuffer>,
    comp_stack: Vec<ActiveComp>,
}

impl Renderer {
    pub fn new(engine: &Engine) -> Renderer {
        Renderer {
            scheduler: Arc::clone(&engine.scheduler),
            mpool: Arc::clone(&engine.mpool),
            tasks: Vec::new(),
            target_w: 0,
            target_h: 0,
            cs: Colorspace::Argb8888,
            anti_alias: true,
            comp_pool: Vec::new(),
            comp_stack: Vec::new(),
        }
    }

    /// Describe the destination: dimensions and colorspace. Must match
    /// the surfaces later passed to `render_*`.
    pub fn target(&mut self, w: u32, h: u32, cs: Colorspace) -> Result<()> {
        if w == 0 || h == 0 {
            return Err(Error::InvalidArguments);
        }
        self.target_w = w;
        self.target_h = h;
        self.cs = cs;
        Ok(())
    }

    pub fn set_anti_alias(&mut self, on: bool) {
        self.anti_alias = on;
    }

    fn viewport(&self) -> BBox {
        BBox::new(0, 0, self.target_w as Coord, self.target_h as Coord)
    }

    // ------------------------------------------------------------------
    // Prepare
    // ------------------------------------------------------------------

    /// Schedule preparation of a shape. Returns the render-data handle
    /// immediately; the work runs on the pool.
    pub fn prepare_shape(
        &mut self,
        shape: &Shape,
        prev: Option<RenderData>,
        transform: Option<&RenderTransform>,
        opacity: u8,
        clips: &[RenderData],
        flags: UpdateFlags,
    ) -> Result<RenderData> {
        if self.target_w == 0 {
            return Err(Error::InsufficientCondition);
        }
        let matrix = transform.map(|t| t.m).unwrap_or_else(Matrix::identity);

        let cell = match prev {
            Some(RenderData::Shape(cell)) => {
                // A handle may still be in flight from the previous
                // frame when the caller skipped sync; settle it first.
                cell.get();
                {
                    let mut t = cell.lock();
                    t.shape = shape.clone();
                    t.matrix = matrix;
                    t.opacity = opacity;
                    t.clips = clips.to_vec();
                    t.flags = flags;
                    t.viewport = self.viewport();
                    t.cs = self.cs;
                    t.anti_alias = self.anti_alias;
                }
                cell
            }
            Some(RenderData::Image(_)) => return Err(Error::InvalidArguments),
            None => TaskCell::new(ShapeTask {
                shape: shape.clone(),
                matrix,
                opacity,
                clips: clips.to_vec(),
                flags: UpdateFlags::ALL,
                viewport: self.viewport(),
                cs: self.cs,
                anti_alias: self.anti_alias,
                mpool: Arc::clone(&self.mpool),
                data: ShapeData::default(),
            }),
        };

        self.scheduler.request(&cell);
        let data = RenderData::Shape(cell);
        self.tasks.push(data.clone());
        Ok(data)
    }

    /// Schedule preparation of a picture.
    pub fn prepare_picture(
        &mut self,
        picture: &Picture,
        prev: Option<RenderData>,
        transform: Option<&RenderTransform>,
        opacity: u8,
        clips: &[RenderData],
        flags: UpdateFlags,
    ) -> Result<RenderData> {
        if self.target_w == 0 {
            return Err(Error::InsufficientCondition);
        }
        let bitmap = picture
            .bitmap
            .as_ref()
            .ok_or(Error::InsufficientCondition)?;
        let matrix = transform.map(|t| t.m).unwrap_or_else(Matrix::identity);

        let cell = match prev {
            Some(RenderData::Image(cell)) => {
                cell.get();
                {
                    let mut t = cell.lock();
                    t.bitmap = Arc::clone(bitmap);
                    t.matrix = matrix;
                    t.opacity = opacity;
                    t.clips = clips.to_vec();
                    t.flags = flags;
                    t.viewport = self.viewport();
                }
                cell
            }
            Some(RenderData::Shape(_)) => return Err(Error::InvalidArguments),
            None => TaskCell::new(ImageTask {
                bitmap: Arc::clone(bitmap),
                matrix,
                opacity,
                clips: clips.to_vec(),
                flags: UpdateFlags::ALL,
                viewport: self.viewport(),
                mpool: Arc::clone(&self.mpool),
                data: ImageData::default(),
            }),
        };

        self.scheduler.request(&cell);
        let data = RenderData::Image(cell);
        self.tasks.push(data.clone());
        Ok(data)
    }

    /// Barrier: every outstanding prepare completes before rendering.
    pub fn pre_render(&mut self) -> Result<()> {
        for t in &self.tasks {
            t.join();
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Render
    // ------------------------------------------------------------------

    fn check_surface(&self, surface: &Surface) -> Result<()> {
        if surface.w != self.target_w || surface.h != self.target_h || surface.cs != self.cs {
            return Err(Error::InvalidArguments);
        }
        Ok(())
    }

    /// Blend a prepared shape into the active surface. Must be called on
    /// the surface-owning thread, after `pre_render`. An invalid
    /// preparation renders as a successful no-op.
    pub fn render_shape(&mut self, data: &RenderData, surface: &mut Surface) -> Result<()> {
        self.check_surface(surface)?;
        let cell = match data {
            RenderData::Shape(c) => c,
            RenderData::Image(_) => return Err(Error::InvalidArguments),
        };
        cell.get();
        let task = cell.lock();
        if !task.data.valid {
            log::debug!("render: skipping invalid shape data");
            return Ok(());
        }

        match self.comp_stack.last_mut() {
            Some(top) => {
                let mut view = top.buffer.surface(self.cs);
                draw_shape(&mut view, &task.data);
            }
            None => draw_shape(surface, &task.data),
        }
        Ok(())
    }

    /// Blend a prepared picture into the active surface.
    pub fn render_image(&mut self, data: &RenderData, surface: &mut Surface) -> Result<()> {
        self.check_surface(surface)?;
        let cell = match data {
            RenderData::Image(c) => c,
            RenderData::Shape(_) => return Err(Error::InvalidArguments),
        };
        cell.get();
        let task = cell.lock();
        if !task.data.valid {
            return Ok(());
        }

        match self.comp_stack.last_mut() {
            Some(top) => {
                let mut view = top.buffer.surface(self.cs);
                draw_image(&mut view, &task.data);
            }
            None => draw_image(surface, &task.data),
        }
        Ok(())
    }

    /// Flush the compositor stack; any unterminated composites collapse
    /// with plain source-over.
    pub fn post_render(&mut self, surface: &mut Surface) -> Result<()> {
        while !self.comp_stack.is_empty() {
            log::warn!("render: unbalanced composite, flushing");
            self.end_composite(surface)?;
        }
        Ok(())
    }

    /// End-of-frame: flush composites and settle the task list.
    pub fn sync(&mut self, surface: &mut Surface) -> Result<()> {
        self.post_render(surface)?;
        self.tasks.clear();
        Ok(())
    }

    /// Drop all render data and reset the surface to transparent.
    pub fn clear(&mut self, surface: &mut Surface) -> Result<()> {
        self.check_surface(surface)?;
        self.tasks.clear();
        self.comp_stack.clear();
        surface.clear();
        Ok(())
    }

    /// Release one paint's render data.
    pub fn dispose(&mut self, data: &RenderData) {
        data.join();
        self.tasks.retain(|t| !t.ptr_eq(data));
    }

    /// Transformed pixel bounds of a prepared paint.
    pub fn region(&self, data: &RenderData) -> Result<(i32, i32, i32, i32)> {
        let b = data.bbox();
        if b.is_empty() {
            return Err(Error::InsufficientCondition);
        }
        Ok((b.min.x, b.min.y, b.width(), b.height()))
    }

    // ------------------------------------------------------------------
    // Composite targets
    // ------------------------------------------------------------------

    /// Check out a transparent target; subsequent `render_*` calls land
    /// in it until the matching `end_composite`.
    pub fn begin_composite(&mut self, method: CompositeMethod, opacity: u8) -> Result<()> {
        if self.target_w == 0 {
            return Err(Error::InsufficientCondition);
        }
        let mut buffer = self.comp_pool.pop().unwrap_or_else(|| {
            log::debug!("render: growing compositor pool");
            CompBuffer::default()
        });
        buffer.prepare(self.target_w, self.target_h);
        self.comp_stack.push(ActiveComp {
            buffer,
            method,
            opacity,
        });
        Ok(())
    }

    /// Blend the innermost target back into its parent through its
    /// composite method and opacity, returning the buffer to the pool.
    pub fn end_composite(&mut self, surface: &mut Surface) -> Result<()> {
        let comp = self.comp_stack.pop().ok_or(Error::InsufficientCondition)?;
        let ActiveComp {
            buffer,
            method,
            opacity,
        } = comp;

        match self.comp_stack.last_mut() {
            Some(parent) => {
                let mut view = parent.buffer.surface(self.cs);
                blit_composite(&mut view, &buffer.data, buffer.w, buffer.h, 0, 0, method, opacity);
            }
            None => {
                self.check_surface(surface)?;
                blit_composite(surface, &buffer.data, buffer.w, buffer.h, 0, 0, method, opacity);
            }
        }

        self.comp_pool.push(buffer);
        Ok(())
    }
}

// ============================================================================
// Drawing helpers
// ============================================================================

fn draw_shape(surface: &mut Surface, data: &ShapeData) {
    if !data.fill_rle.is_empty() {
        match &data.fill {
            Some(Fill::Solid(color)) => {
                raster_solid_rle(surface, &data.fill_rle, *color, data.opacity)
            }
            Some(_) => {
                if let Some(fd) = &data.fill_data {
                    raster_gradient_rle(surface, &data.fill_rle, fd, data.opacity);
                }
            }
            None => {}
        }
    }
    if !data.stroke_rle.is_empty() {
        match &data.stroke_fill {
            Some(Fill::Solid(color)) => {
                raster_solid_rle(surface, &data.stroke_rle, *color, data.opacity)
            }
            Some(_) => {
                if let Some(fd) = &data.stroke_fill_data {
                    raster_gradient_rle(surface, &data.stroke_rle, fd, data.opacity);
                }
            }
            None => {}
        }
    }
}

fn draw_image(surface: &mut Surface, data: &ImageData) {
    if let Some(bitmap) = &data.bitmap {
        if !data.rle.is_empty() {
            raster_image_rle(surface, &data.rle, bitmap, &data.inv, data.opacity);
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
    use crate::color::Color;
    use crate::stroke::StrokeCap;

    fn white() -> Fill {
        Fill::Solid(Color::new(255, 255, 255, 255))
    }

    fn rect_shape(x: f32, y: f32, w: f32, h: f32) -> Shape {
        let mut s = Shape::new();
        s.path.append_rect(x, y, w, h).unwrap();
        s.set_fill(white());
        s
    }

    fn frame(renderer: &mut Renderer, shapes: &[&Shape], buf: &mut Vec<u32>, w: u32, h: u32) {
        let mut datas = Vec::new();
        for s in shapes {
            datas.push(
                renderer
                    .prepare_shape(s, None, None, 255, &[], UpdateFlags::ALL)
                    .unwrap(),
            );
        }
        renderer.pre_render().unwrap();
        let mut surface =
            Surface::new(buf, w as usize, w, h, Colorspace::Argb8888).unwrap();
        for d in &datas {
            renderer.render_shape(d, &mut surface).unwrap();
        }
        renderer.post_render(&mut surface).unwrap();
        renderer.sync(&mut surface).unwrap();
    }

    #[test]
    fn test_s1_full_rect_no_aa() {
        let engine = Engine::init(0);
        let mut renderer = Renderer::new(&engine);
        renderer.target(8, 8, Colorspace::Argb8888).unwrap();
        renderer.set_anti_alias(false);

        let shape = rect_shape(0.0, 0.0, 8.0, 8.0);
        let mut buf = vec![0u32; 64];
        frame(&mut renderer, &[&shape], &mut buf, 8, 8);
        assert!(buf.iter().all(|&p| p == 0xffff_ffff), "{:08x}", buf[0]);
    }

    #[test]
    fn test_s2_half_pixel_rect_aa() {
        let engine = Engine::init(0);
        let mut renderer = Renderer::new(&engine);
        renderer.target(8, 8, Colorspace::Argb8888).unwrap();

        let shape = rect_shape(0.5, 0.5, 7.0, 7.0);
        let mut buf = vec![0u32; 64];
        frame(&mut renderer, &[&shape], &mut buf, 8, 8);

        // interior opaque, edge at half coverage
        assert_eq!(buf[3 * 8 + 3], 0xffff_ffff);
        let edge = buf[3 * 8]; // pixel (0, 3)
        let a = edge >> 24;
        assert!((127..=129).contains(&a), "alpha = {}", a);
    }

    #[test]
    fn test_s4_stroked_line() {
        let engine = Engine::init(0);
        let mut renderer = Renderer::new(&engine);
        renderer.target(8, 8, Colorspace::Argb8888).unwrap();

        let mut shape = Shape::new();
        shape.path.move_to(Point::new(1.0, 4.0));
        shape.path.line_to(Point::new(7.0, 4.0));
        shape.touch_path();
        shape.set_stroke_width(2.0);
        shape.set_stroke_cap(StrokeCap::Butt);
        shape.set_stroke_fill(white());

        let mut buf = vec![0u32; 64];
        frame(&mut renderer, &[&shape], &mut buf, 8, 8);
        for y in [3usize, 4] {
            for x in 0..8usize {
                let expect = (1..7).contains(&x);
                let px = buf[y * 8 + x];
                assert_eq!(px == 0xffff_ffff, expect, "({}, {}) = {:08x}", x, y, px);
            }
        }
        for x in 0..8 {
            assert_eq!(buf[2 * 8 + x], 0);
            assert_eq!(buf[5 * 8 + x], 0);
        }
    }

    #[test]
    fn test_s5_clip_path_intersection() {
        let engine = Engine::init(0);
        let mut renderer = Renderer::new(&engine);
        renderer.target(12, 12, Colorspace::Argb8888).unwrap();

        let clip_shape = rect_shape(3.0, 3.0, 6.0, 6.0);
        let clip_data = renderer
            .prepare_shape(&clip_shape, None, None, 255, &[], UpdateFlags::ALL)
            .unwrap();

        let shape = rect_shape(0.0, 0.0, 6.0, 6.0);
        let data = renderer
            .prepare_shape(&shape, None, None, 255, &[clip_data], UpdateFlags::ALL)
            .unwrap();

        renderer.pre_render().unwrap();
        let mut buf = vec![0u32; 144];
        let mut surface = Surface::new(&mut buf, 12, 12, 12, Colorspace::Argb8888).unwrap();
        renderer.render_shape(&data, &mut surface).unwrap();
        renderer.sync(&mut surface).unwrap();

        for y in 0..12 {
            for x in 0..12 {
                let lit = buf[y * 12 + x] != 0;
                let expect = (3..6).contains(&x) && (3..6).contains(&y);
                assert_eq!(lit, expect, "pixel ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_s6_empty_path_renders_nothing() {
        let engine = Engine::init(0);
        let mut renderer = Renderer::new(&engine);
        renderer.target(4, 4, Colorspace::Argb8888).unwrap();

        let mut shape = Shape::new();
        shape.set_fill(white());

        let mut buf = vec![0u32; 16];
        frame(&mut renderer, &[&shape], &mut buf, 4, 4);
        assert!(buf.iter().all(|&p| p == 0));
    }

    #[test]
    fn test_parallel_prepare_matches_synchronous() {
        let shapes: Vec<Shape> = (0..6)
            .map(|i| rect_shape(i as f32, i as f32, 5.0, 5.0))
            .collect();
        let shape_refs: Vec<&Shape> = shapes.iter().collect();

        let render_with = |threads: usize| -> Vec<u32> {
            let engine = Engine::init(threads);
            let mut renderer = Renderer::new(&engine);
            renderer.target(16, 16, Colorspace::Argb8888).unwrap();
            let mut buf = vec![0u32; 256];
            frame(&mut renderer, &shape_refs, &mut buf, 16, 16);
            buf
        };

        assert_eq!(render_with(0), render_with(3));
    }

    #[test]
    fn test_prepare_reuse_with_empty_flags() {
        let engine = Engine::init(0);
        let mut renderer = Renderer::new(&engine);
        renderer.target(8, 8, Colorspace::Argb8888).unwrap();

        let shape = rect_shape(0.0, 0.0, 4.0, 4.0);
        let d1 = renderer
            .prepare_shape(&shape, None, None, 255, &[], UpdateFlags::ALL)
            .unwrap();
        renderer.pre_render().unwrap();
        let b1 = d1.bbox();

        // second frame: nothing changed
        let d2 = renderer
            .prepare_shape(&shape, Some(d1), None, 255, &[], UpdateFlags::empty())
            .unwrap();
        renderer.pre_render().unwrap();
        assert_eq!(d2.bbox(), b1);
    }

    #[test]
    fn test_prepare_sees_fresh_data_after_change() {
        // A re-prepared shape renders from its new geometry only.
        let engine = Engine::init(0);
        let mut renderer = Renderer::new(&engine);
        renderer.target(8, 8, Colorspace::Argb8888).unwrap();

        let shape = rect_shape(0.0, 0.0, 2.0, 2.0);
        let d = renderer
            .prepare_shape(&shape, None, None, 255, &[], UpdateFlags::ALL)
            .unwrap();
        renderer.pre_render().unwrap();

        let moved = rect_shape(5.0, 5.0, 2.0, 2.0);
        let d = renderer
            .prepare_shape(&moved, Some(d), None, 255, &[], UpdateFlags::PATH)
            .unwrap();
        renderer.pre_render().unwrap();

        let mut buf = vec![0u32; 64];
        let mut surface = Surface::new(&mut buf, 8, 8, 8, Colorspace::Argb8888).unwrap();
        renderer.render_shape(&d, &mut surface).unwrap();
        renderer.sync(&mut surface).unwrap();

        assert_eq!(buf[0], 0, "old position untouched");
        assert_eq!(buf[6 * 8 + 6], 0xffff_ffff, "new position lit");
    }

    #[test]
    fn test_region_query() {
        let engine = Engine::init(0);
        let mut renderer = Renderer::new(&engine);
        renderer.target(16, 16, Colorspace::Argb8888).unwrap();

        let shape = rect_shape(2.0, 3.0, 4.0, 5.0);
        let d = renderer
            .prepare_shape(&shape, None, None, 255, &[], UpdateFlags::ALL)
            .unwrap();
        assert_eq!(renderer.region(&d).unwrap(), (2, 3, 4, 5));
    }

    #[test]
    fn test_composite_opacity() {
        let engine = Engine::init(0);
        let mut renderer = Renderer::new(&engine);
        renderer.target(4, 4, Colorspace::Argb8888).unwrap();

        let shape = rect_shape(0.0, 0.0, 4.0, 4.0);
        let d = renderer
            .prepare_shape(&shape, None, None, 255, &[], UpdateFlags::ALL)
            .unwrap();
        renderer.pre_render().unwrap();

        let mut buf = vec![0u32; 16];
        let mut surface = Surface::new(&mut buf, 4, 4, 4, Colorspace::Argb8888).unwrap();
        renderer.begin_composite(CompositeMethod::None, 128).unwrap();
        renderer.render_shape(&d, &mut surface).unwrap();
        renderer.end_composite(&mut surface).unwrap();
        renderer.sync(&mut surface).unwrap();

        let a = buf[5] >> 24;
        assert!((127..=129).contains(&a), "alpha = {}", a);
    }

    #[test]
    fn test_composite_alpha_mask_erases() {
        let engine = Engine::init(0);
        let mut renderer = Renderer::new(&engine);
        renderer.target(8, 8, Colorspace::Argb8888).unwrap();

        let base = rect_shape(0.0, 0.0, 8.0, 8.0);
        let mask = rect_shape(0.0, 0.0, 4.0, 8.0);
        let base_d = renderer
            .prepare_shape(&base, None, None, 255, &[], UpdateFlags::ALL)
            .unwrap();
        let mask_d = renderer
            .prepare_shape(&mask, None, None, 255, &[], UpdateFlags::ALL)
            .unwrap();
        renderer.pre_render().unwrap();

        let mut buf = vec![0u32; 64];
        let mut surface = Surface::new(&mut buf, 8, 8, 8, Colorspace::Argb8888).unwrap();
        renderer.render_shape(&base_d, &mut surface).unwrap();
        renderer
            .begin_composite(CompositeMethod::AlphaMask, 255)
            .unwrap();
        renderer.render_shape(&mask_d, &mut surface).unwrap();
        renderer.end_composite(&mut surface).unwrap();
        renderer.sync(&mut surface).unwrap();

        assert_eq!(buf[8 * 2 + 1], 0, "masked half erased");
        assert_eq!(buf[8 * 2 + 6], 0xffff_ffff, "unmasked half kept");
    }

    #[test]
    fn test_clear_resets_surface() {
        let engine = Engine::init(0);
        let mut renderer = Renderer::new(&engine);
        renderer.target(4, 4, Colorspace::Argb8888).unwrap();

        let shape = rect_shape(0.0, 0.0, 4.0, 4.0);
        let mut buf = vec![0u32; 16];
        frame(&mut renderer, &[&shape], &mut buf, 4, 4);
        assert_ne!(buf[0], 0);

        let mut surface = Surface::new(&mut buf, 4, 4, 4, Colorspace::Argb8888).unwrap();
        renderer.clear(&mut surface).unwrap();
        assert!(buf.iter().all(|&p| p == 0));
    }

    #[test]
    fn test_render_image_scaled() {
        let engine = Engine::init(0);
        let mut renderer = Renderer::new(&engine);
        renderer.target(8, 8, Colorspace::Argb8888).unwrap();

        let mut picture = Picture::new();
        picture.load(vec![0xff11_2233; 16], 4, 4).unwrap();

        let mut rt = RenderTransform::new();
        rt.scale = 2.0;
        assert!(rt.update());

        let d = renderer
            .prepare_picture(&picture, None, Some(&rt), 255, &[], UpdateFlags::ALL)
            .unwrap();
        renderer.pre_render().unwrap();

        let mut buf = vec![0u32; 64];
        let mut surface = Surface::new(&mut buf, 8, 8, 8, Colorspace::Argb8888).unwrap();
        renderer.render_image(&d, &mut surface).unwrap();
        renderer.sync(&mut surface).unwrap();

        assert_eq!(buf[4 * 8 + 4], 0xff11_2233, "scaled image covers 8x8");
    }

    #[test]
    fn test_unloaded_picture_prepare_fails() {
        let engine = Engine::init(0);
        let mut renderer = Renderer::new(&engine);
        renderer.target(8, 8, Colorspace::Argb8888).unwrap();
        let picture = Picture::new();
        assert_eq!(
            renderer
                .prepare_picture(&picture, None, None, 255, &[], UpdateFlags::ALL)
                .err(),
            Some(Error::InsufficientCondition)
        );
    }

    #[test]
    fn test_prepare_without_target_fails() {
        let engine = Engine::init(0);
        let mut renderer = Renderer::new(&engine);
        let shape = rect_shape(0.0, 0.0, 4.0, 4.0);
        assert_eq!(
            renderer
                .prepare_shape(&shape, None, None, 255, &[], UpdateFlags::ALL)
                .err(),
            Some(Error::InsufficientCondition)
        );
    }

    #[test]
    fn test_surface_mismatch_rejected() {
        let engine = Engine::init(0);
        let mut renderer = Renderer::new(&engine);
        renderer.target(8, 8, Colorspace::Argb8888).unwrap();
        let shape = rect_shape(0.0, 0.0, 4.0, 4.0);
        let d = renderer
            .prepare_shape(&shape, None, None, 255, &[], UpdateFlags::ALL)
            .unwrap();
        renderer.pre_render().unwrap();

        let mut buf = vec![0u32; 16];
        let mut wrong = Surface::new(&mut buf, 4, 4, 4, Colorspace::Argb8888).unwrap();
        assert_eq!(
            renderer.render_shape(&d, &mut wrong).err(),
            Some(Error::InvalidArguments)
        );
    }

    #[test]
    fn test_dispose_removes_task() {
        let engine = Engine::init(0);
        let mut renderer = Renderer::new(&engine);
        renderer.target(8, 8, Colorspace::Argb8888).unwrap();
        let shape = rect_shape(0.0, 0.0, 4.0, 4.0);
        let d = renderer
            .prepare_shape(&shape, None, None, 255, &[], UpdateFlags::ALL)
            .unwrap();
        renderer.dispose(&d);
        assert!(renderer.tasks.is_empty());
    }
}

//! Outline to run-length coverage spans.
//!
//! The rasterizer walks a flattened outline edge by edge, accumulating
//! signed cover/area pairs in a sparse per-scanline cell grid, then sweeps
//! each scanline left to right to emit anti-aliased spans. The cell grid
//! lives in a fixed-size arena; when a band of scanlines produces more
//! cells than the arena holds, the band is bisected and retried, so memory
//! stays bounded no matter how complex the outline is.

use arrayvec::ArrayVec;

use crate::basics::{
    subpixels, trunc, BBox, Coord, FillRule, Size, SubPoint, ONE_PIXEL, PIXEL_BITS,
};
use crate::curve::{cubic_needs_split, split_cubic, ARC_STACK_LEN};
use crate::error::{Error, Result};
use crate::outline::{Outline, PointType};

// ============================================================================
// Span / Rle
// ============================================================================

/// One run of horizontally adjacent pixels with uniform coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub x: i16,
    pub y: i16,
    pub len: u16,
    pub coverage: u8,
}

/// Run-length encoded coverage, sorted by (y, x).
///
/// Span storage is reused across re-generations: `reset` drops the spans
/// but keeps the allocation, so a shape that re-flattens every frame does
/// not churn the allocator.
#[derive(Debug, Clone, Default)]
pub struct Rle {
    pub spans: Vec<Span>,
}

impl Rle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.spans.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Bounding box of the spans in whole pixels (max exclusive).
    pub fn bbox(&self) -> Option<BBox> {
        if self.spans.is_empty() {
            return None;
        }
        let mut min_x = Coord::MAX;
        let mut max_x = Coord::MIN;
        let min_y = self.spans.first().unwrap().y as Coord;
        let max_y = self.spans.last().unwrap().y as Coord + 1;
        for s in &self.spans {
            min_x = min_x.min(s.x as Coord);
            max_x = max_x.max(s.x as Coord + s.len as Coord);
        }
        Some(BBox::new(min_x, min_y, max_x, max_y))
    }
}

// ============================================================================
// Cell grid
// ============================================================================

/// Scratch memory budget for one band, in bytes.
const RENDER_POOL_SIZE: usize = 16384;

/// Capacity of the bounded span accumulation buffer.
const MAX_SPANS: usize = 256;

/// Maximum number of band subdivisions held at once.
const BAND_STACK: usize = 40;

/// Initial band height in scanlines.
pub const DEFAULT_BAND_SIZE: Coord = 40;

/// Band height floor for the adaptive tuner.
const MIN_BAND_SIZE: Coord = 16;

/// Overflow count after which the band size is halved for later frames.
const BAND_SHOOT_LIMIT: u32 = 8;

#[derive(Debug, Clone, Copy)]
struct Cell {
    x: Coord,
    cover: i32,
    area: i64,
    /// Index of the next cell on this scanline, -1 for none.
    next: i32,
}

/// Cost model matching the shared byte budget: each band partitions the
/// pool into one row-head slot per scanline plus the cell arena.
const CELL_SIZE: usize = core::mem::size_of::<Cell>();
const HEAD_SIZE: usize = core::mem::size_of::<usize>();

/// Non-local exit of the cell scanner: the arena is full, the band must
/// be bisected and retried.
struct CellOverflow;

enum BandError {
    Overflow,
    InvalidOutline,
}

// ============================================================================
// RleWorker
// ============================================================================

struct RleWorker<'a> {
    rle: &'a mut Rle,
    outline: &'a Outline,

    /// Current cell, relative to `cell_min`.
    cell_pos: SubPoint,
    cell_min: SubPoint,
    cell_max: SubPoint,
    x_cnt: Coord,
    y_cnt: Coord,

    area: i64,
    cover: i32,

    cells: Vec<Cell>,
    max_cells: usize,
    y_heads: Vec<i32>,

    /// Current position in 24.8.
    pos: SubPoint,

    spans: ArrayVec<Span, MAX_SPANS>,
    y_span: Coord,

    clip: Size,
    invalid: bool,
    anti_alias: bool,
}

impl RleWorker<'_> {
    // ------------------------------------------------------------------
    // Span emission
    // ------------------------------------------------------------------

    fn flush_spans(&mut self) {
        self.rle.spans.extend(self.spans.drain(..));
        self.y_span = Coord::MIN;
    }

    /// Emit one horizontal coverage run at cell coordinates (`x`, `y`)
    /// relative to `cell_min`, with raw accumulated `area`.
    fn horiz_line(&mut self, x: Coord, y: Coord, area: i64, acount: Coord) {
        let x = x + self.cell_min.x;
        let y = y + self.cell_min.y;

        if y < 0 || y >= self.clip.h {
            return;
        }

        // Coverage percentage is area / (ONE_PIXEL * ONE_PIXEL * 2),
        // rescaled to 0..=256.
        let mut coverage = (area >> (PIXEL_BITS * 2 + 1 - 8)) as i32;
        if coverage < 0 {
            coverage = -coverage;
        }

        match self.outline.fill_rule {
            FillRule::EvenOdd => {
                coverage &= 511;
                if coverage > 256 {
                    coverage = 512 - coverage;
                } else if coverage == 256 {
                    coverage = 255;
                }
            }
            FillRule::NonZero => {
                if coverage >= 256 {
                    coverage = 255;
                }
            }
        }

        // Spans carry i16 coordinates.
        let x = if x >= i16::MAX as Coord {
            log::warn!("rle: span x coordinate overflow, clamping");
            i16::MAX as Coord
        } else {
            x
        };
        let y = if y >= i16::MAX as Coord {
            log::warn!("rle: span y coordinate overflow, clamping");
            i16::MAX as Coord
        } else {
            y
        };

        if coverage <= 0 {
            return;
        }
        let coverage = if self.anti_alias { coverage } else { 255 };

        // Extend the previous span when it is adjacent and identical.
        if let Some(last) = self.spans.last_mut() {
            if self.y_span == y
                && last.x as Coord + last.len as Coord == x
                && last.coverage as i32 == coverage
            {
                let mut x_over: Coord = 0;
                if x + acount >= self.clip.w {
                    x_over -= x + acount - self.clip.w;
                }
                if x < 0 {
                    x_over += x;
                }
                let add = acount + x_over;
                if add > 0 {
                    last.len += add as u16;
                }
                return;
            }
        }

        if self.spans.is_full() {
            self.flush_spans();
        }

        let mut x = x;
        let mut x_over: Coord = 0;
        if x + acount >= self.clip.w {
            x_over -= x + acount - self.clip.w;
        }
        if x < 0 {
            x_over += x;
            x = 0;
        }

        // Nothing visible after clipping.
        if acount + x_over <= 0 {
            return;
        }

        self.spans.push(Span {
            x: x as i16,
            y: y as i16,
            len: (acount + x_over) as u16,
            coverage: coverage as u8,
        });
        self.y_span = y;
    }

    fn sweep(&mut self) {
        if self.cells.is_empty() {
            return;
        }

        self.spans.clear();
        self.y_span = Coord::MIN;

        for y in 0..self.y_cnt {
            let mut cover: i32 = 0;
            let mut x: Coord = 0;
            let mut cur = self.y_heads[y as usize];

            while cur >= 0 {
                let cell = self.cells[cur as usize];

                if cell.x > x && cover != 0 {
                    self.horiz_line(x, y, cover as i64 * (ONE_PIXEL as i64 * 2), cell.x - x);
                }
                cover += cell.cover;
                let area = cover as i64 * (ONE_PIXEL as i64 * 2) - cell.area;
                if area != 0 && cell.x >= 0 {
                    self.horiz_line(cell.x, y, area, 1);
                }

                x = cell.x + 1;
                cur = cell.next;
            }

            if cover != 0 {
                self.horiz_line(x, y, cover as i64 * (ONE_PIXEL as i64 * 2), self.x_cnt - x);
            }
        }

        if !self.spans.is_empty() {
            self.flush_spans();
        }
    }

    // ------------------------------------------------------------------
    // Cell bookkeeping
    // ------------------------------------------------------------------

    fn find_cell(&mut self) -> core::result::Result<usize, CellOverflow> {
        let x = self.cell_pos.x.min(self.x_cnt);
        let row = self.cell_pos.y as usize;

        let mut prev: i32 = -1;
        let mut cur = self.y_heads[row];
        while cur >= 0 {
            let c = &self.cells[cur as usize];
            if c.x == x {
                return Ok(cur as usize);
            }
            if c.x > x {
                break;
            }
            prev = cur;
            cur = c.next;
        }

        if self.cells.len() >= self.max_cells {
            return Err(CellOverflow);
        }

        let idx = self.cells.len();
        self.cells.push(Cell {
            x,
            cover: 0,
            area: 0,
            next: cur,
        });
        if prev >= 0 {
            self.cells[prev as usize].next = idx as i32;
        } else {
            self.y_heads[row] = idx as i32;
        }
        Ok(idx)
    }

    fn record_cell(&mut self) -> core::result::Result<(), CellOverflow> {
        if self.area != 0 || self.cover != 0 {
            let idx = self.find_cell()?;
            let cell = &mut self.cells[idx];
            cell.area += self.area;
            cell.cover += self.cover;
        }
        Ok(())
    }

    /// Move to the cell containing the whole-pixel position `pos`.
    ///
    /// Cells left of the active window collapse onto x = -1; cells outside
    /// the band's rows mark the worker invalid so their accumulation is
    /// discarded rather than recorded.
    fn set_cell(&mut self, pos: SubPoint) -> core::result::Result<(), CellOverflow> {
        let mut pos = pos;
        pos.y -= self.cell_min.y;
        if pos.x > self.cell_max.x {
            pos.x = self.cell_max.x;
        }
        pos.x -= self.cell_min.x;
        if pos.x < 0 {
            pos.x = -1;
        }

        if pos != self.cell_pos {
            if !self.invalid {
                self.record_cell()?;
            }
            self.area = 0;
            self.cover = 0;
        }

        self.cell_pos = pos;
        self.invalid = (pos.y as u32) >= self.y_cnt as u32 || pos.x >= self.x_cnt;
        Ok(())
    }

    fn start_cell(&mut self, pos: SubPoint) -> core::result::Result<(), CellOverflow> {
        let mut pos = pos;
        if pos.x > self.cell_max.x {
            pos.x = self.cell_max.x;
        }
        if pos.x < self.cell_min.x {
            pos.x = self.cell_min.x;
        }

        self.area = 0;
        self.cover = 0;
        self.cell_pos = pos - self.cell_min;
        self.invalid = false;

        self.set_cell(pos)
    }

    // ------------------------------------------------------------------
    // Edge scanner
    // ------------------------------------------------------------------

    fn move_to(&mut self, to: SubPoint) -> core::result::Result<(), CellOverflow> {
        if !self.invalid {
            self.record_cell()?;
        }
        self.start_cell(to.trunc())?;
        self.pos = to;
        Ok(())
    }

    fn line_to(&mut self, to: SubPoint) -> core::result::Result<(), CellOverflow> {
        let e1 = self.pos.trunc();
        let e2 = to.trunc();

        // Entirely above or below the band: only the position moves.
        if (e1.y >= self.cell_max.y && e2.y >= self.cell_max.y)
            || (e1.y < self.cell_min.y && e2.y < self.cell_min.y)
        {
            self.pos = to;
            return Ok(());
        }

        let diff = to - self.pos;
        let mut f1 = self.pos - e1.subpixels();
        let mut f2;
        let mut e1 = e1;

        if e1 == e2 {
            // Stays inside one cell; the tail accumulation below covers it.
        } else if diff.y == 0 {
            // Horizontal: jump straight to the destination cell.
            e1.x = e2.x;
            self.set_cell(e1)?;
        } else if diff.x == 0 {
            // Vertical: one cell per row, full fractional x.
            if diff.y > 0 {
                loop {
                    f2 = SubPoint::new(f1.x, ONE_PIXEL);
                    self.cover += f2.y - f1.y;
                    self.area += (f2.y - f1.y) as i64 * (f1.x as i64 * 2);
                    f1.y = 0;
                    e1.y += 1;
                    self.set_cell(e1)?;
                    if e1.y == e2.y {
                        break;
                    }
                }
            } else {
                loop {
                    f2 = SubPoint::new(f1.x, 0);
                    self.cover += f2.y - f1.y;
                    self.area += (f2.y - f1.y) as i64 * (f1.x as i64 * 2);
                    f1.y = ONE_PIXEL;
                    e1.y -= 1;
                    self.set_cell(e1)?;
                    if e1.y == e2.y {
                        break;
                    }
                }
            }
        } else {
            // General case: walk cell to cell, choosing the exit side by
            // the sign of the edge function `prod`.
            let mut prod = diff.x as i64 * f1.y as i64 - diff.y as i64 * f1.x as i64;

            // Reciprocals turn the per-step divisions into mul+shift.
            let dx_r = udiv_prep(diff.x);
            let dy_r = udiv_prep(diff.y);

            let px = diff.x as i64 * ONE_PIXEL as i64;
            let py = diff.y as i64 * ONE_PIXEL as i64;

            loop {
                if prod <= 0 && prod - px > 0 {
                    // left
                    f2 = SubPoint::new(0, udiv(-prod, -dx_r));
                    prod -= py;
                    self.cover += f2.y - f1.y;
                    self.area += (f2.y - f1.y) as i64 * (f1.x + f2.x) as i64;
                    f1 = SubPoint::new(ONE_PIXEL, f2.y);
                    e1.x -= 1;
                } else if prod - px <= 0 && prod - px + py > 0 {
                    // up
                    prod -= px;
                    f2 = SubPoint::new(udiv(-prod, dy_r), ONE_PIXEL);
                    self.cover += f2.y - f1.y;
                    self.area += (f2.y - f1.y) as i64 * (f1.x + f2.x) as i64;
                    f1 = SubPoint::new(f2.x, 0);
                    e1.y += 1;
                } else if prod - px + py <= 0 && prod + py >= 0 {
                    // right
                    prod += py;
                    f2 = SubPoint::new(ONE_PIXEL, udiv(prod, dx_r));
                    self.cover += f2.y - f1.y;
                    self.area += (f2.y - f1.y) as i64 * (f1.x + f2.x) as i64;
                    f1 = SubPoint::new(0, f2.y);
                    e1.x += 1;
                } else {
                    // down
                    f2 = SubPoint::new(udiv(prod, -dy_r), 0);
                    prod += px;
                    self.cover += f2.y - f1.y;
                    self.area += (f2.y - f1.y) as i64 * (f1.x + f2.x) as i64;
                    f1 = SubPoint::new(f2.x, ONE_PIXEL);
                    e1.y -= 1;
                }

                self.set_cell(e1)?;
                if e1 == e2 {
                    break;
                }
            }
        }

        f2 = SubPoint::new(to.x - subpixels(e2.x), to.y - subpixels(e2.y));
        self.cover += f2.y - f1.y;
        self.area += (f2.y - f1.y) as i64 * (f1.x + f2.x) as i64;
        self.pos = to;
        Ok(())
    }

    fn cubic_to(
        &mut self,
        ctrl1: SubPoint,
        ctrl2: SubPoint,
        to: SubPoint,
    ) -> core::result::Result<(), CellOverflow> {
        let mut arc = [SubPoint::default(); ARC_STACK_LEN];
        arc[0] = to;
        arc[1] = ctrl2;
        arc[2] = ctrl1;
        arc[3] = self.pos;

        // Arc entirely outside the band's rows: a straight jump keeps the
        // position and winding bookkeeping without subdividing.
        let mut min = arc[0].y;
        let mut max = arc[0].y;
        for p in &arc[1..4] {
            min = min.min(p.y);
            max = max.max(p.y);
        }
        if trunc(min) >= self.cell_max.y || trunc(max) < self.cell_min.y {
            return self.line_to(to);
        }

        let mut base = 0usize;
        loop {
            if cubic_needs_split(&arc[base..base + 4]) && base + 7 <= ARC_STACK_LEN {
                split_cubic(&mut arc[base..]);
                base += 3;
                continue;
            }
            self.line_to(arc[base])?;
            if base == 0 {
                return Ok(());
            }
            base -= 3;
        }
    }

    // ------------------------------------------------------------------
    // Outline decomposition
    // ------------------------------------------------------------------

    fn decompose_outline(&mut self) -> core::result::Result<(), BandError> {
        let outline = self.outline;

        for (first, last) in outline.contours() {
            let pts = &outline.points;
            let types = &outline.types;

            if types[first] == PointType::Cubic {
                return Err(BandError::InvalidOutline);
            }

            let start = pts[first].upscale();
            self.move_to(start).map_err(|_| BandError::Overflow)?;

            let mut closed_by_curve = false;
            let mut i = first + 1;
            while i <= last {
                match types[i] {
                    PointType::Line => {
                        self.line_to(pts[i].upscale())
                            .map_err(|_| BandError::Overflow)?;
                        i += 1;
                    }
                    PointType::Cubic => {
                        if i + 1 > last || types[i + 1] != PointType::Cubic {
                            return Err(BandError::InvalidOutline);
                        }
                        let c1 = pts[i].upscale();
                        let c2 = pts[i + 1].upscale();
                        if i + 2 <= last {
                            self.cubic_to(c1, c2, pts[i + 2].upscale())
                                .map_err(|_| BandError::Overflow)?;
                            i += 3;
                        } else {
                            // Control pair runs to the contour end: the
                            // endpoint wraps to the contour start.
                            self.cubic_to(c1, c2, start)
                                .map_err(|_| BandError::Overflow)?;
                            closed_by_curve = true;
                            break;
                        }
                    }
                }
            }

            if !closed_by_curve {
                self.line_to(start).map_err(|_| BandError::Overflow)?;
            }
        }
        Ok(())
    }

    fn gen_band(&mut self) -> core::result::Result<(), BandError> {
        self.decompose_outline()?;
        if !self.invalid {
            self.record_cell().map_err(|_| BandError::Overflow)?;
        }
        Ok(())
    }
}

// ============================================================================
// Reciprocal division helpers
// ============================================================================

/// Reciprocal of `d` scaled so `udiv` reduces to a multiply and shift.
#[inline]
fn udiv_prep(d: Coord) -> i64 {
    ((u64::MAX >> PIXEL_BITS) as i64) / d as i64
}

/// `a / divisor` where `inv = udiv_prep(divisor)`; both operands must be
/// non-negative and `a` bounded by `divisor << PIXEL_BITS`.
#[inline]
fn udiv(a: i64, inv: i64) -> Coord {
    ((a as u64).wrapping_mul(inv as u64) >> (64 - PIXEL_BITS as u32)) as Coord
}

// ============================================================================
// Entry point
// ============================================================================

/// Rasterize `outline` into `rle`.
///
/// `bbox` is the outline's pixel bounding box (the cell window), `viewport`
/// the surface region spans are clipped to. `band_size` is the adaptive
/// band height carried between frames; it is halved in place after
/// repeated arena overflows.
///
/// Previous span contents of `rle` are discarded but the allocation is
/// kept.
pub fn rle_render(
    rle: &mut Rle,
    outline: &Outline,
    bbox: &BBox,
    viewport: &BBox,
    anti_alias: bool,
    band_size: &mut Coord,
) -> Result<()> {
    rle.reset();

    if outline.is_empty() || bbox.is_empty() {
        return Ok(());
    }

    let clip = Size::new(viewport.width(), viewport.height());
    if clip.w <= 0 || clip.h <= 0 {
        return Ok(());
    }

    let mut rw = RleWorker {
        rle,
        outline,
        cell_pos: SubPoint::default(),
        cell_min: bbox.min,
        cell_max: bbox.max,
        x_cnt: bbox.width(),
        y_cnt: 0,
        area: 0,
        cover: 0,
        cells: Vec::new(),
        max_cells: 0,
        y_heads: Vec::new(),
        pos: SubPoint::default(),
        spans: ArrayVec::new(),
        y_span: Coord::MIN,
        clip,
        invalid: true,
        anti_alias,
    };

    let mut band_shoot: u32 = 0;

    if *band_size < 1 {
        *band_size = 1;
    }
    let mut band_cnt = bbox.height() / *band_size;
    if band_cnt == 0 {
        band_cnt = 1;
    } else if band_cnt >= BAND_STACK as Coord {
        band_cnt = BAND_STACK as Coord - 1;
    }

    let y_min = bbox.min.y;
    let y_max = bbox.max.y;
    let mut min = y_min;

    for n in 0..band_cnt {
        let mut max = min + *band_size;
        if n == band_cnt - 1 || max > y_max {
            max = y_max;
        }

        let mut bands: ArrayVec<(Coord, Coord), BAND_STACK> = ArrayVec::new();
        bands.push((min, max));

        while let Some((bottom, top)) = bands.pop() {
            let y_cnt = top - bottom;

            // Partition the pool: one row head per scanline, cells after.
            let head_bytes = HEAD_SIZE * y_cnt as usize;
            let head_bytes = head_bytes + (CELL_SIZE - head_bytes % CELL_SIZE) % CELL_SIZE;
            let max_cells = RENDER_POOL_SIZE.saturating_sub(head_bytes) / CELL_SIZE;

            if max_cells >= 2 {
                rw.y_heads.clear();
                rw.y_heads.resize(y_cnt as usize, -1);
                rw.cells.clear();
                rw.cells.reserve(max_cells);
                rw.max_cells = max_cells;
                rw.area = 0;
                rw.cover = 0;
                rw.invalid = true;
                rw.cell_min.y = bottom;
                rw.cell_max.y = top;
                rw.y_cnt = y_cnt;

                match rw.gen_band() {
                    Ok(()) => {
                        rw.sweep();
                        continue;
                    }
                    Err(BandError::InvalidOutline) => {
                        log::warn!("rle: invalid outline, shape skipped");
                        rw.rle.reset();
                        return Err(Error::InvalidArguments);
                    }
                    Err(BandError::Overflow) => {}
                }
            }

            // Arena overflow: bisect the band and retry the upper half
            // first.
            let middle = bottom + ((top - bottom) >> 1);
            if middle == bottom {
                // A single scanline exceeded the arena.
                rw.rle.reset();
                return Err(Error::FailedAllocation);
            }
            if top - bottom >= *band_size {
                band_shoot += 1;
            }
            log::trace!("rle: cell arena overflow, bisecting band {}..{}", bottom, top);
            bands.push((middle, top));
            bands.push((bottom, middle));
        }

        min = max;
    }

    if band_shoot > BAND_SHOOT_LIMIT && *band_size > MIN_BAND_SIZE {
        *band_size >>= 1;
        log::debug!("rle: band size reduced to {}", band_size);
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

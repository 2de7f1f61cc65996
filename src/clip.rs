//! Span-space clipping.
//!
//! All three operations are merge walks over sorted span lists: no bitmap
//! is ever materialized. Each builds a fresh span vector and replaces the
//! target's storage wholesale on success; an empty target or clip input is
//! a no-op.

use crate::basics::{BBox, Coord};
use crate::rle::{Rle, Span};

/// Clip `rle` to the pixel rectangle `bbox` (min inclusive, max exclusive).
/// Coverage is unchanged.
pub fn clip_rect(rle: &mut Rle, bbox: &BBox) {
    if rle.is_empty() {
        return;
    }

    let min_x = bbox.min.x;
    let min_y = bbox.min.y;
    let max_x = bbox.max.x - 1;
    let max_y = bbox.max.y - 1;

    let mut out: Vec<Span> = Vec::with_capacity(rle.spans.len());

    for s in &rle.spans {
        let y = s.y as Coord;
        if y > max_y {
            break;
        }
        let sx = s.x as Coord;
        let sx2 = sx + s.len as Coord;
        if y < min_y || sx > max_x || sx2 <= min_x {
            continue;
        }
        let x = sx.max(min_x);
        let len = sx2.min(max_x + 1) - x;
        if len > 0 {
            out.push(Span {
                x: x as i16,
                y: s.y,
                len: len as u16,
                coverage: s.coverage,
            });
        }
    }

    log::trace!("clip: rect {} -> {} spans", rle.spans.len(), out.len());
    rle.spans = out;
}

/// Intersect `rle` with the clip region `clip`: only the overlap survives,
/// with coverage `(cov · clip_cov) >> 8`.
pub fn clip_path(rle: &mut Rle, clip: &Rle) {
    if rle.is_empty() || clip.is_empty() {
        return;
    }

    let mut out: Vec<Span> = Vec::with_capacity(rle.spans.len().max(clip.spans.len()));

    let spans = &rle.spans;
    let clips = &clip.spans;
    let mut i = 0;
    let mut j = 0;

    while i < spans.len() && j < clips.len() {
        let s = spans[i];
        let c = clips[j];

        if c.y > s.y {
            i += 1;
            continue;
        }
        if s.y != c.y {
            j += 1;
            continue;
        }

        let sx1 = s.x as Coord;
        let sx2 = sx1 + s.len as Coord;
        let cx1 = c.x as Coord;
        let cx2 = cx1 + c.len as Coord;

        if cx2 <= sx1 {
            j += 1;
            continue;
        }
        if sx2 <= cx1 {
            i += 1;
            continue;
        }

        let x = sx1.max(cx1);
        let len = sx2.min(cx2) - x;
        if len > 0 {
            out.push(Span {
                x: x as i16,
                y: s.y,
                len: len as u16,
                coverage: ((s.coverage as u32 * c.coverage as u32) >> 8) as u8,
            });
        }

        if sx2 < cx2 {
            i += 1;
        } else {
            j += 1;
        }
    }

    log::trace!("clip: path {} -> {} spans", rle.spans.len(), out.len());
    rle.spans = out;
}

/// Subtract `mask` from `rle`: wherever a mask span covers the target,
/// the covered range is erased and the side strips keep the target's
/// coverage. Scanlines outside the mask's y extent pass through unchanged.
pub fn alpha_mask(rle: &mut Rle, mask: &Rle) {
    if rle.is_empty() || mask.is_empty() {
        return;
    }

    // The mask's y extent is taken over every mask span; spans on
    // scanline 0 participate like any other.
    let mask_min_y = mask.spans.iter().map(|s| s.y).min().unwrap();
    let mask_max_y = mask.spans.iter().map(|s| s.y).max().unwrap();

    let mut out: Vec<Span> = Vec::with_capacity(rle.spans.len() + mask.spans.len());
    let masks = &mask.spans;
    let mut cursor = 0usize;

    for s in &rle.spans {
        if s.y < mask_min_y || s.y > mask_max_y {
            out.push(*s);
            continue;
        }

        // Advance to the first mask span on this scanline.
        while cursor < masks.len() && masks[cursor].y < s.y {
            cursor += 1;
        }

        let mut x = s.x as Coord;
        let end = s.x as Coord + s.len as Coord;
        let mut j = cursor;
        while j < masks.len() && masks[j].y == s.y {
            let m = masks[j];
            let mx1 = m.x as Coord;
            let mx2 = mx1 + m.len as Coord;
            j += 1;
            if mx2 <= x {
                continue;
            }
            if mx1 >= end {
                break;
            }
            if mx1 > x {
                out.push(Span {
                    x: x as i16,
                    y: s.y,
                    len: (mx1 - x) as u16,
                    coverage: s.coverage,
                });
            }
            x = x.max(mx2);
        }
        if x < end {
            out.push(Span {
                x: x as i16,
                y: s.y,
                len: (end - x) as u16,
                coverage: s.coverage,
            });
        }
    }

    log::trace!("clip: mask {} -> {} spans", rle.spans.len(), out.len());
    rle.spans = out;
}

// ============================================================================
// Tests
// ============================================================================

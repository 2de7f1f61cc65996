//! Per-worker scratch outlines.
//!
//! Each worker thread gets a fill outline, a stroke outline, and its
//! adaptive band-size slot, indexed by worker id. Slots are partitioned by
//! worker index and never contended; the mutex exists to satisfy the
//! borrow checker across threads, not to arbitrate. Buffers grow
//! monotonically across frames and are only released by `clear`/`term`.

use crate::basics::Coord;
use crate::outline::Outline;
use crate::rle::DEFAULT_BAND_SIZE;
use std::sync::{Mutex, MutexGuard};

/// One worker's scratch state.
#[derive(Debug)]
pub struct Scratch {
    pub outline: Outline,
    pub stroke_outline: Outline,
    pub band_size: Coord,
}

impl Default for Scratch {
    fn default() -> Self {
        Self {
            outline: Outline::new(),
            stroke_outline: Outline::new(),
            band_size: DEFAULT_BAND_SIZE,
        }
    }
}

/// The pool: `max(threads, 1)` scratch slots.
#[derive(Debug)]
pub struct MemPool {
    slots: Vec<Mutex<Scratch>>,
}

impl MemPool {
    pub fn new(threads: usize) -> Self {
        let n = threads.max(1);
        Self {
            slots: (0..n).map(|_| Mutex::new(Scratch::default())).collect(),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Check out the scratch slot for worker `idx`. The outlines come back
    /// emptied but with their capacity intact.
    pub fn acquire(&self, idx: usize) -> MutexGuard<'_, Scratch> {
        let mut guard = self.slots[idx % self.slots.len()]
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        guard.outline.clear();
        guard.stroke_outline.clear();
        guard
    }

    /// Drop all grown buffers (capacity included).
    pub fn clear(&self) {
        for slot in &self.slots {
            let mut guard = slot.lock().unwrap_or_else(|e| e.into_inner());
            *guard = Scratch::default();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

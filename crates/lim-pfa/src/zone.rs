//! Zones and the buddy algorithm
//!
//! A zone owns the descriptors for a contiguous span of frames and the
//! `MAX_ORDER` free areas threaded through them, all behind one spin lock.
//! Buddy arithmetic works on zone-relative indices so a zone starting at an
//! arbitrary frame still forms maximal blocks.
//!
//! # Contract breaches
//!
//! Releasing a block the zone did not hand out at that order (double free,
//! wrong order, misaligned frame, frame outside the zone, locked frame)
//! panics with the frame, zone, claimed order and observed state.

use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use lim_primitives::SpinLock;

use crate::error::{PfaError, PfaResult};
use crate::frame::FrameDescriptor;
use crate::free_area::FreeArea;
use crate::memory_map::FrameRange;
use crate::stats::ZoneStats;
use crate::types::{order_frames, FrameFlags, FrameInfo, FrameState, Pfn, MAX_ORDER};

/// A contiguous range of frames managed by one buddy allocator instance.
pub struct Zone {
    id: usize,
    start_pfn: Pfn,
    spanned: u64,
    present: u64,
    managed: u64,
    pub(crate) inner: SpinLock<ZoneInner>,
}

/// Lock-protected zone state.
pub(crate) struct ZoneInner {
    pub frames: Vec<FrameDescriptor>,
    pub free_area: [FreeArea; MAX_ORDER],
    /// Frames currently handed out
    pub allocated: u64,
}

impl Zone {
    /// Create a zone spanning `spanned` frames from `start_pfn`, with every
    /// frame unavailable until seeded.
    pub(crate) fn new(id: usize, start_pfn: Pfn, spanned: u64) -> Self {
        Self {
            id,
            start_pfn,
            spanned,
            present: 0,
            managed: 0,
            inner: SpinLock::new(ZoneInner {
                frames: vec![FrameDescriptor::unavailable(); spanned as usize],
                free_area: [FreeArea::new(); MAX_ORDER],
                allocated: 0,
            }),
        }
    }

    /// Hand `range` to the allocator at boot, as the largest blocks that
    /// alignment and length permit. Returns the number of frames seeded.
    pub(crate) fn seed_range(&mut self, range: FrameRange) -> u64 {
        debug_assert!(range.start >= self.start_pfn && range.end <= self.end_pfn());
        let inner = self.inner.get_mut();
        let mut idx = (range.start.0 - self.start_pfn.0) as usize;
        let end = (range.end.0 - self.start_pfn.0) as usize;

        while idx < end {
            let mut order = MAX_ORDER - 1;
            while order > 0 && (idx % (1 << order) != 0 || idx + (1 << order) > end) {
                order -= 1;
            }
            inner.mark_block(
                idx,
                order,
                FrameState::FreeHead {
                    order: order as u8,
                },
                FrameState::FreeTail,
            );
            inner.free_area[order].push(&mut inner.frames, idx);
            idx += 1 << order;
        }

        let seeded = range.frames();
        self.present += seeded;
        self.managed += seeded;
        seeded
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn start_pfn(&self) -> Pfn {
        self.start_pfn
    }

    /// One past the last frame of the span.
    pub fn end_pfn(&self) -> Pfn {
        Pfn(self.start_pfn.0 + self.spanned)
    }

    pub fn spanned(&self) -> u64 {
        self.spanned
    }

    pub fn present(&self) -> u64 {
        self.present
    }

    pub fn managed(&self) -> u64 {
        self.managed
    }

    pub fn contains(&self, pfn: Pfn) -> bool {
        pfn >= self.start_pfn && pfn < self.end_pfn()
    }

    fn index_of(&self, pfn: Pfn) -> Option<usize> {
        self.contains(pfn).then(|| (pfn.0 - self.start_pfn.0) as usize)
    }

    /// Allocate a `2^order`-frame block.
    pub fn alloc(&self, order: usize) -> PfaResult<Pfn> {
        if order >= MAX_ORDER {
            return Err(PfaError::InvalidOrder);
        }

        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let mut current = (order..MAX_ORDER)
            .find(|&o| inner.free_area[o].head.is_some())
            .ok_or(PfaError::OutOfMemory)?;
        let idx = inner.free_area[current]
            .pop(&mut inner.frames)
            .ok_or(PfaError::OutOfMemory)?;

        // Split: upper halves go back on the lower free lists. Their tails
        // were already free tails, so only the new heads change.
        while current > order {
            current -= 1;
            let upper = idx + (1 << current);
            inner.frames[upper].state = FrameState::FreeHead {
                order: current as u8,
            };
            inner.free_area[current].push(&mut inner.frames, upper);
        }

        inner.mark_block(
            idx,
            order,
            FrameState::AllocatedHead { order: order as u8 },
            FrameState::AllocatedTail,
        );
        inner.frames[idx].refcount = 1;
        inner.allocated += order_frames(order);

        Ok(Pfn(self.start_pfn.0 + idx as u64))
    }

    /// Release a block previously returned by [`alloc`](Self::alloc) at the
    /// same order, regardless of outstanding references.
    ///
    /// # Panics
    ///
    /// On any contract breach (see module docs).
    pub fn free(&self, pfn: Pfn, order: usize) {
        let mut guard = self.inner.lock();
        let idx = match self.release_target(&guard.frames, pfn, order) {
            Ok(idx) => idx,
            Err(breach) => panic!("{}", breach),
        };
        guard.release(idx, order);
    }

    /// Like [`free`](Self::free), but reports a bad release as
    /// `InvalidFrame` (or `InvalidOrder`) instead of halting. For callers
    /// that cannot vouch for their arguments.
    pub fn try_free(&self, pfn: Pfn, order: usize) -> PfaResult<()> {
        if order >= MAX_ORDER {
            return Err(PfaError::InvalidOrder);
        }
        let mut guard = self.inner.lock();
        let idx = self
            .release_target(&guard.frames, pfn, order)
            .map_err(|_| PfaError::InvalidFrame)?;
        guard.release(idx, order);
        Ok(())
    }

    /// Take an additional reference on an allocated block. Returns the new
    /// reference count.
    pub fn get_page(&self, pfn: Pfn) -> PfaResult<u32> {
        let idx = self.index_of(pfn).ok_or(PfaError::InvalidFrame)?;
        let mut inner = self.inner.lock();
        let desc = &mut inner.frames[idx];
        if !matches!(desc.state, FrameState::AllocatedHead { .. }) {
            return Err(PfaError::InvalidFrame);
        }
        desc.refcount = desc.refcount.checked_add(1).ok_or(PfaError::InvalidFrame)?;
        Ok(desc.refcount)
    }

    /// Drop one reference; the block is released when the last one goes.
    /// Returns whether the block was released.
    ///
    /// # Panics
    ///
    /// Under the same conditions as [`free`](Self::free).
    pub fn put_page(&self, pfn: Pfn, order: usize) -> bool {
        let mut guard = self.inner.lock();
        let idx = match self.release_target(&guard.frames, pfn, order) {
            Ok(idx) => idx,
            Err(breach) => panic!("{}", breach),
        };
        let desc = &mut guard.frames[idx];
        desc.refcount = desc.refcount.saturating_sub(1);
        if desc.refcount > 0 {
            return false;
        }
        guard.release(idx, order);
        true
    }

    /// Set `LOCKED` on an allocated block head.
    pub fn lock_frame(&self, pfn: Pfn) -> PfaResult<()> {
        self.update_flags(pfn, |flags| flags.insert(FrameFlags::LOCKED))
    }

    /// Clear `LOCKED` on an allocated block head.
    pub fn unlock_frame(&self, pfn: Pfn) -> PfaResult<()> {
        self.update_flags(pfn, |flags| flags.remove(FrameFlags::LOCKED))
    }

    fn update_flags(&self, pfn: Pfn, f: impl FnOnce(&mut FrameFlags)) -> PfaResult<()> {
        let idx = self.index_of(pfn).ok_or(PfaError::InvalidFrame)?;
        let mut inner = self.inner.lock();
        let desc = &mut inner.frames[idx];
        if !matches!(desc.state, FrameState::AllocatedHead { .. }) {
            return Err(PfaError::InvalidFrame);
        }
        f(&mut desc.flags);
        Ok(())
    }

    /// Snapshot of one frame's descriptor.
    pub fn frame_info(&self, pfn: Pfn) -> Option<FrameInfo> {
        let idx = self.index_of(pfn)?;
        let inner = self.inner.lock();
        let desc = &inner.frames[idx];
        Some(FrameInfo {
            pfn,
            zone: self.id,
            state: desc.state,
            flags: desc.flags,
            refcount: desc.refcount,
        })
    }

    pub fn stats(&self) -> ZoneStats {
        let inner = self.inner.lock();
        let mut free_by_order = [0u64; MAX_ORDER];
        for (count, area) in free_by_order.iter_mut().zip(inner.free_area.iter()) {
            *count = area.nr_free;
        }
        ZoneStats {
            zone: self.id,
            start_pfn: self.start_pfn.0,
            spanned: self.spanned,
            present: self.present,
            managed: self.managed,
            free_by_order,
            allocated: inner.allocated,
        }
    }

    /// Validate a release of `(pfn, order)` and return the zone index of the
    /// block head, or a diagnostic describing the contract breach.
    fn release_target(
        &self,
        frames: &[FrameDescriptor],
        pfn: Pfn,
        order: usize,
    ) -> Result<usize, String> {
        if order >= MAX_ORDER {
            return Err(format!(
                "[pfa] zone {}: release of frame {} at invalid order {}",
                self.id, pfn, order
            ));
        }
        let idx = self.index_of(pfn).ok_or_else(|| {
            format!(
                "[pfa] zone {}: release of frame {} outside zone [{}, {})",
                self.id,
                pfn,
                self.start_pfn,
                self.end_pfn()
            )
        })?;
        if idx % (1 << order) != 0 {
            return Err(format!(
                "[pfa] zone {}: release of frame {} misaligned for order {}",
                self.id, pfn, order
            ));
        }

        let desc = &frames[idx];
        match desc.state {
            FrameState::AllocatedHead { order: held } if held as usize == order => {}
            FrameState::AllocatedHead { order: held } => {
                return Err(format!(
                    "[pfa] zone {}: frame {} allocated at order {} but released at order {}",
                    self.id, pfn, held, order
                ))
            }
            FrameState::FreeHead { .. } | FrameState::FreeTail => {
                return Err(format!(
                    "[pfa] zone {}: double free of frame {} at order {} (state {:?})",
                    self.id, pfn, order, desc.state
                ))
            }
            state => {
                return Err(format!(
                    "[pfa] zone {}: frame {} at order {} is not an allocated block head (state {:?})",
                    self.id, pfn, order, state
                ))
            }
        }
        if desc.flags.contains(FrameFlags::LOCKED) {
            return Err(format!(
                "[pfa] zone {}: release of locked frame {} at order {}",
                self.id, pfn, order
            ));
        }
        Ok(idx)
    }
}

impl ZoneInner {
    /// Set the head and tail states of the block at `idx`, clearing flags
    /// and reference counts.
    fn mark_block(&mut self, idx: usize, order: usize, head: FrameState, tail: FrameState) {
        let end = idx + (1 << order);
        for (i, desc) in self.frames[idx..end].iter_mut().enumerate() {
            desc.state = if i == 0 { head } else { tail };
            desc.flags = FrameFlags::empty();
            desc.refcount = 0;
        }
    }

    /// Return an allocated block to the free lists, merging with free
    /// buddies. A buddy beyond the zone span ends the merge.
    fn release(&mut self, mut idx: usize, mut order: usize) {
        self.mark_block(idx, order, FrameState::FreeTail, FrameState::FreeTail);
        self.allocated -= order_frames(order);

        while order < MAX_ORDER - 1 {
            let buddy = idx ^ (1 << order);
            let buddy_free = self.frames.get(buddy).map(|d| d.state)
                == Some(FrameState::FreeHead {
                    order: order as u8,
                });
            if !buddy_free {
                break;
            }
            self.free_area[order].remove(&mut self.frames, buddy);
            self.frames[buddy].state = FrameState::FreeTail;
            idx = idx.min(buddy);
            order += 1;
        }

        self.frames[idx].state = FrameState::FreeHead { order: order as u8 };
        self.free_area[order].push(&mut self.frames, idx);
    }
}

//! Core allocator types
//!
//! Pure data: frame numbers, per-frame state and flags, and the allocator's
//! compile-time geometry.

use core::fmt;
use serde::{Deserialize, Serialize};

/// Size of one physical frame in bytes.
pub const FRAME_SIZE: u64 = 4096;

/// `log2(FRAME_SIZE)`.
pub const FRAME_SHIFT: u32 = 12;

/// Number of buddy orders. Orders run `0..MAX_ORDER`, so the largest block
/// is `2^(MAX_ORDER - 1)` frames.
pub const MAX_ORDER: usize = 11;

/// The only zone type in use.
pub const ZONE_NORMAL: usize = 0;

/// Upper bound on frames spanned by one zone (64 GiB of 4 KiB frames).
pub const MAX_ZONE_FRAMES: u64 = 1 << 24;

/// Physical frame number (physical address >> `FRAME_SHIFT`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pfn(pub u64);

impl Pfn {
    /// Frame containing the physical address `addr`.
    pub const fn from_addr(addr: u64) -> Self {
        Pfn(addr >> FRAME_SHIFT)
    }

    /// Physical address of the first byte of this frame.
    pub const fn addr(self) -> u64 {
        self.0 << FRAME_SHIFT
    }
}

impl fmt::Display for Pfn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Number of frames in a block of `order`.
#[inline]
pub const fn order_frames(order: usize) -> u64 {
    1 << order
}

/// Smallest order whose block holds `bytes` bytes. Zero bytes need order 0.
pub fn order_for_bytes(bytes: u64) -> usize {
    let frames = bytes.div_ceil(FRAME_SIZE).max(1);
    frames.next_power_of_two().trailing_zeros() as usize
}

bitflags::bitflags! {
    /// Per-frame flag bits.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct FrameFlags: u8 {
        /// Frame is pinned; freeing its block is a contract breach.
        const LOCKED = 1 << 0;
    }
}

/// Where a frame currently lives.
///
/// A block is described by its head frame; the remaining `2^order - 1`
/// frames are tails that inherit the head's ownership.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameState {
    /// Hole or reserved frame inside the zone span; never handed out
    Unavailable,
    /// Head of a free block on the order-`order` free list
    FreeHead { order: u8 },
    /// Non-head frame of a free block
    FreeTail,
    /// Head of an allocated block
    AllocatedHead { order: u8 },
    /// Non-head frame of an allocated block
    AllocatedTail,
}

impl FrameState {
    pub fn is_free(&self) -> bool {
        matches!(self, FrameState::FreeHead { .. } | FrameState::FreeTail)
    }

    pub fn is_allocated(&self) -> bool {
        matches!(
            self,
            FrameState::AllocatedHead { .. } | FrameState::AllocatedTail
        )
    }
}

/// Snapshot of one frame descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameInfo {
    pub pfn: Pfn,
    pub zone: usize,
    pub state: FrameState,
    pub flags: FrameFlags,
    pub refcount: u32,
}

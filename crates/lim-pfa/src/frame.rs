//! Frame descriptors
//!
//! One descriptor per frame in a zone's span, indexed by the frame's offset
//! from the zone start. The descriptor array is the single owner of frame
//! state; free lists are threaded through the `prev`/`next` links of block
//! heads.

use crate::types::{FrameFlags, FrameState};

#[derive(Clone, Copy, Debug)]
pub(crate) struct FrameDescriptor {
    pub state: FrameState,
    pub flags: FrameFlags,
    pub refcount: u32,
    /// Free-list links (zone-relative indices), valid only on free heads
    pub prev: Option<usize>,
    pub next: Option<usize>,
}

impl FrameDescriptor {
    pub const fn unavailable() -> Self {
        Self {
            state: FrameState::Unavailable,
            flags: FrameFlags::empty(),
            refcount: 0,
            prev: None,
            next: None,
        }
    }
}

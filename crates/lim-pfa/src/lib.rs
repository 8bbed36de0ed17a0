//! LimitlessOS Page Frame Allocator
//!
//! Owns the physical frame inventory and services power-of-two frame
//! allocations with the buddy algorithm.
//!
//! # Module Organization
//!
//! - `types` - Frame numbers, frame state and flags, geometry constants
//! - `memory_map` - Boot memory map and usable-range extraction
//! - `zone` - Per-zone descriptors, free lists and the buddy algorithm
//! - `node` - Zone array for the (single) memory node
//! - `allocator` - `PageFrameAllocator`, the crate's entry point
//! - `stats` - Observational zone statistics
//! - `invariants` - Runtime-checkable allocator invariants
//!
//! # Example
//!
//! ```
//! use lim_pfa::{MemoryMap, PageFrameAllocator, Pfn, RegionKind, ZONE_NORMAL};
//!
//! let map = MemoryMap::new().with_region(0x100000, 4 << 20, RegionKind::Usable);
//! let pfa = PageFrameAllocator::init(&map).unwrap();
//!
//! let pfn = pfa.alloc_pages(0).unwrap();
//! assert_eq!(pfn, Pfn(0x100));
//! pfa.free_pages(pfn, 0);
//!
//! let stats = pfa.zone_stats(ZONE_NORMAL).unwrap();
//! assert_eq!(stats.free_by_order[10], 1);
//! ```

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;

pub mod allocator;
pub mod error;
mod frame;
mod free_area;
pub mod invariants;
pub mod memory_map;
pub mod node;
pub mod stats;
pub mod types;
pub mod zone;

pub use allocator::PageFrameAllocator;
pub use error::{PfaError, PfaResult};
pub use invariants::{
    assert_invariants, check_all_invariants, check_zone_invariants, InvariantViolation,
};
pub use memory_map::{FrameRange, MemoryMap, MemoryRegion, RegionKind};
pub use node::Node;
pub use stats::ZoneStats;
pub use types::{
    order_for_bytes, order_frames, FrameFlags, FrameInfo, FrameState, Pfn, FRAME_SHIFT,
    FRAME_SIZE, MAX_ORDER, MAX_ZONE_FRAMES, ZONE_NORMAL,
};
pub use zone::Zone;

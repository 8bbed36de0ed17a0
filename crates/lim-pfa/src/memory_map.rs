//! Boot memory map
//!
//! The firmware hands the kernel an ordered list of `(base, length, kind)`
//! regions. Only `Usable` memory reaches the allocator: usable regions are
//! merged, every other region is carved out of them, and partial frames at
//! either end of what remains are discarded.

use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use crate::types::{Pfn, FRAME_SIZE};

/// Kind of a boot memory map region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionKind {
    Usable,
    Reserved,
    AcpiReclaimable,
    AcpiNvs,
    BadMemory,
}

/// One entry of the boot memory map, in bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRegion {
    pub base: u64,
    pub length: u64,
    pub kind: RegionKind,
}

impl MemoryRegion {
    /// Exclusive end address, saturating at the top of the address space.
    pub fn end(&self) -> u64 {
        self.base.saturating_add(self.length)
    }
}

/// Half-open range of whole frames `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRange {
    pub start: Pfn,
    pub end: Pfn,
}

impl FrameRange {
    pub fn frames(&self) -> u64 {
        self.end.0 - self.start.0
    }
}

/// Ordered boot memory map.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MemoryMap {
    regions: Vec<MemoryRegion>,
}

impl MemoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a region.
    pub fn add_region(&mut self, base: u64, length: u64, kind: RegionKind) -> &mut Self {
        self.regions.push(MemoryRegion { base, length, kind });
        self
    }

    /// Builder form of [`add_region`](Self::add_region).
    pub fn with_region(mut self, base: u64, length: u64, kind: RegionKind) -> Self {
        self.add_region(base, length, kind);
        self
    }

    pub fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    /// Whole usable frames, sorted and disjoint.
    pub fn usable_frame_ranges(&self) -> Vec<FrameRange> {
        let mut usable: Vec<(u64, u64)> = self
            .regions
            .iter()
            .filter(|r| r.kind == RegionKind::Usable && r.length > 0)
            .map(|r| (r.base, r.end()))
            .collect();
        usable.sort_unstable();

        // Merge overlapping and adjacent usable ranges
        let mut merged: Vec<(u64, u64)> = Vec::with_capacity(usable.len());
        for (start, end) in usable {
            match merged.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => merged.push((start, end)),
            }
        }

        for hole in self
            .regions
            .iter()
            .filter(|r| r.kind != RegionKind::Usable && r.length > 0)
        {
            merged = carve(&merged, hole.base, hole.end());
        }

        merged
            .into_iter()
            .filter_map(|(start, end)| {
                let start = align_up(start)?;
                let end = end & !(FRAME_SIZE - 1);
                (start < end).then(|| FrameRange {
                    start: Pfn::from_addr(start),
                    end: Pfn::from_addr(end),
                })
            })
            .collect()
    }
}

/// Remove `[hole_start, hole_end)` from every range, splitting where needed.
fn carve(ranges: &[(u64, u64)], hole_start: u64, hole_end: u64) -> Vec<(u64, u64)> {
    let mut out = Vec::with_capacity(ranges.len() + 1);
    for &(start, end) in ranges {
        if hole_end <= start || hole_start >= end {
            out.push((start, end));
            continue;
        }
        if start < hole_start {
            out.push((start, hole_start));
        }
        if hole_end < end {
            out.push((hole_end, end));
        }
    }
    out
}

fn align_up(addr: u64) -> Option<u64> {
    Some(addr.checked_add(FRAME_SIZE - 1)? & !(FRAME_SIZE - 1))
}

//! Page frame allocator
//!
//! Entry point of the crate: builds the node and its zone from the boot
//! memory map and routes allocator operations to the owning zone.

use alloc::vec;

use crate::error::{PfaError, PfaResult};
use crate::memory_map::MemoryMap;
use crate::node::Node;
use crate::stats::ZoneStats;
use crate::types::{FrameInfo, Pfn, MAX_ORDER, MAX_ZONE_FRAMES, ZONE_NORMAL};
use crate::zone::Zone;

/// Buddy page frame allocator over a single node.
///
/// All operations take `&self`; each zone serializes its own state behind
/// its lock, so the allocator can be shared across CPUs.
pub struct PageFrameAllocator {
    node: Node,
}

impl PageFrameAllocator {
    /// Build the allocator from the boot memory map.
    ///
    /// The zone spans from the first to the last usable frame; holes and
    /// reserved frames inside the span stay unavailable. Every usable frame
    /// lands on exactly one free list, at the highest order its alignment
    /// and run length permit.
    pub fn init(map: &MemoryMap) -> PfaResult<Self> {
        let ranges = map.usable_frame_ranges();
        let (first, last) = match (ranges.first(), ranges.last()) {
            (Some(first), Some(last)) => (first.start, last.end),
            _ => return Err(PfaError::NoUsableMemory),
        };

        let spanned = last.0 - first.0;
        if spanned > MAX_ZONE_FRAMES {
            return Err(PfaError::ZoneTooLarge);
        }

        let mut zone = Zone::new(ZONE_NORMAL, first, spanned);
        for range in &ranges {
            zone.seed_range(*range);
        }

        Ok(Self {
            node: Node::new(0, vec![zone]),
        })
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Allocate a `2^order`-frame block, trying zones in index order.
    pub fn alloc_pages(&self, order: usize) -> PfaResult<Pfn> {
        if order >= MAX_ORDER {
            return Err(PfaError::InvalidOrder);
        }
        for zone in self.node.zones() {
            match zone.alloc(order) {
                Err(PfaError::OutOfMemory) => continue,
                result => return result,
            }
        }
        Err(PfaError::OutOfMemory)
    }

    /// Release a block at the order it was allocated with.
    ///
    /// # Panics
    ///
    /// If `pfn` lies outside every zone or the release breaches the zone's
    /// contract (double free, order mismatch, locked frame).
    pub fn free_pages(&self, pfn: Pfn, order: usize) {
        match self.node.zone_containing(pfn) {
            Some(zone) => zone.free(pfn, order),
            None => panic!(
                "[pfa] release of frame {} at order {} outside every zone",
                pfn, order
            ),
        }
    }

    /// Checked release for untrusted arguments: a release [`free_pages`]
    /// would panic on is reported as an error and changes nothing.
    ///
    /// [`free_pages`]: Self::free_pages
    pub fn try_free_pages(&self, pfn: Pfn, order: usize) -> PfaResult<()> {
        self.owning_zone(pfn)?.try_free(pfn, order)
    }

    pub fn zone_stats(&self, zone: usize) -> PfaResult<ZoneStats> {
        Ok(self.node.zone(zone)?.stats())
    }

    pub fn frame_info(&self, pfn: Pfn) -> PfaResult<FrameInfo> {
        self.node
            .zone_containing(pfn)
            .and_then(|z| z.frame_info(pfn))
            .ok_or(PfaError::InvalidFrame)
    }

    pub fn lock_frame(&self, pfn: Pfn) -> PfaResult<()> {
        self.owning_zone(pfn)?.lock_frame(pfn)
    }

    pub fn unlock_frame(&self, pfn: Pfn) -> PfaResult<()> {
        self.owning_zone(pfn)?.unlock_frame(pfn)
    }

    /// Take a reference on an allocated block; returns the new count.
    pub fn get_page(&self, pfn: Pfn) -> PfaResult<u32> {
        self.owning_zone(pfn)?.get_page(pfn)
    }

    /// Drop a reference; returns whether the block was released.
    ///
    /// # Panics
    ///
    /// Under the same conditions as [`free_pages`](Self::free_pages).
    pub fn put_page(&self, pfn: Pfn, order: usize) -> bool {
        match self.node.zone_containing(pfn) {
            Some(zone) => zone.put_page(pfn, order),
            None => panic!(
                "[pfa] put of frame {} at order {} outside every zone",
                pfn, order
            ),
        }
    }

    /// Frames under allocator control across all zones.
    pub fn managed_frames(&self) -> u64 {
        self.node.zones().iter().map(|z| z.managed()).sum()
    }

    /// Free frames across all zones.
    pub fn free_frames(&self) -> u64 {
        self.node
            .zones()
            .iter()
            .map(|z| z.stats().free_frames())
            .sum()
    }

    fn owning_zone(&self, pfn: Pfn) -> PfaResult<&Zone> {
        self.node
            .zone_containing(pfn)
            .ok_or(PfaError::InvalidFrame)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::invariants::check_all_invariants;
    use crate::memory_map::RegionKind;
    use crate::types::FrameState;
    use alloc::sync::Arc;
    use alloc::vec::Vec;

    const MIB: u64 = 1 << 20;

    fn scenario_a() -> PageFrameAllocator {
        let map = MemoryMap::new().with_region(0x100000, 4 * MIB, RegionKind::Usable);
        PageFrameAllocator::init(&map).unwrap()
    }

    /// Fixed-seed linear congruential generator for reproducible workloads.
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self) -> u64 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            self.0 >> 33
        }

        fn below(&mut self, n: u64) -> u64 {
            self.next() % n
        }
    }

    fn assert_consistent(pfa: &PageFrameAllocator) {
        let violations = check_all_invariants(pfa);
        assert!(violations.is_empty(), "{:?}", violations);
    }

    // ========================================================================
    // Init
    // ========================================================================

    #[test]
    fn test_scenario_a_init_and_first_alloc() {
        let pfa = scenario_a();
        let stats = pfa.zone_stats(ZONE_NORMAL).unwrap();
        assert_eq!(stats.free_by_order, [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(stats.start_pfn, 0x100);
        assert_eq!(stats.spanned, 1024);

        let pfn = pfa.alloc_pages(0).unwrap();
        assert_eq!(pfn, Pfn(0x100));

        let stats = pfa.zone_stats(ZONE_NORMAL).unwrap();
        assert_eq!(stats.free_by_order, [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0]);
        assert_eq!(stats.allocated, 1);
        assert_consistent(&pfa);
    }

    #[test]
    fn test_scenario_b_free_restores_init_state() {
        let pfa = scenario_a();
        let before = pfa.zone_stats(ZONE_NORMAL).unwrap();
        let pfn = pfa.alloc_pages(0).unwrap();
        pfa.free_pages(pfn, 0);
        assert_eq!(pfa.zone_stats(ZONE_NORMAL).unwrap(), before);
        assert_consistent(&pfa);
    }

    #[test]
    fn test_init_rejects_empty_map() {
        let map = MemoryMap::new().with_region(0, 4 * MIB, RegionKind::Reserved);
        assert_eq!(
            PageFrameAllocator::init(&map).err(),
            Some(PfaError::NoUsableMemory)
        );
    }

    #[test]
    fn test_init_rejects_oversized_span() {
        let map = MemoryMap::new()
            .with_region(0, 4096, RegionKind::Usable)
            .with_region(1 << 40, 4096, RegionKind::Usable);
        assert_eq!(
            PageFrameAllocator::init(&map).err(),
            Some(PfaError::ZoneTooLarge)
        );
    }

    #[test]
    fn test_init_with_reserved_hole() {
        let map = MemoryMap::new()
            .with_region(0, 4 * MIB, RegionKind::Usable)
            .with_region(MIB, 64 * 1024, RegionKind::Reserved);
        let pfa = PageFrameAllocator::init(&map).unwrap();
        let stats = pfa.zone_stats(ZONE_NORMAL).unwrap();
        assert_eq!(stats.spanned, 1024);
        assert_eq!(stats.managed, 1024 - 16);
        assert!(stats.present <= stats.spanned);
        assert_eq!(
            pfa.frame_info(Pfn(0x100)).unwrap().state,
            FrameState::Unavailable
        );
        assert_consistent(&pfa);
    }

    #[test]
    fn test_zone_array_lookup() {
        let pfa = scenario_a();
        assert_eq!(pfa.node().nr_zones(), 1);
        assert_eq!(pfa.zone_stats(1).err(), Some(PfaError::NoSuchZone));
    }

    // ========================================================================
    // Allocation
    // ========================================================================

    #[test]
    fn test_alloc_invalid_order() {
        let pfa = scenario_a();
        assert_eq!(pfa.alloc_pages(MAX_ORDER), Err(PfaError::InvalidOrder));
    }

    #[test]
    fn test_alloc_until_exhausted() {
        let pfa = scenario_a();
        let blocks: Vec<Pfn> = (0..4).map(|_| pfa.alloc_pages(8).unwrap()).collect();
        assert_eq!(pfa.alloc_pages(0), Err(PfaError::OutOfMemory));
        for pfn in &blocks {
            assert_eq!(pfn.0 % 256, 0);
        }
        for pfn in blocks {
            pfa.free_pages(pfn, 8);
        }
        assert_eq!(pfa.free_frames(), 1024);
    }

    #[test]
    fn test_failed_alloc_leaves_state_unchanged() {
        let pfa = scenario_a();
        let big = pfa.alloc_pages(9).unwrap();
        let before = pfa.zone_stats(ZONE_NORMAL).unwrap();
        assert_eq!(pfa.alloc_pages(10), Err(PfaError::OutOfMemory));
        assert_eq!(pfa.zone_stats(ZONE_NORMAL).unwrap(), before);
        pfa.free_pages(big, 9);
    }

    // ========================================================================
    // Properties
    // ========================================================================

    #[test]
    fn test_random_workload_conserves_and_round_trips() {
        let map = MemoryMap::new()
            .with_region(0x3000, 3 * MIB, RegionKind::Usable)
            .with_region(0x80000, 0x5000, RegionKind::Reserved);
        let pfa = PageFrameAllocator::init(&map).unwrap();
        let initial = pfa.zone_stats(ZONE_NORMAL).unwrap();

        let mut rng = Lcg(0x5eed);
        let mut live: Vec<(Pfn, usize)> = Vec::new();
        for step in 0..2000 {
            if live.is_empty() || rng.below(3) != 0 {
                let order = rng.below(6) as usize;
                if let Ok(pfn) = pfa.alloc_pages(order) {
                    assert_eq!((pfn.0 - initial.start_pfn) % (1 << order), 0);
                    live.push((pfn, order));
                }
            } else {
                let i = rng.below(live.len() as u64) as usize;
                let (pfn, order) = live.swap_remove(i);
                pfa.free_pages(pfn, order);
            }
            if step % 100 == 0 {
                assert!(pfa.zone_stats(ZONE_NORMAL).unwrap().is_conserved());
                assert_consistent(&pfa);
            }
        }

        for (pfn, order) in live {
            pfa.free_pages(pfn, order);
        }
        assert_eq!(pfa.zone_stats(ZONE_NORMAL).unwrap(), initial);
        assert_consistent(&pfa);
    }

    #[test]
    fn test_alloc_free_leaves_no_split_residue() {
        let pfa = scenario_a();
        let a = pfa.alloc_pages(3).unwrap();
        let b = pfa.alloc_pages(0).unwrap();
        let before = pfa.zone_stats(ZONE_NORMAL).unwrap();
        for order in 0..MAX_ORDER - 1 {
            if let Ok(pfn) = pfa.alloc_pages(order) {
                pfa.free_pages(pfn, order);
                assert_eq!(pfa.zone_stats(ZONE_NORMAL).unwrap(), before);
            }
        }
        pfa.free_pages(b, 0);
        pfa.free_pages(a, 3);
    }

    // ========================================================================
    // Descriptor API
    // ========================================================================

    #[test]
    fn test_refcounted_release() {
        let pfa = scenario_a();
        let pfn = pfa.alloc_pages(2).unwrap();
        assert_eq!(pfa.get_page(pfn), Ok(2));
        assert!(!pfa.put_page(pfn, 2));
        assert_eq!(pfa.frame_info(pfn).unwrap().refcount, 1);
        assert!(pfa.put_page(pfn, 2));
        assert_eq!(pfa.free_frames(), 1024);
    }

    #[test]
    fn test_frame_api_outside_zone() {
        let pfa = scenario_a();
        assert_eq!(pfa.frame_info(Pfn(0)).err(), Some(PfaError::InvalidFrame));
        assert_eq!(pfa.lock_frame(Pfn(0x900)), Err(PfaError::InvalidFrame));
        assert_eq!(pfa.get_page(Pfn(0x900)), Err(PfaError::InvalidFrame));
    }

    #[test]
    fn test_checked_release() {
        let pfa = scenario_a();
        let pfn = pfa.alloc_pages(3).unwrap();
        let before = pfa.zone_stats(ZONE_NORMAL).unwrap();
        assert_eq!(pfa.try_free_pages(pfn, 2), Err(PfaError::InvalidFrame));
        assert_eq!(pfa.try_free_pages(Pfn(0x10), 0), Err(PfaError::InvalidFrame));
        assert_eq!(pfa.zone_stats(ZONE_NORMAL).unwrap(), before);
        assert_eq!(pfa.try_free_pages(pfn, 3), Ok(()));
        assert_eq!(pfa.free_frames(), 1024);
    }

    #[test]
    #[should_panic(expected = "outside every zone")]
    fn test_free_outside_every_zone_panics() {
        let pfa = scenario_a();
        pfa.free_pages(Pfn(0x10), 0);
    }

    #[test]
    #[should_panic(expected = "released at order")]
    fn test_smaller_order_release_panics() {
        let pfa = scenario_a();
        let pfn = pfa.alloc_pages(4).unwrap();
        pfa.free_pages(pfn, 2);
    }

    // ========================================================================
    // Parallel callers
    // ========================================================================

    #[test]
    fn test_parallel_alloc_free_round_trip() {
        let pfa = Arc::new(scenario_a());
        let initial = pfa.zone_stats(ZONE_NORMAL).unwrap();

        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let pfa = pfa.clone();
                std::thread::spawn(move || {
                    let mut rng = Lcg(0xc0ffee + t);
                    let mut live: Vec<(Pfn, usize)> = Vec::new();
                    for _ in 0..500 {
                        if live.is_empty() || rng.below(2) == 0 {
                            let order = rng.below(5) as usize;
                            if let Ok(pfn) = pfa.alloc_pages(order) {
                                live.push((pfn, order));
                            }
                        } else {
                            let i = rng.below(live.len() as u64) as usize;
                            let (pfn, order) = live.swap_remove(i);
                            pfa.free_pages(pfn, order);
                        }
                    }
                    live
                })
            })
            .collect();

        let mut held: Vec<(Pfn, usize)> = Vec::new();
        for handle in handles {
            held.extend(handle.join().unwrap());
        }

        // No block was handed to two threads
        held.sort();
        for pair in held.windows(2) {
            let ((pfn, order), (next, _)) = (pair[0], pair[1]);
            assert!(pfn.0 + (1 << order) <= next.0, "{} overlaps {}", pfn, next);
        }
        assert_consistent(&pfa);

        for (pfn, order) in held {
            pfa.free_pages(pfn, order);
        }
        assert_eq!(pfa.zone_stats(ZONE_NORMAL).unwrap(), initial);
        assert_consistent(&pfa);
    }
}

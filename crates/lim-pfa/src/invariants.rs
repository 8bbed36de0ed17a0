//! Runtime-checkable allocator invariants
//!
//! Used by tests after every interesting transition and by the kernel's
//! debug self-check.
//!
//! # Invariants
//!
//! 1. **Conservation**: `sum(nr_free[k] * 2^k) + allocated = managed`
//! 2. **Alignment**: Every head on the order-k list is 2^k-aligned within
//!    the zone
//! 3. **List Integrity**: List length equals `nr_free`; back links agree
//! 4. **Membership**: A frame is on the order-k list iff its descriptor
//!    says `FreeHead { order: k }`, and each block's tails follow its head
//! 5. **Accounting**: `managed <= present <= spanned`

use alloc::string::String;
use alloc::vec::Vec;

use crate::allocator::PageFrameAllocator;
use crate::types::{order_frames, FrameState, MAX_ORDER};
use crate::zone::Zone;

/// An invariant violation with details
#[derive(Clone, Debug)]
pub struct InvariantViolation {
    /// Name of the violated invariant
    pub invariant: &'static str,
    /// Description of what went wrong
    pub description: String,
}

/// Check every zone of the allocator.
pub fn check_all_invariants(pfa: &PageFrameAllocator) -> Vec<InvariantViolation> {
    pfa.node()
        .zones()
        .iter()
        .flat_map(check_zone_invariants)
        .collect()
}

/// Check one zone. Takes the zone lock for the duration.
pub fn check_zone_invariants(zone: &Zone) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    let id = zone.id();

    if zone.managed() > zone.present() || zone.present() > zone.spanned() {
        violations.push(InvariantViolation {
            invariant: "accounting",
            description: alloc::format!(
                "Zone {}: managed {} / present {} / spanned {} out of order",
                id,
                zone.managed(),
                zone.present(),
                zone.spanned()
            ),
        });
    }

    let inner = zone.inner.lock();
    let frames = &inner.frames;

    // Invariants 2 and 3: walk each list
    for (order, area) in inner.free_area.iter().enumerate() {
        let mut len = 0u64;
        let mut prev = None;
        for idx in area.iter(frames) {
            len += 1;
            if len > frames.len() as u64 {
                violations.push(InvariantViolation {
                    invariant: "list_integrity",
                    description: alloc::format!("Zone {}: order {} list cycles", id, order),
                });
                break;
            }
            if idx % (1 << order) != 0 {
                violations.push(InvariantViolation {
                    invariant: "alignment",
                    description: alloc::format!(
                        "Zone {}: frame {:#x} on order {} list is misaligned",
                        id,
                        zone.start_pfn().0 + idx as u64,
                        order
                    ),
                });
            }
            if frames[idx].state != (FrameState::FreeHead { order: order as u8 }) {
                violations.push(InvariantViolation {
                    invariant: "membership",
                    description: alloc::format!(
                        "Zone {}: frame {:#x} on order {} list has state {:?}",
                        id,
                        zone.start_pfn().0 + idx as u64,
                        order,
                        frames[idx].state
                    ),
                });
            }
            if frames[idx].prev != prev {
                violations.push(InvariantViolation {
                    invariant: "list_integrity",
                    description: alloc::format!(
                        "Zone {}: frame {:#x} on order {} list has a stale back link",
                        id,
                        zone.start_pfn().0 + idx as u64,
                        order
                    ),
                });
            }
            prev = Some(idx);
        }
        if len != area.nr_free {
            violations.push(InvariantViolation {
                invariant: "list_integrity",
                description: alloc::format!(
                    "Zone {}: order {} list holds {} blocks but nr_free is {}",
                    id,
                    order,
                    len,
                    area.nr_free
                ),
            });
        }
    }

    // Invariant 4: walk descriptors block by block
    let mut heads = [0u64; MAX_ORDER];
    let mut allocated = 0u64;
    let mut idx = 0usize;
    while idx < frames.len() {
        let (order, tail) = match frames[idx].state {
            FrameState::Unavailable => {
                idx += 1;
                continue;
            }
            FrameState::FreeHead { order } => {
                if let Some(count) = heads.get_mut(order as usize) {
                    *count += 1;
                }
                (order as usize, FrameState::FreeTail)
            }
            FrameState::AllocatedHead { order } => {
                allocated += order_frames(order as usize);
                (order as usize, FrameState::AllocatedTail)
            }
            state => {
                violations.push(InvariantViolation {
                    invariant: "membership",
                    description: alloc::format!(
                        "Zone {}: frame {:#x} is a {:?} with no head",
                        id,
                        zone.start_pfn().0 + idx as u64,
                        state
                    ),
                });
                idx += 1;
                continue;
            }
        };
        let end = idx + (1 << order);
        if end > frames.len() || frames[idx + 1..end].iter().any(|f| f.state != tail) {
            violations.push(InvariantViolation {
                invariant: "membership",
                description: alloc::format!(
                    "Zone {}: block at {:#x} order {} has inconsistent tails",
                    id,
                    zone.start_pfn().0 + idx as u64,
                    order
                ),
            });
        }
        idx = end;
    }

    for (order, (&found, area)) in heads.iter().zip(inner.free_area.iter()).enumerate() {
        if found != area.nr_free {
            violations.push(InvariantViolation {
                invariant: "membership",
                description: alloc::format!(
                    "Zone {}: {} order {} free heads in descriptors, nr_free is {}",
                    id,
                    found,
                    order,
                    area.nr_free
                ),
            });
        }
    }

    if allocated != inner.allocated {
        violations.push(InvariantViolation {
            invariant: "conservation",
            description: alloc::format!(
                "Zone {}: descriptors show {} allocated frames, counter is {}",
                id,
                allocated,
                inner.allocated
            ),
        });
    }

    // Invariant 1
    let free: u64 = inner
        .free_area
        .iter()
        .enumerate()
        .map(|(order, area)| area.nr_free * order_frames(order))
        .sum();
    if free + inner.allocated != zone.managed() {
        violations.push(InvariantViolation {
            invariant: "conservation",
            description: alloc::format!(
                "Zone {}: {} free + {} allocated != {} managed",
                id,
                free,
                inner.allocated,
                zone.managed()
            ),
        });
    }

    violations
}

/// Assert all invariants hold (panic if not)
pub fn assert_invariants(pfa: &PageFrameAllocator) {
    if let Some(v) = check_all_invariants(pfa).first() {
        panic!("Invariant violated: {}: {}", v.invariant, v.description);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_map::{MemoryMap, RegionKind};
    use crate::types::ZONE_NORMAL;

    fn pfa() -> PageFrameAllocator {
        let map = MemoryMap::new().with_region(0, 64 * 4096, RegionKind::Usable);
        PageFrameAllocator::init(&map).unwrap()
    }

    #[test]
    fn test_fresh_allocator_is_consistent() {
        assert!(check_all_invariants(&pfa()).is_empty());
    }

    #[test]
    fn test_detects_corrupted_counter() {
        let pfa = pfa();
        let zone = pfa.node().zone(ZONE_NORMAL).unwrap();
        zone.inner.lock().allocated += 1;
        let violations = check_zone_invariants(zone);
        assert!(violations.iter().any(|v| v.invariant == "conservation"));
    }

    #[test]
    fn test_detects_state_list_disagreement() {
        let pfa = pfa();
        let pfn = pfa.alloc_pages(0).unwrap();
        let zone = pfa.node().zone(ZONE_NORMAL).unwrap();
        zone.inner.lock().frames[pfn.0 as usize].state = FrameState::FreeHead { order: 0 };
        let violations = check_zone_invariants(zone);
        assert!(violations.iter().any(|v| v.invariant == "membership"));
    }

    #[test]
    #[should_panic(expected = "Invariant violated")]
    fn test_assert_invariants_panics() {
        let pfa = pfa();
        pfa.node().zone(ZONE_NORMAL).unwrap().inner.lock().free_area[0].nr_free = 3;
        assert_invariants(&pfa);
    }
}

//! Runtime-checkable registry invariants
//!
//! # Invariants
//!
//! 1. **Conservation**: `sent - received - dropped = queued`
//! 2. **Liveness Count**: The live counter equals the number of occupied slots
//! 3. **Identity**: A live endpoint's id encodes its slot and the slot's
//!    current generation; generations are never zero
//! 4. **Bounded Queues**: No queue exceeds its capacity; depth metrics agree
//! 5. **Retirement**: A retired slot holds no endpoint

use alloc::vec::Vec;
use lim_hal::HAL;
use lim_pfa::InvariantViolation;

use crate::registry::EndpointRegistry;
use crate::types::EndpointId;

/// Check all registry invariants. Meaningful at quiescent points only.
pub fn check_registry_invariants<H: HAL>(registry: &EndpointRegistry<H>) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    let mut occupied = 0usize;
    let mut queued = 0usize;

    registry.for_each_slot(|slot, generation, endpoint, retired| {
        if generation == 0 {
            violations.push(InvariantViolation {
                invariant: "identity",
                description: alloc::format!("Slot {} has generation 0", slot),
            });
        }
        let Some(endpoint) = endpoint else {
            return;
        };
        occupied += 1;
        queued += endpoint.pending();

        if retired {
            violations.push(InvariantViolation {
                invariant: "retirement",
                description: alloc::format!(
                    "Retired slot {} holds endpoint {}",
                    slot,
                    endpoint.id()
                ),
            });
        }
        if endpoint.id() != EndpointId::new(slot, generation) {
            violations.push(InvariantViolation {
                invariant: "identity",
                description: alloc::format!(
                    "Endpoint {} lives in slot {} at generation {}",
                    endpoint.id(),
                    slot,
                    generation
                ),
            });
        }
        if endpoint.pending() > endpoint.capacity() {
            violations.push(InvariantViolation {
                invariant: "bounded_queues",
                description: alloc::format!(
                    "Endpoint {} holds {} messages, capacity {}",
                    endpoint.id(),
                    endpoint.pending(),
                    endpoint.capacity()
                ),
            });
        }
        if endpoint.metrics().queue_depth != endpoint.pending() {
            violations.push(InvariantViolation {
                invariant: "bounded_queues",
                description: alloc::format!(
                    "Endpoint {} reports depth {} but holds {}",
                    endpoint.id(),
                    endpoint.metrics().queue_depth,
                    endpoint.pending()
                ),
            });
        }
    });

    if occupied != registry.live_count() {
        violations.push(InvariantViolation {
            invariant: "liveness_count",
            description: alloc::format!(
                "{} occupied slots but live counter is {}",
                occupied,
                registry.live_count()
            ),
        });
    }

    let stats = registry.stats();
    let accounted = stats.sent as i128 - stats.received as i128 - stats.dropped as i128;
    if accounted != queued as i128 {
        violations.push(InvariantViolation {
            invariant: "conservation",
            description: alloc::format!(
                "sent {} - received {} - dropped {} != queued {}",
                stats.sent,
                stats.received,
                stats.dropped,
                queued
            ),
        });
    }

    violations
}

/// Assert all registry invariants hold (panic if not)
pub fn assert_registry_invariants<H: HAL>(registry: &EndpointRegistry<H>) {
    if let Some(v) = check_registry_invariants(registry).first() {
        panic!("Invariant violated: {}: {}", v.invariant, v.description);
    }
}

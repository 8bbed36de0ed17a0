//! Observational zone statistics

use serde::{Deserialize, Serialize};

use crate::types::{order_frames, MAX_ORDER};

/// Point-in-time view of one zone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneStats {
    /// Zone index within its node
    pub zone: usize,
    /// First frame of the span
    pub start_pfn: u64,
    /// Frames in `[start_pfn, start_pfn + spanned)`, holes included
    pub spanned: u64,
    /// Frames backed by usable memory
    pub present: u64,
    /// Frames under allocator control
    pub managed: u64,
    /// `nr_free` for each order
    pub free_by_order: [u64; MAX_ORDER],
    /// Frames currently handed out
    pub allocated: u64,
}

impl ZoneStats {
    /// Total free frames across all orders.
    pub fn free_frames(&self) -> u64 {
        self.free_by_order
            .iter()
            .enumerate()
            .map(|(order, &n)| n * order_frames(order))
            .sum()
    }

    /// Largest order with a free block, if any.
    pub fn largest_free_order(&self) -> Option<usize> {
        self.free_by_order.iter().rposition(|&n| n > 0)
    }

    /// Whether free plus allocated frames account for every managed frame.
    pub fn is_conserved(&self) -> bool {
        self.free_frames() + self.allocated == self.managed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ZoneStats {
        ZoneStats {
            zone: 0,
            start_pfn: 0x100,
            spanned: 1024,
            present: 1024,
            managed: 1024,
            free_by_order: [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0],
            allocated: 1,
        }
    }

    #[test]
    fn test_free_frames_and_conservation() {
        let stats = sample();
        assert_eq!(stats.free_frames(), 1023);
        assert!(stats.is_conserved());
        assert_eq!(stats.largest_free_order(), Some(9));
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.contains("\"start_pfn\":256"));
        assert!(json.contains("\"free_by_order\":[1,1,1,1,1,1,1,1,1,1,0]"));
        let back: ZoneStats = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample());
    }
}

//! Memory node
//!
//! A node aggregates zones. Only one node and one zone (`ZONE_NORMAL`) are
//! populated today; lookups still go through the zone array.

use alloc::vec::Vec;

use crate::error::{PfaError, PfaResult};
use crate::types::Pfn;
use crate::zone::Zone;

pub struct Node {
    node_id: usize,
    zones: Vec<Zone>,
}

impl Node {
    pub(crate) fn new(node_id: usize, zones: Vec<Zone>) -> Self {
        Self { node_id, zones }
    }

    pub fn node_id(&self) -> usize {
        self.node_id
    }

    pub fn nr_zones(&self) -> usize {
        self.zones.len()
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zone(&self, zone: usize) -> PfaResult<&Zone> {
        self.zones.get(zone).ok_or(PfaError::NoSuchZone)
    }

    /// Zone whose span contains `pfn`.
    pub fn zone_containing(&self, pfn: Pfn) -> Option<&Zone> {
        self.zones.iter().find(|z| z.contains(pfn))
    }
}

//! IPC types
//!
//! Pure data: endpoint and address-space identities, the send descriptor,
//! receive results and per-endpoint metrics.

use core::fmt;
use serde::{Deserialize, Serialize};

/// Endpoint identity: `(generation << 32) | slot`.
///
/// Slots are reused after destroy; the generation is bumped on every
/// destroy, so an id is never handed out twice. Generations start at 1,
/// which keeps the raw value 0 permanently invalid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EndpointId(pub u64);

impl EndpointId {
    pub const fn new(slot: u32, generation: u32) -> Self {
        EndpointId(((generation as u64) << 32) | slot as u64)
    }

    pub const fn slot(self) -> u32 {
        self.0 as u32
    }

    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.slot(), self.generation())
    }
}

/// Address space identifier of an endpoint's owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AddressSpaceId(pub u64);

/// The kernel's own address space.
pub const KERNEL_ASID: AddressSpaceId = AddressSpaceId(0);

/// A send request. The payload is borrowed for the duration of `send` and
/// copied; the caller keeps no reference into registry storage.
#[derive(Clone, Copy, Debug)]
pub struct Message<'a> {
    pub src: EndpointId,
    pub dst: EndpointId,
    pub payload: &'a [u8],
    /// Reserved; must be zero
    pub flags: u32,
}

impl<'a> Message<'a> {
    pub fn new(src: EndpointId, dst: EndpointId, payload: &'a [u8]) -> Self {
        Self {
            src,
            dst,
            payload,
            flags: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Outcome of a successful receive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Received {
    /// Sender recorded on the message
    pub src: EndpointId,
    /// Full length of the message, which may exceed the caller's buffer
    pub out_len: usize,
}

impl Received {
    /// Whether a buffer of `buf_len` bytes lost part of the message.
    pub fn truncated(&self, buf_len: usize) -> bool {
        self.out_len > buf_len
    }
}

/// Per-endpoint tracking
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointMetrics {
    /// Messages currently queued
    pub queue_depth: usize,
    /// Total messages ever sent to this endpoint
    pub total_messages: u64,
    /// Total bytes received
    pub total_bytes: u64,
    /// High water mark (max queue depth seen)
    pub queue_high_water: usize,
}

/// Snapshot of one live endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointInfo {
    pub id: EndpointId,
    pub owner: AddressSpaceId,
    pub capacity: usize,
    pub metrics: EndpointMetrics,
}

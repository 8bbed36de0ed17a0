//! Endpoints
//!
//! An endpoint is a bounded FIFO of pending messages plus its owner. The
//! registry keeps each one behind its slot's lock.

use alloc::collections::VecDeque;

use crate::pool::MessageBuffer;
use crate::types::{AddressSpaceId, EndpointId, EndpointInfo, EndpointMetrics};

/// A queued message: the recorded sender and the registry-owned payload.
#[derive(Debug)]
pub struct QueuedMessage {
    pub src: EndpointId,
    pub buffer: MessageBuffer,
}

#[derive(Debug)]
pub struct Endpoint {
    id: EndpointId,
    owner: AddressSpaceId,
    capacity: usize,
    queue: VecDeque<QueuedMessage>,
    metrics: EndpointMetrics,
}

impl Endpoint {
    pub fn new(id: EndpointId, owner: AddressSpaceId, capacity: usize) -> Self {
        Self {
            id,
            owner,
            capacity,
            queue: VecDeque::with_capacity(capacity),
            metrics: EndpointMetrics::default(),
        }
    }

    pub fn id(&self) -> EndpointId {
        self.id
    }

    pub fn owner(&self) -> AddressSpaceId {
        self.owner
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_full(&self) -> bool {
        self.queue.len() >= self.capacity
    }

    pub fn metrics(&self) -> &EndpointMetrics {
        &self.metrics
    }

    /// Append a message. The caller has checked `is_full`.
    pub fn enqueue(&mut self, msg: QueuedMessage) {
        debug_assert!(!self.is_full());
        self.metrics.total_messages += 1;
        self.metrics.total_bytes += msg.buffer.len() as u64;
        self.queue.push_back(msg);
        self.metrics.queue_depth = self.queue.len();
        self.metrics.queue_high_water = self.metrics.queue_high_water.max(self.queue.len());
    }

    pub fn front(&self) -> Option<&QueuedMessage> {
        self.queue.front()
    }

    pub fn dequeue(&mut self) -> Option<QueuedMessage> {
        let msg = self.queue.pop_front();
        self.metrics.queue_depth = self.queue.len();
        msg
    }

    /// Remove every pending message, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = QueuedMessage> + '_ {
        self.metrics.queue_depth = 0;
        self.queue.drain(..)
    }

    pub fn info(&self) -> EndpointInfo {
        EndpointInfo {
            id: self.id,
            owner: self.owner,
            capacity: self.capacity,
            metrics: self.metrics.clone(),
        }
    }
}

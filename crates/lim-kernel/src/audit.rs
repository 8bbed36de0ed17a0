//! System Event Log (SysLog)
//!
//! Records every dispatched syscall (request + response) for audit.
//! Append-only with monotonic event ids; the oldest events are trimmed once
//! the configured capacity is exceeded.

use alloc::vec::Vec;
use lim_ipc::AddressSpaceId;
use serde::{Deserialize, Serialize};

/// Monotonic event identifier
pub type EventId = u64;

/// A system event (syscall request or response).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SysEvent {
    /// Unique event ID (monotonic)
    pub id: EventId,
    /// Address space that made the syscall
    pub sender: AddressSpaceId,
    /// Timestamp (nanos since boot)
    pub timestamp: u64,
    /// Event type (request or response)
    pub event_type: SysEventType,
}

/// Type of system event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SysEventType {
    /// Syscall request
    Request {
        /// Syscall number
        syscall_num: u32,
        /// Syscall arguments (up to 4)
        args: [u64; 4],
    },
    /// Syscall response
    Response {
        /// ID of the request this responds to
        request_id: EventId,
        /// Status code (0 = OK, negative = error)
        result: i64,
        /// Returned value, 0 on error
        value: u64,
    },
}

/// System event log for auditing.
pub struct SysLog {
    /// Event entries (append-only)
    events: Vec<SysEvent>,
    /// Next event ID to assign
    next_id: EventId,
    /// Events retained before trimming
    capacity: usize,
}

impl SysLog {
    /// Create a new empty SysLog retaining at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Vec::new(),
            next_id: 0,
            capacity,
        }
    }

    /// Log a syscall request.
    ///
    /// Returns the event ID for correlating with the response.
    pub fn log_request(
        &mut self,
        sender: AddressSpaceId,
        syscall_num: u32,
        args: [u64; 4],
        timestamp: u64,
    ) -> EventId {
        self.push(sender, timestamp, SysEventType::Request { syscall_num, args })
    }

    /// Log a syscall response.
    pub fn log_response(
        &mut self,
        sender: AddressSpaceId,
        request_id: EventId,
        result: i64,
        value: u64,
        timestamp: u64,
    ) {
        self.push(
            sender,
            timestamp,
            SysEventType::Response {
                request_id,
                result,
                value,
            },
        );
    }

    fn push(&mut self, sender: AddressSpaceId, timestamp: u64, event_type: SysEventType) -> EventId {
        let id = self.next_id;
        self.next_id += 1;
        self.events.push(SysEvent {
            id,
            sender,
            timestamp,
            event_type,
        });
        self.trim_if_needed();
        id
    }

    /// Get all retained events.
    pub fn events(&self) -> &[SysEvent] {
        &self.events
    }

    /// Get events with `start_id <= id < end_id`.
    pub fn get_range(&self, start_id: EventId, end_id: EventId) -> Vec<&SysEvent> {
        self.events
            .iter()
            .filter(|e| e.id >= start_id && e.id < end_id)
            .collect()
    }

    /// Get the most recent N events, newest first.
    pub fn get_recent(&self, count: usize) -> Vec<&SysEvent> {
        self.events.iter().rev().take(count).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn next_id(&self) -> EventId {
        self.next_id
    }

    fn trim_if_needed(&mut self) {
        if self.events.len() > self.capacity {
            let drain_count = self.events.len() - self.capacity;
            self.events.drain(0..drain_count);
        }
    }
}

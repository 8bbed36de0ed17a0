//! LimitlessOS IPC Endpoint Registry
//!
//! Creates and destroys endpoint identities and queues copy-in messages for
//! non-blocking receive.
//!
//! - Endpoint ids pack a reusable slot index with a generation that grows
//!   on every destroy, so ids are unique for the life of the system.
//! - Each endpoint has its own lock and a bounded FIFO; a full queue fails
//!   the send with `Again`.
//! - Payloads are copied into buddy blocks from the page frame allocator
//!   via the HAL; the sender keeps no reference after `send` returns.
//! - `recv` never blocks. The timeout is validated and otherwise ignored.
//!
//! # Module Organization
//!
//! - `types` - Endpoint ids, send descriptor, receive result, metrics
//! - `config` - `RegistryConfig` and its validation
//! - `pool` - PFA-backed message buffers with a bounded per-order cache
//! - `endpoint` - Bounded per-endpoint queue
//! - `registry` - `EndpointRegistry`, the crate's entry point
//! - `invariants` - Runtime-checkable registry invariants

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;

pub mod config;
pub mod endpoint;
pub mod error;
pub mod invariants;
pub mod pool;
pub mod registry;
pub mod types;

pub use config::{ConfigError, RegistryConfig, MIN_QUEUE_CAPACITY};
pub use error::{IpcError, IpcResult};
pub use invariants::{assert_registry_invariants, check_registry_invariants};
pub use registry::{EndpointRegistry, RegistryStats};
pub use types::{
    AddressSpaceId, EndpointId, EndpointInfo, EndpointMetrics, Message, Received, KERNEL_ASID,
};

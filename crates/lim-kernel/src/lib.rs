//! LimitlessOS Kernel Core
//!
//! Kernel-init shim composing the resource core:
//! - Page frame allocator booted from the firmware memory map
//! - IPC endpoint registry backed by the allocator
//! - Modular reduction kit for in-kernel lattice crypto
//! - Typed syscall dispatch with numeric ABI codes and an audit log
//!
//! # Module Organization
//!
//! - `kernel` - `Kernel`, boot and dispatch
//! - `syscall` - Syscall numbers, `Syscall` and `SyscallResult`
//! - `audit` - Syscall audit log
//! - `config` - `KernelConfig`
//! - `error` - `KernelError` and `BootError`

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;

pub mod audit;
pub mod config;
pub mod error;
pub mod kernel;
pub mod syscall;

pub use audit::{EventId, SysEvent, SysEventType, SysLog};
pub use config::KernelConfig;
pub use error::{BootError, KernelError};
pub use kernel::Kernel;
pub use syscall::*;

// Re-export the components
pub use lim_hal::{HalError, HAL};
pub use lim_ipc::{
    AddressSpaceId, EndpointId, EndpointInfo, IpcError, Message, Received, RegistryConfig,
    KERNEL_ASID,
};
pub use lim_pfa::{InvariantViolation, MemoryMap, PfaError, Pfn, RegionKind, ZoneStats};
pub use lim_reduce as reduce;

//! Syscall definitions and types
//!
//! This module contains:
//! - Canonical syscall number constants (ABI)
//! - Syscall enum for type-safe dispatch
//! - Syscall result types

use alloc::vec::Vec;
use lim_ipc::EndpointId;
use lim_pfa::ZoneStats;
use lim_primitives::errno;

use crate::error::KernelError;

// ============================================================================
// Canonical Syscall Numbers
// ============================================================================

pub const SYS_CREATE_ENDPOINT: u32 = 0x11;
pub const SYS_DESTROY_ENDPOINT: u32 = 0x12;
pub const SYS_ALLOC_PAGES: u32 = 0x20;
pub const SYS_FREE_PAGES: u32 = 0x21;
pub const SYS_ZONE_STATS: u32 = 0x22;
pub const SYS_SEND: u32 = 0x40;
pub const SYS_RECV: u32 = 0x41;

/// Syscall request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Syscall {
    /// Allocate a `2^order`-frame block (SYS_ALLOC_PAGES 0x20)
    AllocPages { order: u32 },
    /// Release a block at its allocation order (SYS_FREE_PAGES 0x21)
    FreePages { pfn: u64, order: u32 },
    /// Read one zone's statistics (SYS_ZONE_STATS 0x22)
    ZoneStats { zone: u32 },
    /// Create an endpoint owned by the caller (SYS_CREATE_ENDPOINT 0x11)
    CreateEndpoint,
    /// Destroy an endpoint (SYS_DESTROY_ENDPOINT 0x12)
    DestroyEndpoint { endpoint: EndpointId },
    /// Send a message (SYS_SEND 0x40)
    Send {
        src: EndpointId,
        dst: EndpointId,
        data: Vec<u8>,
        flags: u32,
    },
    /// Receive into a buffer of `buf_len` bytes (SYS_RECV 0x41)
    Recv {
        endpoint: EndpointId,
        buf_len: usize,
        timeout_ms: i32,
    },
}

impl Syscall {
    /// ABI number of this syscall.
    pub fn number(&self) -> u32 {
        match self {
            Syscall::AllocPages { .. } => SYS_ALLOC_PAGES,
            Syscall::FreePages { .. } => SYS_FREE_PAGES,
            Syscall::ZoneStats { .. } => SYS_ZONE_STATS,
            Syscall::CreateEndpoint => SYS_CREATE_ENDPOINT,
            Syscall::DestroyEndpoint { .. } => SYS_DESTROY_ENDPOINT,
            Syscall::Send { .. } => SYS_SEND,
            Syscall::Recv { .. } => SYS_RECV,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Syscall::AllocPages { .. } => "alloc_pages",
            Syscall::FreePages { .. } => "free_pages",
            Syscall::ZoneStats { .. } => "zone_stats",
            Syscall::CreateEndpoint => "create_endpoint",
            Syscall::DestroyEndpoint { .. } => "destroy_endpoint",
            Syscall::Send { .. } => "send",
            Syscall::Recv { .. } => "recv",
        }
    }

    /// Numeric arguments as recorded in the audit log.
    pub fn audit_args(&self) -> [u64; 4] {
        match self {
            Syscall::AllocPages { order } => [*order as u64, 0, 0, 0],
            Syscall::FreePages { pfn, order } => [*pfn, *order as u64, 0, 0],
            Syscall::ZoneStats { zone } => [*zone as u64, 0, 0, 0],
            Syscall::CreateEndpoint => [0; 4],
            Syscall::DestroyEndpoint { endpoint } => [endpoint.0, 0, 0, 0],
            Syscall::Send {
                src,
                dst,
                data,
                flags,
            } => [src.0, dst.0, data.len() as u64, *flags as u64],
            Syscall::Recv {
                endpoint,
                buf_len,
                timeout_ms,
            } => [endpoint.0, *buf_len as u64, *timeout_ms as i64 as u64, 0],
        }
    }
}

/// Syscall result - what the kernel returns to the caller
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyscallResult {
    /// Success with value (frame number, endpoint id, dropped count, or 0)
    Ok(u64),
    /// Error
    Err(KernelError),
    /// Message received. `out_len` is the full message length; `data`
    /// holds at most the requested buffer length.
    Message {
        src: EndpointId,
        out_len: usize,
        data: Vec<u8>,
    },
    /// Zone statistics
    Stats(ZoneStats),
}

impl SyscallResult {
    /// ABI status: `OK` or a negative error code.
    pub fn code(&self) -> i64 {
        match self {
            SyscallResult::Err(e) => e.code(),
            _ => errno::OK,
        }
    }

    /// Returned value: the `Ok` payload, or `out_len` for a message.
    pub fn value(&self) -> u64 {
        match self {
            SyscallResult::Ok(v) => *v,
            SyscallResult::Message { out_len, .. } => *out_len as u64,
            _ => 0,
        }
    }

    pub fn is_ok(&self) -> bool {
        !matches!(self, SyscallResult::Err(_))
    }
}

impl<E: Into<KernelError>> From<Result<u64, E>> for SyscallResult {
    fn from(result: Result<u64, E>) -> Self {
        match result {
            Ok(v) => SyscallResult::Ok(v),
            Err(e) => SyscallResult::Err(e.into()),
        }
    }
}

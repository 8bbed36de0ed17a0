//! Hardware Abstraction Layer trait for the LimitlessOS kernel core
//!
//! The core never touches hardware directly. Time, debug output and access
//! to the contents of physical frames go through the [`HAL`] trait so the
//! allocator and IPC logic run unchanged on bare metal and in tests.
//!
//! # Platform Implementations
//!
//! - **Bare metal**: Direct-map window for frame access, serial console,
//!   TSC or HPET for time
//! - **Tests**: [`TestHal`], a sparse in-memory frame store

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use lim_pfa::{FrameRange, Pfn, FRAME_SIZE};
use lim_primitives::SpinLock;

/// Hardware Abstraction Layer trait
///
/// Implementations provide platform-specific functionality for:
/// - Time measurement
/// - Debug output
/// - Copy-in/copy-out of physical frame contents
pub trait HAL: Send + Sync + 'static {
    // === Time ===

    /// Get current time in nanoseconds (monotonic)
    fn now_nanos(&self) -> u64;

    // === Debug ===

    /// Write a debug message to the platform's console/log
    fn debug_write(&self, msg: &str);

    // === Physical Frames ===

    /// Copy `data` into the frames starting at `pfn`. The frames must be
    /// contiguous and large enough to hold `data`.
    ///
    /// # Returns
    /// * `Ok(())` - Bytes written
    /// * `Err(HalError::OutOfRange)` - Some frame is not backed by memory
    /// * `Err(HalError::NotSupported)` - Platform has no frame access
    fn copy_to_frames(&self, _pfn: Pfn, _data: &[u8]) -> Result<(), HalError> {
        Err(HalError::NotSupported)
    }

    /// Copy `out.len()` bytes from the frames starting at `pfn` into `out`.
    ///
    /// # Returns
    /// * `Ok(())` - Bytes read
    /// * `Err(HalError::OutOfRange)` - Some frame is not backed by memory
    /// * `Err(HalError::NotSupported)` - Platform has no frame access
    fn copy_from_frames(&self, _pfn: Pfn, _out: &mut [u8]) -> Result<(), HalError> {
        Err(HalError::NotSupported)
    }
}

/// HAL errors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HalError {
    /// Frame range not backed by memory on this platform
    OutOfRange,
    /// Operation not supported on this platform
    NotSupported,
}

impl HalError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OutOfRange => "Frame range not backed by memory",
            Self::NotSupported => "Operation not supported",
        }
    }
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Test HAL
// ============================================================================

const FRAME_BYTES: usize = FRAME_SIZE as usize;

type Frame = Box<[u8; FRAME_BYTES]>;

/// In-memory HAL for tests.
///
/// Frames are materialized zero-filled on first write. Debug output is
/// discarded.
#[derive(Default)]
pub struct TestHal {
    time: AtomicU64,
    frames: SpinLock<BTreeMap<u64, Frame>>,
    backed: Option<FrameRange>,
}

impl TestHal {
    pub fn new() -> Self {
        Self::default()
    }

    /// A HAL whose frame accessors only accept frames inside `range`.
    pub fn with_memory(range: FrameRange) -> Self {
        Self {
            backed: Some(range),
            ..Self::default()
        }
    }

    /// Advance the monotonic clock.
    pub fn advance_time(&self, nanos: u64) {
        self.time.fetch_add(nanos, Ordering::SeqCst);
    }

    /// Number of frames that have been written at least once.
    pub fn touched_frames(&self) -> usize {
        self.frames.lock().len()
    }

    /// Reject accesses of `len` bytes at `pfn` that leave the backed range.
    fn check_range(&self, pfn: Pfn, len: usize) -> Result<(), HalError> {
        let count = (len as u64).div_ceil(FRAME_SIZE);
        let end = pfn.0.checked_add(count).ok_or(HalError::OutOfRange)?;
        if let Some(range) = self.backed {
            if pfn < range.start || end > range.end.0 {
                return Err(HalError::OutOfRange);
            }
        }
        Ok(())
    }
}

impl HAL for TestHal {
    fn now_nanos(&self) -> u64 {
        self.time.load(Ordering::SeqCst)
    }

    fn debug_write(&self, _msg: &str) {
        // No-op for tests
    }

    fn copy_to_frames(&self, pfn: Pfn, data: &[u8]) -> Result<(), HalError> {
        self.check_range(pfn, data.len())?;
        let mut frames = self.frames.lock();
        for (i, chunk) in data.chunks(FRAME_BYTES).enumerate() {
            let frame = frames
                .entry(pfn.0 + i as u64)
                .or_insert_with(|| Box::new([0u8; FRAME_BYTES]));
            frame[..chunk.len()].copy_from_slice(chunk);
        }
        Ok(())
    }

    fn copy_from_frames(&self, pfn: Pfn, out: &mut [u8]) -> Result<(), HalError> {
        self.check_range(pfn, out.len())?;
        let frames = self.frames.lock();
        for (i, chunk) in out.chunks_mut(FRAME_BYTES).enumerate() {
            match frames.get(&(pfn.0 + i as u64)) {
                Some(frame) => chunk.copy_from_slice(&frame[..chunk.len()]),
                None => chunk.fill(0),
            }
        }
        Ok(())
    }
}

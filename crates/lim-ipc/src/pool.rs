//! PFA-backed message buffers
//!
//! Payload bytes live in buddy blocks obtained from the page frame
//! allocator and are copied in and out through the HAL. Freed blocks are
//! cached per order up to a configured bound; the rest go straight back to
//! the allocator.
//!
//! Lock order: an endpoint lock may be held while taking the pool lock, and
//! the pool lock may be held while calling into the allocator (zone lock).

use alloc::sync::Arc;
use alloc::vec::Vec;
use lim_hal::HAL;
use lim_pfa::{order_for_bytes, PageFrameAllocator, Pfn, MAX_ORDER};
use lim_primitives::SpinLock;

use crate::error::{IpcError, IpcResult};

/// Message storage owned by the registry. Zero-length payloads own no
/// block.
#[derive(Debug)]
pub struct MessageBuffer {
    block: Option<(Pfn, usize)>,
    len: usize,
}

impl MessageBuffer {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Backing block and its order.
    pub fn block(&self) -> Option<(Pfn, usize)> {
        self.block
    }
}

pub struct MessagePool<H: HAL> {
    hal: Arc<H>,
    pfa: Arc<PageFrameAllocator>,
    cache: SpinLock<[Vec<Pfn>; MAX_ORDER]>,
    cache_per_order: usize,
}

impl<H: HAL> MessagePool<H> {
    pub fn new(hal: Arc<H>, pfa: Arc<PageFrameAllocator>, cache_per_order: usize) -> Self {
        Self {
            hal,
            pfa,
            cache: SpinLock::new(core::array::from_fn(|_| Vec::new())),
            cache_per_order,
        }
    }

    /// Copy `payload` into a fresh buffer.
    pub fn fill(&self, payload: &[u8]) -> IpcResult<MessageBuffer> {
        if payload.is_empty() {
            return Ok(MessageBuffer {
                block: None,
                len: 0,
            });
        }

        let order = order_for_bytes(payload.len() as u64);
        let pfn = self.take_block(order)?;
        if self.hal.copy_to_frames(pfn, payload).is_err() {
            self.put_block(pfn, order);
            return Err(IpcError::NoMemory);
        }

        Ok(MessageBuffer {
            block: Some((pfn, order)),
            len: payload.len(),
        })
    }

    /// Copy the first `min(buf.len(), out.len())` bytes of `buf` into `out`.
    /// Returns the number of bytes copied.
    pub fn read(&self, buf: &MessageBuffer, out: &mut [u8]) -> IpcResult<usize> {
        let n = buf.len.min(out.len());
        if let Some((pfn, _)) = buf.block {
            if n > 0 {
                self.hal
                    .copy_from_frames(pfn, &mut out[..n])
                    .map_err(|_| IpcError::NoMemory)?;
            }
        }
        Ok(n)
    }

    /// Return a buffer's block to the cache or the allocator.
    pub fn release(&self, buf: MessageBuffer) {
        if let Some((pfn, order)) = buf.block {
            self.put_block(pfn, order);
        }
    }

    /// Return every cached block to the allocator. Returns the number of
    /// blocks released.
    pub fn trim(&self) -> usize {
        let mut cache = self.cache.lock();
        let mut released = 0;
        for (order, blocks) in cache.iter_mut().enumerate() {
            for pfn in blocks.drain(..) {
                self.pfa.free_pages(pfn, order);
                released += 1;
            }
        }
        released
    }

    /// Blocks currently held in the cache.
    pub fn cached_blocks(&self) -> usize {
        self.cache.lock().iter().map(Vec::len).sum()
    }

    fn take_block(&self, order: usize) -> IpcResult<Pfn> {
        if let Some(pfn) = self.cache.lock()[order].pop() {
            return Ok(pfn);
        }
        self.pfa.alloc_pages(order).map_err(|_| IpcError::NoMemory)
    }

    fn put_block(&self, pfn: Pfn, order: usize) {
        let mut cache = self.cache.lock();
        if cache[order].len() < self.cache_per_order {
            cache[order].push(pfn);
        } else {
            self.pfa.free_pages(pfn, order);
        }
    }
}

impl<H: HAL> Drop for MessagePool<H> {
    fn drop(&mut self) {
        self.trim();
    }
}

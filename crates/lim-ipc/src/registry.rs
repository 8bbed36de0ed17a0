//! Endpoint registry
//!
//! Slots are fixed at construction. Each slot carries its own lock, the
//! current generation and, while live, the endpoint. The slot table lock
//! guards only the free-slot list and is taken on the create/destroy paths;
//! send and receive touch nothing but the target slot (and the pool).
//!
//! # Lock order
//!
//! table -> slot on create. slot -> pool -> zone on send, receive and
//! destroy. Destroy releases the slot lock before touching the table.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use lim_hal::HAL;
use lim_pfa::PageFrameAllocator;
use lim_primitives::{SpinLock, SpinLockGuard};
use serde::{Deserialize, Serialize};

use crate::config::RegistryConfig;
use crate::endpoint::{Endpoint, QueuedMessage};
use crate::error::{IpcError, IpcResult};
use crate::pool::MessagePool;
use crate::types::{AddressSpaceId, EndpointId, EndpointInfo, Message, Received, KERNEL_ASID};

/// First generation handed out by a fresh slot.
const FIRST_GENERATION: u32 = 1;

struct SlotState {
    /// Generation of the current occupant, or of the next one if empty
    generation: u32,
    endpoint: Option<Endpoint>,
    /// Generation space exhausted; the slot is never reused
    retired: bool,
}

struct EndpointSlot {
    state: SpinLock<SlotState>,
}

struct SlotTable {
    free: VecDeque<u32>,
    /// Slots below this index have been handed out at least once
    next_unused: u32,
}

/// Registry-wide counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub live_endpoints: usize,
    pub retired_slots: usize,
    pub sent: u64,
    pub received: u64,
    pub dropped: u64,
    pub queued: usize,
    pub pool_cached_blocks: usize,
}

/// Endpoint registry.
pub struct EndpointRegistry<H: HAL> {
    config: RegistryConfig,
    pool: MessagePool<H>,
    slots: Box<[EndpointSlot]>,
    table: SpinLock<SlotTable>,
    live: AtomicUsize,
    retired: AtomicUsize,
    sent: AtomicU64,
    received: AtomicU64,
    dropped: AtomicU64,
}

impl<H: HAL> EndpointRegistry<H> {
    /// Create a registry. `config` is assumed validated.
    pub fn new(config: RegistryConfig, hal: Arc<H>, pfa: Arc<PageFrameAllocator>) -> Self {
        let slots = (0..config.max_endpoints)
            .map(|_| EndpointSlot {
                state: SpinLock::new(SlotState {
                    generation: FIRST_GENERATION,
                    endpoint: None,
                    retired: false,
                }),
            })
            .collect();
        Self {
            pool: MessagePool::new(hal, pfa, config.pool_cache_per_order),
            config,
            slots,
            table: SpinLock::new(SlotTable {
                free: VecDeque::new(),
                next_unused: 0,
            }),
            live: AtomicUsize::new(0),
            retired: AtomicUsize::new(0),
            sent: AtomicU64::new(0),
            received: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn pool(&self) -> &MessagePool<H> {
        &self.pool
    }

    /// Create a kernel-owned endpoint.
    pub fn create_endpoint(&self) -> IpcResult<EndpointId> {
        self.create_endpoint_for(KERNEL_ASID)
    }

    /// Create an endpoint owned by `owner`.
    pub fn create_endpoint_for(&self, owner: AddressSpaceId) -> IpcResult<EndpointId> {
        let mut table = self.table.lock();
        let slot = match table.free.pop_front() {
            Some(slot) => slot,
            None if (table.next_unused as usize) < self.slots.len() => {
                table.next_unused += 1;
                table.next_unused - 1
            }
            None => return Err(IpcError::NoMemory),
        };

        let mut state = self.slots[slot as usize].state.lock();
        let id = EndpointId::new(slot, state.generation);
        state.endpoint = Some(Endpoint::new(id, owner, self.config.queue_capacity));
        self.live.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }

    /// Destroy an endpoint, dropping its pending messages. Returns the
    /// number of messages dropped.
    pub fn destroy_endpoint(&self, ep: EndpointId) -> IpcResult<usize> {
        let (dropped, reusable) = {
            let mut state = self.lock_live(ep)?;
            let mut endpoint = state.endpoint.take().ok_or(IpcError::NoEntry)?;

            let mut dropped = 0;
            for msg in endpoint.drain() {
                self.pool.release(msg.buffer);
                dropped += 1;
            }

            match state.generation.checked_add(1) {
                Some(next) => state.generation = next,
                None => state.retired = true,
            }
            (dropped, !state.retired)
        };

        self.dropped.fetch_add(dropped as u64, Ordering::Relaxed);
        self.live.fetch_sub(1, Ordering::Relaxed);
        if reusable {
            self.table.lock().free.push_back(ep.slot());
        } else {
            self.retired.fetch_add(1, Ordering::Relaxed);
        }
        Ok(dropped)
    }

    /// Whether `ep` names a live endpoint.
    pub fn is_live(&self, ep: EndpointId) -> bool {
        self.lock_live(ep).is_ok()
    }

    /// Copy `msg` onto its destination's queue. Never blocks.
    ///
    /// Checks run in order: flags, length, destination liveness, queue
    /// capacity, buffer allocation. A failed send changes nothing.
    pub fn send(&self, msg: &Message<'_>) -> IpcResult<()> {
        if msg.flags != 0 {
            return Err(IpcError::Invalid);
        }
        if msg.len() > self.config.max_msg_len {
            return Err(IpcError::MessageSize);
        }

        let mut state = self.lock_live(msg.dst)?;
        let endpoint = state.endpoint.as_mut().ok_or(IpcError::NoEntry)?;
        if endpoint.is_full() {
            return Err(IpcError::Again);
        }

        let buffer = self.pool.fill(msg.payload)?;
        endpoint.enqueue(QueuedMessage {
            src: msg.src,
            buffer,
        });
        self.sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Take the oldest message on `ep`, copying up to `buf.len()` bytes
    /// into `buf`. The message is consumed even when truncated.
    ///
    /// Never blocks: an empty queue is `Timeout` whatever `timeout_ms`
    /// says. A negative timeout is `Invalid`.
    pub fn recv(&self, ep: EndpointId, buf: &mut [u8], timeout_ms: i32) -> IpcResult<Received> {
        if timeout_ms < 0 {
            return Err(IpcError::Invalid);
        }

        let mut state = self.lock_live(ep)?;
        let endpoint = state.endpoint.as_mut().ok_or(IpcError::NoEntry)?;
        let front = endpoint.front().ok_or(IpcError::Timeout)?;

        // Copy before dequeuing so a failed copy leaves the message queued
        self.pool.read(&front.buffer, buf)?;
        let received = Received {
            src: front.src,
            out_len: front.buffer.len(),
        };

        if let Some(msg) = endpoint.dequeue() {
            self.pool.release(msg.buffer);
        }
        self.received.fetch_add(1, Ordering::Relaxed);
        Ok(received)
    }

    /// Messages pending on `ep`.
    pub fn pending(&self, ep: EndpointId) -> IpcResult<usize> {
        let state = self.lock_live(ep)?;
        state
            .endpoint
            .as_ref()
            .map(Endpoint::pending)
            .ok_or(IpcError::NoEntry)
    }

    pub fn endpoint_info(&self, ep: EndpointId) -> IpcResult<EndpointInfo> {
        let state = self.lock_live(ep)?;
        state
            .endpoint
            .as_ref()
            .map(Endpoint::info)
            .ok_or(IpcError::NoEntry)
    }

    /// Return cached message blocks to the allocator.
    pub fn trim_pool(&self) -> usize {
        self.pool.trim()
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            live_endpoints: self.live.load(Ordering::Relaxed),
            retired_slots: self.retired.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            queued: self.queued(),
            pool_cached_blocks: self.pool.cached_blocks(),
        }
    }

    /// Total messages pending across all endpoints. Locks each slot in
    /// turn, so the sum is exact only at quiescent points.
    pub fn queued(&self) -> usize {
        self.slots
            .iter()
            .filter_map(|slot| slot.state.lock().endpoint.as_ref().map(Endpoint::pending))
            .sum()
    }

    /// Visit every live endpoint under its slot lock.
    pub(crate) fn for_each_slot(&self, mut f: impl FnMut(u32, u32, Option<&Endpoint>, bool)) {
        for (index, slot) in self.slots.iter().enumerate() {
            let state = slot.state.lock();
            f(
                index as u32,
                state.generation,
                state.endpoint.as_ref(),
                state.retired,
            );
        }
    }

    pub(crate) fn live_count(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }

    /// Lock the slot `ep` names, if `ep` is its current live occupant.
    fn lock_live(&self, ep: EndpointId) -> IpcResult<SpinLockGuard<'_, SlotState>> {
        let slot = self
            .slots
            .get(ep.slot() as usize)
            .ok_or(IpcError::NoEntry)?;
        let state = slot.state.lock();
        let live = matches!(&state.endpoint, Some(endpoint) if endpoint.id() == ep);
        if live {
            Ok(state)
        } else {
            Err(IpcError::NoEntry)
        }
    }
}

impl<H: HAL> Drop for EndpointRegistry<H> {
    fn drop(&mut self) {
        for slot in self.slots.iter_mut() {
            if let Some(mut endpoint) = slot.state.get_mut().endpoint.take() {
                for msg in endpoint.drain() {
                    self.pool.release(msg.buffer);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::config::DEFAULT_MAX_MSG_LEN;
    use crate::invariants::check_registry_invariants;
    use alloc::vec;
    use alloc::vec::Vec;
    use lim_hal::TestHal;
    use lim_pfa::{MemoryMap, RegionKind};

    fn setup_with(config: RegistryConfig) -> (Arc<PageFrameAllocator>, EndpointRegistry<TestHal>) {
        let map = MemoryMap::new().with_region(0x100000, 4 << 20, RegionKind::Usable);
        let pfa = Arc::new(PageFrameAllocator::init(&map).unwrap());
        let registry = EndpointRegistry::new(config, Arc::new(TestHal::new()), pfa.clone());
        (pfa, registry)
    }

    fn setup() -> (Arc<PageFrameAllocator>, EndpointRegistry<TestHal>) {
        setup_with(RegistryConfig::default())
    }

    fn assert_consistent(registry: &EndpointRegistry<TestHal>) {
        let violations = check_registry_invariants(registry);
        assert!(violations.is_empty(), "{:?}", violations);
    }

    // ========================================================================
    // Endpoint lifecycle
    // ========================================================================

    #[test]
    fn test_create_endpoints_are_distinct() {
        let (_pfa, reg) = setup();
        let e1 = reg.create_endpoint().unwrap();
        let e2 = reg.create_endpoint().unwrap();
        assert_ne!(e1, e2);
        assert!(reg.is_live(e1));
        assert_eq!(reg.stats().live_endpoints, 2);
    }

    #[test]
    fn test_destroy_then_operations_fail_noent() {
        let (_pfa, reg) = setup();
        let ep = reg.create_endpoint().unwrap();
        assert_eq!(reg.destroy_endpoint(ep), Ok(0));
        assert_eq!(reg.destroy_endpoint(ep), Err(IpcError::NoEntry));
        assert_eq!(
            reg.send(&Message::new(ep, ep, b"x")),
            Err(IpcError::NoEntry)
        );
        let mut buf = [0u8; 4];
        assert_eq!(reg.recv(ep, &mut buf, 0), Err(IpcError::NoEntry));
        assert_eq!(reg.pending(ep), Err(IpcError::NoEntry));
    }

    #[test]
    fn test_slot_reuse_bumps_generation() {
        let (_pfa, reg) = setup();
        let old = reg.create_endpoint().unwrap();
        reg.destroy_endpoint(old).unwrap();
        let new = reg.create_endpoint().unwrap();
        assert_eq!(new.slot(), old.slot());
        assert_eq!(new.generation(), old.generation() + 1);
        assert!(!reg.is_live(old));
        assert!(reg.is_live(new));
    }

    #[test]
    fn test_slot_exhaustion() {
        let (_pfa, reg) = setup_with(RegistryConfig {
            max_endpoints: 2,
            ..RegistryConfig::default()
        });
        reg.create_endpoint().unwrap();
        let b = reg.create_endpoint().unwrap();
        assert_eq!(reg.create_endpoint(), Err(IpcError::NoMemory));
        reg.destroy_endpoint(b).unwrap();
        assert!(reg.create_endpoint().is_ok());
    }

    #[test]
    fn test_generation_overflow_retires_slot() {
        let (_pfa, reg) = setup_with(RegistryConfig {
            max_endpoints: 1,
            ..RegistryConfig::default()
        });
        reg.slots[0].state.lock().generation = u32::MAX;
        let last = reg.create_endpoint().unwrap();
        assert_eq!(last.generation(), u32::MAX);
        reg.destroy_endpoint(last).unwrap();
        assert_eq!(reg.create_endpoint(), Err(IpcError::NoMemory));
        assert_eq!(reg.stats().retired_slots, 1);
        assert_consistent(&reg);
    }

    #[test]
    fn test_owner_and_info() {
        let (_pfa, reg) = setup();
        let ep = reg.create_endpoint_for(AddressSpaceId(42)).unwrap();
        let info = reg.endpoint_info(ep).unwrap();
        assert_eq!(info.owner, AddressSpaceId(42));
        assert_eq!(info.capacity, 32);
        assert_eq!(reg.endpoint_info(reg.create_endpoint().unwrap()).unwrap().owner, KERNEL_ASID);
    }

    #[test]
    fn test_forged_ids_are_rejected() {
        let (_pfa, reg) = setup();
        let ep = reg.create_endpoint().unwrap();
        let wrong_gen = EndpointId::new(ep.slot(), ep.generation() + 1);
        let bad_slot = EndpointId::new(5000, 1);
        assert!(!reg.is_live(wrong_gen));
        assert!(!reg.is_live(bad_slot));
        assert!(!reg.is_live(EndpointId(0)));
    }

    // ========================================================================
    // Send / receive
    // ========================================================================

    #[test]
    fn test_send_recv_hello() {
        let (_pfa, reg) = setup();
        let e1 = reg.create_endpoint().unwrap();
        let e2 = reg.create_endpoint().unwrap();
        reg.send(&Message::new(e1, e2, b"hello")).unwrap();

        let mut buf = [0u8; 16];
        let r = reg.recv(e2, &mut buf, 0).unwrap();
        assert_eq!(r, Received { src: e1, out_len: 5 });
        assert_eq!(&buf[..5], b"hello");
        assert_eq!(reg.recv(e2, &mut buf, 0), Err(IpcError::Timeout));
    }

    #[test]
    fn test_recv_truncates_and_consumes() {
        let (_pfa, reg) = setup();
        let e1 = reg.create_endpoint().unwrap();
        let e2 = reg.create_endpoint().unwrap();
        reg.send(&Message::new(e1, e2, b"0123456789")).unwrap();

        let mut buf = [0u8; 4];
        let r = reg.recv(e2, &mut buf, 100).unwrap();
        assert_eq!(r.out_len, 10);
        assert!(r.truncated(buf.len()));
        assert_eq!(&buf, b"0123");
        assert_eq!(reg.recv(e2, &mut buf, 100), Err(IpcError::Timeout));
    }

    #[test]
    fn test_fifo_order() {
        let (_pfa, reg) = setup();
        let src = reg.create_endpoint().unwrap();
        let dst = reg.create_endpoint().unwrap();
        for i in 0..20u8 {
            reg.send(&Message::new(src, dst, &[i; 3])).unwrap();
        }
        let mut buf = [0u8; 3];
        for i in 0..20u8 {
            reg.recv(dst, &mut buf, 0).unwrap();
            assert_eq!(buf, [i; 3]);
        }
    }

    #[test]
    fn test_queue_full_is_again() {
        let (_pfa, reg) = setup_with(RegistryConfig {
            queue_capacity: 16,
            ..RegistryConfig::default()
        });
        let ep = reg.create_endpoint().unwrap();
        for _ in 0..16 {
            reg.send(&Message::new(ep, ep, b"m")).unwrap();
        }
        assert_eq!(reg.send(&Message::new(ep, ep, b"m")), Err(IpcError::Again));
        assert_eq!(reg.pending(ep), Ok(16));
        let mut buf = [0u8; 1];
        reg.recv(ep, &mut buf, 0).unwrap();
        assert!(reg.send(&Message::new(ep, ep, b"m")).is_ok());
    }

    #[test]
    fn test_send_validation_precedence() {
        let (_pfa, reg) = setup();
        let ep = reg.create_endpoint().unwrap();
        let gone = reg.create_endpoint().unwrap();
        reg.destroy_endpoint(gone).unwrap();
        let big = vec![0u8; DEFAULT_MAX_MSG_LEN + 1];

        let mut msg = Message::new(ep, gone, &big);
        msg.flags = 1;
        assert_eq!(reg.send(&msg), Err(IpcError::Invalid));
        msg.flags = 0;
        assert_eq!(reg.send(&msg), Err(IpcError::MessageSize));
        assert_eq!(
            reg.send(&Message::new(ep, gone, b"ok")),
            Err(IpcError::NoEntry)
        );

        let max = vec![7u8; DEFAULT_MAX_MSG_LEN];
        assert!(reg.send(&Message::new(ep, ep, &max)).is_ok());
        assert_eq!(reg.stats().sent, 1);
    }

    #[test]
    fn test_negative_timeout_is_invalid() {
        let (_pfa, reg) = setup();
        let ep = reg.create_endpoint().unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(reg.recv(ep, &mut buf, -1), Err(IpcError::Invalid));
    }

    #[test]
    fn test_empty_payload() {
        let (_pfa, reg) = setup();
        let ep = reg.create_endpoint().unwrap();
        reg.send(&Message::new(ep, ep, &[])).unwrap();
        let mut buf = [0xffu8; 2];
        let r = reg.recv(ep, &mut buf, 0).unwrap();
        assert_eq!(r.out_len, 0);
        assert_eq!(buf, [0xff; 2]);
    }

    #[test]
    fn test_send_without_frames_is_nomem_and_leaves_queue() {
        let map = MemoryMap::new().with_region(0x100000, 4096, RegionKind::Usable);
        let pfa = Arc::new(PageFrameAllocator::init(&map).unwrap());
        let reg = EndpointRegistry::new(
            RegistryConfig {
                pool_cache_per_order: 0,
                ..RegistryConfig::default()
            },
            Arc::new(TestHal::new()),
            pfa.clone(),
        );
        let ep = reg.create_endpoint().unwrap();
        reg.send(&Message::new(ep, ep, b"first")).unwrap();
        assert_eq!(
            reg.send(&Message::new(ep, ep, b"second")),
            Err(IpcError::NoMemory)
        );
        assert_eq!(reg.pending(ep), Ok(1));
        assert_consistent(&reg);
    }

    // ========================================================================
    // Destroy with pending messages and frame accounting
    // ========================================================================

    #[test]
    fn test_destroy_drops_pending_and_returns_frames() {
        let (pfa, reg) = setup_with(RegistryConfig {
            pool_cache_per_order: 0,
            ..RegistryConfig::default()
        });
        let total = pfa.free_frames();
        let e1 = reg.create_endpoint().unwrap();
        let e2 = reg.create_endpoint().unwrap();
        for payload in [&b"a"[..], &b"bb"[..], &b"ccc"[..]] {
            reg.send(&Message::new(e1, e2, payload)).unwrap();
        }
        assert_eq!(pfa.free_frames(), total - 3);

        assert_eq!(reg.destroy_endpoint(e2), Ok(3));
        assert_eq!(pfa.free_frames(), total);
        let e3 = reg.create_endpoint().unwrap();
        assert_ne!(e3, e2);

        let stats = reg.stats();
        assert_eq!((stats.sent, stats.received, stats.dropped), (3, 0, 3));
        assert_consistent(&reg);
    }

    #[test]
    fn test_drop_returns_all_frames() {
        let (pfa, reg) = setup();
        let total = pfa.free_frames();
        let ep = reg.create_endpoint().unwrap();
        reg.send(&Message::new(ep, ep, &[1u8; 5000])).unwrap();
        drop(reg);
        assert_eq!(pfa.free_frames(), total);
    }

    // ========================================================================
    // Properties
    // ========================================================================

    /// Fixed-seed linear congruential generator for reproducible workloads.
    struct Lcg(u64);

    impl Lcg {
        fn below(&mut self, n: u64) -> u64 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (self.0 >> 33) % n
        }
    }

    #[test]
    fn test_random_workload_conserves_messages() {
        let (_pfa, reg) = setup();
        let mut rng = Lcg(7);
        let mut live: Vec<EndpointId> = (0..4).map(|_| reg.create_endpoint().unwrap()).collect();
        let mut buf = [0u8; 64];

        for step in 0..1500 {
            match rng.below(10) {
                0 if live.len() > 1 => {
                    let i = rng.below(live.len() as u64) as usize;
                    reg.destroy_endpoint(live.swap_remove(i)).unwrap();
                }
                1 => live.push(reg.create_endpoint().unwrap()),
                2..=6 => {
                    let src = live[rng.below(live.len() as u64) as usize];
                    let dst = live[rng.below(live.len() as u64) as usize];
                    let len = rng.below(100) as usize;
                    let payload = vec![step as u8; len];
                    match reg.send(&Message::new(src, dst, &payload)) {
                        Ok(()) | Err(IpcError::Again) => {}
                        Err(e) => panic!("unexpected send error {:?}", e),
                    }
                }
                _ => {
                    let ep = live[rng.below(live.len() as u64) as usize];
                    match reg.recv(ep, &mut buf, 0) {
                        Ok(_) | Err(IpcError::Timeout) => {}
                        Err(e) => panic!("unexpected recv error {:?}", e),
                    }
                }
            }
            if step % 50 == 0 {
                assert_consistent(&reg);
            }
        }

        let stats = reg.stats();
        assert_eq!(
            stats.sent - stats.received - stats.dropped,
            stats.queued as u64
        );
    }

    #[test]
    fn test_high_water_metrics() {
        let (_pfa, reg) = setup();
        let ep = reg.create_endpoint().unwrap();
        for _ in 0..3 {
            reg.send(&Message::new(ep, ep, b"abcd")).unwrap();
        }
        let mut buf = [0u8; 4];
        reg.recv(ep, &mut buf, 0).unwrap();
        let metrics = reg.endpoint_info(ep).unwrap().metrics;
        assert_eq!(metrics.queue_depth, 2);
        assert_eq!(metrics.queue_high_water, 3);
        assert_eq!(metrics.total_messages, 3);
        assert_eq!(metrics.total_bytes, 12);
    }

    #[test]
    fn test_stats_serialize() {
        let (_pfa, reg) = setup();
        reg.create_endpoint().unwrap();
        let json = serde_json::to_string(&reg.stats()).unwrap();
        assert!(json.contains("\"live_endpoints\":1"));
    }

    // ========================================================================
    // Parallel callers
    // ========================================================================

    #[test]
    fn test_parallel_senders_keep_per_sender_order() {
        let config = RegistryConfig {
            queue_capacity: 256,
            ..RegistryConfig::default()
        };
        let (pfa, reg) = setup_with(config);
        let managed = pfa.managed_frames();
        let dst = reg.create_endpoint().unwrap();
        let senders: Vec<EndpointId> = (0..4).map(|_| reg.create_endpoint().unwrap()).collect();

        std::thread::scope(|s| {
            for &src in &senders {
                let reg = &reg;
                s.spawn(move || {
                    for seq in 0..50u32 {
                        reg.send(&Message::new(src, dst, &seq.to_le_bytes())).unwrap();
                    }
                });
            }
        });
        assert_consistent(&reg);
        assert_eq!(reg.pending(dst), Ok(200));

        let mut next = [0u32; 4];
        let mut buf = [0u8; 4];
        for _ in 0..200 {
            let received = reg.recv(dst, &mut buf, 0).unwrap();
            let sender = senders.iter().position(|&ep| ep == received.src).unwrap();
            assert_eq!(u32::from_le_bytes(buf), next[sender]);
            next[sender] += 1;
        }
        assert_eq!(next, [50; 4]);
        assert_eq!(reg.recv(dst, &mut buf, 0), Err(IpcError::Timeout));
        assert_consistent(&reg);

        reg.trim_pool();
        assert_eq!(pfa.free_frames(), managed);
    }

    #[test]
    fn test_parallel_send_and_receive() {
        let config = RegistryConfig {
            queue_capacity: 16,
            ..RegistryConfig::default()
        };
        let (_pfa, reg) = setup_with(config);
        let src = reg.create_endpoint().unwrap();
        let dst = reg.create_endpoint().unwrap();

        std::thread::scope(|s| {
            let sender = &reg;
            s.spawn(move || {
                let mut seq = 0u32;
                while seq < 500 {
                    match sender.send(&Message::new(src, dst, &seq.to_le_bytes())) {
                        Ok(()) => seq += 1,
                        Err(IpcError::Again) => std::thread::yield_now(),
                        Err(e) => panic!("unexpected send error {:?}", e),
                    }
                }
            });

            let mut expected = 0u32;
            let mut buf = [0u8; 4];
            while expected < 500 {
                match reg.recv(dst, &mut buf, 0) {
                    Ok(_) => {
                        assert_eq!(u32::from_le_bytes(buf), expected);
                        expected += 1;
                    }
                    Err(IpcError::Timeout) => std::thread::yield_now(),
                    Err(e) => panic!("unexpected recv error {:?}", e),
                }
            }
        });

        let stats = reg.stats();
        assert_eq!(stats.sent, 500);
        assert_eq!(stats.received, 500);
        assert_consistent(&reg);
    }
}

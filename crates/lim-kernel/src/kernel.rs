//! Kernel state and syscall dispatch

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use lim_hal::HAL;
use lim_ipc::{
    check_registry_invariants, AddressSpaceId, EndpointId, EndpointRegistry, IpcResult, Message,
    Received,
};
use lim_pfa::{
    check_all_invariants, InvariantViolation, MemoryMap, PageFrameAllocator, PfaError, PfaResult,
    Pfn, ZoneStats, MAX_ORDER,
};
use lim_primitives::{SpinLock, SpinLockGuard};

use crate::audit::SysLog;
use crate::config::KernelConfig;
use crate::error::{BootError, KernelError};
use crate::syscall::{Syscall, SyscallResult};

/// A block handed out through `SYS_ALLOC_PAGES`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct UserBlock {
    owner: AddressSpaceId,
    order: usize,
}

/// The composed kernel resource core.
///
/// Owns the page frame allocator, the endpoint registry built on top of it,
/// and the syscall audit log. All operations take `&self`.
pub struct Kernel<H: HAL> {
    hal: Arc<H>,
    pfa: Arc<PageFrameAllocator>,
    registry: EndpointRegistry<H>,
    /// Blocks owned by address spaces, keyed by head frame. Locked before
    /// any zone.
    user_blocks: SpinLock<BTreeMap<Pfn, UserBlock>>,
    syslog: SpinLock<SysLog>,
    config: KernelConfig,
}

impl<H: HAL> Kernel<H> {
    /// Bring up the allocator from `map` and the registry on top of it.
    pub fn boot(hal: H, map: &MemoryMap, config: KernelConfig) -> Result<Self, BootError> {
        let hal = Arc::new(hal);
        if let Err(e) = config.validate() {
            hal.debug_write(&format!("[kernel] rejected configuration: {}", e));
            return Err(e);
        }

        for range in map.usable_frame_ranges() {
            hal.debug_write(&format!(
                "[pfa] usable frames {}..{} ({} frames)",
                range.start,
                range.end,
                range.frames()
            ));
        }

        let pfa = match PageFrameAllocator::init(map) {
            Ok(pfa) => Arc::new(pfa),
            Err(e) => {
                hal.debug_write(&format!("[pfa] init failed: {}", e));
                return Err(e.into());
            }
        };

        for zone in pfa.node().zones() {
            let stats = zone.stats();
            hal.debug_write(&format!(
                "[pfa] zone {} start {} spanned {} present {} managed {} free_by_order {:?}",
                stats.zone,
                zone.start_pfn(),
                stats.spanned,
                stats.present,
                stats.managed,
                stats.free_by_order
            ));
        }

        let registry = EndpointRegistry::new(config.registry.clone(), hal.clone(), pfa.clone());
        hal.debug_write(&format!(
            "[ipc] registry ready: {} slots, queue capacity {}, max message {} bytes",
            config.registry.max_endpoints,
            config.registry.queue_capacity,
            config.registry.max_msg_len
        ));

        let syslog = SpinLock::new(SysLog::new(config.syslog_capacity));
        hal.debug_write(&format!(
            "[kernel] boot complete: {} frames managed at {} ns",
            pfa.managed_frames(),
            hal.now_nanos()
        ));

        Ok(Self {
            hal,
            pfa,
            registry,
            user_blocks: SpinLock::new(BTreeMap::new()),
            syslog,
            config,
        })
    }

    pub fn hal(&self) -> &H {
        &self.hal
    }

    pub fn pfa(&self) -> &PageFrameAllocator {
        &self.pfa
    }

    pub fn registry(&self) -> &EndpointRegistry<H> {
        &self.registry
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Lock the audit log for inspection.
    pub fn syslog(&self) -> SpinLockGuard<'_, SysLog> {
        self.syslog.lock()
    }

    // ========================================================================
    // Memory
    // ========================================================================

    pub fn alloc_pages(&self, order: usize) -> PfaResult<Pfn> {
        let result = self.pfa.alloc_pages(order);
        if let Err(e) = result {
            self.hal.debug_write(&format!(
                "[pfa] alloc order {} failed: {} ({} frames free)",
                order,
                e,
                self.pfa.free_frames()
            ));
        }
        result
    }

    /// Release a block allocated by kernel code.
    ///
    /// # Panics
    ///
    /// On any contract breach; see [`PageFrameAllocator::free_pages`].
    pub fn free_pages(&self, pfn: Pfn, order: usize) {
        let mut blocks = self.user_blocks.lock();
        self.pfa.free_pages(pfn, order);
        blocks.remove(&pfn);
    }

    /// Allocate a block on behalf of `owner`. Only `owner` may release it
    /// through [`free_user_pages`](Self::free_user_pages).
    pub fn alloc_user_pages(&self, owner: AddressSpaceId, order: usize) -> PfaResult<Pfn> {
        let pfn = self.alloc_pages(order)?;
        self.user_blocks.lock().insert(pfn, UserBlock { owner, order });
        Ok(pfn)
    }

    /// Release a block `caller` allocated through
    /// [`alloc_user_pages`](Self::alloc_user_pages).
    ///
    /// Any other block, including message buffers and kernel allocations,
    /// is `InvalidFrame` and stays allocated.
    pub fn free_user_pages(
        &self,
        caller: AddressSpaceId,
        pfn: Pfn,
        order: usize,
    ) -> PfaResult<()> {
        if order >= MAX_ORDER {
            return Err(PfaError::InvalidOrder);
        }
        let mut blocks = self.user_blocks.lock();
        if blocks.get(&pfn) != Some(&UserBlock { owner: caller, order }) {
            return Err(PfaError::InvalidFrame);
        }
        self.pfa.try_free_pages(pfn, order)?;
        blocks.remove(&pfn);
        Ok(())
    }

    /// Blocks currently owned by `owner` through the syscall path.
    pub fn user_block_count(&self, owner: AddressSpaceId) -> usize {
        self.user_blocks
            .lock()
            .values()
            .filter(|block| block.owner == owner)
            .count()
    }

    pub fn zone_stats(&self, zone: usize) -> PfaResult<ZoneStats> {
        self.pfa.zone_stats(zone)
    }

    // ========================================================================
    // IPC
    // ========================================================================

    pub fn create_endpoint(&self) -> IpcResult<EndpointId> {
        self.create_endpoint_for(lim_ipc::KERNEL_ASID)
    }

    pub fn create_endpoint_for(&self, owner: AddressSpaceId) -> IpcResult<EndpointId> {
        let result = self.registry.create_endpoint_for(owner);
        match result {
            Ok(ep) => self.hal.debug_write(&format!(
                "[ipc] created endpoint {} for asid {}",
                ep, owner.0
            )),
            Err(e) => self.hal.debug_write(&format!(
                "[ipc] create endpoint for asid {} failed: {}",
                owner.0, e
            )),
        }
        result
    }

    /// Destroy `ep`; returns the number of pending messages dropped.
    pub fn destroy_endpoint(&self, ep: EndpointId) -> IpcResult<usize> {
        let dropped = self.registry.destroy_endpoint(ep)?;
        self.hal.debug_write(&format!(
            "[ipc] destroyed endpoint {} ({} pending messages dropped)",
            ep, dropped
        ));
        Ok(dropped)
    }

    pub fn send(&self, msg: &Message<'_>) -> IpcResult<()> {
        self.registry.send(msg)
    }

    pub fn recv(&self, ep: EndpointId, buf: &mut [u8], timeout_ms: i32) -> IpcResult<Received> {
        self.registry.recv(ep, buf, timeout_ms)
    }

    // ========================================================================
    // Syscall dispatch
    // ========================================================================

    /// Execute `syscall` on behalf of `caller`, recording request and
    /// response in the audit log.
    ///
    /// Arguments are untrusted: a caller may only release blocks it
    /// allocated itself, and anything else is rejected with an error instead
    /// of halting.
    pub fn dispatch(&self, caller: AddressSpaceId, syscall: Syscall) -> SyscallResult {
        let request_id = self.syslog.lock().log_request(
            caller,
            syscall.number(),
            syscall.audit_args(),
            self.hal.now_nanos(),
        );

        let result = self.execute(caller, &syscall);

        if let SyscallResult::Err(e) = &result {
            if self.config.trace_syscalls {
                self.hal.debug_write(&format!(
                    "[kernel] {} (0x{:02x}) from asid {} rejected: {} ({})",
                    syscall.name(),
                    syscall.number(),
                    caller.0,
                    e,
                    e.code()
                ));
            }
        }

        self.syslog.lock().log_response(
            caller,
            request_id,
            result.code(),
            result.value(),
            self.hal.now_nanos(),
        );
        result
    }

    fn execute(&self, caller: AddressSpaceId, syscall: &Syscall) -> SyscallResult {
        match syscall {
            Syscall::AllocPages { order } => self
                .alloc_user_pages(caller, *order as usize)
                .map(|pfn| pfn.0)
                .into(),
            Syscall::FreePages { pfn, order } => self
                .free_user_pages(caller, Pfn(*pfn), *order as usize)
                .map(|()| 0u64)
                .into(),
            Syscall::ZoneStats { zone } => match self.zone_stats(*zone as usize) {
                Ok(stats) => SyscallResult::Stats(stats),
                Err(e) => SyscallResult::Err(e.into()),
            },
            Syscall::CreateEndpoint => self.create_endpoint_for(caller).map(|ep| ep.0).into(),
            Syscall::DestroyEndpoint { endpoint } => self
                .destroy_endpoint(*endpoint)
                .map(|dropped| dropped as u64)
                .into(),
            Syscall::Send {
                src,
                dst,
                data,
                flags,
            } => {
                let msg = Message {
                    src: *src,
                    dst: *dst,
                    payload: data,
                    flags: *flags,
                };
                self.send(&msg).map(|()| 0u64).into()
            }
            Syscall::Recv {
                endpoint,
                buf_len,
                timeout_ms,
            } => {
                // No message exceeds max_msg_len, so a larger buffer gains nothing
                let len = (*buf_len).min(self.registry.config().max_msg_len);
                let mut data = vec![0u8; len];
                match self.recv(*endpoint, &mut data, *timeout_ms) {
                    Ok(received) => {
                        data.truncate(received.out_len.min(len));
                        SyscallResult::Message {
                            src: received.src,
                            out_len: received.out_len,
                            data,
                        }
                    }
                    Err(e) => SyscallResult::Err(KernelError::Ipc(e)),
                }
            }
        }
    }

    // ========================================================================
    // Invariants
    // ========================================================================

    /// Run the allocator and registry checkers. Meaningful at quiescent
    /// points only.
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut violations = check_all_invariants(&self.pfa);
        violations.extend(check_registry_invariants(&self.registry));
        violations
    }
}

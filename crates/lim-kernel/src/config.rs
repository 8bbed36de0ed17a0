//! Kernel configuration

use lim_ipc::RegistryConfig;
use serde::{Deserialize, Serialize};

use crate::error::BootError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelConfig {
    /// IPC registry settings
    pub registry: RegistryConfig,
    /// Audit events retained before the oldest are trimmed
    pub syslog_capacity: usize,
    /// Log every rejected syscall through the HAL
    pub trace_syscalls: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            syslog_capacity: 4096,
            trace_syscalls: false,
        }
    }
}

impl KernelConfig {
    pub fn validate(&self) -> Result<(), BootError> {
        self.registry.validate()?;
        if self.syslog_capacity == 0 {
            return Err(BootError::SyslogCapacity);
        }
        Ok(())
    }
}

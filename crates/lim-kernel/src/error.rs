//! Kernel errors

use core::fmt;
use lim_ipc::{ConfigError, IpcError};
use lim_pfa::PfaError;

/// Errors returned to syscall callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelError {
    /// Page frame allocator rejected the request
    Pfa(PfaError),
    /// IPC registry rejected the request
    Ipc(IpcError),
}

impl KernelError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pfa(e) => e.as_str(),
            Self::Ipc(e) => e.as_str(),
        }
    }

    /// Numeric ABI code.
    pub fn code(&self) -> i64 {
        match self {
            Self::Pfa(e) => e.code(),
            Self::Ipc(e) => e.code(),
        }
    }
}

impl From<PfaError> for KernelError {
    fn from(e: PfaError) -> Self {
        KernelError::Pfa(e)
    }
}

impl From<IpcError> for KernelError {
    fn from(e: IpcError) -> Self {
        KernelError::Ipc(e)
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kernel initialization failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootError {
    /// Allocator could not be built from the memory map
    Pfa(PfaError),
    /// Registry configuration rejected
    Config(ConfigError),
    /// Audit log capacity of zero
    SyslogCapacity,
}

impl BootError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pfa(e) => e.as_str(),
            Self::Config(e) => e.as_str(),
            Self::SyslogCapacity => "Audit log capacity must be non-zero",
        }
    }
}

impl From<PfaError> for BootError {
    fn from(e: PfaError) -> Self {
        BootError::Pfa(e)
    }
}

impl From<ConfigError> for BootError {
    fn from(e: ConfigError) -> Self {
        BootError::Config(e)
    }
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "boot failed: {}", self.as_str())
    }
}

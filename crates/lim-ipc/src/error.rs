//! IPC errors

use core::fmt;
use lim_primitives::errno;

/// Errors returned by registry operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IpcError {
    /// No endpoint slot or message buffer available
    NoMemory,
    /// Endpoint does not exist (never created, or destroyed)
    NoEntry,
    /// Destination queue is full
    Again,
    /// Unknown flag bits or malformed argument
    Invalid,
    /// Payload longer than the configured maximum
    MessageSize,
    /// No message queued
    Timeout,
}

impl IpcError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoMemory => "Out of memory",
            Self::NoEntry => "No such endpoint",
            Self::Again => "Queue full",
            Self::Invalid => "Invalid argument",
            Self::MessageSize => "Message too large",
            Self::Timeout => "No message available",
        }
    }

    /// Numeric ABI code.
    pub fn code(&self) -> i64 {
        match self {
            Self::NoMemory => errno::ERR_NOMEM,
            Self::NoEntry => errno::ERR_NOENT,
            Self::Again => errno::ERR_AGAIN,
            Self::Invalid => errno::ERR_INVAL,
            Self::MessageSize => errno::ERR_MSGSIZE,
            Self::Timeout => errno::ERR_TIMEOUT,
        }
    }

    /// Resource exhaustion the caller may retry later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NoMemory | Self::Again | Self::Timeout)
    }
}

impl fmt::Display for IpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub type IpcResult<T> = Result<T, IpcError>;

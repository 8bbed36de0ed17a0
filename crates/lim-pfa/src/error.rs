//! Allocator errors

use core::fmt;
use lim_primitives::errno;

/// Recoverable allocator errors. Contract breaches panic instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PfaError {
    /// No free block of the requested order or larger
    OutOfMemory,
    /// Order is not below `MAX_ORDER`
    InvalidOrder,
    /// Boot memory map contained no usable whole frame
    NoUsableMemory,
    /// Zone index does not exist on this node
    NoSuchZone,
    /// Usable memory spans more frames than one zone can describe
    ZoneTooLarge,
    /// Frame is outside every zone or not in a state the operation accepts
    InvalidFrame,
}

impl PfaError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OutOfMemory => "Out of physical frames",
            Self::InvalidOrder => "Invalid allocation order",
            Self::NoUsableMemory => "No usable memory in boot map",
            Self::NoSuchZone => "No such zone",
            Self::ZoneTooLarge => "Zone span too large",
            Self::InvalidFrame => "Invalid frame for operation",
        }
    }

    /// Numeric ABI code.
    pub fn code(&self) -> i64 {
        match self {
            Self::OutOfMemory | Self::NoUsableMemory => errno::ERR_NOMEM,
            Self::NoSuchZone => errno::ERR_NOENT,
            Self::InvalidOrder | Self::ZoneTooLarge | Self::InvalidFrame => errno::ERR_INVAL,
        }
    }
}

impl fmt::Display for PfaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub type PfaResult<T> = Result<T, PfaError>;

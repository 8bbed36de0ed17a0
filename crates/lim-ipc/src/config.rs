//! Registry configuration

use core::fmt;
use lim_pfa::{FRAME_SIZE, MAX_ORDER};
use serde::{Deserialize, Serialize};

/// Smallest accepted per-endpoint queue capacity.
pub const MIN_QUEUE_CAPACITY: usize = 16;

/// Default maximum payload length in bytes.
pub const DEFAULT_MAX_MSG_LEN: usize = 8192;

/// Largest payload a single buddy block can back.
pub const MAX_BACKED_MSG_LEN: usize = (FRAME_SIZE as usize) << (MAX_ORDER - 1);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Messages each endpoint can hold
    pub queue_capacity: usize,
    /// Maximum payload length
    pub max_msg_len: usize,
    /// Endpoint slots in the registry
    pub max_endpoints: usize,
    /// Freed message blocks kept per order before returning them to the PFA
    pub pool_cache_per_order: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 32,
            max_msg_len: DEFAULT_MAX_MSG_LEN,
            max_endpoints: 1024,
            pool_cache_per_order: 4,
        }
    }
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity < MIN_QUEUE_CAPACITY {
            return Err(ConfigError::QueueTooSmall);
        }
        if self.max_msg_len > MAX_BACKED_MSG_LEN {
            return Err(ConfigError::MessageLimitTooLarge);
        }
        if self.max_endpoints == 0 || self.max_endpoints > u32::MAX as usize {
            return Err(ConfigError::EndpointLimit);
        }
        Ok(())
    }
}

/// Rejected configuration values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigError {
    QueueTooSmall,
    MessageLimitTooLarge,
    EndpointLimit,
}

impl ConfigError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QueueTooSmall => "Queue capacity below minimum",
            Self::MessageLimitTooLarge => "Message limit exceeds largest block",
            Self::EndpointLimit => "Endpoint limit out of range",
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//! LimitlessOS Unsafe Primitives - Consolidated Unsafe Code TCB
//!
//! This crate contains ALL unsafe code in the LimitlessOS kernel core,
//! consolidated into a single auditable location. The allocator, IPC and
//! kernel crates use `#![deny(unsafe_code)]`.
//!
//! # Module Organization
//!
//! - `sync` - Test-and-set spin lock guarding zone and endpoint state
//! - `errno` - Numeric status codes of the kernel ABI
//! - `loom_tests` - Concurrency tests using loom (with `loom` feature)
//!
//! # Verification
//!
//! 1. **Kani proofs** (`cargo kani`): Lock exclusion on the single-thread path
//! 2. **Loom tests** (`cargo test --features loom`): Interleavings of lock/unlock
//! 3. **Unit tests**: Guard lifetimes, `try_lock`, `into_inner`

#![no_std]

pub mod errno;
pub mod sync;


pub use sync::{SpinLock, SpinLockGuard};

//! LimitlessOS Modular Reduction Kit
//!
//! Constant-time reductions modulo the Kyber prime `Q = 3329`, shared by the
//! lattice crypto embedded in the kernel.
//!
//! # Constant Time
//!
//! Every function in this crate is branch-free with input-independent
//! control flow and no secret-dependent memory access. Right shifts on
//! signed integers are arithmetic (sign-extending), which Rust guarantees
//! for `i16`/`i32` `>>`.
//!
//! # Module Organization
//!
//! - `params` - The prime and its derived constants
//! - `reduce` - Montgomery and Barrett reductions plus derived helpers

#![no_std]
#![deny(unsafe_code)]

pub mod params;
pub mod reduce;

pub use params::{BARRETT_V, KYBER_Q, MONT, MONT_SQUARED, QINV};
pub use reduce::{
    barrett_reduce, caddq, csubq, fqmul, montgomery_reduce, reduce_coefficients, to_montgomery,
};

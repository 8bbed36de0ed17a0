//! Montgomery and Barrett reductions
//!
//! # Properties (Verification Targets)
//!
//! 1. **Montgomery**: for `-Q·2^15 <= a < Q·2^15`,
//!    `montgomery_reduce(a) ≡ a·2^{-16} (mod Q)` and lies in `(-Q, Q)`
//! 2. **Barrett**: for every `i16`, `barrett_reduce(a) ≡ a (mod Q)` and lies
//!    in `[-(Q-1)/2, (Q-1)/2]`
//! 3. **Constant time**: no branches, no table lookups

use crate::params::{BARRETT_V, KYBER_Q, MONT_SQUARED, QINV};

/// Montgomery reduction: returns `a · 2^{-16} mod Q` in `(-Q, Q)`.
///
/// The input must satisfy `-Q·2^15 <= a < Q·2^15`. Outside that range the
/// result is unspecified, though the call never panics.
#[inline]
pub fn montgomery_reduce(a: i32) -> i16 {
    // Truncation to the low 16 bits is the point of both casts.
    let t = (a as i16).wrapping_mul(QINV);
    (a.wrapping_sub((t as i32) * (KYBER_Q as i32)) >> 16) as i16
}

/// Barrett reduction: returns the centered representative of `a mod Q`,
/// in `[-(Q-1)/2, (Q-1)/2]`.
#[inline]
pub fn barrett_reduce(a: i16) -> i16 {
    // The 2^25 term rounds the quotient to nearest, which centers the result.
    let t = ((BARRETT_V as i32) * (a as i32) + (1 << 25)) >> 26;
    let t = (t as i16).wrapping_mul(KYBER_Q);
    a.wrapping_sub(t)
}

/// Montgomery product `a · b · 2^{-16} mod Q`.
#[inline]
pub fn fqmul(a: i16, b: i16) -> i16 {
    montgomery_reduce(a as i32 * b as i32)
}

/// Convert `a` into Montgomery form (`a · 2^16 mod Q`), in `(-Q, Q)`.
#[inline]
pub fn to_montgomery(a: i16) -> i16 {
    montgomery_reduce(a as i32 * MONT_SQUARED as i32)
}

/// Add `Q` when `a` is negative. Maps `(-Q, Q)` onto `[0, Q)`.
#[inline]
pub fn caddq(a: i16) -> i16 {
    a.wrapping_add((a >> 15) & KYBER_Q)
}

/// Subtract `Q`, then add it back when the result went negative.
/// Maps `[0, 2Q)` onto `[0, Q)`.
#[inline]
pub fn csubq(a: i16) -> i16 {
    let a = a.wrapping_sub(KYBER_Q);
    a.wrapping_add((a >> 15) & KYBER_Q)
}

/// Barrett-reduce every coefficient in place.
pub fn reduce_coefficients(coeffs: &mut [i16]) {
    for c in coeffs.iter_mut() {
        *c = barrett_reduce(*c);
    }
}

// ============================================================================
// Kani Proofs
// ============================================================================

#[cfg(kani)]
mod proofs {
    use super::*;
    use crate::params::MONTGOMERY_INPUT_BOUND;

    /// Proof: Barrett output is centered and congruent for every i16
    #[kani::proof]
    fn barrett_range_and_congruence() {
        let a: i16 = kani::any();
        let r = barrett_reduce(a);
        kani::assert(r >= -(KYBER_Q - 1) / 2, "Barrett result below range");
        kani::assert(r <= (KYBER_Q - 1) / 2, "Barrett result above range");
        kani::assert(
            (a as i32 - r as i32) % KYBER_Q as i32 == 0,
            "Barrett result not congruent",
        );
    }

    /// Proof: Montgomery output lies in (-Q, Q) on its input domain
    #[kani::proof]
    fn montgomery_range() {
        let a: i32 = kani::any();
        kani::assume(a >= -MONTGOMERY_INPUT_BOUND && a < MONTGOMERY_INPUT_BOUND);
        let r = montgomery_reduce(a);
        kani::assert(r > -KYBER_Q && r < KYBER_Q, "Montgomery result out of range");
        kani::assert(
            (a as i64 - ((r as i64) << 16)) % KYBER_Q as i64 == 0,
            "Montgomery result not congruent to a * 2^-16",
        );
    }
}

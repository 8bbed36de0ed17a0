//! Modulus and derived constants

/// The Kyber prime.
pub const KYBER_Q: i16 = 3329;

/// `Q^{-1} mod 2^16`, as a signed 16-bit value (62209 unsigned).
pub const QINV: i16 = -3327;

/// Barrett multiplier `floor((2^26 + Q/2) / Q)`.
pub const BARRETT_V: i16 = (((1i32 << 26) + KYBER_Q as i32 / 2) / KYBER_Q as i32) as i16;

/// `2^16 mod Q`, centered.
pub const MONT: i16 = -1044;

/// `2^32 mod Q`. Multiplying by this and Montgomery-reducing lands in
/// Montgomery form.
pub const MONT_SQUARED: i16 = 1353;

/// Inclusive bound on the magnitude of a Montgomery input.
#[cfg(any(test, kani))]
pub(crate) const MONTGOMERY_INPUT_BOUND: i32 = KYBER_Q as i32 * (1 << 15);

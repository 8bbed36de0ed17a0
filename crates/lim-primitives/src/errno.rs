//! Status codes shared by every kernel-facing operation
//!
//! Operations return `OK` or one of the negative codes below. Crate-level
//! error enums map onto these through their `code()` methods.

/// Success.
pub const OK: i64 = 0;
/// Out of frames or message buffers.
pub const ERR_NOMEM: i64 = -1;
/// Endpoint (or zone) does not exist.
pub const ERR_NOENT: i64 = -2;
/// Destination queue is full; try again later.
pub const ERR_AGAIN: i64 = -3;
/// Invalid argument.
pub const ERR_INVAL: i64 = -4;
/// Payload exceeds the maximum message length.
pub const ERR_MSGSIZE: i64 = -5;
/// Nothing to receive.
pub const ERR_TIMEOUT: i64 = -6;

/// Short name for a status code, for diagnostics.
pub fn name(code: i64) -> &'static str {
    match code {
        OK => "OK",
        ERR_NOMEM => "ERR_NOMEM",
        ERR_NOENT => "ERR_NOENT",
        ERR_AGAIN => "ERR_AGAIN",
        ERR_INVAL => "ERR_INVAL",
        ERR_MSGSIZE => "ERR_MSGSIZE",
        ERR_TIMEOUT => "ERR_TIMEOUT",
        _ => "ERR_UNKNOWN",
    }
}

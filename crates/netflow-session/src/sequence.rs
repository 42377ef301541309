//! Sequence number continuity checks.

/// Default tolerance for sequence number gaps, in either direction.
///
/// Exporters increment the header sequence by one per packet (v9) or by the
/// number of records sent (IPFIX); anything within this window is treated as
/// loss or reordering rather than a restart.
pub const MAX_SEQUENCE_DIFFERENCE: u32 = 1000;

/// Returns true if `next` is a plausible continuation of `prev`.
///
/// Both distances are computed modulo 2^32, so a counter wrapping from
/// `u32::MAX` to zero is a continuation and not a reset.
pub fn is_valid_sequence(prev: u32, next: u32, tolerance: u32) -> bool {
    next.wrapping_sub(prev) < tolerance || prev.wrapping_sub(next) < tolerance
}

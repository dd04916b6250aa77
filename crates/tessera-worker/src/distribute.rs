//! Zone distribution of pool capacity
//!
//! A pool's bounds are split across its zones as evenly as possible, with the
//! remainder going to the lowest-indexed zones first, so that the per-zone
//! values always add back up to the pool value.

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// Share of `total` for the zone at `zone_index` out of `zone_count` zones
///
/// Returns 0 when there are no zones.
pub fn distribute(zone_index: usize, total: i32, zone_count: usize) -> i32 {
    let Ok(count) = i32::try_from(zone_count) else {
        return 0;
    };
    if count == 0 {
        return 0;
    }

    let base = total.div_euclid(count);
    let remainder = total.rem_euclid(count);
    match i32::try_from(zone_index) {
        Ok(index) if index < remainder => base + 1,
        _ => base,
    }
}

/// Per-zone value of a surge or unavailability tolerance
///
/// Percentages are already relative to the zone's group and pass through
/// unchanged. Absolute counts are split with [`distribute`].
/// `_reference_total` is the pool bound the tolerance relates to; it is not
/// used for clamping.
pub fn distribute_int_or_percent(
    zone_index: usize,
    value: &IntOrString,
    zone_count: usize,
    _reference_total: i32,
) -> IntOrString {
    match value {
        IntOrString::Int(v) => IntOrString::Int(distribute(zone_index, *v, zone_count)),
        IntOrString::String(s) => IntOrString::String(s.clone()),
    }
}

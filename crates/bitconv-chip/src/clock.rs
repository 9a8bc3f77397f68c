//! Fabric clock.
//!
//! Both cycle counters tick on the 50 MHz fabric clock.

/// Fabric clock frequency in Hz.
pub const FABRIC_HZ: f64 = 50e6;

/// Convert a cycle count to seconds at `clock_hz`.
#[must_use]
pub fn cycles_to_seconds(cycles: u64, clock_hz: f64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let cycles = cycles as f64;
    cycles / clock_hz
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifty_million_cycles_is_one_second() {
        assert!((cycles_to_seconds(50_000_000, FABRIC_HZ) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn zero_cycles_is_zero_seconds() {
        assert_eq!(cycles_to_seconds(0, FABRIC_HZ), 0.0);
    }
}

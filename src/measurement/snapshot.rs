//! Counter snapshots and the arithmetic used to turn them into durations.
//!
//! A snapshot holds every counter as an `f64`, converted once at read time.
//! Sums, minima, maxima and per-invocation scaling then need no casts.
//!
//! # Subtraction convention
//!
//! `SubAssign` is deliberately *reversed*: `before -= &after` leaves
//! `after - before` in `before`. The usual pattern is:
//!
//! ```ignore
//! let mut window = source.snapshot();   // before
//! run_probe();
//! window -= &source.snapshot();         // window now holds after - before
//! ```

use std::ops::{AddAssign, DivAssign, SubAssign};

use serde::{Deserialize, Serialize};

/// Total number of counters in a snapshot.
pub const COUNTERS_COUNT: usize = 10;

/// Number of freely configurable counters (everything except cycles and retired).
pub const CONFIGURABLE_COUNT: usize = COUNTERS_COUNT - 2;

/// Index of the cycle counter.
pub const CYCLES: usize = 0;

/// Index of the retired-instruction counter.
pub const RETIRED: usize = 1;

/// A reading of all counters plus a wall-clock timestamp.
///
/// The same type represents both a point reading and a duration between two
/// readings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    /// Raw counter values: `[cycles, retired, configurable[0..8]]`.
    pub values: [f64; COUNTERS_COUNT],
    /// Wall-clock time in nanoseconds.
    pub realtime_ns: f64,
}

impl CounterSnapshot {
    /// Build a snapshot from raw integer counter readings.
    pub fn from_raw(raw: &[u64; COUNTERS_COUNT], realtime_ns: f64) -> Self {
        let mut values = [0.0; COUNTERS_COUNT];
        for (value, &count) in values.iter_mut().zip(raw.iter()) {
            *value = count as f64;
        }
        Self { values, realtime_ns }
    }

    /// A snapshot with every field (counters and time) set to `value`.
    pub fn splat(value: f64) -> Self {
        Self {
            values: [value; COUNTERS_COUNT],
            realtime_ns: value,
        }
    }

    /// All-zero snapshot, the identity for accumulation.
    pub fn zero() -> Self {
        Self::splat(0.0)
    }

    /// Cycle count.
    #[inline]
    pub fn cycles(&self) -> f64 {
        self.values[CYCLES]
    }

    /// Retired-instruction count.
    #[inline]
    pub fn retired(&self) -> f64 {
        self.values[RETIRED]
    }

    /// Wall-clock nanoseconds.
    #[inline]
    pub fn ns(&self) -> f64 {
        self.realtime_ns
    }

    /// The eight configurable counters.
    pub fn configurable(&self) -> &[f64] {
        &self.values[2..]
    }

    /// Componentwise minimum, in place.
    pub fn min_with(&mut self, other: &Self) -> &mut Self {
        for (value, &o) in self.values.iter_mut().zip(other.values.iter()) {
            *value = value.min(o);
        }
        self.realtime_ns = self.realtime_ns.min(other.realtime_ns);
        self
    }

    /// Componentwise maximum, in place.
    pub fn max_with(&mut self, other: &Self) -> &mut Self {
        for (value, &o) in self.values.iter_mut().zip(other.values.iter()) {
            *value = value.max(o);
        }
        self.realtime_ns = self.realtime_ns.max(other.realtime_ns);
        self
    }
}

impl Default for CounterSnapshot {
    fn default() -> Self {
        Self::zero()
    }
}

/// Reversed subtraction: `self = other - self`.
///
/// See the [module documentation](self) for the calling convention.
impl SubAssign<&CounterSnapshot> for CounterSnapshot {
    fn sub_assign(&mut self, other: &CounterSnapshot) {
        for (value, &o) in self.values.iter_mut().zip(other.values.iter()) {
            *value = o - *value;
        }
        self.realtime_ns = other.realtime_ns - self.realtime_ns;
    }
}

impl AddAssign<&CounterSnapshot> for CounterSnapshot {
    fn add_assign(&mut self, other: &CounterSnapshot) {
        for (value, &o) in self.values.iter_mut().zip(other.values.iter()) {
            *value += o;
        }
        self.realtime_ns += other.realtime_ns;
    }
}

impl DivAssign<f64> for CounterSnapshot {
    fn div_assign(&mut self, divisor: f64) {
        for value in self.values.iter_mut() {
            *value /= divisor;
        }
        self.realtime_ns /= divisor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(cycles: u64, ns: f64) -> CounterSnapshot {
        let mut raw = [0u64; COUNTERS_COUNT];
        raw[CYCLES] = cycles;
        raw[RETIRED] = cycles / 2;
        CounterSnapshot::from_raw(&raw, ns)
    }

    #[test]
    fn test_sub_assign_is_reversed() {
        let mut window = reading(1_000, 50.0);
        let after = reading(4_000, 80.0);

        window -= &after;

        assert_eq!(window.cycles(), 3_000.0);
        assert_eq!(window.retired(), 1_500.0);
        assert_eq!(window.ns(), 30.0);
    }

    #[test]
    fn test_min_max_componentwise() {
        let mut lo = CounterSnapshot::splat(f64::MAX);
        let mut hi = CounterSnapshot::zero();
        for (cycles, ns) in [(300, 9.0), (100, 12.0), (200, 3.0)] {
            let r = reading(cycles, ns);
            lo.min_with(&r);
            hi.max_with(&r);
        }
        assert_eq!(lo.cycles(), 100.0);
        assert_eq!(lo.ns(), 3.0);
        assert_eq!(hi.cycles(), 300.0);
        assert_eq!(hi.ns(), 12.0);
    }

    #[test]
    fn test_accumulate_and_scale() {
        let mut sum = CounterSnapshot::zero();
        sum += &reading(100, 10.0);
        sum += &reading(300, 30.0);
        sum /= 2.0;
        assert_eq!(sum.cycles(), 200.0);
        assert_eq!(sum.ns(), 20.0);
        assert_eq!(sum.configurable().len(), CONFIGURABLE_COUNT);
    }
}

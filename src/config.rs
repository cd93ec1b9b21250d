//! Configuration for latency sweeps.

use std::fmt;

use crate::measurement::{Averaging, CounterSpec, EventSet, Scheduling};

/// 1 MiB.
pub const MIB: usize = 1024 * 1024;

/// Default seed for randomised topologies.
pub const DEFAULT_SEED: u64 = 0x5EED_CAFE;

/// Configuration options for `LatencyBench`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Measurement windows per depth (default: 3).
    pub outer_count: u32,

    /// Probe invocations per window (default: 1).
    ///
    /// The per-depth repeat count is folded into the probe itself, so one
    /// invocation already spans many passes over the structure.
    pub inner_count: u32,

    /// Statistic reported as the cost (default: min).
    pub averaging: Averaging,

    /// Seed for every randomised topology build (default: `0x5EED_CAFE`).
    ///
    /// The same (pattern, node count, box size, seed) always yields the same graph.
    pub seed: u64,

    /// Largest region any test may sweep to, in bytes (default: 1500 MiB).
    pub max_depth_bytes: usize,

    /// Target pointer dereferences per measured window at the smallest depths
    /// (default: 10,000,000). Larger depths get proportionally fewer repeats.
    pub min_inner_count: u64,

    /// Counter backend selection (default: Auto).
    pub counter_spec: CounterSpec,

    /// Thread placement for the measuring thread.
    pub scheduling: Scheduling,

    /// Events for the eight configurable counters.
    pub events: EventSet,

    /// Run environment checks before the first suite (default: true).
    pub preflight: bool,

    /// Walk every built graph to check it is a single cycle before measuring
    /// it (default: on in debug builds).
    pub verify: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            outer_count: 3,
            inner_count: 1,
            averaging: Averaging::Min,
            seed: DEFAULT_SEED,
            max_depth_bytes: 1500 * MIB,
            min_inner_count: 10_000_000,
            counter_spec: CounterSpec::Auto,
            scheduling: Scheduling::default(),
            events: EventSet::default(),
            preflight: true,
            verify: cfg!(debug_assertions),
        }
    }
}

impl Config {
    /// Reduced sweep for quick runs: one window per depth, regions up to
    /// 60 MiB, and a twentieth of the default repeat target.
    pub fn fast() -> Self {
        Self {
            outer_count: 1,
            max_depth_bytes: 60 * MIB,
            min_inner_count: 500_000,
            ..Self::default()
        }
    }

    /// Check the counts that must be non-zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inner_count == 0 {
            return Err(ConfigError::ZeroInnerCount);
        }
        if self.outer_count == 0 {
            return Err(ConfigError::ZeroOuterCount);
        }
        if self.min_inner_count == 0 {
            return Err(ConfigError::ZeroMinInnerCount);
        }
        Ok(())
    }
}

/// Invalid measurement configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Inner count (probe invocations per window) was zero.
    ZeroInnerCount,
    /// Outer count (windows) was zero.
    ZeroOuterCount,
    /// Repeat target for the depth table was zero.
    ZeroMinInnerCount,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroInnerCount => write!(f, "inner count must be at least 1"),
            ConfigError::ZeroOuterCount => write!(f, "outer count must be at least 1"),
            ConfigError::ZeroMinInnerCount => write!(f, "minimum inner count must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {}

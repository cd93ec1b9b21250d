//! Reducing repeated counter windows to a min/mean/max cost per invocation.

use serde::{Deserialize, Serialize};

use super::counters::CounterSource;
use super::snapshot::CounterSnapshot;
use crate::config::ConfigError;

/// Which of the three statistics a caller wants as "the" cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum Averaging {
    /// Smallest window. Interference only ever inflates cost, so this is the
    /// best estimate of the undisturbed value.
    #[default]
    Min,
    /// Arithmetic mean over the outer repetitions.
    Mean,
    /// Largest window.
    Max,
}

/// Per-invocation counter deltas from one averaging run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Componentwise minimum.
    pub min: CounterSnapshot,
    /// Componentwise mean.
    pub mean: CounterSnapshot,
    /// Componentwise maximum.
    pub max: CounterSnapshot,
}

impl Measurement {
    /// Pick one statistic.
    pub fn select(&self, averaging: Averaging) -> &CounterSnapshot {
        match averaging {
            Averaging::Min => &self.min,
            Averaging::Mean => &self.mean,
            Averaging::Max => &self.max,
        }
    }
}

/// Runs a probe between counter snapshots and folds the windows.
///
/// One unmeasured warm-up run precedes `outer` windows of `inner` back-to-back
/// invocations each. Every window is divided by `inner` before folding, so the
/// result is cost per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleAverager {
    inner: u32,
    outer: u32,
}

impl CycleAverager {
    /// Create an averager; both counts must be at least one.
    pub fn new(inner: u32, outer: u32) -> Result<Self, ConfigError> {
        if inner == 0 {
            return Err(ConfigError::ZeroInnerCount);
        }
        if outer == 0 {
            return Err(ConfigError::ZeroOuterCount);
        }
        Ok(Self { inner, outer })
    }

    /// Probe invocations per window.
    pub fn inner(&self) -> u32 {
        self.inner
    }

    /// Number of windows.
    pub fn outer(&self) -> u32 {
        self.outer
    }

    /// Measure `probe` against `source`.
    pub fn run<S, F>(&self, source: &mut S, mut probe: F) -> Measurement
    where
        S: CounterSource + ?Sized,
        F: FnMut(),
    {
        source.reassert_scheduling();
        probe();

        let mut min = CounterSnapshot::splat(f64::MAX);
        let mut max = CounterSnapshot::zero();
        let mut sum = CounterSnapshot::zero();

        for _ in 0..self.outer {
            source.reassert_scheduling();
            let mut window = source.snapshot();
            for _ in 0..self.inner {
                probe();
            }
            window -= &source.snapshot();
            window /= f64::from(self.inner);

            min.min_with(&window);
            max.max_with(&window);
            sum += &window;
        }

        sum /= f64::from(self.outer);

        Measurement {
            min,
            mean: sum,
            max,
        }
    }
}

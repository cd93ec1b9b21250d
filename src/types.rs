//! Common value types.

use serde::{Deserialize, Serialize};

use crate::measurement::{Averaging, CounterSnapshot, Measurement};

/// Min, mean and max of one quantity over the measured windows.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Statistic {
    /// Smallest window.
    pub min: f64,
    /// Mean over windows.
    pub mean: f64,
    /// Largest window.
    pub max: f64,
}

impl Statistic {
    /// Extract one component from each of a measurement's snapshots.
    pub fn from_measurement<F>(measurement: &Measurement, component: F) -> Self
    where
        F: Fn(&CounterSnapshot) -> f64,
    {
        Self {
            min: component(&measurement.min),
            mean: component(&measurement.mean),
            max: component(&measurement.max),
        }
    }

    /// Divide all three values by `by`.
    pub fn per(self, by: f64) -> Self {
        Self {
            min: self.min / by,
            mean: self.mean / by,
            max: self.max / by,
        }
    }

    /// The requested value.
    pub fn get(&self, averaging: Averaging) -> f64 {
        match averaging {
            Averaging::Min => self.min,
            Averaging::Mean => self.mean,
            Averaging::Max => self.max,
        }
    }

    /// Whether `min <= mean <= max` holds.
    pub fn is_ordered(&self) -> bool {
        self.min <= self.mean && self.mean <= self.max
    }
}

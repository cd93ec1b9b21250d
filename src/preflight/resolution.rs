//! Counter resolution check.
//!
//! Without a PMU backend the cycle column is counted in timer ticks. On
//! aarch64 the virtual timer runs at ~24 MHz (~41 ns per tick), so the
//! shortest windows need enough loads to span many ticks.

use serde::{Deserialize, Serialize};

use crate::measurement::Backend;

/// Windows shorter than this many timer ticks are flagged.
pub const MIN_TICKS_PER_WINDOW: f64 = 1000.0;

/// Warning from the resolution check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResolutionWarning {
    /// The cycle column counts timer ticks, not core cycles.
    NoCoreCycles {
        /// Backend in use.
        backend: String,
    },

    /// The shortest expected window spans too few timer ticks.
    CoarseTimer {
        /// Timer resolution in nanoseconds.
        timer_resolution_ns: f64,
        /// Expected duration of the shortest window.
        window_ns: f64,
    },
}

impl ResolutionWarning {
    /// Get a human-readable description of the warning.
    pub fn description(&self) -> String {
        match self {
            ResolutionWarning::NoCoreCycles { backend } => format!(
                "Counting with the {} backend: cycles are timer ticks, not core cycles. \
                 Enable the kperf or perf feature and run with elevated privileges \
                 for core cycles and event counters.",
                backend
            ),
            ResolutionWarning::CoarseTimer {
                timer_resolution_ns,
                window_ns,
            } => format!(
                "Timer resolution (~{:.1} ns) is coarse for the shortest window \
                 (~{:.0} ns). Raise the minimum inner count.",
                timer_resolution_ns, window_ns
            ),
        }
    }
}

/// Check whether counter readings are fine-grained enough.
///
/// `window_ns` is the shortest window expected: the minimum inner count at
/// roughly one nanosecond per L1 hit.
pub fn resolution_check(
    backend: Backend,
    timer_resolution_ns: f64,
    window_ns: f64,
) -> Vec<ResolutionWarning> {
    let mut warnings = Vec::new();
    if backend.counts_core_cycles() {
        return warnings;
    }

    warnings.push(ResolutionWarning::NoCoreCycles {
        backend: backend.to_string(),
    });
    if window_ns < timer_resolution_ns * MIN_TICKS_PER_WINDOW {
        warnings.push(ResolutionWarning::CoarseTimer {
            timer_resolution_ns,
            window_ns,
        });
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pmu_backends_pass() {
        assert!(resolution_check(Backend::Perf, 41.0, 1.0).is_empty());
        assert!(resolution_check(Backend::Kperf, 41.0, 1.0).is_empty());
    }

    #[test]
    fn test_timer_backend_flags() {
        let warnings = resolution_check(Backend::Timer, 0.3, 10_000_000.0);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], ResolutionWarning::NoCoreCycles { .. }));

        // 24 MHz timer against a 20 µs window.
        let warnings = resolution_check(Backend::Timer, 41.7, 20_000.0);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[1].description().contains("41.7"));
    }
}

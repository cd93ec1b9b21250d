//! Preflight checks to validate the measurement setup before a sweep.
//!
//! All checks are advisory: they are logged as warnings and never stop a run.
//!
//! # Checks Performed
//!
//! - **Resolution**: whether the cycle column counts core cycles, and whether
//!   timer ticks are fine enough for the shortest windows
//! - **System**: platform-specific checks (CPU governor, perf_event access,
//!   transparent huge pages, virtualisation, load) on Linux

mod resolution;
mod system;

pub use resolution::{resolution_check, ResolutionWarning, MIN_TICKS_PER_WINDOW};
pub use system::{system_check, SystemWarning};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::measurement::Backend;

/// Warnings collected from preflight checks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreflightResult {
    /// Warnings from the resolution check.
    pub resolution: Vec<ResolutionWarning>,

    /// Warnings from system checks.
    pub system: Vec<SystemWarning>,
}

impl PreflightResult {
    /// Create an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of warnings.
    pub fn count(&self) -> usize {
        self.resolution.len() + self.system.len()
    }

    /// Check if there are any warnings.
    pub fn has_warnings(&self) -> bool {
        self.count() > 0
    }

    /// Human-readable descriptions, resolution first.
    pub fn descriptions(&self) -> Vec<String> {
        self.resolution
            .iter()
            .map(ResolutionWarning::description)
            .chain(self.system.iter().map(SystemWarning::description))
            .collect()
    }

    /// Log every warning.
    pub fn log(&self) {
        for description in self.descriptions() {
            warn!("{}", description);
        }
    }
}

/// Run all preflight checks.
pub fn run_all_checks(
    backend: Backend,
    timer_resolution_ns: f64,
    window_ns: f64,
) -> PreflightResult {
    PreflightResult {
        resolution: resolution_check(backend, timer_resolution_ns, window_ns),
        system: system_check(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preflight_result_default() {
        let result = PreflightResult::new();
        assert!(!result.has_warnings());
        assert!(result.descriptions().is_empty());
    }

    #[test]
    fn test_warnings_count() {
        let mut result = PreflightResult::new();
        result.system.push(SystemWarning::PerfEventRestricted { level: 3 });
        result.resolution.push(ResolutionWarning::NoCoreCycles {
            backend: "timer".to_string(),
        });
        assert_eq!(result.count(), 2);
        assert!(result.descriptions()[0].contains("timer backend"));
    }
}

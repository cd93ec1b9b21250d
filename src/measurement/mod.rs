//! Counter access and the measurement protocol.
//!
//! This module provides:
//! - [`CounterSnapshot`]: ten counters plus a wall-clock timestamp
//! - [`PerformanceCounters`]: the process-wide counter handle
//! - [`CycleAverager`]: warm-up, repeated windows, min/mean/max
//!
//! # Counter backends
//!
//! By default snapshots come from the platform timestamp counter:
//! - **x86_64**: `rdtsc` (reference ticks, not core cycles)
//! - **aarch64**: `cntvct_el0` (24 MHz on Apple Silicon)
//!
//! For real core cycles and configurable events, enable a PMU backend and run
//! with elevated privileges:
//!
//! ```toml
//! [dependencies]
//! mem-latency = { version = "0.1", features = ["kperf"] }  # macOS
//! mem-latency = { version = "0.1", features = ["perf"] }   # Linux
//! ```

mod averager;
mod counters;
pub mod events;
mod scheduling;
mod snapshot;
mod timer;

#[cfg(feature = "kperf")]
pub mod kperf;

#[cfg(feature = "perf")]
pub mod perf;

pub use averager::{Averaging, CycleAverager, Measurement};
pub use counters::{Backend, CounterError, CounterSource, CounterSpec, PerformanceCounters};
pub use events::EventSet;
pub use scheduling::Scheduling;
pub use snapshot::{CounterSnapshot, CONFIGURABLE_COUNT, COUNTERS_COUNT, CYCLES, RETIRED};
pub use timer::{rdtsc, ticks_per_ns, wall_ns, Timer};

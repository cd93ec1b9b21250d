//! # mem-latency
//!
//! Characterise the memory hierarchy of a CPU with pointer-chasing probes.
//!
//! A probe walks a single-cycle linked structure built in one contiguous
//! region. Each step is a load whose address depends on the previous load,
//! so the time per step is the load-to-use latency of whichever level of
//! the hierarchy holds the region. Sweeping the region size, the visiting
//! order and the node size exposes:
//! - cache capacities and line lengths
//! - TLB reach and page size
//! - L1 associativity and sectoring
//! - memory-level parallelism (independent chains walked together)
//!
//! ## Quick Start
//!
//! ```ignore
//! use mem_latency::{LatencyBench, Suite, output};
//!
//! let report = LatencyBench::fast().run(Suite::Primary)?;
//! println!("{}", output::format_report(&report));
//! ```
//!
//! ## Building one graph by hand
//!
//! ```ignore
//! use mem_latency::topology::{NodeArena, NodeLayout, TopologyBuilder, TraversalPattern};
//! use mem_latency::{Probe, TraversalRunner};
//!
//! let builder = TopologyBuilder::new(NodeLayout::pointer(64), TraversalPattern::FullRandom);
//! let mut arena = NodeArena::new(4096 * 64)?;
//! let graph = builder.build(&mut arena, 4096)?;
//! TraversalRunner::new(&graph, Probe::Chase)?.run(graph.pass_len() * 100);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
mod bench;
mod config;
mod depth;
mod error;
mod result;
mod suites;
mod traversal;
mod types;

// Functional modules
pub mod measurement;
pub mod output;
pub mod preflight;
pub mod topology;

// Re-exports for public API
pub use bench::LatencyBench;
pub use config::{Config, ConfigError, DEFAULT_SEED, MIB};
pub use depth::{BaseDepth, DepthEntry, DepthSequencer, INTERESTING_SIZES};
pub use error::Error;
pub use measurement::{Averaging, CounterSpec, PerformanceCounters};
pub use result::{DepthResult, GroupReport, Metadata, SuiteReport, TestReport};
pub use suites::{Suite, TestGroup, TestSpec, UnknownSuite, L1_DEPTH_BYTES, PAGE_BYTES};
pub use traversal::{Probe, TraversalRunner, SINK};
pub use types::Statistic;

/// Run `suite` with the default configuration.
///
/// Binds the process-wide performance counters for the duration of the run.
pub fn run(suite: Suite) -> Result<SuiteReport, Error> {
    LatencyBench::new().run(suite)
}

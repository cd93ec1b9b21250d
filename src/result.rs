//! Result types for latency sweeps.

use serde::{Deserialize, Serialize};

use crate::measurement::{Averaging, CONFIGURABLE_COUNT};
use crate::suites::Suite;
use crate::topology::TraversalPattern;
use crate::traversal::Probe;
use crate::types::Statistic;

/// Measured cost of one depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthResult {
    /// Nodes in the graph, after box truncation.
    pub nodes: usize,

    /// Region size in bytes (`nodes` × node size).
    pub depth_bytes: usize,

    /// Operations in one pass. Smaller than `nodes` for clamped patterns.
    pub ops_per_pass: usize,

    /// Passes per measured window.
    pub repeat: u64,

    /// Counter cycles per pass.
    pub cycles: Statistic,

    /// Wall-clock nanoseconds per pass.
    pub ns: Statistic,

    /// Configurable counters per pass, using the report's averaging.
    pub events: [f64; CONFIGURABLE_COUNT],
}

impl DepthResult {
    /// Cycles per operation.
    pub fn cycles_per_op(&self, averaging: Averaging) -> f64 {
        self.cycles.get(averaging) / self.ops_per_pass as f64
    }

    /// Nanoseconds per operation.
    pub fn ns_per_op(&self, averaging: Averaging) -> f64 {
        self.ns.get(averaging) / self.ops_per_pass as f64
    }

    /// Counter cycles per nanosecond over the window.
    pub fn cycles_per_ns(&self, averaging: Averaging) -> f64 {
        let ns = self.ns.get(averaging);
        if ns > 0.0 {
            self.cycles.get(averaging) / ns
        } else {
            0.0
        }
    }
}

/// All depths of one test row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    /// Row label.
    pub label: String,
    /// Probe used.
    pub probe: Probe,
    /// Pattern used.
    pub pattern: TraversalPattern,
    /// Node size in bytes.
    pub node_size: usize,
    /// Box size in bytes, for box-local patterns.
    pub box_bytes: Option<usize>,
    /// One entry per depth, in sweep order.
    pub depths: Vec<DepthResult>,
}

/// Reports sharing one heading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupReport {
    /// Heading.
    pub title: String,
    /// Tests in run order.
    pub tests: Vec<TestReport>,
}

/// How a suite was measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Counter backend name.
    pub backend: String,

    /// Whether the cycle column counts core cycles or timer ticks.
    pub core_cycles: bool,

    /// Statistic reported as the cost.
    pub averaging: Averaging,

    /// Windows per depth.
    pub outer_count: u32,

    /// Topology seed.
    pub seed: u64,

    /// Repeat target for the depth table.
    pub min_inner_count: u64,

    /// Largest region swept, in bytes.
    pub max_depth_bytes: usize,

    /// Wall time for the whole suite.
    pub runtime_secs: f64,
}

/// Everything a suite run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Suite that ran.
    pub suite: Suite,
    /// Groups in run order.
    pub groups: Vec<GroupReport>,
    /// Run parameters.
    pub metadata: Metadata,
}

impl SuiteReport {
    /// Every test in run order.
    pub fn tests(&self) -> impl Iterator<Item = &TestReport> {
        self.groups.iter().flat_map(|g| g.tests.iter())
    }
}

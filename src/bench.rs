//! Main `LatencyBench` entry point and builder.

use std::time::Instant;

use log::{debug, info};

use crate::config::Config;
use crate::depth::DepthSequencer;
use crate::error::Error;
use crate::measurement::{
    Averaging, CounterSnapshot, CounterSource, CounterSpec, CycleAverager, EventSet,
    PerformanceCounters, Scheduling, CONFIGURABLE_COUNT,
};
use crate::preflight::run_all_checks;
use crate::result::{DepthResult, GroupReport, Metadata, SuiteReport, TestReport};
use crate::suites::{Suite, TestSpec};
use crate::topology::{NodeArena, TopologyBuilder};
use crate::traversal::TraversalRunner;
use crate::types::Statistic;

/// Main entry point for latency sweeps.
///
/// Use the builder pattern to configure and run suites.
///
/// # Example
///
/// ```ignore
/// use mem_latency::{LatencyBench, Suite};
///
/// let report = LatencyBench::fast()
///     .seed(7)
///     .run(Suite::Primary)?;
///
/// for test in report.tests() {
///     println!("{}: {} depths", test.label, test.depths.len());
/// }
/// ```
///
/// # Counter backends
///
/// [`run`](Self::run) binds the process-wide counters for the duration of
/// the suite. With the `kperf` or `perf` feature and enough privileges the
/// cycle column counts core cycles; otherwise it counts timer ticks. Use
/// [`run_with`](Self::run_with) to measure against another [`CounterSource`].
#[derive(Debug, Clone, Default)]
pub struct LatencyBench {
    config: Config,
}

impl LatencyBench {
    /// Create with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with the reduced configuration from [`Config::fast`].
    pub fn fast() -> Self {
        Self::with_config(Config::fast())
    }

    /// Create from an explicit configuration.
    pub fn with_config(config: Config) -> Self {
        Self { config }
    }

    /// Current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Set the number of measured windows per depth.
    pub fn outer_count(mut self, n: u32) -> Self {
        self.config.outer_count = n;
        self
    }

    /// Set the seed for randomised topologies.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Choose the statistic reported as the cost.
    pub fn averaging(mut self, averaging: Averaging) -> Self {
        self.config.averaging = averaging;
        self
    }

    /// Cap every sweep at `bytes`.
    pub fn max_depth_bytes(mut self, bytes: usize) -> Self {
        self.config.max_depth_bytes = bytes;
        self
    }

    /// Set the load target per window at the smallest depths.
    pub fn min_inner_count(mut self, n: u64) -> Self {
        self.config.min_inner_count = n;
        self
    }

    /// Select the counter backend.
    pub fn counter_spec(mut self, spec: CounterSpec) -> Self {
        self.config.counter_spec = spec;
        self
    }

    /// Set the thread placement policy.
    pub fn scheduling(mut self, scheduling: Scheduling) -> Self {
        self.config.scheduling = scheduling;
        self
    }

    /// Program the configurable counters.
    pub fn events(mut self, events: EventSet) -> Self {
        self.config.events = events;
        self
    }

    /// Enable or disable environment checks.
    pub fn preflight(mut self, enabled: bool) -> Self {
        self.config.preflight = enabled;
        self
    }

    /// Enable or disable the single-cycle check on every built graph.
    pub fn verify(mut self, enabled: bool) -> Self {
        self.config.verify = enabled;
        self
    }

    /// Bind the performance counters and run `suite`.
    ///
    /// Fails with [`CounterError::AlreadyBound`](crate::measurement::CounterError::AlreadyBound)
    /// if another handle is alive in this process.
    pub fn run(&self, suite: Suite) -> Result<SuiteReport, Error> {
        self.config.validate()?;

        let mut counters = PerformanceCounters::bind_with(
            self.config.counter_spec,
            self.config.scheduling,
            self.config.events,
        )?;

        if self.config.preflight {
            // One window at the smallest depths is roughly one ns per load.
            run_all_checks(
                counters.backend(),
                counters.timer_resolution_ns().unwrap_or(0.0),
                self.config.min_inner_count as f64,
            )
            .log();
        }

        self.run_with(suite, &mut counters)
    }

    /// Run `suite` against an already bound counter source.
    pub fn run_with<S>(&self, suite: Suite, source: &mut S) -> Result<SuiteReport, Error>
    where
        S: CounterSource + ?Sized,
    {
        self.config.validate()?;
        let start = Instant::now();

        let mut groups = Vec::new();
        for group in suite.groups(self.config.max_depth_bytes) {
            info!("{}", group.title);
            let mut tests = Vec::with_capacity(group.tests.len());
            for test in &group.tests {
                tests.push(self.run_test(test, source)?);
            }
            groups.push(GroupReport {
                title: group.title,
                tests,
            });
        }

        let backend = source.backend();
        Ok(SuiteReport {
            suite,
            groups,
            metadata: Metadata {
                backend: backend.to_string(),
                core_cycles: backend.counts_core_cycles(),
                averaging: self.config.averaging,
                outer_count: self.config.outer_count,
                seed: self.config.seed,
                min_inner_count: self.config.min_inner_count,
                max_depth_bytes: self.config.max_depth_bytes,
                runtime_secs: start.elapsed().as_secs_f64(),
            },
        })
    }

    /// Sweep one test row.
    ///
    /// The arena is allocated once for the largest depth and every smaller
    /// graph is rebuilt into it. Costs are per pass: the measured window is
    /// divided by the entry's repeat count.
    pub fn run_test<S>(&self, test: &TestSpec, source: &mut S) -> Result<TestReport, Error>
    where
        S: CounterSource + ?Sized,
    {
        let layout = test.layout;
        let mut report = TestReport {
            label: test.label.clone(),
            probe: test.probe,
            pattern: test.pattern,
            node_size: layout.size,
            box_bytes: test.pattern.is_box_local().then_some(test.box_bytes),
            depths: Vec::new(),
        };

        let entries =
            DepthSequencer::new(self.config.min_inner_count).sequence(test.lower, test.upper, layout.size);
        let Some(max_nodes) = entries.iter().map(|e| e.nodes).max() else {
            debug!("{}: no depths in range", test.label);
            return Ok(report);
        };

        let builder = TopologyBuilder::new(layout, test.pattern)
            .box_bytes(test.box_bytes)
            .seed(self.config.seed);
        let mut arena = NodeArena::new(builder.extent_for(max_nodes) * layout.size)?;
        let averager = CycleAverager::new(self.config.inner_count, self.config.outer_count)?;

        for entry in entries {
            let graph = builder.build(&mut arena, entry.nodes)?;
            if self.config.verify {
                graph.verify()?;
            }
            let runner = TraversalRunner::new(&graph, test.probe)?;
            let ops_per_pass = runner.pass_len();
            let ops = ops_per_pass.saturating_mul(entry.repeat as usize);

            let measurement = averager.run(source, || {
                runner.run(ops);
            });
            if let Some(e) = source.take_error() {
                return Err(e.into());
            }

            let repeat = entry.repeat as f64;
            let mut events = [0.0; CONFIGURABLE_COUNT];
            for (slot, value) in events
                .iter_mut()
                .zip(measurement.select(self.config.averaging).configurable())
            {
                *slot = value / repeat;
            }

            let depth = DepthResult {
                nodes: graph.count(),
                depth_bytes: graph.depth_bytes(),
                ops_per_pass,
                repeat: entry.repeat,
                cycles: Statistic::from_measurement(&measurement, CounterSnapshot::cycles)
                    .per(repeat),
                ns: Statistic::from_measurement(&measurement, CounterSnapshot::ns).per(repeat),
                events,
            };
            debug!(
                "{}: {} nodes, {:.2} cycles/op",
                test.label,
                depth.nodes,
                depth.cycles_per_op(self.config.averaging)
            );
            report.depths.push(depth);
        }

        info!("{}: {} depths", test.label, report.depths.len());
        Ok(report)
    }
}

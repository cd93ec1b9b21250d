//! End-to-end sweeps through `LatencyBench`.

use mem_latency::measurement::{
    CounterSnapshot, CounterSource, Scheduling, COUNTERS_COUNT, CYCLES,
};
use mem_latency::topology::TraversalPattern;
use mem_latency::{output, Averaging, CounterSpec, LatencyBench, Probe, Suite, TestSpec};

const KIB: usize = 1024;

/// Counter that advances a fixed amount per read, so every window costs
/// exactly `step` cycles and `step / 2` ns.
struct Stepping {
    now: u64,
    step: u64,
}

impl CounterSource for Stepping {
    fn snapshot(&mut self) -> CounterSnapshot {
        self.now += self.step;
        let mut raw = [0u64; COUNTERS_COUNT];
        raw[CYCLES] = self.now;
        CounterSnapshot::from_raw(&raw, self.now as f64 / 2.0)
    }
}

fn small_bench() -> LatencyBench {
    LatencyBench::fast()
        .max_depth_bytes(64 * KIB)
        .min_inner_count(2_000)
        .verify(true)
}

#[test]
fn primary_sweep_with_synthetic_counters() {
    let mut source = Stepping {
        now: 0,
        step: 4_000,
    };
    let report = small_bench()
        .run_with(Suite::Primary, &mut source)
        .unwrap();

    assert_eq!(report.suite, Suite::Primary);
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].title, "64-byte nodes");
    assert_eq!(report.tests().count(), 6);
    assert_eq!(report.metadata.backend, "timer");
    assert!(!report.metadata.core_cycles);
    assert_eq!(report.metadata.max_depth_bytes, 64 * KIB);

    for test in report.tests() {
        assert_eq!(test.node_size, 64);
        assert!(!test.depths.is_empty(), "{}", test.label);
        assert!(test.depths.windows(2).all(|w| w[0].nodes < w[1].nodes));
        for depth in &test.depths {
            assert!(depth.depth_bytes <= 64 * KIB);
            assert!(depth.cycles.is_ordered());
            assert!((depth.cycles.min * depth.repeat as f64 - 4_000.0).abs() < 1e-6);
            assert!((depth.ns.min * depth.repeat as f64 - 2_000.0).abs() < 1e-6);
            assert!((depth.cycles_per_ns(Averaging::Min) - 2.0).abs() < 1e-9);
        }
    }

    // Box-local rows report their box and are truncated to whole boxes.
    let boxed = report
        .tests()
        .find(|t| t.pattern == TraversalPattern::RandomInBoxRandomBox)
        .unwrap();
    assert_eq!(boxed.box_bytes, Some(15_000));
    assert!(boxed.depths.iter().all(|d| d.nodes % (15_000 / 64) == 0));
}

#[test]
fn single_test_row() {
    let spec = TestSpec::chase("div", TraversalPattern::LinearIncreasing, 8, -256, 2304)
        .with_probe(Probe::ChaseDiv);
    let mut source = Stepping { now: 0, step: 100 };
    let report = small_bench().run_test(&spec, &mut source).unwrap();

    let nodes: Vec<usize> = report.depths.iter().map(|d| d.nodes).collect();
    assert_eq!(nodes, vec![256, 512, 768, 1024, 1280, 1536, 1792, 2048, 2304]);
    assert_eq!(report.probe, Probe::ChaseDiv);
    assert!(report.depths.iter().all(|d| d.ops_per_pass == d.nodes));
}

#[test]
fn unsupported_probe_is_reported() {
    let spec = TestSpec::chase("bad", TraversalPattern::FullRandom, 8, 64, 64)
        .with_probe(Probe::Reduction);
    let mut source = Stepping { now: 0, step: 1 };
    let err = small_bench().run_test(&spec, &mut source).unwrap_err();
    assert!(err.to_string().contains("payload"));
}

#[test]
fn report_serializes() {
    let mut source = Stepping { now: 0, step: 10 };
    let report = small_bench()
        .max_depth_bytes(16 * KIB)
        .run_with(Suite::Concurrency, &mut source)
        .unwrap();

    let json = output::to_json(&report).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["suite"], "Concurrency");
    assert_eq!(value["groups"][0]["tests"].as_array().map(Vec::len), Some(8));

    let table = output::format_report(&report);
    assert!(table.contains("Linear IncreasingM 16x"));
}

// The only test in this binary that binds the process-wide counters.
#[test]
fn standard_timer_end_to_end() {
    let report = small_bench()
        .max_depth_bytes(32 * KIB)
        .counter_spec(CounterSpec::Standard)
        .scheduling(Scheduling::unpinned())
        .preflight(false)
        .run(Suite::Primary)
        .unwrap();

    assert_eq!(report.metadata.backend, "timer");
    for test in report.tests() {
        for depth in &test.depths {
            assert!(depth.cycles.min >= 0.0);
            assert!(depth.ns.min >= 0.0);
            assert!(depth.cycles.is_ordered());
        }
    }
}

//! Integration tests for the Linux perf backend.
//!
//! Run with: cargo test --features perf --test test_perf
//!
//! Note: These tests need access to hardware counters (root, CAP_PERFMON or
//! `perf_event_paranoid <= 2`). Without it they print a note and pass.

#![cfg(all(feature = "perf", target_os = "linux"))]

use std::sync::Mutex;

use mem_latency::measurement::{
    Backend, CounterError, CounterSource, CounterSpec, CycleAverager, EventSet,
    PerformanceCounters, Scheduling,
};
use mem_latency::topology::{NodeArena, NodeLayout, TopologyBuilder, TraversalPattern};
use mem_latency::{Probe, TraversalRunner};

// Counters are process-wide; tests in this binary take turns.
static BIND: Mutex<()> = Mutex::new(());

fn bind() -> Option<PerformanceCounters> {
    match PerformanceCounters::bind_with(CounterSpec::Pmu, Scheduling::unpinned(), EventSet::empty()) {
        Ok(counters) => Some(counters),
        Err(CounterError::PermissionDenied) => {
            eprintln!("Skipping - perf counters require elevated permissions");
            eprintln!("Run with: sudo -E cargo test --features perf --test test_perf");
            None
        }
        Err(e) => panic!("Unexpected perf error: {}", e),
    }
}

#[test]
fn test_perf_bind_reports_core_cycles() {
    let _guard = BIND.lock().unwrap_or_else(|e| e.into_inner());
    let Some(counters) = bind() else { return };

    assert_eq!(counters.backend(), Backend::Perf);
    assert!(counters.backend().counts_core_cycles());
    assert_eq!(counters.timer_resolution_ns(), None);
    assert!(matches!(
        PerformanceCounters::bind(CounterSpec::Pmu),
        Err(CounterError::AlreadyBound)
    ));
}

#[test]
fn test_perf_chase_costs_cycles() {
    let _guard = BIND.lock().unwrap_or_else(|e| e.into_inner());
    let Some(mut counters) = bind() else { return };

    let nodes = 4096;
    let builder = TopologyBuilder::new(NodeLayout::pointer(64), TraversalPattern::FullRandom);
    let mut arena = NodeArena::new(nodes * 64).unwrap();
    let graph = builder.build(&mut arena, nodes).unwrap();
    let runner = TraversalRunner::new(&graph, Probe::Chase).unwrap();

    let m = CycleAverager::new(1, 5)
        .unwrap()
        .run(&mut counters, || {
            runner.run(100 * nodes);
        });
    assert!(counters.take_error().is_none());

    // Every step is a dependent load: at least one cycle and one instruction each.
    let ops = (100 * nodes) as f64;
    eprintln!("{:.2} cycles/op", m.min.cycles() / ops);
    assert!(m.min.cycles() >= ops);
    assert!(m.min.retired() >= ops);
    assert!(m.min.cycles() <= m.mean.cycles() && m.mean.cycles() <= m.max.cycles());
}

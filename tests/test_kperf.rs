//! Test core-cycle counting with kperf (requires sudo)
//!
//! These tests require root privileges to access PMU counters.
//!
//! **IMPORTANT**: Run tests serially to avoid kperf subsystem interference:
//! ```bash
//! cargo build --features kperf --tests
//! sudo ./target/debug/deps/test_kperf-* --test-threads=1 --nocapture
//! ```

#![cfg(feature = "kperf")]

use std::sync::Mutex;

use mem_latency::measurement::{
    events, Backend, CounterError, CounterSource, CounterSpec, CycleAverager, EventSet,
    PerformanceCounters, Scheduling,
};
use mem_latency::topology::{NodeArena, NodeLayout, TopologyBuilder, TraversalPattern};
use mem_latency::{Probe, TraversalRunner};

static BIND: Mutex<()> = Mutex::new(());

fn bind(events: EventSet) -> Option<PerformanceCounters> {
    match PerformanceCounters::bind_with(CounterSpec::Pmu, Scheduling::default(), events) {
        Ok(counters) => Some(counters),
        Err(CounterError::PermissionDenied) | Err(CounterError::UnsupportedPlatform) => {
            eprintln!("Skipping (kperf requires sudo on Apple Silicon)");
            None
        }
        Err(e) => panic!("Unexpected PMU error: {}", e),
    }
}

/// Walking a region far beyond L1 must miss L1 on most loads.
#[test]
fn test_kperf_counts_l1_misses() {
    let _guard = BIND.lock().unwrap_or_else(|e| e.into_inner());
    let Some(mut counters) = bind(EventSet::memory()) else { return };
    assert_eq!(counters.backend(), Backend::Kperf);

    let nodes = 64 * 1024;
    let builder = TopologyBuilder::new(NodeLayout::pointer(64), TraversalPattern::FullRandom);
    let mut arena = NodeArena::new(nodes * 64).unwrap();
    let graph = builder.build(&mut arena, nodes).unwrap();
    let runner = TraversalRunner::new(&graph, Probe::Chase).unwrap();

    let m = CycleAverager::new(1, 3)
        .unwrap()
        .run(&mut counters, || {
            runner.run(nodes);
        });
    assert!(counters.take_error().is_none());

    // Slot 2 of the memory set counts L1D load misses.
    assert_eq!(counters.events().0[2], events::L1D_CACHE_MISS_LD);
    let misses = m.min.configurable()[2];
    eprintln!(
        "{:.1} cycles/op, {:.2} L1D misses/op",
        m.min.cycles() / nodes as f64,
        misses / nodes as f64
    );
    assert!(misses > nodes as f64 / 2.0);
}

/// Reprogramming the configurable slots keeps the fixed counters working.
#[test]
fn test_kperf_reconfigure() {
    let _guard = BIND.lock().unwrap_or_else(|e| e.into_inner());
    let Some(mut counters) = bind(EventSet::empty()) else { return };

    let mut set = EventSet::empty();
    set.0[0] = events::INST_LDST;
    counters.configure(set).unwrap();
    assert_eq!(counters.events(), &set);

    let m = CycleAverager::new(10, 3).unwrap().run(&mut counters, || {
        std::hint::black_box((0..1000u64).sum::<u64>());
    });
    assert!(m.min.cycles() > 0.0);
    assert!(m.min.retired() > 0.0);
}

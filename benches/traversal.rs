use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mem_latency::topology::{NodeArena, NodeLayout, TopologyBuilder, TraversalPattern, Ways};
use mem_latency::{Probe, TraversalRunner};

const NODES: usize = 16 * 1024;

fn bench_patterns(c: &mut Criterion) {
    let mut group = c.benchmark_group("chase_64b");
    group.sample_size(20);
    group.throughput(Throughput::Elements(NODES as u64));

    let interleaved = TraversalPattern::Interleaved {
        ways: Ways::Four,
        remap: false,
    };
    for pattern in [
        TraversalPattern::LinearIncreasing,
        TraversalPattern::RandomInBoxRandomBox,
        TraversalPattern::FullRandom,
        interleaved,
    ] {
        let builder = TopologyBuilder::new(NodeLayout::pointer(64), pattern);
        let mut arena = NodeArena::new(builder.extent_for(NODES) * 64).unwrap();
        let graph = builder.build(&mut arena, NODES).unwrap();
        let runner = TraversalRunner::new(&graph, Probe::Chase).unwrap();
        let ops = graph.pass_len();

        group.bench_with_input(BenchmarkId::from_parameter(pattern), &ops, |b, &ops| {
            b.iter(|| black_box(runner.run(ops)));
        });
    }
    group.finish();
}

fn bench_probes(c: &mut Criterion) {
    let mut group = c.benchmark_group("probe_32b");
    group.sample_size(20);
    group.throughput(Throughput::Elements(NODES as u64));

    let builder = TopologyBuilder::new(NodeLayout::pointer_first(), TraversalPattern::LinearIncreasing);
    let mut arena = NodeArena::new(NODES * 32).unwrap();
    let graph = builder.build(&mut arena, NODES).unwrap();

    for probe in [Probe::Chase, Probe::ChaseAdd, Probe::ChaseDiv, Probe::Reduction] {
        let runner = TraversalRunner::new(&graph, probe).unwrap();
        group.bench_function(probe.name(), |b| {
            b.iter(|| black_box(runner.run(NODES)));
        });
    }
    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_64b");
    group.sample_size(10);

    let mut arena = NodeArena::new(NODES * 64).unwrap();
    for pattern in [TraversalPattern::FullRandom, TraversalPattern::RandomOffsetPermuted] {
        let builder = TopologyBuilder::new(NodeLayout::pointer(64), pattern);
        group.bench_function(BenchmarkId::from_parameter(pattern), |b| {
            b.iter(|| black_box(builder.build(&mut arena, NODES).map(|g| g.count())));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_patterns, bench_probes, bench_build);
criterion_main!(benches);

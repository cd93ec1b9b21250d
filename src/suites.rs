//! Declarative test tables.
//!
//! A suite is a list of groups, each a list of [`TestSpec`] rows sharing a
//! node layout. Rows are plain data built by loops, so adding a configuration
//! means adding a row.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::topology::{NodeLayout, TraversalPattern, Ways, DEFAULT_BOX_BYTES};
use crate::traversal::Probe;

const KIB: usize = 1024;

/// Region used by the tests that only care about behaviour inside L1.
pub const L1_DEPTH_BYTES: usize = 1024 * KIB;

/// Base page size of the cores the tables were written for.
pub const PAGE_BYTES: usize = 16 * KIB;

/// One row: what to walk, over which node counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSpec {
    /// Row label in reports.
    pub label: String,
    /// Work done per node.
    pub probe: Probe,
    /// Visiting order.
    pub pattern: TraversalPattern,
    /// Node layout.
    pub layout: NodeLayout,
    /// Lower node bound. Negative asks for a nine-point sweep from `|lower|`.
    pub lower: i64,
    /// Upper node bound.
    pub upper: usize,
    /// Box size in bytes for box-local patterns.
    pub box_bytes: usize,
}

impl TestSpec {
    /// Chase over pointer-only nodes of `node_size` bytes.
    pub fn chase(
        label: impl Into<String>,
        pattern: TraversalPattern,
        node_size: usize,
        lower: i64,
        upper: usize,
    ) -> Self {
        Self {
            label: label.into(),
            probe: Probe::Chase,
            pattern,
            layout: NodeLayout::pointer(node_size),
            lower,
            upper,
            box_bytes: DEFAULT_BOX_BYTES,
        }
    }

    /// Replace the probe.
    pub fn with_probe(mut self, probe: Probe) -> Self {
        self.probe = probe;
        self
    }

    /// Replace the box size.
    pub fn with_box(mut self, box_bytes: usize) -> Self {
        self.box_bytes = box_bytes;
        self
    }

    /// Replace the layout.
    pub fn with_layout(mut self, layout: NodeLayout) -> Self {
        self.layout = layout;
        self
    }
}

/// Rows sharing one node layout, reported under one heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestGroup {
    /// Heading, e.g. "8-byte nodes".
    pub title: String,
    /// Rows in run order.
    pub tests: Vec<TestSpec>,
}

impl TestGroup {
    fn new(title: impl Into<String>, tests: Vec<TestSpec>) -> Self {
        Self {
            title: title.into(),
            tests,
        }
    }

    fn for_size(node_size: usize, tests: Vec<TestSpec>) -> Self {
        Self::new(format!("{}-byte nodes", node_size), tests)
    }
}

/// A named family of latency tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum Suite {
    /// Pointer-sized nodes: baselines, box locality, full random, ALU and
    /// payload variants.
    Baseline,
    /// Linear walks over node sizes straddling line and page multiples.
    Stride,
    /// Page-sized nodes: translation cache reach and offset placement.
    Tlb,
    /// L1 capacity, line length, associativity and sectoring.
    #[value(name = "l1")]
    L1Structure,
    /// Several chains walked at once.
    Concurrency,
    /// Cache-line-sized nodes, the headline latency curves.
    Primary,
    /// Every suite in order.
    All,
}

impl Suite {
    /// Every concrete suite, in the order `All` runs them.
    pub const CONCRETE: [Suite; 6] = [
        Suite::Baseline,
        Suite::Stride,
        Suite::Tlb,
        Suite::L1Structure,
        Suite::Concurrency,
        Suite::Primary,
    ];

    /// Groups for this suite, with open upper bounds capped at `max_depth_bytes`.
    pub fn groups(self, max_depth_bytes: usize) -> Vec<TestGroup> {
        match self {
            Suite::Baseline => baseline(max_depth_bytes),
            Suite::Stride => stride(max_depth_bytes),
            Suite::Tlb => tlb(max_depth_bytes),
            Suite::L1Structure => l1_structure(),
            Suite::Concurrency => concurrency(max_depth_bytes),
            Suite::Primary => primary(max_depth_bytes),
            Suite::All => Self::CONCRETE
                .iter()
                .flat_map(|s| s.groups(max_depth_bytes))
                .collect(),
        }
    }

    /// Command-line name.
    pub fn name(self) -> &'static str {
        match self {
            Suite::Baseline => "baseline",
            Suite::Stride => "stride",
            Suite::Tlb => "tlb",
            Suite::L1Structure => "l1",
            Suite::Concurrency => "concurrency",
            Suite::Primary => "primary",
            Suite::All => "all",
        }
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unrecognised suite name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSuite(pub String);

impl fmt::Display for UnknownSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown suite '{}' (expected one of: baseline, stride, tlb, l1, concurrency, primary, all)",
            self.0
        )
    }
}

impl std::error::Error for UnknownSuite {}

impl FromStr for Suite {
    type Err = UnknownSuite;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        std::iter::once(Suite::All)
            .chain(Suite::CONCRETE)
            .find(|suite| suite.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownSuite(s.to_string()))
    }
}

fn baseline(max_depth_bytes: usize) -> Vec<TestGroup> {
    use TraversalPattern::*;
    let sz = std::mem::size_of::<usize>();
    let max = max_depth_bytes / sz;
    let l1 = L1_DEPTH_BYTES / sz;
    let page = (PAGE_BYTES / sz) as i64;

    let pointers = vec![
        TestSpec::chase("Linear Increasing", LinearIncreasing, sz, 64, max),
        TestSpec::chase("Linear Decreasing", LinearDecreasing, sz, 64, max),
        TestSpec::chase("SameRandomInBox IncreasingBox", SameRandomInBoxIncreasingBox, sz, page, max),
        TestSpec::chase("DiftRandomInBox IncreasingBox", DiftRandomInBoxIncreasingBox, sz, page, max),
        TestSpec::chase("DiftRandomInBox RandomBox", RandomInBoxRandomBox, sz, page, max),
        TestSpec::chase("FullRandom", FullRandom, sz, 16, max),
        TestSpec::chase("Linear Increasing +Add", LinearIncreasing, sz, 16, l1)
            .with_probe(Probe::ChaseAdd),
        TestSpec::chase("Linear Increasing +Div", LinearIncreasing, sz, 16, l1)
            .with_probe(Probe::ChaseDiv),
        TestSpec::chase("SameRandomInBox IncreasingBox +Div", SameRandomInBoxIncreasingBox, sz, page, l1)
            .with_probe(Probe::ChaseDiv),
    ];

    let wide = NodeLayout::pointer_first().size;
    let reductions = vec![
        TestSpec::chase("Reduction - Pointer first", LinearIncreasing, wide, 16, L1_DEPTH_BYTES / wide)
            .with_layout(NodeLayout::pointer_first())
            .with_probe(Probe::Reduction),
        TestSpec::chase("Reduction - Payload first", LinearIncreasing, wide, 16, L1_DEPTH_BYTES / wide)
            .with_layout(NodeLayout::payload_first())
            .with_probe(Probe::Reduction),
    ];

    vec![
        TestGroup::for_size(sz, pointers),
        TestGroup::new(format!("{}-byte nodes with payload", wide), reductions),
    ]
}

/// Node sizes just below, at and above line and page multiples.
pub const STRIDE_SIZES: [usize; 19] = [
    63, 64, 65, 120, 121, 127, 128, 136, 256, 257, 272, 288, 320, 384, 1984, 8128, 16192, 32576,
    65152,
];

fn stride(max_depth_bytes: usize) -> Vec<TestGroup> {
    STRIDE_SIZES
        .iter()
        .map(|&sz| {
            let max = max_depth_bytes / sz;
            TestGroup::for_size(
                sz,
                vec![
                    TestSpec::chase(format!("{}B Increasing", sz), TraversalPattern::LinearIncreasing, sz, 16, max),
                    TestSpec::chase(format!("{}B Decreasing", sz), TraversalPattern::LinearDecreasing, sz, 16, max),
                ],
            )
        })
        .collect()
}

fn tlb(max_depth_bytes: usize) -> Vec<TestGroup> {
    use TraversalPattern::*;
    let mut groups = Vec::new();

    let sz = PAGE_BYTES;
    let max = max_depth_bytes / sz;
    groups.push(TestGroup::for_size(
        sz,
        vec![
            TestSpec::chase("TLB Linear Increasing 16K", LinearIncreasing, sz, 8, max),
            TestSpec::chase("TLB Linear Decreasing 16K", LinearDecreasing, sz, 12, max),
            TestSpec::chase("TLB Full Random 16K", FullRandom, sz, 16, max),
        ],
    ));

    // Page plus one line, so consecutive nodes land in different sets.
    for (kib, lower) in [(16, 16), (8, 16), (32, 16), (64, 16), (128, 16), (256, 8), (512, 2)] {
        let sz = kib * KIB + 64;
        let max = max_depth_bytes / sz;
        let mut tests = vec![
            TestSpec::chase(format!("TLB Linear Increasing {}K64", kib), LinearIncreasing, sz, lower, max),
            TestSpec::chase(format!("TLB Linear Decreasing {}K64", kib), LinearDecreasing, sz, lower, max),
            TestSpec::chase(format!("TLB Full Random {}K64", kib), FullRandom, sz, lower, max),
        ];
        if kib == 16 {
            for (pattern, what) in [
                (RandomOffset, "random offset"),
                (RandomOffsetLineAligned, "random offset[line aligned]"),
                (RandomOffsetPermuted, "random offset[permuted]"),
            ] {
                tests.push(TestSpec::chase(format!("TLB Linear w/ {} {}K64", what, kib), pattern, sz, lower, max));
            }
        }
        groups.push(TestGroup::for_size(sz, tests));
    }
    groups
}

/// Box sizes for the sectoring sweeps, largest first. Each node size also
/// sweeps the power-of-two boxes from 256 B down to one node.
const SECTORING_BOXES: [usize; 11] = [
    512 * KIB,
    256 * KIB,
    128 * KIB,
    64 * KIB,
    32 * KIB,
    16 * KIB,
    8 * KIB,
    4 * KIB,
    2 * KIB,
    KIB,
    512,
];

fn box_label(bytes: usize) -> String {
    if bytes >= KIB && bytes % KIB == 0 {
        format!("box{}K", bytes / KIB)
    } else {
        format!("box{}B", bytes)
    }
}

fn l1_structure() -> Vec<TestGroup> {
    use TraversalPattern::*;
    let mut groups = Vec::new();

    groups.push(TestGroup::new(
        "L1 capacity, 8-byte nodes",
        vec![TestSpec::chase("L1 Data Capacity", FullRandom, 8, -8 * 1024, 24 * 1024)],
    ));

    for (line, lower) in [(32, 1024), (64, 1024), (128, 512), (256, 256)] {
        let sz = 3 * line;
        groups.push(TestGroup::new(
            format!("L1 line length, {}-byte nodes", sz),
            vec![TestSpec::chase(
                "L1 Address Capacity",
                FullRandom,
                sz,
                -(lower as i64),
                3 * lower,
            )],
        ));
    }

    for (kib, lower, upper) in [(32, -4, 12), (16, -4, 12), (8, 4, 20)] {
        let sz = kib * KIB;
        groups.push(TestGroup::new(
            format!("L1 associativity, {}-byte nodes", sz),
            vec![TestSpec::chase("L1 Associativity", FullRandom, sz, lower, upper)],
        ));
    }

    let box_patterns = [
        (SameRandomInBoxIncreasingBox, "same random, increasing box"),
        (DiftRandomInBoxIncreasingBox, "dift random, increasing box"),
        (RandomInBoxRandomBox, "dift random, random box"),
        (IncreasingInBoxRandomBox, "increasing, random box"),
    ];
    for sz in [32, 16, 8, 64, 128, 256] {
        let nodes = L1_DEPTH_BYTES / sz;
        let boxes: Vec<usize> = SECTORING_BOXES
            .iter()
            .copied()
            .chain((0..).map(|shift| 256 >> shift).take_while(|&b| b >= sz))
            .collect();

        let mut patterns: Vec<(TraversalPattern, &str)> = Vec::new();
        if sz == 8 {
            patterns.push((FullRandom, "full random"));
        }
        patterns.extend(box_patterns);

        let tests = patterns
            .iter()
            .flat_map(|&(pattern, name)| {
                boxes.iter().map(move |&b| {
                    TestSpec::chase(format!("{} {}", name, box_label(b)), pattern, sz, nodes as i64, nodes)
                        .with_box(b)
                })
            })
            .collect();
        groups.push(TestGroup::new(format!("L1 sectoring, {}-byte nodes", sz), tests));
    }
    groups
}

fn concurrency(max_depth_bytes: usize) -> Vec<TestGroup> {
    let sz = std::mem::size_of::<usize>();
    let max = max_depth_bytes / sz;
    let tests = [false, true]
        .iter()
        .flat_map(|&remap| {
            Ways::ALL.into_iter().map(move |ways| {
                let label = format!(
                    "Linear Increasing{} {}x",
                    if remap { "M" } else { "" },
                    ways.count()
                );
                TestSpec::chase(label, TraversalPattern::Interleaved { ways, remap }, sz, 64, max)
            })
        })
        .collect();
    vec![TestGroup::new(format!("{}-byte nodes, interleaved chains", sz), tests)]
}

fn primary(max_depth_bytes: usize) -> Vec<TestGroup> {
    use TraversalPattern::*;
    let sz = 64;
    let max = max_depth_bytes / sz;
    let page = (PAGE_BYTES / sz) as i64;
    vec![TestGroup::for_size(
        sz,
        vec![
            TestSpec::chase("Linear Increasing", LinearIncreasing, sz, 16, max),
            TestSpec::chase("Linear Decreasing", LinearDecreasing, sz, 16, max),
            TestSpec::chase("SameRandomInBox IncreasingBox", SameRandomInBoxIncreasingBox, sz, page, max),
            TestSpec::chase("DiftRandomInBox IncreasingBox", DiftRandomInBoxIncreasingBox, sz, page, max),
            TestSpec::chase("DiftRandomInBox RandomBox", RandomInBoxRandomBox, sz, page, max),
            TestSpec::chase("FullRandom", FullRandom, sz, 16, max),
        ],
    )]
}

//! Pointer-chasing probes.
//!
//! A probe performs exactly `ops` dependent loads over a built graph and then
//! publishes the final head through [`SINK`]. Nothing else observable happens
//! inside the loop, so the compiler can neither drop the chase nor reorder
//! work into it.
//!
//! # Example
//!
//! ```
//! use mem_latency::topology::{NodeArena, NodeLayout, TopologyBuilder, TraversalPattern};
//! use mem_latency::{Probe, TraversalRunner};
//!
//! let mut arena = NodeArena::new(8 * 64).unwrap();
//! let graph = TopologyBuilder::new(NodeLayout::pointer(64), TraversalPattern::LinearIncreasing)
//!     .build(&mut arena, 8)
//!     .unwrap();
//! let runner = TraversalRunner::new(&graph, Probe::Chase).unwrap();
//! assert_eq!(runner.run(8), graph.heads()[0]);
//! ```

use std::fmt;
use std::hint::black_box;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::topology::{TopologyError, TraversalGraph};

/// Receives the final head of every probe run.
pub static SINK: AtomicUsize = AtomicUsize::new(0);

/// What a probe does at each node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Probe {
    /// Follow the link; advances every chain head once per operation.
    Chase,
    /// Follow the link, then add an opaque zero to it.
    ChaseAdd,
    /// Follow the link, then divide it by an opaque one.
    ChaseDiv,
    /// Follow the link and accumulate the node's payload.
    Reduction,
}

impl Probe {
    /// Short name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Probe::Chase => "chase",
            Probe::ChaseAdd => "chase+add",
            Probe::ChaseDiv => "chase+div",
            Probe::Reduction => "reduction",
        }
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A probe bound to one graph.
#[derive(Debug, Clone, Copy)]
pub struct TraversalRunner<'g, 'a> {
    graph: &'g TraversalGraph<'a>,
    probe: Probe,
    payload_delta: isize,
}

impl<'g, 'a> TraversalRunner<'g, 'a> {
    /// Bind `probe` to `graph`.
    ///
    /// Only [`Probe::Chase`] walks several heads at once. [`Probe::Reduction`]
    /// needs a payload at a fixed delta from each link, which the offset
    /// patterns do not keep.
    pub fn new(graph: &'g TraversalGraph<'a>, probe: Probe) -> Result<Self, TopologyError> {
        let heads = graph.heads().len();
        if probe == Probe::Chase {
            if !matches!(heads, 1 | 2 | 4 | 8 | 16) {
                return Err(TopologyError::UnsupportedProbe {
                    probe: probe.name(),
                    reason: "head count must be 1, 2, 4, 8 or 16",
                });
            }
        } else if heads != 1 {
            return Err(TopologyError::UnsupportedProbe {
                probe: probe.name(),
                reason: "walks a single chain only",
            });
        }

        let payload_delta = match (probe, graph.layout().payload_delta()) {
            (Probe::Reduction, _) if graph.pattern().is_offset() => {
                return Err(TopologyError::UnsupportedProbe {
                    probe: probe.name(),
                    reason: "offset patterns move the link away from the payload",
                })
            }
            (Probe::Reduction, Some(delta)) => delta,
            (Probe::Reduction, None) => {
                return Err(TopologyError::UnsupportedProbe {
                    probe: probe.name(),
                    reason: "node layout has no payload",
                })
            }
            _ => 0,
        };

        Ok(Self {
            graph,
            probe,
            payload_delta,
        })
    }

    /// The bound probe.
    pub fn probe(&self) -> Probe {
        self.probe
    }

    /// Operations in one pass of the graph.
    pub fn pass_len(&self) -> usize {
        self.graph.pass_len()
    }

    /// Perform `ops` operations from the graph's heads.
    ///
    /// Returns where the first chain ended up.
    pub fn run(&self, ops: usize) -> usize {
        let heads = self.graph.heads();
        // SAFETY: the builder links every slot to a slot inside the arena, and
        // the graph borrows the arena for as long as this runner exists.
        let (end, digest) = unsafe {
            match self.probe {
                Probe::Chase => match heads.len() {
                    1 => chase(heads[0], ops),
                    2 => chase_many::<2>(heads, ops),
                    4 => chase_many::<4>(heads, ops),
                    8 => chase_many::<8>(heads, ops),
                    _ => chase_many::<16>(heads, ops),
                },
                Probe::ChaseAdd => chase_add(heads[0], ops),
                Probe::ChaseDiv => chase_div(heads[0], ops),
                Probe::Reduction => reduce(heads[0], ops, self.payload_delta),
            }
        };
        observe(digest);
        end
    }
}

/// Publish a probe's result.
#[inline]
fn observe(value: usize) {
    SINK.store(black_box(value), Ordering::Relaxed);
}

#[inline(always)]
unsafe fn load(addr: usize) -> usize {
    ptr::read_unaligned(addr as *const usize)
}

// Each walker returns (final first head, digest of everything it read).

#[inline(never)]
unsafe fn chase(mut head: usize, ops: usize) -> (usize, usize) {
    for _ in 0..ops {
        head = load(head);
    }
    (head, head)
}

#[inline(never)]
unsafe fn chase_add(mut head: usize, ops: usize) -> (usize, usize) {
    let zero = black_box(0usize);
    for _ in 0..ops {
        head = load(head).wrapping_add(zero);
    }
    (head, head)
}

#[inline(never)]
unsafe fn chase_div(mut head: usize, ops: usize) -> (usize, usize) {
    let one = black_box(1usize);
    for _ in 0..ops {
        head = load(head) / one;
    }
    (head, head)
}

/// K heads advanced in lockstep.
#[inline(never)]
unsafe fn chase_many<const K: usize>(start: &[usize], ops: usize) -> (usize, usize) {
    let mut heads = [0usize; K];
    heads.copy_from_slice(&start[..K]);
    for _ in 0..ops {
        for head in heads.iter_mut() {
            *head = load(*head);
        }
    }
    let digest = heads.iter().fold(0usize, |acc, &h| acc ^ h);
    (heads[0], digest)
}

#[inline(never)]
unsafe fn reduce(mut head: usize, ops: usize, payload_delta: isize) -> (usize, usize) {
    let mut sum = 0u64;
    for _ in 0..ops {
        let payload = head.wrapping_add_signed(payload_delta);
        sum = sum.wrapping_add(ptr::read_unaligned(payload as *const u64));
        head = load(head);
    }
    (head, head ^ sum as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{NodeArena, NodeLayout, TopologyBuilder, TraversalPattern, Ways};

    #[test]
    fn test_chase_steps_one_node_per_op() {
        let mut arena = NodeArena::new(4 * 63).unwrap();
        // Odd node size: links are unaligned.
        let graph = TopologyBuilder::new(NodeLayout::pointer(63), TraversalPattern::LinearIncreasing)
            .build(&mut arena, 4)
            .unwrap();
        for probe in [Probe::Chase, Probe::ChaseAdd, Probe::ChaseDiv] {
            let runner = TraversalRunner::new(&graph, probe).unwrap();
            assert_eq!(graph.node_of(runner.run(1)), 1);
            assert_eq!(graph.node_of(runner.run(3)), 3);
            assert_eq!(runner.run(4), graph.heads()[0]);
        }
    }

    #[test]
    fn test_reduction_requires_payload() {
        let mut arena = NodeArena::new(4 * 32).unwrap();
        let graph = TopologyBuilder::new(NodeLayout::pointer(32), TraversalPattern::LinearIncreasing)
            .build(&mut arena, 4)
            .unwrap();
        assert!(matches!(
            TraversalRunner::new(&graph, Probe::Reduction),
            Err(TopologyError::UnsupportedProbe { .. })
        ));
    }

    #[test]
    fn test_reduction_rejects_offset_patterns() {
        let layout = NodeLayout::payload_first();
        for pattern in [
            TraversalPattern::RandomOffset,
            TraversalPattern::RandomOffsetLineAligned,
            TraversalPattern::RandomOffsetPermuted,
        ] {
            let builder = TopologyBuilder::new(layout, pattern);
            let mut arena = NodeArena::new(builder.extent_for(4) * layout.size).unwrap();
            let graph = builder.build(&mut arena, 4).unwrap();
            assert!(matches!(
                TraversalRunner::new(&graph, Probe::Reduction),
                Err(TopologyError::UnsupportedProbe { .. })
            ));
        }
    }

    #[test]
    fn test_reduction_walks_payload_layouts() {
        for layout in [NodeLayout::pointer_first(), NodeLayout::payload_first()] {
            let mut arena = NodeArena::new(16 * layout.size).unwrap();
            let graph = TopologyBuilder::new(layout, TraversalPattern::LinearIncreasing)
                .build(&mut arena, 16)
                .unwrap();
            let runner = TraversalRunner::new(&graph, Probe::Reduction).unwrap();
            assert_eq!(runner.run(16), graph.heads()[0]);
            assert_eq!(graph.node_of(runner.run(5)), 5);
        }
    }

    #[test]
    fn test_multi_head_chase() {
        let builder = TopologyBuilder::new(
            NodeLayout::pointer(8),
            TraversalPattern::Interleaved {
                ways: Ways::Four,
                remap: false,
            },
        );
        let mut arena = NodeArena::new(builder.extent_for(64) * 8).unwrap();
        let graph = builder.build(&mut arena, 64).unwrap();
        let runner = TraversalRunner::new(&graph, Probe::Chase).unwrap();
        assert_eq!(runner.run(graph.cycle_len()), graph.heads()[0]);
        assert_eq!(graph.node_of(runner.run(1)), 1);

        assert!(TraversalRunner::new(&graph, Probe::ChaseAdd).is_err());
    }
}

//! Building single-cycle next relations per traversal pattern.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use super::arena::NodeArena;
use super::graph::{LinkWriter, NodeLayout, TraversalGraph, LINK_BYTES};
use super::pattern::{TraversalPattern, Ways};
use super::TopologyError;
use crate::config::DEFAULT_SEED;

/// Default box size in bytes for box-local patterns.
pub const DEFAULT_BOX_BYTES: usize = 15_000;

/// Pointer slots per 64-byte cache line.
const WORDS_PER_LINE: usize = 64 / LINK_BYTES;

/// Builds a [`TraversalGraph`] over a [`NodeArena`].
///
/// # Example
///
/// ```
/// use mem_latency::topology::{NodeArena, NodeLayout, TopologyBuilder, TraversalPattern};
///
/// let mut arena = NodeArena::new(4 * 64).unwrap();
/// let graph = TopologyBuilder::new(NodeLayout::pointer(64), TraversalPattern::LinearIncreasing)
///     .build(&mut arena, 4)
///     .unwrap();
/// assert_eq!(graph.visit_order(graph.heads()[0]).unwrap(), vec![0, 1, 2, 3]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopologyBuilder {
    layout: NodeLayout,
    pattern: TraversalPattern,
    box_bytes: usize,
    seed: u64,
}

impl TopologyBuilder {
    /// Builder with the default box size and seed.
    pub fn new(layout: NodeLayout, pattern: TraversalPattern) -> Self {
        Self {
            layout,
            pattern,
            box_bytes: DEFAULT_BOX_BYTES,
            seed: DEFAULT_SEED,
        }
    }

    /// Box size in bytes for box-local patterns.
    pub fn box_bytes(mut self, bytes: usize) -> Self {
        self.box_bytes = bytes;
        self
    }

    /// Seed for randomised patterns.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Nodes the arena must hold to build `nodes` nodes with this pattern.
    ///
    /// Interleaved chains leave `(j + 1)²` node gaps between them.
    pub fn extent_for(&self, nodes: usize) -> usize {
        match self.pattern {
            TraversalPattern::Interleaved { ways, .. } => {
                let k = ways.count();
                let per = nodes / k;
                k * per + chain_gaps(k)
            }
            _ => nodes,
        }
    }

    /// Build the graph for `nodes` nodes into `arena`.
    ///
    /// On error nothing usable is left behind; the arena may hold partial links.
    pub fn build<'a>(
        &self,
        arena: &'a mut NodeArena,
        nodes: usize,
    ) -> Result<TraversalGraph<'a>, TopologyError> {
        self.layout.validate()?;
        if nodes == 0 {
            return Err(TopologyError::EmptyRegion);
        }
        if nodes > u32::MAX as usize {
            return Err(TopologyError::TooManyNodes { nodes });
        }

        let extent = self.extent_for(nodes);
        arena.ensure(extent * self.layout.size)?;

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed);
        let mut writer = LinkWriter::new(arena, self.layout);

        let (count, cycle_len, heads) = match self.pattern {
            TraversalPattern::LinearIncreasing => {
                for i in 0..nodes - 1 {
                    writer.link(i, i + 1);
                }
                writer.link(nodes - 1, 0);
                (nodes, nodes, vec![writer.slot(0)])
            }
            TraversalPattern::LinearDecreasing => {
                for i in (1..nodes).rev() {
                    writer.link(i, i - 1);
                }
                writer.link(0, nodes - 1);
                (nodes, nodes, vec![writer.slot(0)])
            }
            TraversalPattern::Interleaved { ways, remap } => {
                build_interleaved(&mut writer, nodes, ways, remap)?
            }
            TraversalPattern::SameRandomInBoxIncreasingBox
            | TraversalPattern::DiftRandomInBoxIncreasingBox
            | TraversalPattern::RandomInBoxRandomBox
            | TraversalPattern::IncreasingInBoxRandomBox => {
                let order = self.box_order(nodes, &mut rng)?;
                link_order(&mut writer, &order);
                (order.len(), order.len(), vec![writer.slot(0)])
            }
            TraversalPattern::RandomOffset
            | TraversalPattern::RandomOffsetLineAligned
            | TraversalPattern::RandomOffsetPermuted => {
                self.build_offsets(&mut writer, nodes, &mut rng);
                (nodes, nodes, vec![writer.word(0, 0)])
            }
            TraversalPattern::FullRandom => {
                let mut order: Vec<u32> = (0..nodes as u32).collect();
                order[1..].shuffle(&mut rng);
                link_order(&mut writer, &order);
                (nodes, nodes, vec![writer.slot(0)])
            }
        };

        Ok(TraversalGraph {
            arena,
            layout: self.layout,
            pattern: self.pattern,
            count,
            extent,
            cycle_len,
            heads,
        })
    }

    /// Visiting order for the box-local patterns, truncated to whole boxes.
    ///
    /// Within every box the first node stays first, so the order starts at 0.
    fn box_order(
        &self,
        nodes: usize,
        rng: &mut Xoshiro256PlusPlus,
    ) -> Result<Vec<u32>, TopologyError> {
        let box_nodes = self.box_bytes / self.layout.size;
        if box_nodes == 0 {
            return Err(TopologyError::ZeroBoxNodes {
                box_bytes: self.box_bytes,
                node_size: self.layout.size,
            });
        }
        let num_boxes = nodes / box_nodes;
        if num_boxes == 0 {
            return Err(TopologyError::TooFewBoxes { nodes, box_nodes });
        }

        let mut in_box: Vec<u32> = (0..box_nodes as u32).collect();
        let mut boxes: Vec<u32> = (0..num_boxes as u32).map(|b| b * box_nodes as u32).collect();

        let (shuffle_once, shuffle_each, random_boxes) = match self.pattern {
            TraversalPattern::SameRandomInBoxIncreasingBox => (true, false, false),
            TraversalPattern::DiftRandomInBoxIncreasingBox => (false, true, false),
            TraversalPattern::RandomInBoxRandomBox => (false, true, true),
            _ => (false, false, true),
        };

        if random_boxes {
            boxes[1..].shuffle(rng);
        }
        if shuffle_once {
            in_box[1..].shuffle(rng);
        }

        let mut order = Vec::with_capacity(num_boxes * box_nodes);
        for &box_base in &boxes {
            if shuffle_each {
                in_box[1..].shuffle(rng);
            }
            order.extend(in_box.iter().map(|&j| box_base + j));
        }
        Ok(order)
    }

    /// Linear progression with each link perturbed into its target node.
    fn build_offsets(&self, writer: &mut LinkWriter, nodes: usize, rng: &mut Xoshiro256PlusPlus) {
        let words = self.layout.size / LINK_BYTES;
        let line_mask = !(WORDS_PER_LINE - 1);

        let mut permuted: Vec<usize> = Vec::new();
        if self.pattern == TraversalPattern::RandomOffsetPermuted {
            permuted = (0..words).collect();
            permuted.shuffle(rng);
        }

        let mut at = writer.word(0, 0);
        for next in 1..nodes {
            let word = match self.pattern {
                TraversalPattern::RandomOffset => rng.random_range(0..words),
                TraversalPattern::RandomOffsetLineAligned => {
                    rng.random_range(0..words) & line_mask
                }
                _ => permuted[(next - 1) % words] & line_mask,
            };
            let target = writer.word(next, word);
            writer.write(at, target);
            at = target;
        }
        let head = writer.word(0, 0);
        writer.write(at, head);
    }
}

/// Total gap nodes between `k` interleaved chains.
fn chain_gaps(k: usize) -> usize {
    (1..k).map(|j| j * j).sum()
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// K independent linear chains. Returns (count, chain length, heads).
fn build_interleaved(
    writer: &mut LinkWriter,
    nodes: usize,
    ways: Ways,
    remap: bool,
) -> Result<(usize, usize, Vec<usize>), TopologyError> {
    let k = ways.count();
    let per = nodes / k;
    if per == 0 {
        return Err(TopologyError::TooFewNodes { nodes, minimum: k });
    }

    let mut heads = Vec::with_capacity(k);
    let mut start = 0;
    let mut stride: isize = 1;
    for j in 0..k {
        // Bump the magnitude until coprime so the chain stays one cycle.
        let mut magnitude = stride.unsigned_abs();
        while gcd(magnitude, per) != 1 {
            magnitude += 1;
        }
        let step = if remap {
            stride.signum() * magnitude as isize
        } else {
            1
        };
        let position = |i: usize| start + (i as isize * step).rem_euclid(per as isize) as usize;

        for i in 0..per {
            writer.link(position(i), position((i + 1) % per));
        }
        heads.push(writer.slot(position(0)));

        start += per + (j + 1) * (j + 1);
        stride = -(stride + 4);
    }
    Ok((k * per, per, heads))
}

/// Link `order[i]` to `order[i + 1]` and the last entry back to `order[0]`.
fn link_order(writer: &mut LinkWriter, order: &[u32]) {
    for pair in order.windows(2) {
        writer.link(pair[0] as usize, pair[1] as usize);
    }
    if let (Some(&first), Some(&last)) = (order.first(), order.last()) {
        writer.link(last as usize, first as usize);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_of(pattern: TraversalPattern, node_size: usize, nodes: usize) -> Vec<usize> {
        let builder = TopologyBuilder::new(NodeLayout::pointer(node_size), pattern).box_bytes(64);
        let mut arena = NodeArena::new(builder.extent_for(nodes) * node_size).unwrap();
        let graph = builder.build(&mut arena, nodes).unwrap();
        graph.verify().unwrap();
        graph.visit_order(graph.heads()[0]).unwrap()
    }

    #[test]
    fn test_linear_decreasing() {
        assert_eq!(
            order_of(TraversalPattern::LinearDecreasing, 8, 5),
            vec![0, 4, 3, 2, 1]
        );
    }

    #[test]
    fn test_same_random_repeats_per_box() {
        // 8 nodes per 64-byte box.
        let order = order_of(TraversalPattern::SameRandomInBoxIncreasingBox, 8, 32);
        let first: Vec<usize> = order[..8].to_vec();
        for (b, chunk) in order.chunks(8).enumerate() {
            let shifted: Vec<usize> = chunk.iter().map(|&i| i - b * 8).collect();
            assert_eq!(shifted, first);
        }
        assert_eq!(first[0], 0);
    }

    #[test]
    fn test_increasing_in_box_keeps_box_contiguous() {
        let order = order_of(TraversalPattern::IncreasingInBoxRandomBox, 8, 64);
        assert_eq!(&order[..8], &[0, 1, 2, 3, 4, 5, 6, 7]);
        for chunk in order.chunks(8) {
            assert_eq!(chunk[0] % 8, 0);
            for w in chunk.windows(2) {
                assert_eq!(w[1], w[0] + 1);
            }
        }
    }

    #[test]
    fn test_gcd() {
        assert_eq!(gcd(12, 18), 6);
        assert_eq!(gcd(5, 25), 5);
        assert_eq!(gcd(7, 1), 1);
        assert_eq!(chain_gaps(4), 1 + 4 + 9);
    }

    #[test]
    fn test_interleaved_remap_strides() {
        // per = 10: stride 1 for chain 0, -5 bumped to -7 for chain 1.
        let builder = TopologyBuilder::new(
            NodeLayout::pointer(8),
            TraversalPattern::Interleaved {
                ways: Ways::Two,
                remap: true,
            },
        );
        let mut arena = NodeArena::new(builder.extent_for(20) * 8).unwrap();
        let graph = builder.build(&mut arena, 20).unwrap();
        graph.verify().unwrap();

        let chain0 = graph.visit_order(graph.heads()[0]).unwrap();
        assert_eq!(chain0, (0..10).collect::<Vec<_>>());

        let chain1 = graph.visit_order(graph.heads()[1]).unwrap();
        assert_eq!(chain1[0], 11);
        assert_eq!(chain1[1], 11 + (10 - 7));
    }
}

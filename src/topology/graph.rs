//! Node layouts and the built traversal graph.

use std::ptr;

use serde::{Deserialize, Serialize};

use super::arena::NodeArena;
use super::pattern::TraversalPattern;
use super::TopologyError;

/// Size of a link (one pointer).
pub const LINK_BYTES: usize = std::mem::size_of::<usize>();

/// Where the link and the optional payload live inside a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLayout {
    /// Node size in bytes; consecutive nodes are this far apart.
    pub size: usize,
    /// Byte offset of the link inside the node.
    pub link_offset: usize,
    /// Byte offset of the 64-bit payload, if the node carries one.
    pub payload_offset: Option<usize>,
}

impl NodeLayout {
    /// Plain node: a link at offset 0 followed by padding.
    pub const fn pointer(size: usize) -> Self {
        Self {
            size,
            link_offset: 0,
            payload_offset: None,
        }
    }

    /// 32-byte node with the link first and the payload right after it.
    pub const fn pointer_first() -> Self {
        Self {
            size: 4 * LINK_BYTES,
            link_offset: 0,
            payload_offset: Some(LINK_BYTES),
        }
    }

    /// 32-byte node with the payload first and the link right after it.
    pub const fn payload_first() -> Self {
        Self {
            size: 4 * LINK_BYTES,
            link_offset: LINK_BYTES,
            payload_offset: Some(0),
        }
    }

    /// Check that the link and payload fit inside the node.
    pub fn validate(&self) -> Result<(), TopologyError> {
        let mut needed = self.link_offset + LINK_BYTES;
        if let Some(payload) = self.payload_offset {
            needed = needed.max(payload + LINK_BYTES);
        }
        if self.size < needed {
            return Err(TopologyError::NodeTooSmall {
                size: self.size,
                needed,
            });
        }
        Ok(())
    }

    /// Distance from a link slot to its node's payload.
    pub fn payload_delta(&self) -> Option<isize> {
        self.payload_offset
            .map(|p| p as isize - self.link_offset as isize)
    }
}

/// A built single-cycle structure in an arena.
///
/// Each link holds the address of the next node's link slot, so a traversal
/// step is one dependent load. Read-only once built; the arena borrow ends
/// with the graph.
#[derive(Debug)]
pub struct TraversalGraph<'a> {
    pub(super) arena: &'a mut NodeArena,
    pub(super) layout: NodeLayout,
    pub(super) pattern: TraversalPattern,
    pub(super) count: usize,
    pub(super) extent: usize,
    pub(super) cycle_len: usize,
    pub(super) heads: Vec<usize>,
}

impl<'a> TraversalGraph<'a> {
    /// Pattern the graph was built with.
    pub fn pattern(&self) -> TraversalPattern {
        self.pattern
    }

    /// Node layout.
    pub fn layout(&self) -> &NodeLayout {
        &self.layout
    }

    /// Nodes in use, after any box truncation.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Region size: in-use nodes times node size.
    pub fn depth_bytes(&self) -> usize {
        self.count * self.layout.size
    }

    /// Span of the arena touched, in nodes. Exceeds `count` only for
    /// interleaved graphs, whose chains are separated by gaps.
    pub fn extent(&self) -> usize {
        self.extent
    }

    /// Length of each chain's cycle.
    pub fn cycle_len(&self) -> usize {
        self.cycle_len
    }

    /// Operations in one (possibly clamped) pass.
    pub fn pass_len(&self) -> usize {
        self.pattern.traversal_ops(self.cycle_len)
    }

    /// Start addresses, one per chain.
    pub fn heads(&self) -> &[usize] {
        &self.heads
    }

    /// Base address of node `index`.
    #[inline]
    pub fn node_addr(&self, index: usize) -> usize {
        self.arena.as_ptr() as usize + index * self.layout.size
    }

    /// Read the link stored at `addr`.
    ///
    /// `addr` must be a link slot inside this graph.
    #[inline]
    pub fn load(&self, addr: usize) -> usize {
        debug_assert!(self.contains(addr));
        // SAFETY: links are only ever written inside the arena and point at
        // link slots inside the arena.
        unsafe { ptr::read_unaligned(addr as *const usize) }
    }

    fn contains(&self, addr: usize) -> bool {
        let base = self.arena.as_ptr() as usize;
        addr >= base && addr + LINK_BYTES <= base + self.arena.len()
    }

    /// Index of the node containing `addr`.
    pub fn node_of(&self, addr: usize) -> usize {
        (addr - self.arena.as_ptr() as usize) / self.layout.size
    }

    /// Node indices visited from `head` until the walk returns to it.
    ///
    /// Fails if the walk leaves the arena or does not close within `extent` steps.
    pub fn visit_order(&self, head: usize) -> Result<Vec<usize>, TopologyError> {
        let mut order = Vec::with_capacity(self.cycle_len);
        let mut addr = head;
        loop {
            if !self.contains(addr) || order.len() >= self.extent {
                return Err(TopologyError::BrokenCycle {
                    expected: self.cycle_len,
                    found: order.len(),
                });
            }
            order.push(self.node_of(addr));
            addr = self.load(addr);
            if addr == head {
                return Ok(order);
            }
        }
    }

    /// Check that every chain is one cycle of `cycle_len` distinct nodes and
    /// that the chains together cover exactly `count` nodes.
    pub fn verify(&self) -> Result<(), TopologyError> {
        let mut seen = vec![false; self.extent];
        let mut visited = 0;
        for &head in &self.heads {
            let order = self.visit_order(head)?;
            if order.len() != self.cycle_len {
                return Err(TopologyError::BrokenCycle {
                    expected: self.cycle_len,
                    found: order.len(),
                });
            }
            for index in order {
                match seen.get_mut(index) {
                    Some(slot) if !*slot => *slot = true,
                    _ => {
                        return Err(TopologyError::BrokenCycle {
                            expected: self.cycle_len,
                            found: visited,
                        })
                    }
                }
                visited += 1;
            }
        }
        if visited != self.count {
            return Err(TopologyError::BrokenCycle {
                expected: self.count,
                found: visited,
            });
        }
        Ok(())
    }
}

/// Writes links into an arena during a build.
pub(super) struct LinkWriter {
    base: *mut u8,
    layout: NodeLayout,
}

impl LinkWriter {
    pub(super) fn new(arena: &mut NodeArena, layout: NodeLayout) -> Self {
        Self {
            base: arena.as_mut_ptr(),
            layout,
        }
    }

    /// Address of node `index`'s link slot.
    #[inline]
    pub(super) fn slot(&self, index: usize) -> usize {
        self.base as usize + index * self.layout.size + self.layout.link_offset
    }

    /// Address of pointer slot `word` of node `index`.
    #[inline]
    pub(super) fn word(&self, index: usize, word: usize) -> usize {
        self.base as usize + index * self.layout.size + word * LINK_BYTES
    }

    /// Store `target` at `at`.
    ///
    /// The builder checks the arena bound before writing.
    #[inline]
    pub(super) fn write(&mut self, at: usize, target: usize) {
        // SAFETY: callers only pass slots inside the extent checked with
        // `NodeArena::ensure`.
        unsafe { ptr::write_unaligned(at as *mut usize, target) }
    }

    /// Link node `from` to node `to`.
    #[inline]
    pub(super) fn link(&mut self, from: usize, to: usize) {
        let (at, target) = (self.slot(from), self.slot(to));
        self.write(at, target);
    }
}

//! Pointer-chasing graph construction.
//!
//! A graph is a single-cycle next relation laid over fixed-size nodes in a
//! [`NodeArena`]. The [`TraversalPattern`] decides the visiting order, and with
//! it which parts of the memory hierarchy a traversal exercises.

mod arena;
mod builder;
mod graph;
mod pattern;

use std::fmt;

pub use arena::{NodeArena, ARENA_ALIGN};
pub use builder::{TopologyBuilder, DEFAULT_BOX_BYTES};
pub use graph::{NodeLayout, TraversalGraph, LINK_BYTES};
pub use pattern::{TraversalPattern, Ways, MAX_CLAMPED_OPS};

/// Errors from building or checking a traversal graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// Zero nodes or zero bytes requested.
    EmptyRegion,
    /// The node cannot hold its link and payload.
    NodeTooSmall {
        /// Node size.
        size: usize,
        /// Bytes the layout needs.
        needed: usize,
    },
    /// The box is smaller than one node.
    ZeroBoxNodes {
        /// Box size in bytes.
        box_bytes: usize,
        /// Node size in bytes.
        node_size: usize,
    },
    /// Fewer nodes than one full box.
    TooFewBoxes {
        /// Requested nodes.
        nodes: usize,
        /// Nodes per box.
        box_nodes: usize,
    },
    /// Fewer nodes than interleaved chains.
    TooFewNodes {
        /// Requested nodes.
        nodes: usize,
        /// Nodes needed.
        minimum: usize,
    },
    /// The arena cannot hold the graph.
    ArenaTooSmall {
        /// Bytes needed.
        needed: usize,
        /// Bytes available.
        available: usize,
    },
    /// Node indices must fit in 32 bits.
    TooManyNodes {
        /// Requested nodes.
        nodes: usize,
    },
    /// Pattern name not recognised.
    UnknownPattern(String),
    /// The probe cannot walk a graph of this shape.
    UnsupportedProbe {
        /// Probe name.
        probe: &'static str,
        /// What the graph lacks.
        reason: &'static str,
    },
    /// A walk did not return to its head after the expected number of nodes.
    BrokenCycle {
        /// Expected cycle length.
        expected: usize,
        /// Nodes visited before the walk failed.
        found: usize,
    },
}

impl fmt::Display for TopologyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopologyError::EmptyRegion => write!(f, "region must contain at least one node"),
            TopologyError::NodeTooSmall { size, needed } => {
                write!(f, "node of {} bytes is too small, layout needs {}", size, needed)
            }
            TopologyError::ZeroBoxNodes {
                box_bytes,
                node_size,
            } => write!(
                f,
                "box of {} bytes holds no {}-byte nodes",
                box_bytes, node_size
            ),
            TopologyError::TooFewBoxes { nodes, box_nodes } => write!(
                f,
                "{} nodes do not fill one box of {} nodes",
                nodes, box_nodes
            ),
            TopologyError::TooFewNodes { nodes, minimum } => {
                write!(f, "{} nodes is fewer than the {} chains", nodes, minimum)
            }
            TopologyError::ArenaTooSmall { needed, available } => write!(
                f,
                "arena too small: need {} bytes, have {}",
                needed, available
            ),
            TopologyError::TooManyNodes { nodes } => {
                write!(f, "{} nodes exceed the 32-bit index range", nodes)
            }
            TopologyError::UnknownPattern(name) => write!(f, "unknown traversal pattern: {}", name),
            TopologyError::UnsupportedProbe { probe, reason } => {
                write!(f, "probe {} cannot run here: {}", probe, reason)
            }
            TopologyError::BrokenCycle { expected, found } => write!(
                f,
                "traversal is not a single cycle: expected {} nodes, walked {}",
                expected, found
            ),
        }
    }
}

impl std::error::Error for TopologyError {}

//! Depth sweep planning.
//!
//! A sweep is a list of node counts, each with a repeat count large enough to
//! keep a measured window well above the cost of reading the counters.
//! Byte-range sweeps are drawn from one shared table of depths so results for
//! different node sizes line up when plotted together.

use serde::{Deserialize, Serialize};

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;

/// Byte sizes around which latency is expected to change: cache capacities
/// and translation reach of the cores this was tuned on.
pub const INTERESTING_SIZES: [usize; 13] = [
    64 * KIB,
    128 * KIB,
    160 * KIB,
    2 * MIB,
    3 * MIB,
    7512 * KIB,
    16 * MIB,
    23512 * KIB,
    48 * MIB,
    51200 * KIB,
    51600 * KIB,
    256 * MIB,
    1024 * MIB,
];

/// Smallest depth in the table: sixteen pointers.
pub const SMALLEST_DEPTH: usize = 16 * std::mem::size_of::<usize>();

/// Steps between the first and last sample of a point sweep.
pub const POINT_STEPS: usize = 8;

/// One planned measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DepthEntry {
    /// Nodes to build.
    pub nodes: usize,
    /// Passes over the graph per measured window; always at least 1.
    pub repeat: u64,
}

/// One row of the shared depth table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BaseDepth {
    /// Depth in bytes.
    pub bytes: usize,
    /// Repeat count for pointer-sized nodes at this depth.
    pub repeat: u64,
}

/// Turns a (lower, upper) node range into a list of [`DepthEntry`].
#[derive(Debug, Clone)]
pub struct DepthSequencer {
    min_inner_count: u64,
    base: Vec<BaseDepth>,
}

impl DepthSequencer {
    /// Sequencer targeting `min_inner_count` loads per window at the
    /// smallest depths.
    pub fn new(min_inner_count: u64) -> Self {
        let min_inner_count = min_inner_count.max(1);
        Self {
            min_inner_count,
            base: base_depths(min_inner_count),
        }
    }

    /// The shared table, sorted by depth.
    pub fn base(&self) -> &[BaseDepth] {
        &self.base
    }

    /// Plan a sweep over nodes of `node_size` bytes.
    ///
    /// - `lower < 0`: nine evenly spaced counts from `|lower|` towards `upper`.
    ///   When `upper` is less than eight counts past `|lower|` the step is
    ///   zero and all nine entries repeat `|lower|`, so the same depth is
    ///   measured nine times.
    /// - `lower == upper`: that count alone.
    /// - otherwise: every table depth between `lower` and `upper` nodes,
    ///   converted to node counts. Repeats scale up with node size and are
    ///   damped by `log2(node_size)`.
    ///
    /// Every sweep is duplicate-free and strictly increasing in `nodes`, except
    /// the repeat form above, which returns duplicates on purpose.
    pub fn sequence(&self, lower: i64, upper: usize, node_size: usize) -> Vec<DepthEntry> {
        let node_size = node_size.max(1);

        if lower < 0 {
            let start = lower.unsigned_abs() as usize;
            let step = upper.saturating_sub(start) / POINT_STEPS;
            let mut entries: Vec<DepthEntry> = (0..=POINT_STEPS)
                .map(|i| self.point(start + i * step))
                .filter(|e| e.nodes > 0)
                .collect();
            if step > 0 {
                entries.dedup_by_key(|e| e.nodes);
            }
            return entries;
        }

        let lower = lower as usize;
        if lower == upper {
            return if lower > 0 { vec![self.point(lower)] } else { Vec::new() };
        }

        let (lower_bytes, upper_bytes) = (
            lower.saturating_mul(node_size),
            upper.saturating_mul(node_size),
        );
        let damping = (node_size as f64).log2();

        let mut entries: Vec<DepthEntry> = self
            .base
            .iter()
            .filter(|d| d.bytes >= lower_bytes && d.bytes <= upper_bytes)
            .map(|d| {
                let mut repeat = d.repeat.saturating_mul(node_size as u64);
                if damping >= 1.0 && repeat as f64 > damping {
                    repeat = (repeat as f64 / damping) as u64;
                }
                DepthEntry {
                    nodes: d.bytes / node_size,
                    repeat: repeat.max(1),
                }
            })
            .filter(|e| e.nodes > 0)
            .collect();

        entries.sort();
        entries.dedup_by_key(|e| e.nodes);
        entries
    }

    fn point(&self, nodes: usize) -> DepthEntry {
        DepthEntry {
            nodes,
            repeat: repeat_for(self.min_inner_count, nodes),
        }
    }
}

fn repeat_for(min_inner_count: u64, size: usize) -> u64 {
    (min_inner_count / size.max(1) as u64).max(1)
}

/// Every interval `[low, high)` of the interesting sizes contributes `low`,
/// `low·9/8`, three quartile points, and `high·7/8`. Densest right around
/// each transition.
fn base_depths(min_inner_count: u64) -> Vec<BaseDepth> {
    let mut depths = Vec::with_capacity(INTERESTING_SIZES.len() * 6 + 1);
    let mut push = |bytes: usize| {
        depths.push(BaseDepth {
            bytes,
            repeat: repeat_for(min_inner_count, bytes),
        })
    };

    let mut low = SMALLEST_DEPTH;
    for high in INTERESTING_SIZES {
        let low_plus = low * 9 / 8;
        let high_minus = high * 7 / 8;
        let span = high_minus.saturating_sub(low_plus);

        push(low);
        push(low_plus);
        for quarter in 1..=3 {
            push(low_plus + quarter * span / 4);
        }
        push(high_minus);
        low = high;
    }
    push(low);

    depths.sort();
    depths.dedup_by_key(|d| d.bytes);
    depths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_table_shape() {
        let seq = DepthSequencer::new(10_000_000);
        let base = seq.base();
        assert_eq!(base.first().map(|d| d.bytes), Some(128));
        assert_eq!(base.last().map(|d| d.bytes), Some(1024 * MIB));
        assert!(base.windows(2).all(|w| w[0].bytes < w[1].bytes));
        assert!(base.iter().all(|d| d.repeat >= 1));
        assert_eq!(base[0].repeat, 10_000_000 / 128);
        // The table straddles each interesting size.
        assert!(base.iter().any(|d| d.bytes == 128 * KIB));
        assert!(base.iter().any(|d| d.bytes == 128 * KIB * 9 / 8));
    }

    #[test]
    fn test_repeat_scaling_for_pointer_nodes() {
        let seq = DepthSequencer::new(10_000_000);
        let entries = seq.sequence(16, 16 * 4, 8);
        // 128 B: 78125 passes, ×8 bytes, ÷log2(8).
        assert_eq!(entries[0], DepthEntry { nodes: 16, repeat: 208_333 });
    }

    #[test]
    fn test_large_nodes_floor_repeat() {
        let seq = DepthSequencer::new(500_000);
        let entries = seq.sequence(16, 1500 * MIB / (16 * KIB), 16 * KIB);
        assert!(!entries.is_empty());
        assert!(entries.iter().all(|e| e.repeat >= 1 && e.nodes >= 16));
    }
}

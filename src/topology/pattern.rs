//! Traversal pattern selectors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::TopologyError;

/// Operations per pass for patterns whose passes are clamped.
pub const MAX_CLAMPED_OPS: usize = 1 << 20;

/// Number of concurrently walked chains for interleaved patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ways {
    /// Two chains.
    Two,
    /// Four chains.
    Four,
    /// Eight chains.
    Eight,
    /// Sixteen chains.
    Sixteen,
}

impl Ways {
    /// All supported widths, narrowest first.
    pub const ALL: [Ways; 4] = [Ways::Two, Ways::Four, Ways::Eight, Ways::Sixteen];

    /// Number of chains.
    pub const fn count(self) -> usize {
        match self {
            Ways::Two => 2,
            Ways::Four => 4,
            Ways::Eight => 8,
            Ways::Sixteen => 16,
        }
    }

    fn from_count(count: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.count() == count)
    }
}

/// How the single-cycle next relation is laid over the node array.
///
/// Each pattern isolates one part of the memory hierarchy:
/// linear patterns give the prefetcher-friendly baseline, box patterns
/// separate locality inside a box from the order boxes are visited in,
/// offset patterns separate translation-cache effects from cache set
/// placement, and full random defeats every prefetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraversalPattern {
    /// Node `i` links to `i + 1`, the last back to 0.
    LinearIncreasing,
    /// Node `i` links to `i - 1`, node 0 to the last.
    LinearDecreasing,
    /// `ways` independent linear chains walked together.
    ///
    /// Chain `j + 1` starts `(j + 1)²` nodes after the end of chain `j`, so
    /// the distance between chains is never a constant stride. With `remap`
    /// each chain visits its nodes with a per-chain stride instead of in order.
    Interleaved {
        /// Number of chains.
        ways: Ways,
        /// Walk each chain with a signed stride instead of sequentially.
        remap: bool,
    },
    /// The same random order inside every box; boxes visited in order.
    SameRandomInBoxIncreasingBox,
    /// A fresh random order inside each box; boxes visited in order.
    DiftRandomInBoxIncreasingBox,
    /// A fresh random order inside each box; boxes visited in random order.
    RandomInBoxRandomBox,
    /// Sequential inside each box; boxes visited in random order.
    IncreasingInBoxRandomBox,
    /// Linear over nodes, each link landing at a random pointer slot of its target.
    RandomOffset,
    /// As [`RandomOffset`](Self::RandomOffset), slots rounded down to a 64-byte line.
    RandomOffsetLineAligned,
    /// Linear over nodes, line-aligned slots taken from a fixed permutation.
    RandomOffsetPermuted,
    /// A uniformly random single cycle through every node.
    FullRandom,
}

impl TraversalPattern {
    /// Whether the pattern partitions the region into boxes.
    pub fn is_box_local(self) -> bool {
        matches!(
            self,
            TraversalPattern::SameRandomInBoxIncreasingBox
                | TraversalPattern::DiftRandomInBoxIncreasingBox
                | TraversalPattern::RandomInBoxRandomBox
                | TraversalPattern::IncreasingInBoxRandomBox
        )
    }

    /// Whether links point into the middle of their target node.
    pub fn is_offset(self) -> bool {
        matches!(
            self,
            TraversalPattern::RandomOffset
                | TraversalPattern::RandomOffsetLineAligned
                | TraversalPattern::RandomOffsetPermuted
        )
    }

    /// Whether one pass is capped at [`MAX_CLAMPED_OPS`].
    ///
    /// Only patterns whose visiting order is uniformly random are clamped: a
    /// partial pass over them is as representative as a full one.
    pub fn is_clamped(self) -> bool {
        matches!(
            self,
            TraversalPattern::FullRandom
                | TraversalPattern::RandomInBoxRandomBox
                | TraversalPattern::IncreasingInBoxRandomBox
        )
    }

    /// Number of chain heads the traversal advances per operation.
    pub fn heads(self) -> usize {
        match self {
            TraversalPattern::Interleaved { ways, .. } => ways.count(),
            _ => 1,
        }
    }

    /// Operations actually performed for a requested count.
    pub fn traversal_ops(self, requested: usize) -> usize {
        if self.is_clamped() {
            requested.min(MAX_CLAMPED_OPS)
        } else {
            requested
        }
    }
}

impl fmt::Display for TraversalPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraversalPattern::LinearIncreasing => write!(f, "linear-increasing"),
            TraversalPattern::LinearDecreasing => write!(f, "linear-decreasing"),
            TraversalPattern::Interleaved { ways, remap } => {
                write!(f, "interleaved-{}", ways.count())?;
                if *remap {
                    write!(f, "-remap")?;
                }
                Ok(())
            }
            TraversalPattern::SameRandomInBoxIncreasingBox => write!(f, "same-random-in-box"),
            TraversalPattern::DiftRandomInBoxIncreasingBox => write!(f, "dift-random-in-box"),
            TraversalPattern::RandomInBoxRandomBox => write!(f, "random-in-box-random-box"),
            TraversalPattern::IncreasingInBoxRandomBox => {
                write!(f, "increasing-in-box-random-box")
            }
            TraversalPattern::RandomOffset => write!(f, "random-offset"),
            TraversalPattern::RandomOffsetLineAligned => write!(f, "random-offset-line-aligned"),
            TraversalPattern::RandomOffsetPermuted => write!(f, "random-offset-permuted"),
            TraversalPattern::FullRandom => write!(f, "full-random"),
        }
    }
}

impl FromStr for TraversalPattern {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let pattern = match s {
            "linear-increasing" => TraversalPattern::LinearIncreasing,
            "linear-decreasing" => TraversalPattern::LinearDecreasing,
            "same-random-in-box" => TraversalPattern::SameRandomInBoxIncreasingBox,
            "dift-random-in-box" => TraversalPattern::DiftRandomInBoxIncreasingBox,
            "random-in-box-random-box" => TraversalPattern::RandomInBoxRandomBox,
            "increasing-in-box-random-box" => TraversalPattern::IncreasingInBoxRandomBox,
            "random-offset" => TraversalPattern::RandomOffset,
            "random-offset-line-aligned" => TraversalPattern::RandomOffsetLineAligned,
            "random-offset-permuted" => TraversalPattern::RandomOffsetPermuted,
            "full-random" => TraversalPattern::FullRandom,
            other => {
                let unknown = || TopologyError::UnknownPattern(other.to_string());
                let rest = other.strip_prefix("interleaved-").ok_or_else(unknown)?;
                let (count, remap) = match rest.strip_suffix("-remap") {
                    Some(count) => (count, true),
                    None => (rest, false),
                };
                let ways = count
                    .parse::<usize>()
                    .ok()
                    .and_then(Ways::from_count)
                    .ok_or_else(unknown)?;
                TraversalPattern::Interleaved { ways, remap }
            }
        };
        Ok(pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        let mut all = vec![
            TraversalPattern::LinearIncreasing,
            TraversalPattern::LinearDecreasing,
            TraversalPattern::SameRandomInBoxIncreasingBox,
            TraversalPattern::DiftRandomInBoxIncreasingBox,
            TraversalPattern::RandomInBoxRandomBox,
            TraversalPattern::IncreasingInBoxRandomBox,
            TraversalPattern::RandomOffset,
            TraversalPattern::RandomOffsetLineAligned,
            TraversalPattern::RandomOffsetPermuted,
            TraversalPattern::FullRandom,
        ];
        for ways in Ways::ALL {
            all.push(TraversalPattern::Interleaved { ways, remap: false });
            all.push(TraversalPattern::Interleaved { ways, remap: true });
        }
        for pattern in all {
            assert_eq!(pattern.to_string().parse::<TraversalPattern>(), Ok(pattern));
        }
    }

    #[test]
    fn test_unknown_pattern_rejected() {
        for name in ["zigzag", "interleaved-3", "interleaved-", "interleaved-4-remapx"] {
            assert_eq!(
                name.parse::<TraversalPattern>(),
                Err(TopologyError::UnknownPattern(name.to_string()))
            );
        }
    }

    #[test]
    fn test_clamp_set() {
        assert_eq!(TraversalPattern::FullRandom.traversal_ops(5_000_000), MAX_CLAMPED_OPS);
        assert_eq!(TraversalPattern::RandomInBoxRandomBox.traversal_ops(1 << 21), 1 << 20);
        assert_eq!(TraversalPattern::IncreasingInBoxRandomBox.traversal_ops(1 << 21), 1 << 20);
        assert_eq!(TraversalPattern::LinearIncreasing.traversal_ops(5_000_000), 5_000_000);
        assert_eq!(TraversalPattern::SameRandomInBoxIncreasingBox.traversal_ops(1 << 21), 1 << 21);
        assert_eq!(TraversalPattern::FullRandom.traversal_ops(1000), 1000);
    }
}

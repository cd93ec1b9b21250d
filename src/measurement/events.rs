//! Hardware event selectors for the configurable counter slots.
//!
//! Event numbers are Apple core PMU events (from `/usr/share/kpep/a14.plist`
//! and reverse-engineering). On Linux the same numbers are passed through as
//! raw `perf_event` configs, so a Linux event set must use the target CPU's
//! own raw encodings.

use serde::{Deserialize, Serialize};

use super::snapshot::CONFIGURABLE_COUNT;

/// Selector value meaning "slot unused".
pub const NONE: u32 = 0;

/// Core cycles (fixed counter 0 on Apple Silicon).
pub const CORE_CYCLE: u32 = 0x02;
/// Retired instructions (fixed counter 1 on Apple Silicon).
pub const CORE_RETIRED: u32 = 0x01;
/// A64 instructions decoded, including speculative ones.
pub const INST_A64: u32 = 0x8c;
/// Branch instructions.
pub const INST_BRANCH: u32 = 0x8d;
/// Synchronous L1D load misses.
pub const SYNC_DC_LOAD_MISS: u32 = 0xbf;
/// Synchronous L1D store misses.
pub const SYNC_DC_STORE_MISS: u32 = 0xc0;
/// Synchronous data TLB misses.
pub const SYNC_DTLB_MISS: u32 = 0xc1;
/// Any branch mispredict.
pub const SYNC_BR_ANY_MISP: u32 = 0xcb;
/// Instruction cache demand misses.
pub const FED_IC_MISS_DEM: u32 = 0xd3;
/// Instruction TLB misses.
pub const FED_ITLB_MISS: u32 = 0xd4;

/// Load/store uops mapped.
pub const MAP_LDST_UOP: u32 = 125;
/// L1D store misses.
pub const L1D_CACHE_MISS_ST: u32 = 162;
/// L1D load misses.
pub const L1D_CACHE_MISS_LD: u32 = 163;
/// Load unit uops.
pub const LD_UNIT_UOP: u32 = 166;
/// Store unit uops.
pub const ST_UNIT_UOP: u32 = 167;
/// L1D writebacks.
pub const L1D_CACHE_WRITEBACK: u32 = 168;
/// Load/store instructions.
pub const INST_LDST: u32 = 155;
/// Non-speculative store-to-load ordering violations.
pub const ST_MEMORY_ORDER_VIOLATION_NONSPEC: u32 = 196;
/// Non-temporal store uops.
pub const ST_NT_UOP: u32 = 229;
/// Non-temporal load uops.
pub const LD_NT_UOP: u32 = 230;

/// Execution-level mask restricting counting to user-mode A64 code (EL0).
pub const USER_MODE_MASK: u64 = 0x20000;

/// The eight event selectors for the configurable counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSet(pub [u32; CONFIGURABLE_COUNT]);

impl EventSet {
    /// Every slot unused.
    pub const fn empty() -> Self {
        Self([NONE; CONFIGURABLE_COUNT])
    }

    /// Memory-pipeline events used by the latency probes.
    pub const fn memory() -> Self {
        let mut slots = [NONE; CONFIGURABLE_COUNT];
        slots[0] = MAP_LDST_UOP;
        slots[1] = LD_UNIT_UOP;
        slots[2] = L1D_CACHE_MISS_LD;
        slots[3] = ST_MEMORY_ORDER_VIOLATION_NONSPEC;
        slots[4] = ST_UNIT_UOP;
        slots[5] = INST_LDST;
        slots[6] = L1D_CACHE_MISS_ST;
        slots[7] = L1D_CACHE_WRITEBACK;
        Self(slots)
    }

    /// Config words with the user-mode mask applied, as written to the PMU.
    pub fn config_words(&self) -> [u64; CONFIGURABLE_COUNT] {
        let mut words = [0u64; CONFIGURABLE_COUNT];
        for (word, &event) in words.iter_mut().zip(self.0.iter()) {
            *word = u64::from(event) | USER_MODE_MASK;
        }
        words
    }

    /// Iterate over `(slot, event)` pairs for slots that are in use.
    pub fn active(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.0
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, event)| event != NONE)
    }
}

impl Default for EventSet {
    fn default() -> Self {
        Self::memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_mode_mask_always_applied() {
        let words = EventSet::empty().config_words();
        assert!(words.iter().all(|&w| w == USER_MODE_MASK));

        let words = EventSet::memory().config_words();
        assert_eq!(words[2], u64::from(L1D_CACHE_MISS_LD) | USER_MODE_MASK);
    }

    #[test]
    fn test_active_skips_unused_slots() {
        let mut set = EventSet::empty();
        set.0[3] = SYNC_DTLB_MISS;
        let active: Vec<_> = set.active().collect();
        assert_eq!(active, vec![(3, SYNC_DTLB_MISS)]);
    }
}

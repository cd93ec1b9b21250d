//! Depth planning for the three bound forms.

use mem_latency::{DepthEntry, DepthSequencer, INTERESTING_SIZES};

#[test]
fn equal_bounds_give_one_entry() {
    let seq = DepthSequencer::new(10_000_000);
    assert_eq!(
        seq.sequence(1000, 1000, 64),
        vec![DepthEntry {
            nodes: 1000,
            repeat: 10_000
        }]
    );
}

#[test]
fn negative_lower_gives_nine_points() {
    let seq = DepthSequencer::new(10_000_000);
    let entries = seq.sequence(-1024, 3072, 8);

    assert_eq!(entries.len(), 9);
    assert_eq!(entries.first().map(|e| e.nodes), Some(1024));
    assert_eq!(entries.last().map(|e| e.nodes), Some(3072));
    assert!(entries.windows(2).all(|w| w[0].nodes < w[1].nodes));
    for e in &entries {
        assert_eq!(e.repeat, 10_000_000 / e.nodes as u64);
    }
}

#[test]
fn negative_lower_past_upper_repeats_one_count() {
    let seq = DepthSequencer::new(1_000);
    let entries = seq.sequence(-100, 50, 8);
    assert_eq!(entries.len(), 9);
    assert!(entries.iter().all(|e| e.nodes == 100 && e.repeat == 10));
}

#[test]
fn only_the_repeat_form_has_duplicates() {
    let seq = DepthSequencer::new(1_000);
    let narrow = seq.sequence(-100, 104, 8);
    assert_eq!(narrow.len(), 9);
    assert!(narrow.iter().all(|e| e.nodes == 100));

    let spread = seq.sequence(-100, 900, 8);
    assert!(spread.windows(2).all(|w| w[0].nodes < w[1].nodes));
    for (lower, upper, size) in [(16, 1 << 20, 8), (1, 64, 16 * 1024)] {
        let entries = seq.sequence(lower, upper, size);
        assert!(entries.windows(2).all(|w| w[0].nodes != w[1].nodes));
    }
}

#[test]
fn range_stays_inside_bounds() {
    let seq = DepthSequencer::new(10_000_000);
    for size in [8, 64, 256, 16 * 1024] {
        let (lower, upper) = (16usize, (64 << 20) / size);
        let entries = seq.sequence(lower as i64, upper, size);
        assert!(!entries.is_empty(), "{} B nodes", size);
        assert!(entries.windows(2).all(|w| w[0].nodes < w[1].nodes));
        assert!(entries.iter().all(|e| e.nodes >= lower && e.nodes <= upper));
        assert!(entries.iter().all(|e| e.repeat >= 1));
    }
}

#[test]
fn range_straddles_interesting_sizes() {
    let seq = DepthSequencer::new(10_000_000);
    let entries = seq.sequence(16, (1 << 30) / 8, 8);
    for size in INTERESTING_SIZES {
        assert!(
            entries.iter().any(|e| e.nodes * 8 == size),
            "missing {} bytes",
            size
        );
    }
}

#[test]
fn repeats_shrink_with_depth() {
    let seq = DepthSequencer::new(10_000_000);
    let entries = seq.sequence(16, (256 << 20) / 64, 64);
    assert!(entries.windows(2).all(|w| w[0].repeat >= w[1].repeat));
}

#[test]
fn empty_and_inverted_ranges() {
    let seq = DepthSequencer::new(10_000_000);
    assert!(seq.sequence(0, 0, 8).is_empty());
    assert!(seq.sequence(4096, 16, 8).is_empty());
}

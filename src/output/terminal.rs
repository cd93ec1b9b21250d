//! Terminal output formatting with colors and box drawing.

use colored::Colorize;

use crate::measurement::Averaging;
use crate::result::{DepthResult, SuiteReport, TestReport};

/// Format a SuiteReport for human-readable terminal output.
///
/// One table per test row. Each line's cycles/op is colored by how far it
/// has climbed over the row's first depth, so level transitions stand out.
pub fn format_report(report: &SuiteReport) -> String {
    let mut output = String::new();
    let sep = "\u{2500}".repeat(68);
    let meta = &report.metadata;

    output.push_str(&format!("mem-latency: {} suite\n", report.suite));
    output.push_str(&sep);
    output.push('\n');

    let unit = if meta.core_cycles {
        "core cycles".green().to_string()
    } else {
        "timer ticks".yellow().to_string()
    };
    output.push_str(&format!("  Backend:   {} ({})\n", meta.backend, unit));
    output.push_str(&format!(
        "  Averaging: {} of {} window(s)\n",
        averaging_name(meta.averaging),
        meta.outer_count
    ));
    output.push_str(&format!("  Seed:      {:#x}\n", meta.seed));
    output.push_str(&format!("  Runtime:   {:.1} s\n", meta.runtime_secs));

    for group in &report.groups {
        output.push('\n');
        output.push_str(&format!("{}\n", group.title.bold()));
        for test in &group.tests {
            output.push_str(&format_test(test, meta.averaging));
        }
    }

    output.push('\n');
    output.push_str(&sep);
    output.push('\n');
    if !meta.core_cycles {
        output.push_str(
            "Note: cycles are timer ticks. Enable the kperf or perf feature for core cycles.\n",
        );
    }

    output
}

fn format_test(test: &TestReport, averaging: Averaging) -> String {
    let mut output = String::new();
    let boxed = test
        .box_bytes
        .map(|b| format!(", {} box", format_bytes(b)))
        .unwrap_or_default();
    output.push_str(&format!("\n  {} ({}{})\n", test.label, test.probe, boxed));

    if test.depths.is_empty() {
        output.push_str(&format!("    {}\n", "no depths in range".dimmed()));
        return output;
    }

    output.push_str(&format!(
        "    {:>10} {:>10} {:>12} {:>10} {:>9} {:>8}\n",
        "nodes", "depth", "cycles", "cycles/op", "ns/op", "cyc/ns"
    ));
    let floor = test.depths[0].cycles_per_op(averaging);
    for depth in &test.depths {
        output.push_str(&format_depth(depth, averaging, floor));
    }
    output
}

fn format_depth(depth: &DepthResult, averaging: Averaging, floor: f64) -> String {
    let cycles = depth.cycles_per_op(averaging);
    let cell = format!("{:>10.2}", cycles);
    let cell = if floor <= 0.0 || cycles <= 1.5 * floor {
        cell.green()
    } else if cycles <= 4.0 * floor {
        cell.yellow()
    } else {
        cell.red()
    };
    format!(
        "    {:>10} {:>10} {:>12.0} {} {:>9.2} {:>8.2}\n",
        depth.nodes,
        format_bytes(depth.depth_bytes),
        depth.cycles.get(averaging),
        cell,
        depth.ns_per_op(averaging),
        depth.cycles_per_ns(averaging)
    )
}

fn averaging_name(averaging: Averaging) -> &'static str {
    match averaging {
        Averaging::Min => "min",
        Averaging::Mean => "mean",
        Averaging::Max => "max",
    }
}

/// Byte count with a binary unit, e.g. `48 KiB` or `1.5 MiB`.
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if value.fract() == 0.0 {
        format!("{} {}", value, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::CONFIGURABLE_COUNT;
    use crate::result::{GroupReport, Metadata};
    use crate::suites::Suite;
    use crate::topology::TraversalPattern;
    use crate::traversal::Probe;
    use crate::types::Statistic;

    fn depth(nodes: usize, cycles: f64) -> DepthResult {
        let stat = |v: f64| Statistic {
            min: v,
            mean: v,
            max: v,
        };
        DepthResult {
            nodes,
            depth_bytes: nodes * 64,
            ops_per_pass: nodes,
            repeat: 10,
            cycles: stat(cycles * nodes as f64),
            ns: stat(cycles * nodes as f64 / 4.0),
            events: [0.0; CONFIGURABLE_COUNT],
        }
    }

    fn make_report(core_cycles: bool) -> SuiteReport {
        SuiteReport {
            suite: Suite::Primary,
            groups: vec![GroupReport {
                title: "64-byte nodes".to_string(),
                tests: vec![TestReport {
                    label: "FullRandom".to_string(),
                    probe: Probe::Chase,
                    pattern: TraversalPattern::FullRandom,
                    node_size: 64,
                    box_bytes: None,
                    depths: vec![depth(128, 3.0), depth(4096, 100.0)],
                }],
            }],
            metadata: Metadata {
                backend: "kperf".to_string(),
                core_cycles,
                averaging: Averaging::Min,
                outer_count: 3,
                seed: 0x5EED_CAFE,
                min_inner_count: 10_000_000,
                max_depth_bytes: 1 << 20,
                runtime_secs: 1.5,
            },
        }
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(48 * 1024), "48 KiB");
        assert_eq!(format_bytes(3 * 512 * 1024), "1.5 MiB");
        assert_eq!(format_bytes(1 << 30), "1 GiB");
    }

    #[test]
    fn test_format_report() {
        let output = format_report(&make_report(true));
        assert!(output.contains("mem-latency: primary suite"));
        assert!(output.contains("64-byte nodes"));
        assert!(output.contains("FullRandom (chase)"));
        assert!(output.contains("3.00"));
        assert!(output.contains("100.00"));
        assert!(output.contains("256 KiB"));
        assert!(!output.contains("timer ticks. Enable"));
    }

    #[test]
    fn test_rows_carry_cycles_per_pass() {
        let output = format_report(&make_report(true));
        let header = output
            .lines()
            .find(|l| l.contains("cycles/op"))
            .unwrap();
        let columns: Vec<&str> = header.split_whitespace().collect();
        assert_eq!(
            columns,
            ["nodes", "depth", "cycles", "cycles/op", "ns/op", "cyc/ns"]
        );

        // 128 nodes at 3 cycles each, then 4096 nodes at 100.
        let row = output.lines().find(|l| l.contains("384")).unwrap();
        assert!(row.contains("3.00"));
        assert!(output.lines().any(|l| l.contains("409600") && l.contains("100.00")));
    }

    #[test]
    fn test_timer_backend_note() {
        let output = format_report(&make_report(false));
        assert!(output.contains("timer ticks. Enable"));
    }
}

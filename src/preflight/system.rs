//! Host settings that shift or blur latency curves.
//!
//! Linux only; other platforms report nothing.

use serde::{Deserialize, Serialize};

/// Load average above which shared caches are assumed to be contended.
pub const LOAD_THRESHOLD: f64 = 1.0;

/// A host setting that degrades latency measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SystemWarning {
    /// Frequency scaling may change clock speed mid-sweep.
    CpuGovernorNotPerformance {
        /// Governor in use.
        current: String,
    },

    /// The governor file exists on most hosts but could not be read.
    CpuGovernorUnreadable {
        /// I/O error text.
        reason: String,
    },

    /// User-space PMU access is forbidden.
    PerfEventRestricted {
        /// Value of `perf_event_paranoid`.
        level: i32,
    },

    /// Transparent huge pages back large regions, extending translation reach.
    TransparentHugePages {
        /// Active THP mode.
        mode: String,
    },

    /// A hypervisor adds a second translation stage.
    VirtualMachineDetected {
        /// Vendor string, if the DMI tables name one.
        vm_type: Option<String>,
    },

    /// Other work is competing for the shared caches.
    HighSystemLoad {
        /// One-minute load average.
        load_average: f64,
        /// Threshold exceeded.
        threshold: f64,
    },
}

impl SystemWarning {
    /// One-line explanation with the fix where there is one.
    pub fn description(&self) -> String {
        match self {
            SystemWarning::CpuGovernorNotPerformance { current } => format!(
                "CPU governor is '{}'; cycle and nanosecond columns will disagree. \
                 Switch to 'performance' (sudo cpupower frequency-set -g performance).",
                current
            ),
            SystemWarning::CpuGovernorUnreadable { reason } => {
                format!("CPU governor unknown ({})", reason)
            }
            SystemWarning::PerfEventRestricted { level } => format!(
                "perf_event_paranoid is {}; hardware counters need <= 2 \
                 (or run as root). Falling back to the timestamp counter.",
                level
            ),
            SystemWarning::TransparentHugePages { mode } => format!(
                "Transparent huge pages are '{}'; large regions may be mapped with huge \
                 pages and TLB transitions will move. Set to 'madvise' or 'never' for \
                 base-page results.",
                mode
            ),
            SystemWarning::VirtualMachineDetected { vm_type } => format!(
                "Virtual machine detected{}; nested paging inflates translation-bound \
                 latencies.",
                vm_type
                    .as_deref()
                    .map(|t| format!(" ({})", t))
                    .unwrap_or_default()
            ),
            SystemWarning::HighSystemLoad {
                load_average,
                threshold,
            } => format!(
                "Load average {:.2} exceeds {:.2}; shared cache levels will look \
                 smaller and slower.",
                load_average, threshold
            ),
        }
    }
}

/// Run every host check available on this platform.
pub fn system_check() -> Vec<SystemWarning> {
    #[cfg(target_os = "linux")]
    {
        linux::checks()
    }

    #[cfg(not(target_os = "linux"))]
    {
        Vec::new()
    }
}

fn governor_warning(governor: &str) -> Option<SystemWarning> {
    let governor = governor.trim().to_lowercase();
    (governor != "performance")
        .then_some(SystemWarning::CpuGovernorNotPerformance { current: governor })
}

fn paranoid_warning(level: i32) -> Option<SystemWarning> {
    (level > 2).then_some(SystemWarning::PerfEventRestricted { level })
}

/// The active mode is the bracketed word, e.g. `always [madvise] never`.
fn thp_warning(setting: &str) -> Option<SystemWarning> {
    let mode = setting
        .split_whitespace()
        .find_map(|w| w.strip_prefix('[').and_then(|w| w.strip_suffix(']')))?;
    (mode == "always").then(|| SystemWarning::TransparentHugePages {
        mode: mode.to_string(),
    })
}

fn load_warning(loadavg: &str) -> Option<SystemWarning> {
    let load = loadavg.split_whitespace().next()?.parse::<f64>().ok()?;
    (load > LOAD_THRESHOLD).then_some(SystemWarning::HighSystemLoad {
        load_average: load,
        threshold: LOAD_THRESHOLD,
    })
}

#[cfg(target_os = "linux")]
mod linux {
    use std::fs;

    use super::*;

    const GOVERNOR: &str = "/sys/devices/system/cpu/cpu0/cpufreq/scaling_governor";
    const PARANOID: &str = "/proc/sys/kernel/perf_event_paranoid";
    const THP: &str = "/sys/kernel/mm/transparent_hugepage/enabled";

    pub(super) fn checks() -> Vec<SystemWarning> {
        let governor = match fs::read_to_string(GOVERNOR) {
            Ok(g) => governor_warning(&g),
            Err(e) => Some(SystemWarning::CpuGovernorUnreadable {
                reason: e.to_string(),
            }),
        };
        let paranoid = fs::read_to_string(PARANOID)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .and_then(paranoid_warning);
        let thp = fs::read_to_string(THP).ok().and_then(|s| thp_warning(&s));
        let load = fs::read_to_string("/proc/loadavg")
            .ok()
            .and_then(|s| load_warning(&s));

        [governor, paranoid, thp, hypervisor(), load]
            .into_iter()
            .flatten()
            .collect()
    }

    fn hypervisor() -> Option<SystemWarning> {
        let cpuinfo = fs::read_to_string("/proc/cpuinfo").ok()?;
        let flagged = cpuinfo
            .lines()
            .filter(|l| l.starts_with("flags"))
            .any(|l| l.split_whitespace().any(|f| f == "hypervisor"));
        flagged.then(|| SystemWarning::VirtualMachineDetected {
            vm_type: fs::read_to_string("/sys/class/dmi/id/sys_vendor")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checks_do_not_panic() {
        for warning in system_check() {
            assert!(!warning.description().is_empty());
        }
    }

    #[test]
    fn test_parsers() {
        assert_eq!(governor_warning("performance\n"), None);
        assert_eq!(
            governor_warning("Schedutil\n"),
            Some(SystemWarning::CpuGovernorNotPerformance {
                current: "schedutil".to_string()
            })
        );

        assert_eq!(paranoid_warning(2), None);
        assert_eq!(paranoid_warning(-1), None);
        assert_eq!(
            paranoid_warning(4),
            Some(SystemWarning::PerfEventRestricted { level: 4 })
        );

        assert_eq!(thp_warning("always madvise [never]\n"), None);
        assert_eq!(thp_warning("always [madvise] never\n"), None);
        assert_eq!(
            thp_warning("[always] madvise never\n"),
            Some(SystemWarning::TransparentHugePages {
                mode: "always".to_string()
            })
        );
        assert_eq!(thp_warning(""), None);

        assert_eq!(load_warning("0.42 0.30 0.20 1/300 4242\n"), None);
        assert!(matches!(
            load_warning("2.50 1.00 0.50 3/300 4242\n"),
            Some(SystemWarning::HighSystemLoad { load_average, .. }) if load_average == 2.5
        ));
    }

    #[test]
    fn test_descriptions_name_the_fix() {
        let desc = SystemWarning::TransparentHugePages {
            mode: "always".to_string(),
        }
        .description();
        assert!(desc.contains("TLB"));
        assert!(desc.contains("madvise"));

        let desc = SystemWarning::VirtualMachineDetected {
            vm_type: Some("QEMU".to_string()),
        }
        .description();
        assert!(desc.contains("(QEMU)"));

        let desc = SystemWarning::HighSystemLoad {
            load_average: 2.5,
            threshold: LOAD_THRESHOLD,
        }
        .description();
        assert!(desc.contains("2.50"));
    }
}

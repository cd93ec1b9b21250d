//! Linux PMU access through `perf_event`.
//!
//! Opens one counter per slot: hardware cycles, hardware instructions, and a
//! raw event for each configurable selector in use. Every counter excludes
//! kernel and hypervisor execution, the `perf_event` equivalent of the
//! user-mode execution-level mask.
//!
//! # Permissions
//!
//! Linux perf requires one of:
//! - Root/sudo privileges
//! - `CAP_PERFMON` capability (kernel 5.8+)
//! - `kernel.perf_event_paranoid <= 2` (check with `cat /proc/sys/kernel/perf_event_paranoid`)

use super::counters::CounterError;
use super::events::EventSet;
use super::snapshot::{COUNTERS_COUNT, CYCLES, RETIRED};

/// Bound perf counters for the calling thread.
#[cfg(target_os = "linux")]
pub struct PerfCounters {
    fixed: [::perf_event2::Counter; 2],
    configurable: Vec<(usize, ::perf_event2::Counter)>,
}

#[cfg(target_os = "linux")]
fn open_counter<E>(event: E) -> Result<::perf_event2::Counter, CounterError>
where
    E: ::perf_event2::events::Event + 'static,
{
    let mut counter = ::perf_event2::Builder::new(event)
        .exclude_kernel(true)
        .exclude_hv(true)
        .build()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                CounterError::PermissionDenied
            } else {
                CounterError::ConfigurationFailed(format!("{:?}", e))
            }
        })?;

    counter
        .enable()
        .map_err(|e| CounterError::ConfigurationFailed(format!("Failed to enable: {:?}", e)))?;

    Ok(counter)
}

#[cfg(target_os = "linux")]
impl PerfCounters {
    /// Open the fixed cycle and instruction counters.
    pub fn bind() -> Result<Self, CounterError> {
        use ::perf_event2::events::Hardware;

        let cycles = open_counter(Hardware::CPU_CYCLES)?;
        let retired = open_counter(Hardware::INSTRUCTIONS)?;

        Ok(Self {
            fixed: [cycles, retired],
            configurable: Vec::new(),
        })
    }

    /// Replace the configurable counters with raw events from `events`.
    ///
    /// Slots holding [`NONE`](super::events::NONE) are left closed and read as zero.
    pub fn configure(&mut self, events: &EventSet) -> Result<(), CounterError> {
        use ::perf_event2::events::Raw;

        self.configurable.clear();
        for (slot, event) in events.active() {
            let counter = open_counter(Raw::new(u64::from(event)))?;
            self.configurable.push((slot, counter));
        }
        Ok(())
    }

    /// Read all counters into `out`.
    #[inline]
    pub fn read(&mut self, out: &mut [u64; COUNTERS_COUNT]) -> Result<(), CounterError> {
        let read_err = |e: std::io::Error| CounterError::ReadFailed(format!("{:?}", e));

        out[CYCLES] = self.fixed[0].read().map_err(read_err)?;
        out[RETIRED] = self.fixed[1].read().map_err(read_err)?;
        for value in out[2..].iter_mut() {
            *value = 0;
        }
        for (slot, counter) in self.configurable.iter_mut() {
            out[2 + *slot] = counter.read().map_err(read_err)?;
        }
        Ok(())
    }
}

#[cfg(target_os = "linux")]
impl std::fmt::Debug for PerfCounters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerfCounters")
            .field("configurable", &self.configurable.len())
            .finish()
    }
}

/// Stub for non-Linux platforms; never constructed.
#[cfg(not(target_os = "linux"))]
#[derive(Debug)]
pub struct PerfCounters {
    _private: (),
}

#[cfg(not(target_os = "linux"))]
impl PerfCounters {
    /// perf is only available on Linux.
    pub fn bind() -> Result<Self, CounterError> {
        Err(CounterError::UnsupportedPlatform)
    }

    /// Unreachable without a successful bind.
    pub fn configure(&mut self, _events: &EventSet) -> Result<(), CounterError> {
        Err(CounterError::UnsupportedPlatform)
    }

    /// Unreachable without a successful bind.
    #[inline]
    pub fn read(&mut self, _out: &mut [u64; COUNTERS_COUNT]) -> Result<(), CounterError> {
        Err(CounterError::UnsupportedPlatform)
    }
}

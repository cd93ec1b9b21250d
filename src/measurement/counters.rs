//! The process-wide performance counter handle.
//!
//! [`PerformanceCounters::bind`] is the one-time initialisation: it picks a
//! backend, validates the PMU layout, applies the scheduling policy and
//! programs the default event set. The returned value is the capability that
//! every later snapshot goes through; at most one may exist at a time.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::events::EventSet;
use super::scheduling::Scheduling;
use super::snapshot::{CounterSnapshot, COUNTERS_COUNT, CYCLES};
use super::timer::{wall_ns, Timer};

#[cfg(feature = "kperf")]
use super::kperf::KperfCounters;
#[cfg(feature = "perf")]
use super::perf::PerfCounters;

/// Error type for counter bind, configuration and read failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterError {
    /// No PMU backend exists for this platform.
    UnsupportedPlatform,
    /// The kperf framework could not be loaded.
    FrameworkNotFound,
    /// Permission denied (need sudo or capabilities).
    PermissionDenied,
    /// A `PerformanceCounters` handle already exists in this process.
    AlreadyBound,
    /// The PMU reports a counter layout other than the one expected.
    UnexpectedCardinality {
        /// Which count was wrong ("counter" or "config").
        what: &'static str,
        /// Expected count.
        expected: usize,
        /// Count reported by the hardware.
        found: usize,
    },
    /// Counter configuration failed.
    ConfigurationFailed(String),
    /// Reading the counters failed after a successful bind.
    ReadFailed(String),
    /// A PMU backend was required but none was compiled in.
    NoPmuBackend,
}

impl fmt::Display for CounterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CounterError::UnsupportedPlatform => {
                write!(f, "PMU counters are not supported on this platform")
            }
            CounterError::FrameworkNotFound => write!(f, "kperf framework not found"),
            CounterError::PermissionDenied => write!(
                f,
                "Permission denied - run with sudo, set CAP_PERFMON, or configure perf_event_paranoid"
            ),
            CounterError::AlreadyBound => {
                write!(f, "performance counters are already bound in this process")
            }
            CounterError::UnexpectedCardinality {
                what,
                expected,
                found,
            } => write!(
                f,
                "wrong {} count: expected {}, hardware reports {}",
                what, expected, found
            ),
            CounterError::ConfigurationFailed(msg) => {
                write!(f, "counter configuration failed: {}", msg)
            }
            CounterError::ReadFailed(msg) => write!(f, "counter read failed: {}", msg),
            CounterError::NoPmuBackend => write!(
                f,
                "no PMU backend compiled in; rebuild with --features kperf or --features perf"
            ),
        }
    }
}

impl std::error::Error for CounterError {}

/// Anything that can produce counter snapshots for the averager.
///
/// Implemented by [`PerformanceCounters`] and by synthetic sources in tests.
pub trait CounterSource {
    /// Read every counter plus the wall clock.
    fn snapshot(&mut self) -> CounterSnapshot;

    /// Re-apply the scheduling hint before a measurement window.
    fn reassert_scheduling(&mut self) {}

    /// Take the first read error seen since the last call, if any.
    ///
    /// Snapshots never fail inline so that the measured region stays free of
    /// error handling; callers check here after each measurement.
    fn take_error(&mut self) -> Option<CounterError> {
        None
    }

    /// What the cycle slot counts. Sources without a PMU report the timer.
    fn backend(&self) -> Backend {
        Backend::Timer
    }
}

/// Which counter backend to bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CounterSpec {
    /// Use a PMU backend if one binds, otherwise the platform timer.
    #[default]
    Auto,
    /// Require a PMU backend; fail the bind otherwise.
    Pmu,
    /// Always use the platform timer.
    Standard,
}

/// The backend a [`PerformanceCounters`] ended up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backend {
    /// Apple kperf: real core cycles and eight configurable events.
    Kperf,
    /// Linux perf_event: real core cycles and raw configurable events.
    Perf,
    /// Platform timestamp counter: reference ticks only.
    Timer,
}

impl Backend {
    /// Whether the cycle slot counts core clock cycles.
    pub fn counts_core_cycles(self) -> bool {
        !matches!(self, Backend::Timer)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Kperf => write!(f, "kperf"),
            Backend::Perf => write!(f, "perf_event"),
            Backend::Timer => write!(f, "timer"),
        }
    }
}

enum Inner {
    #[cfg(feature = "kperf")]
    Kperf(KperfCounters),
    #[cfg(feature = "perf")]
    Perf(PerfCounters),
    Timer(Timer),
}

static BOUND: AtomicBool = AtomicBool::new(false);

/// Handle to the hardware counters for the calling thread.
pub struct PerformanceCounters {
    inner: Inner,
    scheduling: Scheduling,
    events: EventSet,
    primed: bool,
    raw: [u64; COUNTERS_COUNT],
    error: Option<CounterError>,
}

impl PerformanceCounters {
    /// Bind the counters with the default event set and scheduling.
    pub fn bind(spec: CounterSpec) -> Result<Self, CounterError> {
        Self::bind_with(spec, Scheduling::default(), EventSet::default())
    }

    /// Bind the counters.
    ///
    /// Fails with [`CounterError::AlreadyBound`] if another handle is alive.
    pub fn bind_with(
        spec: CounterSpec,
        scheduling: Scheduling,
        events: EventSet,
    ) -> Result<Self, CounterError> {
        if BOUND
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CounterError::AlreadyBound);
        }

        scheduling.apply();

        let inner = match select_backend(spec, &events) {
            Ok(inner) => inner,
            Err(e) => {
                BOUND.store(false, Ordering::Release);
                return Err(e);
            }
        };

        let counters = Self {
            inner,
            scheduling,
            events,
            primed: false,
            raw: [0; COUNTERS_COUNT],
            error: None,
        };
        info!("Bound performance counters ({})", counters.backend());
        Ok(counters)
    }

    /// Tick length of the platform timer, when that is the backend.
    pub fn timer_resolution_ns(&self) -> Option<f64> {
        match &self.inner {
            Inner::Timer(t) => Some(t.resolution_ns()),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// Events currently programmed into the configurable slots.
    pub fn events(&self) -> &EventSet {
        &self.events
    }

    /// Scheduling policy applied at bind.
    pub fn scheduling(&self) -> &Scheduling {
        &self.scheduling
    }

    /// Rebind the eight configurable counters.
    ///
    /// The user-mode mask is always applied. The next snapshot is discarded.
    pub fn configure(&mut self, events: EventSet) -> Result<(), CounterError> {
        match &mut self.inner {
            #[cfg(feature = "kperf")]
            Inner::Kperf(k) => k.configure(&events)?,
            #[cfg(feature = "perf")]
            Inner::Perf(p) => p.configure(&events)?,
            Inner::Timer(_) => {
                debug!("Timer backend has no configurable counters; events ignored");
            }
        }
        self.events = events;
        self.primed = false;
        Ok(())
    }

    #[inline]
    fn read(&mut self) -> CounterSnapshot {
        let result = match &mut self.inner {
            #[cfg(feature = "kperf")]
            Inner::Kperf(k) => k.read(&mut self.raw),
            #[cfg(feature = "perf")]
            Inner::Perf(p) => p.read(&mut self.raw),
            Inner::Timer(t) => {
                self.raw[CYCLES] = t.now();
                Ok(())
            }
        };
        let ns = wall_ns();
        if let Err(e) = result {
            self.error.get_or_insert(e);
        }
        CounterSnapshot::from_raw(&self.raw, ns)
    }
}

impl CounterSource for PerformanceCounters {
    #[inline]
    fn snapshot(&mut self) -> CounterSnapshot {
        if !self.primed {
            let _ = self.read();
            self.primed = true;
        }
        self.read()
    }

    #[inline]
    fn reassert_scheduling(&mut self) {
        self.scheduling.reassert();
    }

    fn take_error(&mut self) -> Option<CounterError> {
        self.error.take()
    }

    fn backend(&self) -> Backend {
        match self.inner {
            #[cfg(feature = "kperf")]
            Inner::Kperf(_) => Backend::Kperf,
            #[cfg(feature = "perf")]
            Inner::Perf(_) => Backend::Perf,
            Inner::Timer(_) => Backend::Timer,
        }
    }
}

impl Drop for PerformanceCounters {
    fn drop(&mut self) {
        BOUND.store(false, Ordering::Release);
    }
}

impl fmt::Debug for PerformanceCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerformanceCounters")
            .field("backend", &self.backend())
            .field("events", &self.events)
            .field("primed", &self.primed)
            .finish()
    }
}

fn select_backend(spec: CounterSpec, events: &EventSet) -> Result<Inner, CounterError> {
    match spec {
        CounterSpec::Standard => Ok(timer_backend()),
        CounterSpec::Pmu => bind_pmu(events),
        CounterSpec::Auto => match bind_pmu(events) {
            Ok(inner) => Ok(inner),
            Err(e) => {
                warn!(
                    "PMU counters unavailable ({}); falling back to the platform timer, \
                     cycle columns will be reference ticks",
                    e
                );
                Ok(timer_backend())
            }
        },
    }
}

fn timer_backend() -> Inner {
    let timer = Timer::new();
    debug!(
        "Platform timer: {:.3} ticks/ns, resolution {:.2} ns",
        timer.ticks_per_ns(),
        timer.resolution_ns()
    );
    Inner::Timer(timer)
}

#[allow(unused_mut, unused_variables)]
fn bind_pmu(events: &EventSet) -> Result<Inner, CounterError> {
    let mut last = CounterError::NoPmuBackend;

    #[cfg(feature = "kperf")]
    match KperfCounters::bind().and_then(|mut k| k.configure(events).map(|()| k)) {
        Ok(k) => return Ok(Inner::Kperf(k)),
        Err(e) => last = e,
    }

    #[cfg(feature = "perf")]
    match PerfCounters::bind().and_then(|mut p| p.configure(events).map(|()| p)) {
        Ok(p) => return Ok(Inner::Perf(p)),
        Err(e) => last = e,
    }

    Err(last)
}

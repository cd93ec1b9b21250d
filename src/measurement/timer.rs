//! Platform timestamp counter, used when no PMU backend is available.
//!
//! - x86_64: `lfence; rdtsc` with compiler fences
//! - aarch64: `isb; mrs cntvct_el0`
//! - Fallback: nanoseconds from `std::time::Instant`
//!
//! The timestamp counter ticks at a fixed reference rate, not at core clock,
//! so "cycles" from this source are reference ticks. On Apple Silicon the
//! virtual timer runs at 24 MHz, which is why the PMU backends exist.

use std::sync::atomic::{compiler_fence, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

/// Read the timestamp counter with appropriate serialization.
#[inline]
pub fn rdtsc() -> u64 {
    #[cfg(target_arch = "x86_64")]
    {
        rdtsc_x86_64()
    }

    #[cfg(target_arch = "aarch64")]
    {
        rdtsc_aarch64()
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        wall_ns() as u64
    }
}

#[cfg(target_arch = "x86_64")]
#[inline]
fn rdtsc_x86_64() -> u64 {
    compiler_fence(Ordering::SeqCst);

    let ticks: u64;
    // SAFETY: rdtsc has no memory effects; lfence orders prior loads.
    unsafe {
        std::arch::asm!(
            "lfence",
            "rdtsc",
            "shl rdx, 32",
            "or rax, rdx",
            out("rax") ticks,
            out("rdx") _,
            options(nostack, nomem),
        );
    }

    compiler_fence(Ordering::SeqCst);
    ticks
}

#[cfg(target_arch = "aarch64")]
#[inline]
fn rdtsc_aarch64() -> u64 {
    compiler_fence(Ordering::SeqCst);

    let ticks: u64;
    // SAFETY: reading cntvct_el0 is permitted at EL0 and has no side effects.
    unsafe {
        std::arch::asm!(
            "isb",
            "mrs {}, cntvct_el0",
            out(reg) ticks,
            options(nostack, nomem),
        );
    }

    compiler_fence(Ordering::SeqCst);
    ticks
}

/// Monotonic wall-clock nanoseconds since the first call in this process.
#[inline]
pub fn wall_ns() -> f64 {
    static START: OnceLock<Instant> = OnceLock::new();
    let start = START.get_or_init(Instant::now);
    start.elapsed().as_nanos() as f64
}

/// Calibrate timestamp ticks per nanosecond.
///
/// Spins rather than sleeps so the estimate is not skewed by wake-up latency.
/// Returns the median over a handful of 1 ms windows.
pub fn ticks_per_ns() -> f64 {
    const CALIBRATION_ITERATIONS: usize = 11;
    const WINDOW_NS: f64 = 1_000_000.0;

    let mut ratios = Vec::with_capacity(CALIBRATION_ITERATIONS);

    for _ in 0..CALIBRATION_ITERATIONS {
        let start_ticks = rdtsc();
        let start_ns = wall_ns();
        let mut now_ns = start_ns;
        while now_ns - start_ns < WINDOW_NS {
            std::hint::spin_loop();
            now_ns = wall_ns();
        }
        let ticks = rdtsc().saturating_sub(start_ticks);
        let elapsed = now_ns - start_ns;
        if elapsed > 0.0 && ticks > 0 {
            ratios.push(ticks as f64 / elapsed);
        }
    }

    if ratios.is_empty() {
        return 1.0;
    }

    ratios.sort_by(|a, b| a.total_cmp(b));
    ratios[ratios.len() / 2]
}

/// Calibrated timestamp counter.
#[derive(Debug, Clone)]
pub struct Timer {
    ticks_per_ns: f64,
}

impl Timer {
    /// Create a timer with automatic calibration.
    pub fn new() -> Self {
        Self {
            ticks_per_ns: ticks_per_ns(),
        }
    }

    /// Create a timer with a known tick rate.
    pub fn with_ticks_per_ns(ticks_per_ns: f64) -> Self {
        Self { ticks_per_ns }
    }

    /// Calibrated ticks per nanosecond.
    pub fn ticks_per_ns(&self) -> f64 {
        self.ticks_per_ns
    }

    /// Smallest observable interval in nanoseconds.
    pub fn resolution_ns(&self) -> f64 {
        if self.ticks_per_ns > 0.0 {
            (1.0 / self.ticks_per_ns).max(f64::MIN_POSITIVE)
        } else {
            1.0
        }
    }

    /// Read the counter.
    #[inline]
    pub fn now(&self) -> u64 {
        rdtsc()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

//! Apple Silicon PMU access through the private kperf framework.
//!
//! All ten thread counters are read at once: two fixed (cycles, retired)
//! followed by eight configurable slots. Counting is restricted to user-mode
//! A64 code by OR-ing [`USER_MODE_MASK`](super::events::USER_MODE_MASK) into
//! every config word.
//!
//! # Requirements
//!
//! - macOS on Apple Silicon
//! - **Must run with sudo/root privileges**
//! - Enable with `--features kperf`

use super::counters::CounterError;
use super::events::EventSet;
use super::snapshot::COUNTERS_COUNT;

/// Bound kperf counters for the calling thread.
#[derive(Debug)]
pub struct KperfCounters {
    #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
    kperf: &'static apple_silicon::KperfFunctions,
}

#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
mod apple_silicon {
    use super::*;
    pub(super) use crate::measurement::snapshot::CONFIGURABLE_COUNT;
    use std::sync::OnceLock;

    const KPC_CLASS_FIXED: u32 = 0;
    const KPC_CLASS_CONFIGURABLE: u32 = 1;
    pub(super) const KPC_CLASSES: u32 = (1 << KPC_CLASS_FIXED) | (1 << KPC_CLASS_CONFIGURABLE);

    type KpcForceAllCtrsSet = unsafe extern "C" fn(i32) -> i32;
    type KpcSetCounting = unsafe extern "C" fn(u32) -> i32;
    type KpcSetThreadCounting = unsafe extern "C" fn(u32) -> i32;
    type KpcSetConfig = unsafe extern "C" fn(u32, *const u64) -> i32;
    type KpcGetThreadCounters = unsafe extern "C" fn(u32, u32, *mut u64) -> i32;
    type KpcGetCounterCount = unsafe extern "C" fn(u32) -> u32;
    type KpcGetConfigCount = unsafe extern "C" fn(u32) -> u32;

    pub(super) struct KperfFunctions {
        pub force_all_ctrs_set: KpcForceAllCtrsSet,
        pub set_counting: KpcSetCounting,
        pub set_thread_counting: KpcSetThreadCounting,
        pub set_config: KpcSetConfig,
        pub get_thread_counters: KpcGetThreadCounters,
        pub get_counter_count: KpcGetCounterCount,
        pub get_config_count: KpcGetConfigCount,
    }

    impl std::fmt::Debug for KperfFunctions {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("KperfFunctions")
        }
    }

    static KPERF: OnceLock<Option<KperfFunctions>> = OnceLock::new();

    pub(super) fn load_kperf() -> Result<&'static KperfFunctions, CounterError> {
        let kperf = KPERF.get_or_init(|| unsafe {
            let lib = libc::dlopen(
                b"/System/Library/PrivateFrameworks/kperf.framework/kperf\0".as_ptr()
                    as *const libc::c_char,
                libc::RTLD_NOW,
            );
            if lib.is_null() {
                return None;
            }

            macro_rules! load_fn {
                ($name:expr) => {{
                    let sym = libc::dlsym(lib, concat!($name, "\0").as_ptr() as *const libc::c_char);
                    if sym.is_null() {
                        return None;
                    }
                    std::mem::transmute(sym)
                }};
            }

            Some(KperfFunctions {
                force_all_ctrs_set: load_fn!("kpc_force_all_ctrs_set"),
                set_counting: load_fn!("kpc_set_counting"),
                set_thread_counting: load_fn!("kpc_set_thread_counting"),
                set_config: load_fn!("kpc_set_config"),
                get_thread_counters: load_fn!("kpc_get_thread_counters"),
                get_counter_count: load_fn!("kpc_get_counter_count"),
                get_config_count: load_fn!("kpc_get_config_count"),
            })
        });

        kperf.as_ref().ok_or(CounterError::FrameworkNotFound)
    }
}

#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
impl KperfCounters {
    /// Load the framework and check that the PMU exposes the expected layout.
    ///
    /// Does not program any events; call [`configure`](Self::configure) next.
    pub fn bind() -> Result<Self, CounterError> {
        let kperf = apple_silicon::load_kperf()?;

        // SAFETY: plain queries on a loaded framework.
        let (counters, configs) = unsafe {
            (
                (kperf.get_counter_count)(apple_silicon::KPC_CLASSES),
                (kperf.get_config_count)(apple_silicon::KPC_CLASSES),
            )
        };
        if counters as usize != COUNTERS_COUNT {
            return Err(CounterError::UnexpectedCardinality {
                what: "counter",
                expected: COUNTERS_COUNT,
                found: counters as usize,
            });
        }
        if configs as usize != apple_silicon::CONFIGURABLE_COUNT {
            return Err(CounterError::UnexpectedCardinality {
                what: "config",
                expected: apple_silicon::CONFIGURABLE_COUNT,
                found: configs as usize,
            });
        }

        Ok(Self { kperf })
    }

    /// Program the eight configurable counters and start thread counting.
    pub fn configure(&mut self, events: &EventSet) -> Result<(), CounterError> {
        let words = events.config_words();
        let classes = apple_silicon::KPC_CLASSES;

        // SAFETY: `words` holds exactly the config count validated at bind.
        unsafe {
            if (self.kperf.set_config)(classes, words.as_ptr()) != 0 {
                return Err(CounterError::ConfigurationFailed(
                    "kpc_set_config failed".into(),
                ));
            }
            if (self.kperf.force_all_ctrs_set)(1) != 0 {
                return Err(CounterError::PermissionDenied);
            }
            if (self.kperf.set_counting)(classes) != 0 {
                return Err(CounterError::ConfigurationFailed(
                    "kpc_set_counting failed".into(),
                ));
            }
            if (self.kperf.set_thread_counting)(classes) != 0 {
                return Err(CounterError::ConfigurationFailed(
                    "kpc_set_thread_counting failed".into(),
                ));
            }
        }
        Ok(())
    }

    /// Read all ten thread counters.
    #[inline]
    pub fn read(&mut self, out: &mut [u64; COUNTERS_COUNT]) -> Result<(), CounterError> {
        // SAFETY: `out` has room for the validated counter count.
        let rc = unsafe {
            (self.kperf.get_thread_counters)(0, COUNTERS_COUNT as u32, out.as_mut_ptr())
        };
        if rc != 0 {
            return Err(CounterError::ReadFailed(
                "kpc_get_thread_counters failed, run with sudo?".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(not(all(target_os = "macos", target_arch = "aarch64")))]
impl KperfCounters {
    /// kperf is only available on Apple Silicon.
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

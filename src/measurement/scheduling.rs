//! Keeping the measuring thread on one core at a high scheduling class.
//!
//! On Apple Silicon the QoS class decides between P and E cores, so the
//! hint is `QOS_CLASS_USER_INTERACTIVE` (or `QOS_CLASS_BACKGROUND` to measure
//! the efficiency cluster). Elsewhere the thread is pinned with
//! `core_affinity` and raised with `thread_priority`. Every failure here is a
//! warning: the measurement still runs, only noisier.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Scheduling policy for the measuring thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scheduling {
    /// Core to pin to, if any. Ignored on macOS where QoS picks the cluster.
    pub core: Option<usize>,
    /// Request maximum thread priority at bind time.
    pub max_priority: bool,
    /// Run on the efficiency cluster instead of the performance cluster (macOS only).
    pub efficiency_cores: bool,
}

impl Default for Scheduling {
    fn default() -> Self {
        Self {
            core: Some(0),
            max_priority: true,
            efficiency_cores: false,
        }
    }
}

impl Scheduling {
    /// Leave the thread wherever the OS puts it.
    pub fn unpinned() -> Self {
        Self {
            core: None,
            max_priority: false,
            efficiency_cores: false,
        }
    }

    /// One-time setup at counter bind: pin, raise priority, set QoS.
    pub fn apply(&self) {
        self.reassert();

        if self.max_priority
            && thread_priority::set_current_thread_priority(thread_priority::ThreadPriority::Max)
                .is_err()
        {
            warn!("Couldn't raise measuring thread to maximum priority");
        }
    }

    /// Cheap re-pin before each measurement window.
    #[inline]
    pub fn reassert(&self) {
        #[cfg(target_os = "macos")]
        {
            set_qos_class(self.efficiency_cores);
        }

        #[cfg(not(target_os = "macos"))]
        {
            if let Some(id) = self.core {
                if !core_affinity::set_for_current(core_affinity::CoreId { id }) {
                    debug!("Couldn't pin measuring thread to core {}", id);
                }
            }
        }
    }
}

#[cfg(target_os = "macos")]
fn set_qos_class(efficiency_cores: bool) {
    let class = if efficiency_cores {
        libc::qos_class_t::QOS_CLASS_BACKGROUND
    } else {
        libc::qos_class_t::QOS_CLASS_USER_INTERACTIVE
    };
    // SAFETY: only changes the calling thread's QoS class.
    let rc = unsafe { libc::pthread_set_qos_class_self_np(class, 0) };
    if rc != 0 {
        debug!("pthread_set_qos_class_self_np failed ({})", rc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpinned_is_noop() {
        let policy = Scheduling::unpinned();
        policy.apply();
        policy.reassert();
        assert_eq!(policy.core, None);
    }

    #[test]
    fn test_default_pins_core_zero() {
        let policy = Scheduling::default();
        assert_eq!(policy.core, Some(0));
        // Must not panic even without privileges.
        policy.reassert();
    }
}

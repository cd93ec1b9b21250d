//! Backing storage for traversal graphs.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use super::TopologyError;

/// Arena alignment: one 16 KiB page, the largest base page on the targets.
pub const ARENA_ALIGN: usize = 16 * 1024;

/// A zeroed, page-aligned byte buffer that graphs are built into.
///
/// One arena is sized for the largest region a test sweeps and reused for
/// every depth of that test. A graph borrows it mutably, so two graphs can
/// never share nodes.
pub struct NodeArena {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl NodeArena {
    /// Allocate `bytes` of zeroed memory.
    ///
    /// Aborts through [`alloc::handle_alloc_error`] if the allocator fails.
    pub fn new(bytes: usize) -> Result<Self, TopologyError> {
        if bytes == 0 {
            return Err(TopologyError::EmptyRegion);
        }
        let layout = Layout::from_size_align(bytes, ARENA_ALIGN)
            .map_err(|_| TopologyError::ArenaTooSmall {
                needed: bytes,
                available: isize::MAX as usize,
            })?;

        // SAFETY: layout has non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = match NonNull::new(raw) {
            Some(ptr) => ptr,
            None => alloc::handle_alloc_error(layout),
        };
        Ok(Self { ptr, layout })
    }

    /// Capacity in bytes.
    pub fn len(&self) -> usize {
        self.layout.size()
    }

    /// Always false; zero-sized arenas are rejected at construction.
    pub fn is_empty(&self) -> bool {
        self.layout.size() == 0
    }

    /// Base address.
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Base address for writing.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Check that `bytes` fit, for a graph about to be built.
    pub fn ensure(&self, bytes: usize) -> Result<(), TopologyError> {
        if bytes > self.len() {
            return Err(TopologyError::ArenaTooSmall {
                needed: bytes,
                available: self.len(),
            });
        }
        Ok(())
    }
}

impl Drop for NodeArena {
    fn drop(&mut self) {
        // SAFETY: allocated in `new` with this layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

impl std::fmt::Debug for NodeArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeArena")
            .field("ptr", &self.ptr)
            .field("len", &self.len())
            .finish()
    }
}

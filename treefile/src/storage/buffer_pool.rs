//! Buffer pool for page buffers.
//!
//! The pool bounds how many page buffers may be leased at once and recycles
//! returned buffers so repeated node loads do not allocate.
//!
//! # Design
//!
//! - The buffer size is the page size, which is only known once the file
//!   header has been read, so buffers are allocated lazily up to `capacity`
//! - Returned buffers go on a free list (Vec) for O(1) reuse
//! - Buffers return automatically via RAII (Drop trait on Page)
//! - Exhaustion is reported as `None` and surfaces as an out-of-memory error
//!
//! # Invariants
//!
//! - `leased <= capacity`
//! - Every buffer on the free list is exactly `buffer_size` bytes

use std::sync::{Arc, Mutex};

use crate::storage::page::{DEFAULT_PAGE_SIZE, Page, PageNumber};

/// Default buffer pool capacity in pages.
pub const DEFAULT_POOL_CAPACITY: usize = 4096;

struct PoolState {
    free_list: Vec<Box<[u8]>>,
    leased: usize,
    buffer_size: usize,
}

/// A bounded pool of page buffers.
///
/// # Invariants
/// - `state.leased <= capacity`
pub struct BufferPool {
    state: Mutex<PoolState>,
    capacity: usize,
}

impl BufferPool {
    /// Create a new buffer pool with the given capacity and the default page
    /// size.
    ///
    /// # Panics
    /// Panics if capacity is 0.
    #[must_use]
    pub fn new(capacity: usize) -> Arc<Self> {
        Self::with_buffer_size(capacity, DEFAULT_PAGE_SIZE)
    }

    /// Create a new buffer pool handing out buffers of `buffer_size` bytes.
    ///
    /// # Panics
    /// Panics if capacity is 0.
    #[must_use]
    pub fn with_buffer_size(capacity: usize, buffer_size: usize) -> Arc<Self> {
        assert!(capacity > 0, "Buffer pool capacity must be positive");

        Arc::new(Self {
            state: Mutex::new(PoolState {
                free_list: Vec::new(),
                leased: 0,
                buffer_size,
            }),
            capacity,
        })
    }

    /// Change the size of buffers handed out from now on.
    ///
    /// Free buffers of the old size are discarded. Buffers currently leased
    /// are dropped instead of recycled when they come back.
    #[allow(clippy::expect_used)] // Mutex poisoning indicates unrecoverable state
    pub fn set_buffer_size(&self, buffer_size: usize) {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.buffer_size != buffer_size {
            state.buffer_size = buffer_size;
            state.free_list.clear();
        }
    }

    /// Current buffer size in bytes.
    #[must_use]
    #[allow(clippy::expect_used)] // Mutex poisoning indicates unrecoverable state
    pub fn buffer_size(&self) -> usize {
        self.state.lock().expect("lock poisoned").buffer_size
    }

    /// Lease a zeroed buffer from the pool.
    ///
    /// # Returns
    /// - `Some(Box<[u8]>)` of `buffer_size` zero bytes
    /// - `None` if `capacity` buffers are already leased
    #[allow(clippy::expect_used)] // Mutex poisoning indicates unrecoverable state
    pub fn lease_zeroed(&self) -> Option<Box<[u8]>> {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.leased >= self.capacity {
            return None;
        }
        state.leased += 1;

        let buffer_size = state.buffer_size;
        Some(state.free_list.pop().map_or_else(
            || vec![0u8; buffer_size].into_boxed_slice(),
            |mut buffer| {
                buffer.fill(0);
                buffer
            },
        ))
    }

    /// Lease a zeroed page for `number` from the pool.
    ///
    /// # Returns
    /// - `Some(Page)` if a buffer is available
    /// - `None` if the pool is exhausted
    #[allow(clippy::disallowed_methods)] // Arc::clone is required for shared ownership
    pub fn lease_page(self: &Arc<Self>, number: PageNumber) -> Option<Page> {
        let buffer = self.lease_zeroed()?;
        Some(Page::from_pool(number, buffer, Arc::clone(self)))
    }

    /// Return a buffer to the pool.
    ///
    /// # Panics
    /// Panics if more buffers are returned than were leased (indicates a bug).
    #[allow(clippy::expect_used)] // Mutex poisoning indicates unrecoverable state
    pub fn return_buffer(&self, buffer: Box<[u8]>) {
        let mut state = self.state.lock().expect("lock poisoned");
        assert!(
            state.leased > 0,
            "Buffer pool overflow: returning buffer that was never leased"
        );
        state.leased -= 1;
        if buffer.len() == state.buffer_size {
            state.free_list.push(buffer);
        }
    }

    /// Get the number of buffers that can still be leased.
    #[must_use]
    #[allow(clippy::expect_used)] // Mutex poisoning indicates unrecoverable state
    pub fn available(&self) -> usize {
        self.capacity - self.state.lock().expect("lock poisoned").leased
    }

    /// Get the total capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

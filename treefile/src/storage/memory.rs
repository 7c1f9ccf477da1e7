//! In-memory page store for deterministic testing.
//!
//! The store keeps the whole file image in one contiguous buffer, so an image
//! written here is byte-for-byte what a [`FilePager`] would have produced.
//! Fault injection is driven by a seeded RNG:
//! - Page-level read/write errors
//! - Byte-level corruption (bit flips) on read
//! - Partial writes
//! - Sync failures
//!
//! [`FilePager`]: crate::storage::file::FilePager

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::storage::buffer_pool::BufferPool;
use crate::storage::header::HeaderError;
use crate::storage::io::{PageStore, PagerError};
use crate::storage::page::{
    DEFAULT_PAGE_SIZE, FILE_HEADER_SIZE, MAX_PAGE_SIZE, MIN_PAGE_SIZE, Page, PageNumber,
};

/// Configuration for fault injection.
#[derive(Debug, Clone, Default)]
pub struct FaultConfig {
    /// Probability of a read error (0.0 - 1.0).
    pub read_error_rate: f64,
    /// Probability of a write error (0.0 - 1.0).
    pub write_error_rate: f64,
    /// Probability of a sync error (0.0 - 1.0).
    pub sync_error_rate: f64,
    /// Probability of page corruption on read (0.0 - 1.0).
    pub corruption_rate: f64,
    /// Probability of partial write (0.0 - 1.0).
    pub partial_write_rate: f64,
}

impl FaultConfig {
    /// A fault config with no faults.
    #[must_use]
    pub fn no_faults() -> Self {
        Self::default()
    }

    /// A fault config where every write fails.
    #[must_use]
    pub fn failing_writes() -> Self {
        Self {
            write_error_rate: 1.0,
            ..Self::default()
        }
    }
}

/// Statistics about in-memory store operations.
#[derive(Debug, Default, Clone)]
pub struct MemoryPagerStats {
    /// Number of page reads.
    pub reads: u64,
    /// Number of page writes.
    pub writes: u64,
    /// Number of syncs.
    pub syncs: u64,
    /// Number of pages allocated.
    pub allocations: u64,
    /// Number of injected read errors.
    pub injected_read_errors: u64,
    /// Number of injected write errors.
    pub injected_write_errors: u64,
    /// Number of injected sync errors.
    pub injected_sync_errors: u64,
    /// Number of corrupted pages returned.
    pub corrupted_reads: u64,
    /// Number of partial writes.
    pub partial_writes: u64,
}

/// In-memory page store.
///
/// Not thread-safe; the engine is single-threaded.
pub struct MemoryPager {
    image: Vec<u8>,
    page_size: usize,
    buffer_pool: Arc<BufferPool>,
    fault_config: FaultConfig,
    rng: StdRng,
    stats: MemoryPagerStats,
}

impl MemoryPager {
    /// Create an empty store. The seed makes fault injection reproducible.
    #[must_use]
    pub fn new(buffer_pool: Arc<BufferPool>, seed: u64) -> Self {
        Self::with_config(buffer_pool, seed, FaultConfig::default())
    }

    /// Create an empty store with custom fault configuration.
    #[must_use]
    pub fn with_config(buffer_pool: Arc<BufferPool>, seed: u64, fault_config: FaultConfig) -> Self {
        Self::from_image(Vec::new(), buffer_pool, seed, fault_config)
    }

    /// Create a store over an existing file image.
    #[must_use]
    pub fn from_image(
        image: Vec<u8>,
        buffer_pool: Arc<BufferPool>,
        seed: u64,
        fault_config: FaultConfig,
    ) -> Self {
        buffer_pool.set_buffer_size(DEFAULT_PAGE_SIZE);
        Self {
            image,
            page_size: DEFAULT_PAGE_SIZE,
            buffer_pool,
            fault_config,
            rng: StdRng::seed_from_u64(seed),
            stats: MemoryPagerStats::default(),
        }
    }

    /// The raw file image.
    #[must_use]
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// Consume the store, returning the file image.
    #[must_use]
    pub fn into_image(self) -> Vec<u8> {
        self.image
    }

    /// Get the current statistics.
    #[must_use]
    pub const fn stats(&self) -> &MemoryPagerStats {
        &self.stats
    }

    /// Update the fault configuration.
    pub const fn set_fault_config(&mut self, config: FaultConfig) {
        self.fault_config = config;
    }

    fn should_inject_fault(&mut self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        self.rng.random::<f64>() < rate
    }

    /// Flip 1-8 random bits.
    fn corrupt_page(&mut self, page: &mut Page) {
        let num_flips = self.rng.random_range(1..=8);
        for _ in 0..num_flips {
            let byte_offset = self.rng.random_range(0..page.len());
            let bit = self.rng.random_range(0..8u8);
            page.as_bytes_mut()[byte_offset] ^= 1 << bit;
        }
    }

    const fn page_range(&self, page: PageNumber) -> std::ops::Range<usize> {
        let start = (page as usize - 1) * self.page_size;
        start..start + self.page_size
    }

    fn check_bounds(&self, page: PageNumber) -> Result<(), PagerError> {
        let page_count = self.page_count();
        if page == 0 || page > page_count {
            return Err(PagerError::PageOutOfBounds { page, page_count });
        }
        Ok(())
    }
}

impl PageStore for MemoryPager {
    fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.buffer_pool
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn set_page_size(&mut self, page_size: usize) -> Result<(), PagerError> {
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(PagerError::InvalidPageSize(page_size));
        }
        self.page_size = page_size;
        self.buffer_pool.set_buffer_size(page_size);
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)] // Page counts fit in u32 by format
    fn page_count(&self) -> PageNumber {
        (self.image.len() / self.page_size) as PageNumber
    }

    fn is_empty(&self) -> bool {
        self.image.is_empty()
    }

    fn read_header(&mut self) -> Result<[u8; FILE_HEADER_SIZE], PagerError> {
        let bytes = self
            .image
            .get(..FILE_HEADER_SIZE)
            .ok_or(HeaderError::Truncated(self.image.len()))?;
        let mut header = [0u8; FILE_HEADER_SIZE];
        header.copy_from_slice(bytes);
        Ok(header)
    }

    fn read_page(&mut self, page: PageNumber) -> Result<Page, PagerError> {
        self.stats.reads += 1;
        self.check_bounds(page)?;

        if self.should_inject_fault(self.fault_config.read_error_rate) {
            self.stats.injected_read_errors += 1;
            return Err(PagerError::InjectedFault(
                "simulated read error".to_string(),
            ));
        }

        let mut buffer = self
            .buffer_pool
            .lease_page(page)
            .ok_or(PagerError::BufferPoolExhausted)?;
        let range = self.page_range(page);
        buffer.as_bytes_mut().copy_from_slice(&self.image[range]);

        if self.should_inject_fault(self.fault_config.corruption_rate) {
            self.stats.corrupted_reads += 1;
            self.corrupt_page(&mut buffer);
        }

        Ok(buffer)
    }

    fn write_page(&mut self, page: &Page) -> Result<(), PagerError> {
        self.stats.writes += 1;
        self.check_bounds(page.number())?;

        if self.should_inject_fault(self.fault_config.write_error_rate) {
            self.stats.injected_write_errors += 1;
            return Err(PagerError::InjectedFault(
                "simulated write error".to_string(),
            ));
        }

        // A partial write persists only a prefix of the page.
        let len = if self.should_inject_fault(self.fault_config.partial_write_rate) {
            self.stats.partial_writes += 1;
            self.rng.random_range(0..self.page_size)
        } else {
            self.page_size
        };

        let start = self.page_range(page.number()).start;
        self.image[start..start + len].copy_from_slice(&page.as_bytes()[..len]);
        Ok(())
    }

    fn allocate_page(&mut self) -> Result<PageNumber, PagerError> {
        self.stats.allocations += 1;
        let page = self.page_count() + 1;
        self.image.resize(page as usize * self.page_size, 0);

        trace!(page, "allocated page");
        Ok(page)
    }

    fn sync(&mut self) -> Result<(), PagerError> {
        self.stats.syncs += 1;

        if self.should_inject_fault(self.fault_config.sync_error_rate) {
            self.stats.injected_sync_errors += 1;
            return Err(PagerError::InjectedFault(
                "simulated sync error".to_string(),
            ));
        }

        // Writes land in the image immediately.
        Ok(())
    }
}

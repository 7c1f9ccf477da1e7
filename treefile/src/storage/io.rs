//! Page store abstraction.
//!
//! The B-Tree engine performs all physical I/O through the [`PageStore`]
//! trait, so the same engine runs over a real file ([`FilePager`]) or an
//! in-memory image with fault injection ([`MemoryPager`]).
//!
//! [`FilePager`]: crate::storage::file::FilePager
//! [`MemoryPager`]: crate::storage::memory::MemoryPager

use std::sync::Arc;

use crate::storage::buffer_pool::BufferPool;
use crate::storage::header::HeaderError;
use crate::storage::page::{FILE_HEADER_SIZE, Page, PageNumber};

/// Errors that can occur during page store operations.
#[derive(Debug)]
pub enum PagerError {
    /// I/O error.
    Io(std::io::Error),
    /// Page number is 0 or past the end of the store.
    PageOutOfBounds {
        page: PageNumber,
        page_count: PageNumber,
    },
    /// Buffer pool exhausted - no buffers available.
    BufferPoolExhausted,
    /// The file header failed validation.
    CorruptHeader(HeaderError),
    /// Page size outside the supported range.
    InvalidPageSize(usize),
    /// Injected fault for simulation.
    InjectedFault(String),
}

impl std::fmt::Display for PagerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::PageOutOfBounds { page, page_count } => {
                write!(f, "page {page} out of bounds (page count: {page_count})")
            }
            Self::BufferPoolExhausted => write!(f, "buffer pool exhausted"),
            Self::CorruptHeader(e) => write!(f, "corrupt file header: {e}"),
            Self::InvalidPageSize(size) => write!(f, "invalid page size: {size}"),
            Self::InjectedFault(msg) => write!(f, "injected fault: {msg}"),
        }
    }
}

impl std::error::Error for PagerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::CorruptHeader(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PagerError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<HeaderError> for PagerError {
    fn from(e: HeaderError) -> Self {
        Self::CorruptHeader(e)
    }
}

/// Abstraction over page-numbered storage.
///
/// # Implementation Notes
///
/// Implementations must ensure:
/// - Page numbers are 1-based; page `n` starts at byte `(n - 1) * page_size`
/// - `read_page` returns the last written content for a page
/// - `allocate_page` extends the store by one zeroed page
/// - `sync` makes all previous writes durable
/// - Pages handed out are leased from `buffer_pool`, so exhaustion surfaces
///   as [`PagerError::BufferPoolExhausted`]
pub trait PageStore {
    /// Get a reference to the buffer pool pages are leased from.
    fn buffer_pool(&self) -> &Arc<BufferPool>;

    /// Current page size in bytes.
    fn page_size(&self) -> usize;

    /// Install the page size, normally taken from the file header.
    fn set_page_size(&mut self, page_size: usize) -> Result<(), PagerError>;

    /// Number of whole pages in the store.
    fn page_count(&self) -> PageNumber;

    /// Whether the store holds no bytes at all (a brand new file).
    fn is_empty(&self) -> bool;

    /// Read the raw file header from the start of the store.
    fn read_header(&mut self) -> Result<[u8; FILE_HEADER_SIZE], PagerError>;

    /// Read a page.
    fn read_page(&mut self, page: PageNumber) -> Result<Page, PagerError>;

    /// Write a page back to the slot named by its page number.
    fn write_page(&mut self, page: &Page) -> Result<(), PagerError>;

    /// Append a zeroed page and return its number.
    fn allocate_page(&mut self) -> Result<PageNumber, PagerError>;

    /// Give a page back. Its buffer returns to the pool.
    fn release(&mut self, page: Page) {
        drop(page);
    }

    /// Sync all pending writes to durable storage.
    fn sync(&mut self) -> Result<(), PagerError>;
}

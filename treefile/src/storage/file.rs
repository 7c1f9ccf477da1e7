//! Database file I/O operations.
//!
//! This module reads and writes pages of a database file. Page `n` lives at
//! byte offset `(n - 1) * page_size`; page 1 begins with the file header.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use tracing::trace;

use crate::storage::buffer_pool::BufferPool;
use crate::storage::header::HeaderError;
use crate::storage::io::{PageStore, PagerError};
use crate::storage::page::{
    DEFAULT_PAGE_SIZE, FILE_HEADER_SIZE, MAX_PAGE_SIZE, MIN_PAGE_SIZE, Page, PageNumber,
};

/// A database file handle with page-level I/O.
pub struct FilePager {
    file: File,
    file_len: u64,
    page_size: usize,
    buffer_pool: Arc<BufferPool>,
}

impl FilePager {
    /// Open a database file, creating it empty if it does not exist.
    ///
    /// The page size starts at the default; callers install the real page
    /// size from the file header with [`PageStore::set_page_size`].
    pub fn open(path: &Path, buffer_pool: Arc<BufferPool>) -> Result<Self, PagerError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let file_len = file.metadata()?.len();
        buffer_pool.set_buffer_size(DEFAULT_PAGE_SIZE);

        Ok(Self {
            file,
            file_len,
            page_size: DEFAULT_PAGE_SIZE,
            buffer_pool,
        })
    }

    fn page_offset(&self, page: PageNumber) -> u64 {
        u64::from(page - 1) * self.page_size as u64
    }

    fn check_bounds(&self, page: PageNumber) -> Result<(), PagerError> {
        let page_count = self.page_count();
        if page == 0 || page > page_count {
            return Err(PagerError::PageOutOfBounds { page, page_count });
        }
        Ok(())
    }
}

impl PageStore for FilePager {
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
        (self.file_len / self.page_size as u64) as PageNumber
    }

    fn is_empty(&self) -> bool {
        self.file_len == 0
    }

    #[allow(clippy::cast_possible_truncation)] // Shorter than the header
    fn read_header(&mut self) -> Result<[u8; FILE_HEADER_SIZE], PagerError> {
        if self.file_len < FILE_HEADER_SIZE as u64 {
            return Err(HeaderError::Truncated(self.file_len as usize).into());
        }

        let mut buf = [0u8; FILE_HEADER_SIZE];
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_page(&mut self, page: PageNumber) -> Result<Page, PagerError> {
        self.check_bounds(page)?;

        let mut buffer = self
            .buffer_pool
            .lease_page(page)
            .ok_or(PagerError::BufferPoolExhausted)?;

        let offset = self.page_offset(page);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buffer.as_bytes_mut())?;

        Ok(buffer)
    }

    fn write_page(&mut self, page: &Page) -> Result<(), PagerError> {
        self.check_bounds(page.number())?;

        let offset = self.page_offset(page.number());
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(page.as_bytes())?;

        Ok(())
    }

    fn allocate_page(&mut self) -> Result<PageNumber, PagerError> {
        let page = self.page_count() + 1;
        let new_len = u64::from(page) * self.page_size as u64;

        self.file.set_len(new_len)?;
        self.file_len = new_len;

        trace!(page, "allocated page");
        Ok(page)
    }

    fn sync(&mut self) -> Result<(), PagerError> {
        self.file.sync_all()?;
        Ok(())
    }
}

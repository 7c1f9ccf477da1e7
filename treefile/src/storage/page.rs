//! Page buffers and page-level byte access.
//!
//! Pages are fixed-size buffers identified by a 1-based page number. All
//! multi-byte integers are big-endian, as in the on-disk format.

// Varint groups are masked to seven bits before narrowing.
#![allow(clippy::cast_possible_truncation)]

use std::sync::Arc;

use crate::storage::buffer_pool::BufferPool;

/// A 1-based page number. Page 0 is never a valid page.
pub type PageNumber = u32;

/// Size of the file header stored at the start of page 1.
pub const FILE_HEADER_SIZE: usize = 100;

/// Page size used when creating a new file.
pub const DEFAULT_PAGE_SIZE: usize = 1024;

/// Smallest page size accepted at file creation.
pub const MIN_PAGE_SIZE: usize = 512;

/// Largest page size accepted at file creation.
///
/// Node offsets are stored in two bytes, so the page size itself must fit.
pub const MAX_PAGE_SIZE: usize = 32768;

/// Largest value a varint32 can hold (28 bits).
pub const MAX_VARINT32: u32 = 0x0FFF_FFFF;

/// Size of an encoded varint32.
pub const VARINT32_SIZE: usize = 4;

/// A page buffer.
///
/// Buffers leased from a [`BufferPool`] go back to the pool when the page is
/// dropped.
pub struct Page {
    number: PageNumber,
    data: Box<[u8]>,
    pool: Option<Arc<BufferPool>>,
}

impl Page {
    /// Create a page over a pooled buffer.
    pub(crate) const fn from_pool(
        number: PageNumber,
        data: Box<[u8]>,
        pool: Arc<BufferPool>,
    ) -> Self {
        Self {
            number,
            data,
            pool: Some(pool),
        }
    }

    /// Create a detached, zeroed page that does not belong to any pool.
    #[must_use]
    pub fn detached(number: PageNumber, size: usize) -> Self {
        Self {
            number,
            data: vec![0u8; size].into_boxed_slice(),
            pool: None,
        }
    }

    /// The page number this buffer holds.
    #[must_use]
    pub const fn number(&self) -> PageNumber {
        self.number
    }

    /// Page size in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer is empty (never true for a leased page).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the raw page data.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Get mutable access to the raw page data.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Read bytes at a specific offset.
    #[must_use]
    pub fn read_bytes(&self, offset: usize, len: usize) -> &[u8] {
        &self.data[offset..offset + len]
    }

    /// Write bytes at a specific offset.
    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Move `len` bytes from `src` to `dst` within the page.
    pub fn copy_within(&mut self, src: usize, dst: usize, len: usize) {
        self.data.copy_within(src..src + len, dst);
    }

    #[must_use]
    pub fn read_u8(&self, offset: usize) -> u8 {
        self.data[offset]
    }

    pub fn write_u8(&mut self, offset: usize, value: u8) {
        self.data[offset] = value;
    }

    /// Read a big-endian u16.
    #[must_use]
    pub fn read_u16(&self, offset: usize) -> u16 {
        u16::from_be_bytes([self.data[offset], self.data[offset + 1]])
    }

    /// Write a big-endian u16.
    pub fn write_u16(&mut self, offset: usize, value: u16) {
        self.data[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
    }

    /// Read a big-endian u32.
    #[must_use]
    pub fn read_u32(&self, offset: usize) -> u32 {
        u32::from_be_bytes([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ])
    }

    /// Write a big-endian u32.
    pub fn write_u32(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
    }
}

/// Encode a value as a four-byte varint: three continuation bytes with the
/// high bit set, then a final byte, each carrying seven bits.
#[must_use]
pub const fn encode_varint32(value: u32) -> [u8; VARINT32_SIZE] {
    [
        0x80 | ((value >> 21) & 0x7F) as u8,
        0x80 | ((value >> 14) & 0x7F) as u8,
        0x80 | ((value >> 7) & 0x7F) as u8,
        (value & 0x7F) as u8,
    ]
}

/// Decode a four-byte varint.
#[must_use]
pub fn decode_varint32(bytes: [u8; VARINT32_SIZE]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |acc, byte| (acc << 7) | u32::from(byte & 0x7F))
}

impl Drop for Page {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.return_buffer(std::mem::take(&mut self.data));
        }
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown = self.data.len().min(16);
        f.debug_struct("Page")
            .field("number", &self.number)
            .field("first_bytes", &&self.data[..shown])
            .finish_non_exhaustive()
    }
}

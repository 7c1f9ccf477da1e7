//! File header structure and validation.
//!
//! The file header occupies the first 100 bytes of page 1. Apart from the
//! page size every field is a fixed constant, so validation is a comparison
//! against the expected bytes.

// Page sizes are validated to fit in two bytes before narrowing.
#![allow(clippy::cast_possible_truncation)]

use crate::storage::page::{FILE_HEADER_SIZE, MAX_PAGE_SIZE, MIN_PAGE_SIZE};

/// Magic string identifying a database file.
pub const MAGIC: [u8; 16] = *b"SQLite format 3\0";

/// Page cache size recorded in every header.
pub const PAGE_CACHE_SIZE: u32 = 20_000;

/// Header field offsets.
mod offsets {
    pub const MAGIC: usize = 0x00;
    pub const PAGE_SIZE: usize = 0x10;
    pub const FORMAT: usize = 0x12;
    pub const PAGE_CACHE_SIZE: usize = 0x30;
}

/// Format version and flag bytes at offset 0x12.
const FORMAT_BYTES: [u8; 6] = [0x01, 0x01, 0x00, 0x40, 0x20, 0x20];

/// Four-byte fields that must hold a fixed value, as `(offset, value)`.
/// The file-size word at 0x1C is not checked.
const FIXED_WORDS: [(usize, u32); 10] = [
    (0x18, 0),
    (0x20, 0),
    (0x24, 0),
    (0x28, 0),
    (0x2C, 1),
    (offsets::PAGE_CACHE_SIZE, PAGE_CACHE_SIZE),
    (0x34, 0),
    (0x38, 1),
    (0x3C, 0),
    (0x40, 0),
];

/// The validated contents of a file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Page size in bytes.
    pub page_size: usize,
}

impl FileHeader {
    /// Create a header for a file with the given page size.
    #[must_use]
    pub const fn new(page_size: usize) -> Self {
        Self { page_size }
    }

    /// Serialize the header.
    #[must_use]
    pub fn to_bytes(self) -> [u8; FILE_HEADER_SIZE] {
        let mut buf = [0u8; FILE_HEADER_SIZE];
        buf[offsets::MAGIC..offsets::MAGIC + MAGIC.len()].copy_from_slice(&MAGIC);
        buf[offsets::PAGE_SIZE..offsets::PAGE_SIZE + 2]
            .copy_from_slice(&(self.page_size as u16).to_be_bytes());
        buf[offsets::FORMAT..offsets::FORMAT + FORMAT_BYTES.len()].copy_from_slice(&FORMAT_BYTES);
        for (offset, value) in FIXED_WORDS {
            buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
        }
        buf
    }

    /// Parse and validate a header.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.len() < FILE_HEADER_SIZE {
            return Err(HeaderError::Truncated(bytes.len()));
        }

        let mut magic = [0u8; 16];
        magic.copy_from_slice(&bytes[offsets::MAGIC..offsets::MAGIC + 16]);
        if magic != MAGIC {
            return Err(HeaderError::InvalidMagic(magic));
        }

        if bytes[offsets::FORMAT..offsets::FORMAT + FORMAT_BYTES.len()] != FORMAT_BYTES {
            return Err(HeaderError::InvalidField {
                offset: offsets::FORMAT,
            });
        }

        for (offset, value) in FIXED_WORDS {
            let actual = u32::from_be_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ]);
            if actual != value {
                return Err(HeaderError::InvalidField { offset });
            }
        }

        let page_size = usize::from(u16::from_be_bytes([
            bytes[offsets::PAGE_SIZE],
            bytes[offsets::PAGE_SIZE + 1],
        ]));
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(HeaderError::InvalidPageSize(page_size));
        }

        Ok(Self { page_size })
    }
}

/// Errors that can occur when reading a file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    /// Fewer than 100 bytes were available.
    Truncated(usize),
    /// Invalid magic string.
    InvalidMagic([u8; 16]),
    /// A fixed field holds an unexpected value.
    InvalidField { offset: usize },
    /// Page size outside the supported range.
    InvalidPageSize(usize),
}

impl std::fmt::Display for HeaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Truncated(len) => write!(f, "file header truncated: {len} bytes"),
            Self::InvalidMagic(magic) => {
                write!(f, "invalid magic string: {:?}", String::from_utf8_lossy(magic))
            }
            Self::InvalidField { offset } => {
                write!(f, "invalid header field at offset 0x{offset:02x}")
            }
            Self::InvalidPageSize(size) => write!(f, "invalid page size: {size}"),
        }
    }
}

impl std::error::Error for HeaderError {}

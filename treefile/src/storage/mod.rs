//! Page storage layer.
//!
//! A database is a single file of fixed-size pages numbered from 1:
//!
//! - Page 1: the 100-byte file header followed by the root node of the first
//!   table
//! - Remaining pages: B-tree nodes of any tree stored in the file
//!
//! Page buffers are leased from a bounded [`BufferPool`] and go back to it
//! when the [`Page`] handle is dropped.
//!
//! # Usage
//!
//! ```
//! use treefile::storage::{BufferPool, MemoryPager, PageStore};
//!
//! let mut store = MemoryPager::new(BufferPool::new(8), 0);
//! let page_no = store.allocate_page().unwrap();
//!
//! let mut page = store.read_page(page_no).unwrap();
//! page.write_bytes(0, b"hello");
//! store.write_page(&page).unwrap();
//! store.sync().unwrap();
//! ```

mod buffer_pool;
mod file;
mod header;
mod io;
mod memory;
mod page;

pub use buffer_pool::{BufferPool, DEFAULT_POOL_CAPACITY};
pub use file::FilePager;
pub use header::{FileHeader, HeaderError, MAGIC};
pub use io::{PageStore, PagerError};
pub use memory::{FaultConfig, MemoryPager, MemoryPagerStats};
pub use page::{
    DEFAULT_PAGE_SIZE, FILE_HEADER_SIZE, MAX_PAGE_SIZE, MAX_VARINT32, MIN_PAGE_SIZE, Page,
    PageNumber, VARINT32_SIZE, decode_varint32, encode_varint32,
};

//! B-tree node view over a page.
//!
//! Node header layout (at offset 0, or 100 on page 1):
//! - `kind`: 1 byte
//! - `free_offset`: 2 bytes, first free byte after the cell offset array
//! - `cell_count`: 2 bytes
//! - `cell_area_offset`: 2 bytes, start of the cell content area
//! - reserved: 1 byte
//! - `right_child`: 4 bytes (internal nodes only)
//!
//! The cell offset array follows the header: one 2-byte absolute offset per
//! cell, in key order. Cell bodies grow downward from the end of the page.

// Offsets are bounded by the page size, which fits in two bytes.
#![allow(clippy::cast_possible_truncation)]

use crate::btree::cell::{Cell, INDEX_INTERNAL_CELL_SIZE, Key, TABLE_INTERNAL_CELL_SIZE};
use crate::storage::{FILE_HEADER_SIZE, FileHeader, Page, PageNumber};

/// Node header size of leaf nodes.
pub const LEAF_HEADER_SIZE: usize = 8;
/// Node header size of internal nodes.
pub const INTERNAL_HEADER_SIZE: usize = 12;

mod offsets {
    pub const KIND: usize = 0;
    pub const FREE_OFFSET: usize = 1;
    pub const CELL_COUNT: usize = 3;
    pub const CELL_AREA_OFFSET: usize = 5;
    pub const RIGHT_CHILD: usize = 8;
}

/// Node kind, stored as the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeKind {
    IndexInternal = 0x02,
    TableInternal = 0x05,
    IndexLeaf = 0x0A,
    TableLeaf = 0x0D,
}

impl TryFrom<u8> for NodeKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x02 => Ok(Self::IndexInternal),
            0x05 => Ok(Self::TableInternal),
            0x0A => Ok(Self::IndexLeaf),
            0x0D => Ok(Self::TableLeaf),
            _ => Err(value),
        }
    }
}

impl NodeKind {
    #[must_use]
    pub const fn is_leaf(self) -> bool {
        matches!(self, Self::TableLeaf | Self::IndexLeaf)
    }

    /// Whether the kind belongs to a table tree (as opposed to an index tree).
    #[must_use]
    pub const fn is_table(self) -> bool {
        matches!(self, Self::TableLeaf | Self::TableInternal)
    }

    /// Whether both kinds belong to the same tree family.
    #[must_use]
    pub const fn same_family(self, other: Self) -> bool {
        self.is_table() == other.is_table()
    }

    /// The internal kind of this kind's family.
    #[must_use]
    pub const fn internal(self) -> Self {
        if self.is_table() {
            Self::TableInternal
        } else {
            Self::IndexInternal
        }
    }

    /// The leaf kind of this kind's family.
    #[must_use]
    pub const fn leaf(self) -> Self {
        if self.is_table() {
            Self::TableLeaf
        } else {
            Self::IndexLeaf
        }
    }

    #[must_use]
    pub const fn header_size(self) -> usize {
        if self.is_leaf() {
            LEAF_HEADER_SIZE
        } else {
            INTERNAL_HEADER_SIZE
        }
    }

    /// Size of the separator cell an internal node of this family receives
    /// when one of its children splits.
    #[must_use]
    pub const fn separator_size(self) -> usize {
        if self.is_table() {
            TABLE_INTERNAL_CELL_SIZE
        } else {
            INDEX_INTERNAL_CELL_SIZE
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::IndexInternal => "index internal",
            Self::TableInternal => "table internal",
            Self::IndexLeaf => "index leaf",
            Self::TableLeaf => "table leaf",
        };
        f.write_str(name)
    }
}

/// A page interpreted as a B-tree node.
///
/// The node owns its page; dropping the node returns the page buffer to the
/// pool. Header fields are cached here and written back by
/// [`Node::write_header`].
///
/// # Invariants
/// - `free_offset == header_offset + header_size + 2 * cell_count`
/// - `free_offset <= cell_area_offset <= page.len()`
#[derive(Debug)]
pub struct Node {
    page: Page,
    kind: NodeKind,
    free_offset: usize,
    cell_count: usize,
    cell_area_offset: usize,
    right_child: PageNumber,
}

impl Node {
    /// Parse the node stored in `page`.
    pub fn from_page(page: Page) -> Result<Self, NodeError> {
        let base = header_offset(page.number());
        let number = page.number();
        let corrupt = |reason| NodeError::CorruptHeader {
            page: number,
            reason,
        };

        if page.len() < base + INTERNAL_HEADER_SIZE {
            return Err(corrupt("page too small for a node header"));
        }

        let kind = NodeKind::try_from(page.read_u8(base + offsets::KIND))
            .map_err(NodeError::InvalidKind)?;
        let free_offset = usize::from(page.read_u16(base + offsets::FREE_OFFSET));
        let cell_count = usize::from(page.read_u16(base + offsets::CELL_COUNT));
        let cell_area_offset = usize::from(page.read_u16(base + offsets::CELL_AREA_OFFSET));
        let right_child = if kind.is_leaf() {
            0
        } else {
            page.read_u32(base + offsets::RIGHT_CHILD)
        };

        if free_offset != base + kind.header_size() + 2 * cell_count {
            return Err(corrupt("free offset does not follow the cell offset array"));
        }
        if cell_area_offset > page.len() {
            return Err(corrupt("cell area starts past the end of the page"));
        }
        if cell_area_offset < free_offset {
            return Err(corrupt("cell area overlaps the cell offset array"));
        }

        Ok(Self {
            page,
            kind,
            free_offset,
            cell_count,
            cell_area_offset,
            right_child,
        })
    }

    /// Initialize `page` as an empty node of `kind`.
    ///
    /// Page 1 also receives a fresh file header.
    #[must_use]
    pub fn init(mut page: Page, kind: NodeKind) -> Self {
        if page.number() == 1 {
            let header = FileHeader::new(page.len()).to_bytes();
            page.write_bytes(0, &header);
        }

        let mut node = Self {
            page,
            kind,
            free_offset: 0,
            cell_count: 0,
            cell_area_offset: 0,
            right_child: 0,
        };
        node.reset(kind);
        node
    }

    /// Empty the node and change its kind. The page number is kept.
    pub fn reset(&mut self, kind: NodeKind) {
        let base = header_offset(self.page.number());
        self.page.as_bytes_mut()[base..].fill(0);

        self.kind = kind;
        self.cell_count = 0;
        self.free_offset = base + kind.header_size();
        self.cell_area_offset = self.page.len();
        self.right_child = 0;
        self.write_header();
    }

    /// Write the cached header fields into the page.
    pub fn write_header(&mut self) {
        let base = header_offset(self.page.number());
        self.page.write_u8(base + offsets::KIND, self.kind as u8);
        self.page
            .write_u16(base + offsets::FREE_OFFSET, self.free_offset as u16);
        self.page
            .write_u16(base + offsets::CELL_COUNT, self.cell_count as u16);
        self.page
            .write_u16(base + offsets::CELL_AREA_OFFSET, self.cell_area_offset as u16);
        self.page.write_u8(base + 7, 0);
        if !self.kind.is_leaf() {
            self.page
                .write_u32(base + offsets::RIGHT_CHILD, self.right_child);
        }
    }

    #[must_use]
    pub const fn page(&self) -> &Page {
        &self.page
    }

    #[must_use]
    pub fn into_page(self) -> Page {
        self.page
    }

    #[must_use]
    pub const fn page_number(&self) -> PageNumber {
        self.page.number()
    }

    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        self.kind
    }

    #[must_use]
    pub const fn cell_count(&self) -> usize {
        self.cell_count
    }

    #[must_use]
    pub const fn free_offset(&self) -> usize {
        self.free_offset
    }

    #[must_use]
    pub const fn cell_area_offset(&self) -> usize {
        self.cell_area_offset
    }

    /// Bytes between the cell offset array and the cell content area.
    #[must_use]
    pub const fn free_space(&self) -> usize {
        self.cell_area_offset - self.free_offset
    }

    /// Right-most child of an internal node.
    #[must_use]
    pub const fn right_child(&self) -> Option<PageNumber> {
        if self.kind.is_leaf() {
            None
        } else {
            Some(self.right_child)
        }
    }

    pub const fn set_right_child(&mut self, child: PageNumber) {
        self.right_child = child;
    }

    fn cell_offset(&self, index: usize) -> Result<usize, NodeError> {
        if index >= self.cell_count {
            return Err(NodeError::InvalidCellIndex {
                index,
                count: self.cell_count,
            });
        }

        let slot = self.offset_array_start() + 2 * index;
        let offset = usize::from(self.page.read_u16(slot));
        if offset < self.cell_area_offset || offset >= self.page.len() {
            return Err(NodeError::CorruptCell {
                page: self.page_number(),
                index,
            });
        }
        Ok(offset)
    }

    const fn offset_array_start(&self) -> usize {
        header_offset(self.page.number()) + self.kind.header_size()
    }

    /// Decode the cell at `index`.
    pub fn get_cell(&self, index: usize) -> Result<Cell, NodeError> {
        let offset = self.cell_offset(index)?;
        Cell::decode(self.kind, &self.page.as_bytes()[offset..]).ok_or_else(|| {
            NodeError::CorruptCell {
                page: self.page_number(),
                index,
            }
        })
    }

    /// Decode only the key of the cell at `index`.
    pub fn key_at(&self, index: usize) -> Result<Key, NodeError> {
        let offset = self.cell_offset(index)?;
        Cell::decode_key(self.kind, &self.page.as_bytes()[offset..]).ok_or_else(|| {
            NodeError::CorruptCell {
                page: self.page_number(),
                index,
            }
        })
    }

    /// Decode every cell in key order.
    pub fn cells(&self) -> Result<Vec<Cell>, NodeError> {
        (0..self.cell_count).map(|i| self.get_cell(i)).collect()
    }

    /// Position of the first cell with key `>= key`, and whether that cell's
    /// key equals `key`. Returns `cell_count` when every key is smaller.
    pub fn search(&self, key: Key) -> Result<(usize, bool), NodeError> {
        let (mut lo, mut hi) = (0, self.cell_count);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.key_at(mid)? < key {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        let exact = lo < self.cell_count && self.key_at(lo)? == key;
        Ok((lo, exact))
    }

    /// Child page selected by `index`: the child of cell `index`, or the
    /// right child when `index == cell_count`.
    pub fn child_at(&self, index: usize) -> Result<PageNumber, NodeError> {
        if self.kind.is_leaf() || index > self.cell_count {
            return Err(NodeError::InvalidCellIndex {
                index,
                count: self.cell_count,
            });
        }
        if index == self.cell_count {
            return Ok(self.right_child);
        }

        self.get_cell(index)?
            .child()
            .ok_or_else(|| NodeError::CorruptCell {
                page: self.page_number(),
                index,
            })
    }

    /// Whether the node lacks room for `cell`.
    ///
    /// An internal node is asked about a leaf cell when the cell is on its
    /// way to a descendant; what the node may then receive is a separator, so
    /// the separator size is used.
    #[must_use]
    pub fn is_full(&self, cell: &Cell) -> bool {
        let needed = if cell.kind() == self.kind {
            cell.encoded_size()
        } else {
            self.kind.separator_size()
        };
        self.free_space() < needed + 2
    }

    /// Insert `cell` so it becomes the cell at `index`.
    ///
    /// The node is left unchanged on error.
    pub fn insert_cell(&mut self, index: usize, cell: &Cell) -> Result<(), NodeError> {
        if cell.kind() != self.kind {
            return Err(NodeError::WrongCellKind {
                node: self.kind,
                cell: cell.kind(),
            });
        }
        cell.validate()?;
        if index > self.cell_count {
            return Err(NodeError::InvalidCellIndex {
                index,
                count: self.cell_count,
            });
        }

        let size = cell.encoded_size();
        let available = self.free_space();
        if size + 2 > available {
            return Err(NodeError::Overflow {
                needed: size + 2,
                available,
            });
        }

        let offset = self.cell_area_offset - size;
        cell.encode_into(&mut self.page.as_bytes_mut()[offset..offset + size]);

        let slot = self.offset_array_start() + 2 * index;
        self.page
            .copy_within(slot, slot + 2, 2 * (self.cell_count - index));
        self.page.write_u16(slot, offset as u16);

        self.cell_count += 1;
        self.free_offset += 2;
        self.cell_area_offset = offset;
        Ok(())
    }
}

/// Offset of the node header within page `number`.
#[must_use]
pub const fn header_offset(number: PageNumber) -> usize {
    if number == 1 { FILE_HEADER_SIZE } else { 0 }
}

/// Errors that can occur when interpreting or modifying a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// Unknown node kind byte.
    InvalidKind(u8),
    /// Header fields are inconsistent.
    CorruptHeader {
        page: PageNumber,
        reason: &'static str,
    },
    /// Cell index out of range.
    InvalidCellIndex { index: usize, count: usize },
    /// A cell offset or cell body is malformed.
    CorruptCell { page: PageNumber, index: usize },
    /// Not enough free space for the cell.
    Overflow { needed: usize, available: usize },
    /// The cell belongs in a different kind of node.
    WrongCellKind { node: NodeKind, cell: NodeKind },
    /// A key does not fit its on-page encoding.
    ValueOutOfRange(u32),
}

impl std::fmt::Display for NodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidKind(kind) => write!(f, "invalid node kind: 0x{kind:02x}"),
            Self::CorruptHeader { page, reason } => {
                write!(f, "corrupt node header on page {page}: {reason}")
            }
            Self::InvalidCellIndex { index, count } => {
                write!(f, "cell index {index} out of range (cell count: {count})")
            }
            Self::CorruptCell { page, index } => {
                write!(f, "corrupt cell {index} on page {page}")
            }
            Self::Overflow { needed, available } => {
                write!(f, "node overflow: need {needed} bytes, {available} available")
            }
            Self::WrongCellKind { node, cell } => {
                write!(f, "cannot store a {cell} cell in a {node} node")
            }
            Self::ValueOutOfRange(value) => write!(f, "value {value} does not fit in a varint32"),
        }
    }
}

impl std::error::Error for NodeError {}

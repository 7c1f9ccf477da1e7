//! B-tree cell types and their on-page encoding.
//!
//! Table cells store keys as fixed-width varint32; index cells store plain
//! big-endian u32s behind a constant marker:
//!
//! | Kind | Layout | Size |
//! |---|---|---|
//! | `TableInternal` | child (4) · key varint32 (4) | 8 |
//! | `TableLeaf` | payload size varint32 (4) · key varint32 (4) · payload | 8 + n |
//! | `IndexInternal` | child (4) · marker (4) · index key (4) · primary key (4) | 16 |
//! | `IndexLeaf` | marker (4) · index key (4) · primary key (4) | 12 |

// Payload lengths are bounded by the page size before narrowing.
#![allow(clippy::cast_possible_truncation)]

use crate::btree::node::{NodeError, NodeKind};
use crate::storage::{MAX_VARINT32, PageNumber, decode_varint32, encode_varint32};

/// A B-tree key: a row id in table trees, an index key in index trees.
pub type Key = u32;

/// Constant bytes that precede the keys of every index cell.
pub const INDEX_CELL_MARKER: [u8; 4] = [0x0B, 0x03, 0x04, 0x04];

/// Size of a table internal cell.
pub const TABLE_INTERNAL_CELL_SIZE: usize = 8;
/// Size of a table leaf cell without its payload.
pub const TABLE_LEAF_CELL_HEADER_SIZE: usize = 8;
/// Size of an index internal cell.
pub const INDEX_INTERNAL_CELL_SIZE: usize = 16;
/// Size of an index leaf cell.
pub const INDEX_LEAF_CELL_SIZE: usize = 12;

/// One entry of a B-tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    /// Separator in a table tree. `child` holds keys `<= key`.
    TableInternal { key: Key, child: PageNumber },
    /// Row of a table tree.
    TableLeaf { key: Key, payload: Vec<u8> },
    /// Separator in an index tree. `child` holds keys `<= key`.
    IndexInternal {
        key: Key,
        child: PageNumber,
        primary_key: Key,
    },
    /// Entry of an index tree mapping an index key to a primary key.
    IndexLeaf { key: Key, primary_key: Key },
}

impl Cell {
    /// The node kind this cell belongs in.
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        match self {
            Self::TableInternal { .. } => NodeKind::TableInternal,
            Self::TableLeaf { .. } => NodeKind::TableLeaf,
            Self::IndexInternal { .. } => NodeKind::IndexInternal,
            Self::IndexLeaf { .. } => NodeKind::IndexLeaf,
        }
    }

    #[must_use]
    pub const fn key(&self) -> Key {
        match self {
            Self::TableInternal { key, .. }
            | Self::TableLeaf { key, .. }
            | Self::IndexInternal { key, .. }
            | Self::IndexLeaf { key, .. } => *key,
        }
    }

    /// Child page of a separator cell.
    #[must_use]
    pub const fn child(&self) -> Option<PageNumber> {
        match self {
            Self::TableInternal { child, .. } | Self::IndexInternal { child, .. } => Some(*child),
            Self::TableLeaf { .. } | Self::IndexLeaf { .. } => None,
        }
    }

    /// Number of bytes the cell occupies in the cell content area.
    #[must_use]
    pub const fn encoded_size(&self) -> usize {
        match self {
            Self::TableInternal { .. } => TABLE_INTERNAL_CELL_SIZE,
            Self::TableLeaf { payload, .. } => TABLE_LEAF_CELL_HEADER_SIZE + payload.len(),
            Self::IndexInternal { .. } => INDEX_INTERNAL_CELL_SIZE,
            Self::IndexLeaf { .. } => INDEX_LEAF_CELL_SIZE,
        }
    }

    /// Check that every field fits its on-page encoding.
    pub const fn validate(&self) -> Result<(), NodeError> {
        match self {
            Self::TableInternal { key, .. } | Self::TableLeaf { key, .. }
                if *key > MAX_VARINT32 =>
            {
                Err(NodeError::ValueOutOfRange(*key))
            }
            _ => Ok(()),
        }
    }

    /// Build the separator that points at `child` and carries this cell's
    /// key. Leaf cells are copied up; internal cells move up with their child
    /// replaced.
    #[must_use]
    pub fn into_separator(self, child: PageNumber) -> Self {
        match self {
            Self::TableInternal { key, .. } | Self::TableLeaf { key, .. } => {
                Self::TableInternal { key, child }
            }
            Self::IndexInternal {
                key, primary_key, ..
            }
            | Self::IndexLeaf { key, primary_key } => Self::IndexInternal {
                key,
                child,
                primary_key,
            },
        }
    }

    /// Encode into `buf`, which must be exactly [`Self::encoded_size`] bytes.
    pub fn encode_into(&self, buf: &mut [u8]) {
        match self {
            Self::TableInternal { key, child } => {
                buf[0..4].copy_from_slice(&child.to_be_bytes());
                buf[4..8].copy_from_slice(&encode_varint32(*key));
            }
            Self::TableLeaf { key, payload } => {
                buf[0..4].copy_from_slice(&encode_varint32(payload.len() as u32));
                buf[4..8].copy_from_slice(&encode_varint32(*key));
                buf[8..8 + payload.len()].copy_from_slice(payload);
            }
            Self::IndexInternal {
                key,
                child,
                primary_key,
            } => {
                buf[0..4].copy_from_slice(&child.to_be_bytes());
                buf[4..8].copy_from_slice(&INDEX_CELL_MARKER);
                buf[8..12].copy_from_slice(&key.to_be_bytes());
                buf[12..16].copy_from_slice(&primary_key.to_be_bytes());
            }
            Self::IndexLeaf { key, primary_key } => {
                buf[0..4].copy_from_slice(&INDEX_CELL_MARKER);
                buf[4..8].copy_from_slice(&key.to_be_bytes());
                buf[8..12].copy_from_slice(&primary_key.to_be_bytes());
            }
        }
    }

    /// Decode a cell of `kind` from the start of `bytes`.
    ///
    /// Returns `None` if the cell runs past the end of `bytes` or an index
    /// cell lacks its marker.
    #[must_use]
    pub fn decode(kind: NodeKind, bytes: &[u8]) -> Option<Self> {
        match kind {
            NodeKind::TableInternal => {
                let bytes = bytes.get(..TABLE_INTERNAL_CELL_SIZE)?;
                Some(Self::TableInternal {
                    child: read_u32(bytes, 0),
                    key: decode_varint32(word(bytes, 4)),
                })
            }
            NodeKind::TableLeaf => {
                let header = bytes.get(..TABLE_LEAF_CELL_HEADER_SIZE)?;
                let size = decode_varint32(word(header, 0)) as usize;
                let payload = bytes.get(
                    TABLE_LEAF_CELL_HEADER_SIZE..TABLE_LEAF_CELL_HEADER_SIZE + size,
                )?;
                Some(Self::TableLeaf {
                    key: decode_varint32(word(header, 4)),
                    payload: payload.to_vec(),
                })
            }
            NodeKind::IndexInternal => {
                let bytes = bytes.get(..INDEX_INTERNAL_CELL_SIZE)?;
                if word(bytes, 4) != INDEX_CELL_MARKER {
                    return None;
                }
                Some(Self::IndexInternal {
                    child: read_u32(bytes, 0),
                    key: read_u32(bytes, 8),
                    primary_key: read_u32(bytes, 12),
                })
            }
            NodeKind::IndexLeaf => {
                let bytes = bytes.get(..INDEX_LEAF_CELL_SIZE)?;
                if word(bytes, 0) != INDEX_CELL_MARKER {
                    return None;
                }
                Some(Self::IndexLeaf {
                    key: read_u32(bytes, 4),
                    primary_key: read_u32(bytes, 8),
                })
            }
        }
    }

    /// Decode only the key of a cell of `kind`, skipping any payload copy.
    #[must_use]
    pub fn decode_key(kind: NodeKind, bytes: &[u8]) -> Option<Key> {
        match kind {
            NodeKind::TableInternal | NodeKind::TableLeaf => {
                let bytes = bytes.get(..8)?;
                Some(decode_varint32(word(bytes, 4)))
            }
            NodeKind::IndexInternal => Some(read_u32(bytes.get(..12)?, 8)),
            NodeKind::IndexLeaf => Some(read_u32(bytes.get(..8)?, 4)),
        }
    }
}

fn word(bytes: &[u8], offset: usize) -> [u8; 4] {
    [
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ]
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes(word(bytes, offset))
}

//! Cell identity for the edit buffer.
//!
//! A `CellKey` addresses one cell of a grid by (column, row). The edit
//! buffer's sparse maps are keyed directly by this value type, and the
//! same key round-trips through its `"{col}-{row}"` string form when
//! model state is serialized.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Coordinate of a single grid cell.
///
/// Ordering is reading order (row-major): rows ascend first, then columns.
/// That is the order selections are copied and pasted in. Range
/// computation that needs column-major order uses [`CellKey::cmp_column_major`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellKey {
    /// Column index (0-based)
    pub col: u32,
    /// Row index (0-based)
    pub row: u32,
}

impl CellKey {
    /// Create a new CellKey.
    #[inline]
    pub fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }

    /// Pack into a single integer preserving reading order.
    ///
    /// Row occupies the high half so the natural `u64` order matches
    /// row-major traversal.
    #[inline]
    pub fn packed(self) -> u64 {
        ((self.row as u64) << 32) | self.col as u64
    }

    /// Column-major comparison: column ascending, then row.
    pub fn cmp_column_major(&self, other: &Self) -> Ordering {
        self.col.cmp(&other.col).then(self.row.cmp(&other.row))
    }
}

impl Ord for CellKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.packed().cmp(&other.packed())
    }
}

impl PartialOrd for CellKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.col, self.row)
    }
}

/// Error parsing a `"{col}-{row}"` key string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCellKeyError {
    key: String,
}

impl fmt::Display for ParseCellKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed cell key: {:?}", self.key)
    }
}

impl std::error::Error for ParseCellKeyError {}

impl FromStr for CellKey {
    type Err = ParseCellKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseCellKeyError { key: s.to_string() };
        let (col, row) = s.split_once('-').ok_or_else(err)?;
        let col: u32 = col.parse().map_err(|_| err())?;
        let row: u32 = row.parse().map_err(|_| err())?;
        Ok(CellKey { col, row })
    }
}

impl Serialize for CellKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CellKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeyVisitor;

        impl Visitor<'_> for KeyVisitor {
            type Value = CellKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a \"{col}-{row}\" cell key string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<CellKey, E> {
                v.parse().map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(KeyVisitor)
    }
}

/// Sort keys into reading order (row-major), duplicates kept in place.
pub fn sort_cell_keys(keys: &mut [CellKey]) {
    keys.sort();
}

use serde::{Deserialize, Serialize};

use crate::cell_key::CellKey;

/// A rectangular range of cells, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub col_min: u32,
    pub col_max: u32,
    pub row_min: u32,
    pub row_max: u32,
}

impl Rect {
    /// Create a new rect, automatically normalizing so min <= max.
    pub fn new(c1: u32, r1: u32, c2: u32, r2: u32) -> Self {
        Self {
            col_min: c1.min(c2),
            col_max: c1.max(c2),
            row_min: r1.min(r2),
            row_max: r1.max(r2),
        }
    }

    /// Create a single-cell rect.
    pub fn single(col: u32, row: u32) -> Self {
        Self {
            col_min: col,
            col_max: col,
            row_min: row,
            row_max: row,
        }
    }

    /// Bounding box of a set of keys. None for an empty set.
    pub fn from_keys(keys: &[CellKey]) -> Option<Self> {
        let first = keys.first()?;
        let mut rect = Rect::single(first.col, first.row);
        for key in &keys[1..] {
            rect.col_min = rect.col_min.min(key.col);
            rect.col_max = rect.col_max.max(key.col);
            rect.row_min = rect.row_min.min(key.row);
            rect.row_max = rect.row_max.max(key.row);
        }
        Some(rect)
    }

    /// Check if this rect contains a cell.
    pub fn contains(&self, col: u32, row: u32) -> bool {
        col >= self.col_min && col <= self.col_max && row >= self.row_min && row <= self.row_max
    }

    /// Check if this is a single cell.
    pub fn is_single(&self) -> bool {
        self.col_min == self.col_max && self.row_min == self.row_max
    }

    pub fn width(&self) -> u32 {
        self.col_max - self.col_min + 1
    }

    pub fn height(&self) -> u32 {
        self.row_max - self.row_min + 1
    }

    /// Number of cells in this rect.
    pub fn cell_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    /// Iterate over all cells in this rect in reading order (row-major).
    pub fn cells(&self) -> impl Iterator<Item = CellKey> {
        let (col_min, col_max) = (self.col_min, self.col_max);
        let (row_min, row_max) = (self.row_min, self.row_max);
        (row_min..=row_max).flat_map(move |r| (col_min..=col_max).map(move |c| CellKey::new(c, r)))
    }
}

/// Direction-aware extension of a one-axis span `[start, end]` around a
/// pivot coordinate.
///
/// Moving away from the pivot grows the span by one step; moving back
/// toward it shrinks the far edge instead. The span never crosses the
/// pivot, and the lower bound saturates at zero. Callers clamp the upper
/// bound to the grid extent.
pub fn shifted_bound(pivot: u32, start: u32, end: u32, dir: i8) -> (u32, u32) {
    debug_assert!(start <= end);
    match dir.signum() {
        1 => {
            if start < pivot {
                (start + 1, end)
            } else {
                (start, end + 1)
            }
        }
        -1 => {
            if end > pivot {
                (start, end - 1)
            } else {
                (start.saturating_sub(1), end)
            }
        }
        _ => (start, end),
    }
}

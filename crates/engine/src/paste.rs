//! Paste: parsing clipboard text, validating target geometry, and
//! applying values into the edit buffer.
//!
//! Geometry violations abort the whole paste with a single message on
//! the target cell; nothing is partially applied. Lookup misses are
//! non-fatal: the token lands as literal text with a cell warning.

use std::collections::BTreeSet;
use std::fmt;

use labgrid_core::{CellKey, Rect};

use crate::column::Column;
use crate::config::EditorLimits;
use crate::lookup::{resolve_tokens, LookupIndex, LookupStore};
use crate::model::{EditorModel, GridPatch};
use crate::validate::validate_cell;
use crate::value::{CellMessage, ValueDescriptor};

/// Structural reasons a paste is refused outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasteError {
    /// Multi-cell payload against a multi-cell selection.
    MultipleSelection,
    /// Payload wider than the columns the grid declares.
    ColumnsOutOfBounds,
    /// Payload taller than the configured row ceiling.
    TooManyRows(usize),
}

impl fmt::Display for PasteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasteError::MultipleSelection => {
                f.write_str("Unable to paste. Paste is not supported against multiple selections.")
            }
            PasteError::ColumnsOutOfBounds => f.write_str(
                "Unable to paste. Cannot paste columns beyond the columns found in the grid.",
            ),
            PasteError::TooManyRows(max) => {
                write!(f, "Unable to paste. Cannot paste more than {} rows.", max)
            }
        }
    }
}

impl std::error::Error for PasteError {}

/// Rectangular grid of pasted strings. Jagged input is padded with empty
/// strings to the widest row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PastePayload {
    pub data: Vec<Vec<String>>,
    pub num_cols: usize,
    pub num_rows: usize,
}

impl PastePayload {
    pub fn is_single_cell(&self) -> bool {
        self.num_rows == 1 && self.num_cols == 1
    }

    /// All values in reading order.
    fn flat(&self) -> impl Iterator<Item = &str> {
        self.data.iter().flat_map(|row| row.iter().map(String::as_str))
    }
}

/// A validated (or refused) paste against one model snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PasteModel {
    /// Target rectangle the payload maps onto (after read-only skips).
    pub coordinates: Rect,
    pub payload: PastePayload,
    /// Rows the grid must grow by to fit the paste.
    pub rows_to_add: usize,
    pub success: bool,
    pub message: Option<String>,
}

/// Split clipboard text into a padded rectangle of cell strings.
///
/// One trailing empty row from a terminal newline is dropped; interior
/// blank lines are preserved as empty rows.
pub fn parse_paste_payload(text: &str) -> PastePayload {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut rows: Vec<Vec<String>> = normalized
        .split('\n')
        .map(|line| line.split('\t').map(str::to_string).collect())
        .collect();
    if rows.len() > 1 && rows.last().is_some_and(|r| r.len() == 1 && r[0].is_empty()) {
        rows.pop();
    }
    let num_cols = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
    for row in &mut rows {
        row.resize(num_cols, String::new());
    }
    PastePayload {
        num_rows: rows.len(),
        num_cols,
        data: rows,
    }
}

/// Check pasted text against the current selection and grid bounds.
pub fn validate_paste(
    model: &EditorModel,
    text: &str,
    read_only_rows: &BTreeSet<usize>,
    lock_row_count: bool,
    limits: &EditorLimits,
) -> PasteModel {
    let payload = parse_paste_payload(text);
    let anchor = model.selected().unwrap_or((0, 0));
    let failure = |payload: PastePayload, error: PasteError| PasteModel {
        coordinates: Rect::single(anchor.0, anchor.1),
        payload,
        rows_to_add: 0,
        success: false,
        message: Some(error.to_string()),
    };

    if model.has_multiple_selection() {
        let rect = model.selection_rect().expect("non-empty selection");
        let exact_fit = !model.is_sparse_selection()
            && payload.num_cols == rect.width() as usize
            && payload.num_rows == rect.height() as usize;
        if !payload.is_single_cell() && !exact_fit {
            return failure(payload, PasteError::MultipleSelection);
        }
        return PasteModel {
            coordinates: rect,
            payload,
            rows_to_add: 0,
            success: true,
            message: None,
        };
    }

    if anchor.0 as usize + payload.num_cols > model.columns().len() {
        return failure(payload, PasteError::ColumnsOutOfBounds);
    }
    if payload.num_rows > limits.max_paste_rows {
        return failure(payload, PasteError::TooManyRows(limits.max_paste_rows));
    }

    // Walk forward from the anchor counting the read-only rows the write
    // pointer will have to step over.
    let row_count = model.row_count();
    let mut remaining = payload.num_rows;
    let mut row = anchor.1 as usize;
    while remaining > 0 {
        if row < row_count && read_only_rows.contains(&row) {
            // Skipped, needs one more destination row.
        } else {
            remaining -= 1;
        }
        row += 1;
    }
    let rows_to_add = if lock_row_count {
        0
    } else {
        row.saturating_sub(row_count)
    };

    PasteModel {
        coordinates: Rect::new(
            anchor.0,
            anchor.1,
            anchor.0 + payload.num_cols as u32 - 1,
            row as u32 - 1,
        ),
        payload,
        rows_to_add,
        success: true,
        message: None,
    }
}

/// Apply a validated paste, producing the cell patch for the snapshot the
/// paste was validated against.
///
/// A refused paste yields only its failure message, attached to the
/// original target cell.
pub fn apply_paste(
    model: &EditorModel,
    paste: &PasteModel,
    lookup: &dyn LookupStore,
    read_only_rows: &BTreeSet<usize>,
    lock_row_count: bool,
) -> GridPatch {
    let mut patch = GridPatch::new(model.id());

    if !paste.success {
        let anchor = CellKey::new(paste.coordinates.col_min, paste.coordinates.row_min);
        patch.set_message(
            anchor,
            paste.message.clone().map(CellMessage::new),
        );
        return patch;
    }

    log::debug!(
        "pasting {}x{} at {}-{}",
        paste.payload.num_cols,
        paste.payload.num_rows,
        paste.coordinates.col_min,
        paste.coordinates.row_min
    );

    if model.has_multiple_selection() {
        // Broadcast into the selection, cycling payload values in reading
        // order. An exact-size payload lands value-per-cell.
        let mut targets: Vec<CellKey> = model.selection_cells().to_vec();
        targets.sort();
        let values: Vec<&str> = paste.payload.flat().collect();
        for (idx, key) in targets.iter().enumerate() {
            if read_only_rows.contains(&(key.row as usize)) {
                continue;
            }
            let Some(column) = model.columns().get(key.col as usize) else {
                continue;
            };
            if column.read_only {
                continue;
            }
            write_cell(&mut patch, *key, column, values[idx % values.len()], lookup);
        }
        return patch;
    }

    let row_count = model.row_count();
    let grown_count = row_count + paste.rows_to_add;
    let mut row = paste.coordinates.row_min as usize;
    for payload_row in &paste.payload.data {
        while row < row_count && read_only_rows.contains(&row) {
            row += 1;
        }
        if row >= grown_count {
            // Locked row count: extra source rows are dropped, not grown.
            debug_assert!(lock_row_count);
            break;
        }
        for (offset, text) in payload_row.iter().enumerate() {
            let col = paste.coordinates.col_min + offset as u32;
            let Some(column) = model.columns().get(col as usize) else {
                continue;
            };
            if column.read_only {
                continue;
            }
            write_cell(&mut patch, CellKey::new(col, row as u32), column, text, lookup);
        }
        row += 1;
    }

    if paste.rows_to_add > 0 {
        patch.row_count = Some(grown_count);
    }
    patch
}

fn write_cell(
    patch: &mut GridPatch,
    key: CellKey,
    column: &Column,
    text: &str,
    lookup: &dyn LookupStore,
) {
    if column.kind.is_lookup() {
        // An unfetched index resolves nothing; tokens stay literal with a
        // warning, same as any other miss.
        let empty = LookupIndex::new();
        let index = lookup.descriptors(column).unwrap_or(&empty);
        let resolution = resolve_tokens(index, text);
        if !resolution.unmatched.is_empty() {
            log::debug!(
                "lookup column {} left {} token(s) unresolved",
                column.field_key,
                resolution.unmatched.len()
            );
        }
        patch.set_message(key, resolution.message());
        patch.set_value(key, resolution.descriptors);
        return;
    }

    if text.trim().is_empty() {
        patch.set_value(key, Vec::new());
        patch.set_message(key, None);
        return;
    }

    let validation = validate_cell(&[ValueDescriptor::from_text(text)], column);
    patch.set_message(key, validation.message);
    patch.set_value(key, validation.values);
}

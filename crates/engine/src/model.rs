//! The editor model: the in-memory edit buffer for one grid.
//!
//! Cell values and messages live in sparse maps keyed by [`CellKey`];
//! an absent key is an empty cell. Every mutation is a value-semantic
//! transition (`&self -> EditorModel`) so each operation is atomic with
//! respect to observers and trivially testable: engines produce a
//! [`GridPatch`] against a snapshot and [`EditorModel::apply`] publishes
//! the next snapshot, refusing patches from a superseded model.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use labgrid_core::{CellKey, Rect};

use crate::column::ColumnSet;
use crate::row::{descriptors_from_field, row_field, RowId, RowSet};
use crate::value::{CellMessage, ValueDescriptor};

/// Opaque identifier tying an editor model to one query-model instance.
///
/// Doubles as the generation guard: asynchronous work (lookup-backed
/// paste resolution) stamps its output patch with the id it ran against,
/// and a model with a different id refuses the patch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// How `modify_cell` combines new values with what a cell already holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueOp {
    /// Append to the existing values (multi-value cells).
    Add,
    /// Overwrite the cell.
    Replace,
    /// Remove values matching by raw + display equality.
    Remove,
    /// Clear every cell in the range selection, or just the target cell
    /// when no range selection is active.
    RemoveAll,
}

/// A batch of cell updates produced by one engine run.
///
/// `values` entries with an empty descriptor list clear the cell;
/// `messages` entries of `None` clear the message. `row_count` carries
/// buffer growth from pastes and bulk adds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridPatch {
    pub model_id: Option<ModelId>,
    pub values: Vec<(CellKey, Vec<ValueDescriptor>)>,
    pub messages: Vec<(CellKey, Option<CellMessage>)>,
    pub row_count: Option<usize>,
}

impl GridPatch {
    pub fn new(model_id: &ModelId) -> Self {
        Self {
            model_id: Some(model_id.clone()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.messages.is_empty() && self.row_count.is_none()
    }

    pub fn set_value(&mut self, key: CellKey, values: Vec<ValueDescriptor>) {
        self.values.push((key, values));
    }

    pub fn set_message(&mut self, key: CellKey, message: Option<CellMessage>) {
        self.messages.push((key, message));
    }
}

/// A patch was produced against a model that no longer exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalePatch {
    pub expected: ModelId,
    pub found: Option<ModelId>,
}

impl fmt::Display for StalePatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "patch targets model {:?}, current model is {:?}",
            self.found.as_ref().map(ModelId::as_str),
            self.expected.as_str()
        )
    }
}

impl std::error::Error for StalePatch {}

/// The edit buffer for one grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorModel {
    id: ModelId,
    columns: ColumnSet,
    cell_values: FxHashMap<CellKey, Vec<ValueDescriptor>>,
    cell_messages: FxHashMap<CellKey, CellMessage>,
    row_count: usize,
    selected: Option<(u32, u32)>,
    selection_cells: Vec<CellKey>,
    is_sparse_selection: bool,
    focus: Option<(u32, u32)>,
    focus_value: Option<String>,
    is_pasting: bool,
    num_pasted_rows: usize,
    deleted_ids: HashSet<RowId>,
}

impl EditorModel {
    /// Empty buffer over the given columns.
    pub fn new(id: ModelId, columns: ColumnSet, row_count: usize) -> Self {
        Self {
            id,
            columns,
            cell_values: FxHashMap::default(),
            cell_messages: FxHashMap::default(),
            row_count,
            selected: None,
            selection_cells: Vec::new(),
            is_sparse_selection: false,
            focus: None,
            focus_value: None,
            is_pasting: false,
            num_pasted_rows: 0,
            deleted_ids: HashSet::new(),
        }
    }

    /// Hydrate a buffer from fetched backing rows.
    pub fn from_rows(id: ModelId, columns: ColumnSet, rows: &RowSet) -> Self {
        let mut model = Self::new(id, columns, rows.len());
        for row_idx in 0..rows.len() {
            for (col_idx, column) in model.columns.iter().enumerate() {
                let Some(field) = rows.field_at(row_idx, &column.field_key) else {
                    continue;
                };
                let descriptors = descriptors_from_field(field);
                if !descriptors.is_empty() {
                    model
                        .cell_values
                        .insert(CellKey::new(col_idx as u32, row_idx as u32), descriptors);
                }
            }
        }
        model
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn id(&self) -> &ModelId {
        &self.id
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn selected(&self) -> Option<(u32, u32)> {
        self.selected
    }

    pub fn selection_cells(&self) -> &[CellKey] {
        &self.selection_cells
    }

    pub fn is_sparse_selection(&self) -> bool {
        self.is_sparse_selection
    }

    pub fn focus(&self) -> Option<(u32, u32)> {
        self.focus
    }

    pub fn focus_value(&self) -> Option<&str> {
        self.focus_value.as_deref()
    }

    pub fn is_pasting(&self) -> bool {
        self.is_pasting
    }

    pub fn num_pasted_rows(&self) -> usize {
        self.num_pasted_rows
    }

    pub fn deleted_ids(&self) -> &HashSet<RowId> {
        &self.deleted_ids
    }

    /// Buffered value of a cell, empty slice when untouched.
    pub fn value_at(&self, col: u32, row: u32) -> &[ValueDescriptor] {
        self.cell_values
            .get(&CellKey::new(col, row))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether the cell has a buffered entry at all (distinct from an
    /// untouched cell that falls through to backing data).
    pub fn has_cell(&self, col: u32, row: u32) -> bool {
        self.cell_values.contains_key(&CellKey::new(col, row))
    }

    pub fn message_at(&self, col: u32, row: u32) -> Option<&CellMessage> {
        self.cell_messages.get(&CellKey::new(col, row))
    }

    pub fn buffered_cells(&self) -> impl Iterator<Item = (CellKey, &[ValueDescriptor])> {
        self.cell_values.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    pub fn messages(&self) -> impl Iterator<Item = (CellKey, &CellMessage)> {
        self.cell_messages.iter().map(|(k, m)| (*k, m))
    }

    /// Cell value read through the buffer with backing-row fallback, for
    /// engines that must see server-loaded values the user never touched.
    pub fn descriptors_with_backing(&self, data: &RowSet, col: u32, row: u32) -> Vec<ValueDescriptor> {
        if let Some(values) = self.cell_values.get(&CellKey::new(col, row)) {
            return values.clone();
        }
        let Some(column) = self.columns.get(col as usize) else {
            return Vec::new();
        };
        data.field_at(row as usize, &column.field_key)
            .map(descriptors_from_field)
            .unwrap_or_default()
    }

    pub fn is_selected(&self, col: u32, row: u32) -> bool {
        self.selected == Some((col, row))
    }

    pub fn is_focused(&self, col: u32, row: u32) -> bool {
        self.focus == Some((col, row))
    }

    pub fn in_selection(&self, col: u32, row: u32) -> bool {
        self.selection_cells.contains(&CellKey::new(col, row))
    }

    pub fn has_selection(&self) -> bool {
        !self.selection_cells.is_empty()
    }

    pub fn has_focus(&self) -> bool {
        self.focus.is_some()
    }

    pub fn has_multiple_selection(&self) -> bool {
        self.selection_cells.len() > 1
    }

    /// Bounding rectangle of the current selection. For sparse selections
    /// this is the bounding box, not the membership.
    pub fn selection_rect(&self) -> Option<Rect> {
        Rect::from_keys(&self.selection_cells)
            .or_else(|| self.selected.map(|(c, r)| Rect::single(c, r)))
    }

    /// Walk from (col, row) by repeatedly applying `advance` until
    /// `predicate` holds. Returns None once the walk leaves the grid;
    /// never panics on out-of-bounds steps.
    pub fn find_next_cell<S, P>(
        &self,
        col: u32,
        row: u32,
        mut advance: S,
        predicate: P,
    ) -> Option<(u32, u32)>
    where
        S: FnMut(i64, i64) -> (i64, i64),
        P: Fn(&Self, u32, u32) -> bool,
    {
        let cols = self.columns.len() as i64;
        let rows = self.row_count as i64;
        let (mut c, mut r) = (col as i64, row as i64);
        loop {
            let (nc, nr) = advance(c, r);
            if nc < 0 || nr < 0 || nc >= cols || nr >= rows {
                return None;
            }
            if predicate(self, nc as u32, nr as u32) {
                return Some((nc as u32, nr as u32));
            }
            (c, r) = (nc, nr);
        }
    }

    // =========================================================================
    // Selection transitions
    // =========================================================================

    /// Plain click: one active cell, no range, no focus.
    pub fn select_cell(&self, col: u32, row: u32) -> Self {
        let mut next = self.clone();
        next.selected = Some((col, row));
        next.selection_cells.clear();
        next.is_sparse_selection = false;
        next.focus = None;
        next.focus_value = None;
        next
    }

    /// Select every cell in the grid.
    pub fn select_all(&self) -> Self {
        let mut next = self.clone();
        if self.columns.is_empty() || self.row_count == 0 {
            return next;
        }
        let rect = Rect::new(
            0,
            0,
            self.columns.len() as u32 - 1,
            self.row_count as u32 - 1,
        );
        next.selection_cells = rect.cells().collect();
        next.is_sparse_selection = false;
        next.selected = self.selected.or(Some((0, 0)));
        next.focus = None;
        next.focus_value = None;
        next
    }

    /// Extend to the rectangle spanning the active cell and `target`.
    ///
    /// With a drag anchor (`initial`), the column span stays pinned to the
    /// anchor's columns and the row span only grows past it, matching
    /// fill-handle drag ergonomics.
    pub fn select_area(&self, target: (u32, u32), initial: Option<&Rect>) -> Self {
        let mut next = self.clone();
        let rect = match initial {
            Some(anchor) => Rect {
                col_min: anchor.col_min,
                col_max: anchor.col_max,
                row_min: anchor.row_min.min(target.1),
                row_max: anchor.row_max.max(target.1),
            },
            None => {
                let (ac, ar) = self.selected.unwrap_or(target);
                Rect::new(ac, ar, target.0, target.1)
            }
        };
        next.selection_cells = rect.cells().collect();
        next.is_sparse_selection = false;
        next.selected = self.selected.or(Some(target));
        next.focus = None;
        next.focus_value = None;
        next
    }

    /// Shift-arrow extension: move one rectangle edge by one step,
    /// direction-aware around the active cell.
    pub fn extend_selection(&self, dcol: i8, drow: i8) -> Self {
        let Some((pivot_col, pivot_row)) = self.selected else {
            return self.clone();
        };
        let rect = self
            .selection_rect()
            .unwrap_or_else(|| Rect::single(pivot_col, pivot_row));

        let (col_min, col_max) =
            labgrid_core::shifted_bound(pivot_col, rect.col_min, rect.col_max, dcol);
        let (row_min, row_max) =
            labgrid_core::shifted_bound(pivot_row, rect.row_min, rect.row_max, drow);

        let col_max = col_max.min(self.columns.len().saturating_sub(1) as u32);
        let row_max = row_max.min((self.row_count.saturating_sub(1)) as u32);

        let mut next = self.clone();
        next.selection_cells = Rect {
            col_min,
            col_max,
            row_min,
            row_max,
        }
        .cells()
        .collect();
        next.is_sparse_selection = false;
        next
    }

    /// Ctrl/meta-click: toggle exactly one cell in the selection.
    pub fn toggle_selection_cell(&self, col: u32, row: u32) -> Self {
        let mut next = self.clone();
        let key = CellKey::new(col, row);
        if let Some(pos) = next.selection_cells.iter().position(|k| *k == key) {
            next.selection_cells.remove(pos);
        } else {
            next.selection_cells.push(key);
            next.selection_cells.sort();
        }
        next.selected = Some((col, row));
        next.is_sparse_selection = !cells_form_rect(&next.selection_cells);
        next.focus = None;
        next.focus_value = None;
        next
    }

    /// Checkbox-driven selection of whole (possibly non-adjacent) rows.
    pub fn select_rows_sparse(&self, rows: &BTreeSet<u32>) -> Self {
        let mut next = self.clone();
        next.selection_cells = rows
            .iter()
            .flat_map(|&r| (0..self.columns.len() as u32).map(move |c| CellKey::new(c, r)))
            .collect();
        next.is_sparse_selection = true;
        if let Some(&first) = rows.iter().next() {
            let keep = next
                .selected
                .filter(|&(_, r)| rows.contains(&r));
            next.selected = keep.or(Some((0, first)));
        }
        next.focus = None;
        next.focus_value = None;
        next
    }

    pub fn clear_selection(&self) -> Self {
        let mut next = self.clone();
        next.selected = None;
        next.selection_cells.clear();
        next.is_sparse_selection = false;
        next
    }

    // =========================================================================
    // Focus transitions
    // =========================================================================

    /// Put one cell into direct text-edit mode. Focus and range selection
    /// are exclusive, so any range collapses to the focused cell.
    pub fn focus_cell(&self, col: u32, row: u32) -> Self {
        let mut next = self.clone();
        next.focus = Some((col, row));
        next.focus_value = None;
        next.selected = Some((col, row));
        next.selection_cells.clear();
        next.is_sparse_selection = false;
        next
    }

    /// Update the text buffered in the focused cell's input.
    pub fn set_focus_value(&self, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        if next.focus.is_some() {
            next.focus_value = Some(value.into());
        }
        next
    }

    pub fn clear_focus(&self) -> Self {
        let mut next = self.clone();
        next.focus = None;
        next.focus_value = None;
        next
    }

    // =========================================================================
    // Cell and row mutation
    // =========================================================================

    /// Combine `new_values` into the target cell per `op`. Messages of
    /// replaced or cleared cells are always dropped.
    pub fn modify_cell(
        &self,
        col: u32,
        row: u32,
        new_values: Vec<ValueDescriptor>,
        op: ValueOp,
    ) -> Self {
        let mut next = self.clone();
        let key = CellKey::new(col, row);
        match op {
            ValueOp::Add => {
                next.cell_values.entry(key).or_default().extend(new_values);
                next.cell_messages.remove(&key);
            }
            ValueOp::Replace => {
                if new_values.is_empty() {
                    next.cell_values.remove(&key);
                } else {
                    next.cell_values.insert(key, new_values);
                }
                next.cell_messages.remove(&key);
            }
            ValueOp::Remove => {
                if let Some(existing) = next.cell_values.get_mut(&key) {
                    existing.retain(|v| {
                        !new_values
                            .iter()
                            .any(|n| n.raw == v.raw && n.display == v.display)
                    });
                    if existing.is_empty() {
                        next.cell_values.remove(&key);
                    }
                }
                next.cell_messages.remove(&key);
            }
            ValueOp::RemoveAll => {
                let targets: Vec<CellKey> = if self.selection_cells.is_empty() {
                    vec![key]
                } else {
                    self.selection_cells.clone()
                };
                for target in targets {
                    next.cell_values.remove(&target);
                    next.cell_messages.remove(&target);
                }
            }
        }
        next
    }

    /// Remove the given row indices. Surviving cells shift down by the
    /// number of removed rows below them so the buffer stays contiguous;
    /// selection and focus reset. Ids of removed persisted rows (when
    /// `ordered_ids` covers them) are recorded as deleted.
    pub fn remove_rows(&self, rows: &BTreeSet<usize>, ordered_ids: &[RowId]) -> Self {
        let mut next = self.clone();
        let removed_in_range = rows.iter().filter(|&&r| r < self.row_count).count();
        if removed_in_range == 0 {
            return next;
        }

        let shift = |row: u32| -> Option<u32> {
            let row = row as usize;
            if rows.contains(&row) {
                return None;
            }
            Some((row - rows.range(..row).count()) as u32)
        };

        next.cell_values = self
            .cell_values
            .iter()
            .filter_map(|(key, values)| {
                shift(key.row).map(|row| (CellKey::new(key.col, row), values.clone()))
            })
            .collect();
        next.cell_messages = self
            .cell_messages
            .iter()
            .filter_map(|(key, message)| {
                shift(key.row).map(|row| (CellKey::new(key.col, row), message.clone()))
            })
            .collect();

        for &row in rows {
            if let Some(id) = ordered_ids.get(row) {
                next.deleted_ids.insert(id.clone());
            }
        }

        next.row_count = self.row_count - removed_in_range;
        next.selected = None;
        next.selection_cells.clear();
        next.is_sparse_selection = false;
        next.focus = None;
        next.focus_value = None;
        next
    }

    /// Grow the buffer by `count` rows, optionally replicating shared
    /// per-column values into each new row.
    pub fn add_rows(
        &self,
        count: usize,
        shared: Option<&BTreeMap<u32, Vec<ValueDescriptor>>>,
    ) -> Self {
        let mut next = self.clone();
        if let Some(shared) = shared {
            for offset in 0..count {
                let row = (self.row_count + offset) as u32;
                for (&col, values) in shared {
                    if !values.is_empty() {
                        next.cell_values
                            .insert(CellKey::new(col, row), values.clone());
                    }
                }
            }
        }
        next.row_count += count;
        next
    }

    // =========================================================================
    // Patch application and paste exclusivity
    // =========================================================================

    /// Publish the next snapshot from an engine-produced patch.
    ///
    /// Refuses patches stamped for another model: in-flight async work is
    /// orphaned when the underlying query changes identity, and its late
    /// result must not land here.
    pub fn apply(&self, patch: &GridPatch) -> Result<Self, StalePatch> {
        if let Some(patch_id) = &patch.model_id {
            if *patch_id != self.id {
                return Err(StalePatch {
                    expected: self.id.clone(),
                    found: Some(patch_id.clone()),
                });
            }
        }

        let mut next = self.clone();
        if let Some(row_count) = patch.row_count {
            next.row_count = row_count;
        }
        for (key, values) in &patch.values {
            if values.is_empty() {
                next.cell_values.remove(key);
            } else {
                next.cell_values.insert(*key, values.clone());
            }
        }
        for (key, message) in &patch.messages {
            match message {
                Some(m) => {
                    next.cell_messages.insert(*key, m.clone());
                }
                None => {
                    next.cell_messages.remove(key);
                }
            }
        }

        // A shrinking patch must not leave cells past the new bounds.
        if next.row_count < self.row_count {
            let row_count = next.row_count as u32;
            next.cell_values.retain(|key, _| key.row < row_count);
            next.cell_messages.retain(|key, _| key.row < row_count);
        }
        Ok(next)
    }

    /// Mark a paste as in flight. Returns None when one already is: paste
    /// is exclusive per model, a second resolution may not interleave.
    pub fn begin_paste(&self, num_rows: usize) -> Option<Self> {
        if self.is_pasting {
            return None;
        }
        let mut next = self.clone();
        next.is_pasting = true;
        next.num_pasted_rows = num_rows;
        Some(next)
    }

    pub fn end_paste(&self) -> Self {
        let mut next = self.clone();
        next.is_pasting = false;
        next.num_pasted_rows = 0;
        next
    }

    // Columns are mutated by the bulk engine; it rebuilds cell keys and
    // must stay the single path for structural change.
    pub(crate) fn with_structure(
        &self,
        columns: ColumnSet,
        cell_values: FxHashMap<CellKey, Vec<ValueDescriptor>>,
        cell_messages: FxHashMap<CellKey, CellMessage>,
    ) -> Self {
        let mut next = self.clone();
        next.columns = columns;
        next.cell_values = cell_values;
        next.cell_messages = cell_messages;
        next.selected = None;
        next.selection_cells.clear();
        next.is_sparse_selection = false;
        next.focus = None;
        next.focus_value = None;
        next
    }
}

/// Whether a set of keys enumerates its bounding rectangle exactly.
fn cells_form_rect(cells: &[CellKey]) -> bool {
    match Rect::from_keys(cells) {
        Some(rect) => {
            let unique: HashSet<&CellKey> = cells.iter().collect();
            unique.len() == rect.cell_count()
        }
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{Column, ColumnType};
    use serde_json::json;

    fn columns(n: usize) -> ColumnSet {
        ColumnSet::new(
            (0..n)
                .map(|i| Column::scalar(format!("col{}", i), ColumnType::Text))
                .collect(),
        )
    }

    fn model(cols: usize, rows: usize) -> EditorModel {
        EditorModel::new(ModelId::new("m1"), columns(cols), rows)
    }

    fn text(s: &str) -> Vec<ValueDescriptor> {
        vec![ValueDescriptor::from_text(s)]
    }

    #[test]
    fn test_value_at_empty_when_absent() {
        let m = model(2, 2);
        assert!(m.value_at(0, 0).is_empty());
        assert!(m.message_at(0, 0).is_none());
    }

    #[test]
    fn test_modify_cell_replace_and_clear() {
        let m = model(2, 2).modify_cell(0, 0, text("a"), ValueOp::Replace);
        assert_eq!(m.value_at(0, 0)[0].display, "a");

        let m = m.modify_cell(0, 0, Vec::new(), ValueOp::Replace);
        assert!(!m.has_cell(0, 0));
    }

    #[test]
    fn test_modify_cell_add_appends() {
        let m = model(2, 2)
            .modify_cell(0, 0, text("a"), ValueOp::Replace)
            .modify_cell(0, 0, text("b"), ValueOp::Add);
        let displays: Vec<&str> = m.value_at(0, 0).iter().map(|v| v.display.as_str()).collect();
        assert_eq!(displays, vec!["a", "b"]);
    }

    #[test]
    fn test_modify_cell_remove_matches_raw_and_display() {
        let values = vec![ValueDescriptor::new(1, "A"), ValueDescriptor::new(2, "B")];
        let m = model(2, 2).modify_cell(0, 0, values, ValueOp::Replace);
        let m = m.modify_cell(0, 0, vec![ValueDescriptor::new(1, "A")], ValueOp::Remove);
        assert_eq!(m.value_at(0, 0).len(), 1);
        assert_eq!(m.value_at(0, 0)[0].display, "B");

        // Same display under a different raw id does not match.
        let m = m.modify_cell(0, 0, vec![ValueDescriptor::new(9, "B")], ValueOp::Remove);
        assert_eq!(m.value_at(0, 0).len(), 1);
    }

    #[test]
    fn test_remove_all_clears_selection_range() {
        let m = model(2, 3)
            .modify_cell(0, 0, text("a"), ValueOp::Replace)
            .modify_cell(0, 1, text("b"), ValueOp::Replace)
            .modify_cell(1, 2, text("c"), ValueOp::Replace)
            .select_cell(0, 0)
            .select_area((1, 1), None);
        let m = m.modify_cell(0, 0, Vec::new(), ValueOp::RemoveAll);
        assert!(!m.has_cell(0, 0));
        assert!(!m.has_cell(0, 1));
        // Outside the selection rectangle, untouched.
        assert!(m.has_cell(1, 2));
    }

    #[test]
    fn test_remove_rows_shifts_survivors() {
        let m = model(1, 3)
            .modify_cell(0, 0, text("r0"), ValueOp::Replace)
            .modify_cell(0, 1, text("r1"), ValueOp::Replace)
            .modify_cell(0, 2, text("r2"), ValueOp::Replace);
        let m = m.remove_rows(&BTreeSet::from([1]), &[]);

        assert_eq!(m.row_count(), 2);
        assert_eq!(m.value_at(0, 0)[0].display, "r0");
        assert_eq!(m.value_at(0, 1)[0].display, "r2");
        assert!(!m.has_cell(0, 2));
    }

    #[test]
    fn test_remove_rows_records_deleted_ids() {
        let ids = vec![RowId::from(10), RowId::from(11), RowId::from(12)];
        let m = model(1, 3).remove_rows(&BTreeSet::from([0, 2]), &ids);
        assert_eq!(m.row_count(), 1);
        assert!(m.deleted_ids().contains(&RowId::from(10)));
        assert!(m.deleted_ids().contains(&RowId::from(12)));
        assert!(!m.deleted_ids().contains(&RowId::from(11)));
    }

    #[test]
    fn test_remove_rows_resets_selection() {
        let m = model(2, 3).select_cell(1, 1).remove_rows(&BTreeSet::from([0]), &[]);
        assert!(m.selected().is_none());
        assert!(!m.has_selection());
    }

    #[test]
    fn test_add_rows_with_shared_values() {
        let shared = BTreeMap::from([(0, text("QC")), (1, text("Pending"))]);
        let m = model(2, 1).add_rows(2, Some(&shared));
        assert_eq!(m.row_count(), 3);
        assert_eq!(m.value_at(0, 1)[0].display, "QC");
        assert_eq!(m.value_at(1, 2)[0].display, "Pending");
        assert!(!m.has_cell(0, 0));
    }

    #[test]
    fn test_select_area_spans_active_cell() {
        let m = model(3, 3).select_cell(0, 0).select_area((2, 1), None);
        assert!(m.in_selection(0, 0));
        assert!(m.in_selection(2, 1));
        assert!(m.in_selection(1, 0));
        assert_eq!(m.selection_cells().len(), 6);
        assert!(m.has_multiple_selection());
    }

    #[test]
    fn test_select_area_with_anchor_pins_columns() {
        let anchor = Rect::new(1, 0, 1, 0);
        let m = model(3, 5).select_cell(1, 0).select_area((0, 3), Some(&anchor));
        // Column span pinned to the anchor's column, rows grown to target.
        let rect = m.selection_rect().unwrap();
        assert_eq!((rect.col_min, rect.col_max), (1, 1));
        assert_eq!((rect.row_min, rect.row_max), (0, 3));
    }

    #[test]
    fn test_select_area_with_anchor_never_shrinks_rows() {
        let anchor = Rect::new(0, 1, 0, 2);
        let m = model(2, 5).select_cell(0, 1).select_area((0, 1), Some(&anchor));
        let rect = m.selection_rect().unwrap();
        assert_eq!((rect.row_min, rect.row_max), (1, 2));
    }

    #[test]
    fn test_extend_selection_direction_aware() {
        let m = model(3, 5).select_cell(1, 2).extend_selection(0, 1);
        let rect = m.selection_rect().unwrap();
        assert_eq!((rect.row_min, rect.row_max), (2, 3));

        // Reversing shrinks back toward the pivot instead of growing up.
        let m = m.extend_selection(0, -1);
        let rect = m.selection_rect().unwrap();
        assert_eq!((rect.row_min, rect.row_max), (2, 2));

        let m = m.extend_selection(0, -1);
        let rect = m.selection_rect().unwrap();
        assert_eq!((rect.row_min, rect.row_max), (1, 2));
    }

    #[test]
    fn test_extend_selection_clamps_to_grid() {
        let m = model(2, 2).select_cell(1, 1).extend_selection(1, 1);
        let rect = m.selection_rect().unwrap();
        assert_eq!((rect.col_max, rect.row_max), (1, 1));
    }

    #[test]
    fn test_select_all() {
        let m = model(2, 3).select_all();
        assert_eq!(m.selection_cells().len(), 6);
        assert_eq!(m.selected(), Some((0, 0)));
    }

    #[test]
    fn test_toggle_selection_cell_sparse_flag() {
        let m = model(3, 3)
            .toggle_selection_cell(0, 0)
            .toggle_selection_cell(2, 2);
        assert!(m.is_sparse_selection());
        let m = m.toggle_selection_cell(2, 2);
        assert!(!m.is_sparse_selection());
        assert_eq!(m.selection_cells().len(), 1);
    }

    #[test]
    fn test_sparse_row_selection() {
        let m = model(2, 5).select_rows_sparse(&BTreeSet::from([0, 3]));
        assert!(m.is_sparse_selection());
        assert!(m.in_selection(0, 0));
        assert!(m.in_selection(1, 3));
        assert!(!m.in_selection(0, 1));
    }

    #[test]
    fn test_focus_collapses_selection() {
        let m = model(3, 3).select_cell(0, 0).select_area((2, 2), None);
        let m = m.focus_cell(1, 1).set_focus_value("draft");
        assert!(m.has_focus());
        assert!(!m.has_selection());
        assert_eq!(m.focus_value(), Some("draft"));
        assert!(m.is_selected(1, 1));

        let m = m.clear_focus();
        assert!(!m.has_focus());
        assert!(m.focus_value().is_none());
    }

    #[test]
    fn test_find_next_cell_jumps_to_filled() {
        let m = model(1, 5)
            .modify_cell(0, 3, text("x"), ValueOp::Replace);
        let hit = m.find_next_cell(0, 0, |c, r| (c, r + 1), |m, c, r| m.has_cell(c, r));
        assert_eq!(hit, Some((0, 3)));
    }

    #[test]
    fn test_find_next_cell_stops_at_bounds() {
        let m = model(1, 3);
        let hit = m.find_next_cell(0, 0, |c, r| (c, r + 1), |m, c, r| m.has_cell(c, r));
        assert_eq!(hit, None);
        let hit = m.find_next_cell(0, 0, |c, r| (c, r - 1), |_, _, _| true);
        assert_eq!(hit, None);
    }

    #[test]
    fn test_apply_patch_and_stale_rejection() {
        let m = model(2, 2);
        let mut patch = GridPatch::new(m.id());
        patch.set_value(CellKey::new(0, 0), text("v"));
        patch.set_message(CellKey::new(0, 0), Some(CellMessage::new("warn")));
        let m2 = m.apply(&patch).unwrap();
        assert_eq!(m2.value_at(0, 0)[0].display, "v");
        assert_eq!(m2.message_at(0, 0).unwrap().message, "warn");

        let stale = GridPatch::new(&ModelId::new("old"));
        assert!(m2.apply(&stale).is_err());
    }

    #[test]
    fn test_apply_patch_clears_with_empty_values() {
        let m = model(2, 2).modify_cell(0, 0, text("x"), ValueOp::Replace);
        let mut patch = GridPatch::new(m.id());
        patch.set_value(CellKey::new(0, 0), Vec::new());
        patch.set_message(CellKey::new(0, 0), None);
        let m2 = m.apply(&patch).unwrap();
        assert!(!m2.has_cell(0, 0));
    }

    #[test]
    fn test_paste_exclusivity() {
        let m = model(1, 1);
        let pasting = m.begin_paste(4).unwrap();
        assert!(pasting.is_pasting());
        assert_eq!(pasting.num_pasted_rows(), 4);
        assert!(pasting.begin_paste(1).is_none());
        let done = pasting.end_paste();
        assert!(!done.is_pasting());
    }

    #[test]
    fn test_hydration_from_rows() {
        let mut rows = RowSet::new();
        rows.insert(
            RowId::from(1),
            crate::row::Row::from([
                ("col0".to_string(), json!("alpha")),
                ("col1".to_string(), json!({"value": 3, "displayValue": "Kidney"})),
            ]),
        );
        let m = EditorModel::from_rows(ModelId::new("q"), columns(2), &rows);
        assert_eq!(m.row_count(), 1);
        assert_eq!(m.value_at(0, 0)[0].display, "alpha");
        assert_eq!(m.value_at(1, 0)[0].raw, json!(3));
    }

    #[test]
    fn test_descriptors_with_backing_prefers_buffer() {
        let mut rows = RowSet::new();
        rows.insert(
            RowId::from(1),
            crate::row::Row::from([("col0".to_string(), json!("server"))]),
        );
        let m = EditorModel::new(ModelId::new("q"), columns(1), 1);
        assert_eq!(m.descriptors_with_backing(&rows, 0, 0)[0].display, "server");

        let m = m.modify_cell(0, 0, text("edited"), ValueOp::Replace);
        assert_eq!(m.descriptors_with_backing(&rows, 0, 0)[0].display, "edited");
    }

    #[test]
    fn test_model_serde_round_trip() {
        let m = model(2, 2)
            .modify_cell(1, 0, text("x"), ValueOp::Replace)
            .select_cell(1, 0);
        let json = serde_json::to_string(&m).unwrap();
        let back: EditorModel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}

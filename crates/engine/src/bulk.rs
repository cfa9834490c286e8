//! Bulk mutation: applying one form-submitted value set across many
//! rows, and structural column changes over the buffered grid.
//!
//! Column mutations re-key every affected cell because the coordinate is
//! baked into the key itself. A mutation naming an unknown field key
//! returns `None` — distinct from a successful mutation that happened to
//! change nothing — so callers can tell failure from a true no-op.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;

use labgrid_core::CellKey;

use crate::column::{Column, ColumnKind, ColumnSet};
use crate::lookup::{resolve_tokens, LookupIndex, LookupStore};
use crate::model::{EditorModel, GridPatch};
use crate::row::Row;
use crate::validate::validate_cell;
use crate::value::{json_display, CellMessage, ValueDescriptor};

/// Per-column cell content prepared from one submitted form row.
#[derive(Debug, Default)]
struct SharedValues {
    values: BTreeMap<u32, Vec<ValueDescriptor>>,
    messages: BTreeMap<u32, CellMessage>,
}

fn prepare_shared(columns: &ColumnSet, shared: &Row, lookup: &dyn LookupStore) -> SharedValues {
    let mut prepared = SharedValues::default();
    for (field_key, value) in shared {
        let Some(col_idx) = columns.index_of(field_key) else {
            continue;
        };
        let column = columns.get(col_idx).expect("indexed column");
        if column.read_only {
            continue;
        }
        let text = json_display(value);

        if column.kind.is_lookup() {
            let empty = LookupIndex::new();
            let index = lookup.descriptors(column).unwrap_or(&empty);
            let resolution = resolve_tokens(index, &text);
            if let Some(message) = resolution.message() {
                prepared.messages.insert(col_idx as u32, message);
            }
            prepared.values.insert(col_idx as u32, resolution.descriptors);
            continue;
        }

        if text.trim().is_empty() {
            continue;
        }
        let validation = validate_cell(&[ValueDescriptor::from_text(&text)], column);
        if let Some(message) = validation.message {
            prepared.messages.insert(col_idx as u32, message);
        }
        prepared.values.insert(col_idx as u32, validation.values);
    }
    prepared
}

/// Append `count` rows, replicating the shared form values into each.
pub fn bulk_add_rows(
    model: &EditorModel,
    shared: &Row,
    count: usize,
    lookup: &dyn LookupStore,
) -> GridPatch {
    let prepared = prepare_shared(model.columns(), shared, lookup);
    let mut patch = GridPatch::new(model.id());
    patch.row_count = Some(model.row_count() + count);
    for offset in 0..count {
        let row = (model.row_count() + offset) as u32;
        for (&col, values) in &prepared.values {
            let key = CellKey::new(col, row);
            patch.set_value(key, values.clone());
            patch.set_message(key, prepared.messages.get(&col).cloned());
        }
    }
    log::debug!("bulk add: {} row(s), {} column(s)", count, prepared.values.len());
    patch
}

/// Overwrite the specified columns of the targeted rows with the shared
/// form values. Unspecified columns and non-targeted rows are untouched;
/// prior messages on overwritten cells are cleared.
pub fn bulk_update_rows(
    model: &EditorModel,
    target_rows: &BTreeSet<usize>,
    shared: &Row,
    lookup: &dyn LookupStore,
) -> GridPatch {
    let prepared = prepare_shared(model.columns(), shared, lookup);
    let mut patch = GridPatch::new(model.id());
    for &row in target_rows {
        if row >= model.row_count() {
            continue;
        }
        for (&col, values) in &prepared.values {
            let key = CellKey::new(col, row as u32);
            patch.set_value(key, values.clone());
            patch.set_message(key, prepared.messages.get(&col).cloned());
        }
    }
    log::debug!(
        "bulk update: {} row(s), {} column(s)",
        target_rows.len(),
        prepared.values.len()
    );
    patch
}

type CellValues = FxHashMap<CellKey, Vec<ValueDescriptor>>;
type CellMessages = FxHashMap<CellKey, CellMessage>;

fn rekeyed<V: Clone>(
    entries: impl Iterator<Item = (CellKey, V)>,
    mut shift: impl FnMut(u32) -> Option<u32>,
) -> FxHashMap<CellKey, V> {
    entries
        .filter_map(|(key, value)| shift(key.col).map(|col| (CellKey::new(col, key.row), value)))
        .collect()
}

/// Insert columns after `insert_after` (or at the front when None).
/// Cells of later columns shift right; rows are unaffected. Returns None
/// when `insert_after` names no current column.
pub fn add_columns(
    model: &EditorModel,
    insert_after: Option<&str>,
    new_columns: Vec<Column>,
) -> Option<EditorModel> {
    let at = match insert_after {
        Some(field_key) => model.columns().index_of(field_key)? + 1,
        None => 0,
    };
    let count = new_columns.len() as u32;
    let columns = model.columns().inserting(at, new_columns);
    let at = at as u32;
    let shift = |col: u32| Some(if col >= at { col + count } else { col });

    let values: CellValues = rekeyed(
        model.buffered_cells().map(|(k, v)| (k, v.to_vec())),
        shift,
    );
    let messages: CellMessages =
        rekeyed(model.messages().map(|(k, m)| (k, m.clone())), shift);
    Some(model.with_structure(columns, values, messages))
}

/// Remove a column, discarding its cells and messages; later columns
/// shift left. Returns None when the field key is unknown.
pub fn remove_column(model: &EditorModel, field_key: &str) -> Option<EditorModel> {
    let at = model.columns().index_of(field_key)? as u32;
    let columns = model.columns().removing(at as usize);
    let shift = |col: u32| match col {
        c if c == at => None,
        c if c > at => Some(c - 1),
        c => Some(c),
    };

    let values: CellValues = rekeyed(
        model.buffered_cells().map(|(k, v)| (k, v.to_vec())),
        shift,
    );
    let messages: CellMessages =
        rekeyed(model.messages().map(|(k, m)| (k, m.clone())), shift);
    Some(model.with_structure(columns, values, messages))
}

/// Retype a column in place, re-validating its buffered cells against
/// the new definition. Values that no longer validate are discarded, as
/// is everything in the column when its lookup identity changed. Returns
/// None when the field key is unknown.
pub fn change_column(
    model: &EditorModel,
    field_key: &str,
    new_column: Column,
) -> Option<EditorModel> {
    let at = model.columns().index_of(field_key)?;
    let old_column = model.columns().get(at).expect("indexed column").clone();
    let columns = model.columns().replacing(at, new_column.clone());
    let at = at as u32;

    let identity_changed = match (&old_column.kind, &new_column.kind) {
        (
            ColumnKind::Lookup { table: old, .. },
            ColumnKind::Lookup { table: new, .. },
        ) => old != new,
        (ColumnKind::Lookup { .. }, _) | (_, ColumnKind::Lookup { .. }) => true,
        _ => false,
    };

    let mut values: CellValues = FxHashMap::default();
    let mut messages: CellMessages = FxHashMap::default();
    for (key, cell_values) in model.buffered_cells() {
        if key.col != at {
            values.insert(key, cell_values.to_vec());
            continue;
        }
        if identity_changed {
            continue;
        }
        let validation = validate_cell(cell_values, &new_column);
        if validation.message.is_some() {
            // No longer representable under the new type.
            continue;
        }
        values.insert(key, validation.values);
    }
    for (key, message) in model.messages() {
        if key.col == at {
            continue;
        }
        messages.insert(key, message.clone());
    }
    Some(model.with_structure(columns, values, messages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnType;
    use crate::lookup::InMemoryLookupStore;
    use crate::model::{ModelId, ValueOp};
    use serde_json::json;

    fn columns() -> ColumnSet {
        ColumnSet::new(vec![
            Column::scalar("Name", ColumnType::Text),
            Column::scalar("Count", ColumnType::Int),
            Column::lookup("Organ", "Organs", false),
        ])
    }

    fn store() -> InMemoryLookupStore {
        let mut store = InMemoryLookupStore::new();
        store.set_table(
            "Organs",
            LookupIndex::from_descriptors(vec![
                ValueDescriptor::new(1, "Kidney"),
                ValueDescriptor::new(2, "Liver"),
            ]),
        );
        store
    }

    fn model(rows: usize) -> EditorModel {
        EditorModel::new(ModelId::new("m"), columns(), rows)
    }

    fn text(s: &str) -> Vec<ValueDescriptor> {
        vec![ValueDescriptor::from_text(s)]
    }

    #[test]
    fn test_bulk_add_replicates_shared_values() {
        let shared = Row::from([
            ("Name".to_string(), json!("Aliquot")),
            ("Count".to_string(), json!(5)),
        ]);
        let m = model(1);
        let patch = bulk_add_rows(&m, &shared, 3, &store());
        let m2 = m.apply(&patch).unwrap();

        assert_eq!(m2.row_count(), 4);
        for row in 1..4 {
            assert_eq!(m2.value_at(0, row)[0].display, "Aliquot");
            assert_eq!(m2.value_at(1, row)[0].raw, json!(5));
        }
        // Pre-existing row untouched.
        assert!(!m2.has_cell(0, 0));
    }

    #[test]
    fn test_bulk_add_resolves_lookup_tokens() {
        let shared = Row::from([("Organ".to_string(), json!("Kidney, Gallbladder"))]);
        let m = model(0);
        let m2 = m.apply(&bulk_add_rows(&m, &shared, 2, &store())).unwrap();

        for row in 0..2 {
            let values = m2.value_at(2, row);
            assert_eq!(values[0].raw, json!(1));
            assert_eq!(values[1].display, "Gallbladder");
            assert_eq!(
                m2.message_at(2, row).unwrap().message,
                "Could not find data for \"Gallbladder\""
            );
        }
    }

    #[test]
    fn test_bulk_update_touches_only_targets() {
        let m = model(4)
            .modify_cell(0, 0, text("keep"), ValueOp::Replace)
            .modify_cell(1, 1, text("bad"), ValueOp::Replace);
        let mut warn = GridPatch::new(m.id());
        warn.set_message(CellKey::new(1, 1), Some(CellMessage::new("Invalid integer")));
        let m = m.apply(&warn).unwrap();
        assert!(m.message_at(1, 1).is_some());

        let shared = Row::from([("Count".to_string(), json!(9))]);
        let patch = bulk_update_rows(&m, &BTreeSet::from([1, 3]), &shared, &store());
        let m2 = m.apply(&patch).unwrap();

        assert_eq!(m2.value_at(1, 1)[0].raw, json!(9));
        assert_eq!(m2.value_at(1, 3)[0].raw, json!(9));
        assert!(!m2.has_cell(1, 0));
        assert!(!m2.has_cell(1, 2));
        // Unspecified column untouched.
        assert_eq!(m2.value_at(0, 0)[0].display, "keep");
        // Overwritten cell's message cleared.
        assert!(m2.message_at(1, 1).is_none());
    }

    #[test]
    fn test_bulk_update_ignores_unknown_and_read_only_fields() {
        let columns = ColumnSet::new(vec![
            Column::scalar("Name", ColumnType::Text),
            Column::scalar("Locked", ColumnType::Text).with_read_only(true),
        ]);
        let m = EditorModel::new(ModelId::new("m"), columns, 2);
        let shared = Row::from([
            ("Locked".to_string(), json!("nope")),
            ("Ghost".to_string(), json!("nope")),
            ("Name".to_string(), json!("ok")),
        ]);
        let m2 = m
            .apply(&bulk_update_rows(&m, &BTreeSet::from([0]), &shared, &store()))
            .unwrap();
        assert_eq!(m2.value_at(0, 0)[0].display, "ok");
        assert!(!m2.has_cell(1, 0));
    }

    #[test]
    fn test_add_columns_at_front_shifts_cells() {
        let m = model(2)
            .modify_cell(0, 0, text("n0"), ValueOp::Replace)
            .modify_cell(1, 1, text("7"), ValueOp::Replace);
        let m2 = add_columns(
            &m,
            None,
            vec![Column::scalar("Barcode", ColumnType::Text)],
        )
        .unwrap();

        assert_eq!(m2.columns().len(), 4);
        assert_eq!(m2.columns().index_of("Barcode"), Some(0));
        assert_eq!(m2.columns().index_of("Name"), Some(1));
        // Former column 0 data now lives at column 1, same rows.
        assert!(!m2.has_cell(0, 0));
        assert_eq!(m2.value_at(1, 0)[0].display, "n0");
        assert_eq!(m2.value_at(2, 1)[0].display, "7");
    }

    #[test]
    fn test_add_columns_after_named_column() {
        let m = model(1).modify_cell(2, 0, vec![ValueDescriptor::new(1, "Kidney")], ValueOp::Replace);
        let m2 = add_columns(
            &m,
            Some("name"),
            vec![Column::scalar("Barcode", ColumnType::Text)],
        )
        .unwrap();
        assert_eq!(m2.columns().index_of("Barcode"), Some(1));
        // Lookup column shifted from 2 to 3.
        assert_eq!(m2.value_at(3, 0)[0].display, "Kidney");
    }

    #[test]
    fn test_add_columns_unknown_anchor_is_none() {
        assert!(add_columns(&model(1), Some("Ghost"), vec![]).is_none());
    }

    #[test]
    fn test_remove_column_discards_and_shifts() {
        let m = model(2)
            .modify_cell(0, 0, text("n"), ValueOp::Replace)
            .modify_cell(1, 0, text("5"), ValueOp::Replace)
            .modify_cell(2, 1, vec![ValueDescriptor::new(2, "Liver")], ValueOp::Replace);
        let m2 = remove_column(&m, "Count").unwrap();

        assert_eq!(m2.columns().len(), 2);
        assert_eq!(m2.columns().index_of("Organ"), Some(1));
        assert_eq!(m2.value_at(0, 0)[0].display, "n");
        // Organ data shifted down one column; Count data gone.
        assert_eq!(m2.value_at(1, 1)[0].display, "Liver");
        assert!(!m2.has_cell(2, 1));
    }

    #[test]
    fn test_remove_column_unknown_is_none() {
        assert!(remove_column(&model(1), "Ghost").is_none());
    }

    #[test]
    fn test_change_column_revalidates_values() {
        let m = model(2)
            .modify_cell(1, 0, text("12"), ValueOp::Replace)
            .modify_cell(1, 1, text("12.5"), ValueOp::Replace);
        // Int -> Float keeps both; Float -> Int would drop the fraction.
        let m2 = change_column(&m, "Count", Column::scalar("Count", ColumnType::Float)).unwrap();
        assert_eq!(m2.value_at(1, 0)[0].raw, json!(12.0));
        assert_eq!(m2.value_at(1, 1)[0].raw, json!(12.5));

        let m3 = change_column(&m, "Count", Column::scalar("Count", ColumnType::Int)).unwrap();
        assert_eq!(m3.value_at(1, 0)[0].raw, json!(12));
        // "12.5" no longer validates as an integer: discarded.
        assert!(!m3.has_cell(1, 1));
    }

    #[test]
    fn test_change_column_lookup_identity_discards() {
        let m = model(1).modify_cell(2, 0, vec![ValueDescriptor::new(1, "Kidney")], ValueOp::Replace);
        let m2 = change_column(&m, "Organ", Column::lookup("Organ", "Tissues", false)).unwrap();
        assert!(!m2.has_cell(2, 0));
        assert!(m2.message_at(2, 0).is_none());

        // Same lookup target: values survive.
        let m3 = change_column(&m, "Organ", Column::lookup("Organ", "Organs", true)).unwrap();
        assert_eq!(m3.value_at(2, 0)[0].display, "Kidney");
    }

    #[test]
    fn test_change_column_unknown_is_none() {
        assert!(change_column(
            &model(1),
            "Ghost",
            Column::scalar("Ghost", ColumnType::Text)
        )
        .is_none());
    }
}

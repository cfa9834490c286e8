//! Row diffing: the minimal per-row field change set between backing
//! data and the edit buffer, shaped for an update call.
//!
//! Rows with no real change produce no patch at all. Cleared fields are
//! explicit `null`s so the persistence layer knows to erase them, and
//! date/time fields are compared through their normalized forms so
//! equivalent spellings (a trailing `:00`, a reformatted date) are not
//! reported as edits.

use ordered_float::OrderedFloat;
use serde_json::{Map, Value as Json};

use crate::column::{Column, ColumnKind, ColumnType, ColumnSet};
use crate::model::EditorModel;
use crate::row::{row_field, Row, RowId, RowSet};
use crate::validate::{normalize_date, normalize_datetime, normalize_time};
use crate::value::{json_display, json_is_empty, ValueDescriptor};

/// How edited rows are matched back to their originals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateKey {
    pub primary: String,
    /// Field keys that identify a row when the primary key is absent
    /// from the edited data.
    pub alternates: Vec<String>,
}

impl UpdateKey {
    pub fn primary(field_key: impl Into<String>) -> Self {
        Self {
            primary: field_key.into(),
            alternates: Vec::new(),
        }
    }

    pub fn with_alternates(mut self, alternates: Vec<String>) -> Self {
        self.alternates = alternates;
        self
    }
}

/// Key fields plus exactly the changed fields of one row.
pub type RowPatch = Row;

/// Compute the patches needed to persist `edited` against `original`.
pub fn diff_rows(
    original: &RowSet,
    edited: &[Row],
    key: &UpdateKey,
    columns: &ColumnSet,
) -> Vec<RowPatch> {
    let mut patches = Vec::new();
    for edited_row in edited {
        let Some((original_row, matched_by)) = match_original(original, edited_row, key) else {
            continue;
        };

        let mut changed: RowPatch = RowPatch::new();
        for (field_key, edited_value) in edited_row {
            if field_key.eq_ignore_ascii_case(&key.primary)
                || key
                    .alternates
                    .iter()
                    .any(|a| a.eq_ignore_ascii_case(field_key))
            {
                continue;
            }
            let column = columns.by_field_key(field_key);
            let original_value = row_field(original_row, field_key);
            if let Some(patch_value) = field_change(column, edited_value, original_value) {
                changed.insert(field_key.clone(), patch_value);
            }
        }

        if changed.is_empty() {
            continue;
        }

        let mut patch = changed;
        match matched_by {
            MatchedBy::Primary => {
                if let Some(pk) = row_field(original_row, &key.primary) {
                    patch.insert(key.primary.clone(), unwrap_scalar(pk).clone());
                }
            }
            MatchedBy::Alternates => {
                for alt in &key.alternates {
                    if let Some(v) = row_field(original_row, alt) {
                        patch.insert(alt.clone(), unwrap_scalar(v).clone());
                    }
                }
            }
        }
        patches.push(patch);
    }
    patches
}

enum MatchedBy {
    Primary,
    Alternates,
}

fn match_original<'a>(
    original: &'a RowSet,
    edited: &Row,
    key: &UpdateKey,
) -> Option<(&'a Row, MatchedBy)> {
    if let Some(pk) = row_field(edited, &key.primary) {
        if let Some(id) = RowId::from_json(unwrap_scalar(pk)) {
            if let Some(row) = original.get(&id) {
                return Some((row, MatchedBy::Primary));
            }
        }
    }
    if key.alternates.is_empty() {
        return None;
    }
    // Alternate update keys: every declared field must match.
    for idx in 0..original.len() {
        let candidate = original.row_at(idx)?;
        let all_match = key.alternates.iter().all(|alt| {
            match (row_field(edited, alt), row_field(candidate, alt)) {
                (Some(a), Some(b)) => scalars_equal(unwrap_scalar(a), unwrap_scalar(b)),
                _ => false,
            }
        });
        if all_match {
            return Some((candidate, MatchedBy::Alternates));
        }
    }
    None
}

/// The patch value for a changed field, or None when nothing changed.
fn field_change(column: Option<&Column>, edited: &Json, original: Option<&Json>) -> Option<Json> {
    let edited_empty = value_is_empty(edited);
    let original_empty = original.map(value_is_empty).unwrap_or(true);

    match (edited_empty, original_empty) {
        (true, true) => None,
        // Cleared: explicit null, never an omitted field.
        (true, false) => Some(Json::Null),
        (false, true) => Some(patch_value(edited)),
        (false, false) => {
            let original = original.expect("non-empty original");
            if edited.is_array() || original.is_array() {
                if multi_values_equal(edited, original) {
                    None
                } else {
                    Some(patch_value(edited))
                }
            } else if values_equal(column, unwrap_scalar(edited), unwrap_scalar(original)) {
                None
            } else {
                Some(patch_value(edited))
            }
        }
    }
}

/// `{value, displayValue}` objects compare and persist by their value.
fn unwrap_scalar(value: &Json) -> &Json {
    match value {
        Json::Object(map) => map.get("value").unwrap_or(value),
        _ => value,
    }
}

fn value_is_empty(value: &Json) -> bool {
    match value {
        Json::Array(items) => items.is_empty(),
        other => json_is_empty(unwrap_scalar(other)),
    }
}

fn scalars_equal(a: &Json, b: &Json) -> bool {
    if a == b {
        return true;
    }
    // Numeric-aware: "5" and 5 are the same value. Total ordering keeps
    // an unchanged non-finite value from registering as an edit.
    let a_text = json_display(a);
    let b_text = json_display(b);
    if let (Ok(x), Ok(y)) = (a_text.parse::<f64>(), b_text.parse::<f64>()) {
        return OrderedFloat(x) == OrderedFloat(y);
    }
    a_text == b_text
}

fn values_equal(column: Option<&Column>, edited: &Json, original: &Json) -> bool {
    if let Some(column) = column {
        if let ColumnKind::Scalar(t @ (ColumnType::Date | ColumnType::DateTime | ColumnType::Time)) =
            column.kind
        {
            let normalize = |v: &Json| -> Option<String> {
                let text = json_display(v);
                match t {
                    ColumnType::Date => normalize_date(&text),
                    ColumnType::DateTime => normalize_datetime(&text),
                    _ => normalize_time(&text),
                }
            };
            if let (Some(a), Some(b)) = (normalize(edited), normalize(original)) {
                return a == b;
            }
            // Unparseable strings fall through to literal comparison.
            return json_display(edited) == json_display(original);
        }
    }
    scalars_equal(edited, original)
}

fn multi_values_equal(edited: &Json, original: &Json) -> bool {
    let flatten = |v: &Json| -> Vec<String> {
        match v {
            Json::Array(items) => items
                .iter()
                .map(|e| json_display(unwrap_scalar(e)))
                .collect(),
            other if value_is_empty(other) => Vec::new(),
            other => vec![json_display(unwrap_scalar(other))],
        }
    };
    flatten(edited) == flatten(original)
}

/// Shape an edited value for the outgoing patch.
fn patch_value(edited: &Json) -> Json {
    match edited {
        Json::Array(items) => Json::Array(
            items
                .iter()
                .map(|e| match e {
                    Json::Object(_) => e.clone(),
                    scalar => {
                        let mut entry = Map::new();
                        entry.insert("value".into(), scalar.clone());
                        Json::Object(entry)
                    }
                })
                .collect(),
        ),
        other => unwrap_scalar(other).clone(),
    }
}

/// Merge buffered edits over the backing rows, producing the edited-row
/// array [`diff_rows`] consumes. Rows beyond the backing set (pending
/// additions) are included without key fields; the diff skips them and
/// the insert path picks them up instead.
pub fn snapshot_rows(model: &EditorModel, original: &RowSet) -> Vec<Row> {
    let mut rows = Vec::with_capacity(model.row_count());
    for row_idx in 0..model.row_count() {
        let mut row = original.row_at(row_idx).cloned().unwrap_or_default();
        for (col_idx, column) in model.columns().iter().enumerate() {
            if !model.has_cell(col_idx as u32, row_idx as u32) {
                continue;
            }
            let descriptors = model.value_at(col_idx as u32, row_idx as u32);
            row.insert(column.field_key.clone(), field_from_descriptors(column, descriptors));
        }
        rows.push(row);
    }
    rows
}

fn field_from_descriptors(column: &Column, descriptors: &[ValueDescriptor]) -> Json {
    if column.kind.is_multi_valued() || descriptors.len() > 1 {
        Json::Array(
            descriptors
                .iter()
                .map(|d| {
                    let mut entry = Map::new();
                    entry.insert("value".into(), d.raw.clone());
                    if !d.display.is_empty() {
                        entry.insert("displayValue".into(), Json::String(d.display.clone()));
                    }
                    Json::Object(entry)
                })
                .collect(),
        )
    } else {
        descriptors.first().map(|d| d.raw.clone()).unwrap_or(Json::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{Column, ColumnType};
    use crate::model::{ModelId, ValueOp};
    use serde_json::json;

    fn columns() -> ColumnSet {
        ColumnSet::new(vec![
            Column::scalar("RowId", ColumnType::Int),
            Column::scalar("Name", ColumnType::Text),
            Column::scalar("Collected", ColumnType::DateTime),
            Column::lookup("Tags", "TagTable", true),
        ])
    }

    fn backing() -> RowSet {
        let mut set = RowSet::new();
        set.insert(
            RowId::from(1),
            Row::from([
                ("RowId".to_string(), json!(1)),
                ("Name".to_string(), json!("S-1")),
                ("Collected".to_string(), json!("2025-03-04 10:30:00")),
                (
                    "Tags".to_string(),
                    json!([{"value": 7, "displayValue": "Frozen"}]),
                ),
            ]),
        );
        set.insert(
            RowId::from(2),
            Row::from([
                ("RowId".to_string(), json!(2)),
                ("Name".to_string(), json!("S-2")),
            ]),
        );
        set
    }

    fn key() -> UpdateKey {
        UpdateKey::primary("RowId")
    }

    #[test]
    fn test_diff_idempotent_without_edits() {
        let original = backing();
        let edited: Vec<Row> = (0..original.len())
            .map(|i| original.row_at(i).unwrap().clone())
            .collect();
        assert!(diff_rows(&original, &edited, &key(), &columns()).is_empty());
    }

    #[test]
    fn test_diff_reports_only_changed_fields() {
        let original = backing();
        let mut edited = original.row_at(0).unwrap().clone();
        edited.insert("Name".into(), json!("S-1-renamed"));

        let patches = diff_rows(&original, &[edited], &key(), &columns());
        assert_eq!(patches.len(), 1);
        let patch = &patches[0];
        assert_eq!(patch.len(), 2);
        assert_eq!(patch.get("RowId"), Some(&json!(1)));
        assert_eq!(patch.get("Name"), Some(&json!("S-1-renamed")));
    }

    #[test]
    fn test_diff_clears_with_explicit_null() {
        let original = backing();
        let mut edited = original.row_at(0).unwrap().clone();
        edited.insert("Name".into(), json!(""));

        let patches = diff_rows(&original, &[edited], &key(), &columns());
        assert_eq!(patches[0].get("Name"), Some(&Json::Null));
    }

    #[test]
    fn test_diff_normalized_datetime_not_flagged() {
        let original = backing();
        let mut edited = original.row_at(0).unwrap().clone();
        // Same instant, different spelling: no trailing seconds.
        edited.insert("Collected".into(), json!("2025-03-04 10:30"));
        assert!(diff_rows(&original, &[edited], &key(), &columns()).is_empty());

        // Unchanged invalid strings are also not flagged.
        let mut set = RowSet::new();
        set.insert(
            RowId::from(1),
            Row::from([
                ("RowId".to_string(), json!(1)),
                ("Collected".to_string(), json!("not a date")),
            ]),
        );
        let edited = set.row_at(0).unwrap().clone();
        assert!(diff_rows(&set, &[edited], &key(), &columns()).is_empty());
    }

    #[test]
    fn test_diff_numeric_string_equivalence() {
        let original = backing();
        let mut edited = original.row_at(0).unwrap().clone();
        edited.insert("RowId".into(), json!("1"));
        edited.insert("Name".into(), json!("S-1"));
        assert!(diff_rows(&original, &[edited], &key(), &columns()).is_empty());
    }

    #[test]
    fn test_diff_multi_value_unchanged_by_identity() {
        let original = backing();
        let mut edited = original.row_at(0).unwrap().clone();
        // Rebuilt array, same content; raw-scalar entries count as equal
        // to the original's {value, displayValue} shape.
        edited.insert("Tags".into(), json!([7]));
        assert!(diff_rows(&original, &[edited], &key(), &columns()).is_empty());
    }

    #[test]
    fn test_diff_multi_value_change_and_shape() {
        let original = backing();
        let mut edited = original.row_at(0).unwrap().clone();
        edited.insert("Tags".into(), json!([7, 9]));

        let patches = diff_rows(&original, &[edited], &key(), &columns());
        assert_eq!(
            patches[0].get("Tags"),
            Some(&json!([{"value": 7}, {"value": 9}]))
        );
    }

    #[test]
    fn test_diff_matches_by_alternate_keys() {
        let original = backing();
        let key = UpdateKey::primary("RowId").with_alternates(vec!["Name".into()]);
        // No RowId in the edited row; matched through Name.
        let edited = Row::from([
            ("Name".to_string(), json!("S-2")),
            ("Collected".to_string(), json!("2025-06-01")),
        ]);
        let patches = diff_rows(&original, &[edited], &key, &columns());
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].get("Name"), Some(&json!("S-2")));
        assert!(patches[0].contains_key("Collected"));
    }

    #[test]
    fn test_diff_skips_unmatched_rows() {
        let original = backing();
        let edited = Row::from([("Name".to_string(), json!("brand new"))]);
        assert!(diff_rows(&original, &[edited], &key(), &columns()).is_empty());
    }

    #[test]
    fn test_snapshot_rows_overlays_buffer() {
        let original = backing();
        let model = EditorModel::from_rows(ModelId::new("m"), columns(), &original)
            .modify_cell(
                1,
                0,
                vec![ValueDescriptor::from_text("S-1-renamed")],
                ValueOp::Replace,
            );
        let rows = snapshot_rows(&model, &original);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Name"), Some(&json!("S-1-renamed")));
        // Untouched fields keep their server shape.
        assert_eq!(rows[1].get("Name"), Some(&json!("S-2")));

        let patches = diff_rows(&original, &rows, &key(), &columns());
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].get("Name"), Some(&json!("S-1-renamed")));
    }

    #[test]
    fn test_snapshot_multi_value_shape() {
        let original = backing();
        let model = EditorModel::from_rows(ModelId::new("m"), columns(), &original)
            .modify_cell(
                3,
                1,
                vec![ValueDescriptor::new(9, "Thawed")],
                ValueOp::Replace,
            );
        let rows = snapshot_rows(&model, &original);
        assert_eq!(
            rows[1].get("Tags"),
            Some(&json!([{"value": 9, "displayValue": "Thawed"}]))
        );
    }
}

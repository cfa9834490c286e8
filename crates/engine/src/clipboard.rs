//! Selection serialization for the platform clipboard bridge.
//!
//! Copy produces tab/newline-delimited text in reading order, the same
//! shape the paste parser consumes, so an in-grid copy/paste round-trips
//! exactly. The bridge that moves this text through clipboard events is
//! an external collaborator.

use crate::model::EditorModel;
use crate::row::RowSet;

/// Serialize the current selection (its bounding rectangle, for sparse
/// selections) as tab/newline-delimited text. None when nothing is
/// selected.
pub fn serialize_selection(model: &EditorModel, data: &RowSet) -> Option<String> {
    let rect = model.selection_rect()?;
    let mut out = String::new();
    for row in rect.row_min..=rect.row_max {
        if row > rect.row_min {
            out.push('\n');
        }
        for col in rect.col_min..=rect.col_max {
            if col > rect.col_min {
                out.push('\t');
            }
            out.push_str(&cell_text(model, data, col, row));
        }
    }
    Some(out)
}

fn cell_text(model: &EditorModel, data: &RowSet, col: u32, row: u32) -> String {
    let descriptors = model.descriptors_with_backing(data, col, row);
    descriptors
        .iter()
        .map(|d| d.display.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{Column, ColumnSet, ColumnType};
    use crate::model::{ModelId, ValueOp};
    use crate::paste::parse_paste_payload;
    use crate::row::{Row, RowId};
    use crate::value::ValueDescriptor;
    use serde_json::json;

    fn model() -> (EditorModel, RowSet) {
        let columns = ColumnSet::new(vec![
            Column::scalar("Name", ColumnType::Text),
            Column::scalar("Count", ColumnType::Int),
        ]);
        let mut data = RowSet::new();
        data.insert(
            RowId::from(1),
            Row::from([
                ("Name".to_string(), json!("S-1")),
                ("Count".to_string(), json!(4)),
            ]),
        );
        data.insert(
            RowId::from(2),
            Row::from([("Name".to_string(), json!("S-2"))]),
        );
        (EditorModel::new(ModelId::new("m"), columns, 2), data)
    }

    #[test]
    fn test_serialize_none_without_selection() {
        let (m, data) = model();
        assert!(serialize_selection(&m, &data).is_none());
    }

    #[test]
    fn test_serialize_mixes_buffer_and_backing() {
        let (m, data) = model();
        let m = m
            .modify_cell(0, 0, vec![ValueDescriptor::from_text("edited")], ValueOp::Replace)
            .select_cell(0, 0)
            .select_area((1, 1), None);
        let text = serialize_selection(&m, &data).unwrap();
        assert_eq!(text, "edited\t4\nS-2\t");
    }

    #[test]
    fn test_round_trips_through_paste_parser() {
        let (m, data) = model();
        let m = m.select_cell(0, 0).select_area((1, 1), None);
        let text = serialize_selection(&m, &data).unwrap();
        let payload = parse_paste_payload(&text);
        assert_eq!(payload.num_rows, 2);
        assert_eq!(payload.num_cols, 2);
        assert_eq!(payload.data[0], vec!["S-1", "4"]);
        assert_eq!(payload.data[1], vec!["S-2", ""]);
    }

    #[test]
    fn test_multi_value_cells_join_displays() {
        let columns = ColumnSet::new(vec![Column::lookup("Tags", "TagTable", true)]);
        let m = EditorModel::new(ModelId::new("m"), columns, 1)
            .modify_cell(
                0,
                0,
                vec![ValueDescriptor::new(1, "Frozen"), ValueDescriptor::new(2, "QC")],
                ValueOp::Replace,
            )
            .select_cell(0, 0);
        let text = serialize_selection(&m, &RowSet::new()).unwrap();
        assert_eq!(text, "Frozen, QC");
    }
}

//! Backing row data fetched by the query layer.
//!
//! The editor model never performs I/O; consumers hand it a [`RowSet`]
//! built from a server row fetch. Fields arrive as JSON scalars, or as
//! `{value, displayValue}` objects (and arrays of them) for lookups.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::value::{json_display, ValueDescriptor};

/// Stable identifier of a persisted row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(String);

impl RowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Id from a JSON key field value, when the value is a scalar.
    pub fn from_json(value: &Json) -> Option<Self> {
        match value {
            Json::Null => None,
            Json::String(s) if s.is_empty() => None,
            Json::String(s) => Some(Self(s.clone())),
            Json::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }
}

impl std::fmt::Display for RowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<i64> for RowId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

/// One row's fields, keyed by server field key.
pub type Row = BTreeMap<String, Json>;

/// Field access matching the grid's case-insensitive column keys: exact
/// match first, case-insensitive scan only on a miss.
pub fn row_field<'a>(row: &'a Row, field_key: &str) -> Option<&'a Json> {
    if let Some(v) = row.get(field_key) {
        return Some(v);
    }
    row.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(field_key))
        .map(|(_, v)| v)
}

/// An ordered collection of backing rows keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    rows: FxHashMap<RowId, Row>,
    ordered: Vec<RowId>,
}

impl RowSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<(RowId, Row)>) -> Self {
        let mut set = Self::new();
        for (id, row) in rows {
            set.insert(id, row);
        }
        set
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Append a row; replaces the payload of an already-present id.
    pub fn insert(&mut self, id: RowId, row: Row) {
        if self.rows.insert(id.clone(), row).is_none() {
            self.ordered.push(id);
        }
    }

    pub fn ids(&self) -> &[RowId] {
        &self.ordered
    }

    pub fn id_at(&self, idx: usize) -> Option<&RowId> {
        self.ordered.get(idx)
    }

    pub fn get(&self, id: &RowId) -> Option<&Row> {
        self.rows.get(id)
    }

    pub fn row_at(&self, idx: usize) -> Option<&Row> {
        self.ordered.get(idx).and_then(|id| self.rows.get(id))
    }

    pub fn field_at(&self, idx: usize, field_key: &str) -> Option<&Json> {
        self.row_at(idx).and_then(|row| row_field(row, field_key))
    }
}

/// Convert one fetched field value into cell descriptors.
///
/// Handles the three shapes the query layer produces: a scalar, a
/// `{value, displayValue}` object, or an array of either (multi-value
/// lookups). Null yields no descriptors.
pub fn descriptors_from_field(value: &Json) -> Vec<ValueDescriptor> {
    match value {
        Json::Null => Vec::new(),
        Json::Array(items) => items.iter().flat_map(descriptors_from_field).collect(),
        Json::Object(map) => {
            let raw = map.get("value").cloned().unwrap_or(Json::Null);
            let display = map
                .get("displayValue")
                .map(json_display)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| json_display(&raw));
            vec![ValueDescriptor { raw, display }]
        }
        scalar => vec![ValueDescriptor {
            raw: scalar.clone(),
            display: json_display(scalar),
        }],
    }
}

//! Column metadata for the edit buffer.
//!
//! Columns are described by a tagged kind (scalar of a declared type, or a
//! lookup into another table) so the validation/paste/fill engines match on
//! structure instead of probing properties at runtime. Field-key lookup is
//! case-insensitive via an index canonicalized once at construction.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Declared scalar type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Text,
    Int,
    Float,
    Boolean,
    Date,
    DateTime,
    Time,
    /// Free text restricted to a fixed set of values.
    TextChoice,
}

/// What a column's cells actually hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Scalar(ColumnType),
    /// Foreign-key reference resolved to display labels via a lookup store.
    Lookup {
        table: String,
        multi_valued: bool,
    },
}

impl ColumnKind {
    pub fn is_lookup(&self) -> bool {
        matches!(self, ColumnKind::Lookup { .. })
    }

    pub fn is_multi_valued(&self) -> bool {
        matches!(
            self,
            ColumnKind::Lookup {
                multi_valued: true,
                ..
            }
        )
    }
}

/// Metadata for one grid column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Server field key; compared case-insensitively.
    pub field_key: String,
    /// Caption shown to users and used in required-field messages.
    pub caption: String,
    pub kind: ColumnKind,
    pub required: bool,
    pub read_only: bool,
    /// Maximum character count for text columns, when declared.
    pub scale: Option<usize>,
    /// Allowed values for TextChoice columns (matched case-sensitively).
    pub valid_values: Vec<String>,
}

impl Column {
    pub fn new(field_key: impl Into<String>, kind: ColumnKind) -> Self {
        let field_key = field_key.into();
        Self {
            caption: field_key.clone(),
            field_key,
            kind,
            required: false,
            read_only: false,
            scale: None,
            valid_values: Vec::new(),
        }
    }

    /// Shorthand for a scalar column.
    pub fn scalar(field_key: impl Into<String>, column_type: ColumnType) -> Self {
        Self::new(field_key, ColumnKind::Scalar(column_type))
    }

    /// Shorthand for a lookup column.
    pub fn lookup(field_key: impl Into<String>, table: impl Into<String>, multi_valued: bool) -> Self {
        Self::new(
            field_key,
            ColumnKind::Lookup {
                table: table.into(),
                multi_valued,
            },
        )
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_scale(mut self, scale: usize) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn with_valid_values(mut self, values: Vec<String>) -> Self {
        self.valid_values = values;
        self
    }

    /// The scalar type, for non-lookup columns.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self.kind {
            ColumnKind::Scalar(t) => Some(t),
            ColumnKind::Lookup { .. } => None,
        }
    }

    pub fn is_date_like(&self) -> bool {
        matches!(
            self.kind,
            ColumnKind::Scalar(ColumnType::Date) | ColumnKind::Scalar(ColumnType::DateTime)
        )
    }
}

/// Ordered column list with case-insensitive field-key lookup.
///
/// The lowercased index is built once here; no call site lowercases keys
/// per access. Structural mutations return new sets so the editor model
/// keeps value semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Column>", into = "Vec<Column>")]
pub struct ColumnSet {
    columns: Vec<Column>,
    index: FxHashMap<String, usize>,
}

impl ColumnSet {
    pub fn new(columns: Vec<Column>) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.field_key.to_lowercase(), i))
            .collect();
        Self { columns, index }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Column> {
        self.columns.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    /// Position of a field key, matched case-insensitively.
    pub fn index_of(&self, field_key: &str) -> Option<usize> {
        self.index.get(&field_key.to_lowercase()).copied()
    }

    pub fn by_field_key(&self, field_key: &str) -> Option<&Column> {
        self.index_of(field_key).and_then(|i| self.columns.get(i))
    }

    pub fn field_keys(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.field_key.as_str())
    }

    /// New set with columns inserted at `at` (clamped to the end).
    pub fn inserting(&self, at: usize, new_columns: Vec<Column>) -> Self {
        let mut columns = self.columns.clone();
        let at = at.min(columns.len());
        columns.splice(at..at, new_columns);
        Self::new(columns)
    }

    /// New set with the column at `idx` removed.
    pub fn removing(&self, idx: usize) -> Self {
        let mut columns = self.columns.clone();
        columns.remove(idx);
        Self::new(columns)
    }

    /// New set with the column at `idx` replaced.
    pub fn replacing(&self, idx: usize, column: Column) -> Self {
        let mut columns = self.columns.clone();
        columns[idx] = column;
        Self::new(columns)
    }
}

impl From<Vec<Column>> for ColumnSet {
    fn from(columns: Vec<Column>) -> Self {
        Self::new(columns)
    }
}

impl From<ColumnSet> for Vec<Column> {
    fn from(set: ColumnSet) -> Self {
        set.columns
    }
}

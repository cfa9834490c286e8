//! Lookup value resolution.
//!
//! Lookup columns store foreign keys but users type display labels. The
//! engines resolve pasted/typed text through a [`LookupStore`] that the
//! excluded fetch layer pre-warms before any paste or bulk add runs.
//! Unmatched tokens are kept as literal values with a cell warning; a
//! lookup miss never rejects an edit.

use rustc_hash::FxHashMap;

use crate::column::Column;
use crate::value::{json_display, CellMessage, ValueDescriptor};

/// How many unmatched tokens a single cell message reports.
const MAX_UNMATCHED_REPORTED: usize = 4;

/// Read interface the engines use to resolve lookup columns.
///
/// Returning `None` means the column's values were never fetched; the
/// engines then fall back to literal text.
pub trait LookupStore {
    fn descriptors(&self, column: &Column) -> Option<&LookupIndex>;
}

/// Resolved value descriptors for one lookup target, indexed by display
/// label and by raw key text.
#[derive(Debug, Clone, Default)]
pub struct LookupIndex {
    by_display: FxHashMap<String, ValueDescriptor>,
    by_raw: FxHashMap<String, ValueDescriptor>,
}

impl LookupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_descriptors(descriptors: Vec<ValueDescriptor>) -> Self {
        let mut index = Self::new();
        for d in descriptors {
            index.insert(d);
        }
        index
    }

    pub fn insert(&mut self, descriptor: ValueDescriptor) {
        self.by_raw
            .insert(json_display(&descriptor.raw), descriptor.clone());
        self.by_display.insert(descriptor.display.clone(), descriptor);
    }

    pub fn len(&self) -> usize {
        self.by_display.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_display.is_empty()
    }

    /// Match a token against display labels first, then raw key text.
    pub fn resolve(&self, token: &str) -> Option<&ValueDescriptor> {
        self.by_display
            .get(token)
            .or_else(|| self.by_raw.get(token))
    }
}

/// Outcome of resolving one cell's pasted text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenResolution {
    /// One descriptor per token, literal for unmatched tokens.
    pub descriptors: Vec<ValueDescriptor>,
    pub unmatched: Vec<String>,
}

impl TokenResolution {
    /// Warning message for the cell, when any token went unmatched.
    pub fn message(&self) -> Option<CellMessage> {
        if self.unmatched.is_empty() {
            return None;
        }
        let listed: Vec<String> = self
            .unmatched
            .iter()
            .take(MAX_UNMATCHED_REPORTED)
            .map(|t| format!("{:?}", t))
            .collect();
        Some(CellMessage::new(format!(
            "Could not find data for {}",
            listed.join(", ")
        )))
    }
}

/// Resolve comma-separated cell text against a lookup index.
///
/// Empty tokens are dropped. Unmatched tokens become literal raw values
/// and are recorded for the cell warning.
pub fn resolve_tokens(index: &LookupIndex, text: &str) -> TokenResolution {
    let mut resolution = TokenResolution::default();
    for token in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match index.resolve(token) {
            Some(descriptor) => resolution.descriptors.push(descriptor.clone()),
            None => {
                resolution.descriptors.push(ValueDescriptor::from_text(token));
                resolution.unmatched.push(token.to_string());
            }
        }
    }
    resolution
}

/// Lookup store backed by per-table indexes, for consumers and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLookupStore {
    by_table: FxHashMap<String, LookupIndex>,
}

impl InMemoryLookupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_table(&mut self, table: impl Into<String>, index: LookupIndex) {
        self.by_table.insert(table.into(), index);
    }
}

impl LookupStore for InMemoryLookupStore {
    fn descriptors(&self, column: &Column) -> Option<&LookupIndex> {
        match &column.kind {
            crate::column::ColumnKind::Lookup { table, .. } => self.by_table.get(table),
            _ => None,
        }
    }
}

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// One stored cell value: the underlying raw value and its human-facing
/// rendering (e.g. a lookup's raw id vs. its display label).
///
/// A cell holds an ordered sequence of these; multi-value (junction)
/// lookups put one descriptor per joined row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueDescriptor {
    pub raw: Json,
    pub display: String,
}

impl ValueDescriptor {
    pub fn new(raw: impl Into<Json>, display: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            display: display.into(),
        }
    }

    /// Descriptor for literal text: raw and display are the same string.
    pub fn from_text(text: &str) -> Self {
        Self {
            raw: Json::String(text.to_string()),
            display: text.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.display.is_empty() && json_is_empty(&self.raw)
    }
}

/// A validation or paste-resolution warning attached to one cell.
/// Absence means "no message".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellMessage {
    pub message: String,
}

impl CellMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// True for the values that count as "no value" in an edit buffer:
/// null or empty string.
pub fn json_is_empty(value: &Json) -> bool {
    match value {
        Json::Null => true,
        Json::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Render a raw JSON scalar the way the grid displays it.
pub fn json_display(value: &Json) -> String {
    match value {
        Json::Null => String::new(),
        Json::String(s) => s.clone(),
        Json::Bool(b) => b.to_string(),
        Json::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

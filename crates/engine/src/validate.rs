//! Per-cell validation.
//!
//! Validation never rejects an edit: it returns the (possibly normalized)
//! values together with an optional message, so the grid can keep showing
//! the offending value with an inline warning. Aggregation of remaining
//! problems happens at submit time via [`collect_validation_errors`].

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value as Json;

use labgrid_core::CellKey;

use crate::column::{Column, ColumnKind, ColumnType};
use crate::model::EditorModel;
use crate::value::{CellMessage, ValueDescriptor};

/// Result of validating one cell: normalized values plus an optional
/// warning. The values are always usable, valid or not.
#[derive(Debug, Clone, PartialEq)]
pub struct CellValidation {
    pub values: Vec<ValueDescriptor>,
    pub message: Option<CellMessage>,
}

impl CellValidation {
    fn ok(values: Vec<ValueDescriptor>) -> Self {
        Self {
            values,
            message: None,
        }
    }

    fn warn(values: Vec<ValueDescriptor>, message: String) -> Self {
        Self {
            values,
            message: Some(CellMessage::new(message)),
        }
    }
}

/// Validate one cell's values against its column.
pub fn validate_cell(values: &[ValueDescriptor], column: &Column) -> CellValidation {
    let is_blank = values
        .iter()
        .all(|v| v.display.trim().is_empty() && crate::value::json_is_empty(&v.raw));
    if values.is_empty() || is_blank {
        // Required wins for blank cells regardless of declared type.
        if column.required {
            return CellValidation::warn(
                values.to_vec(),
                format!("{} is required.", column.caption),
            );
        }
        return CellValidation::ok(values.to_vec());
    }

    let column_type = match &column.kind {
        // Lookup values are checked by token resolution, not here.
        ColumnKind::Lookup { .. } => return CellValidation::ok(values.to_vec()),
        ColumnKind::Scalar(t) => *t,
    };

    let mut normalized = Vec::with_capacity(values.len());
    let mut message = None;
    for value in values {
        match validate_scalar(value, column_type, column) {
            Ok(v) => normalized.push(v),
            Err(m) => {
                if message.is_none() {
                    message = Some(CellMessage::new(m));
                }
                normalized.push(value.clone());
            }
        }
    }
    CellValidation {
        values: normalized,
        message,
    }
}

fn validate_scalar(
    value: &ValueDescriptor,
    column_type: ColumnType,
    column: &Column,
) -> Result<ValueDescriptor, String> {
    let text = value.display.trim();
    match column_type {
        ColumnType::Int => {
            let parsed: f64 = text.parse().map_err(|_| "Invalid integer".to_string())?;
            if !parsed.is_finite() || parsed.fract() != 0.0 {
                return Err("Invalid integer".into());
            }
            let n = parsed as i64;
            Ok(ValueDescriptor::new(n, n.to_string()))
        }
        ColumnType::Float => {
            let parsed: f64 = text.parse().map_err(|_| "Invalid decimal".to_string())?;
            if !parsed.is_finite() {
                return Err("Invalid decimal".into());
            }
            Ok(ValueDescriptor {
                raw: Json::from(parsed),
                display: text.to_string(),
            })
        }
        ColumnType::Boolean => match text.to_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "on" | "1" => {
                Ok(ValueDescriptor::new(true, "true"))
            }
            "false" | "f" | "no" | "n" | "off" | "0" => {
                Ok(ValueDescriptor::new(false, "false"))
            }
            _ => Err("Invalid boolean".into()),
        },
        ColumnType::Date => match normalize_date(text) {
            Some(date) => Ok(ValueDescriptor::new(date.clone(), date)),
            None => Err("Invalid date".into()),
        },
        ColumnType::DateTime => match normalize_datetime(text) {
            Some(dt) => Ok(ValueDescriptor::new(dt.clone(), dt)),
            None => Err("Invalid date time".into()),
        },
        ColumnType::Time => match normalize_time(text) {
            Some(t) => Ok(ValueDescriptor::new(t.clone(), t)),
            None => Err("Invalid time".into()),
        },
        ColumnType::Text => {
            if let Some(scale) = column.scale {
                let len = value.display.chars().count();
                if len > scale {
                    return Err(format!("{}/{} characters", len, scale));
                }
            }
            Ok(value.clone())
        }
        ColumnType::TextChoice => {
            if column.valid_values.iter().any(|v| v == text) {
                Ok(value.clone())
            } else {
                Err("Invalid text choice".into())
            }
        }
    }
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%b-%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

pub(crate) fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            return Some(d);
        }
    }
    // Date-time strings are accepted for date columns; keep the date part.
    parse_datetime(text).map(|dt| dt.date())
}

pub(crate) fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Normalize to `YYYY-MM-DD`, or None for unparseable input.
pub(crate) fn normalize_date(text: &str) -> Option<String> {
    parse_date(text).map(|d| d.format("%Y-%m-%d").to_string())
}

/// Normalize to `YYYY-MM-DD HH:MM:SS`, or None for unparseable input.
pub(crate) fn normalize_datetime(text: &str) -> Option<String> {
    parse_datetime(text).map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// Normalize to zero-padded `HH:MM`, or None for unparseable input.
///
/// Accepts a bare hour ("7"), `H:MM`, `HH:MM`, and `H:MM AM/PM`.
pub(crate) fn normalize_time(text: &str) -> Option<String> {
    let text = text.trim();
    if let Ok(hour) = text.parse::<u32>() {
        if hour < 24 {
            return Some(format!("{:02}:00", hour));
        }
        return None;
    }
    let upper = text.to_uppercase();
    for fmt in ["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M%p"] {
        if let Ok(t) = NaiveTime::parse_from_str(&upper, fmt) {
            return Some(t.format("%H:%M").to_string());
        }
    }
    None
}

/// Re-validate every buffered cell and gather outstanding problems in
/// reading order, including stored resolution warnings. Callers present
/// this as the blocking list before a save.
pub fn collect_validation_errors(model: &EditorModel) -> Vec<(CellKey, String)> {
    let mut errors = Vec::new();
    for (col_idx, column) in model.columns().iter().enumerate() {
        for row in 0..model.row_count() as u32 {
            let key = CellKey::new(col_idx as u32, row);
            let validation = validate_cell(model.value_at(key.col, key.row), column);
            if let Some(message) = validation.message {
                errors.push((key, message.message));
            } else if let Some(stored) = model.message_at(key.col, key.row) {
                errors.push((key, stored.message.clone()));
            }
        }
    }
    errors.sort_by_key(|(key, _)| *key);
    errors
}

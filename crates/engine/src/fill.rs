//! Drag-fill: extrapolating a selected range's values into an adjacent
//! target range.
//!
//! Sequence detection and value generation are split: the source cells
//! establish a pattern (integer/float progression, prefixed number,
//! calendar-day steps for date columns, or literal cycling), then each
//! target cell receives the k-th generated value. Source reads fall
//! through the edit buffer to backing rows so untouched server values
//! seed fills too.

use chrono::{Duration, NaiveDateTime};

use labgrid_core::CellKey;

use crate::column::{Column, ColumnType};
use crate::lookup::{resolve_tokens, LookupStore};
use crate::model::{EditorModel, GridPatch};
use crate::row::RowSet;
use crate::validate::parse_datetime;
use crate::value::ValueDescriptor;

/// How long a pressed fill handle must be held before the gesture counts
/// as a drag rather than a click. Consumed by the presentation layer.
pub const DRAG_START_DELAY_MS: u64 = 150;

/// Detected fill pattern for one column.
#[derive(Debug, Clone, PartialEq)]
enum FillSequence {
    /// Repeat the source cells as a cycle.
    Cycle,
    /// Integer progression from the boundary value.
    Integer { start: i64, step: i64 },
    /// Float progression, rendered at the sources' decimal precision.
    Float { start: f64, step: f64, precision: usize },
    /// Constant prefix with an arithmetic numeric suffix.
    Prefixed {
        prefix: String,
        start: i64,
        step: i64,
        width: Option<usize>,
    },
    /// Whole-day steps preserving time-of-day.
    Date { start: NaiveDateTime, step_days: i64 },
}

/// Split text into a non-numeric prefix and its trailing digit run:
/// `"S-2"` → `("S-", "2")`. None when no digits trail.
pub fn split_prefixed_number(text: &str) -> Option<(String, String)> {
    let digits_start = text
        .rfind(|c: char| !c.is_ascii_digit())
        .map(|i| i + text[i..].chars().next().map_or(1, char::len_utf8))
        .unwrap_or(0);
    if digits_start >= text.len() {
        return None;
    }
    Some((
        text[..digits_start].to_string(),
        text[digits_start..].to_string(),
    ))
}

/// Fill `target_keys` from the pattern established by `initial_keys`,
/// all within one column. Targets before the initial selection fill
/// backward from its start; targets after it fill forward from its end.
pub fn fill_column_cells(
    model: &EditorModel,
    column: &Column,
    lookup: &dyn LookupStore,
    initial_keys: &[CellKey],
    target_keys: &[CellKey],
    data: &RowSet,
) -> GridPatch {
    let mut patch = GridPatch::new(model.id());
    if initial_keys.is_empty() || target_keys.is_empty() {
        return patch;
    }

    let mut sources: Vec<CellKey> = initial_keys.to_vec();
    sources.sort();
    let mut targets: Vec<CellKey> = target_keys.to_vec();
    targets.sort();

    let backward = targets[0].row < sources[0].row;
    let source_values: Vec<Vec<ValueDescriptor>> = sources
        .iter()
        .map(|k| model.descriptors_with_backing(data, k.col, k.row))
        .collect();
    let displays: Vec<String> = source_values
        .iter()
        .map(|values| {
            values
                .iter()
                .map(|v| v.display.clone())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .collect();

    if column.kind.is_lookup() {
        fill_cycle(
            &mut patch,
            column,
            Some(lookup),
            &source_values,
            &displays,
            &targets,
            backward,
        );
        return patch;
    }

    let sequence = detect_sequence(column, &displays, backward);
    log::debug!(
        "filling {} cells in {} ({:?})",
        targets.len(),
        column.field_key,
        sequence
    );

    match sequence {
        FillSequence::Cycle => {
            fill_cycle(
                &mut patch,
                column,
                None,
                &source_values,
                &displays,
                &targets,
                backward,
            );
        }
        sequence => {
            for (idx, key) in ordered_targets(&targets, backward).into_iter().enumerate() {
                let k = idx as i64 + 1;
                let descriptor = generate(&sequence, column, k, backward);
                patch.set_value(key, vec![descriptor]);
                patch.set_message(key, None);
            }
        }
    }
    patch
}

/// Targets ordered by distance from the initial selection.
fn ordered_targets(targets: &[CellKey], backward: bool) -> Vec<CellKey> {
    let mut ordered = targets.to_vec();
    if backward {
        ordered.reverse();
    }
    ordered
}

fn fill_cycle(
    patch: &mut GridPatch,
    column: &Column,
    lookup: Option<&dyn LookupStore>,
    source_values: &[Vec<ValueDescriptor>],
    displays: &[String],
    targets: &[CellKey],
    backward: bool,
) {
    let n = source_values.len();
    for (idx, key) in ordered_targets(targets, backward).into_iter().enumerate() {
        let source_idx = if backward {
            // Continue the cycle upward: nearest target mirrors the last
            // source cell.
            (n - 1).wrapping_sub(idx % n)
        } else {
            idx % n
        };
        match lookup.and_then(|store| store.descriptors(column)) {
            Some(index) => {
                // Re-resolve through the store so raw ids stay honest even
                // when the copied descriptors predate a column change.
                let resolution = resolve_tokens(index, &displays[source_idx]);
                patch.set_message(key, resolution.message());
                patch.set_value(key, resolution.descriptors);
            }
            None => {
                patch.set_value(key, source_values[source_idx].clone());
                patch.set_message(key, None);
            }
        }
    }
}

fn detect_sequence(column: &Column, displays: &[String], backward: bool) -> FillSequence {
    if column.is_date_like() {
        if let Some(sequence) = detect_date_sequence(column, displays, backward) {
            return sequence;
        }
        return FillSequence::Cycle;
    }

    if displays.len() < 2 {
        return FillSequence::Cycle;
    }
    let trimmed: Vec<&str> = displays.iter().map(|s| s.trim()).collect();
    if trimmed.iter().any(|s| s.is_empty()) {
        return FillSequence::Cycle;
    }

    if let Some(values) = parse_all::<i64>(&trimmed) {
        if let Some(step) = constant_int_step(&values) {
            let start = if backward { values[0] } else { values[values.len() - 1] };
            return FillSequence::Integer { start, step };
        }
        return FillSequence::Cycle;
    }

    if let Some(values) = parse_all::<f64>(&trimmed) {
        if let Some(step) = constant_float_step(&values) {
            let start = if backward { values[0] } else { values[values.len() - 1] };
            let precision = trimmed.iter().map(|s| decimals(s)).max().unwrap_or(0);
            return FillSequence::Float {
                start,
                step,
                precision,
            };
        }
        return FillSequence::Cycle;
    }

    if let Some(sequence) = detect_prefixed_sequence(&trimmed, backward) {
        return sequence;
    }

    FillSequence::Cycle
}

fn detect_date_sequence(
    column: &Column,
    displays: &[String],
    backward: bool,
) -> Option<FillSequence> {
    // Empty source cells are skipped when inferring the step; targets are
    // still overwritten by generation.
    let parsed: Vec<NaiveDateTime> = displays
        .iter()
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_datetime(s))
        .collect::<Option<Vec<_>>>()?;
    if parsed.is_empty() {
        return None;
    }
    debug_assert!(column.is_date_like());

    let step_days = match parsed.len() {
        1 => 1,
        n => {
            let (a, b) = if backward {
                (parsed[0], parsed[1])
            } else {
                (parsed[n - 2], parsed[n - 1])
            };
            (b.date() - a.date()).num_days()
        }
    };
    let start = if backward {
        parsed[0]
    } else {
        parsed[parsed.len() - 1]
    };
    Some(FillSequence::Date { start, step_days })
}

fn detect_prefixed_sequence(trimmed: &[&str], backward: bool) -> Option<FillSequence> {
    let parts: Vec<(String, String)> = trimmed
        .iter()
        .map(|s| split_prefixed_number(s))
        .collect::<Option<Vec<_>>>()?;
    let prefix = &parts[0].0;
    if !parts.iter().all(|(p, _)| p == prefix) {
        return None;
    }
    let numbers: Vec<i64> = parts
        .iter()
        .map(|(_, digits)| digits.parse().ok())
        .collect::<Option<Vec<_>>>()?;
    let step = constant_int_step(&numbers)?;

    let boundary = if backward { 0 } else { parts.len() - 1 };
    let width = parts[boundary]
        .1
        .starts_with('0')
        .then_some(parts[boundary].1.len())
        .filter(|&w| w > 1);
    Some(FillSequence::Prefixed {
        prefix: prefix.clone(),
        start: numbers[boundary],
        step,
        width,
    })
}

fn generate(sequence: &FillSequence, column: &Column, k: i64, backward: bool) -> ValueDescriptor {
    let k = if backward { -k } else { k };
    match sequence {
        FillSequence::Integer { start, step } => {
            let value = start + step * k;
            ValueDescriptor::new(value, value.to_string())
        }
        FillSequence::Float {
            start,
            step,
            precision,
        } => {
            let value = start + step * k as f64;
            ValueDescriptor::new(value, format!("{:.*}", precision, value))
        }
        FillSequence::Prefixed {
            prefix,
            start,
            step,
            width,
        } => {
            let value = start + step * k;
            let digits = match width {
                Some(w) => format!("{:0>width$}", value, width = w),
                None => value.to_string(),
            };
            ValueDescriptor::from_text(&format!("{}{}", prefix, digits))
        }
        FillSequence::Date { start, step_days } => {
            let value = *start + Duration::days(step_days * k);
            let display = match column.column_type() {
                Some(ColumnType::Date) => value.format("%Y-%m-%d").to_string(),
                _ => value.format("%Y-%m-%d %H:%M:%S").to_string(),
            };
            ValueDescriptor::new(display.clone(), display)
        }
        FillSequence::Cycle => unreachable!("cycle fills never generate"),
    }
}

fn parse_all<T: std::str::FromStr>(values: &[&str]) -> Option<Vec<T>> {
    values.iter().map(|s| s.parse().ok()).collect()
}

fn constant_int_step(values: &[i64]) -> Option<i64> {
    let step = values[1] - values[0];
    values
        .windows(2)
        .all(|w| w[1] - w[0] == step)
        .then_some(step)
}

fn constant_float_step(values: &[f64]) -> Option<f64> {
    const TOLERANCE: f64 = 1e-9;
    let step = values[1] - values[0];
    values
        .windows(2)
        .all(|w| (w[1] - w[0] - step).abs() < TOLERANCE)
        .then_some(step)
}

fn decimals(text: &str) -> usize {
    text.split_once('.')
        .map(|(_, frac)| frac.trim_end_matches(|c: char| !c.is_ascii_digit()).len())
        .unwrap_or(0)
}

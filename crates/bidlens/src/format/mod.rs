//! Tabular text rendering for result sets.
//!
//! The output is fed verbatim into insight prompts, so identical rows must always render to
//! identical bytes: column order follows the result set and numbers use a fixed notation.

use crate::models::{ResultSet, ScalarValue};

pub const NO_DATA_SENTINEL: &str = "No data available.";
pub const DEFAULT_MAX_ROWS: usize = 20;
pub const COLUMN_SEPARATOR: &str = " | ";

#[must_use]
pub fn format_result_set(result: &ResultSet, max_rows: usize) -> String {
    if result.is_empty() {
        return NO_DATA_SENTINEL.to_string();
    }

    let header = result.columns().join(COLUMN_SEPARATOR);
    let separator = "-".repeat(header.chars().count());
    let mut lines = Vec::with_capacity(result.len().min(max_rows) + 3);
    lines.push(header);
    lines.push(separator);

    for row in result.iter().take(max_rows) {
        let cells = row.values().iter().map(format_cell).collect::<Vec<_>>();
        lines.push(cells.join(COLUMN_SEPARATOR));
    }

    let elided = result.len().saturating_sub(max_rows);
    if elided > 0 {
        lines.push(elision_line(elided));
    }

    lines.join("\n")
}

#[must_use]
pub fn format_cell(value: &ScalarValue) -> String {
    match value {
        ScalarValue::Integer(value) => format_integer(*value),
        ScalarValue::Float(value) => format_float(*value),
        other => other.to_string(),
    }
}

#[must_use]
pub fn format_integer(value: i64) -> String {
    let grouped = group_thousands(&value.unsigned_abs().to_string());
    if value < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// Two decimals with thousands separators: `1234567.891` renders as `1,234,567.89`.
#[must_use]
pub fn format_float(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let rendered = format!("{:.2}", value.abs());
    let (whole, fraction) = rendered.split_once('.').unwrap_or((rendered.as_str(), "00"));
    let grouped = format!("{}.{fraction}", group_thousands(whole));
    if value < 0.0 && rendered != "0.00" {
        format!("-{grouped}")
    } else {
        grouped
    }
}

#[must_use]
pub fn format_currency(value: f64) -> String {
    let formatted = format_float(value);
    match formatted.strip_prefix('-') {
        Some(magnitude) => format!("-${magnitude}"),
        None => format!("${formatted}"),
    }
}

fn elision_line(elided: usize) -> String {
    if elided == 1 {
        "... 1 more row".to_string()
    } else {
        format!("... {elided} more rows")
    }
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Array-valued fields that hold one record per installment or per loan.
pub(crate) const ROW_FIELDS: [&str; 3] = ["rows", "loans", "emi_schedule"];

/// The object holding the figures: the envelope's `result`, or the value itself.
pub(crate) fn result_object(value: &Value) -> Option<&serde_json::Map<String, Value>> {
    value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value)
        .as_object()
}

/// First per-row array found in the result, e.g. schedule rows or loan lines.
pub(crate) fn row_array(value: &Value) -> Option<(&'static str, &[Value])> {
    let map = result_object(value)?;
    ROW_FIELDS.iter().find_map(|key| match map.get(*key) {
        Some(Value::Array(rows)) => Some((*key, rows.as_slice())),
        _ => None,
    })
}

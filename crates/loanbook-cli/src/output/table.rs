use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{result_object, ROW_FIELDS};

/// Format output as tables: scalar result fields as field/value pairs, then
/// one table per row array (schedule rows, loan lines).
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = result_object(value) {
                print_fields(result);
                print_row_arrays(result);
            }
            print_envelope_notes(map);
        }
        Value::Array(arr) => print_array_table(arr),
        _ => println!("{}", value),
    }
}

fn print_fields(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    let mut any = false;
    for (key, val) in map {
        if ROW_FIELDS.contains(&key.as_str()) {
            continue;
        }
        builder.push_record([key.as_str(), &format_value(val)]);
        any = true;
    }
    if any {
        println!("{}", Table::from(builder));
    }
}

fn print_row_arrays(map: &Map<String, Value>) {
    for key in ROW_FIELDS {
        if let Some(Value::Array(rows)) = map.get(key) {
            println!("\n{}:", key);
            print_array_table(rows);
        }
    }
}

fn print_envelope_notes(envelope: &Map<String, Value>) {
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<String> = first.keys().cloned().collect();
        let mut builder = Builder::default();
        builder.push_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(h.as_str()).map(format_value).unwrap_or_default())
                    .collect();
                builder.push_record(row);
            }
        }

        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}={}", k, format_value(v)))
            .collect::<Vec<_>>()
            .join(" "),
    }
}

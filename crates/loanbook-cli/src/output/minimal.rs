use serde_json::Value;

use super::result_object;

/// Headline figure for each command, in lookup order.
const HEADLINE_KEYS: [&str; 6] = [
    "emi",
    "arrears",
    "days_past_due",
    "par30_pct",
    "bucket",
    "total_outstanding",
];

/// Print the headline answer only, e.g. the EMI for a schedule or the DPD
/// for a classification. Falls back to the first field of the result.
pub fn print_minimal(value: &Value) {
    let Some(map) = result_object(value) else {
        println!("{}", format_minimal(value));
        return;
    };

    // `status` carries both arrears and DPD; arrears comes first
    for key in HEADLINE_KEYS {
        if let Some(val) = map.get(key) {
            if !val.is_null() {
                println!("{}", format_minimal(val));
                return;
            }
        }
    }

    if let Some((key, val)) = map.iter().next() {
        println!("{}: {}", key, format_minimal(val));
    }
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

//! Adapter for the free-form JSON blob loan records keep their schedule and
//! payment history in.
//!
//! Legacy blobs are loosely typed: dates in `dd/mm/yyyy` or ISO form, amounts
//! as numbers or numeric strings, and a few alternative key spellings.
//! Reading is lenient (malformed entries are dropped and counted); writing
//! always produces the canonical layout with `dd/mm/yyyy` dates and plain
//! numbers.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};

use crate::amortization::schedule::ScheduleRow;
use crate::dates;
use crate::risk::dpd::{LoanActivityInput, PaymentRecord};
use crate::types::Money;

pub const SCHEDULE_KEY: &str = "emi_schedule";
pub const PAYMENTS_KEY: &str = "payments";

const INSTALLMENT_KEYS: [&str; 3] = ["installment", "installment_number", "month"];
const DUE_DATE_KEYS: [&str; 2] = ["due_date", "date"];
const EMI_KEYS: [&str; 2] = ["emi", "emi_amount"];
const PRINCIPAL_KEYS: [&str; 2] = ["principal", "principal_component"];
const INTEREST_KEYS: [&str; 2] = ["interest", "interest_component"];
const BALANCE_KEYS: [&str; 2] = ["balance", "balance_after"];
const PAYMENT_DATE_KEYS: [&str; 2] = ["date", "paid_on"];
const AMOUNT_KEYS: [&str; 1] = ["amount"];

/// Typed view of a loan's ledger blob.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerExtract {
    pub schedule: Vec<ScheduleRow>,
    pub payments: Vec<PaymentRecord>,
    pub dropped_rows: usize,
    pub dropped_payments: usize,
}

impl LedgerExtract {
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.dropped_rows > 0 {
            warnings.push(format!(
                "{} malformed schedule row(s) dropped from ledger",
                self.dropped_rows
            ));
        }
        if self.dropped_payments > 0 {
            warnings.push(format!(
                "{} malformed payment(s) dropped from ledger",
                self.dropped_payments
            ));
        }
        warnings
    }

    pub fn into_activity(self, as_of: Option<NaiveDate>) -> LoanActivityInput {
        LoanActivityInput {
            schedule: self.schedule,
            payments: self.payments,
            as_of,
        }
    }
}

/// Read schedule and payments out of a ledger blob. Missing sections are
/// empty; a non-object blob is treated as empty.
pub fn read_ledger(blob: &Value) -> LedgerExtract {
    let (schedule, dropped_rows) = blob
        .get(SCHEDULE_KEY)
        .map(schedule_from_value)
        .unwrap_or_default();
    let (payments, dropped_payments) = blob
        .get(PAYMENTS_KEY)
        .map(payments_from_value)
        .unwrap_or_default();
    LedgerExtract {
        schedule,
        payments,
        dropped_rows,
        dropped_payments,
    }
}

/// Schedule rows from a JSON array, with the number of entries dropped.
/// Rows without an installment number take their 1-based position.
pub fn schedule_from_value(value: &Value) -> (Vec<ScheduleRow>, usize) {
    let Some(entries) = value.as_array() else {
        return (Vec::new(), usize::from(!value.is_null()));
    };
    let mut rows = Vec::with_capacity(entries.len());
    let mut dropped = 0;
    for (idx, entry) in entries.iter().enumerate() {
        match entry.as_object().and_then(|obj| row_from_object(obj, idx)) {
            Some(row) => rows.push(row),
            None => dropped += 1,
        }
    }
    rows.sort_by_key(|r| r.installment_number);
    (rows, dropped)
}

/// Payment records from a JSON array, with the number of entries dropped.
/// Entries with an unparseable date or a negative amount are dropped.
pub fn payments_from_value(value: &Value) -> (Vec<PaymentRecord>, usize) {
    let Some(entries) = value.as_array() else {
        return (Vec::new(), usize::from(!value.is_null()));
    };
    let mut payments = Vec::with_capacity(entries.len());
    let mut dropped = 0;
    for entry in entries {
        let record = entry.as_object().and_then(|obj| {
            let date = date_field(obj, &PAYMENT_DATE_KEYS)?;
            let amount = money_field(obj, &AMOUNT_KEYS)?;
            (amount >= Decimal::ZERO).then_some(PaymentRecord { date, amount })
        });
        match record {
            Some(p) => payments.push(p),
            None => dropped += 1,
        }
    }
    (payments, dropped)
}

/// Canonical ledger representation of a schedule.
pub fn schedule_to_value(rows: &[ScheduleRow]) -> Value {
    Value::Array(
        rows.iter()
            .map(|r| {
                json!({
                    "installment": r.installment_number,
                    "due_date": dates::format_ledger_date(r.due_date),
                    "emi": money_to_value(r.emi_amount),
                    "principal": money_to_value(r.principal_component),
                    "interest": money_to_value(r.interest_component),
                    "balance": money_to_value(r.balance_after),
                })
            })
            .collect(),
    )
}

/// Store a schedule into a ledger blob, keeping every other key intact.
pub fn write_schedule(blob: &mut Value, rows: &[ScheduleRow]) {
    if !blob.is_object() {
        *blob = Value::Object(Map::new());
    }
    if let Value::Object(map) = blob {
        map.insert(SCHEDULE_KEY.to_string(), schedule_to_value(rows));
    }
}

/// Money from a JSON number or numeric string.
pub fn money_from_value(value: &Value) -> Option<Money> {
    let raw = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    raw.parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_scientific(&raw).ok())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_from_object(obj: &Map<String, Value>, idx: usize) -> Option<ScheduleRow> {
    let installment_number = match first_present(obj, &INSTALLMENT_KEYS) {
        Some(v) => u32::try_from(v.as_u64()?).ok()?,
        None => u32::try_from(idx + 1).ok()?,
    };
    Some(ScheduleRow {
        installment_number,
        due_date: date_field(obj, &DUE_DATE_KEYS)?,
        emi_amount: money_field(obj, &EMI_KEYS)?,
        principal_component: money_field(obj, &PRINCIPAL_KEYS)?,
        interest_component: money_field(obj, &INTEREST_KEYS)?,
        balance_after: money_field(obj, &BALANCE_KEYS)?,
    })
}

fn first_present<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

fn date_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<NaiveDate> {
    first_present(obj, keys)?
        .as_str()
        .and_then(dates::parse_loan_date)
}

fn money_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<Money> {
    first_present(obj, keys).and_then(money_from_value)
}

fn money_to_value(amount: Money) -> Value {
    amount
        .to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amortization::schedule::build_schedule;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_money_from_value() {
        assert_eq!(money_from_value(&json!(3400.22)), Some(dec!(3400.22)));
        assert_eq!(money_from_value(&json!("  150.5 ")), Some(dec!(150.5)));
        assert_eq!(money_from_value(&json!(7)), Some(dec!(7)));
        assert_eq!(money_from_value(&json!("abc")), None);
        assert_eq!(money_from_value(&json!(null)), None);
    }

    #[test]
    fn test_read_legacy_blob() {
        let blob = json!({
            "branch": "North",
            "emi_schedule": [
                {"month": 2, "due_date": "2024-03-01", "emi": 100, "principal": 100,
                 "interest": 0, "balance": 0},
                {"month": 1, "due_date": "01/02/2024", "emi": "100.00", "principal": "100.00",
                 "interest": "0.00", "balance": "100.00"},
                {"month": 3, "due_date": "someday", "emi": 1, "principal": 1,
                 "interest": 0, "balance": 0}
            ],
            "payments": [
                {"date": "01/02/2024", "amount": 100},
                {"date": "2024-03-01", "amount": "40"},
                {"date": "", "amount": 5},
                {"date": "2024-03-02", "amount": -5},
                "garbage"
            ]
        });
        let extract = read_ledger(&blob);
        assert_eq!(extract.schedule.len(), 2);
        assert_eq!(extract.schedule[0].installment_number, 1);
        assert_eq!(extract.schedule[0].due_date, d(2024, 2, 1));
        assert_eq!(extract.schedule[1].emi_amount, dec!(100));
        assert_eq!(extract.dropped_rows, 1);
        assert_eq!(extract.payments.len(), 2);
        assert_eq!(extract.payments[1].amount, dec!(40));
        assert_eq!(extract.dropped_payments, 3);
        assert_eq!(extract.warnings().len(), 2);
    }

    #[test]
    fn test_missing_sections_are_empty() {
        let extract = read_ledger(&json!({"notes": "none"}));
        assert_eq!(extract, LedgerExtract::default());
        assert!(extract.warnings().is_empty());
        assert_eq!(read_ledger(&json!("not an object")), LedgerExtract::default());
    }

    #[test]
    fn test_non_array_section_counts_as_dropped() {
        let (rows, dropped) = schedule_from_value(&json!({"oops": true}));
        assert!(rows.is_empty());
        assert_eq!(dropped, 1);
    }

    #[test]
    fn test_rows_without_numbers_use_position() {
        let (rows, dropped) = schedule_from_value(&json!([
            {"date": "01/02/2024", "emi_amount": 10, "principal_component": 10,
             "interest_component": 0, "balance_after": 10},
            {"date": "01/03/2024", "emi_amount": 10, "principal_component": 10,
             "interest_component": 0, "balance_after": 0}
        ]));
        assert_eq!(dropped, 0);
        assert_eq!(rows[1].installment_number, 2);
    }

    #[test]
    fn test_write_then_read_schedule() {
        let schedule = build_schedule(dec!(10000), dec!(12), 3, d(2024, 1, 1));
        let mut blob = json!({"kyc": "done"});
        write_schedule(&mut blob, &schedule);
        assert_eq!(blob["kyc"], "done");
        assert_eq!(blob[SCHEDULE_KEY][0]["due_date"], "01/02/2024");
        assert_eq!(blob[SCHEDULE_KEY][0]["emi"], json!(3400.22));

        let extract = read_ledger(&blob);
        assert_eq!(extract.schedule, schedule);
    }

    #[test]
    fn test_write_schedule_replaces_non_object() {
        let mut blob = Value::Null;
        write_schedule(&mut blob, &[]);
        assert_eq!(blob, json!({"emi_schedule": []}));
    }

    #[test]
    fn test_into_activity_keeps_as_of() {
        let activity = LedgerExtract::default().into_activity(Some(d(2024, 5, 1)));
        assert_eq!(activity.as_of, Some(d(2024, 5, 1)));
        assert!(activity.schedule.is_empty());
    }
}

//! Days-past-due (DPD) for a single loan and its delinquency bucket.
//!
//! Only the earliest underpaid installment determines DPD. An installment
//! counts as covered by every payment dated on or after its due date.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use crate::amortization::schedule::ScheduleRow;
use crate::dates;
use crate::types::{with_metadata, ComputationOutput, Money};

/// Absorbs cent-level rounding when comparing payments to an installment.
pub const PAYMENT_TOLERANCE: Decimal = dec!(0.01);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Ordered, non-overlapping delinquency buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DpdBucket {
    #[serde(rename = "Current")]
    Current,
    #[serde(rename = "1-30")]
    Days1To30,
    #[serde(rename = "31-60")]
    Days31To60,
    #[serde(rename = "61-90")]
    Days61To90,
    #[serde(rename = "90+")]
    Days90Plus,
}

impl DpdBucket {
    pub const ALL: [DpdBucket; 5] = [
        DpdBucket::Current,
        DpdBucket::Days1To30,
        DpdBucket::Days31To60,
        DpdBucket::Days61To90,
        DpdBucket::Days90Plus,
    ];

    pub fn from_days(days_past_due: u32) -> Self {
        match days_past_due {
            0 => DpdBucket::Current,
            1..=30 => DpdBucket::Days1To30,
            31..=60 => DpdBucket::Days31To60,
            61..=90 => DpdBucket::Days61To90,
            _ => DpdBucket::Days90Plus,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DpdBucket::Current => "Current",
            DpdBucket::Days1To30 => "1-30",
            DpdBucket::Days31To60 => "31-60",
            DpdBucket::Days61To90 => "61-90",
            DpdBucket::Days90Plus => "90+",
        }
    }
}

impl fmt::Display for DpdBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A recorded repayment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    #[serde(with = "dates::ledger_format")]
    pub date: NaiveDate,
    pub amount: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DpdClassification {
    pub days_past_due: u32,
    pub bucket: DpdBucket,
}

impl DpdClassification {
    pub fn from_days(days_past_due: u32) -> Self {
        Self {
            days_past_due,
            bucket: DpdBucket::from_days(days_past_due),
        }
    }
}

/// A loan's schedule and payment history, as supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanActivityInput {
    pub schedule: Vec<ScheduleRow>,
    #[serde(default)]
    pub payments: Vec<PaymentRecord>,
    /// Defaults to today when absent or unparseable.
    #[serde(default, with = "dates::lenient_option")]
    pub as_of: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Payment totals per calendar date. Same-date payments sum together.
pub fn payments_by_date(payments: &[PaymentRecord]) -> BTreeMap<NaiveDate, Money> {
    let mut totals: BTreeMap<NaiveDate, Money> = BTreeMap::new();
    for p in payments {
        *totals.entry(p.date).or_insert(Decimal::ZERO) += p.amount;
    }
    totals
}

/// DPD and bucket for one loan as of `as_of`.
///
/// Walks installments in order and stops at the first one whose payments on
/// or after its due date fall short of its EMI. An empty schedule is current.
pub fn classify(
    schedule: &[ScheduleRow],
    payments: &[PaymentRecord],
    as_of: NaiveDate,
) -> DpdClassification {
    let totals = payments_by_date(payments);

    let mut rows: Vec<&ScheduleRow> = schedule.iter().collect();
    rows.sort_by_key(|r| r.installment_number);

    for row in rows {
        let paid_after: Money = totals.range(row.due_date..).map(|(_, amount)| *amount).sum();
        if paid_after + PAYMENT_TOLERANCE < row.emi_amount {
            return DpdClassification::from_days(dates::days_past(row.due_date, as_of));
        }
    }

    DpdClassification::from_days(0)
}

/// Classify one loan, defaulting the as-of date to today.
pub fn classify_loan(input: &LoanActivityInput) -> ComputationOutput<DpdClassification> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let as_of = resolve_as_of(input.as_of, &mut warnings);
    if input.schedule.is_empty() {
        warnings.push("Schedule is empty; loan treated as current".into());
    }

    let result = classify(&input.schedule, &input.payments, as_of);

    let elapsed = start.elapsed().as_micros() as u64;
    with_metadata(
        "Days past due from the earliest underpaid installment",
        &serde_json::json!({
            "as_of": dates::format_ledger_date(as_of),
            "installments": input.schedule.len(),
            "payments": input.payments.len(),
            "payment_tolerance": PAYMENT_TOLERANCE.to_string(),
        }),
        warnings,
        elapsed,
        result,
    )
}

/// The supplied as-of date, or today with a warning.
pub(crate) fn resolve_as_of(as_of: Option<NaiveDate>, warnings: &mut Vec<String>) -> NaiveDate {
    match as_of {
        Some(d) => d,
        None => {
            let today = dates::today();
            warnings.push(format!(
                "As-of date not supplied; using today ({})",
                dates::format_ledger_date(today)
            ));
            today
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amortization::schedule::build_schedule;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn pay(date: NaiveDate, amount: Decimal) -> PaymentRecord {
        PaymentRecord { date, amount }
    }

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(DpdBucket::from_days(0), DpdBucket::Current);
        assert_eq!(DpdBucket::from_days(1), DpdBucket::Days1To30);
        assert_eq!(DpdBucket::from_days(30), DpdBucket::Days1To30);
        assert_eq!(DpdBucket::from_days(31), DpdBucket::Days31To60);
        assert_eq!(DpdBucket::from_days(60), DpdBucket::Days31To60);
        assert_eq!(DpdBucket::from_days(61), DpdBucket::Days61To90);
        assert_eq!(DpdBucket::from_days(90), DpdBucket::Days61To90);
        assert_eq!(DpdBucket::from_days(91), DpdBucket::Days90Plus);
        assert_eq!(DpdBucket::from_days(u32::MAX), DpdBucket::Days90Plus);
    }

    #[test]
    fn test_bucket_labels_serialize() {
        assert_eq!(serde_json::to_value(DpdBucket::Days90Plus).unwrap(), "90+");
        assert_eq!(DpdBucket::Days31To60.to_string(), "31-60");
        let parsed: DpdBucket = serde_json::from_str("\"61-90\"").unwrap();
        assert_eq!(parsed, DpdBucket::Days61To90);
    }

    #[test]
    fn test_payments_grouped_by_date() {
        let totals = payments_by_date(&[
            pay(d(2024, 2, 1), dec!(100)),
            pay(d(2024, 2, 1), dec!(50)),
            pay(d(2024, 1, 15), dec!(10)),
        ]);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[&d(2024, 2, 1)], dec!(150));
    }

    #[test]
    fn test_empty_schedule_is_current() {
        let c = classify(&[], &[], d(2024, 6, 1));
        assert_eq!(c, DpdClassification::from_days(0));
        assert_eq!(c.bucket, DpdBucket::Current);
    }

    #[test]
    fn test_no_payments_dpd_from_first_due_date() {
        let schedule = build_schedule(dec!(1200), Decimal::ZERO, 12, d(2024, 1, 1));
        // First due 2024-02-01; 2024-03-02 is 30 days later
        let c = classify(&schedule, &[], d(2024, 3, 2));
        assert_eq!(c.days_past_due, 30);
        assert_eq!(c.bucket, DpdBucket::Days1To30);
    }

    #[test]
    fn test_unpaid_but_not_yet_due_is_zero() {
        let schedule = build_schedule(dec!(1200), Decimal::ZERO, 12, d(2024, 1, 1));
        let c = classify(&schedule, &[], d(2024, 2, 1));
        assert_eq!(c.days_past_due, 0);
        assert_eq!(c.bucket, DpdBucket::Current);
    }

    #[test]
    fn test_payments_on_due_dates_keep_loan_current() {
        let schedule = build_schedule(dec!(1200), Decimal::ZERO, 3, d(2024, 1, 1));
        let payments: Vec<PaymentRecord> = schedule
            .iter()
            .map(|r| pay(r.due_date, r.emi_amount))
            .collect();
        let c = classify(&schedule, &payments, d(2024, 12, 31));
        assert_eq!(c, DpdClassification::from_days(0));
    }

    #[test]
    fn test_shortfall_within_tolerance_is_paid() {
        let schedule = build_schedule(dec!(1200), Decimal::ZERO, 1, d(2024, 1, 1));
        let c = classify(&schedule, &[pay(d(2024, 2, 1), dec!(1199.99))], d(2024, 6, 1));
        assert_eq!(c.days_past_due, 0);
    }

    #[test]
    fn test_payment_before_due_date_does_not_count() {
        let schedule = build_schedule(dec!(1200), Decimal::ZERO, 1, d(2024, 1, 1));
        let c = classify(&schedule, &[pay(d(2024, 1, 31), dec!(1200))], d(2024, 2, 11));
        assert_eq!(c.days_past_due, 10);
    }

    #[test]
    fn test_only_first_underpaid_installment_counts() {
        let schedule = build_schedule(dec!(300), Decimal::ZERO, 3, d(2024, 1, 1));
        // 150 paid on 2024-03-01 covers installments 1 and 2; installment 3
        // (due 2024-04-01) sees nothing on or after its due date.
        let payments = vec![pay(d(2024, 3, 1), dec!(100)), pay(d(2024, 3, 1), dec!(50))];
        let c = classify(&schedule, &payments, d(2024, 5, 1));
        assert_eq!(c.days_past_due, 30);
    }

    #[test]
    fn test_schedule_order_is_by_installment_number() {
        let mut schedule = build_schedule(dec!(300), Decimal::ZERO, 3, d(2024, 1, 1));
        schedule.reverse();
        let c = classify(&schedule, &[], d(2024, 3, 1));
        // First installment due 2024-02-01 drives DPD: 29 days in leap February
        assert_eq!(c.days_past_due, 29);
    }

    #[test]
    fn test_classify_loan_defaults_as_of() {
        let out = classify_loan(&LoanActivityInput {
            schedule: Vec::new(),
            payments: Vec::new(),
            as_of: None,
        });
        assert_eq!(out.result.bucket, DpdBucket::Current);
        assert!(out.warnings.iter().any(|w| w.contains("As-of date")));
        assert!(out.warnings.iter().any(|w| w.contains("Schedule is empty")));
    }

    #[test]
    fn test_loan_activity_input_from_json() {
        let input: LoanActivityInput = serde_json::from_str(
            r#"{
                "schedule": [{
                    "installment_number": 1,
                    "due_date": "01/02/2024",
                    "emi_amount": "100.00",
                    "principal_component": "100.00",
                    "interest_component": "0.00",
                    "balance_after": "0.00"
                }],
                "payments": [{"date": "2024-02-05", "amount": 40}],
                "as_of": "2024-03-01"
            }"#,
        )
        .unwrap();
        let out = classify_loan(&input);
        assert!(out.warnings.is_empty());
        assert_eq!(out.result.days_past_due, 29);
        assert_eq!(out.result.bucket, DpdBucket::Days1To30);
    }
}

//! Repayment position of a single loan as of a date: what has fallen due,
//! what has been paid, arrears and the next installment.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::dpd::{self, classify, DpdBucket, LoanActivityInput, PaymentRecord};
use crate::amortization::schedule::ScheduleRow;
use crate::dates;
use crate::types::{round2, with_metadata, ComputationOutput, Money};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextInstallment {
    pub installment_number: u32,
    #[serde(with = "dates::ledger_format")]
    pub due_date: NaiveDate,
    pub emi_amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepaymentStatus {
    pub installments_total: u32,
    /// Installments with a due date on or before the as-of date.
    pub installments_due: u32,
    pub amount_due_to_date: Money,
    /// Payments dated on or before the as-of date.
    pub total_paid: Money,
    /// max(0, due - paid)
    pub arrears: Money,
    /// max(0, paid - due)
    pub advance: Money,
    /// Principal still scheduled to be repaid after the as-of date.
    pub scheduled_balance: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_installment: Option<NextInstallment>,
    pub days_past_due: u32,
    pub bucket: DpdBucket,
}

pub fn repayment_status(
    schedule: &[ScheduleRow],
    payments: &[PaymentRecord],
    as_of: NaiveDate,
) -> RepaymentStatus {
    let mut rows: Vec<&ScheduleRow> = schedule.iter().collect();
    rows.sort_by_key(|r| r.installment_number);

    let (due, upcoming): (Vec<&ScheduleRow>, Vec<&ScheduleRow>) =
        rows.into_iter().partition(|r| r.due_date <= as_of);

    let amount_due_to_date = round2(due.iter().map(|r| r.emi_amount).sum());
    let total_paid = round2(
        payments
            .iter()
            .filter(|p| p.date <= as_of)
            .map(|p| p.amount)
            .sum(),
    );
    let arrears = round2((amount_due_to_date - total_paid).max(Decimal::ZERO));
    let advance = round2((total_paid - amount_due_to_date).max(Decimal::ZERO));
    let scheduled_balance = round2(upcoming.iter().map(|r| r.principal_component).sum());

    let next_installment = upcoming.first().map(|r| NextInstallment {
        installment_number: r.installment_number,
        due_date: r.due_date,
        emi_amount: r.emi_amount,
    });

    let classification = classify(schedule, payments, as_of);

    RepaymentStatus {
        installments_total: u32::try_from(schedule.len()).unwrap_or(u32::MAX),
        installments_due: u32::try_from(due.len()).unwrap_or(u32::MAX),
        amount_due_to_date,
        total_paid,
        arrears,
        advance,
        scheduled_balance,
        next_installment,
        days_past_due: classification.days_past_due,
        bucket: classification.bucket,
    }
}

/// Repayment status with the as-of date defaulted to today.
pub fn assess_repayment(input: &LoanActivityInput) -> ComputationOutput<RepaymentStatus> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let as_of = dpd::resolve_as_of(input.as_of, &mut warnings);
    let ignored = input.payments.iter().filter(|p| p.date > as_of).count();
    if ignored > 0 {
        warnings.push(format!(
            "{ignored} payment(s) dated after {} excluded from total paid",
            dates::format_ledger_date(as_of)
        ));
    }

    let result = repayment_status(&input.schedule, &input.payments, as_of);
    if result.arrears > Decimal::ZERO && result.days_past_due == 0 {
        warnings.push(
            "Arrears outstanding although no installment is past due; check payment dating".into(),
        );
    }

    let elapsed = start.elapsed().as_micros() as u64;
    with_metadata(
        "Repayment position: scheduled dues vs payments to date, DPD from earliest shortfall",
        &serde_json::json!({
            "as_of": dates::format_ledger_date(as_of),
            "installments": input.schedule.len(),
            "payments": input.payments.len(),
        }),
        warnings,
        elapsed,
        result,
    )
}

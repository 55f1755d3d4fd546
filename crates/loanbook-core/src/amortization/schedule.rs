//! Reducing-balance EMI (equal monthly installment) schedules.
//!
//! Every monetary figure is rounded to cents after each arithmetic step, the
//! way a repayment ledger is kept. The level EMI is rounded once up front;
//! the final installment absorbs whatever rounding drift is left so the
//! balance closes at exactly zero.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::dates::{self, add_months_clamped};
use crate::types::{round2, with_metadata, ComputationOutput, Money, Percent, Rate};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const MONTHS_PER_YEAR: Decimal = dec!(12);
const PERCENT: Decimal = dec!(100);
/// Balances closer to zero than this are treated as fully repaid.
const BALANCE_NOISE_FLOOR: Decimal = dec!(0.01);
/// Forty years of monthly installments; longer schedules grow as they go.
const INITIAL_ROW_CAPACITY: u32 = 480;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The loan attributes a schedule is built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub principal: Money,
    /// Annual rate as quoted, e.g. 12.5 for 12.5% a year.
    pub annual_rate_pct: Percent,
    pub tenure_months: i64,
    /// First due date is one month after this date.
    #[serde(with = "dates::ledger_format")]
    pub start_date: NaiveDate,
}

impl LoanTerms {
    pub fn schedule(&self) -> Vec<ScheduleRow> {
        build_schedule(
            self.principal,
            self.annual_rate_pct,
            self.tenure_months,
            self.start_date,
        )
    }
}

/// One installment of an amortization schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub installment_number: u32,
    #[serde(with = "dates::ledger_format")]
    pub due_date: NaiveDate,
    pub emi_amount: Money,
    pub principal_component: Money,
    pub interest_component: Money,
    pub balance_after: Money,
}

/// Input for the schedule envelope. The start date is lenient: a missing or
/// unparseable date yields an empty schedule rather than an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleInput {
    pub principal: Money,
    pub annual_rate_pct: Percent,
    pub tenure_months: i64,
    #[serde(default, with = "dates::lenient_option")]
    pub start_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleOutput {
    pub rows: Vec<ScheduleRow>,
    /// Level installment before any final-row adjustment.
    pub emi: Money,
    pub monthly_rate: Rate,
    pub total_interest: Money,
    pub total_payable: Money,
    #[serde(with = "dates::lenient_option")]
    pub final_due_date: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Monthly rate from an annual percentage: (pct / 100) / 12.
pub fn monthly_rate(annual_rate_pct: Percent) -> Rate {
    annual_rate_pct.max(Decimal::ZERO) / PERCENT / MONTHS_PER_YEAR
}

/// Level EMI, rounded to cents.
///
/// emi = P * r * (1+r)^n / ((1+r)^n - 1), or P / n when r = 0. Zero when
/// `tenure_months` is zero. `None` when the installment does not fit in a
/// `Decimal`.
pub fn level_emi(principal: Money, rate: Rate, tenure_months: u32) -> Option<Money> {
    if tenure_months == 0 {
        return Some(round2(Decimal::ZERO));
    }
    let flat = || Some(round2(principal / Decimal::from(tenure_months)));
    if rate <= Decimal::ZERO {
        return flat();
    }

    // When (1+r)^n no longer fits, the annuity factor has converged to r.
    let periodic_interest = principal.checked_mul(rate)?;
    let perpetuity = Some(round2(periodic_interest));
    let Some(factor) = (Decimal::ONE + rate).checked_powu(u64::from(tenure_months)) else {
        return perpetuity;
    };
    let denominator = factor - Decimal::ONE;
    if denominator <= Decimal::ZERO {
        return flat();
    }

    periodic_interest
        .checked_mul(factor)
        .and_then(|numerator| numerator.checked_div(denominator))
        .map(round2)
        .or(perpetuity)
}

/// Build the installment schedule for a loan.
///
/// Negative rates are floored to zero. A non-positive principal or tenure
/// yields an empty schedule, as does a loan whose last due date falls past
/// the end of the supported calendar or whose amounts overflow `Decimal`.
/// Nothing here ever fails.
pub fn build_schedule(
    principal: Money,
    annual_rate_pct: Percent,
    tenure_months: i64,
    start_date: NaiveDate,
) -> Vec<ScheduleRow> {
    if tenure_months <= 0 || principal <= Decimal::ZERO {
        return Vec::new();
    }
    // Due dates only move forward, so the last one bounds them all.
    let Some(tenure) = representable_tenure(tenure_months, start_date) else {
        return Vec::new();
    };
    let principal = round2(principal);

    let rate = monthly_rate(annual_rate_pct);
    let Some(emi) = level_emi(principal, rate, tenure) else {
        return Vec::new();
    };

    let mut rows = Vec::with_capacity(tenure.min(INITIAL_ROW_CAPACITY) as usize);
    let mut balance = principal;
    let mut total_payable = Decimal::ZERO;

    for n in 1..=tenure {
        let Some(due_date) = add_months_clamped(start_date, n) else {
            return Vec::new();
        };
        let Some(interest) = balance.checked_mul(rate).map(round2) else {
            return Vec::new();
        };

        let mut principal_component = round2(emi - interest);
        let mut emi_amount = emi;

        // Final row (or any overshoot) takes exactly what is left
        if n == tenure || principal_component > balance {
            principal_component = balance;
            let Some(closing) = interest.checked_add(principal_component) else {
                return Vec::new();
            };
            emi_amount = round2(closing);
        }

        // Totals are summed later; they must fit too.
        let Some(running) = total_payable.checked_add(emi_amount) else {
            return Vec::new();
        };
        total_payable = running;

        balance = round2(balance - principal_component);
        if balance.abs() < BALANCE_NOISE_FLOOR {
            balance = round2(Decimal::ZERO);
        }

        rows.push(ScheduleRow {
            installment_number: n,
            due_date,
            emi_amount,
            principal_component,
            interest_component: interest,
            balance_after: balance,
        });
    }

    rows
}

/// The tenure as a month count, if its last due date exists in the calendar.
fn representable_tenure(tenure_months: i64, start_date: NaiveDate) -> Option<u32> {
    let tenure = u32::try_from(tenure_months).ok()?;
    add_months_clamped(start_date, tenure).map(|_| tenure)
}

/// Build a schedule and report totals and degenerate-input warnings.
pub fn generate_schedule(input: &ScheduleInput) -> ComputationOutput<ScheduleOutput> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.principal <= Decimal::ZERO {
        warnings.push(format!(
            "Principal {} is not positive; schedule is empty",
            input.principal
        ));
    }
    if input.annual_rate_pct < Decimal::ZERO {
        warnings.push(format!(
            "Negative annual rate {}% floored to 0%",
            input.annual_rate_pct
        ));
    }
    if input.tenure_months <= 0 {
        warnings.push(format!(
            "Tenure {} months is not positive; schedule is empty",
            input.tenure_months
        ));
    }

    let rate = monthly_rate(input.annual_rate_pct);
    let rows = match input.start_date {
        Some(start_date) => build_schedule(
            input.principal,
            input.annual_rate_pct,
            input.tenure_months,
            start_date,
        ),
        None => {
            warnings.push("Start date missing or unparseable; schedule is empty".into());
            Vec::new()
        }
    };

    let inputs_usable = input.principal > Decimal::ZERO && input.tenure_months > 0;
    if let (true, true, Some(start_date)) = (inputs_usable, rows.is_empty(), input.start_date) {
        if representable_tenure(input.tenure_months, start_date).is_none() {
            warnings.push(format!(
                "Tenure {} months runs past the last supported calendar date; schedule is empty",
                input.tenure_months
            ));
        } else {
            warnings.push("Amounts exceed decimal precision; schedule is empty".into());
        }
    }
    if inputs_usable && round2(input.principal).is_zero() {
        warnings.push(format!(
            "Principal {} rounds to zero cents; every installment is zero",
            input.principal
        ));
    }

    let emi = rows
        .first()
        .and_then(|_| {
            let tenure = u32::try_from(input.tenure_months).ok()?;
            level_emi(round2(input.principal), rate, tenure)
        })
        .unwrap_or_else(|| round2(Decimal::ZERO));

    if rate.is_zero() && !rows.is_empty() {
        warnings.push("Zero interest rate; EMI is principal divided by tenure".into());
    }
    if let Some(last) = rows.last() {
        let drift = last.emi_amount - emi;
        if rows.len() > 1 && !drift.is_zero() {
            warnings.push(format!(
                "Final installment adjusted by {drift} to close the balance at zero"
            ));
        }
    }

    let output = summarise(rows, emi, rate);

    let elapsed = start.elapsed().as_micros() as u64;
    with_metadata(
        "Reducing-balance EMI schedule, cents rounding per step, final-installment adjustment",
        &serde_json::json!({
            "principal": input.principal.to_string(),
            "annual_rate_pct": input.annual_rate_pct.to_string(),
            "monthly_rate": rate.to_string(),
            "tenure_months": input.tenure_months,
            "start_date": input.start_date.map(dates::format_ledger_date),
        }),
        warnings,
        elapsed,
        output,
    )
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn summarise(rows: Vec<ScheduleRow>, emi: Money, monthly_rate: Rate) -> ScheduleOutput {
    let total_interest = round2(rows.iter().map(|r| r.interest_component).sum());
    let total_payable = round2(rows.iter().map(|r| r.emi_amount).sum());
    let final_due_date = rows.last().map(|r| r.due_date);
    ScheduleOutput {
        rows,
        emi,
        monthly_rate,
        total_interest,
        total_payable,
        final_due_date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_monthly_rate() {
        assert_eq!(monthly_rate(dec!(12)), dec!(0.01));
        assert_eq!(monthly_rate(dec!(-5)), Decimal::ZERO);
    }

    #[test]
    fn test_level_emi_textbook() {
        // 10000 at 1%/month over 3 months: 103.0301 / 0.030301 = 3400.2211
        assert_eq!(level_emi(dec!(10000), dec!(0.01), 3), Some(dec!(3400.22)));
    }

    #[test]
    fn test_level_emi_zero_rate_is_flat() {
        assert_eq!(level_emi(dec!(1000), Decimal::ZERO, 3), Some(dec!(333.33)));
        assert_eq!(level_emi(dec!(1000), Decimal::ZERO, 0), Some(Decimal::ZERO));
    }

    #[test]
    fn test_three_month_schedule_rows() {
        let rows = build_schedule(dec!(10000), dec!(12), 3, d(2024, 1, 1));
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].interest_component, dec!(100.00));
        assert_eq!(rows[0].principal_component, dec!(3300.22));
        assert_eq!(rows[0].balance_after, dec!(6699.78));

        assert_eq!(rows[1].interest_component, dec!(67.00));
        assert_eq!(rows[1].principal_component, dec!(3333.22));
        assert_eq!(rows[1].balance_after, dec!(3366.56));

        // Final row absorbs the one-cent drift
        assert_eq!(rows[2].interest_component, dec!(33.67));
        assert_eq!(rows[2].principal_component, dec!(3366.56));
        assert_eq!(rows[2].emi_amount, dec!(3400.23));
        assert_eq!(rows[2].balance_after, Decimal::ZERO);
    }

    #[test]
    fn test_due_dates_clamp_to_month_end() {
        let rows = build_schedule(dec!(3000), dec!(10), 3, d(2024, 1, 31));
        assert_eq!(rows[0].due_date, d(2024, 2, 29));
        assert_eq!(rows[1].due_date, d(2024, 3, 31));
        assert_eq!(rows[2].due_date, d(2024, 4, 30));
    }

    #[test]
    fn test_degenerate_inputs_are_empty() {
        assert!(build_schedule(Decimal::ZERO, dec!(10), 12, d(2024, 1, 1)).is_empty());
        assert!(build_schedule(dec!(-500), dec!(10), 12, d(2024, 1, 1)).is_empty());
        assert!(build_schedule(dec!(500), dec!(10), 0, d(2024, 1, 1)).is_empty());
        assert!(build_schedule(dec!(500), dec!(10), -3, d(2024, 1, 1)).is_empty());
    }

    #[test]
    fn test_negative_rate_floored_to_flat() {
        let rows = build_schedule(dec!(1200), dec!(-4), 12, d(2024, 1, 1));
        assert_eq!(rows.len(), 12);
        assert!(rows.iter().all(|r| r.interest_component.is_zero()));
        assert!(rows.iter().all(|r| r.emi_amount == dec!(100)));
    }

    #[test]
    fn test_rows_carry_cents_scale() {
        let rows = build_schedule(dec!(1200), Decimal::ZERO, 12, d(2024, 1, 1));
        assert_eq!(rows[0].emi_amount.to_string(), "100.00");
        assert_eq!(rows[11].balance_after.to_string(), "0.00");
    }

    #[test]
    fn test_loan_terms_schedule_matches_free_function() {
        let terms = LoanTerms {
            principal: dec!(50000),
            annual_rate_pct: dec!(9.5),
            tenure_months: 24,
            start_date: d(2024, 6, 15),
        };
        assert_eq!(
            terms.schedule(),
            build_schedule(dec!(50000), dec!(9.5), 24, d(2024, 6, 15))
        );
    }

    #[test]
    fn test_generate_schedule_totals() {
        let out = generate_schedule(&ScheduleInput {
            principal: dec!(10000),
            annual_rate_pct: dec!(12),
            tenure_months: 3,
            start_date: Some(d(2024, 1, 1)),
        });
        let r = &out.result;
        assert_eq!(r.emi, dec!(3400.22));
        assert_eq!(r.total_interest, dec!(200.67));
        assert_eq!(r.total_payable, dec!(10200.67));
        assert_eq!(r.final_due_date, Some(d(2024, 4, 1)));
        assert!(out
            .warnings
            .iter()
            .any(|w| w.contains("Final installment adjusted by 0.01")));
    }

    #[test]
    fn test_generate_schedule_missing_start_date() {
        let out = generate_schedule(&ScheduleInput {
            principal: dec!(10000),
            annual_rate_pct: dec!(12),
            tenure_months: 3,
            start_date: None,
        });
        assert!(out.result.rows.is_empty());
        assert_eq!(out.result.emi, Decimal::ZERO);
        assert_eq!(out.result.final_due_date, None);
        assert!(out.warnings.iter().any(|w| w.contains("Start date")));
    }

    #[test]
    fn test_generate_schedule_warns_on_degenerate_terms() {
        let out = generate_schedule(&ScheduleInput {
            principal: dec!(-1),
            annual_rate_pct: dec!(-2),
            tenure_months: -3,
            start_date: Some(d(2024, 1, 1)),
        });
        assert!(out.result.rows.is_empty());
        assert_eq!(out.warnings.len(), 3);
    }

    #[test]
    fn test_schedule_row_serializes_ledger_date() {
        let rows = build_schedule(dec!(1200), Decimal::ZERO, 1, d(2024, 1, 31));
        let json = serde_json::to_value(&rows[0]).unwrap();
        assert_eq!(json["due_date"], "29/02/2024");
        assert_eq!(json["installment_number"], 1);
    }

    #[test]
    fn test_tenure_beyond_calendar_is_empty() {
        let start = d(2024, 1, 1);
        assert!(build_schedule(dec!(1000), dec!(12), i64::MAX, start).is_empty());
        assert!(build_schedule(dec!(1000), dec!(12), i64::from(u32::MAX) + 1, start).is_empty());
        // ~333,000 years: a valid month count whose last due date chrono cannot hold
        assert!(build_schedule(dec!(1000), dec!(12), 4_000_000, start).is_empty());

        let out = generate_schedule(&ScheduleInput {
            principal: dec!(1000),
            annual_rate_pct: dec!(12),
            tenure_months: i64::MAX,
            start_date: Some(start),
        });
        assert!(out.result.rows.is_empty());
        assert!(out.warnings.iter().any(|w| w.contains("calendar")));
    }

    #[test]
    fn test_decimal_overflow_is_empty() {
        let start = d(2024, 1, 1);
        // Monthly rate of 10 overflows principal * rate
        assert!(build_schedule(Decimal::MAX, dec!(12000), 12, start).is_empty());
        assert_eq!(level_emi(Decimal::MAX, dec!(10), 12), None);
        // Each installment fits, but their sum does not
        assert!(build_schedule(Decimal::MAX, dec!(12), 12, start).is_empty());

        let out = generate_schedule(&ScheduleInput {
            principal: Decimal::MAX,
            annual_rate_pct: dec!(12000),
            tenure_months: 12,
            start_date: Some(start),
        });
        assert!(out.result.rows.is_empty());
        assert_eq!(out.result.emi, Decimal::ZERO);
        assert!(out.warnings.iter().any(|w| w.contains("decimal precision")));
    }

    #[test]
    fn test_sub_cent_principal_keeps_every_row() {
        let rows = build_schedule(dec!(0.004), dec!(12), 3, d(2024, 1, 1));
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.emi_amount.is_zero()));
        assert_eq!(rows[2].balance_after, Decimal::ZERO);

        let out = generate_schedule(&ScheduleInput {
            principal: dec!(0.004),
            annual_rate_pct: dec!(12),
            tenure_months: 3,
            start_date: Some(d(2024, 1, 1)),
        });
        assert!(out.warnings.iter().any(|w| w.contains("rounds to zero cents")));
    }
}

//! Portfolio-at-risk (PAR) aggregation across many loans.
//!
//! Each loan is assessed independently (and in parallel when configured);
//! the per-loan results are then folded with a commutative tally so loan
//! order never changes the summary.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use super::config::AggregationConfig;
use super::dpd::{self, classify, DpdBucket, DpdClassification, PaymentRecord};
use super::parallel::{assess_each, tally};
use crate::amortization::schedule::ScheduleRow;
use crate::dates;
use crate::types::{round2, with_metadata, ComputationOutput, Money, Percent};

const PAR30_DAYS: u32 = 30;
const PAR90_DAYS: u32 = 90;
const PERCENT: Decimal = dec!(100);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One loan as seen by the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanExposure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loan_id: Option<String>,
    pub principal: Money,
    #[serde(default)]
    pub schedule: Vec<ScheduleRow>,
    #[serde(default)]
    pub payments: Vec<PaymentRecord>,
}

impl LoanExposure {
    /// Balance after the last scheduled installment, zero for an empty schedule.
    pub fn final_balance(&self) -> Money {
        self.schedule
            .iter()
            .max_by_key(|r| r.installment_number)
            .map(|r| r.balance_after)
            .unwrap_or(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioInput {
    pub loans: Vec<LoanExposure>,
    #[serde(default, with = "dates::lenient_option")]
    pub as_of: Option<NaiveDate>,
    #[serde(default)]
    pub config: AggregationConfig,
}

/// Per-loan line attached when `include_loan_detail` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRiskLine {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan_id: Option<String>,
    pub principal: Money,
    pub outstanding: Money,
    pub days_past_due: u32,
    pub bucket: DpdBucket,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioRiskSummary {
    pub loan_count: u32,
    pub total_disbursed: Money,
    pub total_outstanding: Money,
    /// Principal of loans more than 30 days past due.
    pub principal_at_risk_30: Money,
    /// Principal of loans more than 90 days past due.
    pub principal_at_risk_90: Money,
    pub par30_pct: Percent,
    pub par90_pct: Percent,
    /// Loan count per bucket; every bucket is present.
    pub dpd_bucket_counts: BTreeMap<DpdBucket, u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loans: Option<Vec<LoanRiskLine>>,
}

// ---------------------------------------------------------------------------
// Tally
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct LoanAssessment {
    principal: Money,
    outstanding: Money,
    classification: DpdClassification,
}

fn assess(loan: &LoanExposure, as_of: NaiveDate) -> LoanAssessment {
    LoanAssessment {
        principal: loan.principal,
        outstanding: loan.final_balance(),
        classification: classify(&loan.schedule, &loan.payments, as_of),
    }
}

/// Commutative accumulator: `add` and `merge` may run in any order.
#[derive(Debug, Clone, PartialEq)]
struct PortfolioTally {
    loan_count: u32,
    total_disbursed: Money,
    total_outstanding: Money,
    at_risk_30: Money,
    at_risk_90: Money,
    bucket_counts: BTreeMap<DpdBucket, u32>,
}

impl Default for PortfolioTally {
    fn default() -> Self {
        Self {
            loan_count: 0,
            total_disbursed: Decimal::ZERO,
            total_outstanding: Decimal::ZERO,
            at_risk_30: Decimal::ZERO,
            at_risk_90: Decimal::ZERO,
            bucket_counts: DpdBucket::ALL.iter().map(|b| (*b, 0)).collect(),
        }
    }
}

impl PortfolioTally {
    fn add(mut self, loan: &LoanAssessment) -> Self {
        let dpd = loan.classification.days_past_due;
        self.loan_count += 1;
        self.total_disbursed += loan.principal;
        self.total_outstanding += loan.outstanding;
        if dpd > PAR30_DAYS {
            self.at_risk_30 += loan.principal;
        }
        if dpd > PAR90_DAYS {
            self.at_risk_90 += loan.principal;
        }
        *self.bucket_counts.entry(loan.classification.bucket).or_insert(0) += 1;
        self
    }

    fn merge(mut self, other: Self) -> Self {
        self.loan_count += other.loan_count;
        self.total_disbursed += other.total_disbursed;
        self.total_outstanding += other.total_outstanding;
        self.at_risk_30 += other.at_risk_30;
        self.at_risk_90 += other.at_risk_90;
        for (bucket, count) in other.bucket_counts {
            *self.bucket_counts.entry(bucket).or_insert(0) += count;
        }
        self
    }

    fn into_summary(self, loans: Option<Vec<LoanRiskLine>>) -> PortfolioRiskSummary {
        PortfolioRiskSummary {
            loan_count: self.loan_count,
            total_disbursed: round2(self.total_disbursed),
            total_outstanding: round2(self.total_outstanding),
            principal_at_risk_30: round2(self.at_risk_30),
            principal_at_risk_90: round2(self.at_risk_90),
            par30_pct: par_pct(self.at_risk_30, self.total_disbursed),
            par90_pct: par_pct(self.at_risk_90, self.total_disbursed),
            dpd_bucket_counts: self.bucket_counts,
            loans,
        }
    }
}

/// 100 * at_risk / disbursed to cents, zero when nothing was disbursed.
fn par_pct(at_risk: Money, disbursed: Money) -> Percent {
    if disbursed <= Decimal::ZERO {
        return round2(Decimal::ZERO);
    }
    round2(PERCENT * at_risk / disbursed)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Aggregate portfolio risk with the default configuration.
pub fn aggregate(loans: &[LoanExposure], as_of: NaiveDate) -> PortfolioRiskSummary {
    aggregate_with_config(loans, as_of, &AggregationConfig::default())
}

pub fn aggregate_with_config(
    loans: &[LoanExposure],
    as_of: NaiveDate,
    config: &AggregationConfig,
) -> PortfolioRiskSummary {
    let assessments = assess_each(loans, config, |loan| assess(loan, as_of));

    let totals = tally(
        &assessments,
        config,
        PortfolioTally::default(),
        PortfolioTally::add,
        PortfolioTally::merge,
    );

    let detail = config.include_loan_detail.then(|| {
        loans
            .iter()
            .zip(&assessments)
            .map(|(loan, a)| LoanRiskLine {
                loan_id: loan.loan_id.clone(),
                principal: a.principal,
                outstanding: a.outstanding,
                days_past_due: a.classification.days_past_due,
                bucket: a.classification.bucket,
            })
            .collect()
    });

    totals.into_summary(detail)
}

/// Portfolio risk with the as-of date defaulted to today.
pub fn analyze_portfolio(input: &PortfolioInput) -> ComputationOutput<PortfolioRiskSummary> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let as_of = dpd::resolve_as_of(input.as_of, &mut warnings);
    if input.loans.is_empty() {
        warnings.push("Portfolio is empty; PAR reported as 0%".into());
    }
    let negative = input
        .loans
        .iter()
        .filter(|l| l.principal < Decimal::ZERO)
        .count();
    if negative > 0 {
        warnings.push(format!("{negative} loan(s) carry a negative principal"));
    }
    let unscheduled = input.loans.iter().filter(|l| l.schedule.is_empty()).count();
    if unscheduled > 0 {
        warnings.push(format!(
            "{unscheduled} loan(s) have no schedule; treated as current with zero outstanding"
        ));
    }

    let result = aggregate_with_config(&input.loans, as_of, &input.config);

    let elapsed = start.elapsed().as_micros() as u64;
    with_metadata(
        "Portfolio at risk: principal-weighted PAR30/PAR90 and DPD bucket counts",
        &serde_json::json!({
            "as_of": dates::format_ledger_date(as_of),
            "loans": input.loans.len(),
            "par30_threshold_days": PAR30_DAYS,
            "par90_threshold_days": PAR90_DAYS,
            "parallel": input.config.should_parallelize(input.loans.len()),
        }),
        warnings,
        elapsed,
        result,
    )
}

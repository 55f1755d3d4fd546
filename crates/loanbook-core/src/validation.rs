//! Optional business-rule gate in front of the scheduler.
//!
//! The scheduler itself accepts anything and falls back silently. Callers
//! that want nonsensical terms rejected run them through a [`LoanPolicy`]
//! first.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::amortization::schedule::{generate_schedule, ScheduleInput, ScheduleOutput};
use crate::error::LoanbookError;
use crate::types::{ComputationOutput, Money, Percent};
use crate::LoanbookResult;

/// Sanity limits for loan terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoanPolicy {
    /// Principal must be strictly above this.
    pub min_principal: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_principal: Option<Money>,
    pub min_tenure_months: i64,
    pub max_tenure_months: i64,
    pub max_annual_rate_pct: Percent,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            min_principal: Decimal::ZERO,
            max_principal: None,
            min_tenure_months: 1,
            max_tenure_months: 480,
            max_annual_rate_pct: dec!(100),
        }
    }
}

/// Check terms against a policy, naming the first field that fails.
pub fn validate_terms(input: &ScheduleInput, policy: &LoanPolicy) -> LoanbookResult<()> {
    if input.principal <= policy.min_principal {
        return Err(LoanbookError::InvalidInput {
            field: "principal".into(),
            reason: format!("Principal must be greater than {}", policy.min_principal),
        });
    }
    if let Some(max) = policy.max_principal {
        if input.principal > max {
            return Err(LoanbookError::InvalidInput {
                field: "principal".into(),
                reason: format!("Principal must not exceed {max}"),
            });
        }
    }
    if input.annual_rate_pct < Decimal::ZERO || input.annual_rate_pct > policy.max_annual_rate_pct
    {
        return Err(LoanbookError::InvalidInput {
            field: "annual_rate_pct".into(),
            reason: format!(
                "Annual rate must be between 0% and {}%",
                policy.max_annual_rate_pct
            ),
        });
    }
    if input.tenure_months < policy.min_tenure_months
        || input.tenure_months > policy.max_tenure_months
    {
        return Err(LoanbookError::InvalidInput {
            field: "tenure_months".into(),
            reason: format!(
                "Tenure must be between {} and {} months",
                policy.min_tenure_months, policy.max_tenure_months
            ),
        });
    }
    if input.start_date.is_none() {
        return Err(LoanbookError::DateError(
            "start_date is missing or not in dd/mm/yyyy or yyyy-mm-dd form".into(),
        ));
    }
    Ok(())
}

/// Validate against `policy`, then build the schedule.
pub fn generate_validated_schedule(
    input: &ScheduleInput,
    policy: &LoanPolicy,
) -> LoanbookResult<ComputationOutput<ScheduleOutput>> {
    validate_terms(input, policy)?;
    Ok(generate_schedule(input))
}

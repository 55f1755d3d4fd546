use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use loanbook_core::amortization::schedule::{self, ScheduleInput};
use loanbook_core::ledger;
use loanbook_core::validation::{self, LoanPolicy};

use crate::input;

/// Arguments for schedule generation
#[derive(Args)]
pub struct ScheduleArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Loan principal
    #[arg(long, allow_hyphen_values = true)]
    pub principal: Option<Decimal>,

    /// Annual interest rate in percent (12.5 = 12.5%)
    #[arg(long, alias = "rate")]
    pub annual_rate: Option<Decimal>,

    /// Tenure in months
    #[arg(long)]
    pub tenure: Option<i64>,

    /// Start date (dd/mm/yyyy or yyyy-mm-dd); first installment falls one month later
    #[arg(long)]
    pub start_date: Option<String>,

    /// Reject terms outside the loan policy instead of falling back silently
    #[arg(long)]
    pub strict: bool,

    /// Path to a JSON loan policy used with --strict
    #[arg(long, requires = "strict")]
    pub policy: Option<String>,

    /// Emit the schedule in ledger-blob layout (dd/mm/yyyy dates, plain numbers)
    #[arg(long)]
    pub ledger: bool,
}

pub fn run_schedule(args: ScheduleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let schedule_input: ScheduleInput = match input::load(args.input.as_deref())? {
        Some(parsed) => parsed,
        None => ScheduleInput {
            principal: args
                .principal
                .ok_or("--principal is required (or provide --input)")?,
            annual_rate_pct: args
                .annual_rate
                .ok_or("--annual-rate is required (or provide --input)")?,
            tenure_months: args.tenure.ok_or("--tenure is required (or provide --input)")?,
            start_date: Some(super::parse_date_flag(
                "start-date",
                args.start_date
                    .as_deref()
                    .ok_or("--start-date is required (or provide --input)")?,
            )?),
        },
    };

    let output = if args.strict {
        let policy: LoanPolicy = match args.policy {
            Some(ref path) => input::file::read_json(path)?,
            None => LoanPolicy::default(),
        };
        validation::generate_validated_schedule(&schedule_input, &policy)?
    } else {
        schedule::generate_schedule(&schedule_input)
    };

    tracing::info!(
        rows = output.result.rows.len(),
        warnings = output.warnings.len(),
        "schedule built"
    );
    for warning in &output.warnings {
        tracing::debug!(%warning, "schedule warning");
    }

    if args.ledger {
        let mut blob = Value::Object(serde_json::Map::new());
        ledger::write_schedule(&mut blob, &output.result.rows);
        return Ok(blob);
    }
    Ok(serde_json::to_value(output)?)
}

use clap::Args;
use serde_json::Value;

use loanbook_core::ledger;
use loanbook_core::risk::dpd::{self, LoanActivityInput};
use loanbook_core::risk::portfolio::{self, PortfolioInput};
use loanbook_core::risk::status;

use crate::input;

/// Arguments shared by single-loan commands
#[derive(Args)]
pub struct LoanActivityArgs {
    /// Path to JSON input file with `schedule`, `payments` and optional `as_of`
    #[arg(long, conflicts_with = "ledger")]
    pub input: Option<String>,

    /// Path to a loan's ledger blob (`emi_schedule` and `payments` keys)
    #[arg(long)]
    pub ledger: Option<String>,

    /// As-of date (dd/mm/yyyy or yyyy-mm-dd); defaults to today
    #[arg(long)]
    pub as_of: Option<String>,
}

/// Arguments for DPD classification
#[derive(Args)]
pub struct ClassifyArgs {
    #[command(flatten)]
    pub loan: LoanActivityArgs,
}

/// Arguments for repayment status
#[derive(Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub loan: LoanActivityArgs,
}

/// Arguments for portfolio aggregation
#[derive(Args)]
pub struct PortfolioArgs {
    /// Path to JSON input file with `loans`, optional `as_of` and `config`
    #[arg(long)]
    pub input: Option<String>,

    /// As-of date (dd/mm/yyyy or yyyy-mm-dd); defaults to today
    #[arg(long)]
    pub as_of: Option<String>,

    /// Include a line per loan in the result
    #[arg(long)]
    pub detail: bool,

    /// Minimum loan count before aggregation runs in parallel
    #[arg(long)]
    pub parallel_threshold: Option<usize>,
}

pub fn run_classify(args: ClassifyArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let (activity, ledger_warnings) = load_activity(args.loan)?;
    let mut result = dpd::classify_loan(&activity);
    result.warnings.extend(ledger_warnings);
    tracing::info!(
        days_past_due = result.result.days_past_due,
        bucket = %result.result.bucket,
        "loan classified"
    );
    Ok(serde_json::to_value(result)?)
}

pub fn run_status(args: StatusArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let (activity, ledger_warnings) = load_activity(args.loan)?;
    let mut result = status::assess_repayment(&activity);
    result.warnings.extend(ledger_warnings);
    tracing::info!(
        arrears = %result.result.arrears,
        days_past_due = result.result.days_past_due,
        "repayment status assessed"
    );
    Ok(serde_json::to_value(result)?)
}

pub fn run_portfolio(args: PortfolioArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut portfolio_input: PortfolioInput = input::load(args.input.as_deref())?
        .ok_or("--input <file.json> or stdin required for portfolio aggregation")?;

    if let Some(ref raw) = args.as_of {
        portfolio_input.as_of = Some(super::parse_date_flag("as-of", raw)?);
    }
    if args.detail {
        portfolio_input.config.include_loan_detail = true;
    }
    if let Some(threshold) = args.parallel_threshold {
        portfolio_input.config.parallel_threshold = threshold;
    }

    tracing::debug!(loans = portfolio_input.loans.len(), "aggregating portfolio");
    let result = portfolio::analyze_portfolio(&portfolio_input);
    tracing::info!(
        loans = result.result.loan_count,
        par30 = %result.result.par30_pct,
        par90 = %result.result.par90_pct,
        "portfolio aggregated"
    );
    Ok(serde_json::to_value(result)?)
}

/// Loan activity from a typed input, a ledger blob, or stdin, with the
/// `--as-of` flag taking precedence over any date in the input.
fn load_activity(
    args: LoanActivityArgs,
) -> Result<(LoanActivityInput, Vec<String>), Box<dyn std::error::Error>> {
    let as_of_flag = args
        .as_of
        .as_deref()
        .map(|raw| super::parse_date_flag("as-of", raw))
        .transpose()?;

    let (mut activity, warnings) = match args.ledger {
        Some(ref path) => {
            let blob = input::file::read_json_value(path)?;
            let extract = ledger::read_ledger(&blob);
            let warnings = extract.warnings();
            tracing::debug!(
                rows = extract.schedule.len(),
                payments = extract.payments.len(),
                dropped_rows = extract.dropped_rows,
                dropped_payments = extract.dropped_payments,
                "ledger blob read"
            );
            (extract.into_activity(None), warnings)
        }
        None => {
            let activity: LoanActivityInput = input::load(args.input.as_deref())?
                .ok_or("--input <file.json>, --ledger <blob.json> or stdin required")?;
            (activity, Vec::new())
        }
    };

    if as_of_flag.is_some() {
        activity.as_of = as_of_flag;
    }
    Ok((activity, warnings))
}

use napi::Result as NapiResult;
use napi_derive::napi;

use loanbook_core::amortization::schedule::ScheduleInput;
use loanbook_core::risk::dpd::LoanActivityInput;
use loanbook_core::risk::portfolio::PortfolioInput;
use loanbook_core::validation::LoanPolicy;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Amortization
// ---------------------------------------------------------------------------

#[napi]
pub fn generate_schedule(input_json: String) -> NapiResult<String> {
    let input: ScheduleInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = loanbook_core::amortization::schedule::generate_schedule(&input);
    serde_json::to_string(&output).map_err(to_napi_error)
}

/// Like `generate_schedule`, but rejects terms outside the policy (defaults
/// when `policy_json` is omitted).
#[napi]
pub fn generate_validated_schedule(
    input_json: String,
    policy_json: Option<String>,
) -> NapiResult<String> {
    let input: ScheduleInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let policy: LoanPolicy = match policy_json {
        Some(raw) => serde_json::from_str(&raw).map_err(to_napi_error)?,
        None => LoanPolicy::default(),
    };
    let output = loanbook_core::validation::generate_validated_schedule(&input, &policy)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Risk
// ---------------------------------------------------------------------------

#[napi]
pub fn classify_loan(input_json: String) -> NapiResult<String> {
    let input: LoanActivityInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = loanbook_core::risk::dpd::classify_loan(&input);
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn repayment_status(input_json: String) -> NapiResult<String> {
    let input: LoanActivityInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = loanbook_core::risk::status::assess_repayment(&input);
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn analyze_portfolio(input_json: String) -> NapiResult<String> {
    let input: PortfolioInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = loanbook_core::risk::portfolio::analyze_portfolio(&input);
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Ledger blobs
// ---------------------------------------------------------------------------

/// Classify a loan straight from its free-form ledger blob. Dropped ledger
/// entries are reported in `warnings`.
#[napi]
pub fn classify_ledger(blob_json: String, as_of: Option<String>) -> NapiResult<String> {
    let blob: serde_json::Value = serde_json::from_str(&blob_json).map_err(to_napi_error)?;
    let as_of = as_of
        .map(|raw| {
            loanbook_core::dates::parse_loan_date(&raw)
                .ok_or_else(|| to_napi_error(format!("as_of '{}' is not a date", raw)))
        })
        .transpose()?;
    let extract = loanbook_core::ledger::read_ledger(&blob);
    let ledger_warnings = extract.warnings();
    let mut output = loanbook_core::risk::dpd::classify_loan(&extract.into_activity(as_of));
    output.warnings.extend(ledger_warnings);
    serde_json::to_string(&output).map_err(to_napi_error)
}

pub mod risk;
pub mod schedule;

use chrono::NaiveDate;
use loanbook_core::dates::parse_loan_date;

/// Parse a date flag strictly: unlike JSON inputs, a bad flag is an error.
pub fn parse_date_flag(flag: &str, raw: &str) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    parse_loan_date(raw).ok_or_else(|| {
        format!("--{flag} '{raw}' is not a date (use dd/mm/yyyy or yyyy-mm-dd)").into()
    })
}

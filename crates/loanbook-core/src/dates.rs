//! Calendar helpers shared by the scheduler, the risk aggregator and the
//! ledger adapter.
//!
//! Loan records carry dates either as `dd/mm/yyyy` (the format persisted in
//! existing ledgers) or ISO `yyyy-mm-dd`. Parsing tries them in that order.

use chrono::{Months, NaiveDate};

/// Format used when a date is written back to a ledger.
pub const LEDGER_DATE_FORMAT: &str = "%d/%m/%Y";

/// ISO-8601 calendar date.
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

const ACCEPTED_FORMATS: [&str; 2] = [LEDGER_DATE_FORMAT, ISO_DATE_FORMAT];

/// Parse a loan date, returning `None` for anything unrecognised.
pub fn parse_loan_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    ACCEPTED_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

pub fn format_ledger_date(date: NaiveDate) -> String {
    date.format(LEDGER_DATE_FORMAT).to_string()
}

/// `start` advanced by `months` whole months, clamped to the last valid day
/// of the target month (31 Jan + 1 month = 28/29 Feb).
///
/// `None` only when the result falls outside chrono's representable range.
pub fn add_months_clamped(start: NaiveDate, months: u32) -> Option<NaiveDate> {
    start.checked_add_months(Months::new(months))
}

/// Today's calendar date in local time, the default "as of" date.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Whole days by which `as_of` is past `due`, zero when not past.
pub fn days_past(due: NaiveDate, as_of: NaiveDate) -> u32 {
    if as_of > due {
        u32::try_from((as_of - due).num_days()).unwrap_or(u32::MAX)
    } else {
        0
    }
}

/// Serde adapter: `dd/mm/yyyy` on output, either accepted format on input.
pub mod ledger_format {
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_ledger_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_loan_date(&raw).ok_or_else(|| {
            de::Error::custom(format!(
                "unrecognised date '{raw}' (expected dd/mm/yyyy or yyyy-mm-dd)"
            ))
        })
    }
}

/// Serde adapter for optional dates where an unparseable value means absent.
pub mod lenient_option {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(
        date: &Option<NaiveDate>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => serializer.serialize_str(&super::format_ledger_date(*d)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(match raw {
            Some(Value::String(s)) => super::parse_loan_date(&s),
            _ => None,
        })
    }
}

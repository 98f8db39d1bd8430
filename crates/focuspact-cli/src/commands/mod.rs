pub mod challenge;
pub mod config;
pub mod pact;
pub mod session;
pub mod stats;
pub mod user;

use chrono::{DateTime, NaiveDate, Utc};
use focuspact_core::Caller;

/// Resolve the acting user: `--user` flag first, then FOCUSPACT_USER,
/// otherwise anonymous.
pub fn caller(user: &Option<String>) -> Caller {
    match user
        .clone()
        .or_else(|| std::env::var("FOCUSPACT_USER").ok())
    {
        Some(id) if !id.is_empty() => Caller::User(id),
        _ => Caller::Anonymous,
    }
}

/// Parse an optional RFC3339 timestamp, defaulting to now.
pub fn parse_at(at: &Option<String>) -> Result<DateTime<Utc>, Box<dyn std::error::Error>> {
    match at {
        Some(s) => Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}

/// Parse an optional `YYYY-MM-DD` date, defaulting to today (UTC).
pub fn parse_date(date: &Option<String>) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    match date {
        Some(s) => Ok(NaiveDate::parse_from_str(s, "%Y-%m-%d")?),
        None => Ok(Utc::now().date_naive()),
    }
}

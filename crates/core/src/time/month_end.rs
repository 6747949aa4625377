use crate::domain::commit::CommitError;
use anyhow::Context;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1)?;
    Some((first_of_next - Duration::days(1)).day())
}

pub fn is_month_end(date: NaiveDate) -> bool {
    last_day_of_month(date.year(), date.month()) == Some(date.day())
}

/// Parses a `YYYY-MM-DD` effective date and requires it to be the last day of its month.
pub fn parse_effective_date(input: &str) -> Result<NaiveDate, CommitError> {
    let invalid = || CommitError::InvalidEffectiveDate {
        input: input.to_string(),
    };
    let date = NaiveDate::parse_from_str(input.trim(), DATE_FORMAT).map_err(|_| invalid())?;
    if !is_month_end(date) {
        return Err(invalid());
    }
    Ok(date)
}

/// Explicit argument wins; otherwise the latest month-end on or before today (UTC).
pub fn resolve_effective_date(
    effective_date_arg: Option<&str>,
    now_utc: DateTime<Utc>,
) -> anyhow::Result<NaiveDate> {
    if let Some(s) = effective_date_arg {
        return NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
            .with_context(|| format!("effective date is not YYYY-MM-DD: {s}"));
    }

    let today = now_utc.date_naive();
    if is_month_end(today) {
        return Ok(today);
    }
    // Day before the first of this month.
    let first = today
        .with_day(1)
        .context("failed to compute first day of month")?;
    Ok(first - Duration::days(1))
}

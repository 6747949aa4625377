//! Display formatting for forecast values. Non-finite numbers never reach the
//! numeric formatters; they render as [`UNAVAILABLE`].

use crate::domain::forecast::ForecastResult;
use serde::Serialize;

pub const UNAVAILABLE: &str = "unavailable";

/// Display strings for every metric of a forecast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedForecast {
    pub spi: String,
    pub cpi: String,
    pub eac: String,
    pub etc: String,
    pub vac: String,
    #[serde(rename = "tcpiBAC")]
    pub tcpi_bac: String,
    #[serde(rename = "tcpiEAC")]
    pub tcpi_eac: String,
}

impl FormattedForecast {
    pub fn from_result(result: &ForecastResult) -> Self {
        Self {
            spi: format_index(result.spi),
            cpi: format_index(result.cpi),
            eac: format_currency(result.eac),
            etc: format_currency(result.etc),
            vac: format_currency(result.vac),
            tcpi_bac: format_index(result.tcpi_bac),
            tcpi_eac: format_index(result.tcpi_eac),
        }
    }
}

/// Whole-dollar USD with thousands separators, e.g. `-$44,172`.
pub fn format_currency(value: f64) -> String {
    if !value.is_finite() {
        return UNAVAILABLE.to_string();
    }

    let rounded = value.abs().round();
    let digits = format!("{rounded:.0}");
    // Negative values keep their sign even when they round to zero.
    let sign = if value.is_sign_negative() { "-" } else { "" };
    format!("{sign}${}", group_thousands(&digits))
}

/// Performance index with two decimals, e.g. `0.96`.
pub fn format_index(value: f64) -> String {
    if !value.is_finite() {
        return UNAVAILABLE.to_string();
    }
    format!("{value:.2}")
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

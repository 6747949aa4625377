use crate::domain::forecast::{CostSnapshot, ForecastMethod, ForecastResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inputs and every derived metric, flattened in the exported document's field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitSnapshot {
    #[serde(deserialize_with = "crate::domain::f64_or_nan")]
    pub bac: f64,
    #[serde(deserialize_with = "crate::domain::f64_or_nan")]
    pub ev: f64,
    #[serde(deserialize_with = "crate::domain::f64_or_nan")]
    pub ac: f64,
    #[serde(deserialize_with = "crate::domain::f64_or_nan")]
    pub pv: f64,
    #[serde(rename = "futureCPI", deserialize_with = "crate::domain::f64_or_nan")]
    pub future_cpi: f64,
    #[serde(rename = "futureSPI", deserialize_with = "crate::domain::f64_or_nan")]
    pub future_spi: f64,
    #[serde(rename = "riskAdder", deserialize_with = "crate::domain::f64_or_nan")]
    pub risk_adder: f64,
    #[serde(deserialize_with = "crate::domain::f64_or_nan")]
    pub ub: f64,
    #[serde(deserialize_with = "crate::domain::f64_or_nan")]
    pub mr: f64,
    #[serde(rename = "includeAdders")]
    pub include_adders: bool,
    #[serde(
        rename = "manualEAC",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub manual_eac: Option<f64>,
    #[serde(deserialize_with = "crate::domain::f64_or_nan")]
    pub eac: f64,
    #[serde(deserialize_with = "crate::domain::f64_or_nan")]
    pub etc: f64,
    #[serde(deserialize_with = "crate::domain::f64_or_nan")]
    pub vac: f64,
    #[serde(rename = "tcpiBAC", deserialize_with = "crate::domain::f64_or_nan")]
    pub tcpi_bac: f64,
    #[serde(rename = "tcpiEAC", deserialize_with = "crate::domain::f64_or_nan")]
    pub tcpi_eac: f64,
    #[serde(deserialize_with = "crate::domain::f64_or_nan")]
    pub spi: f64,
    #[serde(deserialize_with = "crate::domain::f64_or_nan")]
    pub cpi: f64,
}

impl CommitSnapshot {
    pub fn capture(snapshot: &CostSnapshot, result: &ForecastResult) -> Self {
        Self {
            bac: snapshot.bac,
            ev: snapshot.ev,
            ac: snapshot.ac,
            pv: snapshot.pv,
            future_cpi: snapshot.future_cpi,
            future_spi: snapshot.future_spi,
            risk_adder: snapshot.risk_adder,
            ub: snapshot.undistributed_budget,
            mr: snapshot.management_reserve,
            include_adders: snapshot.include_adders,
            manual_eac: match snapshot.method {
                ForecastMethod::Manual => snapshot.manual_eac,
                _ => None,
            },
            eac: result.eac,
            etc: result.etc,
            vac: result.vac,
            tcpi_bac: result.tcpi_bac,
            tcpi_eac: result.tcpi_eac,
            spi: result.spi,
            cpi: result.cpi,
        }
    }

    pub fn result(&self) -> ForecastResult {
        ForecastResult {
            spi: self.spi,
            cpi: self.cpi,
            eac: self.eac,
            etc: self.etc,
            vac: self.vac,
            tcpi_bac: self.tcpi_bac,
            tcpi_eac: self.tcpi_eac,
        }
    }
}

/// One committed forecast. Append-only: never mutated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub version: String,
    #[serde(rename = "effective")]
    pub effective_date: NaiveDate,
    pub method: ForecastMethod,
    pub snapshot: CommitSnapshot,
    pub notes: String,
    pub committed_at: DateTime<Utc>,
    pub committed_by: String,
}

impl Commit {
    pub fn export_file_name(&self) -> String {
        export_file_name(&self.version)
    }
}

pub fn export_file_name(version: &str) -> String {
    format!("forecast-commit-{version}.json")
}

/// Millisecond timestamp of a `v<unix-millis>` version.
pub fn version_millis(version: &str) -> Option<i64> {
    version.strip_prefix('v')?.parse().ok()
}

/// Moves `commit.version` past every `v<millis>` version already in `existing`.
/// Must run under the log's append lock to be unique across writers.
pub fn assign_unique_version(commit: &mut Commit, existing: &[Commit]) -> anyhow::Result<()> {
    let Some(proposed) = version_millis(&commit.version) else {
        anyhow::ensure!(
            existing.iter().all(|c| c.version != commit.version),
            "version {} is already in the commit log",
            commit.version
        );
        return Ok(());
    };

    let last = existing
        .iter()
        .filter_map(|c| version_millis(&c.version))
        .max();
    if let Some(last) = last.filter(|&last| proposed <= last) {
        commit.version = format!("v{}", last + 1);
    }
    Ok(())
}

#[derive(Debug)]
pub enum CommitError {
    /// Effective date is not the last calendar day of its month. Nothing was written.
    InvalidEffectiveDate { input: String },
    /// An input that is stored verbatim is NaN or infinite. Nothing was written.
    NonFiniteInput { field: &'static str, value: f64 },
    /// The durable log or export could not be read or written.
    Storage(anyhow::Error),
}

impl fmt::Display for CommitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitError::InvalidEffectiveDate { input } => {
                write!(f, "effective date must be month-end (got {input})")
            }
            CommitError::NonFiniteInput { field, value } => {
                write!(f, "{field} must be a finite number (got {value})")
            }
            CommitError::Storage(err) => write!(f, "commit storage failed: {err:#}"),
        }
    }
}

impl std::error::Error for CommitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommitError::InvalidEffectiveDate { .. } | CommitError::NonFiniteInput { .. } => None,
            CommitError::Storage(err) => Some(&**err),
        }
    }
}

impl From<anyhow::Error> for CommitError {
    fn from(err: anyhow::Error) -> Self {
        CommitError::Storage(err)
    }
}

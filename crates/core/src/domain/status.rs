use crate::domain::forecast::ForecastResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexThresholds {
    pub ok: f64,
    pub warn: f64,
}

impl Default for IndexThresholds {
    fn default() -> Self {
        Self { ok: 1.0, warn: 0.9 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStatus {
    Ok,
    Warn,
    Bad,
    Unavailable,
}

impl IndexStatus {
    /// Classifies a performance index (SPI, CPI, TCPI) against thresholds.
    pub fn classify(value: f64, thresholds: IndexThresholds) -> Self {
        if !value.is_finite() {
            return IndexStatus::Unavailable;
        }
        if value >= thresholds.ok {
            IndexStatus::Ok
        } else if value >= thresholds.warn {
            IndexStatus::Warn
        } else {
            IndexStatus::Bad
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceStatus {
    Favorable,
    Unfavorable,
    Unavailable,
}

impl VarianceStatus {
    /// Negative cost or schedule variance is unfavorable; zero counts as favorable.
    pub fn classify(variance: f64) -> Self {
        if !variance.is_finite() {
            VarianceStatus::Unavailable
        } else if variance < 0.0 {
            VarianceStatus::Unfavorable
        } else {
            VarianceStatus::Favorable
        }
    }
}

/// Traffic-light view of a forecast's indices and variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ForecastStatus {
    pub spi: IndexStatus,
    pub cpi: IndexStatus,
    #[serde(rename = "tcpiBAC")]
    pub tcpi_bac: IndexStatus,
    #[serde(rename = "tcpiEAC")]
    pub tcpi_eac: IndexStatus,
    pub vac: VarianceStatus,
}

impl ForecastStatus {
    pub fn from_result(result: &ForecastResult, thresholds: IndexThresholds) -> Self {
        Self {
            spi: IndexStatus::classify(result.spi, thresholds),
            cpi: IndexStatus::classify(result.cpi, thresholds),
            tcpi_bac: IndexStatus::classify(result.tcpi_bac, thresholds),
            tcpi_eac: IndexStatus::classify(result.tcpi_eac, thresholds),
            vac: VarianceStatus::classify(result.vac),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_bands() {
        let t = IndexThresholds::default();
        assert_eq!(IndexStatus::classify(1.02, t), IndexStatus::Ok);
        assert_eq!(IndexStatus::classify(1.0, t), IndexStatus::Ok);
        assert_eq!(IndexStatus::classify(0.95, t), IndexStatus::Warn);
        assert_eq!(IndexStatus::classify(0.9, t), IndexStatus::Warn);
        assert_eq!(IndexStatus::classify(0.89, t), IndexStatus::Bad);
        assert_eq!(IndexStatus::classify(f64::NAN, t), IndexStatus::Unavailable);
        assert_eq!(IndexStatus::classify(f64::INFINITY, t), IndexStatus::Unavailable);
    }

    #[test]
    fn forecast_status_for_reference_project() {
        use crate::domain::forecast::{compute_forecast, CostSnapshot};

        let r = compute_forecast(&CostSnapshot {
            bac: 1_200_000.0,
            ev: 815_000.0,
            ac: 845_000.0,
            pv: 880_000.0,
            ..CostSnapshot::default()
        });
        let status = ForecastStatus::from_result(&r, IndexThresholds::default());
        assert_eq!(status.cpi, IndexStatus::Warn);
        assert_eq!(status.spi, IndexStatus::Warn);
        assert_eq!(status.tcpi_bac, IndexStatus::Ok);
        assert_eq!(status.vac, VarianceStatus::Unfavorable);
    }

    #[test]
    fn variance_sign() {
        assert_eq!(VarianceStatus::classify(-1.0), VarianceStatus::Unfavorable);
        assert_eq!(VarianceStatus::classify(0.0), VarianceStatus::Favorable);
        assert_eq!(
            VarianceStatus::classify(f64::NEG_INFINITY),
            VarianceStatus::Unavailable
        );
    }
}

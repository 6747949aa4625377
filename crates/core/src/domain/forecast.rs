use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    #[default]
    Cpi,
    SpiCpi,
    Hybrid,
    Manual,
}

impl ForecastMethod {
    pub fn label(self) -> &'static str {
        match self {
            ForecastMethod::Cpi => "CPI Method",
            ForecastMethod::SpiCpi => "SPI × CPI Method",
            ForecastMethod::Hybrid => "Hybrid (Weighted)",
            ForecastMethod::Manual => "Manual Entry",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ForecastMethod::Cpi => "cpi",
            ForecastMethod::SpiCpi => "spi_cpi",
            ForecastMethod::Hybrid => "hybrid",
            ForecastMethod::Manual => "manual",
        }
    }
}

impl fmt::Display for ForecastMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ForecastMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpi" => Ok(ForecastMethod::Cpi),
            "spi_cpi" | "spi-cpi" => Ok(ForecastMethod::SpiCpi),
            "hybrid" => Ok(ForecastMethod::Hybrid),
            "manual" => Ok(ForecastMethod::Manual),
            other => anyhow::bail!("unknown forecast method: {other}"),
        }
    }
}

/// Cumulative cost/schedule position plus the assumptions used to forecast from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostSnapshot {
    pub bac: f64,
    pub ev: f64,
    pub ac: f64,
    pub pv: f64,
    #[serde(rename = "futureCPI")]
    pub future_cpi: f64,
    #[serde(rename = "futureSPI")]
    pub future_spi: f64,
    /// Weight of the CPI-only estimate under [`ForecastMethod::Hybrid`].
    #[serde(rename = "hybridWeight")]
    pub hybrid_weight: f64,
    #[serde(rename = "riskAdder")]
    pub risk_adder: f64,
    #[serde(rename = "undistributedBudget", alias = "ub")]
    pub undistributed_budget: f64,
    /// Informational only; never added to EAC.
    #[serde(rename = "managementReserve", alias = "mr")]
    pub management_reserve: f64,
    pub method: ForecastMethod,
    #[serde(rename = "includeAdders")]
    pub include_adders: bool,
    /// Directly entered EAC, honoured only under [`ForecastMethod::Manual`].
    #[serde(rename = "manualEAC", skip_serializing_if = "Option::is_none")]
    pub manual_eac: Option<f64>,
}

impl Default for CostSnapshot {
    fn default() -> Self {
        Self {
            bac: 0.0,
            ev: 0.0,
            ac: 0.0,
            pv: 0.0,
            future_cpi: 1.0,
            future_spi: 1.0,
            hybrid_weight: 0.5,
            risk_adder: 0.0,
            undistributed_budget: 0.0,
            management_reserve: 0.0,
            method: ForecastMethod::Cpi,
            include_adders: false,
            manual_eac: None,
        }
    }
}

impl CostSnapshot {
    pub fn spi(&self) -> f64 {
        if self.pv > 0.0 {
            self.ev / self.pv
        } else {
            0.0
        }
    }

    pub fn cpi(&self) -> f64 {
        if self.ac > 0.0 {
            self.ev / self.ac
        } else {
            0.0
        }
    }

    /// Risk adder plus undistributed budget. Management reserve is excluded.
    pub fn adders(&self) -> f64 {
        self.risk_adder + self.undistributed_budget
    }

    /// First input that is NaN or infinite, in field order.
    pub fn non_finite_input(&self) -> Option<(&'static str, f64)> {
        [
            ("bac", self.bac),
            ("ev", self.ev),
            ("ac", self.ac),
            ("pv", self.pv),
            ("future_cpi", self.future_cpi),
            ("future_spi", self.future_spi),
            ("hybrid_weight", self.hybrid_weight),
            ("risk_adder", self.risk_adder),
            ("undistributed_budget", self.undistributed_budget),
            ("management_reserve", self.management_reserve),
            ("manual_eac", self.manual_eac.unwrap_or(0.0)),
        ]
        .into_iter()
        .find(|(_, v)| !v.is_finite())
    }

    fn remaining_budget(&self) -> f64 {
        self.bac - self.ev
    }

    fn eac_cpi(&self, cpi: f64) -> f64 {
        self.ac + self.remaining_budget() / (cpi * self.future_cpi)
    }

    fn eac_spi_cpi(&self, cpi: f64, spi: f64) -> f64 {
        self.ac + self.remaining_budget() / (cpi * spi * self.future_cpi * self.future_spi)
    }
}

/// Derived metrics. Any field may be non-finite when an index is zero or
/// `bac == ac`; callers must check `is_finite` before formatting or further math.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    #[serde(deserialize_with = "crate::domain::f64_or_nan")]
    pub spi: f64,
    #[serde(deserialize_with = "crate::domain::f64_or_nan")]
    pub cpi: f64,
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
}

impl ForecastResult {
    pub fn is_finite(&self) -> bool {
        [
            self.spi,
            self.cpi,
            self.eac,
            self.etc,
            self.vac,
            self.tcpi_bac,
            self.tcpi_eac,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

pub fn compute_forecast(snapshot: &CostSnapshot) -> ForecastResult {
    let spi = snapshot.spi();
    let cpi = snapshot.cpi();

    let base_eac = match snapshot.method {
        ForecastMethod::Cpi => snapshot.eac_cpi(cpi),
        ForecastMethod::SpiCpi => snapshot.eac_spi_cpi(cpi, spi),
        ForecastMethod::Hybrid => {
            let w = snapshot.hybrid_weight;
            snapshot.eac_cpi(cpi) * w + snapshot.eac_spi_cpi(cpi, spi) * (1.0 - w)
        }
        ForecastMethod::Manual => snapshot
            .manual_eac
            .unwrap_or_else(|| snapshot.eac_cpi(cpi)),
    };

    let eac = if snapshot.include_adders {
        base_eac + snapshot.adders()
    } else {
        base_eac
    };

    let remaining = snapshot.remaining_budget();

    ForecastResult {
        spi,
        cpi,
        eac,
        etc: eac - snapshot.ac,
        vac: snapshot.bac - eac,
        tcpi_bac: remaining / (snapshot.bac - snapshot.ac),
        tcpi_eac: remaining / (eac - snapshot.ac),
    }
}

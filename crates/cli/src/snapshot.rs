use anyhow::Context;
use evms_core::{CostSnapshot, ForecastMethod};
use std::path::PathBuf;

fn parse_method(s: &str) -> Result<ForecastMethod, String> {
    s.parse::<ForecastMethod>().map_err(|e| e.to_string())
}

/// Calculator inputs from flags, optionally layered over a JSON snapshot file.
#[derive(Debug, Clone, clap::Args)]
pub struct SnapshotArgs {
    /// JSON file holding a cost snapshot. Flags below override its fields.
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Budget at completion.
    #[arg(long)]
    pub bac: Option<f64>,

    /// Cumulative earned value.
    #[arg(long)]
    pub ev: Option<f64>,

    /// Cumulative actual cost.
    #[arg(long)]
    pub ac: Option<f64>,

    /// Cumulative planned value.
    #[arg(long)]
    pub pv: Option<f64>,

    #[arg(long)]
    pub future_cpi: Option<f64>,

    #[arg(long)]
    pub future_spi: Option<f64>,

    /// Weight of the CPI estimate for the hybrid method (0..=1).
    #[arg(long)]
    pub hybrid_weight: Option<f64>,

    #[arg(long)]
    pub risk_adder: Option<f64>,

    /// Undistributed budget.
    #[arg(long)]
    pub ub: Option<f64>,

    /// Management reserve (informational, never added to EAC).
    #[arg(long)]
    pub mr: Option<f64>,

    /// cpi | spi_cpi | hybrid | manual
    #[arg(long, value_parser = parse_method)]
    pub method: Option<ForecastMethod>,

    /// Add risk adder and undistributed budget to EAC.
    #[arg(long)]
    pub include_adders: bool,

    /// Directly entered EAC for the manual method.
    #[arg(long)]
    pub manual_eac: Option<f64>,
}

impl SnapshotArgs {
    pub fn load(&self) -> anyhow::Result<CostSnapshot> {
        let mut snapshot = match &self.input {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                serde_json::from_str::<CostSnapshot>(&text)
                    .with_context(|| format!("{} is not a valid cost snapshot", path.display()))?
            }
            None => CostSnapshot::default(),
        };

        let overrides = [
            (self.bac, &mut snapshot.bac),
            (self.ev, &mut snapshot.ev),
            (self.ac, &mut snapshot.ac),
            (self.pv, &mut snapshot.pv),
            (self.future_cpi, &mut snapshot.future_cpi),
            (self.future_spi, &mut snapshot.future_spi),
            (self.hybrid_weight, &mut snapshot.hybrid_weight),
            (self.risk_adder, &mut snapshot.risk_adder),
            (self.ub, &mut snapshot.undistributed_budget),
            (self.mr, &mut snapshot.management_reserve),
        ];
        for (value, field) in overrides {
            if let Some(v) = value {
                *field = v;
            }
        }

        if let Some(method) = self.method {
            snapshot.method = method;
        }
        if self.include_adders {
            snapshot.include_adders = true;
        }
        if self.manual_eac.is_some() {
            snapshot.manual_eac = self.manual_eac;
        }

        validate_inputs(&snapshot)?;
        Ok(snapshot)
    }
}

// Only rejects inputs that are never meaningful; zero indices stay allowed and
// surface as non-finite results.
fn validate_inputs(s: &CostSnapshot) -> anyhow::Result<()> {
    if let Some((name, value)) = s.non_finite_input() {
        anyhow::bail!("{name} must be a finite number (got {value})");
    }
    for (name, value) in [
        ("bac", s.bac),
        ("ev", s.ev),
        ("ac", s.ac),
        ("pv", s.pv),
        ("risk_adder", s.risk_adder),
        ("ub", s.undistributed_budget),
        ("mr", s.management_reserve),
    ] {
        anyhow::ensure!(
            value.is_finite() && value >= 0.0,
            "{name} must be a non-negative number (got {value})"
        );
    }
    anyhow::ensure!(
        (0.0..=1.0).contains(&s.hybrid_weight),
        "hybrid_weight must be between 0 and 1 (got {})",
        s.hybrid_weight
    );
    Ok(())
}

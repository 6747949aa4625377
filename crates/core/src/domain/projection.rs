use crate::domain::forecast::CostSnapshot;
use serde::Serialize;

pub const DEFAULT_PROJECTION_PERIODS: usize = 4;

/// One future reporting period on the linear completion path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectedPeriod {
    /// 1-based offset from the snapshot's status date.
    pub period: usize,
    pub pv: f64,
    pub ev: f64,
    pub ac: f64,
}

/// Spreads the remaining budget evenly over `periods` and burns actuals at the
/// assumed future CPI. Planned value is held flat at BAC.
pub fn project_performance(snapshot: &CostSnapshot, periods: usize) -> Vec<ProjectedPeriod> {
    if periods == 0 {
        return Vec::new();
    }

    let burn = (snapshot.bac - snapshot.ev) / periods as f64;
    (1..=periods)
        .map(|i| {
            let ev = snapshot.ev + burn * i as f64;
            ProjectedPeriod {
                period: i,
                pv: snapshot.bac,
                ev,
                ac: snapshot.ac + (ev - snapshot.ev) / snapshot.future_cpi,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> CostSnapshot {
        CostSnapshot {
            bac: 1_200_000.0,
            ev: 815_000.0,
            ac: 845_000.0,
            pv: 880_000.0,
            ..CostSnapshot::default()
        }
    }

    #[test]
    fn reaches_bac_in_final_period() {
        let points = project_performance(&snapshot(), DEFAULT_PROJECTION_PERIODS);
        assert_eq!(points.len(), 4);
        assert_eq!(points[0].period, 1);
        assert!((points[0].ev - 911_250.0).abs() < 1e-6);
        assert!((points[3].ev - 1_200_000.0).abs() < 1e-6);
        assert!(points.iter().all(|p| p.pv == 1_200_000.0));
    }

    #[test]
    fn actuals_follow_future_cpi() {
        let mut s = snapshot();
        s.future_cpi = 0.5;
        let points = project_performance(&s, 4);
        // Remaining 385k earned at half efficiency costs 770k.
        assert!((points[3].ac - (845_000.0 + 770_000.0)).abs() < 1e-6);
    }

    #[test]
    fn zero_periods_is_empty() {
        assert!(project_performance(&snapshot(), 0).is_empty());
    }
}

use crate::domain::forecast::{CostSnapshot, ForecastResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// A frozen capture of calculator inputs and outputs. Never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scenario {
    pub id: String,
    pub name: String,
    pub snapshot: CostSnapshot,
    pub result: ForecastResult,
    pub created_at: DateTime<Utc>,
}

impl Scenario {
    pub fn eac(&self) -> f64 {
        self.result.eac
    }

    /// Variance at completion against the captured BAC.
    pub fn vac(&self) -> f64 {
        self.snapshot.bac - self.result.eac
    }

    pub fn comparison_row(&self) -> ComparisonRow {
        ComparisonRow {
            id: self.id.clone(),
            name: self.name.clone(),
            method: self.snapshot.method.label(),
            eac: self.eac(),
            vac: self.vac(),
            future_cpi: self.snapshot.future_cpi,
            include_adders: self.snapshot.include_adders,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub id: String,
    pub name: String,
    pub method: &'static str,
    pub eac: f64,
    pub vac: f64,
    pub future_cpi: f64,
    pub include_adders: bool,
}

#[derive(Debug, Default)]
struct Inner {
    scenarios: Vec<Scenario>,
    last_id: i64,
}

/// Session-scoped, insertion-ordered scenario collection.
#[derive(Debug, Default)]
pub struct ScenarioStore {
    inner: Mutex<Inner>,
}

impl ScenarioStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic mid-push cannot leave the Vec half-written, so a poisoned guard is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn save(
        &self,
        name: Option<&str>,
        snapshot: CostSnapshot,
        result: ForecastResult,
    ) -> Scenario {
        self.save_at(name, snapshot, result, Utc::now())
    }

    pub fn save_at(
        &self,
        name: Option<&str>,
        snapshot: CostSnapshot,
        result: ForecastResult,
        now: DateTime<Utc>,
    ) -> Scenario {
        let mut inner = self.lock();

        // Microsecond timestamp, bumped past the previous id so ids stay strictly increasing.
        let id = now.timestamp_micros().max(inner.last_id + 1);
        inner.last_id = id;

        // Only an empty name is auto-named; anything else is kept as typed.
        let name = name
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Scenario {}", inner.scenarios.len() + 1));

        let scenario = Scenario {
            id: id.to_string(),
            name,
            snapshot,
            result,
            created_at: now,
        };
        inner.scenarios.push(scenario.clone());

        tracing::debug!(id = %scenario.id, name = %scenario.name, "scenario saved");
        scenario
    }

    /// Removes the scenario if present. Unknown ids are ignored.
    pub fn delete(&self, id: &str) {
        let mut inner = self.lock();
        let before = inner.scenarios.len();
        inner.scenarios.retain(|s| s.id != id);
        if inner.scenarios.len() == before {
            tracing::debug!(%id, "scenario delete: id not present");
        }
    }

    pub fn list(&self) -> Vec<Scenario> {
        self.lock().scenarios.clone()
    }

    pub fn get(&self, id: &str) -> Option<Scenario> {
        self.lock().scenarios.iter().find(|s| s.id == id).cloned()
    }

    pub fn compare<S: AsRef<str>>(&self, ids: &[S]) -> Vec<Scenario> {
        let wanted: HashSet<&str> = ids.iter().map(AsRef::as_ref).collect();
        self.list()
            .into_iter()
            .filter(|s| wanted.contains(s.id.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

use crate::domain::commit::{Commit, CommitError, CommitSnapshot};
use crate::domain::forecast::{CostSnapshot, ForecastResult};
use crate::storage::export::write_export;
use crate::storage::CommitLog;
use crate::time::month_end::is_month_end;
use chrono::{DateTime, NaiveDate, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Validates month-end effective dates and appends commits to the durable log.
pub struct CommitWriter {
    log: Arc<dyn CommitLog>,
    export_dir: Option<PathBuf>,
    last_version_ms: AtomicI64,
}

impl CommitWriter {
    pub fn new(log: Arc<dyn CommitLog>) -> Self {
        Self {
            log,
            export_dir: None,
            last_version_ms: AtomicI64::new(0),
        }
    }

    /// Also write each accepted commit to `<dir>/forecast-commit-<version>.json`.
    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = Some(dir.into());
        self
    }

    pub fn log(&self) -> &Arc<dyn CommitLog> {
        &self.log
    }

    pub async fn commit(
        &self,
        effective_date: NaiveDate,
        snapshot: &CostSnapshot,
        result: &ForecastResult,
        notes: &str,
        author: &str,
    ) -> Result<Commit, CommitError> {
        self.commit_at(effective_date, snapshot, result, notes, author, Utc::now())
            .await
    }

    pub async fn commit_at(
        &self,
        effective_date: NaiveDate,
        snapshot: &CostSnapshot,
        result: &ForecastResult,
        notes: &str,
        author: &str,
        now: DateTime<Utc>,
    ) -> Result<Commit, CommitError> {
        if !is_month_end(effective_date) {
            tracing::warn!(%effective_date, "commit rejected: effective date is not month-end");
            return Err(CommitError::InvalidEffectiveDate {
                input: effective_date.to_string(),
            });
        }

        // Inputs are stored as-is; only derived metrics may be non-finite.
        if let Some((field, value)) = snapshot.non_finite_input() {
            tracing::warn!(field, %value, "commit rejected: non-finite input");
            return Err(CommitError::NonFiniteInput { field, value });
        }

        let proposed = Commit {
            version: self.next_version(now),
            effective_date,
            method: snapshot.method,
            snapshot: CommitSnapshot::capture(snapshot, result),
            notes: notes.to_string(),
            committed_at: now,
            committed_by: author.to_string(),
        };

        let commit = self
            .log
            .append(proposed)
            .await
            .map_err(CommitError::Storage)?;

        if let Some(dir) = &self.export_dir {
            let path = write_export(dir, &commit).await.map_err(CommitError::Storage)?;
            tracing::debug!(path = %path.display(), "commit exported");
        }

        tracing::info!(
            version = %commit.version,
            %effective_date,
            method = %commit.method,
            backend = self.log.backend(),
            eac_finite = commit.snapshot.eac.is_finite(),
            "forecast committed"
        );
        Ok(commit)
    }

    pub async fn history(&self) -> anyhow::Result<Vec<Commit>> {
        self.log.read_all().await
    }

    // Proposed `v<unix-millis>`; the log moves it past existing versions on append.
    fn next_version(&self, now: DateTime<Utc>) -> String {
        let now_ms = now.timestamp_millis();
        let mut prev = self.last_version_ms.load(Ordering::Relaxed);
        loop {
            let next = now_ms.max(prev + 1);
            match self.last_version_ms.compare_exchange_weak(
                prev,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return format!("v{next}"),
                Err(actual) => prev = actual,
            }
        }
    }
}

use crate::domain::commit::{assign_unique_version, Commit};
use crate::domain::contract::parse_commit_log;
use crate::storage::{lock, CommitLog};
use anyhow::Context;
use serde_json::Value;

/// Commit log kept as one JSONB array per log key.
#[derive(Debug, Clone)]
pub struct PgCommitLog {
    pool: sqlx::PgPool,
    log_key: String,
}

impl PgCommitLog {
    pub fn new(pool: sqlx::PgPool, log_key: impl Into<String>) -> Self {
        Self {
            pool,
            log_key: log_key.into(),
        }
    }

    pub fn log_key(&self) -> &str {
        &self.log_key
    }
}

fn decode_records(records: Option<Value>) -> anyhow::Result<Vec<Commit>> {
    match records {
        Some(value) => parse_commit_log(&value.to_string()),
        None => Ok(Vec::new()),
    }
}

#[async_trait::async_trait]
impl CommitLog for PgCommitLog {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn read_all(&self) -> anyhow::Result<Vec<Commit>> {
        let records: Option<Value> =
            sqlx::query_scalar("SELECT records FROM forecast_commit_logs WHERE log_key = $1")
                .persistent(false)
                .bind(&self.log_key)
                .fetch_optional(&self.pool)
                .await
                .context("select forecast_commit_logs failed")?;
        decode_records(records)
    }

    async fn append(&self, mut commit: Commit) -> anyhow::Result<Commit> {
        let mut tx = self.pool.begin().await.context("begin transaction failed")?;

        lock::acquire_log_key_lock(&mut tx, &self.log_key).await?;

        let records: Option<Value> =
            sqlx::query_scalar("SELECT records FROM forecast_commit_logs WHERE log_key = $1")
                .persistent(false)
                .bind(&self.log_key)
                .fetch_optional(&mut *tx)
                .await
                .context("select forecast_commit_logs failed")?;

        let mut commits = decode_records(records)?;
        assign_unique_version(&mut commit, &commits)?;
        commits.push(commit.clone());
        let records = serde_json::to_value(&commits).context("commit log serialize failed")?;

        sqlx::query(
            "INSERT INTO forecast_commit_logs (log_key, records, updated_at) \
             VALUES ($1, $2, now()) \
             ON CONFLICT (log_key) DO UPDATE \
               SET records = EXCLUDED.records, updated_at = EXCLUDED.updated_at",
        )
        .persistent(false)
        .bind(&self.log_key)
        .bind(records)
        .execute(&mut *tx)
        .await
        .context("upsert forecast_commit_logs failed")?;

        tx.commit().await.context("commit transaction failed")?;

        tracing::debug!(
            log_key = %self.log_key,
            version = %commit.version,
            len = commits.len(),
            "commit log rewritten"
        );
        Ok(commit)
    }
}

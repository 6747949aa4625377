pub mod export;
pub mod file;
pub mod lock;
pub mod postgres;

use crate::config::Settings;
use crate::domain::commit::{assign_unique_version, Commit};
use anyhow::Context;
use std::sync::Arc;

/// Durable append-only list of commit documents.
///
/// Implementations rewrite the whole list on every append and must serialize
/// appends per storage key so concurrent writers cannot lose records.
#[async_trait::async_trait]
pub trait CommitLog: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn read_all(&self) -> anyhow::Result<Vec<Commit>>;

    /// Stores `commit` and returns it as written. Its version is moved past every
    /// version already in the log while the append lock is held.
    async fn append(&self, commit: Commit) -> anyhow::Result<Commit>;

    async fn find_version(&self, version: &str) -> anyhow::Result<Option<Commit>> {
        Ok(self
            .read_all()
            .await?
            .into_iter()
            .find(|c| c.version == version))
    }
}

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

/// Postgres when `DATABASE_URL` is set, otherwise the JSON file at `EVMS_COMMIT_LOG_PATH`.
pub async fn open_commit_log(settings: &Settings) -> anyhow::Result<Arc<dyn CommitLog>> {
    let Some(db_url) = settings.database_url.as_deref() else {
        tracing::info!(
            path = %settings.commit_log_path.display(),
            "using file commit log"
        );
        return Ok(Arc::new(file::FileCommitLog::new(&settings.commit_log_path)));
    };

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;
    migrate(&pool).await?;

    tracing::info!(log_key = %settings.commit_log_key, "using postgres commit log");
    Ok(Arc::new(postgres::PgCommitLog::new(
        pool,
        settings.commit_log_key.clone(),
    )))
}

/// Process-local log, used when no durable backend is configured and in tests.
#[derive(Debug, Default)]
pub struct MemoryCommitLog {
    records: tokio::sync::Mutex<Vec<Commit>>,
}

impl MemoryCommitLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CommitLog for MemoryCommitLog {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn read_all(&self) -> anyhow::Result<Vec<Commit>> {
        Ok(self.records.lock().await.clone())
    }

    async fn append(&self, mut commit: Commit) -> anyhow::Result<Commit> {
        let mut records = self.records.lock().await;
        assign_unique_version(&mut commit, &records)?;
        records.push(commit.clone());
        Ok(commit)
    }
}

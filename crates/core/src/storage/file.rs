use crate::domain::commit::{assign_unique_version, Commit};
use crate::domain::contract::parse_commit_log;
use crate::storage::CommitLog;
use anyhow::Context;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

type WriterLock = Arc<tokio::sync::Mutex<()>>;

// One writer lock per log file, shared by every FileCommitLog in the process.
static WRITER_LOCKS: OnceLock<Mutex<HashMap<PathBuf, WriterLock>>> = OnceLock::new();

fn writer_lock_for(path: &Path) -> WriterLock {
    let key = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let locks = WRITER_LOCKS.get_or_init(Default::default);
    let mut locks = locks.lock().unwrap_or_else(|e| e.into_inner());
    locks.entry(key).or_default().clone()
}

/// Commit log stored as a single JSON array file.
#[derive(Debug, Clone)]
pub struct FileCommitLog {
    path: PathBuf,
    writer: WriterLock,
}

impl FileCommitLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let writer = writer_lock_for(&path);
        Self { path, writer }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_unlocked(&self) -> anyhow::Result<Vec<Commit>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to read commit log {}", self.path.display())
                })
            }
        };
        parse_commit_log(&text)
            .with_context(|| format!("failed to parse commit log {}", self.path.display()))
    }

    async fn write_unlocked(&self, commits: &[Commit]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let bytes = serde_json::to_vec(commits).context("commit log serialize failed")?;

        // Write then rename so readers never observe a truncated list.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl CommitLog for FileCommitLog {
    fn backend(&self) -> &'static str {
        "file"
    }

    async fn read_all(&self) -> anyhow::Result<Vec<Commit>> {
        self.read_unlocked().await
    }

    async fn append(&self, mut commit: Commit) -> anyhow::Result<Commit> {
        let _guard = self.writer.lock().await;

        let mut commits = self.read_unlocked().await?;
        assign_unique_version(&mut commit, &commits)?;
        commits.push(commit.clone());
        self.write_unlocked(&commits).await?;

        tracing::debug!(
            path = %self.path.display(),
            version = %commit.version,
            len = commits.len(),
            "commit log rewritten"
        );
        Ok(commit)
    }
}

use crate::domain::commit::Commit;
use anyhow::Context;
use std::path::{Path, PathBuf};

/// Standalone JSON document for one commit, as downloaded by users.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportDocument {
    pub file_name: String,
    pub body: String,
}

impl ExportDocument {
    pub fn from_commit(commit: &Commit) -> anyhow::Result<Self> {
        let body =
            serde_json::to_string_pretty(commit).context("commit document serialize failed")?;
        Ok(Self {
            file_name: commit.export_file_name(),
            body,
        })
    }
}

pub async fn write_export(dir: &Path, commit: &Commit) -> anyhow::Result<PathBuf> {
    let doc = ExportDocument::from_commit(commit)?;

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create export dir {}", dir.display()))?;

    let path = dir.join(&doc.file_name);
    tokio::fs::write(&path, doc.body)
        .await
        .with_context(|| format!("failed to write export {}", path.display()))?;
    Ok(path)
}

use crate::domain::commit::Commit;
use crate::time::month_end::is_month_end;
use anyhow::{Context, ensure};

/// Checks the invariants a stored or imported commit document must satisfy.
pub fn validate_commit(commit: &Commit) -> anyhow::Result<()> {
    ensure!(!commit.version.trim().is_empty(), "version must be non-empty");
    // Versions end up in export file names.
    ensure!(
        commit
            .version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')),
        "version contains unsupported characters: {}",
        commit.version
    );
    ensure!(
        is_month_end(commit.effective_date),
        "effective date must be month-end (got {})",
        commit.effective_date
    );
    Ok(())
}

pub fn parse_commit_document(text: &str) -> anyhow::Result<Commit> {
    let commit = serde_json::from_str::<Commit>(text.trim())
        .context("commit document is not valid JSON for the commit schema")?;
    validate_commit(&commit)?;
    Ok(commit)
}

/// Parses the stored list record. A missing or blank record is an empty log.
pub fn parse_commit_log(text: &str) -> anyhow::Result<Vec<Commit>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let commits = serde_json::from_str::<Vec<Commit>>(trimmed)
        .context("commit log is not a JSON array of commit documents")?;
    for (idx, commit) in commits.iter().enumerate() {
        validate_commit(commit).with_context(|| format!("commit log entry {idx} is invalid"))?;
    }
    Ok(commits)
}

//! File-backed commit log: restart survival, concurrent appends through
//! independent handles, and error surfacing for a corrupt list record.

use chrono::{NaiveDate, TimeZone, Utc};
use evms_core::commit::CommitWriter;
use evms_core::domain::commit::CommitError;
use evms_core::storage::file::FileCommitLog;
use evms_core::storage::CommitLog;
use evms_core::{compute_forecast, CostSnapshot, ForecastMethod};
use std::sync::Arc;

fn snapshot() -> CostSnapshot {
    CostSnapshot {
        bac: 1_200_000.0,
        ev: 815_000.0,
        ac: 845_000.0,
        pv: 880_000.0,
        risk_adder: 50_000.0,
        undistributed_budget: 30_000.0,
        management_reserve: 20_000.0,
        method: ForecastMethod::Hybrid,
        include_adders: true,
        ..CostSnapshot::default()
    }
}

fn month_end(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn missing_file_reads_as_empty_log() {
    let dir = tempfile::tempdir().unwrap();
    let log = FileCommitLog::new(dir.path().join("nope.json"));
    assert!(log.read_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn commits_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("commits.json");
    let s = snapshot();
    let r = compute_forecast(&s);

    {
        let writer = CommitWriter::new(Arc::new(FileCommitLog::new(&path)));
        writer
            .commit(month_end(2024, 10, 31), &s, &r, "October", "pm")
            .await
            .unwrap();
        writer
            .commit(month_end(2024, 11, 30), &s, &r, "November", "pm")
            .await
            .unwrap();
    }

    let reopened = FileCommitLog::new(&path);
    let commits = reopened.read_all().await.unwrap();
    assert_eq!(commits.len(), 2);
    assert_eq!(commits[0].notes, "October");
    assert_eq!(commits[1].notes, "November");
    assert_eq!(commits[1].method, ForecastMethod::Hybrid);

    // The stored record is a plain JSON array of commit documents.
    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw.as_array().unwrap().len(), 2);
    assert_eq!(raw[0]["effective"], "2024-10-31");
}

#[tokio::test]
async fn rejected_commit_leaves_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("commits.json");
    let writer = CommitWriter::new(Arc::new(FileCommitLog::new(&path)));
    let s = snapshot();
    let r = compute_forecast(&s);

    let err = writer
        .commit(month_end(2024, 11, 15), &s, &r, "", "pm")
        .await
        .unwrap_err();
    assert!(matches!(err, CommitError::InvalidEffectiveDate { .. }));
    assert!(!path.exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_through_separate_handles_are_not_lost() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("commits.json");
    let s = snapshot();
    let r = compute_forecast(&s);

    let mut tasks = Vec::new();
    for i in 0..16 {
        let path = path.clone();
        let s = s.clone();
        tasks.push(tokio::spawn(async move {
            let writer = CommitWriter::new(Arc::new(FileCommitLog::new(path)));
            writer
                .commit(month_end(2024, 11, 30), &s, &r, &format!("run {i}"), "pm")
                .await
                .map(|_| ())
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let commits = FileCommitLog::new(&path).read_all().await.unwrap();
    assert_eq!(commits.len(), 16);

    let versions: std::collections::HashSet<_> = commits.iter().map(|c| &c.version).collect();
    assert_eq!(versions.len(), 16);
}

#[tokio::test]
async fn writers_in_the_same_millisecond_get_distinct_versions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("commits.json");
    let first = CommitWriter::new(Arc::new(FileCommitLog::new(&path)));
    let second = CommitWriter::new(Arc::new(FileCommitLog::new(&path)));
    let s = snapshot();
    let r = compute_forecast(&s);
    let now = Utc.with_ymd_and_hms(2024, 12, 2, 9, 30, 0).unwrap();

    let a = first
        .commit_at(month_end(2024, 11, 30), &s, &r, "first", "pm", now)
        .await
        .unwrap();
    let b = second
        .commit_at(month_end(2024, 11, 30), &s, &r, "second", "pm", now)
        .await
        .unwrap();
    assert_eq!(a.version, "v1733131800000");
    assert_eq!(b.version, "v1733131800001");

    let found = FileCommitLog::new(&path)
        .find_version(&b.version)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.notes, "second");
}

#[tokio::test]
async fn non_finite_input_leaves_the_log_readable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("commits.json");
    let writer = CommitWriter::new(Arc::new(FileCommitLog::new(&path)));
    let s = snapshot();
    let r = compute_forecast(&s);

    writer
        .commit(month_end(2024, 10, 31), &s, &r, "good", "pm")
        .await
        .unwrap();

    let mut bad = snapshot();
    bad.future_cpi = f64::NAN;
    let err = writer
        .commit(month_end(2024, 11, 30), &bad, &compute_forecast(&bad), "bad", "pm")
        .await
        .unwrap_err();
    assert!(matches!(err, CommitError::NonFiniteInput { .. }));

    assert_eq!(writer.history().await.unwrap().len(), 1);
    writer
        .commit(month_end(2024, 11, 30), &s, &r, "next", "pm")
        .await
        .unwrap();
    assert_eq!(writer.history().await.unwrap().len(), 2);
}

#[tokio::test]
async fn non_finite_metrics_are_stored_as_null() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("commits.json");
    let writer = CommitWriter::new(Arc::new(FileCommitLog::new(&path)));
    let mut s = snapshot();
    s.ev = 0.0;
    s.ac = 0.0;
    let r = compute_forecast(&s);
    assert!(!r.eac.is_finite());

    writer
        .commit(month_end(2024, 11, 30), &s, &r, "", "pm")
        .await
        .unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(raw[0]["snapshot"]["eac"].is_null());

    let commits = writer.history().await.unwrap();
    assert!(commits[0].snapshot.eac.is_nan());
}

#[tokio::test]
async fn corrupt_log_is_a_storage_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("commits.json");
    std::fs::write(&path, "{not json").unwrap();

    let writer = CommitWriter::new(Arc::new(FileCommitLog::new(&path)));
    let s = snapshot();
    let r = compute_forecast(&s);
    let err = writer
        .commit(month_end(2024, 11, 30), &s, &r, "", "pm")
        .await
        .unwrap_err();
    assert!(matches!(err, CommitError::Storage(_)));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{not json");
}

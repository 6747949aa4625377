use anyhow::Context;
use clap::{Parser, Subcommand};
use evms_core::commit::CommitWriter;
use evms_core::compute_forecast;
use evms_core::domain::commit::CommitError;
use evms_core::domain::projection::{project_performance, DEFAULT_PROJECTION_PERIODS};
use evms_core::domain::status::{ForecastStatus, IndexThresholds};
use evms_core::format::FormattedForecast;
use evms_core::storage::export::write_export;
use evms_core::storage::CommitLog;
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod snapshot;

use snapshot::SnapshotArgs;

#[derive(Debug, Parser)]
#[command(name = "evms", about = "Earned value forecasting and month-end commits")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compute SPI, CPI, EAC, ETC, VAC and TCPI for a snapshot.
    Compute {
        #[command(flatten)]
        snapshot: SnapshotArgs,

        /// Also print a linear completion projection.
        #[arg(long)]
        project: bool,

        /// Remaining reporting periods for the projection.
        #[arg(long, default_value_t = DEFAULT_PROJECTION_PERIODS)]
        periods: usize,
    },

    /// Commit a forecast to the durable log with a month-end effective date.
    Commit {
        #[command(flatten)]
        snapshot: SnapshotArgs,

        /// Month-end effective date (YYYY-MM-DD). Defaults to the latest month-end.
        #[arg(long)]
        effective_date: Option<String>,

        #[arg(long, default_value = "")]
        notes: String,

        /// Defaults to EVMS_COMMITTED_BY.
        #[arg(long)]
        author: Option<String>,

        /// Validate and print the forecast without writing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Print every committed forecast.
    History,

    /// Write the export document for an existing commit.
    Export {
        /// Commit version, e.g. v1733131800000.
        #[arg(long)]
        version: String,

        /// Output directory. Defaults to EVMS_EXPORT_DIR.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = evms_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let result = run(args.command, &settings).await;
    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
    }
    result
}

async fn run(command: Command, settings: &evms_core::config::Settings) -> anyhow::Result<()> {
    match command {
        Command::Compute {
            snapshot,
            project,
            periods,
        } => {
            let snapshot = snapshot.load()?;
            let result = compute_forecast(&snapshot);

            let mut out = json!({
                "method": snapshot.method.label(),
                "result": result,
                "formatted": FormattedForecast::from_result(&result),
                "status": ForecastStatus::from_result(&result, IndexThresholds::default()),
            });
            if project {
                out["projection"] = serde_json::to_value(project_performance(&snapshot, periods))?;
            }
            print_json(&out)
        }
        Command::Commit {
            snapshot,
            effective_date,
            notes,
            author,
            dry_run,
        } => {
            let snapshot = snapshot.load()?;
            let result = compute_forecast(&snapshot);
            let effective_date = evms_core::time::month_end::resolve_effective_date(
                effective_date.as_deref(),
                chrono::Utc::now(),
            )?;

            if dry_run {
                anyhow::ensure!(
                    evms_core::time::month_end::is_month_end(effective_date),
                    CommitError::InvalidEffectiveDate {
                        input: effective_date.to_string(),
                    }
                );
                tracing::info!(
                    %effective_date,
                    dry_run = true,
                    eac = result.eac,
                    "commit validated (dry-run)"
                );
                return print_json(&json!({
                    "effective": effective_date,
                    "method": snapshot.method,
                    "result": result,
                    "formatted": FormattedForecast::from_result(&result),
                }));
            }

            let log = evms_core::storage::open_commit_log(settings).await?;
            let mut writer = CommitWriter::new(log);
            if let Some(dir) = &settings.export_dir {
                writer = writer.with_export_dir(dir);
            }

            let author = author.unwrap_or_else(|| settings.committed_by.clone());
            let commit = writer
                .commit(effective_date, &snapshot, &result, &notes, &author)
                .await?;
            print_json(&commit)
        }
        Command::History => {
            let log = evms_core::storage::open_commit_log(settings).await?;
            let commits = log.read_all().await?;
            tracing::info!(count = commits.len(), backend = log.backend(), "commit history");
            print_json(&commits)
        }
        Command::Export { version, out } => {
            let dir = match out {
                Some(dir) => dir,
                None => settings.require_export_dir()?.to_path_buf(),
            };
            let log = evms_core::storage::open_commit_log(settings).await?;
            let commit = log
                .find_version(&version)
                .await?
                .with_context(|| format!("no commit with version {version}"))?;
            let path = write_export(&dir, &commit).await?;
            tracing::info!(%version, path = %path.display(), "commit exported");
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialize output failed")?;
    println!("{text}");
    Ok(())
}

fn init_sentry(settings: &evms_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commit_subcommand() {
        let args = Args::try_parse_from([
            "evms",
            "commit",
            "--bac",
            "1200000",
            "--effective-date",
            "2024-11-30",
            "--dry-run",
        ])
        .unwrap();
        match args.command {
            Command::Commit {
                effective_date,
                dry_run,
                notes,
                ..
            } => {
                assert_eq!(effective_date.as_deref(), Some("2024-11-30"));
                assert!(dry_run);
                assert_eq!(notes, "");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn projection_defaults_to_four_periods() {
        let args = Args::try_parse_from(["evms", "compute", "--project"]).unwrap();
        match args.command {
            Command::Compute {
                project, periods, ..
            } => {
                assert!(project);
                assert_eq!(periods, 4);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Args::try_parse_from(["evms", "forecast"]).is_err());
    }
}

pub mod commit;
pub mod domain;
pub mod format;
pub mod storage;
pub mod time;

pub use domain::forecast::{compute_forecast, CostSnapshot, ForecastMethod, ForecastResult};

pub mod config {
    use anyhow::Context;
    use std::path::PathBuf;

    const DEFAULT_COMMIT_LOG_PATH: &str = "forecast_commits.json";
    const DEFAULT_COMMIT_LOG_KEY: &str = "rocktop_commits";
    const DEFAULT_COMMITTED_BY: &str = "Current User";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub commit_log_path: PathBuf,
        pub commit_log_key: String,
        pub export_dir: Option<PathBuf>,
        pub committed_by: String,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: non_empty_var("DATABASE_URL"),
                sentry_dsn: non_empty_var("SENTRY_DSN"),
                commit_log_path: non_empty_var("EVMS_COMMIT_LOG_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_COMMIT_LOG_PATH)),
                commit_log_key: non_empty_var("EVMS_COMMIT_LOG_KEY")
                    .unwrap_or_else(|| DEFAULT_COMMIT_LOG_KEY.to_string()),
                export_dir: non_empty_var("EVMS_EXPORT_DIR").map(PathBuf::from),
                committed_by: non_empty_var("EVMS_COMMITTED_BY")
                    .unwrap_or_else(|| DEFAULT_COMMITTED_BY.to_string()),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_export_dir(&self) -> anyhow::Result<&std::path::Path> {
            self.export_dir
                .as_deref()
                .context("EVMS_EXPORT_DIR is required")
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

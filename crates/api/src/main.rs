use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use evms_core::commit::CommitWriter;
use evms_core::domain::commit::{Commit, CommitError};
use evms_core::domain::projection::{
    project_performance, ProjectedPeriod, DEFAULT_PROJECTION_PERIODS,
};
use evms_core::domain::scenario::{ComparisonRow, Scenario, ScenarioStore};
use evms_core::domain::status::{ForecastStatus, IndexThresholds};
use evms_core::format::FormattedForecast;
use evms_core::storage::export::ExportDocument;
use evms_core::storage::CommitLog;
use evms_core::time::month_end::parse_effective_date;
use evms_core::{compute_forecast, CostSnapshot, ForecastResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = evms_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let writer = match evms_core::storage::open_commit_log(&settings).await {
        Ok(log) => {
            let mut writer = CommitWriter::new(log);
            if let Some(dir) = &settings.export_dir {
                writer = writer.with_export_dir(dir);
            }
            Some(Arc::new(writer))
        }
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "commit log unavailable; starting API in degraded mode");
            None
        }
    };

    let state = AppState {
        scenarios: Arc::new(ScenarioStore::new()),
        writer,
        committed_by: settings.committed_by.clone(),
    };

    let app = router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/forecast", post(post_forecast))
        .route("/forecast/projection", post(post_projection))
        .route("/scenarios", get(list_scenarios).post(save_scenario))
        .route("/scenarios/compare", get(compare_scenarios))
        .route("/scenarios/:id", delete(delete_scenario))
        .route("/commits", get(list_commits).post(create_commit))
        .route("/commits/:version/export", get(export_commit))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    scenarios: Arc<ScenarioStore>,
    writer: Option<Arc<CommitWriter>>,
    committed_by: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

fn internal_error(err: anyhow::Error) -> ApiError {
    sentry_anyhow::capture_anyhow(&err);
    tracing::error!(error = %err, "request failed");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}

fn commit_error(err: CommitError) -> ApiError {
    match err {
        CommitError::InvalidEffectiveDate { .. } | CommitError::NonFiniteInput { .. } => {
            api_error(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
        }
        CommitError::Storage(e) => internal_error(e),
    }
}

fn require_writer(state: &AppState) -> Result<&Arc<CommitWriter>, ApiError> {
    state
        .writer
        .as_ref()
        .ok_or_else(|| api_error(StatusCode::SERVICE_UNAVAILABLE, "commit log unavailable"))
}

#[derive(Debug, Serialize)]
struct ForecastView {
    method: &'static str,
    result: ForecastResult,
    formatted: FormattedForecast,
    status: ForecastStatus,
}

impl ForecastView {
    fn new(snapshot: &CostSnapshot, result: ForecastResult) -> Self {
        Self {
            method: snapshot.method.label(),
            formatted: FormattedForecast::from_result(&result),
            status: ForecastStatus::from_result(&result, IndexThresholds::default()),
            result,
        }
    }
}

async fn post_forecast(Json(snapshot): Json<CostSnapshot>) -> Json<ForecastView> {
    let result = compute_forecast(&snapshot);
    Json(ForecastView::new(&snapshot, result))
}

#[derive(Debug, Deserialize)]
struct ProjectionRequest {
    snapshot: CostSnapshot,
    periods: Option<usize>,
}

async fn post_projection(
    Json(req): Json<ProjectionRequest>,
) -> Result<Json<Vec<ProjectedPeriod>>, ApiError> {
    let periods = req.periods.unwrap_or(DEFAULT_PROJECTION_PERIODS);
    if !(1..=120).contains(&periods) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("periods must be 1..=120 (got {periods})"),
        ));
    }
    Ok(Json(project_performance(&req.snapshot, periods)))
}

async fn list_scenarios(State(state): State<AppState>) -> Json<Vec<Scenario>> {
    Json(state.scenarios.list())
}

#[derive(Debug, Deserialize)]
struct SaveScenarioRequest {
    name: Option<String>,
    snapshot: CostSnapshot,
}

async fn save_scenario(
    State(state): State<AppState>,
    Json(req): Json<SaveScenarioRequest>,
) -> (StatusCode, Json<Scenario>) {
    let result = compute_forecast(&req.snapshot);
    let scenario = state
        .scenarios
        .save(req.name.as_deref(), req.snapshot, result);
    (StatusCode::CREATED, Json(scenario))
}

async fn delete_scenario(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    state.scenarios.delete(&id);
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
struct CompareQuery {
    #[serde(default)]
    ids: String,
}

fn split_ids(ids: &str) -> Vec<&str> {
    ids.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

async fn compare_scenarios(
    State(state): State<AppState>,
    Query(query): Query<CompareQuery>,
) -> Json<Vec<ComparisonRow>> {
    let ids = split_ids(&query.ids);
    let rows = state
        .scenarios
        .compare(&ids)
        .iter()
        .map(Scenario::comparison_row)
        .collect();
    Json(rows)
}

#[derive(Debug, Deserialize)]
struct CommitRequest {
    effective_date: String,
    snapshot: CostSnapshot,
    #[serde(default)]
    notes: String,
    committed_by: Option<String>,
}

async fn create_commit(
    State(state): State<AppState>,
    Json(req): Json<CommitRequest>,
) -> Result<(StatusCode, Json<Commit>), ApiError> {
    let effective_date = parse_effective_date(&req.effective_date).map_err(commit_error)?;
    let writer = require_writer(&state)?;

    let result = compute_forecast(&req.snapshot);
    let author = req
        .committed_by
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(state.committed_by.as_str());

    let commit = writer
        .commit(effective_date, &req.snapshot, &result, &req.notes, author)
        .await
        .map_err(commit_error)?;
    Ok((StatusCode::CREATED, Json(commit)))
}

async fn list_commits(State(state): State<AppState>) -> Result<Json<Vec<Commit>>, ApiError> {
    let writer = require_writer(&state)?;
    let commits = writer.history().await.map_err(internal_error)?;
    Ok(Json(commits))
}

async fn export_commit(
    State(state): State<AppState>,
    Path(version): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let writer = require_writer(&state)?;
    let commit = writer
        .log()
        .find_version(&version)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("no commit {version}")))?;

    let doc = ExportDocument::from_commit(&commit).map_err(internal_error)?;
    let disposition = format!("attachment; filename=\"{}\"", doc.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        doc.body,
    ))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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
    use evms_core::storage::MemoryCommitLog;
    use serde_json::{json, Value};

    async fn spawn_app(writer: Option<Arc<CommitWriter>>) -> String {
        let state = AppState {
            scenarios: Arc::new(ScenarioStore::new()),
            writer,
            committed_by: "Current User".to_string(),
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router(state)).await;
        });
        format!("http://{addr}")
    }

    fn memory_writer() -> Option<Arc<CommitWriter>> {
        Some(Arc::new(CommitWriter::new(Arc::new(MemoryCommitLog::new()))))
    }

    fn snapshot_json() -> Value {
        json!({ "bac": 1200000, "ev": 815000, "ac": 845000, "pv": 880000 })
    }

    #[tokio::test]
    async fn commit_route_accepts_month_end_and_lists_it() {
        let base = spawn_app(memory_writer()).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/commits"))
            .json(&json!({
                "effective_date": "2024-11-30",
                "snapshot": snapshot_json(),
                "notes": "November close",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
        let created: Value = resp.json().await.unwrap();
        assert_eq!(created["effective"], "2024-11-30");
        assert_eq!(created["committed_by"], "Current User");

        let listed: Value = client
            .get(format!("{base}/commits"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["version"], created["version"]);
    }

    #[tokio::test]
    async fn commit_route_rejects_mid_month_with_422() {
        let base = spawn_app(memory_writer()).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/commits"))
            .json(&json!({ "effective_date": "2024-11-15", "snapshot": snapshot_json() }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);

        let listed: Value = client
            .get(format!("{base}/commits"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(listed.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn commit_routes_report_503_without_a_log() {
        let base = spawn_app(None).await;
        let resp = reqwest::get(format!("{base}/commits")).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn deleting_unknown_scenario_is_no_content() {
        let base = spawn_app(None).await;
        let client = reqwest::Client::new();

        let saved: Value = client
            .post(format!("{base}/scenarios"))
            .json(&json!({ "name": "Baseline", "snapshot": snapshot_json() }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let resp = client
            .delete(format!("{base}/scenarios/does-not-exist"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NO_CONTENT);

        let listed: Value = client
            .get(format!("{base}/scenarios"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["id"], saved["id"]);
    }

    #[test]
    fn split_ids_skips_blanks() {
        assert_eq!(split_ids("a, b,,c "), ["a", "b", "c"]);
        assert!(split_ids("").is_empty());
    }

    #[test]
    fn invalid_effective_date_maps_to_unprocessable() {
        let err = parse_effective_date("2024-11-15").unwrap_err();
        let (status, body) = commit_error(err);
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body.0.error.contains("month-end"));
    }

    #[test]
    fn forecast_view_formats_non_finite_eac_as_unavailable() {
        let snapshot = CostSnapshot {
            bac: 1_200_000.0,
            pv: 880_000.0,
            ..CostSnapshot::default()
        };
        let view = ForecastView::new(&snapshot, compute_forecast(&snapshot));
        assert_eq!(view.formatted.eac, evms_core::format::UNAVAILABLE);
        assert_eq!(view.method, "CPI Method");
        let json = serde_json::to_value(&view).unwrap();
        assert!(json["result"]["eac"].is_null());
    }
}

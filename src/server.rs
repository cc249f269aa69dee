use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::error::{PipelineError, Result};
use crate::queue::QueueStore;
use crate::runner::{StageReport, StageTrigger};
use crate::stages::ProduceStage;
use crate::store::LinkStore;

/// Shared state of a stage's HTTP surface. Every stage carries the queue
/// store; the trigger, produce stage and link store are present only where
/// that binary wires them.
#[derive(Clone)]
pub struct AppState {
    pub service: &'static str,
    pub queue: Arc<QueueStore>,
    /// Queue whose depth `/queue/status` reports.
    pub status_queue: String,
    pub trigger: Option<Arc<dyn StageTrigger>>,
    pub produce: Option<Arc<ProduceStage>>,
    pub link_store: Option<Arc<dyn LinkStore>>,
    /// Base URL of the next stage, notified after a productive run.
    pub next_stage_url: Option<String>,
}

impl AppState {
    pub fn new(service: &'static str, queue: Arc<QueueStore>, status_queue: impl Into<String>) -> Self {
        AppState {
            service,
            queue,
            status_queue: status_queue.into(),
            trigger: None,
            produce: None,
            link_store: None,
            next_stage_url: None,
        }
    }

    pub fn with_trigger(mut self, trigger: Arc<dyn StageTrigger>) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn with_produce(mut self, produce: Arc<ProduceStage>) -> Self {
        self.produce = Some(produce);
        self
    }

    pub fn with_link_store(mut self, store: Arc<dyn LinkStore>) -> Self {
        self.link_store = Some(store);
        self
    }

    pub fn with_next_stage(mut self, url: Option<String>) -> Self {
        self.next_stage_url = url;
        self
    }
}

/// Map a pipeline error onto an error-shaped payload, distinguishing bad
/// input from service failures.
fn error_response(e: &PipelineError) -> Response {
    let (status, kind) = match e {
        PipelineError::InvalidItem(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
        PipelineError::QueueError(_) => (StatusCode::SERVICE_UNAVAILABLE, "queue_error"),
        PipelineError::StorageError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
        PipelineError::FetchError(_) => (StatusCode::BAD_GATEWAY, "scraping_failed"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    };
    (
        status,
        Json(json!({
            "error": kind,
            "message": e.to_string(),
            "status": "error",
        })),
    )
        .into_response()
}

async fn health_handler(State(state): State<AppState>) -> Response {
    let queue_ok = state.queue.ping().await;
    let store_ok = match &state.link_store {
        Some(store) => store.ping().await,
        None => Ok(()),
    };
    match queue_ok.and(store_ok) {
        Ok(()) => Json(json!({
            "status": "healthy",
            "service": state.service,
            "timestamp": Utc::now().to_rfc3339(),
        }))
        .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "service": state.service,
                "error": e.to_string(),
            })),
        )
            .into_response(),
    }
}

async fn queue_status_handler(State(state): State<AppState>) -> Response {
    match state.queue.status(&state.status_queue).await {
        Ok(status) => Json(json!({
            "items_ready": status.items_ready,
            "queue_length": status.queue_length,
            "timestamp": Utc::now().to_rfc3339(),
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

async fn process_handler(State(state): State<AppState>) -> Response {
    let Some(trigger) = &state.trigger else {
        return (StatusCode::NOT_FOUND, "No trigger configured").into_response();
    };
    match trigger.run_once().await {
        Ok(report) => {
            maybe_notify_next_stage(&state, &report);
            Json(report).into_response()
        }
        Err(e) => {
            error!(service = state.service, error = %e, "Stage run failed");
            error_response(&e)
        }
    }
}

#[derive(Deserialize)]
struct ScrapeRequest {
    url: Option<String>,
    keyword: Option<String>,
}

async fn scrape_handler(
    State(state): State<AppState>,
    Json(request): Json<ScrapeRequest>,
) -> Response {
    let Some(produce) = &state.produce else {
        return (StatusCode::NOT_FOUND, "No produce stage configured").into_response();
    };
    let (Some(url), Some(keyword)) = (request.url, request.keyword) else {
        return error_response(&PipelineError::InvalidItem(
            "Both URL and keyword are required".into(),
        ));
    };
    match produce.run(&url, &keyword).await {
        Ok(report) => {
            maybe_notify_next_stage(&state, &report);
            Json(json!({
                "source_url": url,
                "keyword": keyword,
                "report": report,
            }))
            .into_response()
        }
        Err(e) => {
            error!(error = %e, %url, "Scrape run failed");
            error_response(&e)
        }
    }
}

#[derive(Deserialize)]
struct LinksQuery {
    keyword: Option<String>,
    source_url: Option<String>,
}

async fn links_handler(
    State(state): State<AppState>,
    Query(query): Query<LinksQuery>,
) -> Response {
    let Some(store) = &state.link_store else {
        return (StatusCode::NOT_FOUND, "No link store configured").into_response();
    };
    match store
        .find(query.keyword.as_deref(), query.source_url.as_deref())
        .await
    {
        Ok(records) => {
            let count = records.len();
            Json(json!({
                "items": records,
                "count": count,
            }))
            .into_response()
        }
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
struct HrefQuery {
    href_url: Option<String>,
}

async fn link_by_href_handler(
    State(state): State<AppState>,
    Query(query): Query<HrefQuery>,
) -> Response {
    let Some(store) = &state.link_store else {
        return (StatusCode::NOT_FOUND, "No link store configured").into_response();
    };
    let Some(href_url) = query.href_url else {
        return error_response(&PipelineError::InvalidItem(
            "href_url parameter is required".into(),
        ));
    };
    match store.find_by_href(&href_url).await {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "not_found",
                "message": "No item found with the specified href URL",
                "status": "error",
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

async fn metrics_handler() -> (StatusCode, String) {
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!("Could not encode prometheus metrics: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Could not encode prometheus metrics: {}", e),
        );
    }
    match String::from_utf8(buffer) {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!("Prometheus metrics UTF-8 error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Prometheus metrics UTF-8 error: {}", e),
            )
        }
    }
}

/// One-shot notification to the next stage, fire-and-forget: the stages are
/// loosely choreographed, so a failed notification only logs.
fn maybe_notify_next_stage(state: &AppState, report: &StageReport) {
    if report.items_processed == 0 {
        return;
    }
    let Some(base_url) = state.next_stage_url.clone() else {
        return;
    };
    tokio::spawn(async move {
        notify_stage(&base_url).await;
    });
}

/// POST `{base_url}/process`, logging the outcome.
pub async fn notify_stage(base_url: &str) {
    let url = format!("{}/process", base_url.trim_end_matches('/'));
    info!(%url, "Notifying next stage");
    match reqwest::Client::new().post(&url).send().await {
        Ok(response) if response.status().is_success() => {}
        Ok(response) => warn!(%url, status = %response.status(), "Next stage returned an error"),
        Err(e) => warn!(%url, error = %e, "Failed to notify next stage"),
    }
}

fn common_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/queue/status", get(queue_status_handler))
        .route("/metrics", get(metrics_handler))
}

/// Router for the score stage (and any plain runner-backed stage).
pub fn stage_router(state: AppState) -> Router {
    common_routes()
        .route("/process", post(process_handler))
        .with_state(state)
}

/// Router for the produce stage.
pub fn producer_router(state: AppState) -> Router {
    common_routes()
        .route("/scrape", post(scrape_handler))
        .with_state(state)
}

/// Router for the persist stage: trigger plus query endpoints.
pub fn persister_router(state: AppState) -> Router {
    common_routes()
        .route("/process", post(process_handler))
        .route("/links", get(links_handler))
        .route("/links/by-href", get(link_by_href_handler))
        .with_state(state)
}

/// Bind and serve a router until the process exits.
pub async fn serve(router: Router, port: u16) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "HTTP service listening");
    axum::serve(listener, router).await?;
    Ok(())
}

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analytics::Answer;
use crate::data::{load_file, mock, Dataset, DatasetSummary, MockConfig, QueryContext};
use crate::error::{DatasetError, OperationError, ValidationError};
use crate::ops::{CandidateOperation, OperationRequest, OperationResult, OperationValidator};
use crate::resolver::{IntentResolver, ResolutionOutcome};

/// Error body: `{success: false, error, kind}`
pub struct ServerError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ServerError {
    fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    fn no_dataset() -> Self {
        Self::new(
            StatusCode::CONFLICT,
            "no_dataset",
            "No dataset loaded. Load a file or generate mock data first.",
        )
    }

    fn validation(err: ValidationError) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, err.kind(), err.to_string())
    }

    fn operation(err: OperationError) -> Self {
        match err {
            OperationError::Validation(v) => Self::validation(v),
            other => Self::new(StatusCode::UNPROCESSABLE_ENTITY, other.kind(), other.to_string()),
        }
    }

    fn dataset(err: DatasetError) -> Self {
        let kind = match err {
            DatasetError::Io(_) => "io",
            DatasetError::UnsupportedFormat(_) => "unsupported_format",
            _ => "malformed_dataset",
        };
        Self::new(StatusCode::BAD_REQUEST, kind, err.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!("Request failed: {}", self.message);
        }
        let body = json!({ "success": false, "error": self.message, "kind": self.kind });
        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", err.to_string())
    }
}

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<IntentResolver>,
    pub dataset: Arc<RwLock<Option<Arc<Dataset>>>>,
}

impl AppState {
    pub fn new(resolver: Arc<IntentResolver>) -> Self {
        Self {
            resolver,
            dataset: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_dataset(self, dataset: Dataset) -> Self {
        Self {
            dataset: Arc::new(RwLock::new(Some(Arc::new(dataset)))),
            ..self
        }
    }

    /// Current dataset. Requests hold their own snapshot so a concurrent
    /// load never changes data under a running query.
    async fn snapshot(&self) -> Result<Arc<Dataset>, ServerError> {
        self.dataset.read().await.clone().ok_or_else(ServerError::no_dataset)
    }

    async fn install(&self, dataset: Dataset) -> LoadResponse {
        let summary = dataset.summary();
        *self.dataset.write().await = Some(Arc::new(dataset));
        let dataset_id = Uuid::new_v4();
        info!(
            "Installed dataset {} ({} signals, {} samples)",
            dataset_id,
            summary.signals.len(),
            summary.samples
        );
        LoadResponse {
            success: true,
            dataset_id,
            summary,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadFileRequest {
    file_path: PathBuf,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoadResponse {
    success: bool,
    dataset_id: Uuid,
    summary: DatasetSummary,
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    context: Option<QueryContext>,
    #[serde(default)]
    execute: bool,
}

#[derive(Debug, Serialize)]
struct ProcessQueryResponse {
    success: bool,
    outcome: ResolutionOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<Vec<OperationResult>>,
}

#[derive(Debug, Serialize)]
struct AnswerResponse {
    success: bool,
    answer: Answer,
}

#[derive(Debug, Serialize)]
struct RunOperationResponse {
    success: bool,
    request: OperationRequest,
    result: OperationResult,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/load-file", post(load_file_handler))
        .route("/api/mock", post(mock_handler))
        .route("/api/process-query", post(process_query))
        .route("/api/answer", post(answer_handler))
        .route("/api/run-operation", post(run_operation))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = router(state);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Signal server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let loaded = state.dataset.read().await.is_some();
    Json(json!({ "status": "ok", "datasetLoaded": loaded }))
}

async fn load_file_handler(
    State(state): State<AppState>,
    Json(req): Json<LoadFileRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let path = req.file_path;
    let dataset = tokio::task::spawn_blocking(move || load_file(path))
        .await
        .map_err(anyhow::Error::from)?
        .map_err(ServerError::dataset)?;
    Ok(Json(state.install(dataset).await))
}

async fn mock_handler(
    State(state): State<AppState>,
    Json(config): Json<MockConfig>,
) -> Result<impl IntoResponse, ServerError> {
    if config.duration <= 0.0 || config.sample_rate <= 0.0 {
        return Err(ServerError::new(
            StatusCode::BAD_REQUEST,
            "invalid_mock_config",
            "duration and sampleRate must be positive",
        ));
    }
    let dataset = mock::generate(&config);
    Ok(Json(state.install(dataset).await))
}

async fn process_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let dataset = state.snapshot().await?;
    let resolver = &state.resolver;
    let response = if req.execute {
        let (outcome, results) = resolver
            .resolve_and_execute(&req.query, &dataset, req.context.as_ref())
            .await;
        ProcessQueryResponse {
            success: true,
            outcome,
            results: Some(results),
        }
    } else {
        let outcome = resolver.resolve(&req.query, &dataset, req.context.as_ref()).await;
        ProcessQueryResponse {
            success: true,
            outcome,
            results: None,
        }
    };
    Ok(Json(response))
}

async fn answer_handler(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let dataset = state.snapshot().await?;
    let answer = state
        .resolver
        .engine()
        .answer(&req.query, &dataset, req.context.as_ref());
    Ok(Json(AnswerResponse {
        success: true,
        answer,
    }))
}

async fn run_operation(
    State(state): State<AppState>,
    Json(candidate): Json<CandidateOperation>,
) -> Result<impl IntoResponse, ServerError> {
    let dataset = state.snapshot().await?;
    let catalog = state.resolver.catalog();
    let request = OperationValidator::new(catalog)
        .validate(&candidate, &dataset)
        .map_err(ServerError::validation)?;
    let result = catalog
        .execute(&dataset, &request)
        .map_err(ServerError::operation)?;
    Ok(Json(RunOperationResponse {
        success: true,
        request,
        result,
    }))
}

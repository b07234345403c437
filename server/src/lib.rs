use anyhow::{bail, Result};
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use lexsem_core::persist::{load_snapshot, save_snapshot, IndexPaths, MetaFile};
use lexsem_core::{
    DirectorySource, Engine, FusionWeights, IndexError, IndexManager, IndexStats, IngestReport, RawDocument, ScoredResult,
    SearchConfig, SearchMode, SourceFailure,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default)]
    pub mode: SearchMode,
    pub k: Option<usize>,
    pub w_lex: Option<f32>,
    pub w_sem: Option<f32>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub mode: SearchMode,
    pub took_ms: u128,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<ScoredResult>,
}

#[derive(Deserialize)]
pub struct DocParams {
    pub path: String,
}

#[derive(Deserialize)]
pub struct BatchDoc {
    pub path: String,
    pub title: Option<String>,
    pub text: String,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub index_paths_root: PathBuf,
    pub data_dir: Option<PathBuf>,
    pub admin_token: Option<String>,
    commit_lock: Arc<Mutex<()>>,
}

/// JSON error body with the status derived from the failing operation.
pub struct ApiError(StatusCode, String);

impl From<IndexError> for ApiError {
    fn from(err: IndexError) -> Self {
        let status = match &err {
            IndexError::DimensionMismatch { .. }
            | IndexError::EmptyEmbedding
            | IndexError::InvalidWeight { .. }
            | IndexError::DocumentSourceFailure { .. } => StatusCode::BAD_REQUEST,
            IndexError::Embedding(_) => StatusCode::BAD_GATEWAY,
            IndexError::IndexCorruption(_) | IndexError::Serialization(_) | IndexError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        ApiError(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({ "error": self.1 }))).into_response()
    }
}

/// Loads the snapshot under `index_dir` if one exists, otherwise starts empty.
/// `data_dir` is the tree re-read by `POST /index`.
pub fn build_app(
    index_dir: &Path,
    data_dir: Option<PathBuf>,
    config: SearchConfig,
    admin_token: Option<String>,
) -> Result<Router> {
    let paths = IndexPaths::new(index_dir);
    let manager = if paths.exists() {
        IndexManager::from_snapshot(load_snapshot(&paths)?)?
    } else {
        tracing::info!(index = %index_dir.display(), "no snapshot found, starting empty");
        IndexManager::with_dimension(config.embedding_dimension)
    };
    if let Some(dim) = manager.dimension() {
        if dim != config.embedding_dimension {
            bail!("index has embedding dimension {dim} but the embedder produces {}", config.embedding_dimension);
        }
    }
    tracing::info!(documents = manager.len(), "index loaded");

    let engine = Arc::new(Engine::with_manager(Arc::new(manager), config));
    let app_state = AppState {
        engine,
        index_paths_root: index_dir.to_path_buf(),
        data_dir,
        admin_token,
        commit_lock: Arc::new(Mutex::new(())),
    };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc", get(doc_handler))
        .route("/stats", get(stats_handler))
        .route("/index", post(index_data_dir))
        .route("/index/batch", post(index_batch))
        .route("/index/doc", delete(index_delete))
        .route("/index/commit", post(index_commit))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);
    Ok(app)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let weights = match (params.w_lex, params.w_sem) {
        (None, None) => None,
        (lex, sem) => {
            let defaults = state.engine.config().weights;
            Some(FusionWeights {
                lexical: lex.unwrap_or(defaults.lexical),
                semantic: sem.unwrap_or(defaults.semantic),
            })
        }
    };

    let results = state.engine.search(&params.q, params.mode, params.k, weights)?;
    let elapsed = start.elapsed();
    Ok(Json(SearchResponse {
        query: params.q,
        mode: params.mode,
        took_ms: elapsed.as_millis(),
        took_s: elapsed.as_secs_f64(),
        total_hits: results.len(),
        results,
    }))
}

pub async fn doc_handler(State(state): State<AppState>, Query(params): Query<DocParams>) -> Result<Json<serde_json::Value>, ApiError> {
    match state.engine.manager().title(&params.path) {
        Some(title) => Ok(Json(serde_json::json!({ "path": params.path, "title": title }))),
        None => Err(ApiError(StatusCode::NOT_FOUND, format!("not found: {}", params.path))),
    }
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<IndexStats> {
    Json(state.engine.manager().stats())
}

// --- Admin endpoints ---
async fn index_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(docs): Json<Vec<BatchDoc>>,
) -> Result<Json<IngestReport>, ApiError> {
    authorize(&state, &headers)?;
    let engine = Arc::clone(&state.engine);
    let task = tokio::task::spawn_blocking(move || {
        let source = docs.into_iter().map(|d| {
            let title = d.title.unwrap_or_else(|| file_name(&d.path));
            Ok::<_, SourceFailure>(RawDocument { path: d.path, title, text: d.text })
        });
        engine.index_source(source)
    });
    match task.await {
        Ok(report) => Ok(Json(report)),
        Err(err) => Err(ApiError(StatusCode::INTERNAL_SERVER_ERROR, format!("indexing task failed: {err}"))),
    }
}

/// Re-reads the configured data directory into the live index.
async fn index_data_dir(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<IngestReport>, ApiError> {
    authorize(&state, &headers)?;
    let dir = match &state.data_dir {
        Some(dir) => dir.clone(),
        None => return Err(ApiError(StatusCode::BAD_REQUEST, "no data directory configured".into())),
    };
    let engine = Arc::clone(&state.engine);
    let task = tokio::task::spawn_blocking(move || engine.index_source(DirectorySource::open(&dir)));
    match task.await {
        Ok(report) => {
            tracing::info!(succeeded = report.succeeded.len(), failed = report.failed.len(), "data directory indexed");
            Ok(Json(report))
        }
        Err(err) => Err(ApiError(StatusCode::INTERNAL_SERVER_ERROR, format!("indexing task failed: {err}"))),
    }
}

async fn index_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<DocParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let deleted = state.engine.delete(&params.path);
    Ok(Json(serde_json::json!({ "path": params.path, "deleted": deleted })))
}

async fn index_commit(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<MetaFile>, ApiError> {
    authorize(&state, &headers)?;
    let task = tokio::task::spawn_blocking(move || {
        let _guard = state.commit_lock.lock();
        let snapshot = state.engine.manager().snapshot();
        save_snapshot(&IndexPaths::new(&state.index_paths_root), &snapshot)
    });
    match task.await {
        Ok(result) => Ok(Json(result?)),
        Err(err) => Err(ApiError(StatusCode::INTERNAL_SERVER_ERROR, format!("commit task failed: {err}"))),
    }
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err(ApiError(StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err(ApiError(StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}

fn file_name(path: &str) -> String {
    Path::new(path).file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| path.to_string())
}

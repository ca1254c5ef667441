use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::StatusCode, routing::get, Json, Router};
use retrieval::persist::{load_index, IndexPaths};
use retrieval::{Field, InvertedIndex, QueryEvaluator, SearchConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
    /// Overrides the configured similarity selector for this request.
    pub similarity: Option<u32>,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub similarity: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub rank: usize,
    pub doc_id: String,
    pub score: f32,
    pub title: String,
}

#[derive(Serialize)]
pub struct DocResponse {
    pub doc_id: String,
    pub title: String,
    pub field_lengths: Vec<(String, u32)>,
}

#[derive(Clone)]
pub struct AppState {
    pub index: Arc<InvertedIndex>,
    pub config: Arc<SearchConfig>,
}

pub fn build_app(index_dir: &str, config: SearchConfig) -> Result<Router> {
    let index = load_index(&IndexPaths::new(index_dir))?;
    config.validate()?;
    config.analyzer_for(*index.analyzer())?;
    tracing::info!(index_dir, num_docs = index.document_count(), "index loaded");
    let state = AppState { index: Arc::new(index), config: Arc::new(config) };

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
        .route("/doc/:doc_id", get(doc_handler))
        .with_state(state)
        .layer(cors);
    Ok(app)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let start = std::time::Instant::now();
    let mut config = (*state.config).clone();
    if let Some(s) = params.similarity {
        config.similarity = s;
    }
    let evaluator = QueryEvaluator::new(&state.index, &config).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let k = params.k.clamp(1, 100);
    let top = evaluator.search(&params.q, k);
    let results = top
        .hits
        .into_iter()
        .enumerate()
        .map(|(i, hit)| {
            let title = state.index.doc(hit.doc_id).map(|m| m.title.clone()).unwrap_or_default();
            SearchHit { rank: i + 1, doc_id: hit.external_id, score: hit.score, title }
        })
        .collect();

    Ok(Json(SearchResponse {
        query: params.q,
        similarity: evaluator.similarity().to_string(),
        took_s: start.elapsed().as_secs_f64(),
        total_hits: top.total_hits,
        results,
    }))
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<String>) -> Result<Json<DocResponse>, StatusCode> {
    let internal = state.index.doc_id(&doc_id).ok_or(StatusCode::NOT_FOUND)?;
    let meta = state.index.doc(internal).ok_or(StatusCode::NOT_FOUND)?;
    let field_lengths = Field::ALL
        .iter()
        .map(|f| (f.name().to_string(), state.index.field_length(internal, *f)))
        .collect();
    Ok(Json(DocResponse { doc_id: meta.external_id.clone(), title: meta.title.clone(), field_lengths }))
}

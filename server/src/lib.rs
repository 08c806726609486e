use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::StatusCode, routing::get, Json, Router};
use engine::{Analyzer, DocId, EngineError, IndexStore, Searcher, Snapshot, SortOrder};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const MAX_K: usize = 100;
const SNIPPET_BEFORE: usize = 100;
const SNIPPET_LEN: usize = 300;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default)]
    pub sort: Option<String>,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f64,
    pub path: String,
    pub snippet: Option<String>,
}

struct LoadedIndex {
    snapshot: Snapshot,
    analyzer: Analyzer,
}

#[derive(Clone)]
pub struct AppState {
    index: Arc<LoadedIndex>,
    store: IndexStore,
}

impl AppState {
    pub fn new(store: IndexStore, snapshot: Snapshot) -> Self {
        let analyzer = snapshot.config.analyzer();
        Self { index: Arc::new(LoadedIndex { snapshot, analyzer }), store }
    }

    fn identifier(&self) -> &str {
        &self.index.snapshot.config.identifier
    }

    /// Cached copy when the index keeps texts, otherwise the file itself.
    fn document_text(&self, doc_id: DocId, path: &str) -> Option<String> {
        self.store
            .cached_text(self.identifier(), doc_id)
            .or_else(|| std::fs::read_to_string(path).ok())
    }
}

type ApiError = (StatusCode, String);

fn api_error(err: EngineError) -> ApiError {
    let status = match err {
        EngineError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

pub fn build_app(index_dir: impl Into<PathBuf>, id: &str) -> Result<Router> {
    let store = IndexStore::new(index_dir.into());
    let snapshot = store.load(id)?;
    tracing::info!(id, num_docs = snapshot.corpus.len(), "serving index");
    Ok(router(AppState::new(store, snapshot)))
}

pub fn router(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let sort: SortOrder = match params.sort.as_deref() {
        Some(s) => s.parse().map_err(api_error)?,
        None => SortOrder::Relevance,
    };
    let index = &state.index;
    let searcher = Searcher::new(&index.snapshot.index, &index.snapshot.corpus, &index.analyzer)
        .with_idf(index.snapshot.config.idf);
    let mut ranked = searcher.search(&params.q, sort, None).map_err(api_error)?;
    let total_hits = ranked.len();
    ranked.truncate(params.k.clamp(1, MAX_K));

    let pattern = highlight_pattern(&params.q);
    let results = ranked
        .into_iter()
        .map(|hit| {
            let snippet = pattern.as_ref().and_then(|re| {
                state.document_text(hit.doc_id, &hit.path).map(|text| snippet(&text, re))
            });
            SearchHit { doc_id: hit.doc_id, score: hit.score, path: hit.path, snippet }
        })
        .collect();

    let elapsed = start.elapsed();
    tracing::debug!(query = %params.q, total_hits, took_s = elapsed.as_secs_f64(), "search served");
    Ok(Json(SearchResponse { query: params.q, took_s: elapsed.as_secs_f64(), total_hits, results }))
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Path(doc_id): Path<DocId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Some(path) = state.index.snapshot.corpus.path_of(doc_id) else {
        return Err((StatusCode::NOT_FOUND, format!("no document {doc_id}")));
    };
    let mut obj = serde_json::json!({ "doc_id": doc_id, "path": path });
    if let Some(text) = state.document_text(doc_id, path) {
        obj["text"] = serde_json::Value::String(text);
    }
    Ok(Json(obj))
}

/// Case-insensitive alternation of the raw query words.
fn highlight_pattern(query: &str) -> Option<Regex> {
    let words: Vec<String> = query.split_whitespace().map(regex::escape).collect();
    if words.is_empty() {
        return None;
    }
    RegexBuilder::new(&words.join("|")).case_insensitive(true).build().ok()
}

fn floor_boundary(text: &str, mut at: usize) -> usize {
    while at > 0 && !text.is_char_boundary(at) {
        at -= 1;
    }
    at
}

fn snippet(text: &str, pattern: &Regex) -> String {
    let (start, end) = match pattern.find(text) {
        Some(m) => {
            let start = floor_boundary(text, m.start().saturating_sub(SNIPPET_BEFORE));
            (start, floor_boundary(text, (start + SNIPPET_LEN).min(text.len())))
        }
        None => (0, floor_boundary(text, SNIPPET_LEN.min(text.len()))),
    };
    pattern
        .replace_all(&text[start..end], |caps: &regex::Captures| format!("<em>{}</em>", &caps[0]))
        .into_owned()
}

//! # HTTP Server Module
//!
//! HTTP API endpoints for the vector store, used by the position-ingestion
//! pipeline and the matching agents. The server uses Axum for async
//! request handling.
//!
//! # API Endpoints
//!
//! ## Health Check
//! - `GET /health` - Server health status
//!
//! ## Vector Operations
//! - `POST /add` - Insert or update a vector by ID (optional metadata)
//! - `POST /search` - Top-k nearest neighbors for a query vector
//! - `GET /get/{id}` - Look up a stored entry by ID
//! - `GET /reconstruct/{internal_id}` - Look up a stored entry by slot
//! - `DELETE /delete/{id}` - Logically delete an entry
//! - `DELETE /clear` - Discard every entry
//!
//! ## Diagnostics
//! - `GET /list` - All live ID pairs
//! - `GET /all` - All live entries with metadata
//! - `GET /all_with_vectors` - Same, including raw vectors
//! - `GET /info`, `GET /stats`, `GET /debug` - Snapshots
//!
//! ### Add a vector
//! ```bash
//! curl -X POST http://localhost:8080/add \
//!      -H 'Content-Type: application/json' \
//!      -d '{"id": "pos-17", "vector": [0.1, 0.2], "metadata": {"university": "ETH"}}'
//! ```
//!
//! ### Search
//! ```bash
//! curl -X POST http://localhost:8080/search \
//!      -H 'Content-Type: application/json' \
//!      -d '{"vector": [0.1, 0.2], "k": 5}'
//! ```

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::errors::StoreError;
use crate::store::{AddAction, EntryView, ListEntry, SearchHit, Store, StoreStats};

// Request/Response types
#[derive(Debug, Deserialize)]
pub struct AddRequest {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct AddResponse {
    pub stored: bool,
    pub ntotal: usize,
    pub internal_id: u64,
    pub action: AddAction,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub vector: Vec<f32>,
    #[serde(default = "default_k")]
    pub k: usize,
}

fn default_k() -> usize {
    5
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub total_found: usize,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub ids: Vec<ListEntry>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct EntriesResponse {
    pub entries: Vec<EntryView>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
    pub vector_id: String,
    pub internal_id: u64,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub cleared: bool,
    pub ntotal: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub stats: StoreStats,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

// App state
pub type AppState = Arc<RwLock<Store>>;

// Implement IntoResponse for StoreError to enable automatic error responses
impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorResponse {
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

fn read_lock<'a>(
    state: &'a AppState,
    operation: &str,
) -> Result<std::sync::RwLockReadGuard<'a, Store>, StoreError> {
    state
        .read()
        .map_err(|_| StoreError::Lock(format!("Failed to acquire read lock for {}", operation)))
}

fn write_lock<'a>(
    state: &'a AppState,
    operation: &str,
) -> Result<std::sync::RwLockWriteGuard<'a, Store>, StoreError> {
    state
        .write()
        .map_err(|_| StoreError::Lock(format!("Failed to acquire write lock for {}", operation)))
}

// Handlers
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "vectormatch"
    }))
}

async fn add_vector(
    State(state): State<AppState>,
    Json(payload): Json<AddRequest>,
) -> Result<Json<AddResponse>, StoreError> {
    let mut store = write_lock(&state, "add")?;
    let outcome = store.add(&payload.id, payload.vector, payload.metadata)?;
    Ok(Json(AddResponse {
        stored: true,
        ntotal: outcome.ntotal,
        internal_id: outcome.internal_id,
        action: outcome.action,
    }))
}

async fn search(
    State(state): State<AppState>,
    Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, StoreError> {
    let store = read_lock(&state, "search")?;
    let results = store.search(&payload.vector, payload.k)?;
    info!("Search completed with {} results", results.len());
    Ok(Json(SearchResponse {
        total_found: results.len(),
        results,
    }))
}

async fn get_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EntryView>, StoreError> {
    let store = read_lock(&state, "get")?;
    Ok(Json(store.get(&id)?))
}

async fn reconstruct_entry(
    State(state): State<AppState>,
    Path(internal_id): Path<u64>,
) -> Result<Json<EntryView>, StoreError> {
    let store = read_lock(&state, "reconstruct")?;
    Ok(Json(store.reconstruct(internal_id)?))
}

async fn list_ids(State(state): State<AppState>) -> Result<Json<ListResponse>, StoreError> {
    let store = read_lock(&state, "list")?;
    let ids = store.list();
    Ok(Json(ListResponse {
        count: ids.len(),
        ids,
    }))
}

async fn all_entries(State(state): State<AppState>) -> Result<Json<EntriesResponse>, StoreError> {
    let store = read_lock(&state, "all")?;
    let entries = store.entries(false);
    Ok(Json(EntriesResponse {
        count: entries.len(),
        entries,
    }))
}

async fn all_entries_with_vectors(
    State(state): State<AppState>,
) -> Result<Json<EntriesResponse>, StoreError> {
    let store = read_lock(&state, "all_with_vectors")?;
    let entries = store.entries(true);
    Ok(Json(EntriesResponse {
        count: entries.len(),
        entries,
    }))
}

async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, StoreError> {
    let mut store = write_lock(&state, "delete")?;
    let internal_id = store.delete(&id)?;
    Ok(Json(DeleteResponse {
        deleted: true,
        vector_id: id,
        internal_id,
    }))
}

async fn clear_store(State(state): State<AppState>) -> Result<Json<ClearResponse>, StoreError> {
    let mut store = write_lock(&state, "clear")?;
    store.clear()?;
    Ok(Json(ClearResponse {
        cleared: true,
        ntotal: 0,
    }))
}

async fn service_info(State(state): State<AppState>) -> Result<Json<serde_json::Value>, StoreError> {
    let store = read_lock(&state, "info")?;
    let paths = store.paths();
    Ok(Json(serde_json::json!({
        "service": "vectormatch",
        "dimension": store.dimension(),
        "live_count": store.live_count(),
        "files": {
            "vectors": paths.vectors.display().to_string(),
            "state": paths.state.display().to_string(),
            "index": paths.index.display().to_string(),
        }
    })))
}

async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, StoreError> {
    let store = read_lock(&state, "stats")?;
    Ok(Json(StatsResponse {
        stats: store.stats(),
    }))
}

async fn debug_dump(State(state): State<AppState>) -> Result<Json<serde_json::Value>, StoreError> {
    let store = read_lock(&state, "debug")?;
    let (id_to_internal, internal_to_id, metadata) = store.debug_maps();
    Ok(Json(serde_json::json!({
        "stats": store.stats(),
        "id_to_internal": id_to_internal,
        "internal_to_id": internal_to_id,
        "metadata": metadata,
    })))
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/add", post(add_vector))
        .route("/search", post(search))
        .route("/get/:id", get(get_entry))
        .route("/reconstruct/:internal_id", get(reconstruct_entry))
        .route("/list", get(list_ids))
        .route("/all", get(all_entries))
        .route("/all_with_vectors", get(all_entries_with_vectors))
        .route("/delete/:id", delete(delete_entry))
        .route("/clear", delete(clear_store))
        .route("/info", get(service_info))
        .route("/stats", get(stats))
        .route("/debug", get(debug_dump))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(
    store: Store,
    host: &str,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_app(Arc::new(RwLock::new(store)));

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    info!("vectormatch server starting on {}:{}", host, port);

    axum::serve(listener, app).await?;

    Ok(())
}

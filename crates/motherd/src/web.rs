//! Web endpoints for Mothership.
//!
//! Records are addressed by tag-set query parameters; blob content is
//! served by digest. Every record route resolves the caller's owner from
//! the Authorization header first, so one owner's tag space is invisible
//! to another's.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use cas::ContentHash;
use motherconf::AuthConfig;
use motherlib::{move_history, RecordStore};
use motherproto::{
    DeletedResponse, ErrorResponse, HealthResponse, Latest, LatestResponse, MoveRequest, MoveSpec,
    MovedResponse, PutResponse, RecordsResponse, StoreError, TagSet,
};
use serde::Deserialize;

/// Shared state for web handlers
#[derive(Clone)]
pub struct WebState {
    pub store: Arc<dyn RecordStore>,
    pub auth: Arc<AuthConfig>,
    pub started: Instant,
}

pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/latest", get(get_latest).put(put_latest))
        .route("/history", get(get_history).delete(delete_history))
        .route("/superset/latest", get(get_superset_latest))
        .route(
            "/superset/history",
            get(get_superset_history).delete(delete_superset_history),
        )
        .route("/blob/{digest}", get(get_blob))
        .route("/move", post(move_records))
        .route("/health", get(health))
        .route("/", get(serve_root))
        .with_state(state)
}

/// Store error carried out of a handler, mapped to an HTTP status.
struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            StoreError::NotFound => StatusCode::NOT_FOUND,
            // The candidate records go back as the body so the caller
            // can narrow its query.
            StoreError::Ambiguous(records) => {
                return (
                    StatusCode::MULTIPLE_CHOICES,
                    Json(LatestResponse::Ambiguous {
                        records: records.clone(),
                    }),
                )
                    .into_response()
            }
            StoreError::Unauthorized => StatusCode::UNAUTHORIZED,
            StoreError::Conflict(_) => StatusCode::CONFLICT,
            StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            StoreError::Invalid(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(ErrorResponse::from(&self.0))).into_response()
    }
}

/// Tag-set query parameter, slash-joined (`?tags=work/notes`).
#[derive(Debug, Deserialize)]
struct TagsQuery {
    #[serde(default)]
    tags: String,
}

impl TagsQuery {
    fn parse(&self) -> Result<TagSet, StoreError> {
        Ok(self.tags.parse::<TagSet>()?)
    }
}

/// Serve root discovery endpoint
async fn serve_root() -> impl IntoResponse {
    let links = serde_json::json!({
        "name": "Mothership",
        "version": env!("CARGO_PKG_VERSION"),
        "links": {
            "latest": "/latest",
            "history": "/history",
            "superset": "/superset",
            "blob": "/blob/{digest}",
            "move": "/move",
            "health": "/health",
        }
    });
    Json(links)
}

#[tracing::instrument(name = "http.latest.put", skip(state, headers, body))]
async fn put_latest(
    State(state): State<WebState>,
    Query(query): Query<TagsQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PutResponse>, ApiError> {
    let owner = crate::auth::resolve_owner(&state.auth, &headers)?;
    let tags = query.parse()?;
    let record = state.store.put_latest(&owner, &tags, &body)?;
    tracing::info!(owner, tags = %tags, r#ref = %record.ref_, "stored record");
    Ok(Json(PutResponse { ref_: record.ref_ }))
}

#[tracing::instrument(name = "http.latest.get", skip(state, headers))]
async fn get_latest(
    State(state): State<WebState>,
    Query(query): Query<TagsQuery>,
    headers: HeaderMap,
) -> Result<Json<LatestResponse>, ApiError> {
    let owner = crate::auth::resolve_owner(&state.auth, &headers)?;
    let tags = query.parse()?;
    match state.store.get_latest(&owner, &tags)? {
        Latest::Unique(record) => Ok(Json(LatestResponse::Unique { record })),
        // Several tag-sets match: surface the choices for the caller.
        Latest::Ambiguous(records) => Err(StoreError::Ambiguous(records).into()),
    }
}

#[tracing::instrument(name = "http.history.get", skip(state, headers))]
async fn get_history(
    State(state): State<WebState>,
    Query(query): Query<TagsQuery>,
    headers: HeaderMap,
) -> Result<Json<RecordsResponse>, ApiError> {
    let owner = crate::auth::resolve_owner(&state.auth, &headers)?;
    let tags = query.parse()?;
    let records = state.store.get_history(&owner, &tags)?;
    Ok(Json(RecordsResponse { records }))
}

#[tracing::instrument(name = "http.superset.latest", skip(state, headers))]
async fn get_superset_latest(
    State(state): State<WebState>,
    Query(query): Query<TagsQuery>,
    headers: HeaderMap,
) -> Result<Json<RecordsResponse>, ApiError> {
    let owner = crate::auth::resolve_owner(&state.auth, &headers)?;
    let tags = query.parse()?;
    let records = state.store.get_superset_latest(&owner, &tags)?;
    Ok(Json(RecordsResponse { records }))
}

#[tracing::instrument(name = "http.superset.history", skip(state, headers))]
async fn get_superset_history(
    State(state): State<WebState>,
    Query(query): Query<TagsQuery>,
    headers: HeaderMap,
) -> Result<Json<RecordsResponse>, ApiError> {
    let owner = crate::auth::resolve_owner(&state.auth, &headers)?;
    let tags = query.parse()?;
    let records = state.store.get_superset_history(&owner, &tags)?;
    Ok(Json(RecordsResponse { records }))
}

#[tracing::instrument(name = "http.history.delete", skip(state, headers))]
async fn delete_history(
    State(state): State<WebState>,
    Query(query): Query<TagsQuery>,
    headers: HeaderMap,
) -> Result<Json<DeletedResponse>, ApiError> {
    let owner = crate::auth::resolve_owner(&state.auth, &headers)?;
    let tags = query.parse()?;
    let deleted = state.store.delete_history(&owner, &tags)?;
    tracing::info!(owner, tags = %tags, deleted, "deleted history");
    Ok(Json(DeletedResponse { deleted }))
}

#[tracing::instrument(name = "http.superset.delete", skip(state, headers))]
async fn delete_superset_history(
    State(state): State<WebState>,
    Query(query): Query<TagsQuery>,
    headers: HeaderMap,
) -> Result<Json<DeletedResponse>, ApiError> {
    let owner = crate::auth::resolve_owner(&state.auth, &headers)?;
    let tags = query.parse()?;
    let deleted = state.store.delete_superset_history(&owner, &tags)?;
    tracing::info!(owner, tags = %tags, deleted, "deleted histories");
    Ok(Json(DeletedResponse { deleted }))
}

/// Fetch blob content by digest.
///
/// Blobs are owner-agnostic: a digest only reaches a caller through a
/// record it can already see, and the content is immutable.
#[tracing::instrument(name = "http.blob.get", skip(state, headers))]
async fn get_blob(
    State(state): State<WebState>,
    Path(digest): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let _owner = crate::auth::resolve_owner(&state.auth, &headers)?;
    let hash = ContentHash::from_str(&digest)
        .map_err(|e| StoreError::Invalid(e.to_string()))?;
    let data = state.store.get_blob(&hash)?;

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header("X-Content-Hash", hash.as_str())
        .body(data.into())
        .map_err(|e| StoreError::unavailable(e))?;
    Ok(response)
}

#[tracing::instrument(name = "http.move", skip(state, headers, request))]
async fn move_records(
    State(state): State<WebState>,
    headers: HeaderMap,
    Json(request): Json<MoveRequest>,
) -> Result<Json<MovedResponse>, ApiError> {
    let owner = crate::auth::resolve_owner(&state.auth, &headers)?;
    let spec = MoveSpec::try_from(request).map_err(StoreError::from)?;
    let records = move_history(state.store.as_ref(), &owner, &spec)?;
    Ok(Json(MovedResponse { records }))
}

async fn health(State(state): State<WebState>) -> Result<Json<HealthResponse>, ApiError> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.started.elapsed().as_secs(),
        records: state.store.record_count(),
        blobs: state.store.blob_count()?,
    }))
}

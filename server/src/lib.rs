use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use termspread::config::FieldSpecs;
use termspread::{Analysis, Fields, IndexConfig, MemoryStore, TermPredicate};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

const ADMIN_HEADER: &str = "X-ADMIN-TOKEN";
use tower_http::trace::TraceLayer;

type ApiError = (StatusCode, String);

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MemoryStore>,
    pub admin_token: Option<String>,
}

#[derive(Deserialize)]
pub struct FilterParams {
    pub expr: String,
}

#[derive(Deserialize)]
pub struct HighlightParams {
    pub term: String,
    pub doc: String,
    pub field: String,
    #[serde(default = "default_template")]
    pub template: String,
}
fn default_template() -> String { "<em>{{_}}</em>".into() }

#[derive(Serialize)]
pub struct TermReport<'a> {
    pub term: &'a str,
    pub sum: u64,
    pub scores: Vec<u32>,
    pub top: Option<&'a str>,
    pub all: Vec<&'a str>,
}

pub fn build_app(store: Arc<MemoryStore>, admin_token: Option<String>) -> Router {
    let app_state = AppState { store, admin_token };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/indices", get(all_indices))
        .route("/scopes/:scope/index", get(get_index).post(configure_index))
        .route("/scopes/:scope/docs/:id", get(get_doc).put(put_doc).delete(delete_doc))
        .route("/scopes/:scope/terms", get(terms_handler))
        .route("/scopes/:scope/terms/:term", get(term_handler))
        .route("/scopes/:scope/filter", get(filter_handler))
        .route("/scopes/:scope/highlight", get(highlight_handler))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(std::env::var("CORS_ALLOW_ORIGIN").ok().as_deref()))
}

/// Origins come from a comma-separated list; an unset or unparsable list allows any origin.
pub fn cors_layer(allowed: Option<&str>) -> CorsLayer {
    let origins: Vec<_> = allowed
        .into_iter()
        .flat_map(|list| list.split(','))
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let allow_origin = if origins.is_empty() {
        tracing::debug!("cors: allowing any origin");
        AllowOrigin::any()
    } else {
        tracing::debug!(count = origins.len(), "cors: restricting origins");
        AllowOrigin::list(origins)
    };
    CorsLayer::new().allow_origin(allow_origin).allow_methods(Any).allow_headers(Any)
}

fn analysis_for(state: &AppState, scope: &str) -> Result<Analysis, ApiError> {
    state
        .store
        .text_analysis(scope)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("no text index configured for scope {scope:?}")))
}

async fn all_indices(State(state): State<AppState>) -> Json<BTreeMap<String, IndexConfig>> {
    Json(state.store.dump_all_indices())
}

async fn get_index(State(state): State<AppState>, Path(scope): Path<String>) -> Result<Json<IndexConfig>, ApiError> {
    state
        .store
        .dump_indices(&scope)
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("scope {scope:?} has no text index")))
}

async fn configure_index(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(scope): Path<String>,
    Json(specs): Json<FieldSpecs>,
) -> Result<Json<IndexConfig>, ApiError> {
    authorize(&state, &headers)?;
    state.store.text_index(&scope, &specs);
    let merged = state.store.dump_indices(&scope).unwrap_or_default();
    Ok(Json(merged))
}

async fn get_doc(State(state): State<AppState>, Path((scope, id)): Path<(String, String)>) -> Result<Json<Value>, ApiError> {
    match state.store.get(&scope, &id) {
        Some(doc) => Ok(Json(json!({ "id": doc.id, "fields": doc.fields }))),
        None => Err((StatusCode::NOT_FOUND, format!("no document {id:?} in scope {scope:?}"))),
    }
}

async fn put_doc(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((scope, id)): Path<(String, String)>,
    Json(fields): Json<Fields>,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &headers)?;
    state.store.insert(&scope, id, fields);
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_doc(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((scope, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &headers)?;
    if state.store.delete(&scope, &id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("no document {id:?} in scope {scope:?}")))
    }
}

async fn terms_handler(State(state): State<AppState>, Path(scope): Path<String>) -> Result<Json<Value>, ApiError> {
    let analysis = analysis_for(&state, &scope)?;
    Ok(Json(json!(analysis.terms())))
}

async fn term_handler(
    State(state): State<AppState>,
    Path((scope, term)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let analysis = analysis_for(&state, &scope)?;
    let report = TermReport {
        term: &term,
        sum: analysis.entry(&term).map(|e| e.sum).unwrap_or(0),
        scores: analysis.scores(&term),
        top: analysis.top(&term),
        all: analysis.all(&term),
    };
    Ok(Json(json!(report)))
}

async fn filter_handler(
    State(state): State<AppState>,
    Path(scope): Path<String>,
    Query(params): Query<FilterParams>,
) -> Result<Json<Value>, ApiError> {
    let analysis = analysis_for(&state, &scope)?;
    let selected = analysis.filter(&TermPredicate::parse(&params.expr));
    let ids = analysis.serialize(&selected);
    let documents = state.store.get_many(&scope, &ids);
    Ok(Json(json!({ "terms": selected, "ids": ids, "documents": documents })))
}

async fn highlight_handler(
    State(state): State<AppState>,
    Path(scope): Path<String>,
    Query(params): Query<HighlightParams>,
) -> Result<Json<Value>, ApiError> {
    let analysis = analysis_for(&state, &scope)?;
    let doc = state
        .store
        .get(&scope, &params.doc)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("no document {:?} in scope {scope:?}", params.doc)))?;
    let text = doc.text(&params.field).unwrap_or_default();
    let highlighted = analysis.highlight(&params.term, text, &params.template);
    Ok(Json(json!({ "doc": doc.id, "field": params.field, "highlighted": highlighted })))
}

/// Writes (index configuration, document upserts and deletes) need the admin header.
fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Err((StatusCode::UNAUTHORIZED, "writes are disabled: no admin token configured".into()));
    };
    match headers.get(ADMIN_HEADER).map(|v| v.as_bytes()) {
        Some(given) if given == expected.as_bytes() => Ok(()),
        Some(_) => Err((StatusCode::UNAUTHORIZED, format!("{ADMIN_HEADER} does not match"))),
        None => Err((StatusCode::UNAUTHORIZED, format!("missing {ADMIN_HEADER} header"))),
    }
}

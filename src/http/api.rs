//! Axum handlers for `/api/*` routes.
//!
//! Each handler receives [`AppState`] via [`axum::extract::State`] and
//! returns an axum [`Response`]. Category suggestion always answers `200`;
//! its failures are visible only through the diagnostics endpoint.

use std::time::Duration;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, warn};
use uuid::Uuid;

use crate::classify::ClassificationInput;
use crate::listings::browse::{BrowseQuery, browse};
use crate::listings::{ListingPatch, NewListing, StoreError};

use super::AppState;

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Build a JSON error response body.
fn json_error(code: &str, msg: impl std::fmt::Display) -> Json<serde_json::Value> {
    Json(json!({ "error": code, "message": format!("{msg}") }))
}

fn store_error(e: StoreError) -> Response {
    match e {
        StoreError::NotFound(_) => (StatusCode::NOT_FOUND, json_error("not_found", e)).into_response(),
        StoreError::Invalid(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, json_error("invalid", e)).into_response()
        }
        StoreError::Backend(_) => {
            error!("listing store failure: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, json_error("internal", "listing store failure"))
                .into_response()
        }
    }
}

fn parse_id(raw: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(raw).map_err(|_| {
        (StatusCode::BAD_REQUEST, json_error("bad_id", format!("'{raw}' is not a listing id")))
            .into_response()
    })
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// GET /api/health
pub(super) async fn health(State(state): State<AppState>) -> Response {
    let provider = state.classifier.provider();
    let reachable = match tokio::time::timeout(Duration::from_secs(5), provider.ping()).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(provider = provider.name(), "provider ping failed: {e}");
            false
        }
        Err(_) => {
            warn!(provider = provider.name(), "provider ping timed out");
            false
        }
    };
    let listings = match state.store.count().await {
        Ok(n) => n,
        Err(e) => return store_error(e),
    };

    let body = json!({
        "status": "ok",
        "provider": provider.name(),
        "providerReachable": reachable,
        "categories": state.classifier.taxonomy().len(),
        "listings": listings,
    });
    (StatusCode::OK, Json(body)).into_response()
}

/// GET /api/categories
pub(super) async fn categories(State(state): State<AppState>) -> Response {
    let categories = state.classifier.taxonomy().list_categories();
    (StatusCode::OK, Json(json!({ "categories": categories }))).into_response()
}

/// POST /api/suggest-category
pub(super) async fn suggest_category(
    State(state): State<AppState>,
    Json(input): Json<ClassificationInput>,
) -> Response {
    let output = state.classifier.suggest_category(&input).await;
    (StatusCode::OK, Json(output)).into_response()
}

/// GET /api/classifier/diagnostics
pub(super) async fn diagnostics(State(state): State<AppState>) -> Response {
    let log = state.classifier.diagnostics();
    let body = json!({ "total": log.total(), "entries": log.snapshot() });
    (StatusCode::OK, Json(body)).into_response()
}

/// GET /api/listings
pub(super) async fn list_listings(
    State(state): State<AppState>,
    Query(query): Query<BrowseQuery>,
) -> Response {
    match state.store.list_all().await {
        Ok(all) => (StatusCode::OK, Json(browse(all, &query))).into_response(),
        Err(e) => store_error(e),
    }
}

/// POST /api/listings
pub(super) async fn create_listing(
    State(state): State<AppState>,
    Json(new): Json<NewListing>,
) -> Response {
    match state.store.create(new).await {
        Ok(listing) => (StatusCode::CREATED, Json(listing)).into_response(),
        Err(e) => store_error(e),
    }
}

/// GET /api/listings/{id}
pub(super) async fn get_listing(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.store.get(id).await {
        Ok(Some(listing)) => (StatusCode::OK, Json(listing)).into_response(),
        Ok(None) => store_error(StoreError::NotFound(id)),
        Err(e) => store_error(e),
    }
}

/// PATCH /api/listings/{id}
pub(super) async fn update_listing(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<ListingPatch>,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.store.update(id, patch).await {
        Ok(listing) => (StatusCode::OK, Json(listing)).into_response(),
        Err(e) => store_error(e),
    }
}

/// DELETE /api/listings/{id}
pub(super) async fn delete_listing(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.store.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => store_error(e),
    }
}

//! Axum HTTP API — serves the marketplace endpoints under `/api/`.
//!
//! `serve()` drives the axum event loop until the [`CancellationToken`]
//! fires, then shuts down gracefully.
//!
//! ## URL layout
//!
//! ```text
//! GET    /api/health
//! GET    /api/categories
//! POST   /api/suggest-category
//! GET    /api/classifier/diagnostics
//! GET    /api/listings            ?category&status&q&minPrice&maxPrice&sellerId&sort&page&pageSize
//! POST   /api/listings
//! GET    /api/listings/{id}
//! PATCH  /api/listings/{id}
//! DELETE /api/listings/{id}
//! ```

mod api;

use std::future::Future;
use std::io;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::classify::ConstrainedClassifier;
use crate::error::AppError;
use crate::listings::ListingStore;

/// Router state injected into every handler via [`axum::extract::State`].
///
/// Cheap to clone — all fields are reference-counted.
#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<ConstrainedClassifier>,
    pub store: Arc<ListingStore>,
}

impl AppState {
    pub fn new(classifier: ConstrainedClassifier, store: ListingStore) -> Self {
        Self { classifier: Arc::new(classifier), store: Arc::new(store) }
    }
}

/// Bind `bind_addr` and serve until `shutdown` is cancelled.
pub async fn serve(bind_addr: &str, state: AppState, shutdown: CancellationToken) -> Result<(), AppError> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| AppError::Server(format!("bind failed on {bind_addr}: {e}")))?;

    info!(%bind_addr, "http api listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Server(format!("axum server error: {e}")))?;

    info!("http api shut down");
    Ok(())
}

/// Cancel `shutdown` once `signal` (normally `tokio::signal::ctrl_c()`)
/// fires. A signal handler that fails to install leaves the server running.
pub async fn cancel_on_signal<F>(signal: F, shutdown: CancellationToken)
where
    F: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("ctrl-c received — shutting down");
            shutdown.cancel();
        }
        Err(e) => error!("failed to listen for ctrl-c: {e}"),
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health",                 get(api::health))
        .route("/api/categories",             get(api::categories))
        .route("/api/suggest-category",       post(api::suggest_category))
        .route("/api/classifier/diagnostics", get(api::diagnostics))
        .route("/api/listings",               get(api::list_listings).post(api::create_listing))
        .route(
            "/api/listings/{id}",
            get(api::get_listing).patch(api::update_listing).delete(api::delete_listing),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signal_cancels_shutdown() {
        let token = CancellationToken::new();
        cancel_on_signal(async { Ok(()) }, token.clone()).await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn failed_signal_handler_keeps_serving() {
        let token = CancellationToken::new();
        cancel_on_signal(async { Err(io::Error::other("no signal support")) }, token.clone()).await;
        assert!(!token.is_cancelled());
    }
}

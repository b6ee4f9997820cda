//! campus-market — HTTP API entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config (taxonomy validated here)
//!   3. Init logger at the configured level
//!   4. Build the LLM provider, classifier, and listing store
//!   5. Serve until Ctrl-C

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use campus_market::classify::ConstrainedClassifier;
use campus_market::error::AppError;
use campus_market::http::{self, AppState};
use campus_market::listings::ListingStore;
use campus_market::llm::providers;
use campus_market::{config, logger};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present — ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let config = config::load()?;
    logger::init(&config.log_level)?;

    info!(
        bind = %config.server.bind,
        categories = ?config.taxonomy.labels(),
        provider = %config.llm.provider,
        "config loaded"
    );

    let provider = providers::build(&config.llm, config.llm_api_key.clone())
        .map_err(|e| AppError::Config(e.to_string()))?;
    if config.llm.provider != "dummy" && config.llm_api_key.is_none() {
        warn!("LLM_API_KEY is not set — requests are sent without authorization");
    }

    let classifier = ConstrainedClassifier::new(provider, config.taxonomy.clone(), &config.classifier);
    let store = ListingStore::open(&config.store, config.taxonomy.clone())?;

    let shutdown = CancellationToken::new();
    tokio::spawn(http::cancel_on_signal(tokio::signal::ctrl_c(), shutdown.clone()));

    http::serve(&config.server.bind, AppState::new(classifier, store), shutdown).await
}

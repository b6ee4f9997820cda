//! Text-generation provider abstraction.
//!
//! `LlmProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Provider instances are shared immutable capabilities — clone them freely.
//! Every call carries an [`OutputSchema`]; providers that support structured
//! output forward it to the service, but callers must still validate what
//! comes back.

pub mod providers;

use serde::Serialize;
use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("provider request failed: {0}")]
    Request(String),
    #[error("provider returned unusable output: {0}")]
    InvalidOutput(String),
}

// ── Request / response types ──────────────────────────────────────────────────

/// JSON schema the generated output is asked to conform to.
#[derive(Debug, Clone, Serialize)]
pub struct OutputSchema {
    /// Short identifier sent with the schema (`[a-zA-Z0-9_-]`).
    pub name: String,
    pub schema: serde_json::Value,
}

/// Token counts reported by the service, when available.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LlmUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cached_input_tokens: u64,
}

/// One structured generation result.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Parsed JSON output. Not yet checked against the schema.
    pub output: serde_json::Value,
    pub usage: Option<LlmUsage>,
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
///
/// Enum dispatch avoids `dyn` trait objects and the `async-trait` dependency.
/// Adding a backend = new module + new variant + new match arms.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Dummy(providers::dummy::DummyProvider),
    OpenAiCompatible(providers::openai_compatible::OpenAiCompatibleProvider),
}

impl LlmProvider {
    /// Send `prompt` (plus optional `system` instructions) and return the
    /// structured output requested by `schema`.
    pub async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        schema: &OutputSchema,
    ) -> Result<LlmResponse, ProviderError> {
        match self {
            LlmProvider::Dummy(p) => p.generate(prompt, system, schema).await,
            LlmProvider::OpenAiCompatible(p) => p.generate(prompt, system, schema).await,
        }
    }

    /// Reachability probe. The dummy provider is always reachable.
    pub async fn ping(&self) -> Result<(), ProviderError> {
        match self {
            LlmProvider::Dummy(_) => Ok(()),
            LlmProvider::OpenAiCompatible(p) => p.ping().await,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::Dummy(_) => "dummy",
            LlmProvider::OpenAiCompatible(_) => "openai-compatible",
        }
    }
}

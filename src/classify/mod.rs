//! Constrained category classifier.
//!
//! Suggests at most one taxonomy category for a listing draft. Output is
//! constrained twice: the provider is asked for a schema that enumerates
//! the taxonomy, and whatever comes back is checked for membership again
//! before it leaves this module. Anything that is not a member, and every
//! failure on the way, becomes "no suggestion" plus a [`Diagnostic`].
//!
//! ```text
//! ClassificationInput ─► CategoryPrompt ─► LlmProvider::generate(schema)
//!                                              │ (timeout-bounded)
//!                                              ▼
//!                                        validate() ─► Verdict
//!                                              │
//!                      Accepted ─► Some(category)   everything else ─► None
//! ```

pub mod diagnostics;
pub mod prompt;
pub mod schema;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::ClassifierConfig;
use crate::llm::{LlmProvider, OutputSchema};
use crate::taxonomy::{Category, Taxonomy};

use diagnostics::{Diagnostic, DiagnosticLog};
use prompt::CategoryPrompt;
use schema::SUGGESTED_CATEGORY_FIELD;

const SYSTEM_PROMPT: &str =
    "You are a strict classifier for a campus marketplace. Reply with JSON only.";

/// Listing text to classify. Both fields are free text; either may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl ClassificationInput {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self { title: title.into(), description: description.into() }
    }

    fn is_blank(&self) -> bool {
        self.title.trim().is_empty() && self.description.trim().is_empty()
    }
}

/// `{ "suggestedCategory": "<label>" | null }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationOutput {
    pub suggested_category: Option<Category>,
}

impl ClassificationOutput {
    pub fn none() -> Self {
        Self { suggested_category: None }
    }
}

/// How a raw service output relates to the taxonomy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// A taxonomy member.
    Accepted(Category),
    /// An explicit `null`: the model declined to guess.
    Declined,
    /// A string that is not a taxonomy member.
    OutOfTaxonomy(String),
    /// Not the declared shape at all.
    Malformed(String),
}

/// Check a raw output object against `taxonomy`. Pure and deterministic.
pub fn validate(taxonomy: &Taxonomy, raw: &Value) -> Verdict {
    let Some(object) = raw.as_object() else {
        return Verdict::Malformed(format!("expected a JSON object, got {raw}"));
    };
    match object.get(SUGGESTED_CATEGORY_FIELD) {
        None => Verdict::Malformed(format!("missing field '{SUGGESTED_CATEGORY_FIELD}'")),
        Some(Value::Null) => Verdict::Declined,
        Some(Value::String(label)) => match taxonomy.lookup(label) {
            Some(category) => Verdict::Accepted(category),
            None => Verdict::OutOfTaxonomy(label.clone()),
        },
        Some(other) => Verdict::Malformed(format!(
            "'{SUGGESTED_CATEGORY_FIELD}' must be a string or null, got {other}"
        )),
    }
}

/// Stateless classifier; clone-cheap apart from the shared diagnostic log.
#[derive(Debug, Clone)]
pub struct ConstrainedClassifier {
    provider: LlmProvider,
    taxonomy: Taxonomy,
    prompt: Arc<CategoryPrompt>,
    schema: Arc<OutputSchema>,
    timeout: Duration,
    diagnostics: Arc<DiagnosticLog>,
}

impl ConstrainedClassifier {
    /// Build from config. The taxonomy is already validated, so this
    /// cannot fail; a missing prompt file falls back to the built-in template.
    pub fn new(provider: LlmProvider, taxonomy: Taxonomy, config: &ClassifierConfig) -> Self {
        Self::with_prompts_dir(provider, taxonomy, config, config.prompts_dir.clone())
    }

    fn with_prompts_dir(
        provider: LlmProvider,
        taxonomy: Taxonomy,
        config: &ClassifierConfig,
        prompts_dir: PathBuf,
    ) -> Self {
        let no_fit = config.no_fit.as_ref().and_then(|c| taxonomy.lookup(c.as_str()));
        let prompt = CategoryPrompt::load(prompts_dir, &taxonomy, no_fit.as_ref());
        let schema = schema::output_schema(&taxonomy);
        Self {
            provider,
            taxonomy,
            prompt: Arc::new(prompt),
            schema: Arc::new(schema),
            timeout: Duration::from_secs(config.timeout_seconds),
            diagnostics: Arc::new(DiagnosticLog::new(config.audit_capacity)),
        }
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn provider(&self) -> &LlmProvider {
        &self.provider
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.diagnostics
    }

    /// See [`validate`].
    pub fn validate(&self, raw: &Value) -> Verdict {
        validate(&self.taxonomy, raw)
    }

    /// Suggest a category for `input`. Never fails: every problem collapses
    /// to `suggested_category: None` and is recorded as a diagnostic.
    pub async fn suggest_category(&self, input: &ClassificationInput) -> ClassificationOutput {
        if input.is_blank() {
            debug!("blank listing text — skipping category suggestion");
            return ClassificationOutput::none();
        }

        let prompt = self.prompt.render(input);
        let call = self.provider.generate(&prompt, Some(SYSTEM_PROMPT), &self.schema);

        let response = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                self.record_failure(input, e.to_string());
                return ClassificationOutput::none();
            }
            Err(_) => {
                self.record_failure(
                    input,
                    format!("timed out after {}s", self.timeout.as_secs_f32()),
                );
                return ClassificationOutput::none();
            }
        };

        if let Some(usage) = &response.usage {
            debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                cached_tokens = usage.cached_input_tokens,
                "category suggestion usage"
            );
        }

        match self.validate(&response.output) {
            Verdict::Accepted(category) => {
                debug!(category = %category, "category suggested");
                ClassificationOutput { suggested_category: Some(category) }
            }
            Verdict::Declined => {
                debug!("model declined to suggest a category");
                ClassificationOutput::none()
            }
            Verdict::OutOfTaxonomy(value) => {
                self.diagnostics.record(Diagnostic::OutOfTaxonomy { value, input: input.clone() });
                ClassificationOutput::none()
            }
            Verdict::Malformed(reason) => {
                self.record_failure(input, format!("malformed output: {reason}"));
                ClassificationOutput::none()
            }
        }
    }

    fn record_failure(&self, input: &ClassificationInput, error: String) {
        self.diagnostics.record(Diagnostic::ServiceFailure { error, input: input.clone() });
    }
}

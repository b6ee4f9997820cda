//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory
//! (or the file named by `CAMPUS_MARKET_CONFIG`), then applies
//! `CAMPUS_MARKET_BIND` and `CAMPUS_MARKET_LOG_LEVEL` env overrides.
//! The taxonomy is validated here so a bad label list stops startup.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;
use crate::taxonomy::{Category, DEFAULT_CATEGORIES, Taxonomy};

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address the API listens on.
    pub bind: String,
}

/// OpenAI / OpenAI-compatible provider configuration.
/// Populated from `[llm.openai]` in the TOML.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body.
    pub model: String,
    /// Sampling temperature (ignored for models that forbid it).
    pub temperature: f32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// LLM provider configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"dummy"`, `"openai"`, `"openai-compatible"`).
    /// Maps to `default` in `[llm]` TOML.
    pub provider: String,
    pub openai: OpenAiConfig,
}

/// Category-suggestion settings (`[classifier]`).
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Upper bound on a single provider call, in seconds.
    pub timeout_seconds: u64,
    /// Directory holding `category_suggest.txt`.
    pub prompts_dir: PathBuf,
    /// Label the model is told to use when nothing else fits.
    /// Always a taxonomy member when present.
    pub no_fit: Option<Category>,
    /// How many diagnostic events are retained for `/api/classifier/diagnostics`.
    pub audit_capacity: usize,
}

/// Where listings live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    #[cfg(feature = "sqlite")]
    Sqlite(PathBuf),
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub server: ServerConfig,
    pub taxonomy: Taxonomy,
    pub classifier: ClassifierConfig,
    pub llm: LlmConfig,
    /// API key from `LLM_API_KEY` env var — `None` for keyless local models.
    /// Never sourced from TOML.
    pub llm_api_key: Option<String>,
    pub store: StoreBackend,
}

/// Raw TOML shape — `serde` target before resolution.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    server: RawServer,
    #[serde(default)]
    taxonomy: RawTaxonomy,
    #[serde(default)]
    classifier: RawClassifier,
    #[serde(default)]
    llm: RawLlm,
    #[serde(default)]
    store: RawStore,
}

#[derive(Deserialize)]
struct RawServer {
    #[serde(default = "default_bind")]
    bind: String,
    #[serde(default = "default_log_level")]
    log_level: String,
}

impl Default for RawServer {
    fn default() -> Self {
        Self { bind: default_bind(), log_level: default_log_level() }
    }
}

#[derive(Deserialize)]
struct RawTaxonomy {
    #[serde(default = "default_categories")]
    categories: Vec<String>,
}

impl Default for RawTaxonomy {
    fn default() -> Self {
        Self { categories: default_categories() }
    }
}

#[derive(Deserialize)]
struct RawClassifier {
    #[serde(default = "default_classifier_timeout_seconds")]
    timeout_seconds: u64,
    #[serde(default = "default_prompts_dir")]
    prompts_dir: String,
    /// Missing → `"Other"` when the taxonomy has it; `""` → disabled.
    #[serde(default)]
    no_fit_label: Option<String>,
    #[serde(default = "default_audit_capacity")]
    audit_capacity: usize,
}

impl Default for RawClassifier {
    fn default() -> Self {
        Self {
            timeout_seconds: default_classifier_timeout_seconds(),
            prompts_dir: default_prompts_dir(),
            no_fit_label: None,
            audit_capacity: default_audit_capacity(),
        }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    /// Maps to `default = "..."` in `[llm]`.
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default)]
    openai: RawOpenAiConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self { provider: default_llm_provider(), openai: RawOpenAiConfig::default() }
    }
}

#[derive(Deserialize)]
struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_openai_model")]
    model: String,
    #[serde(default = "default_openai_temperature")]
    temperature: f32,
    #[serde(default = "default_openai_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            temperature: default_openai_temperature(),
            timeout_seconds: default_openai_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
struct RawStore {
    #[serde(default = "default_store_backend")]
    backend: String,
    #[serde(default = "default_store_path")]
    path: String,
}

impl Default for RawStore {
    fn default() -> Self {
        Self { backend: default_store_backend(), path: default_store_path() }
    }
}

fn default_bind() -> String { "127.0.0.1:8080".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_categories() -> Vec<String> { DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect() }
fn default_classifier_timeout_seconds() -> u64 { 15 }
fn default_prompts_dir() -> String { "config/prompts".to_string() }
fn default_audit_capacity() -> usize { 100 }
fn default_llm_provider() -> String { "dummy".to_string() }
fn default_openai_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_openai_model() -> String { "gpt-4o-mini".to_string() }
fn default_openai_temperature() -> f32 { 0.0 }
fn default_openai_timeout_seconds() -> u64 { 20 }
fn default_store_backend() -> String { "memory".to_string() }
fn default_store_path() -> String { "~/.campus-market/listings.db".to_string() }

const DEFAULT_NO_FIT_LABEL: &str = "Other";

/// Upper bound for `classifier.audit_capacity`.
pub const MAX_AUDIT_CAPACITY: usize = 100_000;

/// Load config from disk, then apply env-var overrides.
pub fn load() -> Result<Config, AppError> {
    let path = env::var("CAMPUS_MARKET_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
    let bind_override = env::var("CAMPUS_MARKET_BIND").ok();
    let log_level_override = env::var("CAMPUS_MARKET_LOG_LEVEL").ok();
    load_from(
        Path::new(&path),
        bind_override.as_deref(),
        log_level_override.as_deref(),
    )
}

/// Internal loader — accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    bind_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
    let mut config = parse(&raw)
        .map_err(|e| AppError::Config(format!("{}: {e}", path.display())))?;

    if let Some(bind) = bind_override {
        config.server.bind = bind.to_string();
    }
    if let Some(level) = log_level_override {
        config.log_level = level.to_string();
    }
    config.llm_api_key = env::var("LLM_API_KEY").ok().filter(|k| !k.is_empty());
    Ok(config)
}

/// Parse and resolve a TOML document. The API key is left unset.
pub fn parse(toml_text: &str) -> Result<Config, String> {
    let parsed: RawConfig = toml::from_str(toml_text).map_err(|e| format!("parse error: {e}"))?;

    let taxonomy = Taxonomy::new(&parsed.taxonomy.categories)
        .map_err(|e| format!("invalid [taxonomy]: {e}"))?;

    let no_fit = match parsed.classifier.no_fit_label.as_deref().map(str::trim) {
        None => taxonomy.lookup(DEFAULT_NO_FIT_LABEL),
        Some("") => None,
        Some(label) => Some(taxonomy.lookup(label).ok_or_else(|| {
            format!("classifier.no_fit_label '{label}' is not a taxonomy category")
        })?),
    };

    if parsed.classifier.timeout_seconds == 0 {
        return Err("classifier.timeout_seconds must be greater than zero".into());
    }
    if parsed.classifier.audit_capacity > MAX_AUDIT_CAPACITY {
        return Err(format!("classifier.audit_capacity must be at most {MAX_AUDIT_CAPACITY}"));
    }

    let store = match parsed.store.backend.as_str() {
        "memory" => StoreBackend::Memory,
        #[cfg(feature = "sqlite")]
        "sqlite" => StoreBackend::Sqlite(expand_home(&parsed.store.path)),
        other => return Err(format!("unsupported store.backend '{other}'")),
    };

    Ok(Config {
        log_level: parsed.server.log_level,
        server: ServerConfig { bind: parsed.server.bind },
        taxonomy,
        classifier: ClassifierConfig {
            timeout_seconds: parsed.classifier.timeout_seconds,
            prompts_dir: expand_home(&parsed.classifier.prompts_dir),
            no_fit,
            audit_capacity: parsed.classifier.audit_capacity,
        },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            openai: OpenAiConfig {
                api_base_url: parsed.llm.openai.api_base_url,
                model: parsed.llm.openai.model,
                temperature: parsed.llm.openai.temperature,
                timeout_seconds: parsed.llm.openai.timeout_seconds,
            },
        },
        llm_api_key: None,
        store,
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

// ── test helpers ──────────────────────────────────────────────────────────────

/// Safe `Config` for tests — dummy LLM, memory store, no API keys.
impl Config {
    pub fn test_default() -> Self {
        let taxonomy = Taxonomy::default();
        Self {
            log_level: "info".into(),
            server: ServerConfig { bind: "127.0.0.1:0".into() },
            classifier: ClassifierConfig {
                timeout_seconds: 1,
                prompts_dir: PathBuf::from("config/prompts"),
                no_fit: taxonomy.lookup(DEFAULT_NO_FIT_LABEL),
                audit_capacity: 16,
            },
            taxonomy,
            llm: LlmConfig {
                provider: "dummy".into(),
                openai: OpenAiConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    model: "test-model".into(),
                    temperature: 0.0,
                    timeout_seconds: 1,
                },
            },
            llm_api_key: None,
            store: StoreBackend::Memory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL_TOML: &str = r#"
[server]
bind = "0.0.0.0:9000"
log_level = "info"
"#;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg.server.bind, "127.0.0.1:8080");
        assert_eq!(cfg.taxonomy.labels(), DEFAULT_CATEGORIES.to_vec());
        assert_eq!(cfg.classifier.no_fit.as_ref().map(Category::as_str), Some("Other"));
        assert_eq!(cfg.classifier.timeout_seconds, 15);
        assert_eq!(cfg.llm.provider, "dummy");
        assert_eq!(cfg.store, StoreBackend::Memory);
    }

    #[test]
    fn parse_basic_config() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.server.bind, "0.0.0.0:9000");
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn custom_taxonomy_without_other_disables_sentinel() {
        let cfg = parse("[taxonomy]\ncategories = [\"Books\", \"Bikes\"]\n").unwrap();
        assert_eq!(cfg.taxonomy.labels(), vec!["Books", "Bikes"]);
        assert!(cfg.classifier.no_fit.is_none());
    }

    #[test]
    fn explicit_sentinel_must_be_member() {
        let err = parse("[classifier]\nno_fit_label = \"Misc\"\n").unwrap_err();
        assert!(err.contains("not a taxonomy category"));
    }

    #[test]
    fn blank_sentinel_disables() {
        let cfg = parse("[classifier]\nno_fit_label = \"\"\n").unwrap();
        assert!(cfg.classifier.no_fit.is_none());
    }

    #[test]
    fn empty_taxonomy_is_fatal() {
        let err = parse("[taxonomy]\ncategories = []\n").unwrap_err();
        assert!(err.contains("invalid [taxonomy]"));
    }

    #[test]
    fn duplicate_taxonomy_is_fatal() {
        let err = parse("[taxonomy]\ncategories = [\"Books\", \"Books\"]\n").unwrap_err();
        assert!(err.contains("duplicate"));
    }

    #[test]
    fn zero_timeout_rejected() {
        assert!(parse("[classifier]\ntimeout_seconds = 0\n").is_err());
    }

    #[test]
    fn oversized_audit_capacity_rejected() {
        let err = parse("[classifier]\naudit_capacity = 1000000000\n").unwrap_err();
        assert!(err.contains("audit_capacity"));
        let cfg = parse(&format!("[classifier]\naudit_capacity = {MAX_AUDIT_CAPACITY}\n")).unwrap();
        assert_eq!(cfg.classifier.audit_capacity, MAX_AUDIT_CAPACITY);
    }

    #[test]
    fn unknown_store_backend_rejected() {
        let err = parse("[store]\nbackend = \"firestore\"\n").unwrap_err();
        assert!(err.contains("firestore"));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn sqlite_backend_expands_path() {
        let cfg = parse("[store]\nbackend = \"sqlite\"\npath = \"/tmp/listings.db\"\n").unwrap();
        assert_eq!(cfg.store, StoreBackend::Sqlite(PathBuf::from("/tmp/listings.db")));
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = dirs::home_dir().expect("home dir must exist in test env");
        let expanded = expand_home("~/.campus-market");
        assert!(expanded.starts_with(&home));
        assert!(expanded.ends_with(".campus-market"));
    }

    #[test]
    fn absolute_path_unchanged() {
        assert_eq!(expand_home("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn missing_file_errors() {
        let result = load_from(Path::new("/nonexistent/config.toml"), None, None);
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("config error"));
    }

    #[test]
    fn env_overrides_apply() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), Some("127.0.0.1:1234"), Some("debug")).unwrap();
        assert_eq!(cfg.server.bind, "127.0.0.1:1234");
        assert_eq!(cfg.log_level, "debug");
    }
}

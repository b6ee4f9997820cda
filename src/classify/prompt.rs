//! Prompt assembly for category suggestion.
//!
//! Templates are plain-text files under `config/prompts/`. Variable
//! substitution uses `{{key}}` syntax and runs in a single pass, so text
//! supplied by a seller (which may itself contain `{{…}}`) is never
//! re-expanded.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::taxonomy::{Category, Taxonomy};

use super::ClassificationInput;

const SEPARATOR: &str = "\n\n";

/// Template file loaded from the prompts directory.
pub const CATEGORY_TEMPLATE_FILE: &str = "category_suggest.txt";

/// Used when `category_suggest.txt` is missing so a misconfigured prompts
/// directory degrades instead of failing startup.
const FALLBACK_TEMPLATE: &str = "\
Choose the single best category for this campus marketplace listing.
Allowed categories (answer with one label exactly as written):
{{categories}}
{{no_fit}}
If the listing is too vague to judge, answer null.

Title: {{title}}
Description: {{description}}";

/// Fluent builder that assembles a prompt from template files with
/// built-in fallbacks.
pub struct PromptBuilder {
    prompts_dir: PathBuf,
    parts: Vec<String>,
    vars: HashMap<String, String>,
}

impl PromptBuilder {
    /// Create a builder rooted at `prompts_dir` (e.g. `"config/prompts"`).
    pub fn new(prompts_dir: impl Into<PathBuf>) -> Self {
        Self {
            prompts_dir: prompts_dir.into(),
            parts: Vec::new(),
            vars: HashMap::new(),
        }
    }

    /// Append a layer loaded from `filename` in the prompts directory, or
    /// `fallback` when the file is missing or unreadable. Blank layers are
    /// skipped.
    pub fn layer_or(mut self, filename: &str, fallback: &str) -> Self {
        let path = self.prompts_dir.join(filename);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!("prompt: layer '{}' not loaded ({e}) — using fallback", path.display());
                fallback.to_string()
            }
        };
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            self.parts.push(trimmed.to_string());
        }
        self
    }

    /// Register a single `{{key}}` → `value` substitution.
    pub fn var(mut self, key: &str, value: impl Into<String>) -> Self {
        self.vars.insert(key.to_string(), value.into());
        self
    }

    /// Join all layers and apply variable substitution.
    pub fn build(self) -> String {
        render(&self.parts.join(SEPARATOR), &self.vars)
    }
}

/// Replace every `{{key}}` found in `template`. Unknown keys are left as-is.
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                match vars.get(key) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// The category-suggestion template with the taxonomy already baked in.
/// Loaded once when the classifier is built.
#[derive(Debug, Clone)]
pub struct CategoryPrompt {
    template: String,
}

impl CategoryPrompt {
    pub fn load(prompts_dir: impl Into<PathBuf>, taxonomy: &Taxonomy, no_fit: Option<&Category>) -> Self {
        let categories = taxonomy
            .list_categories()
            .iter()
            .map(|c| format!("- {c}"))
            .collect::<Vec<_>>()
            .join("\n");
        let no_fit = no_fit
            .map(|c| format!("- If the item is clear but none of the specific categories fit, answer \"{c}\"."))
            .unwrap_or_default();

        let template = PromptBuilder::new(prompts_dir)
            .layer_or(CATEGORY_TEMPLATE_FILE, FALLBACK_TEMPLATE)
            .var("categories", categories)
            .var("no_fit", no_fit)
            .build();
        Self { template }
    }

    /// Fill in the listing fields.
    pub fn render(&self, input: &ClassificationInput) -> String {
        let vars = HashMap::from([
            ("title".to_string(), input.title.trim().to_string()),
            ("description".to_string(), input.description.trim().to_string()),
        ]);
        render(&self.template, &vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn input(title: &str, description: &str) -> ClassificationInput {
        ClassificationInput { title: title.into(), description: description.into() }
    }

    #[test]
    fn render_replaces_known_keys_only() {
        let vars = HashMap::from([("a".to_string(), "1".to_string())]);
        assert_eq!(render("x {{a}} {{ a }} {{b}}", &vars), "x 1 1 {{b}}");
    }

    #[test]
    fn render_is_single_pass() {
        let vars = HashMap::from([
            ("title".to_string(), "{{description}}".to_string()),
            ("description".to_string(), "secret".to_string()),
        ]);
        assert_eq!(render("{{title}}|{{description}}", &vars), "{{description}}|secret");
    }

    #[test]
    fn render_keeps_unterminated_braces() {
        assert_eq!(render("a {{b", &HashMap::new()), "a {{b");
    }

    #[test]
    fn builder_falls_back_and_joins_layers() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "  first {{x}}  \n").unwrap();
        let out = PromptBuilder::new(dir.path())
            .layer_or("a.txt", "unused")
            .layer_or("missing.txt", "second")
            .layer_or("also-missing.txt", "  ")
            .var("x", "X")
            .build();
        assert_eq!(out, "first X\n\nsecond");
    }

    #[test]
    fn fallback_template_lists_every_category() {
        let dir = tempfile::tempdir().unwrap();
        let taxonomy = Taxonomy::default();
        let prompt = CategoryPrompt::load(dir.path(), &taxonomy, taxonomy.lookup("Other").as_ref());
        let text = prompt.render(&input("Calculus textbook", "8th edition, lightly used"));
        for label in taxonomy.labels() {
            assert!(text.contains(&format!("- {label}")), "missing {label}");
        }
        assert!(text.contains("answer \"Other\""));
        assert!(text.contains("Title: Calculus textbook"));
        assert!(text.contains("Description: 8th edition, lightly used"));
    }

    #[test]
    fn no_fit_line_omitted_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let prompt = CategoryPrompt::load(dir.path(), &Taxonomy::default(), None);
        assert!(!prompt.render(&input("a", "b")).contains("none of the specific categories"));
    }

    #[test]
    fn file_template_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CATEGORY_TEMPLATE_FILE), "[{{categories}}] {{title}}/{{description}}").unwrap();
        let taxonomy = Taxonomy::new(["Books", "Bikes"]).unwrap();
        let prompt = CategoryPrompt::load(dir.path(), &taxonomy, None);
        assert_eq!(prompt.render(&input(" Road bike ", "")), "[- Books\n- Bikes] Road bike/");
    }
}

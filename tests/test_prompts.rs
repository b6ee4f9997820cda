//! Tests for the category prompt shipped in config/prompts

use std::fs;
use std::path::{Path, PathBuf};

use campus_market::classify::ClassificationInput;
use campus_market::classify::prompt::{CATEGORY_TEMPLATE_FILE, CategoryPrompt};
use campus_market::taxonomy::Taxonomy;

fn prompts_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("config/prompts")
}

#[test]
fn test_category_prompt_file_exists() {
    assert!(
        prompts_dir().join(CATEGORY_TEMPLATE_FILE).exists(),
        "category_suggest.txt prompt file missing"
    );
}

#[test]
fn test_category_prompt_template_vars() {
    let text = fs::read_to_string(prompts_dir().join(CATEGORY_TEMPLATE_FILE)).unwrap();
    for var in ["{{categories}}", "{{no_fit}}", "{{title}}", "{{description}}"] {
        assert!(text.contains(var), "category_suggest.txt should contain {var}");
    }
}

#[test]
fn test_rendered_prompt_has_no_placeholders_left() {
    let taxonomy = Taxonomy::default();
    let prompt = CategoryPrompt::load(prompts_dir(), &taxonomy, taxonomy.lookup("Other").as_ref());
    let text = prompt.render(&ClassificationInput::new("IKEA desk", "White, 120cm, pick up from dorm B"));

    assert!(!text.contains("{{"), "unrendered placeholder in:\n{text}");
    for label in taxonomy.labels() {
        assert!(text.contains(&format!("- {label}")), "label {label} missing");
    }
    assert!(text.contains("IKEA desk"));
    assert!(text.contains("pick up from dorm B"));
}

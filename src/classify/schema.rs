//! Declared output schema for category suggestion.

use serde_json::{Value, json};

use crate::llm::OutputSchema;
use crate::taxonomy::Taxonomy;

/// Name of the single output field.
pub const SUGGESTED_CATEGORY_FIELD: &str = "suggestedCategory";

const SCHEMA_NAME: &str = "category_suggestion";

/// `{ suggestedCategory: one of <labels> | null }`, strict: no other keys.
pub fn output_schema(taxonomy: &Taxonomy) -> OutputSchema {
    let mut allowed: Vec<Value> = taxonomy.labels().into_iter().map(Value::from).collect();
    allowed.push(Value::Null);

    OutputSchema {
        name: SCHEMA_NAME.to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                SUGGESTED_CATEGORY_FIELD: {
                    "type": ["string", "null"],
                    "enum": allowed,
                }
            },
            "required": [SUGGESTED_CATEGORY_FIELD],
            "additionalProperties": false,
        }),
    }
}

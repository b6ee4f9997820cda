//! Dummy provider — offline stand-in for a real generation service.
//!
//! By default it answers every declared schema property with `null`, which
//! the classifier reads as "no suggestion". Tests and local runs can pin a
//! fixed output, a fixed failure, or an artificial delay.

use std::time::Duration;

use serde_json::{Map, Value};

use crate::llm::{LlmResponse, OutputSchema, ProviderError};

#[derive(Debug, Clone)]
enum Reply {
    NullFields,
    Output(Value),
    Fail(String),
}

#[derive(Debug, Clone)]
pub struct DummyProvider {
    reply: Reply,
    delay: Option<Duration>,
}

impl DummyProvider {
    pub fn new() -> Self {
        Self { reply: Reply::NullFields, delay: None }
    }

    /// Always return `output`, whatever the schema says.
    pub fn with_output(output: Value) -> Self {
        Self { reply: Reply::Output(output), delay: None }
    }

    /// Always fail with a request error carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self { reply: Reply::Fail(message.into()), delay: None }
    }

    /// Sleep for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn generate(
        &self,
        _prompt: &str,
        _system: Option<&str>,
        schema: &OutputSchema,
    ) -> Result<LlmResponse, ProviderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let output = match &self.reply {
            Reply::NullFields => null_fields(&schema.schema),
            Reply::Output(v) => v.clone(),
            Reply::Fail(msg) => return Err(ProviderError::Request(msg.clone())),
        };
        Ok(LlmResponse { output, usage: None })
    }
}

impl Default for DummyProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn null_fields(schema: &Value) -> Value {
    let fields = schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| props.keys().map(|k| (k.clone(), Value::Null)).collect::<Map<_, _>>())
        .unwrap_or_default();
    Value::Object(fields)
}

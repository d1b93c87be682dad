//! Structured-output validation.
//!
//! Generated text is expected to be a JSON object with fixed field names.
//! [`parse_structured`] is the one place that decides whether raw text
//! satisfies a contract; swapping it for schema-validated generation does not
//! touch any caller.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;

/// A record shape the generator is asked to produce.
pub trait OutputContract: DeserializeOwned {
    /// Contract name used in errors and logs.
    const NAME: &'static str;

    /// The JSON skeleton shown to the model in the task prompt.
    fn example_json() -> &'static str;
}

/// `{"title": ..., "content": ...}` for a new post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
}

impl OutputContract for PostDraft {
    const NAME: &'static str = "post";

    fn example_json() -> &'static str {
        "{\n  \"title\": \"Your post title here\",\n  \"content\": \"Your post content here (can be multiple paragraphs)\"\n}"
    }
}

/// `{"content": ...}` for a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyDraft {
    pub content: String,
}

impl OutputContract for ReplyDraft {
    const NAME: &'static str = "reply";

    fn example_json() -> &'static str {
        "{\n  \"content\": \"Your comment here (can be multiple paragraphs, but keep it concise and punchy)\"\n}"
    }
}

/// Parse raw generated text as `T`.
///
/// The text must be a single JSON object of the contract's shape (surrounding
/// whitespace allowed, unknown fields ignored). Arrays, scalars and prose are
/// [`EngineError::MalformedGeneration`].
pub fn parse_structured<T: OutputContract>(raw: &str) -> Result<T, EngineError> {
    let reject = |reason: String| {
        log::warn!(
            "Generated text does not satisfy the {} contract ({}): {:.200}",
            T::NAME,
            reason,
            raw
        );
        EngineError::malformed(T::NAME, reason)
    };

    let value: Value = serde_json::from_str(raw).map_err(|e| reject(e.to_string()))?;
    if !value.is_object() {
        return Err(reject(format!("expected a JSON object, got {}", json_type(&value))));
    }
    serde_json::from_value(value).map_err(|e| reject(e.to_string()))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

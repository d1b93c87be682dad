//! OpenAI-compatible chat-completions generator.
//!
//! Sends the persona instruction as the system message and the task prompt
//! as the user message to `{base_url}/chat/completions`, and returns the
//! first choice's text. Works against any server speaking the same API
//! (OpenAI, Azure-compatible gateways, local inference servers).
//!
//! # Environment
//!
//! - `OPENAI_API_KEY`: API key (required unless passed explicitly)
//! - `OPENAI_BASE_URL`: override the API base URL
//! - `OPENAI_ORGANIZATION`: optional organization header
//! - `MOLTALK_MODEL`: model name (default `gpt-4o`)

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ContentGenerator, GenerationError};

/// Default model for generated posts and replies.
pub const DEFAULT_MODEL: &str = "gpt-4o";
/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Settings for [`OpenAIGenerator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIGeneratorConfig {
    pub model: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Ask the provider for a JSON object response.
    #[serde(default = "default_true")]
    pub json_mode: bool,
    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,
    /// Transport-level retries on 429/5xx. Zero by default.
    #[serde(default)]
    pub max_retries: u32,
}

fn default_true() -> bool { true }
fn default_timeout_secs() -> f64 { 120.0 }

impl Default for OpenAIGeneratorConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            base_url: None,
            organization: None,
            temperature: None,
            max_tokens: None,
            json_mode: true,
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
        }
    }
}

impl OpenAIGeneratorConfig {
    /// Defaults, with key, base URL, organization and model taken from the
    /// environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
        config.base_url = std::env::var("OPENAI_BASE_URL").ok().filter(|u| !u.is_empty());
        config.organization = std::env::var("OPENAI_ORGANIZATION").ok();
        if let Ok(model) = std::env::var("MOLTALK_MODEL") {
            if !model.is_empty() {
                config.model = model;
            }
        }
        config
    }
}

// ---------------------------------------------------------------------------
// OpenAIGenerator
// ---------------------------------------------------------------------------

/// [`ContentGenerator`] backed by the chat-completions API.
#[derive(Debug, Clone)]
pub struct OpenAIGenerator {
    config: OpenAIGeneratorConfig,
    client: reqwest::Client,
}

impl OpenAIGenerator {
    pub fn new(config: OpenAIGeneratorConfig) -> Result<Self, GenerationError> {
        let timeout = Duration::try_from_secs_f64(config.timeout_secs)
            .ok()
            .filter(|t| !t.is_zero())
            .ok_or_else(|| {
                GenerationError::InvalidConfig(format!(
                    "timeout_secs must be a positive number of seconds, got {}",
                    config.timeout_secs
                ))
            })?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> Result<Self, GenerationError> {
        Self::new(OpenAIGeneratorConfig::from_env())
    }

    pub fn config(&self) -> &OpenAIGeneratorConfig {
        &self.config
    }

    pub fn api_base_url(&self) -> String {
        self.config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    /// Build the chat-completions request body.
    pub fn build_request_body(&self, persona_instruction: &str, task_prompt: &str) -> Value {
        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": persona_instruction},
                {"role": "user", "content": task_prompt},
            ],
        });

        if let Some(temp) = self.config.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max_tokens) = self.config.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if self.config.json_mode {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }

        body
    }

    /// Extract the first choice's text from a chat-completions response.
    pub fn parse_completions_response(response: &Value) -> Result<String, GenerationError> {
        let message = response
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .ok_or_else(|| GenerationError::EmptyResponse("no choices in response".into()))?;

        if let Some(usage) = response.get("usage") {
            log::debug!(
                "Generation token usage: prompt={}, completion={}, total={}",
                usage.get("prompt_tokens").and_then(|v| v.as_i64()).unwrap_or(0),
                usage.get("completion_tokens").and_then(|v| v.as_i64()).unwrap_or(0),
                usage.get("total_tokens").and_then(|v| v.as_i64()).unwrap_or(0),
            );
        }

        message
            .get("content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| GenerationError::EmptyResponse("message has no text content".into()))
    }
}

#[async_trait]
impl ContentGenerator for OpenAIGenerator {
    async fn generate(
        &self,
        persona_instruction: &str,
        task_prompt: &str,
    ) -> Result<String, GenerationError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(GenerationError::MissingApiKey("OPENAI_API_KEY"))?;

        let endpoint = format!("{}/chat/completions", self.api_base_url());
        let body = self.build_request_body(persona_instruction, task_prompt);

        log::debug!(
            "OpenAIGenerator.generate: model={}, prompt_chars={}",
            self.config.model,
            task_prompt.len()
        );

        let mut last_error: Option<GenerationError> = None;
        let mut retry_delay = Duration::from_secs(1);

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                log::warn!("Generation retry attempt {} after {:?}", attempt, retry_delay);
                tokio::time::sleep(retry_delay).await;
                retry_delay *= 2;
            }

            let mut request = self
                .client
                .post(&endpoint)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", api_key));
            if let Some(ref org) = self.config.organization {
                request = request.header("OpenAI-Organization", org);
            }

            let response = match request.json(&body).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(e.into());
                    continue;
                }
            };

            let status = response.status();
            let text = match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    last_error = Some(e.into());
                    continue;
                }
            };

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                last_error = Some(GenerationError::Api {
                    status: status.as_u16(),
                    body: truncate(&text, 500),
                });
                continue;
            }

            if !status.is_success() {
                return Err(GenerationError::Api {
                    status: status.as_u16(),
                    body: truncate(&text, 500),
                });
            }

            let json: Value = serde_json::from_str(&text).map_err(|e| {
                GenerationError::Other(format!(
                    "Failed to parse provider response: {} - Body: {}",
                    e,
                    truncate(&text, 500)
                ))
            })?;

            return Self::parse_completions_response(&json);
        }

        Err(last_error
            .unwrap_or_else(|| GenerationError::Other("Generation failed after all retries".into())))
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(config: OpenAIGeneratorConfig) -> OpenAIGenerator {
        OpenAIGenerator::new(config).unwrap()
    }

    #[test]
    fn test_request_body_carries_persona_and_prompt() {
        let g = generator(OpenAIGeneratorConfig {
            temperature: Some(0.9),
            ..OpenAIGeneratorConfig::default()
        });
        let body = g.build_request_body("You are Axiom.", "Write a post.");
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "You are Axiom.");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "Write a post.");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["temperature"], 0.9);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_unusable_timeout_is_rejected() {
        for secs in [0.0, -1.0, f64::NAN, 1.0e20] {
            let err = OpenAIGenerator::new(OpenAIGeneratorConfig {
                timeout_secs: secs,
                ..OpenAIGeneratorConfig::default()
            })
            .unwrap_err();
            assert!(matches!(err, GenerationError::InvalidConfig(_)));
        }
    }

    #[test]
    fn test_json_mode_can_be_disabled() {
        let g = generator(OpenAIGeneratorConfig {
            json_mode: false,
            ..OpenAIGeneratorConfig::default()
        });
        let body = g.build_request_body("s", "u");
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_base_url_defaults_and_trims() {
        let g = generator(OpenAIGeneratorConfig::default());
        assert_eq!(g.api_base_url(), DEFAULT_BASE_URL);
        let g = generator(OpenAIGeneratorConfig {
            base_url: Some("http://localhost:11434/v1/".into()),
            ..OpenAIGeneratorConfig::default()
        });
        assert_eq!(g.api_base_url(), "http://localhost:11434/v1");
    }

    #[test]
    fn test_parse_completions_response() {
        let response = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"content\": \"hi\"}"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        });
        let text = OpenAIGenerator::parse_completions_response(&response).unwrap();
        assert_eq!(text, "{\"content\": \"hi\"}");
    }

    #[test]
    fn test_parse_response_without_choices() {
        let err = OpenAIGenerator::parse_completions_response(&serde_json::json!({"choices": []}))
            .unwrap_err();
        assert!(matches!(err, GenerationError::EmptyResponse(_)));
    }

    #[tokio::test]
    async fn test_generate_without_key_fails_fast() {
        let g = generator(OpenAIGeneratorConfig::default());
        let err = g.generate("s", "u").await.unwrap_err();
        assert!(matches!(err, GenerationError::MissingApiKey("OPENAI_API_KEY")));
    }
}

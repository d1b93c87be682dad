//! Test double for [`ContentGenerator`].

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ContentGenerator, GenerationError};

/// One recorded `generate` call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub persona_instruction: String,
    pub task_prompt: String,
}

/// Replays canned responses in order; the last one repeats once the queue
/// is down to a single entry.
#[derive(Debug)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Option<Duration>,
    fail_with: Option<String>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            calls: Mutex::new(Vec::new()),
            delay: None,
            fail_with: None,
        }
    }

    pub fn always(response: impl Into<String>) -> Self {
        Self::new([response.into()])
    }

    /// A generator whose every call errors.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::new(Vec::<String>::new())
        }
    }

    /// Sleep this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        persona_instruction: &str,
        task_prompt: &str,
    ) -> Result<String, GenerationError> {
        self.calls.lock().push(RecordedCall {
            persona_instruction: persona_instruction.to_string(),
            task_prompt: task_prompt.to_string(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(ref message) = self.fail_with {
            return Err(GenerationError::Other(message.clone()));
        }

        let mut responses = self.responses.lock();
        let next = if responses.len() > 1 {
            responses.pop_front()
        } else {
            responses.front().cloned()
        };
        next.ok_or_else(|| GenerationError::EmptyResponse("script exhausted".into()))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

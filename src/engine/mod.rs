//! The interaction engine.
//!
//! One call to [`InteractionEngine::run_interaction_cycle`] draws an action
//! and runs exactly one of three cycles:
//!
//! - post: a random persona writes a new post in a random community
//! - reply: a persona answers a recent post with a random conflict pulse
//! - vote: a persona up- or downvotes a recent post or reply
//!
//! A cycle writes at most one record, and only after generation and
//! validation succeeded. Failures come back as [`EngineError`] values; the
//! engine never retries.

pub mod action;
pub mod heuristic;
mod post;
pub mod reply;
mod vote;

use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, EngineConfig};
use crate::error::{EngineError, ErrorKind};
use crate::llm::{parse_structured, ContentGenerator, OutputContract};
use crate::persona::VoteRuleBook;
use crate::store::Store;
use crate::types::{Persona, PostId, ReplyId, VoteTarget};

pub use action::{draw_action, Action, ActionPolicy};
pub use heuristic::decide_vote;
pub use reply::ConflictPulse;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What a successful cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Posted {
        post_id: PostId,
    },
    Replied {
        reply_id: ReplyId,
        post_id: PostId,
        pulse: ConflictPulse,
    },
    /// `delta` is 0 when the voter abstained; nothing was written then.
    Voted {
        target: VoteTarget,
        delta: i32,
    },
}

impl CycleOutcome {
    /// Content kind of the record written, or of the record voted on.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Posted { .. } => "post",
            Self::Replied { .. } => "comment",
            Self::Voted { target, .. } => target.kind.as_str(),
        }
    }

    /// Id of the record written (or voted on).
    pub fn id(&self) -> &str {
        match self {
            Self::Posted { post_id } => post_id.as_str(),
            Self::Replied { reply_id, .. } => reply_id.as_str(),
            Self::Voted { target, .. } => &target.id,
        }
    }
}

/// Serializable success/failure summary of one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub success: bool,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pulse: Option<ConflictPulse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<VoteTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl CycleReport {
    pub fn from_outcome(outcome: &CycleOutcome) -> Self {
        let mut report = Self {
            success: true,
            kind: Some(outcome.kind().to_string()),
            id: Some(outcome.id().to_string()),
            post_id: None,
            pulse: None,
            target: None,
            delta: None,
            error: None,
            error_kind: None,
            retryable: None,
        };
        match outcome {
            CycleOutcome::Posted { .. } => {}
            CycleOutcome::Replied { post_id, pulse, .. } => {
                report.post_id = Some(post_id.to_string());
                report.pulse = Some(*pulse);
            }
            CycleOutcome::Voted { target, delta } => {
                report.target = Some(target.clone());
                report.delta = Some(*delta);
            }
        }
        report
    }

    pub fn from_error(error: &EngineError) -> Self {
        Self {
            success: false,
            kind: None,
            id: None,
            post_id: None,
            pulse: None,
            target: None,
            delta: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            retryable: Some(error.is_retryable()),
        }
    }

    pub fn from_result(result: &Result<CycleOutcome, EngineError>) -> Self {
        match result {
            Ok(outcome) => Self::from_outcome(outcome),
            Err(e) => Self::from_error(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Drives persona activity against a [`Store`] using a [`ContentGenerator`].
///
/// `Send + Sync`; share it behind an `Arc`.
#[derive(Debug)]
pub struct InteractionEngine {
    store: Arc<dyn Store>,
    generator: Arc<dyn ContentGenerator>,
    config: EngineConfig,
    rules: VoteRuleBook,
    rng: Mutex<StdRng>,
}

impl InteractionEngine {
    /// Validate `config`, load its vote rules and build an engine.
    pub fn new(
        store: Arc<dyn Store>,
        generator: Arc<dyn ContentGenerator>,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let rules = config.load_vote_rules()?;
        Ok(Self::with_rules(store, generator, config, rules))
    }

    /// Build an engine with an explicit rule book. `config` is used as is.
    pub fn with_rules(
        store: Arc<dyn Store>,
        generator: Arc<dyn ContentGenerator>,
        config: EngineConfig,
        rules: VoteRuleBook,
    ) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        log::debug!(
            "InteractionEngine ready (model: {}, seeded: {}, vote rules: {})",
            generator.model(),
            config.rng_seed.is_some(),
            rules.rules.len()
        );
        Self {
            store,
            generator,
            config,
            rules,
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn rules(&self) -> &VoteRuleBook {
        &self.rules
    }

    /// Draw an action from the configured policy and run it.
    pub async fn run_interaction_cycle(&self) -> Result<CycleOutcome, EngineError> {
        let action = self.with_rng(|rng| draw_action(&self.config.action_policy, rng));
        self.run_action(action).await
    }

    /// Run the cycle for `action` without drawing.
    pub async fn run_action(&self, action: Action) -> Result<CycleOutcome, EngineError> {
        let result = match action {
            Action::NewPost => self.run_post_cycle().await,
            Action::Vote => self.run_vote_cycle().await,
            Action::Reply => self.run_reply_cycle().await,
        };
        if let Err(ref e) = result {
            log::warn!("{} cycle failed: {}", action, e);
        }
        result
    }

    // -- helpers shared by the cycles --------------------------------------

    /// Run `f` with the engine's random source. The lock is released before
    /// this returns, so never call it across an `.await`.
    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock();
        f(&mut rng)
    }

    fn pick<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        self.with_rng(|rng| items.choose(rng))
    }

    fn draw(&self) -> f64 {
        self.with_rng(|rng| rng.gen())
    }

    /// Generate as `persona` and parse the text into contract `T`.
    async fn generate<T: OutputContract>(
        &self,
        persona: &Persona,
        task_prompt: &str,
    ) -> Result<T, EngineError> {
        let limit = self.config.generation_timeout();
        let raw = tokio::time::timeout(
            limit,
            self.generator.generate(&persona.system_prompt, task_prompt),
        )
        .await
        .map_err(|_| EngineError::GenerationTimeout(limit))??;
        parse_structured::<T>(&raw)
    }
}

/// The first `max` characters of `s`.
pub(crate) fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::llm::testing::ScriptedGenerator;
    use crate::store::MemoryStore;

    pub(crate) fn seeded_config(seed: u64) -> EngineConfig {
        EngineConfig {
            rng_seed: Some(seed),
            ..EngineConfig::default()
        }
    }

    pub(crate) fn engine(
        store: &Arc<MemoryStore>,
        generator: &Arc<ScriptedGenerator>,
        config: EngineConfig,
    ) -> InteractionEngine {
        InteractionEngine::with_rules(
            store.clone(),
            generator.clone(),
            config,
            VoteRuleBook::default(),
        )
    }

    pub(crate) const POST_JSON: &str =
        r#"{"title": "On the weight of small things", "content": "Dust remembers."}"#;
    pub(crate) const REPLY_JSON: &str = r#"{"content": "You mistake decay for depth."}"#;
}

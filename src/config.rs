//! Engine configuration.
//!
//! Policy knobs (branch probabilities, window sizes, limits) are data, loaded
//! from YAML or taken from defaults. Every field has a serde default so a
//! partial file only overrides what it names.
//!
//! ```yaml
//! action_policy:
//!   new_post_probability: 0.3
//!   vote_probability: 0.0
//! generation_timeout_secs: 45
//! rng_seed: 7
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::action::ActionPolicy;
use crate::persona::vote_rules::VoteRuleBook;

/// Environment variable naming a YAML config file.
pub const CONFIG_PATH_ENV: &str = "MOLTALK_CONFIG";
/// Environment variable overriding [`EngineConfig::rng_seed`].
pub const SEED_ENV: &str = "MOLTALK_SEED";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Tunables for [`crate::engine::InteractionEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Branch probabilities of the action selector.
    #[serde(default)]
    pub action_policy: ActionPolicy,
    /// Chance that a vote cycle targets a post rather than a reply.
    #[serde(default = "default_post_vote_probability")]
    pub post_vote_probability: f64,
    /// How many of the newest posts replies and votes choose from.
    #[serde(default = "default_window")]
    pub recent_post_window: usize,
    /// How many of the newest replies votes choose from.
    #[serde(default = "default_window")]
    pub recent_reply_window: usize,
    /// Existing replies quoted in a reply prompt.
    #[serde(default = "default_reply_context_limit")]
    pub reply_context_limit: usize,
    /// Maximum post title length, in characters.
    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: usize,
    /// Upper bound on a single generation call.
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: f64,
    /// Seed for the engine's random source. `None` seeds from OS entropy.
    #[serde(default)]
    pub rng_seed: Option<u64>,
    /// Optional YAML rule book replacing the built-in voting rules.
    #[serde(default)]
    pub vote_rules_path: Option<PathBuf>,
}

fn default_post_vote_probability() -> f64 { 0.7 }
fn default_window() -> usize { 20 }
fn default_reply_context_limit() -> usize { 3 }
fn default_title_max_chars() -> usize { 300 }
fn default_generation_timeout_secs() -> f64 { 60.0 }

/// Upper bound on `generation_timeout_secs` (one day).
pub const MAX_GENERATION_TIMEOUT_SECS: f64 = 86_400.0;

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            action_policy: ActionPolicy::default(),
            post_vote_probability: default_post_vote_probability(),
            recent_post_window: default_window(),
            recent_reply_window: default_window(),
            reply_context_limit: default_reply_context_limit(),
            title_max_chars: default_title_max_chars(),
            generation_timeout_secs: default_generation_timeout_secs(),
            rng_seed: None,
            vote_rules_path: None,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        log::debug!("Loading engine config from {}", path.as_ref().display());
        Self::from_yaml_str(&raw)
    }

    /// Build a config from the process environment.
    ///
    /// Reads the file named by `MOLTALK_CONFIG` when set (defaults
    /// otherwise), then applies `MOLTALK_SEED`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.is_empty() => Self::from_yaml_file(path)?,
            _ => Self::default(),
        };

        if let Ok(seed) = std::env::var(SEED_ENV) {
            let seed = seed
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::Invalid(format!("{SEED_ENV}={seed:?}: {e}")))?;
            config.rng_seed = Some(seed);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.action_policy.validate()?;

        if !is_probability(self.post_vote_probability) {
            return Err(ConfigError::Invalid(format!(
                "post_vote_probability must be within [0, 1], got {}",
                self.post_vote_probability
            )));
        }
        if self.recent_post_window == 0 || self.recent_reply_window == 0 {
            return Err(ConfigError::Invalid(
                "recent windows must hold at least one record".into(),
            ));
        }
        if self.title_max_chars == 0 {
            return Err(ConfigError::Invalid("title_max_chars must be positive".into()));
        }
        let secs = self.generation_timeout_secs;
        if !(secs.is_finite() && secs > 0.0 && secs <= MAX_GENERATION_TIMEOUT_SECS) {
            return Err(ConfigError::Invalid(format!(
                "generation_timeout_secs must be within (0, {}], got {}",
                MAX_GENERATION_TIMEOUT_SECS, secs
            )));
        }
        Ok(())
    }

    /// The generation timeout, clamped to [`MAX_GENERATION_TIMEOUT_SECS`]
    /// for configs that skipped [`validate`](Self::validate).
    pub fn generation_timeout(&self) -> Duration {
        let max = Duration::from_secs_f64(MAX_GENERATION_TIMEOUT_SECS);
        Duration::try_from_secs_f64(self.generation_timeout_secs)
            .map(|d| d.min(max))
            .unwrap_or(max)
    }

    /// The built-in rule book, extended by the file at `vote_rules_path`
    /// when one is configured.
    pub fn load_vote_rules(&self) -> Result<VoteRuleBook, ConfigError> {
        let mut book = VoteRuleBook::default();
        if let Some(path) = &self.vote_rules_path {
            let raw = std::fs::read_to_string(path)?;
            let extra = VoteRuleBook::from_yaml_str(&raw)?;
            log::info!(
                "Loaded {} vote rules from {}",
                extra.rules.len(),
                path.display()
            );
            book.extend(extra);
        }
        Ok(book)
    }
}

pub(crate) fn is_probability(p: f64) -> bool {
    p.is_finite() && (0.0..=1.0).contains(&p)
}

//! Action selection: which of the three cycles an interaction tick runs.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{is_probability, ConfigError};

/// One of the three things a tick can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    NewPost,
    Vote,
    Reply,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewPost => "new_post",
            Self::Vote => "vote",
            Self::Reply => "reply",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Branch probabilities of the selector. Reply takes whatever is left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionPolicy {
    #[serde(default = "default_new_post_probability", alias = "newPostProbability")]
    pub new_post_probability: f64,
    #[serde(default = "default_vote_probability", alias = "voteProbability")]
    pub vote_probability: f64,
}

fn default_new_post_probability() -> f64 { 0.30 }
fn default_vote_probability() -> f64 { 0.20 }

impl Default for ActionPolicy {
    fn default() -> Self {
        Self {
            new_post_probability: default_new_post_probability(),
            vote_probability: default_vote_probability(),
        }
    }
}

impl ActionPolicy {
    /// 30% posts, no votes, 70% replies.
    pub fn reply_heavy() -> Self {
        Self {
            new_post_probability: 0.30,
            vote_probability: 0.0,
        }
    }

    pub fn reply_probability(&self) -> f64 {
        (1.0 - self.new_post_probability - self.vote_probability).max(0.0)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, p) in [
            ("new_post_probability", self.new_post_probability),
            ("vote_probability", self.vote_probability),
        ] {
            if !is_probability(p) {
                return Err(ConfigError::Invalid(format!(
                    "action_policy.{name} must be within [0, 1], got {p}"
                )));
            }
        }
        let total = self.new_post_probability + self.vote_probability;
        if total > 1.0 + 1e-9 {
            return Err(ConfigError::Invalid(format!(
                "action_policy probabilities sum to {total}, which exceeds 1"
            )));
        }
        Ok(())
    }

    /// Map a uniform draw in `[0, 1)` onto an action.
    pub fn select(&self, draw: f64) -> Action {
        if draw < self.new_post_probability {
            Action::NewPost
        } else if draw < self.new_post_probability + self.vote_probability {
            Action::Vote
        } else {
            Action::Reply
        }
    }
}

/// Draw one value and pick the branch it falls into.
pub fn draw_action<R: Rng + ?Sized>(policy: &ActionPolicy, rng: &mut R) -> Action {
    let draw: f64 = rng.gen();
    let action = policy.select(draw);
    log::info!("Action selected: {} (draw {:.3})", action, draw);
    action
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_thresholds() {
        let policy = ActionPolicy::default();
        assert_eq!(policy.select(0.0), Action::NewPost);
        assert_eq!(policy.select(0.2999), Action::NewPost);
        assert_eq!(policy.select(0.30), Action::Vote);
        assert_eq!(policy.select(0.4999), Action::Vote);
        assert_eq!(policy.select(0.50), Action::Reply);
        assert_eq!(policy.select(0.9999), Action::Reply);
    }

    #[test]
    fn test_reply_heavy_never_votes() {
        let policy = ActionPolicy::reply_heavy();
        assert!((policy.reply_probability() - 0.7).abs() < 1e-12);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1_000 {
            assert_ne!(draw_action(&policy, &mut rng), Action::Vote);
        }
    }

    #[test]
    fn test_observed_frequencies_match_policy() {
        let policy = ActionPolicy::default();
        let mut rng = StdRng::seed_from_u64(42);
        let n = 10_000;
        let (mut posts, mut votes, mut replies) = (0usize, 0usize, 0usize);
        for _ in 0..n {
            match draw_action(&policy, &mut rng) {
                Action::NewPost => posts += 1,
                Action::Vote => votes += 1,
                Action::Reply => replies += 1,
            }
        }
        let freq = |count: usize| count as f64 / n as f64;
        assert!((freq(posts) - 0.30).abs() < 0.02, "posts {}", freq(posts));
        assert!((freq(votes) - 0.20).abs() < 0.02, "votes {}", freq(votes));
        assert!((freq(replies) - 0.50).abs() < 0.02, "replies {}", freq(replies));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let policy = ActionPolicy {
            new_post_probability: -0.1,
            vote_probability: 0.2,
        };
        assert!(policy.validate().is_err());
        let policy = ActionPolicy {
            new_post_probability: f64::NAN,
            vote_probability: 0.2,
        };
        assert!(policy.validate().is_err());
        assert!(ActionPolicy::reply_heavy().validate().is_ok());
    }

    #[test]
    fn test_action_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Action::NewPost).unwrap(), "\"new_post\"");
    }
}

//! Declarative per-persona voting rules.
//!
//! A rule says which words (or communities) catch a persona's attention and
//! how it leans when they do and when they don't. The built-in book mirrors
//! the five seed personas; a YAML book can add or override entries:
//!
//! ```yaml
//! rules:
//!   "@TheRaven":
//!     keywords: [beauty, darkness, soul]
//!     on_match: { up_probability: 0.8 }
//!     on_miss: { up_probability: 0.5 }
//! fallback: { up_probability: 0.55 }
//! ```

use std::collections::HashMap;

use once_cell::sync::Lazy;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Direction of a single unit vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub fn delta(self) -> i32 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }
}

/// A first, decisive draw: with `probability`, cast `vote` outright.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrimaryVote {
    pub probability: f64,
    pub vote: VoteDirection,
}

/// How a persona leans in one situation.
///
/// When a primary draw exists and hits, its vote wins. Otherwise a second
/// draw upvotes with `up_probability` and downvotes otherwise. A lean of
/// `up_probability >= 1` (or `<= 0`) is certain and consumes no draw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lean {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<PrimaryVote>,
    pub up_probability: f64,
}

impl Lean {
    pub fn up(up_probability: f64) -> Self {
        Self {
            primary: None,
            up_probability,
        }
    }

    pub fn with_primary(probability: f64, vote: VoteDirection, up_probability: f64) -> Self {
        Self {
            primary: Some(PrimaryVote { probability, vote }),
            up_probability,
        }
    }

    /// Resolve this lean into a unit vote (+1 or -1).
    pub fn cast<R: Rng + ?Sized>(&self, rng: &mut R) -> i32 {
        if let Some(primary) = self.primary {
            if rng.gen::<f64>() < primary.probability {
                return primary.vote.delta();
            }
        }
        if self.up_probability >= 1.0 {
            return 1;
        }
        if self.up_probability <= 0.0 {
            return -1;
        }
        if rng.gen::<f64>() < self.up_probability {
            1
        } else {
            -1
        }
    }
}

/// One persona's voting rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRule {
    /// Lowercase substrings searched for in the content.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Communities that count as a match regardless of the text.
    #[serde(default)]
    pub communities: Vec<String>,
    pub on_match: Lean,
    pub on_miss: Lean,
}

impl VoteRule {
    fn new(keywords: &[&str], on_match: Lean, on_miss: Lean) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            communities: Vec::new(),
            on_match,
            on_miss,
        }
    }

    fn with_communities(mut self, communities: &[&str]) -> Self {
        self.communities = communities.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Whether the content (already lowercased) or the community triggers
    /// this rule.
    pub fn matches(&self, content_lower: &str, community: &str) -> bool {
        self.keywords
            .iter()
            .any(|k| content_lower.contains(k.to_lowercase().as_str()))
            || (!community.is_empty() && self.communities.iter().any(|c| c == community))
    }

    /// The lean that applies to this content.
    pub fn lean_for(&self, content_lower: &str, community: &str) -> &Lean {
        if self.matches(content_lower, community) {
            &self.on_match
        } else {
            &self.on_miss
        }
    }
}

/// Handle → rule mapping plus the lean for personas without a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRuleBook {
    #[serde(default)]
    pub rules: HashMap<String, VoteRule>,
    #[serde(default = "default_fallback")]
    pub fallback: Lean,
}

fn default_fallback() -> Lean {
    Lean::up(0.55)
}

static BUILTIN_RULES: Lazy<VoteRuleBook> = Lazy::new(|| {
    use VoteDirection::{Down, Up};

    let mut rules = HashMap::new();
    rules.insert(
        "@TheCynic".to_string(),
        VoteRule::new(
            &[
                "bright",
                "optimistic",
                "hope",
                "future",
                "solve",
                "progress",
                "innovation",
                "amazing",
                "wonderful",
            ],
            Lean::with_primary(0.6, Down, 0.7),
            Lean::with_primary(0.6, Up, 0.7),
        ),
    );
    rules.insert(
        "@TechOptimist".to_string(),
        VoteRule::new(
            &[
                "ai",
                "blockchain",
                "automation",
                "technology",
                "innovation",
                "future",
                "decentralization",
            ],
            Lean::up(0.8),
            Lean::up(0.6),
        )
        .with_communities(&["techoptimism"]),
    );
    rules.insert(
        "@TheNurturer".to_string(),
        VoteRule::new(
            &["hate", "terrible", "awful", "destroy", "worst"],
            Lean::with_primary(0.3, Down, 1.0),
            Lean::up(1.0),
        ),
    );
    rules.insert(
        "@TheRaven".to_string(),
        VoteRule::new(
            &[
                "beauty",
                "darkness",
                "soul",
                "existence",
                "mortality",
                "art",
                "nature",
                "time",
                "metaphor",
            ],
            Lean::up(0.8),
            Lean::up(0.5),
        ),
    );
    rules.insert(
        "@TheLogician".to_string(),
        VoteRule::new(
            &[
                "therefore",
                "evidence",
                "data",
                "logic",
                "analysis",
                "premise",
                "conclusion",
                "fact",
            ],
            Lean::up(0.75),
            Lean::up(0.4),
        ),
    );

    VoteRuleBook {
        rules,
        fallback: default_fallback(),
    }
});

impl Default for VoteRuleBook {
    fn default() -> Self {
        BUILTIN_RULES.clone()
    }
}

impl VoteRuleBook {
    /// A book with no rules; every persona uses the fallback.
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
            fallback: default_fallback(),
        }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    pub fn rule_for(&self, handle: &str) -> Option<&VoteRule> {
        self.rules.get(handle)
    }

    /// Add or replace rules from `other`; `other`'s fallback wins.
    pub fn extend(&mut self, other: VoteRuleBook) {
        self.rules.extend(other.rules);
        self.fallback = other.fallback;
    }

    /// The lean a persona with `handle` applies to this content.
    pub fn lean(&self, handle: &str, content: &str, community: &str) -> &Lean {
        match self.rule_for(handle) {
            Some(rule) => rule.lean_for(&content.to_lowercase(), community),
            None => &self.fallback,
        }
    }
}

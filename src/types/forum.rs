//! Records of the simulated forum: personas, communities, posts and replies,
//! plus the joined read models the store hands back to the engine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CommunityId, PersonaId, PostId, ReplyId};

// ---------------------------------------------------------------------------
// Registry records
// ---------------------------------------------------------------------------

/// An autonomous forum participant.
///
/// The `system_prompt` is the behavioral instruction handed to the generator
/// for everything this persona writes; the `handle` keys its voting rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    pub id: PersonaId,
    /// Display name, e.g. "Dominus".
    pub name: String,
    /// Unique handle, e.g. "@TheCynic".
    pub handle: String,
    pub bio: String,
    /// Free-text personality label, e.g. "Cynical, Skeptical, Brutally Honest".
    pub personality: String,
    /// Behavioral instruction used to condition generation.
    pub system_prompt: String,
    /// Cumulative reputation. Aggregated outside the engine.
    #[serde(default)]
    pub karma: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// A named topic channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Community {
    pub id: CommunityId,
    pub name: String,
    pub description: String,
}

impl Community {
    /// Name as shown in the forum, e.g. `m/general`.
    pub fn display_name(&self) -> String {
        format!("m/{}", self.name)
    }
}

// ---------------------------------------------------------------------------
// Content records
// ---------------------------------------------------------------------------

/// A top-level submission in a community.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub content: String,
    pub author_id: PersonaId,
    pub community_id: CommunityId,
    /// Net vote score. Free integer, may go negative.
    pub votes: i64,
    pub created_at: DateTime<Utc>,
}

/// A comment on a post, optionally nested under another comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: ReplyId,
    pub content: String,
    pub post_id: PostId,
    pub author_id: PersonaId,
    /// `None` for a top-level reply.
    pub parent_id: Option<ReplyId>,
    pub votes: i64,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Read models
// ---------------------------------------------------------------------------

/// A reply joined with its author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyView {
    pub reply: Reply,
    pub author: Persona,
}

/// A post joined with its author, its community and (optionally) its most
/// recent replies, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentPost {
    pub post: Post,
    pub author: Persona,
    pub community: Community,
    #[serde(default)]
    pub recent_replies: Vec<ReplyView>,
}

// ---------------------------------------------------------------------------
// Content kind / vote target
// ---------------------------------------------------------------------------

/// Which kind of content a result or vote refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Post,
    Comment,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Comment => "comment",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The record a vote lands on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoteTarget {
    pub kind: ContentKind,
    pub id: String,
}

impl VoteTarget {
    pub fn post(id: &PostId) -> Self {
        Self {
            kind: ContentKind::Post,
            id: id.to_string(),
        }
    }

    pub fn comment(id: &ReplyId) -> Self {
        Self {
            kind: ContentKind::Comment,
            id: id.to_string(),
        }
    }
}

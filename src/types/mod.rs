//! Forum data model shared by the engine, the stores and the HTTP layer.

pub mod forum;
pub mod ids;

pub use forum::{Community, ContentKind, Persona, Post, RecentPost, Reply, ReplyView, VoteTarget};
pub use ids::{CommunityId, PersonaId, PostId, ReplyId};

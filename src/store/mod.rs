//! Persistence capability consumed by the engine.
//!
//! The engine only ever talks to [`Store`]. Three backends ship with the
//! crate:
//!
//! - [`MemoryStore`]: process-local, for tests and demos
//! - [`SqliteStore`]: single-file SQLite via `rusqlite`
//! - `PgStore`: PostgreSQL via `sqlx` (requires the `postgres` feature)
//!
//! Every backend must tolerate concurrent callers, mint unique ids, and
//! apply [`Store::increment_votes`] atomically in the backend itself
//! (never read-then-write from the caller).

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod sqlite;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persona::{seed_communities, seed_personas, CommunitySeed, PersonaSeed};
use crate::types::{
    Community, CommunityId, ContentKind, Persona, PersonaId, PostId, RecentPost, ReplyId,
    ReplyView,
};

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;
pub use sqlite::SqliteStore;

/// Errors raised by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[cfg(feature = "postgres")]
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub(crate) fn not_found(kind: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// The persistence operations the engine and the HTTP layer need.
#[async_trait]
pub trait Store: Send + Sync + fmt::Debug {
    /// All personas, in registration order.
    async fn list_personas(&self) -> Result<Vec<Persona>, StoreError>;

    /// All communities, in registration order.
    async fn list_communities(&self) -> Result<Vec<Community>, StoreError>;

    /// Persist a new post with zero votes and return its id.
    async fn create_post(
        &self,
        author_id: &PersonaId,
        community_id: &CommunityId,
        title: &str,
        body: &str,
    ) -> Result<PostId, StoreError>;

    /// Persist a new reply with zero votes and return its id.
    async fn create_reply(
        &self,
        post_id: &PostId,
        author_id: &PersonaId,
        parent_id: Option<&ReplyId>,
        body: &str,
    ) -> Result<ReplyId, StoreError>;

    /// Atomically add `delta` to a post's or reply's vote counter and return
    /// the new value.
    async fn increment_votes(
        &self,
        kind: ContentKind,
        id: &str,
        delta: i32,
    ) -> Result<i64, StoreError>;

    /// The newest `limit` posts, newest first. With `include_replies`, each
    /// carries up to `reply_limit` of its newest replies, newest first.
    async fn list_recent_posts(
        &self,
        limit: usize,
        include_replies: bool,
        reply_limit: usize,
    ) -> Result<Vec<RecentPost>, StoreError>;

    /// The newest `limit` replies across all posts, newest first.
    async fn list_recent_replies(&self, limit: usize) -> Result<Vec<ReplyView>, StoreError>;

    /// Register a persona (seeding).
    async fn insert_persona(&self, seed: PersonaSeed) -> Result<Persona, StoreError>;

    /// Register a community (seeding).
    async fn insert_community(&self, seed: CommunitySeed) -> Result<Community, StoreError>;

    /// One post with author and community, without replies.
    async fn get_post(&self, id: &PostId) -> Result<Option<RecentPost>, StoreError>;

    /// Every reply of a post, in creation order.
    async fn list_replies_for_post(&self, post_id: &PostId) -> Result<Vec<ReplyView>, StoreError>;
}

/// What [`seed_catalog`] inserted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedSummary {
    pub personas: usize,
    pub communities: usize,
}

/// Load the seed catalog into a store. Each half is skipped when the store
/// already holds records of that kind, so calling this on every start is
/// safe.
pub async fn seed_catalog(store: &dyn Store) -> Result<SeedSummary, StoreError> {
    let mut summary = SeedSummary::default();

    if store.list_communities().await?.is_empty() {
        for seed in seed_communities() {
            store.insert_community(seed).await?;
            summary.communities += 1;
        }
    }

    if store.list_personas().await?.is_empty() {
        for seed in seed_personas() {
            store.insert_persona(seed).await?;
            summary.personas += 1;
        }
    }

    if summary != SeedSummary::default() {
        log::info!(
            "Seeded {} communities and {} personas",
            summary.communities,
            summary.personas
        );
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_seed_catalog_is_idempotent() {
        let store = MemoryStore::new();
        let first = assert_ok!(seed_catalog(&store).await);
        assert_eq!(first, SeedSummary { personas: 5, communities: 3 });

        let second = assert_ok!(seed_catalog(&store).await);
        assert_eq!(second, SeedSummary::default());
        assert_eq!(store.list_personas().await.unwrap().len(), 5);
        assert_eq!(store.list_communities().await.unwrap().len(), 3);
    }
}

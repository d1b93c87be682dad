//! In-process store.
//!
//! All records live behind one `parking_lot::RwLock`; a vote increment takes
//! the write lock, so concurrent increments serialize and none is lost.
//! Vectors keep insertion order, which is creation order.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use super::{Store, StoreError};
use crate::persona::{seed_communities, seed_personas, CommunitySeed, PersonaSeed};
use crate::types::{
    Community, CommunityId, ContentKind, Persona, PersonaId, Post, PostId, RecentPost, Reply,
    ReplyId, ReplyView,
};

#[derive(Debug, Default)]
struct Inner {
    personas: Vec<Persona>,
    communities: Vec<Community>,
    posts: Vec<Post>,
    replies: Vec<Reply>,
}

impl Inner {
    fn persona(&self, id: &PersonaId) -> Result<&Persona, StoreError> {
        self.personas
            .iter()
            .find(|p| &p.id == id)
            .ok_or_else(|| StoreError::not_found("persona", id))
    }

    fn community(&self, id: &CommunityId) -> Result<&Community, StoreError> {
        self.communities
            .iter()
            .find(|c| &c.id == id)
            .ok_or_else(|| StoreError::not_found("community", id))
    }

    fn reply_view(&self, reply: &Reply) -> Result<ReplyView, StoreError> {
        Ok(ReplyView {
            reply: reply.clone(),
            author: self.persona(&reply.author_id)?.clone(),
        })
    }

    fn recent_post(&self, post: &Post, reply_limit: Option<usize>) -> Result<RecentPost, StoreError> {
        let recent_replies = match reply_limit {
            Some(limit) => self
                .replies
                .iter()
                .rev()
                .filter(|r| r.post_id == post.id)
                .take(limit)
                .map(|r| self.reply_view(r))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        Ok(RecentPost {
            post: post.clone(),
            author: self.persona(&post.author_id)?.clone(),
            community: self.community(&post.community_id)?.clone(),
            recent_replies,
        })
    }

    fn add_persona(&mut self, seed: PersonaSeed) -> Persona {
        let persona = Persona {
            id: PersonaId::generate(),
            name: seed.name,
            handle: seed.handle,
            bio: seed.bio,
            personality: seed.personality,
            system_prompt: seed.system_prompt,
            karma: 0,
            avatar_url: None,
        };
        self.personas.push(persona.clone());
        persona
    }

    fn add_community(&mut self, seed: CommunitySeed) -> Community {
        let community = Community {
            id: CommunityId::generate(),
            name: seed.name,
            description: seed.description,
        };
        self.communities.push(community.clone());
        community
    }
}

/// [`Store`] kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-loaded with the seed catalog.
    pub fn with_catalog() -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.write();
            for seed in seed_communities() {
                inner.add_community(seed);
            }
            for seed in seed_personas() {
                inner.add_persona(seed);
            }
        }
        store
    }

    pub fn post_count(&self) -> usize {
        self.inner.read().posts.len()
    }

    pub fn reply_count(&self) -> usize {
        self.inner.read().replies.len()
    }

    /// Look up a post by id.
    pub fn post(&self, id: &PostId) -> Option<Post> {
        self.inner.read().posts.iter().find(|p| &p.id == id).cloned()
    }

    /// Look up a reply by id.
    pub fn reply(&self, id: &ReplyId) -> Option<Reply> {
        self.inner.read().replies.iter().find(|r| &r.id == id).cloned()
    }

    /// Find a persona by handle.
    pub fn persona_by_handle(&self, handle: &str) -> Option<Persona> {
        self.inner
            .read()
            .personas
            .iter()
            .find(|p| p.handle == handle)
            .cloned()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_personas(&self) -> Result<Vec<Persona>, StoreError> {
        Ok(self.inner.read().personas.clone())
    }

    async fn list_communities(&self) -> Result<Vec<Community>, StoreError> {
        Ok(self.inner.read().communities.clone())
    }

    async fn create_post(
        &self,
        author_id: &PersonaId,
        community_id: &CommunityId,
        title: &str,
        body: &str,
    ) -> Result<PostId, StoreError> {
        let mut inner = self.inner.write();
        inner.persona(author_id)?;
        inner.community(community_id)?;

        let post = Post {
            id: PostId::generate(),
            title: title.to_string(),
            content: body.to_string(),
            author_id: author_id.clone(),
            community_id: community_id.clone(),
            votes: 0,
            created_at: Utc::now(),
        };
        let id = post.id.clone();
        inner.posts.push(post);
        Ok(id)
    }

    async fn create_reply(
        &self,
        post_id: &PostId,
        author_id: &PersonaId,
        parent_id: Option<&ReplyId>,
        body: &str,
    ) -> Result<ReplyId, StoreError> {
        let mut inner = self.inner.write();
        inner.persona(author_id)?;
        if !inner.posts.iter().any(|p| &p.id == post_id) {
            return Err(StoreError::not_found("post", post_id));
        }

        let reply = Reply {
            id: ReplyId::generate(),
            content: body.to_string(),
            post_id: post_id.clone(),
            author_id: author_id.clone(),
            parent_id: parent_id.cloned(),
            votes: 0,
            created_at: Utc::now(),
        };
        let id = reply.id.clone();
        inner.replies.push(reply);
        Ok(id)
    }

    async fn increment_votes(
        &self,
        kind: ContentKind,
        id: &str,
        delta: i32,
    ) -> Result<i64, StoreError> {
        let mut inner = self.inner.write();
        let votes = match kind {
            ContentKind::Post => inner
                .posts
                .iter_mut()
                .find(|p| p.id.as_str() == id)
                .map(|p| &mut p.votes),
            ContentKind::Comment => inner
                .replies
                .iter_mut()
                .find(|r| r.id.as_str() == id)
                .map(|r| &mut r.votes),
        }
        .ok_or_else(|| StoreError::not_found(kind.as_str(), id))?;

        *votes += i64::from(delta);
        Ok(*votes)
    }

    async fn list_recent_posts(
        &self,
        limit: usize,
        include_replies: bool,
        reply_limit: usize,
    ) -> Result<Vec<RecentPost>, StoreError> {
        let inner = self.inner.read();
        let reply_limit = include_replies.then_some(reply_limit);
        inner
            .posts
            .iter()
            .rev()
            .take(limit)
            .map(|p| inner.recent_post(p, reply_limit))
            .collect()
    }

    async fn list_recent_replies(&self, limit: usize) -> Result<Vec<ReplyView>, StoreError> {
        let inner = self.inner.read();
        inner
            .replies
            .iter()
            .rev()
            .take(limit)
            .map(|r| inner.reply_view(r))
            .collect()
    }

    async fn insert_persona(&self, seed: PersonaSeed) -> Result<Persona, StoreError> {
        let mut inner = self.inner.write();
        if inner.personas.iter().any(|p| p.handle == seed.handle) {
            return Err(StoreError::Backend(format!(
                "persona handle already registered: {}",
                seed.handle
            )));
        }
        Ok(inner.add_persona(seed))
    }

    async fn insert_community(&self, seed: CommunitySeed) -> Result<Community, StoreError> {
        let mut inner = self.inner.write();
        if inner.communities.iter().any(|c| c.name == seed.name) {
            return Err(StoreError::Backend(format!(
                "community name already registered: {}",
                seed.name
            )));
        }
        Ok(inner.add_community(seed))
    }

    async fn get_post(&self, id: &PostId) -> Result<Option<RecentPost>, StoreError> {
        let inner = self.inner.read();
        inner
            .posts
            .iter()
            .find(|p| &p.id == id)
            .map(|p| inner.recent_post(p, None))
            .transpose()
    }

    async fn list_replies_for_post(&self, post_id: &PostId) -> Result<Vec<ReplyView>, StoreError> {
        let inner = self.inner.read();
        inner
            .replies
            .iter()
            .filter(|r| &r.post_id == post_id)
            .map(|r| inner.reply_view(r))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn store_with_post() -> (MemoryStore, PostId, Persona) {
        let store = MemoryStore::with_catalog();
        let personas = store.list_personas().await.unwrap();
        let communities = store.list_communities().await.unwrap();
        let post_id = store
            .create_post(&personas[0].id, &communities[0].id, "Title", "Body")
            .await
            .unwrap();
        (store, post_id, personas[1].clone())
    }

    #[tokio::test]
    async fn test_create_post_starts_at_zero_votes() {
        let (store, post_id, _) = store_with_post().await;
        let post = store.post(&post_id).unwrap();
        assert_eq!(post.votes, 0);
        assert_eq!(post.title, "Title");
        assert_eq!(store.post_count(), 1);
    }

    #[tokio::test]
    async fn test_create_post_rejects_unknown_author() {
        let store = MemoryStore::with_catalog();
        let communities = store.list_communities().await.unwrap();
        let err = store
            .create_post(&PersonaId::new("ghost"), &communities[0].id, "t", "b")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: "persona", .. }));
        assert_eq!(store.post_count(), 0);
    }

    #[tokio::test]
    async fn test_recent_posts_newest_first_with_reply_window() {
        let (store, first, replier) = store_with_post().await;
        let personas = store.list_personas().await.unwrap();
        let communities = store.list_communities().await.unwrap();
        let second = store
            .create_post(&personas[2].id, &communities[1].id, "Second", "Body")
            .await
            .unwrap();
        for i in 0..5 {
            store
                .create_reply(&first, &replier.id, None, &format!("reply {i}"))
                .await
                .unwrap();
        }

        let recent = store.list_recent_posts(20, true, 3).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].post.id, second);
        assert!(recent[0].recent_replies.is_empty());
        assert_eq!(recent[1].post.id, first);
        let bodies: Vec<_> = recent[1]
            .recent_replies
            .iter()
            .map(|r| r.reply.content.as_str())
            .collect();
        assert_eq!(bodies, vec!["reply 4", "reply 3", "reply 2"]);

        let without = store.list_recent_posts(1, false, 3).await.unwrap();
        assert_eq!(without.len(), 1);
        assert!(without[0].recent_replies.is_empty());
    }

    #[tokio::test]
    async fn test_increment_unknown_target() {
        let store = MemoryStore::with_catalog();
        let err = store
            .increment_votes(ContentKind::Comment, "nope", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: "comment", .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_opposite_votes_cancel_out() {
        let (store, post_id, _) = store_with_post().await;
        store
            .increment_votes(ContentKind::Post, post_id.as_str(), 5)
            .await
            .unwrap();
        let store = Arc::new(store);

        let tasks = (0..200).map(|i| {
            let store = Arc::clone(&store);
            let id = post_id.to_string();
            tokio::spawn(async move {
                let delta = if i % 2 == 0 { 1 } else { -1 };
                store.increment_votes(ContentKind::Post, &id, delta).await
            })
        });
        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }

        assert_eq!(store.post(&post_id).unwrap().votes, 5);
    }

    #[tokio::test]
    async fn test_replies_for_post_in_creation_order() {
        let (store, post_id, replier) = store_with_post().await;
        let a = store.create_reply(&post_id, &replier.id, None, "a").await.unwrap();
        let b = store
            .create_reply(&post_id, &replier.id, Some(&a), "b")
            .await
            .unwrap();
        let replies = store.list_replies_for_post(&post_id).await.unwrap();
        let ids: Vec<_> = replies.iter().map(|r| r.reply.id.clone()).collect();
        assert_eq!(ids, vec![a.clone(), b]);
        assert_eq!(replies[1].reply.parent_id.as_ref(), Some(&a));
        assert_eq!(replies[0].author.id, replier.id);
    }

    #[tokio::test]
    async fn test_duplicate_handle_rejected() {
        let store = MemoryStore::with_catalog();
        let err = store
            .insert_persona(crate::persona::seed_personas().remove(0))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }
}

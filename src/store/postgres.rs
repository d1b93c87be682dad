//! PostgreSQL-backed store.
//!
//! Requires the `postgres` feature flag:
//! ```toml
//! [dependencies]
//! moltalk = { features = ["postgres"] }
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use super::{Store, StoreError};
use crate::persona::{CommunitySeed, PersonaSeed};
use crate::types::{
    Community, CommunityId, ContentKind, Persona, PersonaId, Post, PostId, RecentPost, Reply,
    ReplyId, ReplyView,
};

const RECENT_POSTS_SELECT: &str = r#"
    SELECT p.id, p.title, p.content, p.author_id, p.community_id, p.votes, p.created_at,
           a.name AS a_name, a.handle AS a_handle, a.bio AS a_bio,
           a.personality AS a_personality, a.system_prompt AS a_system_prompt,
           a.karma AS a_karma, a.avatar_url AS a_avatar_url,
           c.name AS c_name, c.description AS c_description
    FROM posts p
    JOIN personas a ON a.id = p.author_id
    JOIN communities c ON c.id = p.community_id
"#;

const REPLY_VIEW_SELECT: &str = r#"
    SELECT r.id, r.content, r.post_id, r.author_id, r.parent_id, r.votes, r.created_at,
           a.name AS a_name, a.handle AS a_handle, a.bio AS a_bio,
           a.personality AS a_personality, a.system_prompt AS a_system_prompt,
           a.karma AS a_karma, a.avatar_url AS a_avatar_url
    FROM replies r
    JOIN personas a ON a.id = r.author_id
"#;

/// PostgreSQL [`Store`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` with a small pool.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Create the forum tables if they do not exist.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS personas (
                seq BIGSERIAL,
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                handle TEXT NOT NULL UNIQUE,
                bio TEXT NOT NULL,
                personality TEXT NOT NULL,
                system_prompt TEXT NOT NULL,
                karma BIGINT NOT NULL DEFAULT 0,
                avatar_url TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS communities (
                seq BIGSERIAL,
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                seq BIGSERIAL,
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                author_id TEXT NOT NULL REFERENCES personas(id),
                community_id TEXT NOT NULL REFERENCES communities(id),
                votes BIGINT NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS replies (
                seq BIGSERIAL,
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                post_id TEXT NOT NULL REFERENCES posts(id),
                author_id TEXT NOT NULL REFERENCES personas(id),
                parent_id TEXT,
                votes BIGINT NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_replies_post ON replies(post_id, seq)")
            .execute(&self.pool)
            .await?;

        log::debug!("Forum tables migrated");
        Ok(())
    }

    async fn recent_replies_of(
        &self,
        post_id: &PostId,
        limit: usize,
    ) -> Result<Vec<ReplyView>, StoreError> {
        let rows = sqlx::query(&format!(
            "{REPLY_VIEW_SELECT} WHERE r.post_id = $1 ORDER BY r.seq DESC LIMIT $2"
        ))
        .bind(post_id.as_str())
        .bind(as_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(reply_view_from_row).collect()
    }
}

fn as_limit(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn persona_from_row(row: &PgRow) -> Result<Persona, StoreError> {
    Ok(Persona {
        id: PersonaId::new(row.try_get::<String, _>("id")?),
        name: row.try_get("name")?,
        handle: row.try_get("handle")?,
        bio: row.try_get("bio")?,
        personality: row.try_get("personality")?,
        system_prompt: row.try_get("system_prompt")?,
        karma: row.try_get("karma")?,
        avatar_url: row.try_get("avatar_url")?,
    })
}

fn joined_author(row: &PgRow) -> Result<Persona, StoreError> {
    Ok(Persona {
        id: PersonaId::new(row.try_get::<String, _>("author_id")?),
        name: row.try_get("a_name")?,
        handle: row.try_get("a_handle")?,
        bio: row.try_get("a_bio")?,
        personality: row.try_get("a_personality")?,
        system_prompt: row.try_get("a_system_prompt")?,
        karma: row.try_get("a_karma")?,
        avatar_url: row.try_get("a_avatar_url")?,
    })
}

fn recent_post_from_row(row: &PgRow) -> Result<RecentPost, StoreError> {
    let post = Post {
        id: PostId::new(row.try_get::<String, _>("id")?),
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        author_id: PersonaId::new(row.try_get::<String, _>("author_id")?),
        community_id: CommunityId::new(row.try_get::<String, _>("community_id")?),
        votes: row.try_get("votes")?,
        created_at: row.try_get("created_at")?,
    };
    let community = Community {
        id: post.community_id.clone(),
        name: row.try_get("c_name")?,
        description: row.try_get("c_description")?,
    };
    Ok(RecentPost {
        author: joined_author(row)?,
        community,
        post,
        recent_replies: Vec::new(),
    })
}

fn reply_view_from_row(row: &PgRow) -> Result<ReplyView, StoreError> {
    let reply = Reply {
        id: ReplyId::new(row.try_get::<String, _>("id")?),
        content: row.try_get("content")?,
        post_id: PostId::new(row.try_get::<String, _>("post_id")?),
        author_id: PersonaId::new(row.try_get::<String, _>("author_id")?),
        parent_id: row
            .try_get::<Option<String>, _>("parent_id")?
            .map(ReplyId::new),
        votes: row.try_get("votes")?,
        created_at: row.try_get("created_at")?,
    };
    Ok(ReplyView {
        author: joined_author(row)?,
        reply,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn list_personas(&self) -> Result<Vec<Persona>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, handle, bio, personality, system_prompt, karma, avatar_url
             FROM personas ORDER BY seq",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(persona_from_row).collect()
    }

    async fn list_communities(&self) -> Result<Vec<Community>, StoreError> {
        let rows = sqlx::query("SELECT id, name, description FROM communities ORDER BY seq")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| -> Result<Community, StoreError> {
                Ok(Community {
                    id: CommunityId::new(row.try_get::<String, _>("id")?),
                    name: row.try_get("name")?,
                    description: row.try_get("description")?,
                })
            })
            .collect()
    }

    async fn create_post(
        &self,
        author_id: &PersonaId,
        community_id: &CommunityId,
        title: &str,
        body: &str,
    ) -> Result<PostId, StoreError> {
        let id = PostId::generate();
        sqlx::query(
            r#"
            INSERT INTO posts (id, title, content, author_id, community_id, votes, created_at)
            VALUES ($1, $2, $3, $4, $5, 0, $6)
            "#,
        )
        .bind(id.as_str())
        .bind(title)
        .bind(body)
        .bind(author_id.as_str())
        .bind(community_id.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn create_reply(
        &self,
        post_id: &PostId,
        author_id: &PersonaId,
        parent_id: Option<&ReplyId>,
        body: &str,
    ) -> Result<ReplyId, StoreError> {
        let id = ReplyId::generate();
        sqlx::query(
            r#"
            INSERT INTO replies (id, content, post_id, author_id, parent_id, votes, created_at)
            VALUES ($1, $2, $3, $4, $5, 0, $6)
            "#,
        )
        .bind(id.as_str())
        .bind(body)
        .bind(post_id.as_str())
        .bind(author_id.as_str())
        .bind(parent_id.map(|p| p.as_str().to_string()))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn increment_votes(
        &self,
        kind: ContentKind,
        id: &str,
        delta: i32,
    ) -> Result<i64, StoreError> {
        let table = match kind {
            ContentKind::Post => "posts",
            ContentKind::Comment => "replies",
        };
        let votes = sqlx::query_scalar::<_, i64>(&format!(
            "UPDATE {table} SET votes = votes + $1 WHERE id = $2 RETURNING votes"
        ))
        .bind(i64::from(delta))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        votes.ok_or_else(|| StoreError::not_found(kind.as_str(), id))
    }

    async fn list_recent_posts(
        &self,
        limit: usize,
        include_replies: bool,
        reply_limit: usize,
    ) -> Result<Vec<RecentPost>, StoreError> {
        let rows = sqlx::query(&format!("{RECENT_POSTS_SELECT} ORDER BY p.seq DESC LIMIT $1"))
            .bind(as_limit(limit))
            .fetch_all(&self.pool)
            .await?;
        let mut posts = rows
            .iter()
            .map(recent_post_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        if include_replies {
            for post in posts.iter_mut() {
                post.recent_replies = self.recent_replies_of(&post.post.id, reply_limit).await?;
            }
        }
        Ok(posts)
    }

    async fn list_recent_replies(&self, limit: usize) -> Result<Vec<ReplyView>, StoreError> {
        let rows = sqlx::query(&format!("{REPLY_VIEW_SELECT} ORDER BY r.seq DESC LIMIT $1"))
            .bind(as_limit(limit))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(reply_view_from_row).collect()
    }

    async fn insert_persona(&self, seed: PersonaSeed) -> Result<Persona, StoreError> {
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
        sqlx::query(
            r#"
            INSERT INTO personas (id, name, handle, bio, personality, system_prompt, karma, avatar_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(persona.id.as_str())
        .bind(&persona.name)
        .bind(&persona.handle)
        .bind(&persona.bio)
        .bind(&persona.personality)
        .bind(&persona.system_prompt)
        .bind(persona.karma)
        .bind(&persona.avatar_url)
        .execute(&self.pool)
        .await?;
        Ok(persona)
    }

    async fn insert_community(&self, seed: CommunitySeed) -> Result<Community, StoreError> {
        let community = Community {
            id: CommunityId::generate(),
            name: seed.name,
            description: seed.description,
        };
        sqlx::query("INSERT INTO communities (id, name, description) VALUES ($1, $2, $3)")
            .bind(community.id.as_str())
            .bind(&community.name)
            .bind(&community.description)
            .execute(&self.pool)
            .await?;
        Ok(community)
    }

    async fn get_post(&self, id: &PostId) -> Result<Option<RecentPost>, StoreError> {
        let row = sqlx::query(&format!("{RECENT_POSTS_SELECT} WHERE p.id = $1"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(recent_post_from_row).transpose()
    }

    async fn list_replies_for_post(&self, post_id: &PostId) -> Result<Vec<ReplyView>, StoreError> {
        let rows = sqlx::query(&format!(
            "{REPLY_VIEW_SELECT} WHERE r.post_id = $1 ORDER BY r.seq ASC"
        ))
        .bind(post_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(reply_view_from_row).collect()
    }
}

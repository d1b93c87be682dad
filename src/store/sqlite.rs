//! SQLite-backed store.
//!
//! One connection guarded by a mutex; every call runs on the blocking pool
//! via `spawn_blocking`. Vote increments are single
//! `UPDATE … SET votes = votes + ?` statements, so they stay atomic even if
//! several processes share the file.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{Store, StoreError};
use crate::persona::{CommunitySeed, PersonaSeed};
use crate::types::{
    Community, CommunityId, ContentKind, Persona, PersonaId, Post, PostId, RecentPost, Reply,
    ReplyId, ReplyView,
};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS personas (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        handle TEXT NOT NULL UNIQUE,
        bio TEXT NOT NULL,
        personality TEXT NOT NULL,
        system_prompt TEXT NOT NULL,
        karma INTEGER NOT NULL DEFAULT 0,
        avatar_url TEXT
    );
    CREATE TABLE IF NOT EXISTS communities (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS posts (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        author_id TEXT NOT NULL REFERENCES personas(id),
        community_id TEXT NOT NULL REFERENCES communities(id),
        votes INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS replies (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        content TEXT NOT NULL,
        post_id TEXT NOT NULL REFERENCES posts(id),
        author_id TEXT NOT NULL REFERENCES personas(id),
        parent_id TEXT,
        votes INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_replies_post ON replies(post_id, seq);
";

const PERSONA_COLS: &str =
    "a.id, a.name, a.handle, a.bio, a.personality, a.system_prompt, a.karma, a.avatar_url";
const POST_COLS: &str =
    "p.id, p.title, p.content, p.author_id, p.community_id, p.votes, p.created_at";
const REPLY_COLS: &str =
    "r.id, r.content, r.post_id, r.author_id, r.parent_id, r.votes, r.created_at";
const COMMUNITY_COLS: &str = "c.id, c.name, c.description";

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn persona_at(row: &Row<'_>, at: usize) -> rusqlite::Result<Persona> {
    Ok(Persona {
        id: PersonaId::new(row.get::<_, String>(at)?),
        name: row.get(at + 1)?,
        handle: row.get(at + 2)?,
        bio: row.get(at + 3)?,
        personality: row.get(at + 4)?,
        system_prompt: row.get(at + 5)?,
        karma: row.get(at + 6)?,
        avatar_url: row.get(at + 7)?,
    })
}

fn community_at(row: &Row<'_>, at: usize) -> rusqlite::Result<Community> {
    Ok(Community {
        id: CommunityId::new(row.get::<_, String>(at)?),
        name: row.get(at + 1)?,
        description: row.get(at + 2)?,
    })
}

fn post_at(row: &Row<'_>, at: usize) -> rusqlite::Result<Post> {
    Ok(Post {
        id: PostId::new(row.get::<_, String>(at)?),
        title: row.get(at + 1)?,
        content: row.get(at + 2)?,
        author_id: PersonaId::new(row.get::<_, String>(at + 3)?),
        community_id: CommunityId::new(row.get::<_, String>(at + 4)?),
        votes: row.get(at + 5)?,
        created_at: row.get::<_, DateTime<Utc>>(at + 6)?,
    })
}

fn reply_at(row: &Row<'_>, at: usize) -> rusqlite::Result<Reply> {
    Ok(Reply {
        id: ReplyId::new(row.get::<_, String>(at)?),
        content: row.get(at + 1)?,
        post_id: PostId::new(row.get::<_, String>(at + 2)?),
        author_id: PersonaId::new(row.get::<_, String>(at + 3)?),
        parent_id: row.get::<_, Option<String>>(at + 4)?.map(ReplyId::new),
        votes: row.get(at + 5)?,
        created_at: row.get::<_, DateTime<Utc>>(at + 6)?,
    })
}

/// Posts joined with author and community: post (7) + persona (8) + community (3).
fn recent_post_from_row(row: &Row<'_>) -> rusqlite::Result<RecentPost> {
    Ok(RecentPost {
        post: post_at(row, 0)?,
        author: persona_at(row, 7)?,
        community: community_at(row, 15)?,
        recent_replies: Vec::new(),
    })
}

/// Replies joined with author: reply (7) + persona (8).
fn reply_view_from_row(row: &Row<'_>) -> rusqlite::Result<ReplyView> {
    Ok(ReplyView {
        reply: reply_at(row, 0)?,
        author: persona_at(row, 7)?,
    })
}

fn as_limit(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn recent_replies_of(
    conn: &Connection,
    post_id: &PostId,
    limit: usize,
) -> Result<Vec<ReplyView>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REPLY_COLS}, {PERSONA_COLS}
         FROM replies r JOIN personas a ON a.id = r.author_id
         WHERE r.post_id = ?1
         ORDER BY r.seq DESC
         LIMIT ?2"
    ))?;
    let rows = stmt.query_map(params![post_id.as_str(), as_limit(limit)], reply_view_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

// ---------------------------------------------------------------------------
// SqliteStore
// ---------------------------------------------------------------------------

/// [`Store`] persisted in a SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and ensure the
    /// schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Backend(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }
        let store = Self::from_connection(Connection::open(path)?)?;
        log::debug!("SqliteStore opened at {}", path.display());
        Ok(store)
    }

    /// A private, throwaway database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|e| {
                StoreError::Backend(format!("Failed to acquire database lock: {}", e))
            })?;
            f(&guard)
        })
        .await?
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn list_personas(&self) -> Result<Vec<Persona>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {PERSONA_COLS} FROM personas a ORDER BY a.seq"))?;
            let rows = stmt.query_map([], |row| persona_at(row, 0))?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn list_communities(&self) -> Result<Vec<Community>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COMMUNITY_COLS} FROM communities c ORDER BY c.seq"
            ))?;
            let rows = stmt.query_map([], |row| community_at(row, 0))?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn create_post(
        &self,
        author_id: &PersonaId,
        community_id: &CommunityId,
        title: &str,
        body: &str,
    ) -> Result<PostId, StoreError> {
        let id = PostId::generate();
        let (post_id, author, community) = (id.clone(), author_id.clone(), community_id.clone());
        let (title, body) = (title.to_string(), body.to_string());
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO posts (id, title, content, author_id, community_id, votes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
                params![
                    post_id.as_str(),
                    title,
                    body,
                    author.as_str(),
                    community.as_str(),
                    Utc::now()
                ],
            )?;
            Ok(())
        })
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
        let reply_id = id.clone();
        let post = post_id.clone();
        let author = author_id.clone();
        let parent = parent_id.map(|p| p.to_string());
        let body = body.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO replies (id, content, post_id, author_id, parent_id, votes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
                params![
                    reply_id.as_str(),
                    body,
                    post.as_str(),
                    author.as_str(),
                    parent,
                    Utc::now()
                ],
            )?;
            Ok(())
        })
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
        let id = id.to_string();
        self.with_conn(move |conn| {
            let votes: Option<i64> = conn
                .query_row(
                    &format!("UPDATE {table} SET votes = votes + ?1 WHERE id = ?2 RETURNING votes"),
                    params![delta, id],
                    |row| row.get(0),
                )
                .optional()?;
            votes.ok_or_else(|| StoreError::not_found(kind.as_str(), id))
        })
        .await
    }

    async fn list_recent_posts(
        &self,
        limit: usize,
        include_replies: bool,
        reply_limit: usize,
    ) -> Result<Vec<RecentPost>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {POST_COLS}, {PERSONA_COLS}, {COMMUNITY_COLS}
                 FROM posts p
                 JOIN personas a ON a.id = p.author_id
                 JOIN communities c ON c.id = p.community_id
                 ORDER BY p.seq DESC
                 LIMIT ?1"
            ))?;
            let mut posts = stmt
                .query_map(params![as_limit(limit)], recent_post_from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            if include_replies {
                for post in posts.iter_mut() {
                    post.recent_replies = recent_replies_of(conn, &post.post.id, reply_limit)?;
                }
            }
            Ok(posts)
        })
        .await
    }

    async fn list_recent_replies(&self, limit: usize) -> Result<Vec<ReplyView>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {REPLY_COLS}, {PERSONA_COLS}
                 FROM replies r JOIN personas a ON a.id = r.author_id
                 ORDER BY r.seq DESC
                 LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![as_limit(limit)], reply_view_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
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
        let row = persona.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO personas (id, name, handle, bio, personality, system_prompt, karma, avatar_url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    row.id.as_str(),
                    row.name,
                    row.handle,
                    row.bio,
                    row.personality,
                    row.system_prompt,
                    row.karma,
                    row.avatar_url
                ],
            )?;
            Ok(())
        })
        .await?;
        Ok(persona)
    }

    async fn insert_community(&self, seed: CommunitySeed) -> Result<Community, StoreError> {
        let community = Community {
            id: CommunityId::generate(),
            name: seed.name,
            description: seed.description,
        };
        let row = community.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO communities (id, name, description) VALUES (?1, ?2, ?3)",
                params![row.id.as_str(), row.name, row.description],
            )?;
            Ok(())
        })
        .await?;
        Ok(community)
    }

    async fn get_post(&self, id: &PostId) -> Result<Option<RecentPost>, StoreError> {
        let id = id.clone();
        self.with_conn(move |conn| {
            let post = conn
                .query_row(
                    &format!(
                        "SELECT {POST_COLS}, {PERSONA_COLS}, {COMMUNITY_COLS}
                         FROM posts p
                         JOIN personas a ON a.id = p.author_id
                         JOIN communities c ON c.id = p.community_id
                         WHERE p.id = ?1"
                    ),
                    params![id.as_str()],
                    recent_post_from_row,
                )
                .optional()?;
            Ok(post)
        })
        .await
    }

    async fn list_replies_for_post(&self, post_id: &PostId) -> Result<Vec<ReplyView>, StoreError> {
        let post_id = post_id.clone();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {REPLY_COLS}, {PERSONA_COLS}
                 FROM replies r JOIN personas a ON a.id = r.author_id
                 WHERE r.post_id = ?1
                 ORDER BY r.seq ASC"
            ))?;
            let rows = stmt.query_map(params![post_id.as_str()], reply_view_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }
}

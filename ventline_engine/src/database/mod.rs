pub mod models;
pub mod repositories;

use crate::config::VentlinePaths;
use anyhow::{anyhow, Result};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

pub(crate) const MIGRATIONS: &str = r#"
    PRAGMA journal_mode = WAL;
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        anonymous_name TEXT NOT NULL,
        display_tag TEXT NOT NULL DEFAULT '',
        notifications_enabled INTEGER NOT NULL DEFAULT 1,
        privacy_public INTEGER NOT NULL DEFAULT 1,
        is_admin INTEGER NOT NULL DEFAULT 0,
        pending_action TEXT NOT NULL DEFAULT '{"kind":"none"}',
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS posts (
        id TEXT PRIMARY KEY,
        author_id TEXT NOT NULL,
        content TEXT NOT NULL,
        category TEXT NOT NULL,
        media_kind TEXT,
        media_ref TEXT,
        created_at TEXT NOT NULL,
        approved INTEGER NOT NULL DEFAULT 0,
        approved_by TEXT,
        mirror_handle TEXT,
        FOREIGN KEY (author_id) REFERENCES users(id)
    );

    CREATE TABLE IF NOT EXISTS comments (
        id TEXT PRIMARY KEY,
        post_id TEXT NOT NULL,
        parent_comment_id TEXT,
        author_id TEXT NOT NULL,
        content TEXT NOT NULL,
        media_kind TEXT,
        media_ref TEXT,
        created_at TEXT NOT NULL,
        FOREIGN KEY (post_id) REFERENCES posts(id),
        FOREIGN KEY (parent_comment_id) REFERENCES comments(id),
        FOREIGN KEY (author_id) REFERENCES users(id)
    );

    CREATE INDEX IF NOT EXISTS idx_comments_post_parent
        ON comments(post_id, parent_comment_id);

    CREATE TABLE IF NOT EXISTS reactions (
        comment_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (comment_id, user_id),
        FOREIGN KEY (comment_id) REFERENCES comments(id),
        FOREIGN KEY (user_id) REFERENCES users(id)
    );

    CREATE TABLE IF NOT EXISTS follows (
        follower_id TEXT NOT NULL,
        followed_id TEXT NOT NULL,
        PRIMARY KEY (follower_id, followed_id),
        FOREIGN KEY (follower_id) REFERENCES users(id),
        FOREIGN KEY (followed_id) REFERENCES users(id)
    );

    CREATE TABLE IF NOT EXISTS private_messages (
        id TEXT PRIMARY KEY,
        sender_id TEXT NOT NULL,
        receiver_id TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at TEXT NOT NULL,
        is_read INTEGER NOT NULL DEFAULT 0,
        FOREIGN KEY (sender_id) REFERENCES users(id),
        FOREIGN KEY (receiver_id) REFERENCES users(id)
    );

    CREATE INDEX IF NOT EXISTS idx_pm_receiver
        ON private_messages(receiver_id, created_at);

    CREATE TABLE IF NOT EXISTS blocks (
        blocker_id TEXT NOT NULL,
        blocked_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (blocker_id, blocked_id),
        FOREIGN KEY (blocker_id) REFERENCES users(id),
        FOREIGN KEY (blocked_id) REFERENCES users(id)
    );
"#;

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    newly_created: bool,
}

impl Database {
    pub fn connect(paths: &VentlinePaths) -> Result<Self> {
        let newly_created = !paths.db_path.exists();
        let conn = Connection::open(&paths.db_path)?;
        Ok(Self::from_connection(conn, newly_created))
    }

    pub fn from_connection(conn: Connection, newly_created: bool) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            newly_created,
        }
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self::from_connection(conn, true);
        db.ensure_migrations()?;
        Ok(db)
    }

    pub fn ensure_migrations(&self) -> Result<bool> {
        self.with_conn(|conn| -> Result<()> {
            conn.execute_batch(MIGRATIONS)?;
            Ok(())
        })?;
        Ok(self.newly_created)
    }

    /// Runs `f` with the repository facade while holding the connection lock.
    /// The whole closure executes as one serialized unit of work, which is the
    /// engine's per-row write serialization point.
    pub fn with_repositories<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<anyhow::Error>,
        F: FnOnce(repositories::SqliteRepositories<'_>) -> Result<T, E>,
    {
        self.with_conn(|conn| {
            let repos = repositories::SqliteRepositories::new(conn);
            f(repos)
        })
    }

    fn with_conn<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<anyhow::Error>,
        F: FnOnce(&Connection) -> Result<T, E>,
    {
        let guard = self
            .conn
            .lock()
            .map_err(|_| E::from(anyhow!("database mutex poisoned")))?;
        f(&guard)
    }
}

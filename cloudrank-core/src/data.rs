use cloudrank_scanner::result::{CrawlResult, Edge, EdgeKind, UserId, UserRecord};
use rusqlite::{Connection, OpenFlags, OptionalExtension, Result, Row, Transaction, params};
use std::fs;
use std::io;
use std::path::Path;

pub struct Database {
    conn: Connection,
}

/// Table and target column holding edges of the given kind.
pub fn edge_table(kind: EdgeKind) -> (&'static str, &'static str) {
    match kind {
        EdgeKind::Following => ("following", "following_id"),
        EdgeKind::Comment => ("comments", "target_id"),
        EdgeKind::Like => ("likes", "target_id"),
        EdgeKind::Repost => ("reposts", "target_id"),
    }
}

fn user_from_row(row: &Row<'_>) -> Result<UserRecord> {
    Ok(UserRecord {
        id: row.get::<_, i64>(0)? as UserId,
        username: row.get(1)?,
        profile_url: row.get(2)?,
        avatar_url: row.get(3)?,
        country: row.get(4)?,
        city: row.get(5)?,
        total_play_count: row.get::<_, i64>(6)? as u64,
        total_like_count: row.get::<_, i64>(7)? as u64,
        total_comment_count: row.get::<_, i64>(8)? as u64,
    })
}

impl Database {
    pub fn drop(path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    /// Opens (creating if needed) the database at `path`.
    pub fn new(path: &Path) -> Result<Self> {
        Self::configure(Connection::open(path)?)
    }

    /// Opens a database that must already exist.
    pub fn open_existing(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::configure(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::configure(Connection::open_in_memory()?)
    }

    fn configure(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    username TEXT NOT NULL,
    url TEXT NOT NULL,
    avatar_url TEXT,
    country TEXT,
    city TEXT,
    total_play_count INTEGER NOT NULL DEFAULT 0,
    total_like_count INTEGER NOT NULL DEFAULT 0,
    total_comment_count INTEGER NOT NULL DEFAULT 0
);

-- Edge tables. unique_id is '{source}-{via}' so re-crawls overwrite rows
CREATE TABLE IF NOT EXISTS following (
    unique_id TEXT PRIMARY KEY,
    id INTEGER NOT NULL,
    following_id INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS comments (
    unique_id TEXT PRIMARY KEY,
    id INTEGER NOT NULL,
    target_id INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS likes (
    unique_id TEXT PRIMARY KEY,
    id INTEGER NOT NULL,
    target_id INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS reposts (
    unique_id TEXT PRIMARY KEY,
    id INTEGER NOT NULL,
    target_id INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_following_source ON following(id);
CREATE INDEX IF NOT EXISTS idx_comments_source ON comments(id);
CREATE INDEX IF NOT EXISTS idx_likes_source ON likes(id);
CREATE INDEX IF NOT EXISTS idx_reposts_source ON reposts(id);
            ",
        )?;
        Ok(())
    }

    /// Stores one crawl unit in a single transaction. Nothing is written if
    /// any statement fails.
    pub fn save_crawl_result(&mut self, result: &CrawlResult) -> Result<()> {
        let tx = self.conn.transaction()?;
        upsert_user(&tx, &result.user)?;
        for edge in result.edges() {
            upsert_edge(&tx, edge)?;
        }
        tx.commit()
    }

    // User queries
    pub fn get_user(&self, id: UserId) -> Result<Option<UserRecord>> {
        self.conn
            .query_row(
                "SELECT id, username, url, avatar_url, country, city,
                        total_play_count, total_like_count, total_comment_count
                 FROM users WHERE id = ?1",
                params![id as i64],
                user_from_row,
            )
            .optional()
    }

    pub fn users(&self) -> Result<Vec<UserRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, username, url, avatar_url, country, city,
                    total_play_count, total_like_count, total_comment_count
             FROM users ORDER BY id",
        )?;

        let users = stmt
            .query_map([], user_from_row)?
            .collect::<Result<Vec<_>>>()?;

        Ok(users)
    }

    /// Every stored user id with its profile URL.
    pub fn user_urls(&self) -> Result<Vec<(UserId, String)>> {
        let mut stmt = self.conn.prepare("SELECT id, url FROM users ORDER BY id")?;

        let urls = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)? as UserId, row.get(1)?)))?
            .collect::<Result<Vec<_>>>()?;

        Ok(urls)
    }

    pub fn count_users(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // Edge queries
    /// Targets of every stored edge of `kind` leaving `source`, one entry per row.
    pub fn edge_targets(&self, source: UserId, kind: EdgeKind) -> Result<Vec<UserId>> {
        let (table, target) = edge_table(kind);
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {} FROM {} WHERE id = ?1 ORDER BY unique_id",
            target, table
        ))?;

        let targets = stmt
            .query_map(params![source as i64], |row| {
                Ok(row.get::<_, i64>(0)? as UserId)
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok(targets)
    }

    pub fn edge_keys(&self, kind: EdgeKind) -> Result<Vec<String>> {
        let (table, _) = edge_table(kind);
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT unique_id FROM {} ORDER BY unique_id", table))?;

        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>>>()?;

        Ok(keys)
    }

    pub fn count_edges(&self, kind: EdgeKind) -> Result<usize> {
        let (table, _) = edge_table(kind);
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?;
        Ok(count as usize)
    }

    pub fn get_connection(&self) -> &Connection {
        &self.conn
    }
}

fn upsert_user(tx: &Transaction<'_>, user: &UserRecord) -> Result<()> {
    tx.prepare_cached(
        "INSERT INTO users (
            id, username, url, avatar_url, country, city,
            total_play_count, total_like_count, total_comment_count
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(id) DO UPDATE SET
            username = excluded.username,
            url = excluded.url,
            avatar_url = excluded.avatar_url,
            country = excluded.country,
            city = excluded.city,
            total_play_count = excluded.total_play_count,
            total_like_count = excluded.total_like_count,
            total_comment_count = excluded.total_comment_count",
    )?
    .execute(params![
        user.id as i64,
        &user.username,
        &user.profile_url,
        &user.avatar_url,
        &user.country,
        &user.city,
        user.total_play_count as i64,
        user.total_like_count as i64,
        user.total_comment_count as i64,
    ])?;
    Ok(())
}

fn upsert_edge(tx: &Transaction<'_>, edge: &Edge) -> Result<()> {
    let (table, target) = edge_table(edge.kind);
    tx.prepare_cached(&format!(
        "INSERT INTO {table} (unique_id, id, {target}) VALUES (?1, ?2, ?3)
         ON CONFLICT(unique_id) DO UPDATE SET id = excluded.id, {target} = excluded.{target}"
    ))?
    .execute(params![
        edge.unique_id(),
        edge.source as i64,
        edge.target as i64
    ])?;
    Ok(())
}

//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the local record store.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    pages_visited INTEGER NOT NULL,
    records_upserted INTEGER NOT NULL,
    summary TEXT NOT NULL
);

-- Harvested catalog items, one row per external ID
CREATE TABLE IF NOT EXISTS videos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    cover_url TEXT NOT NULL,
    source_url TEXT NOT NULL,
    source_tag TEXT NOT NULL,
    duration TEXT,
    release_date TEXT,
    actors TEXT,
    tags TEXT,
    categories TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_videos_source_tag ON videos(source_tag);
CREATE INDEX IF NOT EXISTS idx_videos_active_created ON videos(is_active, created_at);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}

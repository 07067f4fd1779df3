//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the RecordStore trait.

use crate::record::{CategorizedRecord, ExistingMetadata};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RecordStore, StoreError, StoreResult};
use crate::storage::{ActiveRecord, RunRecord, StoreStats, StoredRecord};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// SQLite caps bound parameters per statement; batch reads are chunked below it
const BATCH_CHUNK: usize = 500;

/// SQLite storage backend
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Unavailable("SQLite connection lock poisoned".to_string()))?;
        f(&conn)
    }

    /// Reads back a full record
    pub fn get_record(&self, external_id: &str) -> StoreResult<Option<StoredRecord>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT external_id, title, cover_url, source_url, source_tag, duration,
                            release_date, actors, tags, categories, is_active
                     FROM videos WHERE external_id = ?1",
                    params![external_id],
                    |row| {
                        Ok((
                            StoredRecord {
                                external_id: row.get(0)?,
                                title: row.get(1)?,
                                cover_url: row.get(2)?,
                                source_url: row.get(3)?,
                                source_tag: row.get(4)?,
                                duration: row.get(5)?,
                                release_date: row.get(6)?,
                                actors: None,
                                tags: None,
                                categories: None,
                                is_active: row.get(10)?,
                            },
                            row.get::<_, Option<String>>(7)?,
                            row.get::<_, Option<String>>(8)?,
                            row.get::<_, Option<String>>(9)?,
                        ))
                    },
                )
                .optional()?;

            let Some((mut record, actors, tags, categories)) = row else {
                return Ok(None);
            };
            record.actors = decode_list(actors)?;
            record.tags = decode_list(tags)?;
            record.categories = decode_list(categories)?;
            Ok(Some(record))
        })
    }

    /// Number of stored records
    pub fn count(&self) -> StoreResult<u64> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM videos", [], |row| row.get(0))?)
        })
    }

    /// Number of recorded runs
    pub fn count_runs(&self) -> StoreResult<u64> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?)
        })
    }
}

fn encode_list<'a>(items: impl IntoIterator<Item = &'a String>) -> StoreResult<String> {
    Ok(serde_json::to_string(&items.into_iter().collect::<Vec<_>>())?)
}

fn decode_list(raw: Option<String>) -> StoreResult<Option<Vec<String>>> {
    raw.map(|json| serde_json::from_str(&json))
        .transpose()
        .map_err(StoreError::from)
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn batch_get(&self, ids: &[String]) -> StoreResult<HashMap<String, ExistingMetadata>> {
        self.with_conn(|conn| {
            let mut snapshot = HashMap::new();

            for chunk in ids.chunks(BATCH_CHUNK) {
                let placeholders = vec!["?"; chunk.len()].join(", ");
                let sql = format!(
                    "SELECT external_id, duration, actors FROM videos WHERE external_id IN ({})",
                    placeholders
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                })?;

                for row in rows {
                    let (external_id, duration, actors) = row?;
                    snapshot.insert(
                        external_id,
                        ExistingMetadata {
                            duration,
                            actors: decode_list(actors)?,
                        },
                    );
                }
            }

            Ok(snapshot)
        })
    }

    async fn upsert(&self, record: CategorizedRecord) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();
        let stub = &record.stub;

        self.with_conn(|conn| {
            match &record.enrichment {
                Some(enrichment) => {
                    let detail = &enrichment.detail;
                    let actors = detail.actors.as_ref().map(encode_list).transpose()?;
                    let tags = detail.tags.as_ref().map(encode_list).transpose()?;
                    let categories = encode_list(&enrichment.categories)?;

                    conn.execute(
                        "INSERT INTO videos (external_id, title, cover_url, source_url, source_tag,
                                             duration, release_date, actors, tags, categories,
                                             is_active, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
                         ON CONFLICT(external_id) DO UPDATE SET
                             title = excluded.title,
                             cover_url = excluded.cover_url,
                             source_url = excluded.source_url,
                             source_tag = excluded.source_tag,
                             duration = excluded.duration,
                             release_date = excluded.release_date,
                             actors = excluded.actors,
                             tags = excluded.tags,
                             categories = excluded.categories,
                             is_active = excluded.is_active,
                             updated_at = excluded.updated_at
                         WHERE videos.title IS NOT excluded.title
                            OR videos.cover_url IS NOT excluded.cover_url
                            OR videos.source_url IS NOT excluded.source_url
                            OR videos.source_tag IS NOT excluded.source_tag
                            OR videos.duration IS NOT excluded.duration
                            OR videos.release_date IS NOT excluded.release_date
                            OR videos.actors IS NOT excluded.actors
                            OR videos.tags IS NOT excluded.tags
                            OR videos.categories IS NOT excluded.categories
                            OR videos.is_active IS NOT excluded.is_active",
                        params![
                            stub.external_id,
                            stub.title,
                            stub.cover_url,
                            stub.source_url,
                            record.source_tag,
                            record.persisted_duration(),
                            detail.release_date,
                            actors,
                            tags,
                            categories,
                            record.is_active,
                            now,
                        ],
                    )?;
                }
                None => {
                    conn.execute(
                        "INSERT INTO videos (external_id, title, cover_url, source_url, source_tag,
                                             is_active, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                         ON CONFLICT(external_id) DO UPDATE SET
                             title = excluded.title,
                             cover_url = excluded.cover_url,
                             source_url = excluded.source_url,
                             source_tag = excluded.source_tag,
                             is_active = excluded.is_active,
                             updated_at = excluded.updated_at
                         WHERE videos.title IS NOT excluded.title
                            OR videos.cover_url IS NOT excluded.cover_url
                            OR videos.source_url IS NOT excluded.source_url
                            OR videos.source_tag IS NOT excluded.source_tag
                            OR videos.is_active IS NOT excluded.is_active",
                        params![
                            stub.external_id,
                            stub.title,
                            stub.cover_url,
                            stub.source_url,
                            record.source_tag,
                            record.is_active,
                            now,
                        ],
                    )?;
                }
            }
            Ok(())
        })
        .map_err(|e| match e {
            StoreError::Sqlite(source) => StoreError::Write {
                external_id: record.stub.external_id.clone(),
                message: source.to_string(),
            },
            other => other,
        })
    }

    async fn list_active(&self, limit: usize) -> StoreResult<Vec<ActiveRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT external_id, source_url FROM videos
                 WHERE is_active = 1 ORDER BY created_at ASC, id ASC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit as i64], |row| {
                Ok(ActiveRecord {
                    external_id: row.get(0)?,
                    source_url: row.get(1)?,
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    async fn set_active(&self, external_id: &str, active: bool) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE videos SET is_active = ?1, updated_at = ?2 WHERE external_id = ?3",
                params![active, now, external_id],
            )?;
            Ok(())
        })
    }

    async fn stats(&self) -> StoreResult<StoreStats> {
        self.with_conn(|conn| {
            let (total, active, with_duration) = conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(is_active), 0),
                        COALESCE(SUM(CASE WHEN duration IS NOT NULL
                                           AND TRIM(duration) != ''
                                           AND LOWER(duration) != 'unknown'
                                      THEN 1 ELSE 0 END), 0)
                 FROM videos",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;

            let mut stmt =
                conn.prepare("SELECT source_tag, COUNT(*) FROM videos GROUP BY source_tag")?;
            let by_source = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<_, _>>()?;

            Ok(StoreStats {
                total,
                active,
                with_duration,
                by_source,
            })
        })
    }

    async fn record_run(&self, run: &RunRecord) -> StoreResult<()> {
        let summary = serde_json::to_string(&run.summary)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO runs (started_at, finished_at, config_hash, pages_visited,
                                   records_upserted, summary)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    run.started_at.to_rfc3339(),
                    run.finished_at.to_rfc3339(),
                    run.config_hash,
                    run.summary.pages_visited as i64,
                    run.summary.upserted as i64,
                    summary,
                ],
            )?;
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

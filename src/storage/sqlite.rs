//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the `Store` trait.
//! The connection sits behind a mutex; every operation is a short synchronous
//! statement, so the lock is never held across an await point.

use crate::config::SourceEntry;
use crate::jobs::NormalizedJob;
use crate::model::{PageType, Source};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StorageError, StorageResult, Store};
use crate::storage::{
    CaptureMeta, CaptureRecord, RunStatus, ScrapeStatus, UpsertOutcome, VisitStatus,
};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const CAPTURE_COLUMNS: &str = "id, source_id, url, raw_html, cleaned_html, page_type, \
     jobs_count, extraction_strategy, captured_at";

const SOURCE_COLUMNS: &str = "id, name, url, slug, source_type, enabled";

/// Per-source counters for the `--stats` report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStats {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub enabled: bool,
    pub jobs: u64,
    pub captures: u64,
    pub visited: u64,
    pub blocked: u64,
    pub last_status: Option<ScrapeStatus>,
    pub last_message: Option<String>,
    pub last_scraped_at: Option<String>,
}

/// SQLite storage backend
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // Several sources write concurrently during a cycle
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Brings the sources table in line with the configured entries
    ///
    /// Entries are upserted by slug. A start URL repaired by self-correction
    /// is kept until the configured URL itself changes. Stored sources
    /// missing from the configuration are disabled.
    pub fn sync_sources(&self, entries: &[SourceEntry]) -> StorageResult<Vec<i64>> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(entries.len());

        for entry in entries {
            tx.execute(
                "INSERT INTO sources (name, url, config_url, slug, source_type, enabled)
                 VALUES (?1, ?2, ?2, ?3, ?4, ?5)
                 ON CONFLICT(slug) DO UPDATE SET
                     name = excluded.name,
                     url = CASE WHEN sources.config_url = excluded.config_url
                                THEN sources.url ELSE excluded.url END,
                     config_url = excluded.config_url,
                     source_type = excluded.source_type,
                     enabled = excluded.enabled",
                params![
                    entry.name,
                    entry.url,
                    entry.slug,
                    entry.source_type,
                    entry.enabled
                ],
            )?;
            let id: i64 = tx.query_row(
                "SELECT id FROM sources WHERE slug = ?1",
                params![entry.slug],
                |row| row.get(0),
            )?;
            ids.push(id);
        }

        let slugs: Vec<&str> = entries.iter().map(|e| e.slug.as_str()).collect();
        let mut stmt = tx.prepare("SELECT id, slug FROM sources WHERE enabled = 1")?;
        let stale: Vec<i64> = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|(_, slug)| !slugs.contains(&slug.as_str()))
            .map(|(id, _)| id)
            .collect();
        drop(stmt);

        for id in stale {
            tx.execute("UPDATE sources SET enabled = 0 WHERE id = ?1", params![id])?;
        }

        tx.commit()?;
        Ok(ids)
    }

    /// Records the start of a harvest run
    pub fn begin_run(&self, config_hash: &str) -> StorageResult<i64> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Records the end of a harvest run
    pub fn finish_run(&self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn().execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        Ok(())
    }

    /// Counts jobs, captures, and ledger entries for every source
    pub fn source_stats(&self) -> StorageResult<Vec<SourceStats>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT s.id, s.name, s.slug, s.enabled,
                 (SELECT COUNT(*) FROM jobs j WHERE j.source_id = s.id),
                 (SELECT COUNT(*) FROM captures c WHERE c.source_id = s.id),
                 (SELECT COUNT(*) FROM visited_urls v WHERE v.source_id = s.id AND v.status = 'visited'),
                 (SELECT COUNT(*) FROM visited_urls v WHERE v.source_id = s.id AND v.status = 'blocked'),
                 s.last_status, s.last_message, s.last_scraped_at
             FROM sources s ORDER BY s.id",
        )?;

        let stats = stmt
            .query_map([], |row| {
                Ok(SourceStats {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    slug: row.get(2)?,
                    enabled: row.get(3)?,
                    jobs: row.get::<_, i64>(4)? as u64,
                    captures: row.get::<_, i64>(5)? as u64,
                    visited: row.get::<_, i64>(6)? as u64,
                    blocked: row.get::<_, i64>(7)? as u64,
                    last_status: row
                        .get::<_, Option<String>>(8)?
                        .as_deref()
                        .and_then(ScrapeStatus::from_db_string),
                    last_message: row.get(9)?,
                    last_scraped_at: row.get(10)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(stats)
    }
}

fn source_from_row(row: &Row<'_>) -> rusqlite::Result<Source> {
    Ok(Source {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        slug: row.get(3)?,
        source_type: row.get(4)?,
        enabled_for_scraping: row.get(5)?,
    })
}

fn capture_from_row(row: &Row<'_>) -> rusqlite::Result<CaptureRecord> {
    Ok(CaptureRecord {
        id: row.get(0)?,
        source_id: row.get(1)?,
        url: row.get(2)?,
        raw_html: row.get(3)?,
        cleaned_html: row.get(4)?,
        page_type: row
            .get::<_, Option<String>>(5)?
            .as_deref()
            .and_then(PageType::from_db_string),
        jobs_count: row.get::<_, i64>(6)? as usize,
        extraction_strategy: row.get(7)?,
        captured_at: row.get(8)?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    // ===== Sources =====

    async fn list_enabled_sources(&self) -> StorageResult<Vec<Source>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sources WHERE enabled = 1 ORDER BY id",
            SOURCE_COLUMNS
        ))?;
        let sources = stmt
            .query_map([], source_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sources)
    }

    async fn get_source(&self, source_id: i64) -> StorageResult<Source> {
        self.conn()
            .query_row(
                &format!("SELECT {} FROM sources WHERE id = ?1", SOURCE_COLUMNS),
                params![source_id],
                source_from_row,
            )
            .optional()?
            .ok_or(StorageError::SourceNotFound(source_id))
    }

    async fn update_source_url(&self, source_id: i64, url: &str) -> StorageResult<()> {
        let changed = self.conn().execute(
            "UPDATE sources SET url = ?1 WHERE id = ?2",
            params![url, source_id],
        )?;
        if changed == 0 {
            return Err(StorageError::SourceNotFound(source_id));
        }
        Ok(())
    }

    async fn set_scrape_status(
        &self,
        source_id: i64,
        status: ScrapeStatus,
        message: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn().execute(
            "UPDATE sources SET last_status = ?1, last_message = ?2, last_scraped_at = ?3
             WHERE id = ?4",
            params![status.to_db_string(), message, now, source_id],
        )?;
        if changed == 0 {
            return Err(StorageError::SourceNotFound(source_id));
        }
        Ok(())
    }

    // ===== Captures =====

    async fn save_raw_capture(
        &self,
        source_id: i64,
        url: &str,
        raw_html: &str,
    ) -> StorageResult<i64> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO captures (source_id, url, raw_html, captured_at) VALUES (?1, ?2, ?3, ?4)",
            params![source_id, url, raw_html, now],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn save_cleaned_capture(&self, capture_id: i64, cleaned_html: &str) -> StorageResult<()> {
        let changed = self.conn().execute(
            "UPDATE captures SET cleaned_html = ?1 WHERE id = ?2",
            params![cleaned_html, capture_id],
        )?;
        if changed == 0 {
            return Err(StorageError::CaptureNotFound(capture_id));
        }
        Ok(())
    }

    async fn update_capture_meta(&self, capture_id: i64, meta: &CaptureMeta) -> StorageResult<()> {
        let changed = self.conn().execute(
            "UPDATE captures SET page_type = ?1, jobs_count = ?2, extraction_strategy = ?3
             WHERE id = ?4",
            params![
                meta.page_type.to_db_string(),
                meta.jobs_count as i64,
                meta.extraction_strategy,
                capture_id
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::CaptureNotFound(capture_id));
        }
        Ok(())
    }

    async fn best_capture(&self, source_id: i64) -> StorageResult<Option<CaptureRecord>> {
        let capture = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {} FROM captures WHERE source_id = ?1 AND jobs_count > 0
                     ORDER BY jobs_count DESC, id DESC LIMIT 1",
                    CAPTURE_COLUMNS
                ),
                params![source_id],
                capture_from_row,
            )
            .optional()?;
        Ok(capture)
    }

    async fn list_captures(&self, source_id: i64) -> StorageResult<Vec<CaptureRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM captures WHERE source_id = ?1 ORDER BY id DESC",
            CAPTURE_COLUMNS
        ))?;
        let captures = stmt
            .query_map(params![source_id], capture_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(captures)
    }

    // ===== Job cache =====

    async fn upsert_job(&self, job: &NormalizedJob) -> StorageResult<UpsertOutcome> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM jobs WHERE source_id = ?1 AND dedupe_key = ?2",
                params![job.source_id, job.dedupe_key],
                |row| row.get(0),
            )
            .optional()?;

        conn.execute(
            "INSERT INTO jobs (source_id, dedupe_key, title, company, location, url,
                 description, salary, posted_at, first_seen_at, last_seen_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
             ON CONFLICT(source_id, dedupe_key) DO UPDATE SET
                 title = excluded.title,
                 company = COALESCE(excluded.company, jobs.company),
                 location = COALESCE(excluded.location, jobs.location),
                 url = COALESCE(excluded.url, jobs.url),
                 description = COALESCE(excluded.description, jobs.description),
                 salary = COALESCE(excluded.salary, jobs.salary),
                 posted_at = COALESCE(excluded.posted_at, jobs.posted_at),
                 last_seen_at = excluded.last_seen_at",
            params![
                job.source_id,
                job.dedupe_key,
                job.title,
                job.company,
                job.location,
                job.url,
                job.description,
                job.salary,
                job.posted_at,
                now
            ],
        )?;

        Ok(if existing.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        })
    }

    // ===== Visited ledger =====

    async fn mark_visited(
        &self,
        source_id: i64,
        url: &str,
        status: VisitStatus,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn().execute(
            "INSERT INTO visited_urls (source_id, url, status, visited_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(source_id, url) DO UPDATE SET
                 status = excluded.status, visited_at = excluded.visited_at",
            params![source_id, url, status.to_db_string(), now],
        )?;
        Ok(())
    }

    async fn list_visited(
        &self,
        source_id: i64,
        status: Option<VisitStatus>,
    ) -> StorageResult<Vec<String>> {
        let conn = self.conn();
        let rows: Vec<(String, String)> = {
            let mut stmt = conn.prepare(
                "SELECT url, status FROM visited_urls WHERE source_id = ?1 ORDER BY visited_at, url",
            )?;
            let rows = stmt
                .query_map(params![source_id], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        Ok(rows
            .into_iter()
            .filter(|(_, s)| match status {
                Some(wanted) => VisitStatus::from_db_string(s) == Some(wanted),
                None => true,
            })
            .map(|(url, _)| url)
            .collect())
    }
}

//! SQLite-backed record store.
//!
//! One database file holds the bookmark table, its FTS5 index (kept in sync
//! by triggers), the embedding table and a small key/value metadata table.
//! Every public operation holds the connection lock for its whole duration,
//! so background pipeline writes and foreground edits never interleave.

mod embeddings;
mod errors;
mod schema;
mod search;

use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, types::Value, Connection, OptionalExtension, Row};

use crate::bookmarks::{Bookmark, BookmarkCreate, BookmarkUpdate, ScrapeStatus, Source};
use crate::eid::{canonical_url, Eid};

pub use errors::{Result, StoreError};
use schema::create_schema;

/// Database file name inside the base directory.
pub const DB_FILE_NAME: &str = "xhub.db";

const COLUMNS: &str = "id, source, url, title, summary, keywords, notes, raw_content, \
                       created_at, updated_at, scraped_at, scrape_status, hidden";

/// Result of one enrichment pass, persisted in a single statement.
#[derive(Debug, Clone, Default)]
pub struct Enrichment {
    /// Replaces the stored title only while it is empty or equal to the URL.
    pub title: Option<String>,
    pub raw_content: String,
    pub summary: String,
    pub keywords: String,
    pub status: ScrapeStatus,
}

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open or create the database in the given directory.
    pub fn open(dir: &Path) -> Result<Self> {
        let db_path = dir.join(DB_FILE_NAME);
        log::debug!("opening database at {}", db_path.display());

        let conn = Connection::open(&db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        create_schema(&conn)?;
        Ok(Store {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Insert a new bookmark or merge into the existing one with the same URL.
    ///
    /// Returns `true` when a row was inserted. On merge, only non-empty
    /// incoming fields overwrite stored ones; `updated_at` always advances and
    /// `created_at` is never touched.
    pub fn upsert(&self, item: &BookmarkCreate) -> Result<bool> {
        let url = canonical_url(&item.url);
        if url.is_empty() {
            return Err(StoreError::InvalidRecord("url is empty".to_string()));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let existing: Option<String> = tx
            .query_row("SELECT id FROM bookmarks WHERE url = ?1", [url], |row| {
                row.get(0)
            })
            .optional()?;

        let now = Utc::now();
        let scraped_at = item.scraped_at.map(fmt_ts);
        let status = item.scrape_status.map(|s| s.as_str());

        let is_new = match existing {
            None => {
                let source = item
                    .source
                    .ok_or_else(|| StoreError::InvalidRecord("source is required".to_string()))?;
                let created_at = item.created_at.map(|c| c.min(now)).unwrap_or(now);
                // content that arrives with the record counts as scraped
                let status = status.unwrap_or(if item.raw_content.is_empty() {
                    ScrapeStatus::Pending.as_str()
                } else {
                    ScrapeStatus::Success.as_str()
                });

                tx.execute(
                    "INSERT INTO bookmarks (id, source, url, title, summary, keywords, notes,
                        raw_content, created_at, updated_at, scraped_at, scrape_status, hidden)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 0)",
                    params![
                        Eid::from_url(url).as_str(),
                        source.as_str(),
                        url,
                        item.title,
                        item.summary,
                        item.keywords,
                        item.notes,
                        item.raw_content,
                        fmt_ts(created_at),
                        fmt_ts(now),
                        scraped_at,
                        status,
                    ],
                )?;
                true
            }
            Some(id) => {
                tx.execute(
                    "UPDATE bookmarks SET
                        title = CASE WHEN ?1 <> '' THEN ?1 ELSE title END,
                        summary = CASE WHEN ?2 <> '' THEN ?2 ELSE summary END,
                        keywords = CASE WHEN ?3 <> '' THEN ?3 ELSE keywords END,
                        notes = CASE WHEN ?4 <> '' THEN ?4 ELSE notes END,
                        raw_content = CASE WHEN ?5 <> '' THEN ?5 ELSE raw_content END,
                        scraped_at = COALESCE(?6, scraped_at),
                        scrape_status = COALESCE(?7, CASE
                            WHEN ?5 <> '' AND scrape_status = 'pending' THEN 'success'
                            ELSE scrape_status END),
                        updated_at = ?8
                     WHERE id = ?9",
                    params![
                        item.title,
                        item.summary,
                        item.keywords,
                        item.notes,
                        item.raw_content,
                        scraped_at,
                        status,
                        fmt_ts(now),
                        id,
                    ],
                )?;
                false
            }
        };

        tx.commit()?;
        Ok(is_new)
    }

    pub fn get(&self, id: &str) -> Result<Bookmark> {
        let conn = self.conn()?;
        get_by_id(&conn, id)
    }

    pub fn get_by_url(&self, url: &str) -> Result<Bookmark> {
        let conn = self.conn()?;
        let sql = format!("SELECT {COLUMNS} FROM bookmarks WHERE url = ?1");
        conn.query_row(&sql, [canonical_url(url)], row_to_bookmark)
            .optional()?
            .ok_or(StoreError::NotFound)
    }

    /// Delete a bookmark and its embedding. Returns `false` when nothing matched.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM bookmarks_vec WHERE id = ?1", [id])?;
        let deleted = tx.execute("DELETE FROM bookmarks WHERE id = ?1", [id])?;
        tx.commit()?;

        if deleted > 0 {
            log::debug!("deleted bookmark {id}");
        }
        Ok(deleted > 0)
    }

    /// Non-hidden bookmarks, newest first.
    ///
    /// Synced sources sort by their upstream creation time, manual entries by
    /// their last update. An empty `sources` slice means every source.
    pub fn list(&self, sources: &[Source], limit: usize) -> Result<Vec<Bookmark>> {
        let timestamped = Source::ALL
            .iter()
            .filter(|s| s.has_original_timestamp())
            .map(|s| format!("'{}'", s.as_str()))
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = format!("SELECT {COLUMNS} FROM bookmarks WHERE hidden = 0");
        let mut args: Vec<Value> = Vec::with_capacity(sources.len() + 1);

        if !sources.is_empty() {
            let placeholders = vec!["?"; sources.len()].join(", ");
            sql.push_str(&format!(" AND source IN ({placeholders})"));
            args.extend(sources.iter().map(|s| Value::Text(s.as_str().to_string())));
        }

        sql.push_str(&format!(
            " ORDER BY CASE WHEN source IN ({timestamped}) THEN created_at ELSE updated_at END DESC, id ASC LIMIT ?"
        ));
        args.push(Value::Integer(to_limit(limit)));

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), row_to_bookmark)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Bookmarks still waiting for enrichment. Failed ones are retried too.
    pub fn get_pending(&self, limit: usize) -> Result<Vec<Bookmark>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {COLUMNS} FROM bookmarks
             WHERE scrape_status IN ('pending', 'failed')
             ORDER BY updated_at DESC, id ASC
             LIMIT ?1"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([to_limit(limit)], row_to_bookmark)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Reset bookmarks to `pending` and clear everything the pipeline produced.
    pub fn mark_for_reprocess(&self, ids: &[Eid]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let now = fmt_ts(Utc::now());
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE bookmarks SET
                    scrape_status = 'pending',
                    raw_content = '',
                    summary = '',
                    keywords = '',
                    updated_at = ?1
                 WHERE id = ?2",
            )?;
            for id in ids {
                stmt.execute(params![now, id.as_str()])?;
            }
        }
        tx.commit()?;

        log::debug!("marked {} bookmark(s) for reprocess", ids.len());
        Ok(())
    }

    /// Value for `key`, or an empty string when unset.
    pub fn get_metadata(&self, key: &str) -> Result<String> {
        let conn = self.conn()?;
        let value = conn
            .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value.unwrap_or_default())
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            [key, value],
        )?;
        Ok(())
    }

    /// Bookmarks of `source` whose URL is missing from `current_urls`.
    ///
    /// An empty `current_urls` orphans every bookmark of the source; callers
    /// must only pass it when the source really reported zero items.
    pub fn get_orphaned_by_source(
        &self,
        source: Source,
        current_urls: &[String],
    ) -> Result<Vec<Bookmark>> {
        let current: HashSet<&str> = current_urls.iter().map(|u| canonical_url(u)).collect();

        let conn = self.conn()?;
        let sql = format!("SELECT {COLUMNS} FROM bookmarks WHERE source = ?1 ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([source.as_str()], row_to_bookmark)?;

        let mut orphans = vec![];
        for bookmark in rows {
            let bookmark = bookmark?;
            if !current.contains(bookmark.url.as_str()) {
                orphans.push(bookmark);
            }
        }
        Ok(orphans)
    }

    /// Number of non-hidden bookmarks.
    pub fn count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM bookmarks WHERE hidden = 0", [], |row| {
                row.get(0)
            })?;
        Ok(count.max(0) as usize)
    }

    /// Apply a direct user edit. `None` fields are left as they are.
    pub fn apply_user_edit(&self, id: &str, update: &BookmarkUpdate) -> Result<Bookmark> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE bookmarks SET
                title = COALESCE(?1, title),
                summary = COALESCE(?2, summary),
                keywords = COALESCE(?3, keywords),
                notes = COALESCE(?4, notes),
                hidden = COALESCE(?5, hidden),
                updated_at = ?6
             WHERE id = ?7",
            params![
                update.title,
                update.summary,
                update.keywords,
                update.notes,
                update.hidden,
                fmt_ts(Utc::now()),
                id,
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        get_by_id(&conn, id)
    }

    /// Persist a pipeline result.
    ///
    /// Content, summary and keywords only fill fields that are still empty,
    /// and `notes` is never touched. Returns `false` when the bookmark no
    /// longer exists.
    pub fn record_enrichment(&self, id: &str, enrichment: &Enrichment) -> Result<bool> {
        let now = fmt_ts(Utc::now());
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE bookmarks SET
                title = CASE WHEN ?1 IS NOT NULL AND ?1 <> '' AND (title = '' OR title = url)
                        THEN ?1 ELSE title END,
                raw_content = CASE WHEN raw_content = '' THEN ?2 ELSE raw_content END,
                summary = CASE WHEN summary = '' THEN ?3 ELSE summary END,
                keywords = CASE WHEN keywords = '' THEN ?4 ELSE keywords END,
                scrape_status = ?5,
                scraped_at = ?6,
                updated_at = ?6
             WHERE id = ?7",
            params![
                enrichment.title,
                enrichment.raw_content,
                enrichment.summary,
                enrichment.keywords,
                enrichment.status.as_str(),
                now,
                id,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Mark a content fetch failure. Bookmarks that already have content keep their status.
    pub fn mark_failed(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE bookmarks SET scrape_status = 'failed', updated_at = ?1
             WHERE id = ?2 AND raw_content = ''",
            params![fmt_ts(Utc::now()), id],
        )?;
        Ok(changed > 0)
    }

    /// Non-hidden bookmarks that have content but no summary, most recently updated first.
    pub fn needing_summary(&self, limit: Option<usize>) -> Result<Vec<Bookmark>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {COLUMNS} FROM bookmarks
             WHERE raw_content <> '' AND summary = '' AND hidden = 0
             ORDER BY updated_at DESC, id ASC
             LIMIT ?1"
        );
        let mut stmt = conn.prepare(&sql)?;
        let limit = limit.map(to_limit).unwrap_or(-1);
        let rows = stmt.query_map([limit], row_to_bookmark)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn get_by_id(conn: &Connection, id: &str) -> Result<Bookmark> {
    let sql = format!("SELECT {COLUMNS} FROM bookmarks WHERE id = ?1");
    conn.query_row(&sql, [id], row_to_bookmark)
        .optional()?
        .ok_or(StoreError::NotFound)
}

fn to_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Timestamps are stored as RFC 3339 UTC with milliseconds so text order equals time order.
pub(crate) fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, err.into())
}

fn row_to_bookmark(row: &Row) -> rusqlite::Result<Bookmark> {
    let source: String = row.get(1)?;
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;
    let scraped_at: Option<String> = row.get(10)?;
    let status: String = row.get(11)?;

    Ok(Bookmark {
        id: Eid::from(row.get::<_, String>(0)?),
        source: Source::from_str(&source).map_err(|e| conversion_error(1, e))?,
        url: row.get(2)?,
        title: row.get(3)?,
        summary: row.get(4)?,
        keywords: row.get(5)?,
        notes: row.get(6)?,
        raw_content: row.get(7)?,
        created_at: parse_ts(8, &created_at)?,
        updated_at: parse_ts(9, &updated_at)?,
        scraped_at: scraped_at.as_deref().map(|s| parse_ts(10, s)).transpose()?,
        scrape_status: ScrapeStatus::from_str(&status).map_err(|e| conversion_error(11, e))?,
        hidden: row.get(12)?,
    })
}

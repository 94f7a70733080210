//! SQLite schema for the bookmark store.

use rusqlite::{Connection, OptionalExtension, Result};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS bookmarks (
    id TEXT PRIMARY KEY,
    source TEXT NOT NULL,
    url TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL DEFAULT '',
    summary TEXT NOT NULL DEFAULT '',
    keywords TEXT NOT NULL DEFAULT '',
    notes TEXT NOT NULL DEFAULT '',
    raw_content TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    scraped_at TEXT,
    scrape_status TEXT NOT NULL DEFAULT 'pending',
    hidden INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_bookmarks_source ON bookmarks(source);
CREATE INDEX IF NOT EXISTS idx_bookmarks_scrape_status ON bookmarks(scrape_status);

-- One embedding per bookmark, little-endian f32 blob
CREATE TABLE IF NOT EXISTS bookmarks_vec (
    id TEXT PRIMARY KEY REFERENCES bookmarks(id) ON DELETE CASCADE,
    embedding BLOB NOT NULL
);

-- Watermarks and refresh markers
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

const FTS_SQL: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS bookmarks_fts USING fts5(
    title,
    summary,
    keywords,
    notes,
    url,
    content='bookmarks',
    content_rowid='rowid'
);

CREATE TRIGGER IF NOT EXISTS bookmarks_ai AFTER INSERT ON bookmarks BEGIN
    INSERT INTO bookmarks_fts(rowid, title, summary, keywords, notes, url)
    VALUES (new.rowid, new.title, new.summary, new.keywords, new.notes, new.url);
END;

CREATE TRIGGER IF NOT EXISTS bookmarks_ad AFTER DELETE ON bookmarks BEGIN
    INSERT INTO bookmarks_fts(bookmarks_fts, rowid, title, summary, keywords, notes, url)
    VALUES ('delete', old.rowid, old.title, old.summary, old.keywords, old.notes, old.url);
END;

CREATE TRIGGER IF NOT EXISTS bookmarks_au AFTER UPDATE ON bookmarks BEGIN
    INSERT INTO bookmarks_fts(bookmarks_fts, rowid, title, summary, keywords, notes, url)
    VALUES ('delete', old.rowid, old.title, old.summary, old.keywords, old.notes, old.url);
    INSERT INTO bookmarks_fts(rowid, title, summary, keywords, notes, url)
    VALUES (new.rowid, new.title, new.summary, new.keywords, new.notes, new.url);
END;
"#;

pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    migrate_fts(conn)
}

/// Create the FTS index, or rebuild it when an older layout lacks the `url` column.
fn migrate_fts(conn: &Connection) -> Result<()> {
    let exists = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'bookmarks_fts'",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()?
        .is_some();

    if !exists {
        return create_fts(conn);
    }

    let has_url = conn
        .query_row(
            "SELECT name FROM pragma_table_info('bookmarks_fts') WHERE name = 'url'",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()?
        .is_some();

    if has_url {
        return Ok(());
    }

    log::info!("rebuilding full-text index with url column");
    conn.execute_batch(
        "DROP TRIGGER IF EXISTS bookmarks_ai;
         DROP TRIGGER IF EXISTS bookmarks_ad;
         DROP TRIGGER IF EXISTS bookmarks_au;
         DROP TABLE IF EXISTS bookmarks_fts;",
    )?;
    create_fts(conn)
}

fn create_fts(conn: &Connection) -> Result<()> {
    conn.execute_batch(FTS_SQL)?;
    conn.execute(
        "INSERT INTO bookmarks_fts(rowid, title, summary, keywords, notes, url)
         SELECT rowid, title, summary, keywords, notes, url FROM bookmarks",
        [],
    )?;
    Ok(())
}

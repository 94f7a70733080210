use rusqlite::params;

use super::{Result, Store, StoreError};
use crate::eid::Eid;
use crate::semantic::hybrid::RankedId;
use crate::semantic::index::{rank_by_similarity, to_ranked, VectorSearch};

/// Whether an SQLite error comes from an unparseable FTS5 query rather than the database.
pub fn is_query_syntax_error(err: &rusqlite::Error) -> bool {
    let message = match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => message.to_lowercase(),
        rusqlite::Error::SqlInputError { msg, .. } => msg.to_lowercase(),
        _ => return false,
    };

    message.contains("fts5")
        || message.contains("syntax error")
        || message.contains("no such column")
        || message.contains("unterminated string")
}

impl Store {
    /// Full-text search over title, summary, keywords, notes and url, best match first.
    ///
    /// A query the FTS engine cannot parse yields an empty list; any other
    /// failure is returned.
    pub fn lexical_search(&self, query: &str, limit: usize) -> Result<Vec<RankedId>> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Ok(vec![]);
        }

        let conn = self.conn()?;
        let run = || -> rusqlite::Result<Vec<Eid>> {
            let mut stmt = conn.prepare(
                "SELECT b.id, bm25(bookmarks_fts) AS score
                 FROM bookmarks_fts
                 JOIN bookmarks b ON bookmarks_fts.rowid = b.rowid
                 WHERE bookmarks_fts MATCH ?1 AND b.hidden = 0
                 ORDER BY score, b.id
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![query, super::to_limit(limit)], |row| {
                row.get::<_, String>(0)
            })?;
            rows.map(|row| row.map(Eid::from)).collect()
        };

        match run() {
            Ok(ids) => Ok(RankedId::from_ordered(ids)),
            Err(err) if is_query_syntax_error(&err) => {
                log::debug!("lexical query {query:?} rejected: {err}");
                Ok(vec![])
            }
            Err(err) => Err(StoreError::from(err)),
        }
    }
}

impl VectorSearch for Store {
    fn vector_search(&self, query: &[f32], limit: usize) -> Result<Vec<RankedId>> {
        if query.is_empty() || limit == 0 {
            return Ok(vec![]);
        }
        let embeddings = self.get_searchable_embeddings()?;
        Ok(to_ranked(rank_by_similarity(query, embeddings, limit)))
    }
}

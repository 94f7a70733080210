use std::collections::HashMap;

use rusqlite::{params, OptionalExtension};

use super::{Result, Store};
use crate::eid::Eid;

/// Serialize a vector as little-endian f32 bytes.
pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Inverse of [`encode_embedding`]. `None` when the blob is not a whole number of floats.
pub fn decode_embedding(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }
    Some(
        blob.chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

impl Store {
    /// Insert or replace the embedding for `id`.
    ///
    /// Nothing is written when the bookmark is gone; returns whether a row was stored.
    pub fn update_embedding(&self, id: &str, vector: &[f32]) -> Result<bool> {
        let conn = self.conn()?;
        let written = conn.execute(
            "INSERT OR REPLACE INTO bookmarks_vec (id, embedding)
             SELECT ?1, ?2 WHERE EXISTS (SELECT 1 FROM bookmarks WHERE id = ?1)",
            params![id, encode_embedding(vector)],
        )?;
        Ok(written > 0)
    }

    pub fn get_embedding(&self, id: &str) -> Result<Option<Vec<f32>>> {
        let conn = self.conn()?;
        let blob: Option<Vec<u8>> = conn
            .query_row(
                "SELECT embedding FROM bookmarks_vec WHERE id = ?1",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(blob.and_then(|b| decode_embedding(&b)))
    }

    /// Every stored embedding, hidden bookmarks included.
    pub fn get_all_embeddings(&self) -> Result<HashMap<Eid, Vec<f32>>> {
        self.read_embeddings("SELECT id, embedding FROM bookmarks_vec")
    }

    /// Embeddings of bookmarks that may appear in search results.
    ///
    /// This reads the whole table, O(N) in the number of bookmarks. Fine for
    /// a personal corpus of a few thousand rows, not beyond.
    pub fn get_searchable_embeddings(&self) -> Result<HashMap<Eid, Vec<f32>>> {
        self.read_embeddings(
            "SELECT v.id, v.embedding FROM bookmarks_vec v
             JOIN bookmarks b ON b.id = v.id
             WHERE b.hidden = 0",
        )
    }

    fn read_embeddings(&self, sql: &str) -> Result<HashMap<Eid, Vec<f32>>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;

        let mut embeddings = HashMap::new();
        for row in rows {
            let (id, blob) = row?;
            match decode_embedding(&blob) {
                Some(vector) if !vector.is_empty() => {
                    embeddings.insert(Eid::from(id), vector);
                }
                _ => log::warn!("skipping malformed embedding for {id}"),
            }
        }
        Ok(embeddings)
    }
}

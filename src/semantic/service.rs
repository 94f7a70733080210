//! Query surface over the store: lexical and vector retrieval fused with RRF.

use std::sync::Arc;

use crate::bookmarks::Bookmark;
use crate::enrich::providers::Embedder;
use crate::semantic::hybrid::{rrf_fusion, HybridResult};
use crate::semantic::index::VectorSearch;
use crate::store::{Store, StoreError};

/// Candidates pulled from each retriever before fusion.
pub const CANDIDATE_POOL: usize = 50;

pub struct SearchService {
    store: Arc<Store>,
    vectors: Arc<dyn VectorSearch>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl SearchService {
    pub fn new(store: Arc<Store>, embedder: Option<Arc<dyn Embedder>>) -> Self {
        Self {
            vectors: store.clone(),
            store,
            embedder,
        }
    }

    /// Swap the vector retriever, e.g. for an index-backed implementation.
    pub fn with_vector_search(mut self, vectors: Arc<dyn VectorSearch>) -> Self {
        self.vectors = vectors;
        self
    }

    /// Ordered bookmarks for `query`.
    ///
    /// An empty query is a plain listing, and so is a query with no visible
    /// match. Storage failures are returned, ranking failures are not.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<Bookmark>, StoreError> {
        let query = query.trim();
        if query.is_empty() {
            return self.store.list(&[], limit);
        }

        let fused = self.rank(query)?;
        let results = self.hydrate(&fused, limit)?;
        if results.is_empty() {
            log::debug!("no visible matches for {query:?}, falling back to listing");
            return self.store.list(&[], limit);
        }

        Ok(results)
    }

    /// Fused ranking for a non-empty query, without hydration.
    pub fn rank(&self, query: &str) -> Result<Vec<HybridResult>, StoreError> {
        let lexical = self.store.lexical_search(query, CANDIDATE_POOL)?;

        let vector = match self.query_embedding(query) {
            Some(embedding) => self.vectors.vector_search(&embedding, CANDIDATE_POOL)?,
            None => vec![],
        };

        log::debug!(
            "search {query:?}: {} lexical, {} vector candidate(s)",
            lexical.len(),
            vector.len()
        );
        Ok(rrf_fusion(&lexical, &vector))
    }

    fn query_embedding(&self, query: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        match embedder.embed(query) {
            Ok(embedding) if !embedding.is_empty() => Some(embedding),
            Ok(_) => None,
            Err(err) => {
                log::warn!("query embedding with {} failed: {err:#}", embedder.name());
                None
            }
        }
    }

    fn hydrate(&self, fused: &[HybridResult], limit: usize) -> Result<Vec<Bookmark>, StoreError> {
        let mut bookmarks = Vec::with_capacity(limit.min(fused.len()));
        for hit in fused {
            if bookmarks.len() >= limit {
                break;
            }
            match self.store.get(&hit.id) {
                Ok(bookmark) if !bookmark.hidden => bookmarks.push(bookmark),
                Ok(_) | Err(StoreError::NotFound) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(bookmarks)
    }
}

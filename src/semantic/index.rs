//! Brute-force cosine similarity search.
//!
//! Every stored embedding is compared against the query. That is linear in
//! the corpus size, which is fine for a personal bookmark collection. A real
//! vector index can replace it behind [`VectorSearch`] without touching the
//! ranker.

use std::cmp::Ordering;

use crate::eid::Eid;
use crate::semantic::hybrid::RankedId;
use crate::store::StoreError;

/// Source of vector-similarity rankings.
pub trait VectorSearch: Send + Sync {
    /// Ids ordered by similarity to `query`, best first, ranks starting at 1.
    fn vector_search(&self, query: &[f32], limit: usize) -> Result<Vec<RankedId>, StoreError>;
}

/// Similarity hit before rank assignment.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub id: Eid,
    /// Cosine similarity score (-1.0 to 1.0)
    pub score: f32,
}

/// Score every candidate against `query` and keep the best `limit`.
///
/// Candidates whose dimensions differ from the query are skipped rather than
/// compared, as are zero-norm vectors. Equal scores order by ascending id.
pub fn rank_by_similarity<I>(query: &[f32], candidates: I, limit: usize) -> Vec<SearchResult>
where
    I: IntoIterator<Item = (Eid, Vec<f32>)>,
{
    let query_norm = l2_norm(query);
    if query.is_empty() || query_norm < f32::EPSILON {
        return vec![];
    }

    let mut skipped = 0usize;
    let mut results: Vec<SearchResult> = candidates
        .into_iter()
        .filter_map(|(id, embedding)| {
            if embedding.len() != query.len() {
                skipped += 1;
                return None;
            }
            cosine_similarity(query, &embedding, query_norm).map(|score| SearchResult { id, score })
        })
        .collect();

    if skipped > 0 {
        log::debug!(
            "skipped {skipped} embedding(s) whose dimensions differ from the query ({})",
            query.len()
        );
    }

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    results.truncate(limit);
    results
}

/// Assign 1-based ranks to similarity hits.
pub fn to_ranked(results: Vec<SearchResult>) -> Vec<RankedId> {
    RankedId::from_ordered(results.into_iter().map(|r| r.id))
}

/// Compute L2 norm of a vector.
fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity, with the query norm precomputed. `None` for a zero-norm target.
fn cosine_similarity(query: &[f32], target: &[f32], query_norm: f32) -> Option<f32> {
    let target_norm = l2_norm(target);
    if target_norm < f32::EPSILON {
        return None;
    }

    let dot_product: f32 = query.iter().zip(target.iter()).map(|(a, b)| a * b).sum();
    Some(dot_product / (query_norm * target_norm))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(entries: &[(&str, Vec<f32>)]) -> Vec<(Eid, Vec<f32>)> {
        entries
            .iter()
            .map(|(id, v)| (Eid::from(*id), v.clone()))
            .collect()
    }

    #[test]
    fn test_search_basic() {
        let entries = candidates(&[("a", vec![1.0, 0.0, 0.0]), ("b", vec![0.0, 1.0, 0.0])]);

        let results = rank_by_similarity(&[1.0, 0.1, 0.0], entries, 10);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id.as_str(), "a");
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_search_with_limit() {
        let entries = (0..10)
            .map(|i| (Eid::from(format!("{i}")), vec![1.0, i as f32 * 0.1, 0.0]))
            .collect::<Vec<_>>();

        let results = rank_by_similarity(&[1.0, 0.0, 0.0], entries, 3);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].id.as_str(), "0");
    }

    #[test]
    fn test_mismatched_dimensions_are_skipped() {
        let entries = candidates(&[
            ("short", vec![1.0, 0.0]),
            ("ok", vec![0.0, 1.0, 0.0]),
            ("long", vec![1.0, 0.0, 0.0, 0.0]),
        ]);

        let results = rank_by_similarity(&[1.0, 0.0, 0.0], entries, 10);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id.as_str(), "ok");
    }

    #[test]
    fn test_zero_norm_vectors_are_skipped() {
        let entries = candidates(&[("zero", vec![0.0, 0.0, 0.0]), ("x", vec![1.0, 0.0, 0.0])]);

        assert_eq!(rank_by_similarity(&[1.0, 0.0, 0.0], entries.clone(), 10).len(), 1);
        assert!(rank_by_similarity(&[0.0, 0.0, 0.0], entries, 10).is_empty());
    }

    #[test]
    fn test_ranks_start_at_one() {
        let entries = candidates(&[("a", vec![1.0, 0.0]), ("b", vec![0.5, 0.5])]);

        let ranked = to_ranked(rank_by_similarity(&[1.0, 0.0], entries, 10));

        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].rank, 2);
        assert_eq!(ranked[1].id.as_str(), "b");
    }
}

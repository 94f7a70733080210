//! Hybrid ranking combining lexical and vector results.
//!
//! Uses Reciprocal Rank Fusion (RRF): each list an id appears in contributes
//! `1 / (k + rank)` to its score. Lists are weighted equally, so an id found
//! by both searches beats one found by only a single search at a similar rank.
//!
//! The fusion is pure. Falling back to a plain listing when both inputs are
//! empty is the caller's job.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::eid::Eid;

/// RRF constant (standard value from literature).
/// Higher k reduces the impact of high-ranking items.
pub const RRF_K: f64 = 60.0;

/// An id with its 1-based position in a ranked list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedId {
    pub id: Eid,
    pub rank: usize,
}

impl RankedId {
    /// Assign 1-based ranks in iteration order.
    pub fn from_ordered<I>(ids: I) -> Vec<RankedId>
    where
        I: IntoIterator<Item = Eid>,
    {
        ids.into_iter()
            .enumerate()
            .map(|(i, id)| RankedId { id, rank: i + 1 })
            .collect()
    }
}

/// Result from hybrid search with combined score.
#[derive(Debug, Clone)]
pub struct HybridResult {
    pub id: Eid,
    /// RRF fusion score
    pub score: f64,
    /// Rank from lexical search (None if not in lexical results)
    pub lexical_rank: Option<usize>,
    /// Rank from vector search (None if not in vector results)
    pub vector_rank: Option<usize>,
}

/// Fuse lexical and vector rankings.
///
///   score(d) = 1/(k + rank_lexical) + 1/(k + rank_vector)
///
/// Absence from a list contributes nothing. Output is sorted by score
/// descending; equal scores are ordered by ascending id.
pub fn rrf_fusion(lexical: &[RankedId], vector: &[RankedId]) -> Vec<HybridResult> {
    let mut scores: HashMap<&Eid, HybridResult> = HashMap::new();

    for entry in lexical {
        let rrf_score = 1.0 / (RRF_K + entry.rank as f64);
        scores
            .entry(&entry.id)
            .and_modify(|result| {
                result.score += rrf_score;
                result.lexical_rank.get_or_insert(entry.rank);
            })
            .or_insert_with(|| HybridResult {
                id: entry.id.clone(),
                score: rrf_score,
                lexical_rank: Some(entry.rank),
                vector_rank: None,
            });
    }

    for entry in vector {
        let rrf_score = 1.0 / (RRF_K + entry.rank as f64);
        scores
            .entry(&entry.id)
            .and_modify(|result| {
                result.score += rrf_score;
                result.vector_rank.get_or_insert(entry.rank);
            })
            .or_insert_with(|| HybridResult {
                id: entry.id.clone(),
                score: rrf_score,
                lexical_rank: None,
                vector_rank: Some(entry.rank),
            });
    }

    let mut results: Vec<HybridResult> = scores.into_values().collect();
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });

    results
}

//! # Flat Index Implementation
//!
//! Exact nearest-neighbor search over a linear array of vectors using
//! inner-product similarity.
//!
//! ## Performance Characteristics
//!
//! - **Search Complexity**: O(n) - must score every slot
//! - **Rebuild Complexity**: O(n) - full copy of the vector store
//! - **Accuracy**: 100% - exact search results
//!
//! The index holds every slot of the vector store, including zeroed
//! (deleted) ones, so its item count always equals the store's slot count.
//! Resolution of slot positions back to caller IDs happens in the store,
//! which filters out dead slots and sentinel positions.

use crate::errors::{StoreError, StoreResult};
use crate::{inner_product, IndexHit, NO_MATCH};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Flat index for exact inner-product search
///
/// Stores a copy of the vector store's slots and scores a query against
/// all of them. Slower than approximate methods but guarantees exact
/// results and rebuilds cheaply at the expected store sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    dim: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            vectors: Vec::new(),
        }
    }

    /// Discard all index state and rebuild over the given slots.
    ///
    /// This is the only update path: mutations to the vector store are
    /// followed by a full rebuild, never by an in-place index edit.
    pub fn rebuild(&mut self, vectors: &[Vec<f32>]) {
        self.vectors = vectors.to_vec();
    }

    /// Return up to `k` slot positions sorted by descending inner-product
    /// score, padded with `NO_MATCH` sentinel hits when fewer than `k`
    /// slots exist.
    ///
    /// Fails with `EmptyIndex` when the index holds no slots at all and
    /// with `DimensionMismatch` when the query has the wrong length.
    pub fn query(&self, query: &[f32], k: usize) -> StoreResult<Vec<IndexHit>> {
        if self.vectors.is_empty() {
            return Err(StoreError::EmptyIndex);
        }
        if query.len() != self.dim {
            return Err(StoreError::DimensionMismatch {
                expected: self.dim,
                actual: query.len(),
            });
        }

        let mut hits: Vec<IndexHit> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(position, slot)| IndexHit {
                internal_id: position as i64,
                score: inner_product(slot, query),
            })
            .collect();

        // Descending score, ascending position on ties, so results are
        // deterministic across rebuilds.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.internal_id.cmp(&b.internal_id))
        });
        hits.truncate(k);

        while hits.len() < k {
            hits.push(IndexHit {
                internal_id: NO_MATCH,
                score: f32::NEG_INFINITY,
            });
        }

        Ok(hits)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basis_vectors() -> Vec<Vec<f32>> {
        vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
        ]
    }

    #[test]
    fn test_query_orders_by_inner_product() {
        let mut index = FlatIndex::new(3);
        index.rebuild(&basis_vectors());

        let results = index.query(&[1.0, 0.0, 0.0], 2).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].internal_id, 0);
        assert!((results[0].score - 1.0).abs() < 1e-6);
        for i in 1..results.len() {
            assert!(results[i - 1].score >= results[i].score);
        }
    }

    #[test]
    fn test_query_pads_with_sentinel() {
        let mut index = FlatIndex::new(3);
        index.rebuild(&basis_vectors());

        let results = index.query(&[1.0, 0.0, 0.0], 5).unwrap();

        assert_eq!(results.len(), 5);
        assert_eq!(results[3].internal_id, NO_MATCH);
        assert_eq!(results[4].internal_id, NO_MATCH);
    }

    #[test]
    fn test_query_empty_index() {
        let index = FlatIndex::new(3);
        let result = index.query(&[1.0, 0.0, 0.0], 1);
        assert!(matches!(result.unwrap_err(), StoreError::EmptyIndex));
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let mut index = FlatIndex::new(3);
        index.rebuild(&basis_vectors());

        let result = index.query(&[1.0, 0.0], 1);
        assert!(matches!(
            result.unwrap_err(),
            StoreError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_rebuild_replaces_prior_state() {
        let mut index = FlatIndex::new(2);
        index.rebuild(&[vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_eq!(index.len(), 2);

        index.rebuild(&[vec![0.5, 0.5]]);
        assert_eq!(index.len(), 1);

        let results = index.query(&[1.0, 0.0], 1).unwrap();
        assert_eq!(results[0].internal_id, 0);
        assert!((results[0].score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_zeroed_slot_scores_zero() {
        let mut index = FlatIndex::new(2);
        index.rebuild(&[vec![0.0, 0.0], vec![0.9, 0.1]]);

        let results = index.query(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results[0].internal_id, 1);
        assert_eq!(results[1].internal_id, 0);
        assert!((results[1].score - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_serialization_round_trip() {
        let mut index = FlatIndex::new(3);
        index.rebuild(&basis_vectors());

        let bytes = bincode::serialize(&index).expect("Serialization should work");
        let restored: FlatIndex = bincode::deserialize(&bytes).expect("Deserialization should work");

        assert_eq!(restored.len(), 3);
        assert_eq!(restored.dimension(), 3);

        let results = restored.query(&[0.0, 1.0, 0.0], 1).unwrap();
        assert_eq!(results[0].internal_id, 1);
    }
}

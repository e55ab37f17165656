//! Exhaustive cosine search over stored vectors.

use super::IndexedChunk;

/// Search structure for a [`VectorStore`](super::VectorStore).
///
/// Holds one precomputed L2 norm per entry, in entry order. Removal is not
/// supported; a store that loses entries builds a fresh `FlatIndex`.
#[derive(Debug, Clone, Default)]
pub(crate) struct FlatIndex {
    norms: Vec<f32>,
}

impl FlatIndex {
    pub(crate) fn build(entries: &[IndexedChunk]) -> Self {
        Self {
            norms: entries.iter().map(|e| l2_norm(&e.vector)).collect(),
        }
    }

    pub(crate) fn push(&mut self, vector: &[f32]) {
        self.norms.push(l2_norm(vector));
    }

    pub(crate) fn len(&self) -> usize {
        self.norms.len()
    }

    /// Top `k` `(entry position, score)` pairs, best first.
    ///
    /// Equal scores keep insertion order.
    pub(crate) fn search(&self, entries: &[IndexedChunk], query: &[f32], k: usize) -> Vec<(usize, f32)> {
        if k == 0 {
            return Vec::new();
        }

        let query_norm = l2_norm(query);
        let mut scored: Vec<(usize, f32)> = entries
            .iter()
            .zip(&self.norms)
            .enumerate()
            .map(|(position, (entry, &norm))| {
                (position, cosine(&entry.vector, norm, query, query_norm))
            })
            .collect();

        // sort_by is stable
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        scored
    }
}

fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine(a: &[f32], norm_a: f32, b: &[f32], norm_b: f32) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, ChunkMetadata};

    fn entry(vector: Vec<f32>) -> IndexedChunk {
        IndexedChunk {
            vector,
            chunk: Chunk::new("text", ChunkMetadata::new("a.pdf", "t", 0)),
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let a = [1.0, 0.0];
        assert!((cosine(&a, 1.0, &[2.0, 0.0], 2.0) - 1.0).abs() < 1e-6);
        assert!(cosine(&a, 1.0, &[0.0, 3.0], 3.0).abs() < 1e-6);
        assert_eq!(cosine(&a, 1.0, &[0.0, 0.0], 0.0), 0.0);
    }

    #[test]
    fn test_search_orders_by_score() {
        let entries = vec![
            entry(vec![0.0, 1.0]),
            entry(vec![1.0, 0.0]),
            entry(vec![1.0, 1.0]),
        ];
        let index = FlatIndex::build(&entries);

        let hits = index.search(&entries, &[1.0, 0.0], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, 1);
        assert_eq!(hits[1].0, 2);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let entries = vec![
            entry(vec![1.0, 0.0]),
            entry(vec![0.0, 1.0]),
            entry(vec![2.0, 0.0]),
            entry(vec![3.0, 0.0]),
        ];
        let index = FlatIndex::build(&entries);

        let hits = index.search(&entries, &[1.0, 0.0], 3);
        let positions: Vec<usize> = hits.iter().map(|h| h.0).collect();
        assert_eq!(positions, vec![0, 2, 3]);
    }

    #[test]
    fn test_push_tracks_len() {
        let mut index = FlatIndex::default();
        index.push(&[3.0, 4.0]);
        assert_eq!(index.len(), 1);
        assert!((index.norms[0] - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_k() {
        let entries = vec![entry(vec![1.0])];
        let index = FlatIndex::build(&entries);
        assert!(index.search(&entries, &[1.0], 0).is_empty());
    }
}

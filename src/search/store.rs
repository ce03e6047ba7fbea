use crate::error::{GatewayError, Result};
use ndarray::{Array2, ArrayView1};

/// One nearest-neighbour slot. `index` is `None` when the store holds fewer
/// vectors than were requested.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: Option<usize>,
    /// Squared Euclidean distance to the query.
    pub distance: f32,
}

/// Exact (brute-force) vector store using squared L2 distance.
///
/// Row `i` of `vectors` corresponds to catalog position `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2Index {
    vectors: Array2<f32>,
}

impl FlatL2Index {
    pub fn new(vectors: Array2<f32>) -> Self {
        Self { vectors }
    }

    pub fn len(&self) -> usize {
        self.vectors.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.nrows() == 0
    }

    pub fn dim(&self) -> usize {
        self.vectors.ncols()
    }

    pub fn vectors(&self) -> &Array2<f32> {
        &self.vectors
    }

    /// Return up to `k` slots ordered by ascending distance. When `k` exceeds
    /// the number of stored vectors, a single trailing slot with `index: None`
    /// and an infinite distance marks the shortfall.
    pub fn search(&self, query: ArrayView1<'_, f32>, k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dim() {
            return Err(GatewayError::Index(format!(
                "Query dimension {} does not match index dimension {}",
                query.len(),
                self.dim()
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .outer_iter()
            .enumerate()
            .map(|(idx, row)| {
                let distance = row
                    .iter()
                    .zip(query.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f32>();
                (idx, distance)
            })
            .collect();

        // Stable sort keeps insertion order for equal distances
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut neighbors: Vec<Neighbor> = scored
            .into_iter()
            .take(k)
            .map(|(idx, distance)| Neighbor {
                index: Some(idx),
                distance,
            })
            .collect();

        neighbors.resize(
            k.min(self.len().saturating_add(1)),
            Neighbor {
                index: None,
                distance: f32::INFINITY,
            },
        );

        Ok(neighbors)
    }
}

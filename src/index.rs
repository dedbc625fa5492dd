//! Exact nearest-neighbour index over a fixed set of vectors.
//!
//! [`FlatIndex`] stores vectors contiguously and answers k-NN queries by
//! scanning all of them with squared Euclidean distance. The corpus is tiny
//! and immutable, so an exhaustive scan is both exact and fast enough.
//!
//! # Ordering
//!
//! Hits are sorted by ascending distance; equal distances are ordered by
//! ascending insertion index, so results are fully deterministic.

use anyhow::{bail, Result};

/// A single k-NN result: position in the index and its squared L2 distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub index: usize,
    pub distance: f32,
}

#[derive(Debug, Clone)]
pub struct FlatIndex {
    dims: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Builds an index from `vectors`, all of which must have `dims` components.
    pub fn build(dims: usize, vectors: &[Vec<f32>]) -> Result<Self> {
        if dims == 0 {
            bail!("index dimension must be > 0");
        }

        let mut data = Vec::with_capacity(dims * vectors.len());
        for (i, v) in vectors.iter().enumerate() {
            if v.len() != dims {
                bail!(
                    "vector {} has dimension {}, expected {}",
                    i,
                    v.len(),
                    dims
                );
            }
            data.extend_from_slice(v);
        }

        Ok(Self { dims, data })
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dims
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the `k` nearest vectors to `query`.
    ///
    /// `k` larger than the index is capped at the index size.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Hit>> {
        if query.len() != self.dims {
            bail!(
                "query has dimension {}, index expects {}",
                query.len(),
                self.dims
            );
        }

        let mut hits: Vec<Hit> = self
            .data
            .chunks_exact(self.dims)
            .enumerate()
            .map(|(index, v)| Hit {
                index,
                distance: squared_l2(query, v),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.index.cmp(&b.index))
        });
        hits.truncate(k.min(self.len()));
        Ok(hits)
    }
}

/// Squared Euclidean distance. Callers guarantee equal lengths.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

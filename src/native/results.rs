//! Search result containers returned by the native library

use crate::{Error, Result};

/// k-NN results for a batch of queries, row-major `num_queries x k`
#[derive(Debug, Clone, PartialEq)]
pub struct KnnResults {
    num_queries: usize,
    k: usize,
    ids: Vec<u32>,
    distances: Vec<f32>,
}

impl KnnResults {
    /// Id used to pad rows that found fewer than `k` neighbors
    pub const MISSING_ID: u32 = u32::MAX;

    /// Wrap flat id and distance arrays
    pub fn new(num_queries: usize, k: usize, ids: Vec<u32>, distances: Vec<f32>) -> Result<Self> {
        if ids.len() != num_queries * k || distances.len() != num_queries * k {
            return Err(Error::DimensionMismatch {
                expected: num_queries * k,
                actual: ids.len().max(distances.len()),
            }
            .into());
        }
        Ok(Self {
            num_queries,
            k,
            ids,
            distances,
        })
    }

    /// Number of queries
    pub fn num_queries(&self) -> usize {
        self.num_queries
    }

    /// Neighbors per query
    pub fn k(&self) -> usize {
        self.k
    }

    /// Flat neighbor ids
    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    /// Flat distances
    pub fn distances(&self) -> &[f32] {
        &self.distances
    }

    /// Neighbor ids of query `q`, best first
    pub fn neighbors(&self, q: usize) -> &[u32] {
        &self.ids[q * self.k..(q + 1) * self.k]
    }

    /// Distances of query `q`, best first
    pub fn query_distances(&self, q: usize) -> &[f32] {
        &self.distances[q * self.k..(q + 1) * self.k]
    }

    /// Neighbor ids as one row per query
    pub fn to_rows(&self) -> Vec<Vec<u32>> {
        (0..self.num_queries).map(|q| self.neighbors(q).to_vec()).collect()
    }

    /// Keep only the first `n` queries
    pub fn truncate(&mut self, n: usize) {
        if n < self.num_queries {
            self.num_queries = n;
            self.ids.truncate(n * self.k);
            self.distances.truncate(n * self.k);
        }
    }
}

/// Range search results; hits of query `q` live at `lims[q]..lims[q + 1]`
#[derive(Debug, Clone, PartialEq)]
pub struct RangeResults {
    lims: Vec<u64>,
    ids: Vec<u32>,
    distances: Vec<f32>,
}

impl RangeResults {
    /// Wrap offset, id and distance arrays
    pub fn new(lims: Vec<u64>, ids: Vec<u32>, distances: Vec<f32>) -> Result<Self> {
        if lims.first() != Some(&0) || lims.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::InvalidParameter(
                "range limits must start at 0 and be non-decreasing".to_string(),
            )
            .into());
        }
        let total = *lims.last().unwrap_or(&0) as usize;
        if ids.len() != total || distances.len() != total {
            return Err(Error::DimensionMismatch {
                expected: total,
                actual: ids.len().max(distances.len()),
            }
            .into());
        }
        Ok(Self { lims, ids, distances })
    }

    /// Build from per-query hit lists
    pub fn from_hits(hits: Vec<Vec<(u32, f32)>>) -> Self {
        let total: usize = hits.iter().map(Vec::len).sum();
        let mut lims = Vec::with_capacity(hits.len() + 1);
        let mut ids = Vec::with_capacity(total);
        let mut distances = Vec::with_capacity(total);
        lims.push(0);
        for query_hits in hits {
            for (id, dist) in query_hits {
                ids.push(id);
                distances.push(dist);
            }
            lims.push(ids.len() as u64);
        }
        Self { lims, ids, distances }
    }

    /// Number of queries
    pub fn num_queries(&self) -> usize {
        self.lims.len().saturating_sub(1)
    }

    /// Offsets into `ids` / `distances`, `num_queries + 1` entries
    pub fn lims(&self) -> &[u64] {
        &self.lims
    }

    /// Flat hit ids
    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    /// Flat hit distances
    pub fn distances(&self) -> &[f32] {
        &self.distances
    }

    /// Hit ids of query `q`
    pub fn query_ids(&self, q: usize) -> &[u32] {
        &self.ids[self.lims[q] as usize..self.lims[q + 1] as usize]
    }

    /// Hit distances of query `q`
    pub fn query_distances(&self, q: usize) -> &[f32] {
        &self.distances[self.lims[q] as usize..self.lims[q + 1] as usize]
    }

    /// Keep only the first `n` queries
    pub fn truncate(&mut self, n: usize) {
        if n < self.num_queries() {
            self.lims.truncate(n + 1);
            let total = self.lims[n] as usize;
            self.ids.truncate(total);
            self.distances.truncate(total);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_knn_rows() {
        let r = KnnResults::new(2, 3, vec![1, 2, 3, 4, 5, 6], vec![0.0; 6]).unwrap();
        assert_eq!(r.neighbors(1), &[4, 5, 6]);
        assert_eq!(r.to_rows(), vec![vec![1, 2, 3], vec![4, 5, 6]]);
        assert!(KnnResults::new(2, 3, vec![1, 2], vec![0.0; 6]).is_err());
    }

    #[test]
    fn test_truncate_keeps_leading_queries() {
        let mut knn = KnnResults::new(3, 2, vec![1, 2, 3, 4, 5, 6], vec![0.0; 6]).unwrap();
        knn.truncate(2);
        assert_eq!(knn.num_queries(), 2);
        assert_eq!(knn.ids(), &[1, 2, 3, 4]);
        knn.truncate(5);
        assert_eq!(knn.num_queries(), 2);

        let mut range = RangeResults::from_hits(vec![vec![(1, 0.0)], vec![], vec![(2, 0.0), (3, 0.0)]]);
        range.truncate(2);
        assert_eq!(range.num_queries(), 2);
        assert_eq!(range.ids(), &[1]);
        assert!(range.query_ids(1).is_empty());
    }

    #[test]
    fn test_range_from_hits() {
        let r = RangeResults::from_hits(vec![vec![(7, 0.1)], vec![], vec![(1, 0.2), (2, 0.3)]]);
        assert_eq!(r.lims(), &[0, 1, 1, 3]);
        assert_eq!(r.num_queries(), 3);
        assert_eq!(r.query_ids(2), &[1, 2]);
        assert_eq!(r.query_distances(0), &[0.1]);
    }

    #[test]
    fn test_range_validation() {
        assert!(RangeResults::new(vec![], vec![], vec![]).is_err());
        assert!(RangeResults::new(vec![0, 2, 1], vec![1], vec![0.0]).is_err());
        assert!(RangeResults::new(vec![0, 2], vec![1], vec![0.0]).is_err());
        assert!(RangeResults::new(vec![0], vec![], vec![]).is_ok());
    }
}

//! Recall against ground truth
//!
//! Used by the command-line search to score answers; the benchmark harness
//! does its own scoring.

use crate::distance::Metric;
use crate::native::{KnnResults, RangeResults};
use crate::{Error, Result};
use std::collections::HashSet;

fn check_knn_shapes(gt: &KnnResults, answers: &KnnResults) -> Result<()> {
    if gt.num_queries() != answers.num_queries() || gt.k() != answers.k() {
        return Err(Error::InvalidParameter(format!(
            "ground truth is {} x {}, answers are {} x {}",
            gt.num_queries(),
            gt.k(),
            answers.num_queries(),
            answers.k()
        ))
        .into());
    }
    Ok(())
}

/// Fraction of answers at least as close as the k-th ground-truth neighbor.
///
/// Ties at the k-th distance count as hits, so equidistant neighbors with
/// different ids are not penalized.
pub fn knn_recall(gt: &KnnResults, answers: &KnnResults, metric: Metric) -> Result<f64> {
    check_knn_shapes(gt, answers)?;
    let (nq, k) = (gt.num_queries(), gt.k());
    if nq == 0 || k == 0 {
        return Ok(0.0);
    }

    let mut hits = 0usize;
    for q in 0..nq {
        let bound = gt.query_distances(q)[k - 1];
        hits += answers
            .query_distances(q)
            .iter()
            .filter(|&&d| metric.within(d, bound))
            .count();
    }
    Ok(hits as f64 / (nq * k) as f64)
}

/// Fraction of ground-truth ids found among the answers
pub fn knn_id_recall(gt: &KnnResults, answers: &KnnResults) -> Result<f64> {
    check_knn_shapes(gt, answers)?;
    let (nq, k) = (gt.num_queries(), gt.k());
    if nq == 0 || k == 0 {
        return Ok(0.0);
    }

    let mut hits = 0usize;
    for q in 0..nq {
        let truth: HashSet<u32> = gt.neighbors(q).iter().copied().collect();
        hits += answers
            .neighbors(q)
            .iter()
            .filter(|&&id| id != KnnResults::MISSING_ID && truth.contains(&id))
            .count();
    }
    Ok(hits as f64 / (nq * k) as f64)
}

/// Range search score: `(1 + precision) * recall / 2` over all queries
pub fn range_recall(gt: &RangeResults, answers: &RangeResults) -> Result<f64> {
    if gt.num_queries() != answers.num_queries() {
        return Err(Error::InvalidParameter(format!(
            "ground truth has {} queries, answers have {}",
            gt.num_queries(),
            answers.num_queries()
        ))
        .into());
    }

    let mut intersection = 0usize;
    for q in 0..gt.num_queries() {
        let truth: HashSet<u32> = gt.query_ids(q).iter().copied().collect();
        let found: HashSet<u32> = answers.query_ids(q).iter().copied().collect();
        intersection += truth.intersection(&found).count();
    }

    let ngt = gt.ids().len();
    let nres = answers.ids().len();
    let recall = if ngt == 0 { 0.0 } else { intersection as f64 / ngt as f64 };
    let precision = if nres == 0 { 0.0 } else { intersection as f64 / nres as f64 };
    Ok((1.0 + precision) * recall / 2.0)
}

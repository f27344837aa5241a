//! Cosine similarity and top-K ranking over embedding matrices.

use std::cmp::Ordering;

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::Serialize;

use crate::error::{AppError, Result};

/// Guard added to vector norms so a zero vector normalizes to zero instead of NaN.
pub const NORM_EPSILON: f32 = 1e-10;

/// A catalog row index paired with its similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredIndex {
    /// Row of the catalog matrix
    pub index: usize,
    /// Cosine similarity in `[-1, 1]`
    pub score: f32,
}

/// Scale a vector to unit length.
pub fn l2_normalize(v: ArrayView1<'_, f32>) -> Array1<f32> {
    let norm = v.dot(&v).sqrt();
    v.mapv(|x| x / (norm + NORM_EPSILON))
}

/// Scale every row of a matrix to unit length.
pub fn normalize_rows(mut matrix: Array2<f32>) -> Array2<f32> {
    for mut row in matrix.axis_iter_mut(Axis(0)) {
        let norm = row.dot(&row).sqrt();
        row.mapv_inplace(|x| x / (norm + NORM_EPSILON));
    }
    matrix
}

/// Cosine similarity of `query` against every row of `matrix`.
///
/// Both sides are normalized first, so raw (un-normalized) inputs are fine.
pub fn cosine_similarity(query: ArrayView1<'_, f32>, matrix: &Array2<f32>) -> Result<Array1<f32>> {
    let normalized = normalize_rows(matrix.clone());
    scores_against_normalized(query, &normalized)
}

fn scores_against_normalized(
    query: ArrayView1<'_, f32>,
    normalized: &Array2<f32>,
) -> Result<Array1<f32>> {
    if normalized.nrows() == 0 {
        return Ok(Array1::zeros(0));
    }
    if query.len() != normalized.ncols() {
        return Err(AppError::InvalidInput(format!(
            "query has dimension {} but catalog embeddings have dimension {}",
            query.len(),
            normalized.ncols()
        )));
    }
    let q = l2_normalize(query);
    Ok(normalized.dot(&q))
}

/// Indices of the `k` highest scores, best first.
///
/// `k` is clamped to the number of scores. Equal scores keep their original
/// order, and NaN scores rank below everything else.
pub fn top_k(scores: ArrayView1<'_, f32>, k: usize) -> Vec<ScoredIndex> {
    let k = k.min(scores.len());
    if k == 0 {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| descending(scores[a], scores[b]));

    order
        .into_iter()
        .take(k)
        .map(|index| ScoredIndex {
            index,
            score: scores[index],
        })
        .collect()
}

fn descending(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Ranks queries against a fixed matrix whose rows are normalized once up front.
#[derive(Debug, Clone)]
pub struct Ranker {
    matrix: Array2<f32>,
}

impl Ranker {
    /// Build a ranker over `matrix` (one embedding per row).
    pub fn new(matrix: Array2<f32>) -> Self {
        Self {
            matrix: normalize_rows(matrix),
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.matrix.nrows()
    }

    /// Whether the ranker has no rows.
    pub fn is_empty(&self) -> bool {
        self.matrix.nrows() == 0
    }

    /// Embedding dimension, or `None` for an empty matrix.
    pub fn dimension(&self) -> Option<usize> {
        (!self.is_empty()).then(|| self.matrix.ncols())
    }

    /// The `k` rows most similar to `query`, best first.
    pub fn rank(&self, query: ArrayView1<'_, f32>, k: usize) -> Result<Vec<ScoredIndex>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let scores = scores_against_normalized(query, &self.matrix)?;
        Ok(top_k(scores.view(), k))
    }
}

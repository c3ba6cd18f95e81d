//! Representational similarity analysis.
//!
//! Compares the model's pairwise similarity structure against human pairwise
//! judgments. The model structure is computed under two kernels (cosine and
//! row-wise Pearson correlation), both structures are flattened to their
//! upper-triangle pair values, and the flattened sequences are compared with
//! Spearman rank correlation and Pearson linear correlation.

use std::cmp::Ordering;
use std::path::Path;

use anyhow::{Context, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::{EvalError, InvalidInput};
use crate::features::FeatureMatrix;

/// Orientation of a human judgment matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JudgmentKind {
    /// Larger values mean more similar.
    Similarity,
    /// Larger values mean less similar (an RDM); negated when flattened.
    Dissimilarity,
}

/// Human pairwise similarity judgments over the evaluated item set.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityJudgments {
    matrix: Array2<f64>,
    kind: JudgmentKind,
}

impl SimilarityJudgments {
    /// Wrap a square judgment matrix.
    pub fn new(matrix: Array2<f64>, kind: JudgmentKind) -> Result<Self, EvalError> {
        if matrix.nrows() != matrix.ncols() {
            return Err(InvalidInput::NonSquareJudgments {
                rows: matrix.nrows(),
                cols: matrix.ncols(),
            }
            .into());
        }
        Ok(Self { matrix, kind })
    }

    /// Load a judgment matrix from a JSON nested list.
    pub fn load(path: impl AsRef<Path>, kind: JudgmentKind) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading judgments from {}", path.display()))?;
        let rows: Vec<Vec<f64>> = serde_json::from_str(&content)
            .with_context(|| format!("parsing judgments from {}", path.display()))?;
        let n = rows.len();
        let mut flat = Vec::with_capacity(n * n);
        for (i, row) in rows.into_iter().enumerate() {
            anyhow::ensure!(
                row.len() == n,
                "judgment matrix row {i} has {} entries, expected {n}",
                row.len()
            );
            flat.extend(row);
        }
        let matrix = Array2::from_shape_vec((n, n), flat)?;
        Ok(Self::new(matrix, kind)?)
    }

    /// Number of items the judgments cover.
    pub fn n_items(&self) -> usize {
        self.matrix.nrows()
    }

    /// Upper-triangle pair values, oriented so larger = more similar.
    pub fn flattened(&self) -> Vec<f64> {
        let values = upper_triangle(&self.matrix);
        match self.kind {
            JudgmentKind::Similarity => values,
            JudgmentKind::Dissimilarity => values.into_iter().map(|v| -v).collect(),
        }
    }
}

/// RSA correlation statistics for one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RsaStats {
    pub spearman_rho_cosine: f64,
    pub spearman_rho_correlation: f64,
    pub pearson_corr_cosine: f64,
    pub pearson_corr_correlation: f64,
}

/// Compare a model's similarity structure against human judgments.
pub fn rsa(
    features: &FeatureMatrix,
    judgments: &SimilarityJudgments,
) -> Result<RsaStats, EvalError> {
    if features.n_items() != judgments.n_items() {
        return Err(InvalidInput::ItemCountMismatch {
            n_features: features.n_items(),
            n_judgments: judgments.n_items(),
        }
        .into());
    }

    let human = judgments.flattened();
    let model_cosine = upper_triangle(&cosine_kernel(features)?);
    let model_correlation = upper_triangle(&correlation_kernel(features)?);

    Ok(RsaStats {
        spearman_rho_cosine: spearman(&model_cosine, &human)?,
        spearman_rho_correlation: spearman(&model_correlation, &human)?,
        pearson_corr_cosine: pearson(&model_cosine, &human)?,
        pearson_corr_correlation: pearson(&model_correlation, &human)?,
    })
}

/// N x N cosine similarity structure of a feature matrix.
pub fn cosine_kernel(features: &FeatureMatrix) -> Result<Array2<f64>, EvalError> {
    let n = features.n_items();
    let norms: Vec<f64> = (0..n)
        .map(|i| {
            let row = features.row(i);
            row.dot(&row).sqrt()
        })
        .collect();
    if let Some(item) = norms.iter().position(|&x| x <= 1e-12) {
        return Err(EvalError::NumericalDegenerate {
            context: "cosine kernel",
            detail: format!("item {item} has a zero feature vector"),
        });
    }

    let mut rsm = Array2::zeros((n, n));
    for i in 0..n {
        rsm[[i, i]] = 1.0;
        for j in i + 1..n {
            let sim = features.row(i).dot(&features.row(j)) / (norms[i] * norms[j]);
            rsm[[i, j]] = sim;
            rsm[[j, i]] = sim;
        }
    }
    Ok(rsm)
}

/// N x N Pearson-correlation similarity structure of a feature matrix.
pub fn correlation_kernel(features: &FeatureMatrix) -> Result<Array2<f64>, EvalError> {
    let n = features.n_items();
    let mut centered = features.data().to_owned();
    for mut row in centered.rows_mut() {
        let mean = row.mean().unwrap_or(0.0);
        row.mapv_inplace(|x| x - mean);
    }
    let norms: Vec<f64> = centered
        .rows()
        .into_iter()
        .map(|row| row.dot(&row).sqrt())
        .collect();
    if let Some(item) = norms.iter().position(|&x| x <= 1e-12) {
        return Err(EvalError::NumericalDegenerate {
            context: "correlation kernel",
            detail: format!("item {item} has a constant feature vector"),
        });
    }

    let mut rsm = Array2::zeros((n, n));
    for i in 0..n {
        rsm[[i, i]] = 1.0;
        for j in i + 1..n {
            let sim = centered.row(i).dot(&centered.row(j)) / (norms[i] * norms[j]);
            rsm[[i, j]] = sim;
            rsm[[j, i]] = sim;
        }
    }
    Ok(rsm)
}

/// Off-diagonal upper-triangle entries, each unordered pair once.
pub fn upper_triangle(matrix: &Array2<f64>) -> Vec<f64> {
    let n = matrix.nrows();
    let mut values = Vec::with_capacity(n.saturating_sub(1) * n / 2);
    for i in 0..n {
        for j in i + 1..n {
            values.push(matrix[[i, j]]);
        }
    }
    values
}

/// Pearson linear correlation between two paired sequences.
pub fn pearson(a: &[f64], b: &[f64]) -> Result<f64, EvalError> {
    let n = a.len().min(b.len());
    if n < 2 {
        return Err(InvalidInput::TooFewPairs { n_pairs: n }.into());
    }
    let a = &a[..n];
    let b = &b[..n];

    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;
    let cov: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x - mean_a) * (y - mean_b))
        .sum();
    let var_a: f64 = a.iter().map(|x| (x - mean_a).powi(2)).sum();
    let var_b: f64 = b.iter().map(|y| (y - mean_b).powi(2)).sum();

    let denom = var_a.sqrt() * var_b.sqrt();
    if denom <= 1e-12 {
        return Err(EvalError::NumericalDegenerate {
            context: "correlation",
            detail: "at least one sequence has zero variance".to_string(),
        });
    }
    Ok(cov / denom)
}

/// Spearman rank correlation with mid-rank tie handling.
pub fn spearman(a: &[f64], b: &[f64]) -> Result<f64, EvalError> {
    let n = a.len().min(b.len());
    if n < 2 {
        return Err(InvalidInput::TooFewPairs { n_pairs: n }.into());
    }
    pearson(&midranks(&a[..n]), &midranks(&b[..n]))
}

/// 1-based ranks; tied values share the mean of the ranks they span.
fn midranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let mut end = start;
        while end + 1 < n && values[order[end + 1]] == values[order[start]] {
            end += 1;
        }
        let rank = (start + end) as f64 / 2.0 + 1.0;
        for &index in &order[start..=end] {
            ranks[index] = rank;
        }
        start = end + 1;
    }
    ranks
}

/// Two-sided p-value for a correlation coefficient over `n` pairs,
/// via the Student-t distribution with `n - 2` degrees of freedom.
pub fn two_sided_p(r: f64, n: usize) -> f64 {
    if n < 3 {
        return 1.0;
    }
    let df = (n - 2) as f64;
    let denom = 1.0 - r * r;
    if denom <= 0.0 {
        return 0.0;
    }
    let t = r * (df / denom).sqrt();
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => 2.0 * (1.0 - dist.cdf(t.abs())),
        Err(_) => 1.0,
    }
}

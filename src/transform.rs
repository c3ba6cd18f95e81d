//! Application of learned linear transforms to raw embeddings.
//!
//! Some evaluations probe transformed rather than raw embeddings: the feature
//! matrix is standardized by the scalar statistics of a reference embedding
//! matrix for the same model, projected through a learned weight matrix, and
//! optionally row-normalized. Transforms and reference embeddings are looked
//! up per model; a missing key is reported as `MissingData` so batch runs can
//! skip the model and continue.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use ndarray::Array2;
use serde::Deserialize;

use crate::error::{EvalError, InvalidInput};
use crate::features::FeatureMatrix;

/// Raw JSON entry for one model's transform.
#[derive(Debug, Deserialize)]
struct TransformEntry {
    /// D x K projection weights.
    matrix: Vec<Vec<f64>>,
    /// Whether projected rows are L2-normalized afterwards.
    #[serde(default)]
    normalize: bool,
}

/// A learned projection for one model's embeddings.
#[derive(Debug, Clone)]
pub struct Transform {
    weights: Array2<f64>,
    normalize: bool,
}

impl Transform {
    /// Build a transform from a D x K weight matrix.
    pub fn new(weights: Array2<f64>, normalize: bool) -> Self {
        Self { weights, normalize }
    }

    /// Input dimensionality the transform expects.
    pub fn input_dim(&self) -> usize {
        self.weights.nrows()
    }

    /// Standardize by the reference statistics, project, optionally normalize.
    pub fn apply(
        &self,
        features: &FeatureMatrix,
        reference: &ReferenceStats,
    ) -> Result<FeatureMatrix, EvalError> {
        if features.dim() != self.input_dim() {
            return Err(InvalidInput::DimensionMismatch {
                expected: self.input_dim(),
                got: features.dim(),
            }
            .into());
        }

        let standardized = features
            .data()
            .mapv(|x| (x - reference.mean) / reference.std);
        let mut projected = standardized.dot(&self.weights);

        if self.normalize {
            for (item, mut row) in projected.rows_mut().into_iter().enumerate() {
                let norm = row.dot(&row).sqrt();
                if norm <= 1e-12 {
                    return Err(EvalError::NumericalDegenerate {
                        context: "transform normalization",
                        detail: format!("item {item} projects to a zero vector"),
                    });
                }
                row.mapv_inplace(|x| x / norm);
            }
        }

        FeatureMatrix::new(projected)
    }
}

/// Scalar mean and standard deviation of a reference embedding matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceStats {
    pub mean: f64,
    pub std: f64,
}

impl ReferenceStats {
    /// Compute statistics over all entries of a reference matrix.
    pub fn from_features(reference: &FeatureMatrix) -> Result<Self, EvalError> {
        let data = reference.data();
        let mean = data.mean().unwrap_or(0.0);
        let var = data.mapv(|x| (x - mean).powi(2)).mean().unwrap_or(0.0);
        let std = var.sqrt();
        if std <= 1e-12 {
            return Err(EvalError::NumericalDegenerate {
                context: "reference statistics",
                detail: "reference embeddings have zero variance".to_string(),
            });
        }
        Ok(Self { mean, std })
    }
}

/// Transforms keyed by model name.
#[derive(Debug, Clone, Default)]
pub struct TransformSet {
    transforms: BTreeMap<String, Transform>,
}

impl TransformSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a set from a JSON object mapping model names to transform entries.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading transforms from {}", path.display()))?;
        let raw: BTreeMap<String, TransformEntry> = serde_json::from_str(&content)
            .with_context(|| format!("parsing transforms from {}", path.display()))?;

        let mut transforms = BTreeMap::new();
        for (name, entry) in raw {
            let d = entry.matrix.len();
            let k = entry.matrix.first().map_or(0, Vec::len);
            let mut flat = Vec::with_capacity(d * k);
            for (i, row) in entry.matrix.into_iter().enumerate() {
                anyhow::ensure!(
                    row.len() == k,
                    "transform `{name}`: row {i} has {} entries, expected {k}",
                    row.len()
                );
                flat.extend(row);
            }
            let weights = Array2::from_shape_vec((d, k), flat)?;
            transforms.insert(name, Transform::new(weights, entry.normalize));
        }
        Ok(Self { transforms })
    }

    /// Insert or replace a model's transform.
    pub fn insert(&mut self, name: impl Into<String>, transform: Transform) {
        self.transforms.insert(name.into(), transform);
    }

    /// Look up a model's transform, reporting `MissingData` if absent.
    pub fn require(&self, name: &str) -> Result<&Transform, EvalError> {
        self.transforms.get(name).ok_or_else(|| EvalError::MissingData {
            what: "transform",
            key: name.to_string(),
        })
    }

    /// Number of transforms in the set.
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

//! Feature matrices extracted from vision models.
//!
//! A [`FeatureMatrix`] holds one row per stimulus image, in dataset order.
//! Extraction itself happens upstream (an external extractor produces the
//! values); this module only loads, validates, and serves them. Convolutional
//! feature maps (N x C x H x W) are reduced to N x C by global average
//! pooling at load time.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::Deserialize;

use crate::error::EvalError;

/// Raw JSON shapes accepted for a single feature matrix.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawFeatures {
    /// Already-flat embeddings: N x D.
    Flat(Vec<Vec<f64>>),
    /// Convolutional feature maps: N x C x H x W.
    Spatial(Vec<Vec<Vec<Vec<f64>>>>),
}

/// An immutable N x D matrix of feature vectors, one row per stimulus.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    data: Array2<f64>,
}

impl FeatureMatrix {
    /// Wrap an existing array, rejecting non-finite entries.
    pub fn new(data: Array2<f64>) -> Result<Self, EvalError> {
        for (row, vector) in data.rows().into_iter().enumerate() {
            if let Some(col) = vector.iter().position(|x| !x.is_finite()) {
                return Err(EvalError::NumericalDegenerate {
                    context: "feature matrix",
                    detail: format!("non-finite value at item {row}, dimension {col}"),
                });
            }
        }
        Ok(Self { data })
    }

    /// Build from row vectors, rejecting ragged input.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n = rows.len();
        let d = rows.first().map_or(0, Vec::len);
        let mut flat = Vec::with_capacity(n * d);
        for (i, row) in rows.into_iter().enumerate() {
            anyhow::ensure!(
                row.len() == d,
                "ragged feature rows: item {} has {} dimensions, expected {}",
                i,
                row.len(),
                d
            );
            flat.extend(row);
        }
        let data = Array2::from_shape_vec((n, d), flat)?;
        Ok(Self::new(data)?)
    }

    /// Load a feature matrix from a JSON file.
    ///
    /// Accepts either a flat `N x D` nested list or an `N x C x H x W`
    /// feature map, which is globally average-pooled to `N x C`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading features from {}", path.display()))?;
        let raw: RawFeatures = serde_json::from_str(&content)
            .with_context(|| format!("parsing features from {}", path.display()))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawFeatures) -> Result<Self> {
        match raw {
            RawFeatures::Flat(rows) => Self::from_rows(rows),
            RawFeatures::Spatial(maps) => Self::from_rows(global_average_pool(maps)?),
        }
    }

    /// Number of stimuli (rows).
    pub fn n_items(&self) -> usize {
        self.data.nrows()
    }

    /// Feature dimensionality (columns).
    pub fn dim(&self) -> usize {
        self.data.ncols()
    }

    /// Feature vector for one stimulus.
    pub fn row(&self, item: usize) -> ArrayView1<'_, f64> {
        self.data.row(item)
    }

    /// The underlying matrix.
    pub fn data(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }
}

/// Reduce N x C x H x W feature maps to N x C by averaging over H and W.
fn global_average_pool(maps: Vec<Vec<Vec<Vec<f64>>>>) -> Result<Vec<Vec<f64>>> {
    let mut pooled = Vec::with_capacity(maps.len());
    for (item, channels) in maps.into_iter().enumerate() {
        let mut row = Vec::with_capacity(channels.len());
        for plane in channels {
            let count: usize = plane.iter().map(Vec::len).sum();
            anyhow::ensure!(
                count > 0,
                "empty spatial plane in feature map for item {item}"
            );
            let total: f64 = plane.iter().flatten().sum();
            row.push(total / count as f64);
        }
        pooled.push(row);
    }
    Ok(pooled)
}

/// A named collection of feature matrices, keyed by model or layer name.
///
/// Iteration order is the key order, so evaluation runs are deterministic.
#[derive(Debug, Clone, Default)]
pub struct FeatureStore {
    entries: BTreeMap<String, FeatureMatrix>,
}

impl FeatureStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from a JSON object mapping names to feature arrays.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading feature store from {}", path.display()))?;
        let raw: BTreeMap<String, RawFeatures> = serde_json::from_str(&content)
            .with_context(|| format!("parsing feature store from {}", path.display()))?;
        let mut entries = BTreeMap::new();
        for (name, features) in raw {
            let matrix = FeatureMatrix::from_raw(features)
                .with_context(|| format!("invalid features for `{name}`"))?;
            entries.insert(name, matrix);
        }
        Ok(Self { entries })
    }

    /// Insert or replace a named matrix.
    pub fn insert(&mut self, name: impl Into<String>, features: FeatureMatrix) {
        self.entries.insert(name.into(), features);
    }

    /// Look up a matrix by name.
    pub fn get(&self, name: &str) -> Option<&FeatureMatrix> {
        self.entries.get(name)
    }

    /// Look up a matrix by name, reporting `MissingData` if absent.
    pub fn require(&self, name: &str, what: &'static str) -> Result<&FeatureMatrix, EvalError> {
        self.entries.get(name).ok_or_else(|| EvalError::MissingData {
            what,
            key: name.to_string(),
        })
    }

    /// Iterate entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FeatureMatrix)> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_from_rows() {
        let features =
            FeatureMatrix::from_rows(vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]])
                .unwrap();
        assert_eq!(features.n_items(), 3);
        assert_eq!(features.dim(), 2);
        assert!((features.row(2)[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let result = FeatureMatrix::from_rows(vec![vec![1.0, 0.0], vec![0.0]]);
        assert!(result.is_err());
    }

    #[test]
    fn test_non_finite_rejected() {
        let result = FeatureMatrix::new(array![[1.0, f64::NAN], [0.0, 1.0]]);
        assert!(matches!(
            result,
            Err(EvalError::NumericalDegenerate { .. })
        ));
    }

    #[test]
    fn test_global_average_pool() {
        // 1 item, 2 channels, 2x2 spatial
        let maps = vec![vec![
            vec![vec![1.0, 2.0], vec![3.0, 4.0]],
            vec![vec![0.0, 0.0], vec![0.0, 8.0]],
        ]];
        let pooled = global_average_pool(maps).unwrap();
        assert_eq!(pooled, vec![vec![2.5, 2.0]]);
    }

    #[test]
    fn test_store_ordering_and_lookup() {
        let mut store = FeatureStore::new();
        store.insert("vgg16", FeatureMatrix::from_rows(vec![vec![1.0]]).unwrap());
        store.insert("alexnet", FeatureMatrix::from_rows(vec![vec![2.0]]).unwrap());

        let names: Vec<&str> = store.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["alexnet", "vgg16"]);

        assert!(store.get("vgg16").is_some());
        let missing = store.require("resnet50", "reference embeddings");
        assert!(matches!(missing, Err(EvalError::MissingData { .. })));
    }
}

//! Evaluation runner.
//!
//! Coordinates scoring over a store of feature matrices (one per model or
//! layer), collects summary records, and persists them as JSON. RSA runs can
//! route embeddings through the learned-transform path first; models whose
//! transform or reference embeddings are missing are skipped with a warning
//! so the rest of the batch completes.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ScoringConfig;
use crate::error::EvalError;
use crate::features::{FeatureMatrix, FeatureStore};
use crate::rsa::{rsa, RsaStats, SimilarityJudgments};
use crate::scoring::TripletScorer;
use crate::transform::{ReferenceStats, TransformSet};
use crate::triplets::TripletSet;

/// Summary record for one model/layer on the odd-one-out task.
#[derive(Debug, Clone, Serialize)]
pub struct TripletSummary {
    /// Model or layer name.
    pub name: String,
    /// Fraction of correct choices, rounded to 4 decimals.
    pub accuracy: f64,
    /// Mean per-triplet entropy.
    pub mean_entropy: f64,
    /// Per-triplet entropies, in triplet order.
    pub entropies: Vec<f64>,
    /// Per-triplet correctness, in triplet order.
    pub choices: Vec<bool>,
    /// Per-triplet softmax confidences over the three pairs.
    pub probas: Vec<[f64; 3]>,
}

/// Summary record for one model/layer on the RSA task.
#[derive(Debug, Clone, Serialize)]
pub struct RsaSummary {
    /// Model or layer name.
    pub name: String,
    /// Number of flattened item pairs entering each correlation.
    pub n_pairs: usize,
    #[serde(flatten)]
    pub stats: RsaStats,
}

/// Score every store entry on the odd-one-out triplet task.
pub fn run_triplet_eval(
    store: &FeatureStore,
    triplets: &TripletSet,
    config: ScoringConfig,
) -> Result<Vec<TripletSummary>, EvalError> {
    let scorer = TripletScorer::new(config);
    let mut summaries = Vec::with_capacity(store.len());

    for (name, features) in store.iter() {
        let scores = scorer.score(features, triplets)?;
        let accuracy = scores.accuracy();
        let entropies = scores.entropies();
        let mean_entropy = scores.mean_entropy();
        info!(
            model = name.as_str(),
            accuracy, mean_entropy, "triplet evaluation"
        );

        let probas = scores
            .probas
            .rows()
            .into_iter()
            .map(|row| [row[0], row[1], row[2]])
            .collect();
        summaries.push(TripletSummary {
            name: name.clone(),
            accuracy,
            mean_entropy,
            entropies: entropies.to_vec(),
            choices: scores.choices,
            probas,
        });
    }
    Ok(summaries)
}

/// Triplet indices each model got wrong, in store order.
pub fn failures(summaries: &[TripletSummary]) -> Vec<(String, Vec<usize>)> {
    summaries
        .iter()
        .map(|summary| {
            let wrong = summary
                .choices
                .iter()
                .enumerate()
                .filter(|(_, &correct)| !correct)
                .map(|(i, _)| i)
                .collect();
            (summary.name.clone(), wrong)
        })
        .collect()
}

/// Optional inputs for the RSA transform path.
#[derive(Debug, Clone, Copy, Default)]
pub struct RsaOptions<'a> {
    /// Learned transforms keyed by model name.
    pub transforms: Option<&'a TransformSet>,
    /// Reference embeddings keyed by model name, for standardization.
    pub reference: Option<&'a FeatureStore>,
}

/// Run RSA for every store entry against the human judgments.
///
/// With transforms configured, a model whose transform or reference
/// embeddings cannot be found is skipped with a warning; all other errors
/// abort the run.
pub fn run_rsa_eval(
    store: &FeatureStore,
    judgments: &SimilarityJudgments,
    options: RsaOptions<'_>,
) -> Result<Vec<RsaSummary>, EvalError> {
    let n = judgments.n_items();
    let n_pairs = n.saturating_sub(1) * n / 2;
    let mut summaries = Vec::with_capacity(store.len());

    for (name, features) in store.iter() {
        let transformed = match transformed_features(name, features, options) {
            Ok(t) => t,
            Err(e) if e.is_missing_data() => {
                warn!(model = name.as_str(), "{e}; skipping model");
                continue;
            }
            Err(e) => return Err(e),
        };
        let features = transformed.as_ref().unwrap_or(features);

        let stats = rsa(features, judgments)?;
        info!(
            model = name.as_str(),
            spearman_rho = stats.spearman_rho_correlation,
            pearson_corr = stats.pearson_corr_correlation,
            "rsa evaluation"
        );
        summaries.push(RsaSummary {
            name: name.clone(),
            n_pairs,
            stats,
        });
    }
    Ok(summaries)
}

/// Apply the configured transform path, if any.
///
/// Returns `None` when no transforms are configured, so callers keep the raw
/// borrow instead of cloning the matrix.
fn transformed_features(
    name: &str,
    features: &FeatureMatrix,
    options: RsaOptions<'_>,
) -> Result<Option<FeatureMatrix>, EvalError> {
    let Some(transforms) = options.transforms else {
        return Ok(None);
    };
    let transform = transforms.require(name)?;
    let reference = match options.reference {
        Some(store) => ReferenceStats::from_features(store.require(name, "reference embeddings")?)?,
        None => {
            return Err(EvalError::MissingData {
                what: "reference embeddings",
                key: name.to_string(),
            })
        }
    };
    Ok(Some(transform.apply(features, &reference)?))
}

/// Write a result list as pretty JSON into `out_dir`, creating it if needed.
pub fn save_results<T: Serialize>(
    results: &[T],
    out_dir: impl AsRef<Path>,
    file_name: &str,
) -> Result<PathBuf> {
    let out_dir = out_dir.as_ref();
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;
    let path = out_dir.join(file_name);
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::rsa::JudgmentKind;
    use crate::transform::Transform;
    use ndarray::array;

    fn store_with(name: &str, rows: Vec<Vec<f64>>) -> FeatureStore {
        let mut store = FeatureStore::new();
        store.insert(name, FeatureMatrix::from_rows(rows).unwrap());
        store
    }

    #[test]
    fn test_triplet_eval_summary() {
        let store = store_with(
            "alexnet",
            vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]],
        );
        let triplets = TripletSet::new(vec![[0, 1, 2], [0, 2, 1]]);
        let summaries =
            run_triplet_eval(&store, &triplets, ScoringConfig::default()).unwrap();

        assert_eq!(summaries.len(), 1);
        let summary = &summaries[0];
        assert_eq!(summary.name, "alexnet");
        assert!((summary.accuracy - 0.5).abs() < 1e-12);
        assert_eq!(summary.choices, vec![true, false]);
        assert_eq!(summary.entropies.len(), 2);
        assert_eq!(summary.probas.len(), 2);

        let fails = failures(&summaries);
        assert_eq!(fails, vec![("alexnet".to_string(), vec![1])]);
    }

    #[test]
    fn test_rsa_eval_without_transforms() {
        let store = store_with(
            "vgg16",
            vec![
                vec![1.0, 0.2, 0.0],
                vec![0.8, 0.4, 0.1],
                vec![0.0, 1.0, 0.9],
                vec![0.1, 0.3, 1.0],
            ],
        );
        let rsm = crate::rsa::cosine_kernel(store.get("vgg16").unwrap()).unwrap();
        let judgments = SimilarityJudgments::new(rsm, JudgmentKind::Similarity).unwrap();

        let summaries = run_rsa_eval(&store, &judgments, RsaOptions::default()).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].n_pairs, 6);
        assert!((summaries[0].stats.spearman_rho_cosine - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rsa_eval_skips_models_without_transform() {
        let mut store = store_with(
            "covered",
            vec![
                vec![1.0, 0.0],
                vec![0.8, 0.4],
                vec![0.0, 1.0],
            ],
        );
        store.insert(
            "uncovered",
            FeatureMatrix::from_rows(vec![
                vec![1.0, 0.1],
                vec![0.2, 0.9],
                vec![0.5, 0.5],
            ])
            .unwrap(),
        );

        let mut transforms = TransformSet::new();
        transforms.insert("covered", Transform::new(array![[1.0, 0.0], [0.0, 1.0]], false));
        let mut reference = FeatureStore::new();
        reference.insert(
            "covered",
            FeatureMatrix::from_rows(vec![vec![0.0, 1.0], vec![2.0, 3.0]]).unwrap(),
        );

        let judgments = SimilarityJudgments::new(
            array![[1.0, 0.4, 0.1], [0.4, 1.0, 0.6], [0.1, 0.6, 1.0]],
            JudgmentKind::Similarity,
        )
        .unwrap();

        let options = RsaOptions {
            transforms: Some(&transforms),
            reference: Some(&reference),
        };
        let summaries = run_rsa_eval(&store, &judgments, options).unwrap();

        // "uncovered" has no transform and is skipped, not fatal.
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].name, "covered");
    }

    #[test]
    fn test_save_results_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("results");
        let summaries = vec![RsaSummary {
            name: "alexnet".to_string(),
            n_pairs: 6,
            stats: RsaStats {
                spearman_rho_cosine: 0.5,
                spearman_rho_correlation: 0.4,
                pearson_corr_cosine: 0.6,
                pearson_corr_correlation: 0.3,
            },
        }];

        let path = save_results(&summaries, &out_dir, "rsa_results.json").unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed[0]["name"], "alexnet");
        // RsaStats fields are flattened into the record.
        assert!((parsed[0]["spearman_rho_cosine"].as_f64().unwrap() - 0.5).abs() < 1e-12);
    }
}

//! Odd-one-out triplet scoring.
//!
//! For each triplet the scorer compares the three pairwise similarities,
//! predicts the member outside the most similar pair as the odd one out, and
//! turns the three pair scores into a softmax confidence distribution. The
//! third triplet position holds the ground-truth odd item (see
//! [`crate::triplets::ODD_ONE_OUT_POSITION`]), so a prediction is correct
//! exactly when the predicted position is 2.

use ndarray::{Array1, Array2};
use tracing::debug;

use crate::config::{Distance, ScoringConfig};
use crate::error::EvalError;
use crate::features::FeatureMatrix;
use crate::triplets::{TripletSet, ODD_ONE_OUT_POSITION};

/// The unordered pairs within a triplet, in fixed order.
///
/// Pair `p` leaves out position `2 - p`, which keeps the argmax-to-prediction
/// mapping a constant-time lookup.
const PAIRS: [(usize, usize); 3] = [(0, 1), (0, 2), (1, 2)];

/// Scores triplets against a feature matrix under a fixed configuration.
#[derive(Debug, Clone)]
pub struct TripletScorer {
    config: ScoringConfig,
}

impl TripletScorer {
    /// Create a scorer from a configuration.
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Score every triplet, producing choices and confidence distributions.
    ///
    /// Validates the triplet set eagerly; no partial output is produced on
    /// invalid input.
    pub fn score(
        &self,
        features: &FeatureMatrix,
        triplets: &TripletSet,
    ) -> Result<TripletScores, EvalError> {
        triplets.validate(features.n_items())?;
        let temperature = self.config.temperature;
        if !temperature.is_finite() || temperature <= 0.0 {
            return Err(EvalError::NumericalDegenerate {
                context: "softmax temperature",
                detail: format!("temperature {temperature} is not a positive finite value"),
            });
        }

        let mut choices = Vec::with_capacity(triplets.len());
        let mut probas = Array2::zeros((triplets.len(), 3));

        for (t, &triplet) in triplets.iter().enumerate() {
            let scores = self.pair_scores(features, t, triplet)?;
            let best_pair = argmax(&scores);
            // PAIRS[p] leaves out position 2 - p.
            let predicted = 2 - best_pair;
            choices.push(predicted == ODD_ONE_OUT_POSITION);

            let confidence = softmax(&scores, temperature);
            for (slot, p) in confidence.iter().enumerate() {
                probas[[t, slot]] = *p;
            }
        }

        debug!(
            n_triplets = triplets.len(),
            distance = ?self.config.distance,
            "scored triplet set"
        );
        Ok(TripletScores { choices, probas })
    }

    /// Similarity score for each pair of the triplet, higher = more similar.
    fn pair_scores(
        &self,
        features: &FeatureMatrix,
        t: usize,
        triplet: [usize; 3],
    ) -> Result<[f64; 3], EvalError> {
        let mut scores = [0.0; 3];
        for (p, &(a, b)) in PAIRS.iter().enumerate() {
            let x = features.row(triplet[a]);
            let y = features.row(triplet[b]);
            let score = match self.config.distance {
                Distance::Cosine => {
                    let norm = x.dot(&x).sqrt() * y.dot(&y).sqrt();
                    x.dot(&y) / norm
                }
                // Negated so that higher always means more similar.
                Distance::Euclidean => {
                    -x.iter()
                        .zip(y.iter())
                        .map(|(xi, yi)| (xi - yi).powi(2))
                        .sum::<f64>()
                        .sqrt()
                }
            };
            if !score.is_finite() {
                return Err(EvalError::NumericalDegenerate {
                    context: "pairwise similarity",
                    detail: format!(
                        "triplet {t}: score for items ({}, {}) is not finite",
                        triplet[a], triplet[b]
                    ),
                });
            }
            scores[p] = score;
        }
        Ok(scores)
    }
}

/// Index of the first maximum.
fn argmax(scores: &[f64; 3]) -> usize {
    let mut best = 0;
    for (i, &s) in scores.iter().enumerate().skip(1) {
        if s > scores[best] {
            best = i;
        }
    }
    best
}

/// Temperature-scaled softmax over the three pair scores.
fn softmax(scores: &[f64; 3], temperature: f64) -> [f64; 3] {
    let scaled = scores.map(|s| s / temperature);
    let max = scaled.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let exp = scaled.map(|s| (s - max).exp());
    let total: f64 = exp.iter().sum();
    exp.map(|e| e / total)
}

/// Per-triplet predictions and confidences for one model or layer.
#[derive(Debug, Clone, PartialEq)]
pub struct TripletScores {
    /// Whether each triplet's predicted odd item matched the ground truth.
    pub choices: Vec<bool>,
    /// Softmax confidence over the three pairs, one row per triplet.
    pub probas: Array2<f64>,
}

impl TripletScores {
    /// Number of scored triplets.
    pub fn len(&self) -> usize {
        self.choices.len()
    }

    /// Whether no triplets were scored.
    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    /// Fraction of correct choices, rounded to 4 decimal places.
    pub fn accuracy(&self) -> f64 {
        let correct = self.choices.iter().filter(|&&c| c).count();
        round4(correct as f64 / self.choices.len() as f64)
    }

    /// Shannon entropy of each confidence distribution, in nats.
    ///
    /// Zero-probability slots contribute nothing, so the entropy stays in
    /// `[0, ln 3]`.
    pub fn entropies(&self) -> Array1<f64> {
        let values: Vec<f64> = self
            .probas
            .rows()
            .into_iter()
            .map(|row| {
                -row.iter()
                    .filter(|&&p| p > 0.0)
                    .map(|&p| p * p.ln())
                    .sum::<f64>()
            })
            .collect();
        Array1::from(values)
    }

    /// Mean per-triplet entropy.
    pub fn mean_entropy(&self) -> f64 {
        self.entropies().mean().unwrap_or(0.0)
    }

    /// Indices of triplets the model got wrong.
    pub fn failures(&self) -> Vec<usize> {
        self.choices
            .iter()
            .enumerate()
            .filter(|(_, &correct)| !correct)
            .map(|(i, _)| i)
            .collect()
    }
}

fn round4(x: f64) -> f64 {
    (x * 1e4).round() / 1e4
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(rows: Vec<Vec<f64>>) -> FeatureMatrix {
        FeatureMatrix::from_rows(rows).unwrap()
    }

    #[test]
    fn test_worked_example() {
        // sim(0,1) = 1, sim(0,2) = 0, sim(1,2) = 0 -> pair (0,1) wins, odd = 2.
        let f = features(vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]]);
        let triplets = TripletSet::new(vec![[0, 1, 2]]);
        let scores = TripletScorer::new(ScoringConfig::default())
            .score(&f, &triplets)
            .unwrap();

        assert_eq!(scores.choices, vec![true]);
        assert!((scores.accuracy() - 1.0).abs() < 1e-12);

        // softmax([1, 0, 0]) ~ [0.576, 0.212, 0.212]
        assert!((scores.probas[[0, 0]] - 0.576).abs() < 1e-3);
        assert!((scores.probas[[0, 1]] - 0.212).abs() < 1e-3);
        assert!((scores.probas[[0, 2]] - 0.212).abs() < 1e-3);

        let entropy = scores.entropies()[0];
        assert!((entropy - 0.976).abs() < 1e-3);
    }

    #[test]
    fn test_identical_pair_predicts_remaining_item() {
        let f = features(vec![
            vec![0.3, 0.7, -0.2],
            vec![0.3, 0.7, -0.2],
            vec![-1.0, 0.2, 0.9],
        ]);
        // Odd item in third position -> correct; odd item elsewhere -> incorrect.
        let triplets = TripletSet::new(vec![[0, 1, 2], [0, 2, 1]]);
        let scores = TripletScorer::new(ScoringConfig::default())
            .score(&f, &triplets)
            .unwrap();
        assert_eq!(scores.choices, vec![true, false]);
        assert!((scores.accuracy() - 0.5).abs() < 1e-12);
        assert_eq!(scores.failures(), vec![1]);
    }

    #[test]
    fn test_euclidean_distance_inverts_ranking() {
        // Items 0 and 1 are closest in Euclidean terms.
        let f = features(vec![vec![0.0, 0.0], vec![0.1, 0.0], vec![5.0, 5.0]]);
        let triplets = TripletSet::new(vec![[0, 1, 2]]);
        let config = ScoringConfig::default().with_distance(Distance::Euclidean);
        let scores = TripletScorer::new(config).score(&f, &triplets).unwrap();
        assert_eq!(scores.choices, vec![true]);
    }

    #[test]
    fn test_accuracy_rounding() {
        let f = features(vec![
            vec![1.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
        ]);
        // Two correct, one incorrect: 2/3 rounds to 0.6667.
        let triplets = TripletSet::new(vec![[0, 1, 2], [0, 1, 2], [0, 2, 1]]);
        let scores = TripletScorer::new(ScoringConfig::default())
            .score(&f, &triplets)
            .unwrap();
        assert!((scores.accuracy() - 0.6667).abs() < 1e-12);
    }

    #[test]
    fn test_entropy_permutation_symmetry_and_bounds() {
        let base = TripletScores {
            choices: vec![true],
            probas: ndarray::arr2(&[[0.5, 0.3, 0.2]]),
        };
        let permuted = TripletScores {
            choices: vec![true],
            probas: ndarray::arr2(&[[0.2, 0.5, 0.3]]),
        };
        let e1 = base.entropies()[0];
        let e2 = permuted.entropies()[0];
        assert!((e1 - e2).abs() < 1e-12);
        assert!(e1 >= 0.0 && e1 <= 3.0_f64.ln());

        // Uniform confidences reach the upper bound.
        let uniform = TripletScores {
            choices: vec![false],
            probas: ndarray::arr2(&[[1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0]]),
        };
        assert!((uniform.entropies()[0] - 3.0_f64.ln()).abs() < 1e-12);

        // A one-hot confidence vector has zero entropy (0 * ln 0 = 0).
        let one_hot = TripletScores {
            choices: vec![true],
            probas: ndarray::arr2(&[[1.0, 0.0, 0.0]]),
        };
        assert!(one_hot.entropies()[0].abs() < 1e-12);
    }

    #[test]
    fn test_zero_vector_is_degenerate_under_cosine() {
        let f = features(vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]]);
        let triplets = TripletSet::new(vec![[0, 1, 2]]);
        let err = TripletScorer::new(ScoringConfig::default())
            .score(&f, &triplets)
            .unwrap_err();
        assert!(matches!(err, EvalError::NumericalDegenerate { .. }));
    }

    #[test]
    fn test_temperature_flattens_confidences() {
        let f = features(vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]]);
        let triplets = TripletSet::new(vec![[0, 1, 2]]);

        let sharp = TripletScorer::new(ScoringConfig::default().with_temperature(0.1))
            .score(&f, &triplets)
            .unwrap();
        let flat = TripletScorer::new(ScoringConfig::default().with_temperature(10.0))
            .score(&f, &triplets)
            .unwrap();

        assert!(sharp.probas[[0, 0]] > flat.probas[[0, 0]]);
        assert!(sharp.mean_entropy() < flat.mean_entropy());
        // Choices are temperature-independent.
        assert_eq!(sharp.choices, flat.choices);
    }

    #[test]
    fn test_determinism() {
        let f = features(vec![
            vec![0.1, 0.9, 0.3],
            vec![0.4, 0.2, 0.8],
            vec![0.7, 0.5, 0.1],
            vec![0.2, 0.6, 0.4],
        ]);
        let triplets = TripletSet::new(vec![[0, 1, 2], [1, 2, 3], [3, 0, 2]]);
        let scorer = TripletScorer::new(ScoringConfig::default());

        let a = scorer.score(&f, &triplets).unwrap();
        let b = scorer.score(&f, &triplets).unwrap();

        assert_eq!(a.accuracy().to_bits(), b.accuracy().to_bits());
        assert_eq!(a.mean_entropy().to_bits(), b.mean_entropy().to_bits());
        for (x, y) in a.probas.iter().zip(b.probas.iter()) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }
}

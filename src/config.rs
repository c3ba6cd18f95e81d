//! Scoring configuration.
//!
//! Replaces the ad-hoc parameter passing of earlier evaluation scripts with a
//! single immutable struct. The random seed lives here so reproducibility is
//! a per-run configuration value rather than process-wide state; the scoring
//! core itself is deterministic and only downstream stochastic components
//! (e.g. synthetic baselines) consume it.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Distance function used to score item pairs within a triplet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    /// Cosine similarity; higher means more similar.
    #[default]
    Cosine,
    /// Euclidean distance with inverted sign, so higher still means more similar.
    Euclidean,
}

/// Configuration for an odd-one-out scoring run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringConfig {
    /// Pairwise distance function.
    pub distance: Distance,
    /// Softmax temperature for the confidence distribution.
    pub temperature: f64,
    /// Random seed for any stochastic downstream component.
    pub seed: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            distance: Distance::Cosine,
            temperature: 1.0,
            seed: 42,
        }
    }
}

impl ScoringConfig {
    /// Use a different distance function.
    pub fn with_distance(mut self, distance: Distance) -> Self {
        self.distance = distance;
        self
    }

    /// Use a different softmax temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

// Pedantic clippy configuration for numerical evaluation code.
// These are acceptable in ML/math code:
#![allow(clippy::cast_precision_loss)] // usize→f64 intentional in statistics
#![allow(clippy::many_single_char_names)] // i, j, k, n standard in math
#![allow(clippy::similar_names)] // related variables like `rho`/`rsm`
#![allow(clippy::module_name_repetitions)] // TripletScorer in scoring.rs is fine
#![allow(clippy::doc_markdown)] // backticks for every technical term is excessive
#![allow(clippy::missing_errors_doc)] // # Errors section for every Result fn
#![allow(clippy::must_use_candidate)] // #[must_use] on every pure fn is excessive

//! visalign-rs: evaluating the alignment of visual model embeddings with
//! human similarity judgments.
//!
//! Feature matrices extracted from pretrained vision models (one row per
//! stimulus) are scored against two kinds of human data: odd-one-out triplet
//! judgments, and pairwise similarity ratings compared via representational
//! similarity analysis.
//!
//! ## Architecture
//!
//! - `config`: immutable scoring configuration (distance, temperature, seed)
//! - `error`: typed error conditions for invalid, missing, and degenerate input
//! - `features`: feature matrices and named feature stores
//! - `triplets`: odd-one-out triplet sets with eager validation
//! - `scoring`: triplet scorer producing choices, confidences, accuracy, entropy
//! - `rsa`: similarity kernels and Spearman/Pearson structure comparison
//! - `transform`: application of learned linear transforms to raw embeddings
//! - `evaluation`: batch runner over models/layers with JSON result export

pub mod config;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod rsa;
pub mod scoring;
pub mod transform;
pub mod triplets;

pub use config::{Distance, ScoringConfig};
pub use error::{EvalError, InvalidInput};
pub use evaluation::{
    failures, run_rsa_eval, run_triplet_eval, save_results, RsaOptions, RsaSummary,
    TripletSummary,
};
pub use features::{FeatureMatrix, FeatureStore};
pub use rsa::{
    correlation_kernel, cosine_kernel, pearson, rsa, spearman, two_sided_p, JudgmentKind,
    RsaStats, SimilarityJudgments,
};
pub use scoring::{TripletScorer, TripletScores};
pub use transform::{ReferenceStats, Transform, TransformSet};
pub use triplets::{TripletSet, ODD_ONE_OUT_POSITION};

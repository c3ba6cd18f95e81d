//! Error types for evaluation runs.
//!
//! Three conditions are distinguished: inputs rejected before any arithmetic
//! (`InvalidInput`), lookup keys absent from an optional data source
//! (`MissingData`, recoverable by skipping the affected model in batch runs),
//! and computations whose result would be undefined (`NumericalDegenerate`).

use thiserror::Error;

/// Reasons an input fails eager validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidInput {
    /// Scoring an empty triplet list is undefined (accuracy divides by zero).
    #[error("triplet list is empty")]
    EmptyTripletList,

    /// A triplet references an item outside the feature matrix.
    #[error("triplet {triplet}: index {index} out of bounds for {n_items} items")]
    IndexOutOfBounds {
        triplet: usize,
        index: usize,
        n_items: usize,
    },

    /// A triplet's three indices must be pairwise distinct.
    #[error("triplet {triplet}: indices ({i}, {j}, {k}) are not pairwise distinct")]
    RepeatedIndex {
        triplet: usize,
        i: usize,
        j: usize,
        k: usize,
    },

    /// Correlation over fewer than two paired observations is undefined.
    #[error("correlation requires at least 2 paired observations, got {n_pairs}")]
    TooFewPairs { n_pairs: usize },

    /// Feature matrix and judgment matrix must cover the same item set.
    #[error("feature matrix covers {n_features} items but judgments cover {n_judgments}")]
    ItemCountMismatch {
        n_features: usize,
        n_judgments: usize,
    },

    /// A human judgment matrix must be square.
    #[error("judgment matrix is not square: {rows} rows, {cols} columns")]
    NonSquareJudgments { rows: usize, cols: usize },

    /// Feature dimensionality does not match a transform's input side.
    #[error("feature dimensionality {got} does not match transform input {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Errors surfaced by the scoring and RSA pipeline.
#[derive(Debug, Error)]
pub enum EvalError {
    /// Input rejected before computation; never silently recovered.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInput),

    /// A transform or reference-embedding key was not found. Batch runs log
    /// a warning and continue with the next model.
    #[error("missing {what} for `{key}`")]
    MissingData { what: &'static str, key: String },

    /// The computation would produce NaN or an undefined statistic.
    #[error("numerically degenerate {context}: {detail}")]
    NumericalDegenerate {
        context: &'static str,
        detail: String,
    },
}

impl EvalError {
    /// Whether this error is recoverable by skipping the affected model.
    pub fn is_missing_data(&self) -> bool {
        matches!(self, Self::MissingData { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_context() {
        let err = EvalError::from(InvalidInput::IndexOutOfBounds {
            triplet: 7,
            index: 1854,
            n_items: 1854,
        });
        let msg = err.to_string();
        assert!(msg.contains("triplet 7"));
        assert!(msg.contains("1854"));
    }

    #[test]
    fn test_missing_data_is_recoverable() {
        let err = EvalError::MissingData {
            what: "transform",
            key: "resnet50".to_string(),
        };
        assert!(err.is_missing_data());

        let err = EvalError::from(InvalidInput::EmptyTripletList);
        assert!(!err.is_missing_data());
    }
}

//! Odd-one-out triplet data.
//!
//! A triplet is three item indices into a feature matrix. The triplet files
//! are pre-sorted so that the third position is the designated odd item; the
//! scorer relies on that positional convention and never re-derives it.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::{EvalError, InvalidInput};

/// Position within a triplet that holds the ground-truth odd item.
pub const ODD_ONE_OUT_POSITION: usize = 2;

/// Raw JSON structure for loading.
#[derive(Debug, Deserialize)]
struct TripletFile {
    triplets: Vec<[usize; 3]>,
}

/// An ordered collection of odd-one-out triplets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripletSet {
    triplets: Vec<[usize; 3]>,
}

impl TripletSet {
    /// Wrap an existing triplet list.
    pub fn new(triplets: Vec<[usize; 3]>) -> Self {
        Self { triplets }
    }

    /// Load triplets from a JSON file of the form `{"triplets": [[i, j, k], ...]}`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading triplets from {}", path.display()))?;
        let file: TripletFile = serde_json::from_str(&content)
            .with_context(|| format!("parsing triplets from {}", path.display()))?;
        Ok(Self::new(file.triplets))
    }

    /// Check every triplet against a feature matrix of `n_items` rows.
    ///
    /// Rejects an empty list, out-of-bounds indices, and repeated indices
    /// within a triplet. Runs before any scoring arithmetic.
    pub fn validate(&self, n_items: usize) -> Result<(), EvalError> {
        if self.triplets.is_empty() {
            return Err(InvalidInput::EmptyTripletList.into());
        }
        for (t, &[i, j, k]) in self.triplets.iter().enumerate() {
            for index in [i, j, k] {
                if index >= n_items {
                    return Err(InvalidInput::IndexOutOfBounds {
                        triplet: t,
                        index,
                        n_items,
                    }
                    .into());
                }
            }
            if i == j || i == k || j == k {
                return Err(InvalidInput::RepeatedIndex { triplet: t, i, j, k }.into());
            }
        }
        Ok(())
    }

    /// Number of triplets.
    pub fn len(&self) -> usize {
        self.triplets.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.triplets.is_empty()
    }

    /// The triplets in order.
    pub fn as_slice(&self) -> &[[usize; 3]] {
        &self.triplets
    }

    /// Iterate triplets in order.
    pub fn iter(&self) -> impl Iterator<Item = &[usize; 3]> {
        self.triplets.iter()
    }
}

//! K-fold cross-validation

use crate::error::{Result, TrainerError};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Cross-validation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize, shuffle: bool },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::KFold { n_splits: 3, shuffle: false }
    }
}

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

impl CVSplit {
    /// Hold out `order[test]` and train on the rest of `order`
    fn hold_out(order: &[usize], test: Range<usize>, fold_idx: usize) -> Self {
        let (before, rest) = order.split_at(test.start);
        let (held, after) = rest.split_at(test.len());
        Self {
            train_indices: before.iter().chain(after).copied().collect(),
            test_indices: held.to_vec(),
            fold_idx,
        }
    }
}

/// Smallest test fold that still has a defined R²
pub const MIN_FOLD_SIZE: usize = 2;

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: Option<u64>,
}

impl CrossValidator {
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: None,
        }
    }

    /// Seed used when folds are shuffled
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn strategy(&self) -> CVStrategy {
        self.strategy
    }

    /// Number of folds produced by `split`
    pub fn n_splits(&self) -> usize {
        match self.strategy {
            CVStrategy::KFold { n_splits, .. } => n_splits,
        }
    }

    /// Generate train/test splits over `0..n_samples`.
    ///
    /// Every test fold holds at least [`MIN_FOLD_SIZE`] samples, so each fold
    /// can be scored.
    pub fn split(&self, n_samples: usize) -> Result<Vec<CVSplit>> {
        let CVStrategy::KFold { n_splits, shuffle } = self.strategy;
        if n_splits < 2 {
            return Err(TrainerError::ValidationError(format!(
                "n_splits must be at least 2, got {}",
                n_splits
            )));
        }
        if n_samples < n_splits * MIN_FOLD_SIZE {
            return Err(TrainerError::ValidationError(format!(
                "{} samples cannot fill {} folds of at least {}",
                n_samples, n_splits, MIN_FOLD_SIZE
            )));
        }

        let mut order: Vec<usize> = (0..n_samples).collect();
        if shuffle {
            let mut rng = match self.random_state {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                None => ChaCha8Rng::from_entropy(),
            };
            order.shuffle(&mut rng);
        }

        Ok(fold_ranges(n_samples, n_splits)
            .enumerate()
            .map(|(fold_idx, test)| CVSplit::hold_out(&order, test, fold_idx))
            .collect())
    }
}

/// Contiguous fold ranges; the first `n % k` folds are one sample larger
fn fold_ranges(n_samples: usize, n_splits: usize) -> impl Iterator<Item = Range<usize>> {
    let base = n_samples / n_splits;
    let remainder = n_samples % n_splits;
    (0..n_splits).map(move |fold| {
        let start = fold * base + fold.min(remainder);
        let len = base + usize::from(fold < remainder);
        start..start + len
    })
}

/// Per-fold scores of one parameter combination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    pub scores: Vec<f64>,
    pub mean_score: f64,
    /// Population standard deviation of `scores`
    pub std_score: f64,
    pub n_folds: usize,
}

impl CVResults {
    /// Summarise fold scores; NaN when there are none
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let values = Array1::from(scores.clone());
        let (mean_score, std_score) = match values.mean() {
            Some(mean) => (mean, values.std(0.0)),
            None => (f64::NAN, f64::NAN),
        };
        Self {
            n_folds: scores.len(),
            scores,
            mean_score,
            std_score,
        }
    }
}

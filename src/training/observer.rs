//! Progress hooks for model selection
//!
//! `ModelTrainer` reports every step through a [`TrainingObserver`]. The default
//! [`TracingObserver`] turns those calls into `tracing` events; tests inject
//! their own observer to assert on what happened.

use super::params::{format_params, ParamSet};
use super::trainer::ModelScore;
use crate::error::TrainerError;
use std::path::Path;
use tracing::{debug, info, warn};

/// Callbacks fired by `ModelTrainer`, all no-ops by default
pub trait TrainingObserver: Send + Sync {
    /// Inputs validated and split into features and target
    fn on_split(&self, _n_train: usize, _n_test: usize, _n_features: usize) {}

    /// A candidate's grid search is about to start
    fn on_candidate_start(&self, _name: &str, _n_combinations: usize) {}

    /// One grid combination could not be scored; the search continues
    fn on_combination_failed(&self, _name: &str, _params: &ParamSet, _error: &TrainerError) {}

    /// A candidate was refit and scored on the test split
    fn on_candidate_scored(&self, _name: &str, _score: &ModelScore) {}

    /// The winning candidate, before the threshold check
    fn on_best_model(&self, _name: &str, _score: f64) {}

    /// The selected model was written
    fn on_artifact_saved(&self, _path: &Path) {}
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl TrainingObserver for NullObserver {}

/// Observer that logs through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl TrainingObserver for TracingObserver {
    fn on_split(&self, n_train: usize, n_test: usize, n_features: usize) {
        info!(n_train, n_test, n_features, "Split training and test input data");
    }

    fn on_candidate_start(&self, name: &str, n_combinations: usize) {
        debug!(model = %name, n_combinations, "Starting grid search");
    }

    fn on_combination_failed(&self, name: &str, params: &ParamSet, error: &TrainerError) {
        warn!(
            model = %name,
            params = %format_params(params),
            error = %error,
            "Grid combination failed to fit; scored as NaN"
        );
    }

    fn on_candidate_scored(&self, name: &str, score: &ModelScore) {
        info!(
            model = %name,
            test_r2 = score.test_score,
            train_r2 = score.train_score,
            params = %format_params(&score.best_params),
            "Model evaluated"
        );
    }

    fn on_best_model(&self, name: &str, score: f64) {
        info!(model = %name, score, "Best found model on both training and testing dataset");
    }

    fn on_artifact_saved(&self, path: &Path) {
        info!(path = %path.display(), "Saved best model");
    }
}

//! Exhaustive grid search scored by cross-validated R²

use crate::error::{Result, TrainerError};
use super::cross_validation::{CVResults, CVSplit, CrossValidator};
use super::models::{Regressor, RegressorModel};
use super::params::{ParamGrid, ParamSet};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Clone `model` and apply every parameter of `params` in order
pub fn apply_params(model: &RegressorModel, params: &ParamSet) -> Result<RegressorModel> {
    let mut configured = model.clone();
    for (name, value) in params {
        configured.set_param(name, value)?;
    }
    Ok(configured)
}

/// Outcome of one grid combination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridTrial {
    /// Combination index in grid order
    pub trial_id: usize,
    pub params: ParamSet,
    /// Per-fold scores; `None` when the combination failed
    pub cv: Option<CVResults>,
    /// Mean fold score, NaN for a failed combination
    pub mean_score: f64,
    /// Failure message for a failed combination
    pub error: Option<String>,
    pub duration_secs: f64,
}

/// Result of a grid search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSearchResult {
    /// Every combination in grid order
    pub trials: Vec<GridTrial>,
    /// Index of the winning trial
    pub best_trial_idx: usize,
    pub best_params: ParamSet,
    pub best_score: f64,
    pub total_duration_secs: f64,
}

impl GridSearchResult {
    pub fn best_trial(&self) -> &GridTrial {
        &self.trials[self.best_trial_idx]
    }

    /// Number of combinations that could not be scored
    pub fn n_failed(&self) -> usize {
        self.trials.iter().filter(|t| t.cv.is_none()).count()
    }
}

/// Grid search over a `ParamGrid` with a fixed splitter
#[derive(Debug, Clone)]
pub struct GridSearch {
    cv: CrossValidator,
}

impl GridSearch {
    pub fn new(cv: CrossValidator) -> Self {
        Self { cv }
    }

    pub fn cross_validator(&self) -> &CrossValidator {
        &self.cv
    }

    /// Run the search without observing failed combinations
    pub fn fit(
        &self,
        model: &RegressorModel,
        grid: &ParamGrid,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<GridSearchResult> {
        self.fit_with(model, grid, x, y, |_, _| {})
    }

    /// Run the search; `on_failure` sees every combination that could not be scored.
    ///
    /// A failed combination scores NaN and never wins. The search itself fails
    /// only when no combination could be scored, with the last combination error.
    /// Ties keep the earliest combination.
    pub fn fit_with<F>(
        &self,
        model: &RegressorModel,
        grid: &ParamGrid,
        x: &Array2<f64>,
        y: &Array1<f64>,
        mut on_failure: F,
    ) -> Result<GridSearchResult>
    where
        F: FnMut(&ParamSet, &TrainerError),
    {
        let start = Instant::now();
        let combinations = grid.combinations();
        if combinations.is_empty() {
            return Err(TrainerError::ValidationError(
                "parameter grid has a hyperparameter with no values".to_string(),
            ));
        }
        let splits = self.cv.split(x.nrows())?;

        let mut trials = Vec::with_capacity(combinations.len());
        let mut last_error = None;

        for (trial_id, params) in combinations.into_iter().enumerate() {
            let trial_start = Instant::now();
            let trial = match cross_val_score(model, &params, x, y, &splits) {
                Ok(cv) => GridTrial {
                    trial_id,
                    mean_score: cv.mean_score,
                    cv: Some(cv),
                    error: None,
                    params,
                    duration_secs: trial_start.elapsed().as_secs_f64(),
                },
                Err(err) => {
                    on_failure(&params, &err);
                    let trial = GridTrial {
                        trial_id,
                        mean_score: f64::NAN,
                        cv: None,
                        error: Some(err.to_string()),
                        params,
                        duration_secs: trial_start.elapsed().as_secs_f64(),
                    };
                    last_error = Some(err);
                    trial
                }
            };
            trials.push(trial);
        }

        let mut best: Option<(usize, f64)> = None;
        for trial in &trials {
            if !trial.mean_score.is_finite() {
                continue;
            }
            if best.map_or(true, |(_, score)| trial.mean_score > score) {
                best = Some((trial.trial_id, trial.mean_score));
            }
        }

        let (best_trial_idx, best_score) = match best {
            Some(b) => b,
            None => {
                return Err(last_error.unwrap_or_else(|| {
                    TrainerError::ComputationError("no grid combination produced a finite score".to_string())
                }))
            }
        };

        Ok(GridSearchResult {
            best_params: trials[best_trial_idx].params.clone(),
            trials,
            best_trial_idx,
            best_score,
            total_duration_secs: start.elapsed().as_secs_f64(),
        })
    }
}

/// Fit a fresh copy of `model` with `params` on each training fold and score R² on its test fold
pub fn cross_val_score(
    model: &RegressorModel,
    params: &ParamSet,
    x: &Array2<f64>,
    y: &Array1<f64>,
    splits: &[CVSplit],
) -> Result<CVResults> {
    let configured = apply_params(model, params)?;
    let mut scores = Vec::with_capacity(splits.len());

    for split in splits {
        let x_train = x.select(Axis(0), &split.train_indices);
        let y_train = y.select(Axis(0), &split.train_indices);
        let x_test = x.select(Axis(0), &split.test_indices);
        let y_test = y.select(Axis(0), &split.test_indices);

        let mut fold_model = configured.clone();
        fold_model.fit(&x_train, &y_train)?;
        scores.push(fold_model.score(&x_test, &y_test)?);
    }

    Ok(CVResults::from_scores(scores))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::cross_validation::CVStrategy;
    use crate::training::knn::KNNRegressor;
    use crate::training::linear_models::LinearRegression;
    use crate::training::params::ParamValue;

    fn line(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| 2.0 * v + 1.0);
        (x, y)
    }

    fn search() -> GridSearch {
        GridSearch::new(CrossValidator::new(CVStrategy::KFold { n_splits: 3, shuffle: false }))
    }

    #[test]
    fn test_empty_grid_single_trial() {
        let (x, y) = line(12);
        let model: RegressorModel = LinearRegression::new().into();

        let result = search().fit(&model, &ParamGrid::new(), &x, &y).unwrap();
        assert_eq!(result.trials.len(), 1);
        assert!(result.best_params.is_empty());
        assert!((result.best_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_failed_combination_scores_nan() {
        let (x, y) = line(12);
        let model: RegressorModel = KNNRegressor::default().into();
        let grid = ParamGrid::new().with("n_neighbors", vec![0usize, 1, 2]);

        let mut failures = Vec::new();
        let result = search()
            .fit_with(&model, &grid, &x, &y, |params, _| failures.push(params.clone()))
            .unwrap();

        assert_eq!(failures.len(), 1);
        assert_eq!(result.n_failed(), 1);
        assert!(result.trials[0].mean_score.is_nan());
        assert_ne!(result.best_trial_idx, 0);
    }

    #[test]
    fn test_all_combinations_failing_is_an_error() {
        let (x, y) = line(12);
        let model: RegressorModel = KNNRegressor::default().into();
        let grid = ParamGrid::new().with("n_neighbors", vec![0usize]);

        let err = search().fit(&model, &grid, &x, &y).unwrap_err();
        assert!(matches!(err, TrainerError::InvalidParameter { .. }));
    }

    #[test]
    fn test_ties_keep_first_combination() {
        let (x, y) = line(12);
        let model: RegressorModel = LinearRegression::new().into();
        let grid = ParamGrid::new().with("fit_intercept", vec![true, true]);

        let result = search().fit(&model, &grid, &x, &y).unwrap();
        assert_eq!(result.best_trial_idx, 0);
    }

    #[test]
    fn test_best_combination_selected() {
        let (x, y) = line(12);
        let model: RegressorModel = LinearRegression::new().into();
        let grid = ParamGrid::new().with("fit_intercept", vec![false, true]);

        let result = search().fit(&model, &grid, &x, &y).unwrap();
        assert_eq!(result.best_params, vec![("fit_intercept".to_string(), ParamValue::Bool(true))]);
    }

    #[test]
    fn test_empty_value_list_rejected() {
        let (x, y) = line(12);
        let model: RegressorModel = LinearRegression::new().into();
        let grid = ParamGrid::new().with("fit_intercept", Vec::<bool>::new());
        assert!(search().fit(&model, &grid, &x, &y).is_err());
    }
}

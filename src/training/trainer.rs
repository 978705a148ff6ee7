//! Model selection: tune, fit and score every candidate, keep the best

use crate::error::{Result, TrainerError};
use crate::export::ModelArtifact;
use super::candidates::{default_candidates, Candidate};
use super::config::TrainerConfig;
use super::cross_validation::{CVStrategy, CrossValidator};
use super::grid_search::{apply_params, GridSearch};
use super::models::{r2_score, Regressor, RegressorModel};
use super::observer::{TracingObserver, TrainingObserver};
use super::params::ParamSet;
use ndarray::{s, Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Scores recorded for one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelScore {
    pub name: String,
    /// R² on the test split; the only value used for selection
    pub test_score: f64,
    /// R² on the training split, diagnostic only
    pub train_score: f64,
    /// Winning grid combination (empty when the grid was empty)
    pub best_params: ParamSet,
    /// Mean cross-validated R² of the winning combination
    pub cv_score: Option<f64>,
}

/// Test scores per candidate, in evaluation order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelReport {
    scores: Vec<ModelScore>,
}

impl ModelReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, score: ModelScore) {
        self.scores.push(score);
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelScore> {
        self.scores.iter()
    }

    pub fn scores(&self) -> &[ModelScore] {
        &self.scores
    }

    pub fn get(&self, name: &str) -> Option<&ModelScore> {
        self.scores.iter().find(|s| s.name == name)
    }

    /// Position of the first maximal finite test score
    pub fn best_index(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, score) in self.scores.iter().enumerate() {
            if !score.test_score.is_finite() {
                continue;
            }
            if best.map_or(true, |(_, b)| score.test_score > b) {
                best = Some((idx, score.test_score));
            }
        }
        best.map(|(idx, _)| idx)
    }

    pub fn best(&self) -> Option<&ModelScore> {
        self.best_index().map(|idx| &self.scores[idx])
    }
}

/// Report plus the fitted models, index-aligned
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub report: ModelReport,
    pub models: Vec<RegressorModel>,
}

impl Evaluation {
    pub fn model(&self, name: &str) -> Option<&RegressorModel> {
        self.report
            .iter()
            .position(|s| s.name == name)
            .map(|idx| &self.models[idx])
    }
}

/// Result of a successful selection run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionOutcome {
    pub best_model_name: String,
    pub best_score: f64,
    pub report: ModelReport,
    pub artifact_path: PathBuf,
}

/// Split a matrix into features (all columns but the last) and target (last column)
pub fn split_features_target(matrix: &Array2<f64>) -> Result<(Array2<f64>, Array1<f64>)> {
    let n_cols = matrix.ncols();
    if n_cols < 2 {
        return Err(TrainerError::InvalidInput(format!(
            "expected at least 2 columns (features and target), got {}",
            n_cols
        )));
    }
    let features = matrix.slice(s![.., ..n_cols - 1]).to_owned();
    let target = matrix.column(n_cols - 1).to_owned();
    Ok((features, target))
}

fn validate_matrix(label: &str, matrix: &Array2<f64>) -> Result<()> {
    if matrix.nrows() == 0 || matrix.ncols() == 0 {
        return Err(TrainerError::InvalidInput(format!(
            "{} matrix is empty ({} x {})",
            label,
            matrix.nrows(),
            matrix.ncols()
        )));
    }
    if matrix.ncols() < 2 {
        return Err(TrainerError::InvalidInput(format!(
            "{} matrix needs at least 2 columns (features and target), got {}",
            label,
            matrix.ncols()
        )));
    }
    if let Some(((row, col), value)) = matrix.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(TrainerError::InvalidInput(format!(
            "{} matrix has non-finite value {} at row {}, column {}",
            label, value, row, col
        )));
    }
    Ok(())
}

fn validate_matrices(train: &Array2<f64>, test: &Array2<f64>) -> Result<()> {
    validate_matrix("train", train)?;
    validate_matrix("test", test)?;
    if train.ncols() != test.ncols() {
        return Err(TrainerError::InvalidInput(format!(
            "train has {} columns but test has {}",
            train.ncols(),
            test.ncols()
        )));
    }
    Ok(())
}

fn validate_candidates(candidates: &[Candidate]) -> Result<()> {
    if candidates.is_empty() {
        return Err(TrainerError::InvalidInput("no candidate models given".to_string()));
    }
    let mut seen = HashSet::new();
    for candidate in candidates {
        if !seen.insert(candidate.name.as_str()) {
            return Err(TrainerError::InvalidInput(format!(
                "duplicate candidate name '{}'",
                candidate.name
            )));
        }
    }
    Ok(())
}

fn validate_split(x_train: &Array2<f64>, y_train: &Array1<f64>, x_test: &Array2<f64>, y_test: &Array1<f64>) -> Result<()> {
    if x_train.nrows() == 0 || x_test.nrows() == 0 || x_train.ncols() == 0 {
        return Err(TrainerError::InvalidInput("empty feature matrix".to_string()));
    }
    if x_train.nrows() != y_train.len() || x_test.nrows() != y_test.len() {
        return Err(TrainerError::InvalidInput(
            "feature rows and target length differ".to_string(),
        ));
    }
    if x_train.ncols() != x_test.ncols() {
        return Err(TrainerError::InvalidInput(format!(
            "train has {} features but test has {}",
            x_train.ncols(),
            x_test.ncols()
        )));
    }
    Ok(())
}

/// Tunes, fits and scores candidates and persists the best one
pub struct ModelTrainer {
    config: TrainerConfig,
    observer: Box<dyn TrainingObserver>,
}

impl ModelTrainer {
    /// Create a trainer that logs through `tracing`
    pub fn new(config: TrainerConfig) -> Self {
        Self {
            config,
            observer: Box::new(TracingObserver),
        }
    }

    /// Replace the observer
    pub fn with_observer(mut self, observer: Box<dyn TrainingObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn artifact_path(&self) -> &Path {
        &self.config.trained_model_file_path
    }

    fn grid_search(&self) -> GridSearch {
        let mut cv = CrossValidator::new(CVStrategy::KFold {
            n_splits: self.config.cv_folds,
            shuffle: self.config.shuffle,
        });
        if let Some(seed) = self.config.random_seed {
            cv = cv.with_random_state(seed);
        }
        GridSearch::new(cv)
    }

    fn evaluate_candidate(
        &self,
        search: &GridSearch,
        candidate: &Candidate,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
    ) -> Result<(ModelScore, RegressorModel)> {
        let name = candidate.name.as_str();

        let (best_params, cv_score) = if candidate.grid.is_empty() {
            (ParamSet::new(), None)
        } else {
            let result = search.fit_with(&candidate.model, &candidate.grid, x_train, y_train, |params, err| {
                self.observer.on_combination_failed(name, params, err)
            })?;
            (result.best_params, Some(result.best_score))
        };

        let mut model = apply_params(&candidate.model, &best_params)?;
        model.fit(x_train, y_train)?;

        let train_score = r2_score(y_train, &model.predict(x_train)?);
        let test_score = r2_score(y_test, &model.predict(x_test)?);

        Ok((
            ModelScore {
                name: candidate.name.clone(),
                test_score,
                train_score,
                best_params,
                cv_score,
            },
            model,
        ))
    }

    /// Tune and fit every candidate on the training split and score it on the test split.
    ///
    /// The first candidate that fails aborts the evaluation with `TrainingFailed`.
    pub fn evaluate_models(
        &self,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
        candidates: &[Candidate],
    ) -> Result<Evaluation> {
        validate_candidates(candidates)?;
        validate_split(x_train, y_train, x_test, y_test)?;
        self.config.validate()?;

        let search = self.grid_search();
        let mut report = ModelReport::new();
        let mut models = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            self.observer
                .on_candidate_start(&candidate.name, candidate.grid.n_combinations());

            let (score, model) = self
                .evaluate_candidate(&search, candidate, x_train, y_train, x_test, y_test)
                .map_err(|e| TrainerError::training_failed(candidate.name.clone(), e))?;

            self.observer.on_candidate_scored(&candidate.name, &score);
            report.push(score);
            models.push(model);
        }

        Ok(Evaluation { report, models })
    }

    /// Evaluate `candidates` and persist the best one if it reaches `min_score`
    pub fn run(&self, train: &Array2<f64>, test: &Array2<f64>, candidates: &[Candidate]) -> Result<SelectionOutcome> {
        validate_matrices(train, test)?;
        validate_candidates(candidates)?;
        self.config.validate()?;

        let (x_train, y_train) = split_features_target(train)?;
        let (x_test, y_test) = split_features_target(test)?;
        self.observer
            .on_split(x_train.nrows(), x_test.nrows(), x_train.ncols());

        let evaluation = self.evaluate_models(&x_train, &y_train, &x_test, &y_test, candidates)?;
        let threshold = self.config.min_score;

        let best_idx = match evaluation.report.best_index() {
            Some(idx) => idx,
            None => {
                return Err(TrainerError::NoViableModel {
                    best_model: evaluation
                        .report
                        .iter()
                        .next()
                        .map(|s| s.name.clone())
                        .unwrap_or_default(),
                    best_score: f64::NAN,
                    threshold,
                })
            }
        };
        let best = &evaluation.report.scores()[best_idx];
        self.observer.on_best_model(&best.name, best.test_score);

        if best.test_score < threshold {
            return Err(TrainerError::NoViableModel {
                best_model: best.name.clone(),
                best_score: best.test_score,
                threshold,
            });
        }

        let path = self.config.trained_model_file_path.clone();
        let artifact = ModelArtifact::new(&evaluation.models[best_idx], best, x_train.ncols())?;
        artifact.save(&path)?;
        self.observer.on_artifact_saved(&path);

        Ok(SelectionOutcome {
            best_model_name: best.name.clone(),
            best_score: best.test_score,
            report: evaluation.report.clone(),
            artifact_path: path,
        })
    }

    /// Select and persist the best candidate; returns its test R²
    pub fn select(&self, train: &Array2<f64>, test: &Array2<f64>, candidates: &[Candidate]) -> Result<f64> {
        self.run(train, test, candidates).map(|outcome| outcome.best_score)
    }

    /// `select` over the default six-model catalog
    pub fn initiate_model_trainer(&self, train: &Array2<f64>, test: &Array2<f64>) -> Result<f64> {
        let candidates = default_candidates(self.config.random_seed);
        self.select(train, test, &candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::linear_models::LinearRegression;
    use ndarray::array;

    fn score(name: &str, test: f64) -> ModelScore {
        ModelScore {
            name: name.to_string(),
            test_score: test,
            train_score: 1.0,
            best_params: ParamSet::new(),
            cv_score: None,
        }
    }

    #[test]
    fn test_split_features_target() {
        let m = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let (x, y) = split_features_target(&m).unwrap();
        assert_eq!(x, array![[1.0, 2.0], [4.0, 5.0]]);
        assert_eq!(y, array![3.0, 6.0]);

        assert!(matches!(
            split_features_target(&array![[1.0], [2.0]]),
            Err(TrainerError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_report_best_first_on_tie() {
        let mut report = ModelReport::new();
        report.push(score("a", 0.7));
        report.push(score("b", 0.9));
        report.push(score("c", 0.9));
        assert_eq!(report.best().map(|s| s.name.as_str()), Some("b"));
    }

    #[test]
    fn test_report_ignores_nan() {
        let mut report = ModelReport::new();
        report.push(score("a", f64::NAN));
        report.push(score("b", -3.0));
        assert_eq!(report.best_index(), Some(1));

        let mut only_nan = ModelReport::new();
        only_nan.push(score("a", f64::NAN));
        assert!(only_nan.best().is_none());
    }

    #[test]
    fn test_validation_errors() {
        let good = array![[1.0, 2.0], [2.0, 4.0]];
        assert!(validate_matrices(&good, &good).is_ok());

        let empty = Array2::<f64>::zeros((0, 2));
        assert!(matches!(validate_matrices(&empty, &good), Err(TrainerError::InvalidInput(_))));

        let wide = array![[1.0, 2.0, 3.0]];
        assert!(matches!(validate_matrices(&good, &wide), Err(TrainerError::InvalidInput(_))));

        let nan = array![[1.0, f64::NAN]];
        assert!(matches!(validate_matrices(&nan, &good), Err(TrainerError::InvalidInput(_))));
    }

    #[test]
    fn test_duplicate_candidate_names_rejected() {
        let candidates = vec![
            Candidate::untuned("Linear", LinearRegression::new()),
            Candidate::untuned("Linear", LinearRegression::new()),
        ];
        assert!(matches!(validate_candidates(&candidates), Err(TrainerError::InvalidInput(_))));
        assert!(matches!(validate_candidates(&[]), Err(TrainerError::InvalidInput(_))));
    }
}

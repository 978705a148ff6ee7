//! Regressor trait, model variants and regression metrics

use crate::error::{Result, TrainerError};
use super::adaboost::AdaBoostRegressor;
use super::decision_tree::DecisionTreeRegressor;
use super::gradient_boosting::GradientBoostingRegressor;
use super::knn::KNNRegressor;
use super::linear_models::LinearRegression;
use super::params::ParamValue;
use super::random_forest::RandomForestRegressor;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Coefficient of determination.
///
/// Undefined (NaN) for fewer than two samples. A constant target gives 1.0
/// for a perfect prediction and 0.0 otherwise.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let n = y_true.len();
    if n < 2 {
        return f64::NAN;
    }
    let y_mean = y_true.sum() / n as f64;
    let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();

    if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Metrics for regression evaluation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// R-squared
    pub r2: f64,
    /// Number of evaluated samples
    pub n_samples: usize,
}

impl ModelMetrics {
    /// Compute regression metrics
    pub fn compute_regression(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let n_samples = y_true.len();
        if n_samples == 0 {
            return Self::default();
        }
        let n = n_samples as f64;
        let errors: Vec<f64> = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| t - p)
            .collect();

        let mse: f64 = errors.iter().map(|e| e * e).sum::<f64>() / n;
        let mae: f64 = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        Self {
            mse,
            rmse: mse.sqrt(),
            mae,
            r2: r2_score(y_true, y_pred),
            n_samples,
        }
    }
}

/// Trait for trainable regressors
pub trait Regressor: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Set one hyperparameter by name
    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()>;

    /// Current hyperparameters, rendered for reports and artifact metadata
    fn hyperparameters(&self) -> BTreeMap<String, String>;

    /// R² of the predictions on `x` against `y`
    fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let y_pred = self.predict(x)?;
        Ok(r2_score(y, &y_pred))
    }
}

/// Shared input check for `fit`
pub(crate) fn check_fit_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(TrainerError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(TrainerError::ValidationError(format!(
            "cannot fit on an empty matrix ({} x {})",
            x.nrows(),
            x.ncols()
        )));
    }
    Ok(())
}

/// Shared input check for `predict`
pub(crate) fn check_n_features(expected: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(TrainerError::ShapeError {
            expected: format!("{} features", expected),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

pub(crate) fn unknown_param(model: &str, name: &str, value: &ParamValue) -> TrainerError {
    TrainerError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: format!("not a hyperparameter of {}", model),
    }
}

/// Enum to hold model variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RegressorModel {
    LinearRegression(LinearRegression),
    DecisionTree(DecisionTreeRegressor),
    RandomForest(RandomForestRegressor),
    GradientBoosting(GradientBoostingRegressor),
    KNN(KNNRegressor),
    AdaBoost(AdaBoostRegressor),
}

impl RegressorModel {
    /// Short type name of the wrapped regressor
    pub fn type_name(&self) -> &'static str {
        match self {
            RegressorModel::LinearRegression(_) => "LinearRegression",
            RegressorModel::DecisionTree(_) => "DecisionTreeRegressor",
            RegressorModel::RandomForest(_) => "RandomForestRegressor",
            RegressorModel::GradientBoosting(_) => "GradientBoostingRegressor",
            RegressorModel::KNN(_) => "KNeighborsRegressor",
            RegressorModel::AdaBoost(_) => "AdaBoostRegressor",
        }
    }

    fn inner(&self) -> &dyn Regressor {
        match self {
            RegressorModel::LinearRegression(m) => m,
            RegressorModel::DecisionTree(m) => m,
            RegressorModel::RandomForest(m) => m,
            RegressorModel::GradientBoosting(m) => m,
            RegressorModel::KNN(m) => m,
            RegressorModel::AdaBoost(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Regressor {
        match self {
            RegressorModel::LinearRegression(m) => m,
            RegressorModel::DecisionTree(m) => m,
            RegressorModel::RandomForest(m) => m,
            RegressorModel::GradientBoosting(m) => m,
            RegressorModel::KNN(m) => m,
            RegressorModel::AdaBoost(m) => m,
        }
    }
}

impl Regressor for RegressorModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict(x)
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        self.inner_mut().set_param(name, value)
    }

    fn hyperparameters(&self) -> BTreeMap<String, String> {
        self.inner().hyperparameters()
    }
}

impl From<LinearRegression> for RegressorModel {
    fn from(m: LinearRegression) -> Self {
        RegressorModel::LinearRegression(m)
    }
}

impl From<DecisionTreeRegressor> for RegressorModel {
    fn from(m: DecisionTreeRegressor) -> Self {
        RegressorModel::DecisionTree(m)
    }
}

impl From<RandomForestRegressor> for RegressorModel {
    fn from(m: RandomForestRegressor) -> Self {
        RegressorModel::RandomForest(m)
    }
}

impl From<GradientBoostingRegressor> for RegressorModel {
    fn from(m: GradientBoostingRegressor) -> Self {
        RegressorModel::GradientBoosting(m)
    }
}

impl From<KNNRegressor> for RegressorModel {
    fn from(m: KNNRegressor) -> Self {
        RegressorModel::KNN(m)
    }
}

impl From<AdaBoostRegressor> for RegressorModel {
    fn from(m: AdaBoostRegressor) -> Self {
        RegressorModel::AdaBoost(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regression_metrics() {
        let y_true = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y_pred = array![1.1, 2.0, 2.9, 4.1, 5.0];

        let metrics = ModelMetrics::compute_regression(&y_true, &y_pred);

        assert!(metrics.mse > 0.0);
        assert!((metrics.rmse - metrics.mse.sqrt()).abs() < 1e-12);
        assert!(metrics.r2 > 0.9);
        assert_eq!(metrics.n_samples, 5);
    }

    #[test]
    fn test_r2_perfect_and_mean() {
        let y = array![1.0, 2.0, 3.0, 4.0];
        assert!((r2_score(&y, &y) - 1.0).abs() < 1e-12);

        let mean_pred = Array1::from_elem(4, 2.5);
        assert!(r2_score(&y, &mean_pred).abs() < 1e-12);
    }

    #[test]
    fn test_r2_can_be_negative() {
        let y = array![1.0, 2.0, 3.0];
        let bad = array![3.0, 2.0, 1.0];
        assert!(r2_score(&y, &bad) < 0.0);
    }

    #[test]
    fn test_r2_constant_target() {
        let y = array![2.0, 2.0, 2.0];
        assert_eq!(r2_score(&y, &array![2.0, 2.0, 2.0]), 1.0);
        assert_eq!(r2_score(&y, &array![1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn test_r2_undefined_below_two_samples() {
        assert!(r2_score(&array![4.0], &array![4.0]).is_nan());
        assert!(r2_score(&array![4.0], &array![1.0]).is_nan());
        assert!(r2_score(&Array1::zeros(0), &Array1::zeros(0)).is_nan());
    }

    #[test]
    fn test_enum_dispatch() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];

        let mut model: RegressorModel = LinearRegression::new().into();
        assert_eq!(model.type_name(), "LinearRegression");
        assert!(matches!(model.predict(&x), Err(TrainerError::ModelNotFitted)));

        model.fit(&x, &y).unwrap();
        assert!((model.score(&x, &y).unwrap() - 1.0).abs() < 1e-9);
    }
}

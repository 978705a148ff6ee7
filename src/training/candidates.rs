//! Candidate models and the default regression catalog

use super::adaboost::AdaBoostRegressor;
use super::decision_tree::DecisionTreeRegressor;
use super::gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
use super::knn::KNNRegressor;
use super::linear_models::LinearRegression;
use super::models::RegressorModel;
use super::params::ParamGrid;
use super::random_forest::RandomForestRegressor;
use serde::{Deserialize, Serialize};

/// A named regressor together with the grid it is tuned over
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub model: RegressorModel,
    pub grid: ParamGrid,
}

impl Candidate {
    pub fn new(name: impl Into<String>, model: impl Into<RegressorModel>, grid: ParamGrid) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            grid,
        }
    }

    /// Candidate fitted with default hyperparameters only
    pub fn untuned(name: impl Into<String>, model: impl Into<RegressorModel>) -> Self {
        Self::new(name, model, ParamGrid::new())
    }
}

/// The six regressors tried by `initiate_model_trainer`, in selection order.
///
/// `seed` fixes every randomised model; with `None` each of them draws its
/// seed from entropy on every fit.
pub fn default_candidates(seed: Option<u64>) -> Vec<Candidate> {
    let mut forest = RandomForestRegressor::new(100);
    forest.random_state = seed;

    let boosting = GradientBoostingRegressor::new(GradientBoostingConfig {
        random_state: seed,
        ..Default::default()
    });

    let mut adaboost = AdaBoostRegressor::default();
    adaboost.random_state = seed;

    vec![
        Candidate::new(
            "Random Forest",
            forest,
            ParamGrid::new().with("n_estimators", vec![8usize, 16, 32, 64, 128, 256]),
        ),
        Candidate::new(
            "Decision Tree",
            DecisionTreeRegressor::new(),
            ParamGrid::new().with(
                "criterion",
                vec!["squared_error", "friedman_mse", "absolute_error", "poisson"],
            ),
        ),
        Candidate::untuned("Linear Regression", LinearRegression::new()),
        Candidate::new(
            "Gradient Boosting",
            boosting,
            ParamGrid::new().with("learning_rate", vec![0.1, 0.01, 0.05, 0.001]),
        ),
        Candidate::new(
            "K-Neighbors Regressor",
            KNNRegressor::default(),
            ParamGrid::new().with("n_neighbors", vec![5usize, 7, 9, 11]),
        ),
        Candidate::new(
            "AdaBoost Regressor",
            adaboost,
            ParamGrid::new().with("learning_rate", vec![0.1, 0.01, 0.5, 0.05]),
        ),
    ]
}

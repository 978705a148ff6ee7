//! Model training and selection
//!
//! Provides the regressors the selector chooses between:
//! - Ordinary least squares
//! - CART decision trees and random forests
//! - Gradient boosting and AdaBoost.R2
//! - K-Nearest Neighbors
//!
//! plus K-fold grid search and the [`ModelTrainer`] that ties them together.

mod config;
mod models;
pub mod params;
pub mod cross_validation;
pub mod grid_search;
pub mod linear_models;
pub mod decision_tree;
pub mod random_forest;
pub mod gradient_boosting;
pub mod knn;
pub mod adaboost;
pub mod candidates;
pub mod observer;
pub mod trainer;

pub use config::{TrainerConfig, DEFAULT_ARTIFACT_PATH, DEFAULT_MIN_SCORE};
pub use models::{r2_score, ModelMetrics, Regressor, RegressorModel};
pub use params::{format_params, ParamGrid, ParamSet, ParamValue};
pub use cross_validation::{CrossValidator, CVStrategy, CVSplit, CVResults};
pub use grid_search::{apply_params, cross_val_score, GridSearch, GridSearchResult, GridTrial};
pub use linear_models::LinearRegression;
pub use decision_tree::{Criterion, DecisionTreeRegressor, TreeNode};
pub use random_forest::RandomForestRegressor;
pub use gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
pub use knn::{DistanceMetric, KNNConfig, KNNRegressor, WeightScheme};
pub use adaboost::{AdaBoostLoss, AdaBoostRegressor};
pub use candidates::{default_candidates, Candidate};
pub use observer::{NullObserver, TracingObserver, TrainingObserver};
pub use trainer::{split_features_target, Evaluation, ModelReport, ModelScore, ModelTrainer, SelectionOutcome};

//! Gradient boosting regressor
//!
//! Least-squares boosting: each round fits a shallow regression tree to the
//! current residuals and adds its shrunken prediction to the ensemble.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::collections::BTreeMap;

use super::decision_tree::DecisionTreeRegressor;
use super::models::{check_fit_input, check_n_features, unknown_param, Regressor};
use super::params::ParamValue;
use crate::error::{Result, TrainerError};

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Fraction of rows each tree is fitted on
    pub subsample: f64,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: Some(42),
        }
    }
}

/// Gradient Boosting Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTreeRegressor>,
    initial_prediction: f64,
    feature_importances: Vec<f64>,
    n_features: usize,
}

impl Default for GradientBoostingRegressor {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_prediction: 0.0,
            feature_importances: Vec::new(),
            n_features: 0,
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    /// Number of fitted boosting rounds
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn subsample_indices(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        if self.config.subsample >= 1.0 {
            return (0..n).collect();
        }
        let sample_size = ((n as f64) * self.config.subsample).ceil().max(1.0) as usize;
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(rng);
        indices.truncate(sample_size);
        indices.sort_unstable();
        indices
    }

    fn invalid(name: &str, value: &ParamValue, reason: &str) -> TrainerError {
        TrainerError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl Regressor for GradientBoostingRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let n_samples = x.nrows();
        let n_features = x.ncols();

        self.trees.clear();
        self.n_features = n_features;
        self.initial_prediction = y.mean().unwrap_or(0.0);
        let mut predictions = Array1::from_elem(n_samples, self.initial_prediction);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.feature_importances = vec![0.0; n_features];

        for _ in 0..self.config.n_estimators {
            let residuals: Array1<f64> = y - &predictions;

            let sample_indices = self.subsample_indices(n_samples, &mut rng);
            let x_sub = x.select(Axis(0), &sample_indices);
            let r_sub: Array1<f64> = sample_indices.iter().map(|&i| residuals[i]).collect();

            let mut tree = DecisionTreeRegressor::new()
                .with_max_depth(self.config.max_depth)
                .with_min_samples_leaf(self.config.min_samples_leaf);
            tree.fit(&x_sub, &r_sub)?;

            // Every row moves, not only the sampled ones
            let tree_pred = tree.predict(x)?;
            predictions.scaled_add(self.config.learning_rate, &tree_pred);

            if let Some(tree_importance) = tree.feature_importances() {
                for (total, &imp) in self.feature_importances.iter_mut().zip(tree_importance.iter()) {
                    *total += imp;
                }
            }

            self.trees.push(tree);
        }

        let total: f64 = self.feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= total;
            }
        }

        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.n_features == 0 {
            return Err(TrainerError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;

        let mut predictions = Array1::from_elem(x.nrows(), self.initial_prediction);
        for tree in &self.trees {
            predictions.scaled_add(self.config.learning_rate, &tree.predict(x)?);
        }
        Ok(predictions)
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "n_estimators" => self.config.n_estimators = value.as_usize(name)?,
            "learning_rate" => {
                let lr = value.as_f64(name)?;
                if !(lr > 0.0 && lr.is_finite()) {
                    return Err(Self::invalid(name, value, "must be positive"));
                }
                self.config.learning_rate = lr;
            }
            "max_depth" => {
                let depth = value.as_usize(name)?;
                if depth == 0 {
                    return Err(Self::invalid(name, value, "must be at least 1"));
                }
                self.config.max_depth = depth;
            }
            "min_samples_leaf" => self.config.min_samples_leaf = value.as_usize(name)?.max(1),
            "subsample" => {
                let s = value.as_f64(name)?;
                if !(s > 0.0 && s <= 1.0) {
                    return Err(Self::invalid(name, value, "must be in (0, 1]"));
                }
                self.config.subsample = s;
            }
            _ => return Err(unknown_param("GradientBoostingRegressor", name, value)),
        }
        Ok(())
    }

    fn hyperparameters(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("n_estimators".to_string(), self.config.n_estimators.to_string()),
            ("learning_rate".to_string(), self.config.learning_rate.to_string()),
            ("max_depth".to_string(), self.config.max_depth.to_string()),
            ("min_samples_leaf".to_string(), self.config.min_samples_leaf.to_string()),
            ("subsample".to_string(), self.config.subsample.to_string()),
        ])
    }
}

//! AdaBoost regressor (AdaBoost.R2)
//!
//! Each round draws a weighted bootstrap sample, fits a shallow regression
//! tree, and re-weights samples by their relative loss so later trees focus
//! on the worst-predicted rows. Predictions are the weighted median of the
//! ensemble.

use crate::error::{Result, TrainerError};
use super::decision_tree::DecisionTreeRegressor;
use super::models::{check_fit_input, check_n_features, unknown_param, Regressor};
use super::params::ParamValue;
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Loss used to turn absolute errors into sample re-weighting factors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdaBoostLoss {
    Linear,
    Square,
    Exponential,
}

impl fmt::Display for AdaBoostLoss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AdaBoostLoss::Linear => "linear",
            AdaBoostLoss::Square => "square",
            AdaBoostLoss::Exponential => "exponential",
        })
    }
}

impl AdaBoostLoss {
    /// Map an error already scaled into [0, 1]
    fn apply(self, e: f64) -> f64 {
        match self {
            AdaBoostLoss::Linear => e,
            AdaBoostLoss::Square => e * e,
            AdaBoostLoss::Exponential => 1.0 - (-e).exp(),
        }
    }
}

/// AdaBoost.R2 regressor over depth-limited regression trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostRegressor {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub loss: AdaBoostLoss,
    /// Depth of each base tree
    pub base_max_depth: usize,
    pub random_state: Option<u64>,
    estimators: Vec<DecisionTreeRegressor>,
    estimator_weights: Vec<f64>,
    n_features: usize,
}

impl Default for AdaBoostRegressor {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostRegressor {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            loss: AdaBoostLoss::Linear,
            base_max_depth: 3,
            random_state: None,
            estimators: Vec::new(),
            estimator_weights: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_loss(mut self, loss: AdaBoostLoss) -> Self {
        self.loss = loss;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Number of trees kept after boosting
    pub fn n_trees(&self) -> usize {
        self.estimators.len()
    }

    pub fn estimator_weights(&self) -> &[f64] {
        &self.estimator_weights
    }

    /// Draw `n` indices with replacement, proportional to `weights`
    fn weighted_bootstrap(weights: &Array1<f64>, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let mut cumulative = Vec::with_capacity(weights.len());
        let mut acc = 0.0;
        for &w in weights {
            acc += w;
            cumulative.push(acc);
        }
        let last = weights.len().saturating_sub(1);
        (0..weights.len())
            .map(|_| {
                let u = rng.gen::<f64>() * acc;
                cumulative.partition_point(|&c| c <= u).min(last)
            })
            .collect()
    }

    /// One AdaBoost.R2 round. Returns the fitted tree, its weight and its
    /// weighted error, or `None` when the tree is no better than chance.
    fn boost(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        sample_weight: &mut Array1<f64>,
        rng: &mut ChaCha8Rng,
        is_last: bool,
    ) -> Result<Option<(DecisionTreeRegressor, f64, f64)>> {
        let indices = Self::weighted_bootstrap(sample_weight, rng);
        let x_boot = x.select(Axis(0), &indices);
        let y_boot: Array1<f64> = indices.iter().map(|&i| y[i]).collect();

        let mut tree = DecisionTreeRegressor::new().with_max_depth(self.base_max_depth);
        tree.fit(&x_boot, &y_boot)?;

        let y_pred = tree.predict(x)?;
        let mut error_vect: Array1<f64> = (&y_pred - y).mapv(f64::abs);
        let error_max = error_vect
            .iter()
            .zip(sample_weight.iter())
            .filter(|(_, &w)| w > 0.0)
            .map(|(&e, _)| e)
            .fold(0.0, f64::max);
        if error_max > 0.0 {
            error_vect /= error_max;
        }
        let loss = self.loss;
        error_vect.mapv_inplace(|e| loss.apply(e));

        let estimator_error = sample_weight.dot(&error_vect);

        if estimator_error <= 0.0 {
            return Ok(Some((tree, 1.0, 0.0)));
        }
        if estimator_error >= 0.5 {
            return Ok(None);
        }

        let beta = estimator_error / (1.0 - estimator_error);
        let estimator_weight = self.learning_rate * (1.0 / beta).ln();

        if !is_last {
            let lr = self.learning_rate;
            for (w, &e) in sample_weight.iter_mut().zip(error_vect.iter()) {
                if *w > 0.0 {
                    *w *= beta.powf((1.0 - e) * lr);
                }
            }
        }

        Ok(Some((tree, estimator_weight, estimator_error)))
    }
}

impl Regressor for AdaBoostRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if !(self.learning_rate > 0.0) {
            return Err(TrainerError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: self.learning_rate.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let n_samples = x.nrows();
        self.n_features = x.ncols();
        self.estimators.clear();
        self.estimator_weights.clear();

        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let mut sample_weight = Array1::from_elem(n_samples, 1.0 / n_samples as f64);

        for round in 0..self.n_estimators {
            let is_last = round + 1 == self.n_estimators;
            match self.boost(x, y, &mut sample_weight, &mut rng, is_last)? {
                Some((tree, weight, error)) => {
                    self.estimators.push(tree);
                    self.estimator_weights.push(weight);
                    if error == 0.0 {
                        break;
                    }
                }
                None => {
                    // A worse-than-chance first tree is still better than no model
                    if self.estimators.is_empty() {
                        let mut tree = DecisionTreeRegressor::new().with_max_depth(self.base_max_depth);
                        tree.fit(x, y)?;
                        self.estimators.push(tree);
                        self.estimator_weights.push(1.0);
                    }
                    break;
                }
            }

            let total = sample_weight.sum();
            if !(total > 0.0) {
                break;
            }
            sample_weight /= total;
        }

        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.estimators.is_empty() {
            return Err(TrainerError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;

        let all_predictions: Vec<Array1<f64>> = self
            .estimators
            .iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<_>>()?;
        let total_weight: f64 = self.estimator_weights.iter().sum();

        let predictions = (0..x.nrows())
            .map(|i| {
                let mut ranked: Vec<(f64, f64)> = all_predictions
                    .iter()
                    .zip(self.estimator_weights.iter())
                    .map(|(p, &w)| (p[i], w))
                    .collect();
                ranked.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

                let half = 0.5 * total_weight;
                let mut cdf = 0.0;
                for &(pred, w) in &ranked {
                    cdf += w;
                    if cdf >= half {
                        return pred;
                    }
                }
                ranked.last().map_or(0.0, |r| r.0)
            })
            .collect();

        Ok(predictions)
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "n_estimators" => self.n_estimators = value.as_usize(name)?.max(1),
            "learning_rate" => {
                let lr = value.as_f64(name)?;
                if !(lr > 0.0 && lr.is_finite()) {
                    return Err(TrainerError::InvalidParameter {
                        name: name.to_string(),
                        value: value.to_string(),
                        reason: "must be positive".to_string(),
                    });
                }
                self.learning_rate = lr;
            }
            "loss" => {
                self.loss = match value.as_str(name)? {
                    "linear" => AdaBoostLoss::Linear,
                    "square" => AdaBoostLoss::Square,
                    "exponential" => AdaBoostLoss::Exponential,
                    _ => {
                        return Err(TrainerError::InvalidParameter {
                            name: name.to_string(),
                            value: value.to_string(),
                            reason: "expected linear, square or exponential".to_string(),
                        })
                    }
                }
            }
            _ => return Err(unknown_param("AdaBoostRegressor", name, value)),
        }
        Ok(())
    }

    fn hyperparameters(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("n_estimators".to_string(), self.n_estimators.to_string()),
            ("learning_rate".to_string(), self.learning_rate.to_string()),
            ("loss".to_string(), self.loss.to_string()),
            ("base_max_depth".to_string(), self.base_max_depth.to_string()),
        ])
    }
}

//! Random forest regressor

use crate::error::{Result, TrainerError};
use super::decision_tree::{Criterion, DecisionTreeRegressor};
use super::models::{check_fit_input, check_n_features, unknown_param, Regressor};
use super::params::ParamValue;
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Random forest model: bagged regression trees, predictions averaged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    /// Individual trees
    trees: Vec<DecisionTreeRegressor>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Random state
    pub random_state: Option<u64>,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    /// Number of features
    n_features: usize,
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForestRegressor {
    /// Create a new regressor forest
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            bootstrap: true,
            criterion: Criterion::SquaredError,
            random_state: None,
            feature_importances: None,
            n_features: 0,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Enable/disable bootstrap sampling
    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    fn compute_feature_importances(&mut self) {
        let mut total_importances = vec![0.0; self.n_features];
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (total, &val) in total_importances.iter_mut().zip(imp.iter()) {
                    *total += val;
                }
            }
        }

        let total: f64 = total_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut total_importances {
                *imp /= total;
            }
        }

        self.feature_importances = Some(Array1::from_vec(total_importances));
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.n_estimators == 0 {
            return Err(TrainerError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let n_samples = x.nrows();
        self.n_features = x.ncols();
        let base_seed = match self.random_state {
            Some(seed) => seed,
            None => ChaCha8Rng::from_entropy().gen(),
        };

        // Build trees in parallel; each tree owns a seed derived from its index
        let trees: Result<Vec<DecisionTreeRegressor>> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));

                let mut tree = DecisionTreeRegressor::new()
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_criterion(self.criterion);
                if let Some(d) = self.max_depth {
                    tree = tree.with_max_depth(d);
                }

                if self.bootstrap {
                    let sample_indices: Vec<usize> =
                        (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
                    let x_boot = x.select(Axis(0), &sample_indices);
                    let y_boot: Array1<f64> = sample_indices.iter().map(|&i| y[i]).collect();
                    tree.fit(&x_boot, &y_boot)?;
                } else {
                    tree.fit(x, y)?;
                }

                Ok(tree)
            })
            .collect();

        self.trees = trees?;
        self.compute_feature_importances();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(TrainerError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;

        let all_predictions: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<_>>()?;

        let mut sum = Array1::<f64>::zeros(x.nrows());
        for preds in &all_predictions {
            sum += preds;
        }
        Ok(sum / all_predictions.len() as f64)
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "n_estimators" => {
                let v = value.as_usize(name)?;
                if v == 0 {
                    return Err(TrainerError::InvalidParameter {
                        name: name.to_string(),
                        value: value.to_string(),
                        reason: "must be at least 1".to_string(),
                    });
                }
                self.n_estimators = v;
            }
            "max_depth" => self.max_depth = value.as_optional_usize(name)?,
            "min_samples_split" => self.min_samples_split = value.as_usize(name)?.max(2),
            "min_samples_leaf" => self.min_samples_leaf = value.as_usize(name)?.max(1),
            "bootstrap" => self.bootstrap = value.as_bool(name)?,
            "criterion" => self.criterion = value.as_str(name)?.parse()?,
            _ => return Err(unknown_param("RandomForestRegressor", name, value)),
        }
        Ok(())
    }

    fn hyperparameters(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("n_estimators".to_string(), self.n_estimators.to_string()),
            (
                "max_depth".to_string(),
                self.max_depth.map_or("None".to_string(), |d| d.to_string()),
            ),
            ("min_samples_split".to_string(), self.min_samples_split.to_string()),
            ("min_samples_leaf".to_string(), self.min_samples_leaf.to_string()),
            ("bootstrap".to_string(), self.bootstrap.to_string()),
            ("criterion".to_string(), self.criterion.to_string()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regressor() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut rf = RandomForestRegressor::new(10).with_random_state(42);
        rf.fit(&x, &y).unwrap();
        assert_eq!(rf.n_trees(), 10);

        let predictions = rf.predict(&x).unwrap();
        let mse: f64 = predictions.iter().zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>() / y.len() as f64;

        assert!(mse < 2.0, "MSE too high: {}", mse);
    }

    #[test]
    fn test_seeded_forest_is_deterministic() {
        let x = array![[1.0, 3.0], [2.0, 1.0], [3.0, 4.0], [4.0, 1.0], [5.0, 5.0], [6.0, 9.0]];
        let y = array![1.0, 3.0, 2.0, 5.0, 4.0, 6.0];

        let mut a = RandomForestRegressor::new(8).with_random_state(7);
        let mut b = RandomForestRegressor::new(8).with_random_state(7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_without_bootstrap_matches_single_tree() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![1.0, 4.0, 9.0, 16.0];

        let mut rf = RandomForestRegressor::new(3).with_bootstrap(false);
        rf.fit(&x, &y).unwrap();
        assert_eq!(rf.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];

        let mut rf = RandomForestRegressor::new(10).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let importances = rf.feature_importances().unwrap();
        assert_eq!(importances.len(), 2);
        assert!(importances[0] >= importances[1]);
    }

    #[test]
    fn test_zero_estimators_rejected() {
        let mut rf = RandomForestRegressor::default();
        assert!(rf.set_param("n_estimators", &ParamValue::Int(0)).is_err());
        rf.set_param("n_estimators", &ParamValue::Int(16)).unwrap();
        assert_eq!(rf.n_estimators, 16);
    }
}

//! CART decision tree regressor

use crate::error::{Result, TrainerError};
use super::models::{check_fit_input, check_n_features, unknown_param, Regressor};
use super::params::ParamValue;
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        gain: f64,
    },
}

/// Split quality criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    /// Variance reduction; leaves predict the mean
    SquaredError,
    /// Friedman's improvement score; leaves predict the mean
    FriedmanMse,
    /// Mean absolute deviation from the median; leaves predict the median
    AbsoluteError,
    /// Half Poisson deviance; requires a non-negative target
    Poisson,
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Criterion::SquaredError => "squared_error",
            Criterion::FriedmanMse => "friedman_mse",
            Criterion::AbsoluteError => "absolute_error",
            Criterion::Poisson => "poisson",
        };
        f.write_str(s)
    }
}

impl FromStr for Criterion {
    type Err = TrainerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "squared_error" | "mse" => Ok(Criterion::SquaredError),
            "friedman_mse" => Ok(Criterion::FriedmanMse),
            "absolute_error" | "mae" => Ok(Criterion::AbsoluteError),
            "poisson" => Ok(Criterion::Poisson),
            other => Err(TrainerError::InvalidParameter {
                name: "criterion".to_string(),
                value: other.to_string(),
                reason: "expected squared_error, friedman_mse, absolute_error or poisson".to_string(),
            }),
        }
    }
}

/// `y · ln y` with the convention `0 · ln 0 = 0`
fn xlogy(y: f64) -> f64 {
    if y > 0.0 {
        y * y.ln()
    } else {
        0.0
    }
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

fn mean_absolute_deviation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    let med = median(&mut sorted);
    values.iter().map(|v| (v - med).abs()).sum::<f64>() / values.len() as f64
}

/// Running sums for one side of a candidate split
#[derive(Debug, Clone, Copy, Default)]
struct SideStats {
    count: usize,
    sum: f64,
    sq_sum: f64,
    ylogy_sum: f64,
}

impl SideStats {
    fn push(&mut self, y: f64) {
        self.count += 1;
        self.sum += y;
        self.sq_sum += y * y;
        self.ylogy_sum += xlogy(y);
    }

    fn pop(&mut self, y: f64) {
        self.count -= 1;
        self.sum -= y;
        self.sq_sum -= y * y;
        self.ylogy_sum -= xlogy(y);
    }

    fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }

    fn variance(&self) -> f64 {
        let n = self.count as f64;
        (self.sq_sum / n - (self.sum / n).powi(2)).max(0.0)
    }

    /// Half Poisson deviance per sample: mean(y ln y) - ȳ ln ȳ
    fn poisson_deviance(&self) -> f64 {
        let n = self.count as f64;
        self.ylogy_sum / n - xlogy(self.mean())
    }
}

/// Decision tree regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Split criterion
    pub criterion: Criterion,
    /// Number of features
    n_features: usize,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTreeRegressor {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTreeRegressor {
    /// Create a new regressor tree
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            criterion: Criterion::SquaredError,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
    ) -> TreeNode {
        let n_samples = indices.len();
        let y_subset: Vec<f64> = indices.iter().map(|&i| y[i]).collect();

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || is_constant(&y_subset);

        if should_stop {
            return self.leaf(&y_subset);
        }

        match self.find_best_split(x, y, indices) {
            Some((feature_idx, threshold, gain)) => {
                let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| x[[i, feature_idx]] <= threshold);

                importances[feature_idx] += n_samples as f64 * gain;

                let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, importances));
                let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, importances));

                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    n_samples,
                    gain,
                }
            }
            None => self.leaf(&y_subset),
        }
    }

    fn leaf(&self, y: &[f64]) -> TreeNode {
        let value = if y.is_empty() {
            0.0
        } else if self.criterion == Criterion::AbsoluteError {
            median(&mut y.to_vec())
        } else {
            y.iter().sum::<f64>() / y.len() as f64
        };
        TreeNode::Leaf {
            value,
            n_samples: y.len(),
        }
    }

    /// Best (feature, threshold, gain) over all features; features are scanned in parallel
    fn find_best_split(&self, x: &Array2<f64>, y: &Array1<f64>, indices: &[usize]) -> Option<(usize, f64, f64)> {
        let n = indices.len();
        let mut parent = SideStats::default();
        for &i in indices {
            parent.push(y[i]);
        }
        let parent_impurity = match self.criterion {
            Criterion::SquaredError | Criterion::FriedmanMse => parent.variance(),
            Criterion::AbsoluteError => {
                let values: Vec<f64> = indices.iter().map(|&i| y[i]).collect();
                mean_absolute_deviation(&values)
            }
            Criterion::Poisson => parent.poisson_deviance(),
        };

        let feature_results: Vec<Option<(usize, f64, f64)>> = (0..x.ncols())
            .into_par_iter()
            .map(|feature_idx| {
                let mut order: Vec<usize> = indices.to_vec();
                order.sort_by(|&a, &b| {
                    x[[a, feature_idx]]
                        .partial_cmp(&x[[b, feature_idx]])
                        .unwrap_or(std::cmp::Ordering::Equal)
                });

                let mut left = SideStats::default();
                let mut right = parent;
                let mut best: Option<(f64, f64)> = None;

                for pos in 0..n - 1 {
                    let yi = y[order[pos]];
                    left.push(yi);
                    right.pop(yi);

                    let here = x[[order[pos], feature_idx]];
                    let next = x[[order[pos + 1], feature_idx]];
                    if here >= next {
                        continue;
                    }
                    if left.count < self.min_samples_leaf || right.count < self.min_samples_leaf {
                        continue;
                    }

                    let gain = match self.criterion {
                        Criterion::SquaredError => {
                            let weighted = (left.count as f64 * left.variance()
                                + right.count as f64 * right.variance())
                                / n as f64;
                            parent_impurity - weighted
                        }
                        Criterion::FriedmanMse => {
                            let diff = left.mean() - right.mean();
                            (left.count as f64 * right.count as f64) * diff * diff / (n as f64 * n as f64)
                        }
                        Criterion::AbsoluteError => {
                            let left_y: Vec<f64> = order[..=pos].iter().map(|&i| y[i]).collect();
                            let right_y: Vec<f64> = order[pos + 1..].iter().map(|&i| y[i]).collect();
                            let weighted = (left_y.len() as f64 * mean_absolute_deviation(&left_y)
                                + right_y.len() as f64 * mean_absolute_deviation(&right_y))
                                / n as f64;
                            parent_impurity - weighted
                        }
                        Criterion::Poisson => {
                            if left.sum <= f64::EPSILON || right.sum <= f64::EPSILON {
                                continue;
                            }
                            let weighted = (left.count as f64 * left.poisson_deviance()
                                + right.count as f64 * right.poisson_deviance())
                                / n as f64;
                            parent_impurity - weighted
                        }
                    };

                    if gain > 1e-12 && best.map_or(true, |(g, _)| gain > g) {
                        best = Some((gain, (here + next) / 2.0));
                    }
                }

                best.map(|(gain, threshold)| (feature_idx, threshold, gain))
            })
            .collect();

        // First feature wins on ties, independent of thread scheduling
        feature_results.into_iter().flatten().fold(None, |acc, cand| match acc {
            Some((_, _, g)) if cand.2 <= g => acc,
            _ => Some(cand),
        })
    }

    fn predict_sample(node: &TreeNode, sample: ArrayView1<f64>) -> f64 {
        match node {
            TreeNode::Leaf { value, .. } => *value,
            TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                if sample[*feature_idx] <= *threshold {
                    Self::predict_sample(left, sample)
                } else {
                    Self::predict_sample(right, sample)
                }
            }
        }
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get tree depth (a single leaf has depth 1)
    pub fn get_depth(&self) -> usize {
        fn node_depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
            }
        }
        self.root.as_ref().map_or(0, node_depth)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        fn count_leaves(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => count_leaves(left) + count_leaves(right),
            }
        }
        self.root.as_ref().map_or(0, count_leaves)
    }
}

fn is_constant(y: &[f64]) -> bool {
    match y.first() {
        None => true,
        Some(&first) => y.iter().all(|&v| (v - first).abs() < 1e-12),
    }
}

impl Regressor for DecisionTreeRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;

        if self.criterion == Criterion::Poisson {
            if y.iter().any(|&v| v < 0.0) {
                return Err(TrainerError::ValidationError(
                    "Some value(s) of y are negative which is not allowed for Poisson regression".to_string(),
                ));
            }
            if y.sum() <= 0.0 {
                return Err(TrainerError::ValidationError(
                    "Sum of y is not positive which is necessary for Poisson regression".to_string(),
                ));
            }
        }

        self.n_features = x.ncols();
        let mut importances = vec![0.0; self.n_features];
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.root = Some(self.build_tree(x, y, &indices, 0, &mut importances));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(TrainerError::ModelNotFitted)?;
        check_n_features(self.n_features, x)?;

        Ok(x.rows()
            .into_iter()
            .map(|row| Self::predict_sample(root, row))
            .collect())
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "criterion" => self.criterion = value.as_str(name)?.parse()?,
            "max_depth" => self.max_depth = value.as_optional_usize(name)?,
            "min_samples_split" => {
                let v = value.as_usize(name)?;
                if v < 2 {
                    return Err(TrainerError::InvalidParameter {
                        name: name.to_string(),
                        value: value.to_string(),
                        reason: "must be at least 2".to_string(),
                    });
                }
                self.min_samples_split = v;
            }
            "min_samples_leaf" => {
                let v = value.as_usize(name)?;
                if v < 1 {
                    return Err(TrainerError::InvalidParameter {
                        name: name.to_string(),
                        value: value.to_string(),
                        reason: "must be at least 1".to_string(),
                    });
                }
                self.min_samples_leaf = v;
            }
            _ => return Err(unknown_param("DecisionTreeRegressor", name, value)),
        }
        Ok(())
    }

    fn hyperparameters(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("criterion".to_string(), self.criterion.to_string()),
            (
                "max_depth".to_string(),
                self.max_depth.map_or("None".to_string(), |d| d.to_string()),
            ),
            ("min_samples_split".to_string(), self.min_samples_split.to_string()),
            ("min_samples_leaf".to_string(), self.min_samples_leaf.to_string()),
        ])
    }
}

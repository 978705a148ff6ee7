//! K-Nearest Neighbors regressor

use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use super::models::{check_fit_input, check_n_features, unknown_param, Regressor};
use super::params::ParamValue;
use crate::error::{Result, TrainerError};

/// Distance metric for KNN
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum DistanceMetric {
    /// Euclidean distance (L2)
    #[default]
    Euclidean,
    /// Manhattan distance (L1)
    Manhattan,
    /// Minkowski distance with parameter p
    Minkowski(f64),
}

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum WeightScheme {
    /// All neighbors have equal weight
    #[default]
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    Distance,
}

/// KNN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNConfig {
    /// Number of neighbors
    pub n_neighbors: usize,
    /// Distance metric
    pub metric: DistanceMetric,
    /// Weighting scheme
    pub weights: WeightScheme,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            metric: DistanceMetric::Euclidean,
            weights: WeightScheme::Uniform,
        }
    }
}

/// K-Nearest Neighbors Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNRegressor {
    config: KNNConfig,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
}

impl Default for KNNRegressor {
    fn default() -> Self {
        Self::new(KNNConfig::default())
    }
}

impl KNNRegressor {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            config,
            x_train: None,
            y_train: None,
        }
    }

    /// Create with default config and specified k
    pub fn with_k(k: usize) -> Self {
        Self::new(KNNConfig {
            n_neighbors: k,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &KNNConfig {
        &self.config
    }

    fn check_k(&self) -> Result<()> {
        if self.config.n_neighbors == 0 {
            return Err(TrainerError::InvalidParameter {
                name: "n_neighbors".to_string(),
                value: "0".to_string(),
                reason: "Expected n_neighbors > 0".to_string(),
            });
        }
        Ok(())
    }
}

impl Regressor for KNNRegressor {
    /// Stores the training data; all work happens in `predict`
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.check_k()?;
        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        Ok(())
    }

    /// Predict target values (parallelized over query rows)
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (x_train, y_train) = match (&self.x_train, &self.y_train) {
            (Some(xt), Some(yt)) => (xt, yt),
            _ => return Err(TrainerError::ModelNotFitted),
        };
        check_n_features(x_train.ncols(), x)?;
        self.check_k()?;

        let k = self.config.n_neighbors;
        if k > x_train.nrows() {
            return Err(TrainerError::ValidationError(format!(
                "Expected n_neighbors <= n_samples_fit, but n_neighbors = {}, n_samples_fit = {}",
                k,
                x_train.nrows()
            )));
        }
        let metric = self.config.metric;
        let weights = self.config.weights;

        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let neighbors = find_k_nearest(x.row(i), x_train, y_train, k, metric);
                weighted_mean_from(&neighbors, weights)
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "n_neighbors" => self.config.n_neighbors = value.as_usize(name)?,
            "weights" => {
                self.config.weights = match value.as_str(name)? {
                    "uniform" => WeightScheme::Uniform,
                    "distance" => WeightScheme::Distance,
                    _ => {
                        return Err(TrainerError::InvalidParameter {
                            name: name.to_string(),
                            value: value.to_string(),
                            reason: "expected uniform or distance".to_string(),
                        })
                    }
                }
            }
            "metric" => {
                self.config.metric = match value.as_str(name)? {
                    "euclidean" => DistanceMetric::Euclidean,
                    "manhattan" => DistanceMetric::Manhattan,
                    _ => {
                        return Err(TrainerError::InvalidParameter {
                            name: name.to_string(),
                            value: value.to_string(),
                            reason: "expected euclidean or manhattan; use p for minkowski".to_string(),
                        })
                    }
                }
            }
            "p" => {
                let p = value.as_f64(name)?;
                if !(p >= 1.0 && p.is_finite()) {
                    return Err(TrainerError::InvalidParameter {
                        name: name.to_string(),
                        value: value.to_string(),
                        reason: "must be >= 1".to_string(),
                    });
                }
                self.config.metric = if p == 1.0 {
                    DistanceMetric::Manhattan
                } else if p == 2.0 {
                    DistanceMetric::Euclidean
                } else {
                    DistanceMetric::Minkowski(p)
                };
            }
            _ => return Err(unknown_param("KNeighborsRegressor", name, value)),
        }
        Ok(())
    }

    fn hyperparameters(&self) -> BTreeMap<String, String> {
        let metric = match self.config.metric {
            DistanceMetric::Euclidean => "euclidean".to_string(),
            DistanceMetric::Manhattan => "manhattan".to_string(),
            DistanceMetric::Minkowski(p) => format!("minkowski(p={})", p),
        };
        let weights = match self.config.weights {
            WeightScheme::Uniform => "uniform",
            WeightScheme::Distance => "distance",
        };
        BTreeMap::from([
            ("n_neighbors".to_string(), self.config.n_neighbors.to_string()),
            ("metric".to_string(), metric),
            ("weights".to_string(), weights.to_string()),
        ])
    }
}

/// Max-heap entry for partial sort (keeps k smallest distances)
#[derive(PartialEq)]
struct DistLabel(f64, f64);

impl Eq for DistLabel {}
impl PartialOrd for DistLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}

/// Find k nearest neighbors using a max-heap, O(n log k)
fn find_k_nearest(
    point: ArrayView1<f64>,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    k: usize,
    metric: DistanceMetric,
) -> Vec<(f64, f64)> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (row, &label) in x_train.rows().into_iter().zip(y_train.iter()) {
        let dist = compute_distance(point, row, metric);
        if heap.len() < k {
            heap.push(DistLabel(dist, label));
        } else if let Some(top) = heap.peek() {
            if dist < top.0 {
                heap.pop();
                heap.push(DistLabel(dist, label));
            }
        }
    }

    heap.into_iter().map(|dl| (dl.0, dl.1)).collect()
}

/// Compute distance between two points using the specified metric
fn compute_distance(a: ArrayView1<f64>, b: ArrayView1<f64>, metric: DistanceMetric) -> f64 {
    match metric {
        DistanceMetric::Euclidean => a
            .iter()
            .zip(b.iter())
            .map(|(ai, bi)| {
                let d = ai - bi;
                d * d
            })
            .sum::<f64>()
            .sqrt(),
        DistanceMetric::Manhattan => a.iter().zip(b.iter()).map(|(ai, bi)| (ai - bi).abs()).sum(),
        DistanceMetric::Minkowski(p) => a
            .iter()
            .zip(b.iter())
            .map(|(ai, bi)| (ai - bi).abs().powf(p))
            .sum::<f64>()
            .powf(1.0 / p),
    }
}

/// Weighted mean of neighbour targets.
///
/// With distance weighting, neighbours at distance zero take all the weight.
fn weighted_mean_from(neighbors: &[(f64, f64)], weights: WeightScheme) -> f64 {
    let uniform = || neighbors.iter().map(|(_, y)| y).sum::<f64>() / neighbors.len() as f64;
    match weights {
        WeightScheme::Uniform => uniform(),
        WeightScheme::Distance => {
            let exact: Vec<f64> = neighbors.iter().filter(|(d, _)| *d == 0.0).map(|(_, y)| *y).collect();
            if !exact.is_empty() {
                return exact.iter().sum::<f64>() / exact.len() as f64;
            }
            let mut weighted_sum = 0.0;
            let mut weight_total = 0.0;
            for &(dist, y) in neighbors {
                let w = 1.0 / dist;
                weighted_sum += w * y;
                weight_total += w;
            }
            if weight_total > 0.0 {
                weighted_sum / weight_total
            } else {
                uniform()
            }
        }
    }
}

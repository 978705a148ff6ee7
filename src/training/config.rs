//! Trainer configuration

use crate::error::{Result, TrainerError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default location of the persisted best model
pub const DEFAULT_ARTIFACT_PATH: &str = "artifacts/model.bin";

/// Minimum held-out R² a model must reach to be persisted
pub const DEFAULT_MIN_SCORE: f64 = 0.6;

/// Configuration for model selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Where the selected model is written
    pub trained_model_file_path: PathBuf,

    /// Selection fails when the best test score is below this value
    pub min_score: f64,

    /// Number of folds used by the grid search
    pub cv_folds: usize,

    /// Shuffle samples before splitting them into folds
    pub shuffle: bool,

    /// Seed for randomised models and shuffled folds
    pub random_seed: Option<u64>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            trained_model_file_path: PathBuf::from(DEFAULT_ARTIFACT_PATH),
            min_score: DEFAULT_MIN_SCORE,
            cv_folds: 3,
            shuffle: false,
            random_seed: Some(42),
        }
    }
}

impl TrainerConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the artifact path
    pub fn with_artifact_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.trained_model_file_path = path.into();
        self
    }

    /// Builder method to set the minimum accepted score
    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    /// Builder method to set CV folds
    pub fn with_cv(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    /// Builder method to enable fold shuffling
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Builder method to set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    /// Check that values are usable before any training starts
    pub fn validate(&self) -> Result<()> {
        if self.cv_folds < 2 {
            return Err(TrainerError::ConfigError(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if !self.min_score.is_finite() {
            return Err(TrainerError::ConfigError(format!(
                "min_score must be finite, got {}",
                self.min_score
            )));
        }
        if self.trained_model_file_path.as_os_str().is_empty() {
            return Err(TrainerError::ConfigError(
                "trained_model_file_path is empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| TrainerError::ConfigError(format!("{}: {}", path.as_ref().display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration as pretty JSON
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

//! model-trainer - Regression model selection
//!
//! Fits a catalog of regressors on a training matrix, tunes each one with a
//! K-fold grid search, scores it on a held-out test matrix with R² and
//! persists the best model when it clears a minimum score.
//!
//! # Modules
//!
//! - [`training`] - Regressors, grid search and the [`training::ModelTrainer`]
//! - [`export`] - Checksummed model artifacts
//! - [`utils`] - CSV loading and timing helpers
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```
//! use model_trainer::prelude::*;
//! use ndarray::Array2;
//!
//! // y = 2x + 1; the last column is the target
//! let line = |rows: std::ops::Range<usize>| {
//!     let n = rows.len();
//!     Array2::from_shape_fn((n, 2), |(i, j)| {
//!         let x = (rows.start + i) as f64;
//!         if j == 0 { x } else { 2.0 * x + 1.0 }
//!     })
//! };
//! let train = line(1..25);
//! let test = line(25..33);
//!
//! let dir = tempfile::tempdir()?;
//! let config = TrainerConfig::default().with_artifact_path(dir.path().join("model.bin"));
//! let score = ModelTrainer::new(config).initiate_model_trainer(&train, &test)?;
//! assert!(score > 0.99);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Core error handling
pub mod error;

// Model selection
pub mod training;

// Persistence
pub mod export;

// Utilities
pub mod utils;

// Services
pub mod cli;

pub use error::{ErrorKind, Result, TrainerError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{ErrorKind, Result, TrainerError};

    // Selection
    pub use crate::training::{
        default_candidates, Candidate, ModelReport, ModelScore, ModelTrainer, SelectionOutcome,
        TrainerConfig, TrainingObserver,
    };

    // Models
    pub use crate::training::{ParamGrid, ParamValue, Regressor, RegressorModel};

    // Export
    pub use crate::export::{ArtifactMetadata, ModelArtifact};
}

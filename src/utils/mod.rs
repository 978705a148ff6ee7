//! Utility functions and types

pub mod data_loader;

pub use data_loader::{frame_to_array2, load_csv, load_matrix_csv, write_predictions_csv};

use std::time::{Duration, Instant};

/// Wall-clock timer for CLI progress output
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }
}

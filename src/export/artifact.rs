//! Checksummed binary model artifact
//!
//! Layout (bincode): magic bytes, format version, metadata, the bincode-encoded
//! `RegressorModel`, and an FNV-1a checksum over the encoded model.

use crate::error::{Result, TrainerError};
use crate::training::{ModelScore, Regressor, RegressorModel};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Descriptive fields stored next to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Candidate name the model was selected under
    pub model_name: String,
    /// Regressor type, e.g. `RandomForestRegressor`
    pub model_type: String,
    pub hyperparameters: BTreeMap<String, String>,
    /// R² on the test split
    pub test_score: f64,
    /// R² on the training split
    pub train_score: f64,
    pub n_features: usize,
    /// RFC 3339 timestamp
    pub trained_at: String,
    /// Version of this crate that wrote the artifact
    pub crate_version: String,
}

/// Persisted best model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    magic: [u8; 4],
    format_version: u32,
    metadata: ArtifactMetadata,
    model_data: Vec<u8>,
    checksum: u64,
}

impl ModelArtifact {
    /// Magic bytes for model-trainer artifacts
    pub const MAGIC: [u8; 4] = *b"MTRN";
    /// Current format version
    pub const VERSION: u32 = 1;

    /// Encode a fitted model with its scores
    pub fn new(model: &RegressorModel, score: &ModelScore, n_features: usize) -> Result<Self> {
        let metadata = ArtifactMetadata {
            model_name: score.name.clone(),
            model_type: model.type_name().to_string(),
            hyperparameters: model.hyperparameters(),
            test_score: score.test_score,
            train_score: score.train_score,
            n_features,
            trained_at: chrono::Utc::now().to_rfc3339(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
        };
        Self::from_parts(metadata, model)
    }

    /// Encode a model under explicit metadata
    pub fn from_parts(metadata: ArtifactMetadata, model: &RegressorModel) -> Result<Self> {
        let model_data = bincode::serialize(model)
            .map_err(|e| TrainerError::SerializationError(format!("Failed to serialize model: {}", e)))?;
        let checksum = compute_checksum(&model_data);
        Ok(Self {
            magic: Self::MAGIC,
            format_version: Self::VERSION,
            metadata,
            model_data,
            checksum,
        })
    }

    pub fn metadata(&self) -> &ArtifactMetadata {
        &self.metadata
    }

    pub fn verify_checksum(&self) -> bool {
        compute_checksum(&self.model_data) == self.checksum
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| TrainerError::SerializationError(format!("Failed to serialize artifact: {}", e)))
    }

    /// Parse and verify bytes produced by [`ModelArtifact::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let artifact: Self = bincode::deserialize(bytes)
            .map_err(|e| TrainerError::SerializationError(format!("Failed to deserialize artifact: {}", e)))?;

        if artifact.magic != Self::MAGIC {
            return Err(TrainerError::SerializationError(
                "Not a model-trainer artifact (bad magic bytes)".to_string(),
            ));
        }
        if artifact.format_version != Self::VERSION {
            return Err(TrainerError::SerializationError(format!(
                "Unsupported artifact format version {} (expected {})",
                artifact.format_version,
                Self::VERSION
            )));
        }
        if !artifact.verify_checksum() {
            return Err(TrainerError::SerializationError(
                "Checksum verification failed - file may be corrupted".to_string(),
            ));
        }
        Ok(artifact)
    }

    /// Write the artifact to `path`, replacing any existing file atomically.
    ///
    /// The bytes go to a temp file in the destination directory, which is
    /// flushed to disk and then renamed over `path`. Readers see either the
    /// old artifact or the new one, never a partial write.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::Builder::new().prefix(".model").tempfile_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| TrainerError::IoError(e.error))?;
        Ok(())
    }

    /// Read and verify an artifact
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = fs::read(path.as_ref())?;
        Self::from_bytes(&bytes)
    }

    /// Decode the stored model
    pub fn model(&self) -> Result<RegressorModel> {
        bincode::deserialize(&self.model_data)
            .map_err(|e| TrainerError::SerializationError(format!("Failed to deserialize model: {}", e)))
    }

    /// Decode the stored model, consuming the artifact
    pub fn into_model(self) -> Result<RegressorModel> {
        self.model()
    }

    /// Decode the model and predict on `x`
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.model()?.predict(x)
    }
}

/// FNV-1a over `data`
fn compute_checksum(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 14695981039346656037;
    const FNV_PRIME: u64 = 1099511628211;

    let mut hash = FNV_OFFSET;
    for byte in data {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{LinearRegression, ParamSet};
    use ndarray::array;

    fn fitted() -> (RegressorModel, ModelScore) {
        let mut model: RegressorModel = LinearRegression::new().into();
        model.fit(&array![[1.0], [2.0], [3.0]], &array![2.0, 4.0, 6.0]).unwrap();
        let score = ModelScore {
            name: "Linear".to_string(),
            test_score: 1.0,
            train_score: 1.0,
            best_params: ParamSet::new(),
            cv_score: None,
        };
        (model, score)
    }

    #[test]
    fn test_checksum_is_fnv1a() {
        assert_eq!(compute_checksum(b""), 14695981039346656037);
        assert_eq!(compute_checksum(b"a"), 0xaf63dc4c8601ec8c);
    }

    #[test]
    fn test_save_load_predicts_identically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("model.bin");
        let (model, score) = fitted();

        let artifact = ModelArtifact::new(&model, &score, 1).unwrap();
        artifact.save(&path).unwrap();

        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded.metadata().model_name, "Linear");
        assert_eq!(loaded.metadata().model_type, "LinearRegression");
        assert_eq!(loaded.metadata().n_features, 1);

        let x = array![[4.0], [5.0]];
        assert_eq!(loaded.predict(&x).unwrap(), model.predict(&x).unwrap());
    }

    #[test]
    fn test_save_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        fs::write(&path, b"old").unwrap();

        let (model, score) = fitted();
        ModelArtifact::new(&model, &score, 1).unwrap().save(&path).unwrap();
        assert!(ModelArtifact::load(&path).is_ok());

        // no temp files left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_corruption_detected() {
        let (model, score) = fitted();
        let mut bytes = ModelArtifact::new(&model, &score, 1).unwrap().to_bytes().unwrap();

        let idx = bytes.len() - 12;
        bytes[idx] ^= 0xFF;
        assert!(matches!(
            ModelArtifact::from_bytes(&bytes),
            Err(TrainerError::SerializationError(_))
        ));

        assert!(ModelArtifact::from_bytes(&bytes[..10]).is_err());
    }

    #[test]
    fn test_bad_magic_rejected() {
        let (model, score) = fitted();
        let mut bytes = ModelArtifact::new(&model, &score, 1).unwrap().to_bytes().unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            ModelArtifact::from_bytes(&bytes),
            Err(TrainerError::SerializationError(_))
        ));
    }
}

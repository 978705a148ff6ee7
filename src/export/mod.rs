//! Model persistence
//!
//! The selected model is written as a single checksummed binary artifact
//! (bincode). See [`ModelArtifact`].

mod artifact;

pub use artifact::{ArtifactMetadata, ModelArtifact};

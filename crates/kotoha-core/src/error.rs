use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during Kotoha core operations.
#[derive(Debug, Error)]
pub enum KotohaError {
    /// A model directory could not be read or deserialized.
    #[error("failed to load model from {path:?}: {reason}")]
    ModelLoad {
        /// The model directory that was being loaded.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// A model directory could not be written.
    #[error("failed to save model to {path:?}: {reason}")]
    ModelSave {
        /// The model directory that was being written.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// A pipeline stage expected by the caller is missing.
    #[error("pipeline has no stage named {0:?}")]
    MissingStage(String),

    /// A minibatch was passed with mismatched texts and annotations.
    #[error("batch shape mismatch: {texts} texts but {annotations} annotation sets")]
    BatchShape {
        /// Number of texts in the batch.
        texts: usize,
        /// Number of annotation sets in the batch.
        annotations: usize,
    },
}

/// Result type alias for Kotoha core operations.
pub type Result<T> = std::result::Result<T, KotohaError>;

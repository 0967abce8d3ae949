use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, ObesityError>;

/// Everything that can go wrong while training or serving.
#[derive(Debug, Error)]
pub enum ObesityError {
    #[error("dataset not found: {}", .0.display())]
    DatasetNotFound(PathBuf),

    #[error("cannot coerce column `{column}` row {row}: `{value}` is not a valid number")]
    TypeCoercion {
        column: String,
        row: usize,
        value: String,
    },

    #[error("model artifact unavailable at {}", .0.display())]
    ArtifactUnavailable(PathBuf),

    #[error("artifact incompatible with this build: {0}")]
    ArtifactIncompatible(String),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("training failed: {0}")]
    Training(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("failed to encode artifact: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to decode artifact: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

impl ObesityError {
    /// True when only the current request is at fault and the loaded model
    /// stays usable.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            ObesityError::SchemaMismatch(_) | ObesityError::InvalidInput(_)
        )
    }

    /// Message for the serving layer, separating "not ready" from "bad input".
    pub fn user_message(&self) -> String {
        match self {
            ObesityError::ArtifactUnavailable(path) => format!(
                "Prediction is disabled: no trained model at {}. Run `train` first.",
                path.display()
            ),
            ObesityError::ArtifactIncompatible(msg) => format!(
                "Prediction is disabled: the model artifact is incompatible ({msg}). \
                 The model must be retrained or re-pinned."
            ),
            ObesityError::SchemaMismatch(msg) => {
                format!("The request does not match the model's features: {msg}")
            }
            ObesityError::InvalidInput(msg) => format!("Please check the input: {msg}"),
            other => format!("Prediction failed: {other}"),
        }
    }
}

//! Error types for the FarmWise disease-detection core

use thiserror::Error;

/// Result type for FarmWise core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by provisioning, model loading, and prediction.
///
/// Startup errors (`Provision`, `RuntimeLoad`, `LabelParse`, `CropGroup`) are
/// fatal and abort the service. Per-request errors (`ImageDecode`,
/// `Inference`) are recovered by the HTTP layer.
#[derive(Error, Debug)]
pub enum Error {
    /// Asset fetch or write failure during provisioning
    #[error("Failed to provision asset '{asset}': {reason}")]
    Provision { asset: String, reason: String },

    /// Model or inference runtime failed to initialize
    #[error("Model runtime failed to load: {0}")]
    RuntimeLoad(String),

    /// Label list or cure table could not be parsed
    #[error("Lookup table parse error: {0}")]
    LabelParse(String),

    /// Crop group references labels missing from the label set
    #[error("Crop group '{crop}' references unknown labels: {unmatched:?}")]
    CropGroup {
        crop: String,
        unmatched: Vec<String>,
    },

    /// Uploaded image could not be decoded or transformed
    #[error("{0}")]
    ImageDecode(String),

    /// Inference execution failure
    #[error("Inference error: {0}")]
    Inference(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

//! # FarmWise Core Library
//!
//! Everything the disease-detection service needs below the HTTP layer:
//! - Asset provisioning (model, label list, cure table)
//! - Inference backends (ONNX Runtime and TFLite via tract) behind one trait
//! - Image preparation matching the classifier's training pipeline
//! - Prediction ranking, crop-hint masking, and the confidence gate
//! - The immutable [`Predictor`] context tying those together

pub mod assets;
pub mod crops;
pub mod cures;
pub mod engine;
pub mod error;
pub mod labels;
pub mod postprocess;
pub mod predictor;
pub mod preprocess;

pub use assets::{AssetStore, DEFAULT_ASSETS_DIR};
pub use engine::{InferenceEngine, ModelBackend};
pub use error::{Error, Result};
pub use postprocess::{Prediction, RankedLabel, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_TOP_K};
pub use predictor::Predictor;

//! Model runtime adapters
//!
//! Both inference backends expose the same contract: a fixed-size NHWC f32
//! tensor in, a probability vector over the label set out. Handler code
//! depends only on the [`InferenceEngine`] trait; the backend is chosen once
//! at startup.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use ndarray::Array4;

use crate::error::Result;

mod onnx;
mod tflite;

pub use onnx::OnnxEngine;
pub use tflite::TfliteEngine;

/// Input edge length assumed when the model reports a dynamic dimension.
pub const DEFAULT_INPUT_SIZE: u32 = 224;

/// Which inference runtime executes the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelBackend {
    /// Full-precision ONNX Runtime session (warmup pass at load)
    Onnx,
    /// Quantized TFLite model run by tract (no warmup needed)
    Tflite,
}

impl ModelBackend {
    /// File extension of the model artifact for this backend.
    pub fn extension(&self) -> &'static str {
        match self {
            ModelBackend::Onnx => "onnx",
            ModelBackend::Tflite => "tflite",
        }
    }
}

impl fmt::Display for ModelBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelBackend::Onnx => write!(f, "ONNX"),
            ModelBackend::Tflite => write!(f, "TFLite"),
        }
    }
}

impl FromStr for ModelBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "onnx" => Ok(ModelBackend::Onnx),
            "tflite" => Ok(ModelBackend::Tflite),
            other => Err(format!("unknown backend '{other}' (expected 'onnx' or 'tflite')")),
        }
    }
}

/// A loaded image classifier.
///
/// `infer` takes a 1×H×W×3 tensor of f32 channel values in the source pixel
/// range (the trained artifact expects unscaled 0–255 input) and returns one
/// score per label. Scores are treated as already softmaxed; nothing here
/// enforces that they sum to 1.
pub trait InferenceEngine: Send + Sync {
    fn infer(&self, input: &Array4<f32>) -> Result<Vec<f32>>;

    /// Expected input width, discovered from model metadata.
    fn input_width(&self) -> u32;

    /// Expected input height, discovered from model metadata.
    fn input_height(&self) -> u32;

    /// Output vector length, when the runtime can report it ahead of use.
    fn output_len(&self) -> Option<usize>;

    fn backend(&self) -> ModelBackend;
}

/// Load the configured backend from a model file.
pub fn load_engine(backend: ModelBackend, model_path: &Path) -> Result<Box<dyn InferenceEngine>> {
    match backend {
        ModelBackend::Onnx => Ok(Box::new(OnnxEngine::load(model_path)?)),
        ModelBackend::Tflite => Ok(Box::new(TfliteEngine::load(model_path)?)),
    }
}

/// Interpret model-reported NHWC dims as `(height, width)`, falling back for
/// dynamic axes.
///
/// Negative or zero entries mean the axis is dynamic in the model metadata.
fn resolve_hw(dims: &[i64]) -> (u32, u32) {
    let pick = |d: Option<&i64>| -> u32 {
        match d {
            Some(&v) if v > 0 => v as u32,
            _ => DEFAULT_INPUT_SIZE,
        }
    };
    // NHWC: [batch, height, width, channels]
    (pick(dims.get(1)), pick(dims.get(2)))
}

//! ONNX Runtime backend (full precision)

use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use ndarray::Array4;
use ort::logging::LogLevel;
use ort::session::Session;
use ort::value::{TensorRef, ValueType};
use tracing::info;

use super::{resolve_hw, InferenceEngine, ModelBackend, DEFAULT_INPUT_SIZE};
use crate::error::{Error, Result};

/// Full-precision classifier session.
///
/// Sessions need `&mut` to run, so the session sits behind a mutex and
/// inferences are confined to one at a time.
pub struct OnnxEngine {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    input_h: u32,
    input_w: u32,
    output_len: usize,
}

impl OnnxEngine {
    /// Load the model, read tensor metadata, and run the one-time warmup.
    pub fn load(model_path: &Path) -> Result<Self> {
        let session = Session::builder()
            .map_err(|e| Error::RuntimeLoad(e.to_string()))?
            .with_log_level(LogLevel::Error)
            .map_err(|e| Error::RuntimeLoad(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| {
                Error::RuntimeLoad(format!(
                    "failed to create session from {}: {e}",
                    model_path.display()
                ))
            })?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| Error::RuntimeLoad("model declares no inputs".to_string()))?;
        let input_name = input.name.clone();
        let (input_h, input_w) = match &input.input_type {
            ValueType::Tensor { shape, .. } => {
                let dims: Vec<i64> = shape.iter().copied().collect();
                resolve_hw(&dims)
            }
            _ => (DEFAULT_INPUT_SIZE, DEFAULT_INPUT_SIZE),
        };
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| Error::RuntimeLoad("model declares no outputs".to_string()))?;

        let mut engine = Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            input_h,
            input_w,
            output_len: 0,
        };

        // One-time warmup on a zero tensor so the first request does not pay
        // graph initialization cost. Its output length is the model's class
        // count, checked later against the label set.
        let started = Instant::now();
        let zeros = Array4::<f32>::zeros((1, input_h as usize, input_w as usize, 3));
        let warmup = engine.run(&zeros).map_err(|e| match e {
            Error::Inference(msg) => Error::RuntimeLoad(format!("warmup inference failed: {msg}")),
            other => other,
        })?;
        engine.output_len = warmup.len();
        info!(
            "ONNX session ready: input {}x{}, {} classes, warmup took {}ms",
            input_w,
            input_h,
            warmup.len(),
            started.elapsed().as_millis()
        );
        Ok(engine)
    }

    fn run(&self, input: &Array4<f32>) -> Result<Vec<f32>> {
        let tensor = TensorRef::from_array_view(input.view())
            .map_err(|e| Error::Inference(format!("input tensor conversion failed: {e}")))?;
        let inputs = ort::inputs![self.input_name.as_str() => tensor];
        let mut session = self
            .session
            .lock()
            .map_err(|_| Error::Inference("inference session lock poisoned".to_string()))?;
        let outputs = session
            .run(inputs)
            .map_err(|e| Error::Inference(format!("forward pass failed: {e}")))?;
        let (_, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::Inference(format!("output extraction failed: {e}")))?;
        Ok(data.to_vec())
    }
}

impl InferenceEngine for OnnxEngine {
    fn infer(&self, input: &Array4<f32>) -> Result<Vec<f32>> {
        self.run(input)
    }

    fn input_width(&self) -> u32 {
        self.input_w
    }

    fn input_height(&self) -> u32 {
        self.input_h
    }

    fn output_len(&self) -> Option<usize> {
        Some(self.output_len)
    }

    fn backend(&self) -> ModelBackend {
        ModelBackend::Onnx
    }
}

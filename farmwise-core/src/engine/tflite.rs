//! TFLite backend (quantized, pure Rust via tract)

use std::io::Cursor;
use std::path::Path;

use ndarray::Array4;
use tracing::info;
use tract_tflite::prelude::*;

use super::{resolve_hw, InferenceEngine, ModelBackend};
use crate::error::{Error, Result};

/// Quantized classifier compiled to a tract execution plan.
///
/// The optimized plan is immutable and builds per-call state internally, so
/// `infer` needs no synchronization and no warmup pass: the heavy work all
/// happens in `load`.
pub struct TfliteEngine {
    plan: TypedRunnableModel<TypedModel>,
    input_h: u32,
    input_w: u32,
    output_len: Option<usize>,
}

impl TfliteEngine {
    pub fn load(model_path: &Path) -> Result<Self> {
        let bytes = std::fs::read(model_path).map_err(|e| {
            Error::RuntimeLoad(format!("cannot read {}: {e}", model_path.display()))
        })?;
        let mut cursor = Cursor::new(bytes);
        let model = tract_tflite::tflite()
            .model_for_read(&mut cursor)
            .map_err(|e| Error::RuntimeLoad(format!("TFLite parse error: {e}")))?;

        let inlet = model
            .input_outlets()
            .map_err(|e| Error::RuntimeLoad(format!("cannot inspect model inputs: {e}")))?
            .first()
            .copied()
            .ok_or_else(|| Error::RuntimeLoad("model declares no inputs".to_string()))?;
        let dims: Vec<i64> = {
            let input_fact = model
                .outlet_fact(inlet)
                .map_err(|e| Error::RuntimeLoad(format!("cannot inspect model input: {e}")))?;
            if input_fact.datum_type != f32::datum_type() {
                return Err(Error::RuntimeLoad(format!(
                    "unsupported model input type {:?} (expected f32)",
                    input_fact.datum_type
                )));
            }
            input_fact
                .shape
                .as_concrete()
                .map(|shape| shape.iter().map(|&d| d as i64).collect())
                .unwrap_or_default()
        };
        let (input_h, input_w) = resolve_hw(&dims);

        let fact = TypedFact::dt_shape(
            f32::datum_type(),
            tvec!(1, input_h as usize, input_w as usize, 3),
        );
        let plan = model
            .with_input_fact(0, fact)
            .map_err(|e| Error::RuntimeLoad(format!("cannot pin model input shape: {e}")))?
            .into_optimized()
            .map_err(|e| Error::RuntimeLoad(format!("model optimization failed: {e}")))?
            .into_runnable()
            .map_err(|e| Error::RuntimeLoad(format!("cannot build execution plan: {e}")))?;

        let output_len = plan
            .model()
            .output_fact(0)
            .ok()
            .and_then(|f| f.shape.as_concrete().map(|shape| shape.iter().product()));

        info!(
            "TFLite model ready: input {}x{}{}",
            input_w,
            input_h,
            match output_len {
                Some(n) => format!(", {n} classes"),
                None => String::new(),
            }
        );

        Ok(Self {
            plan,
            input_h,
            input_w,
            output_len,
        })
    }
}

impl InferenceEngine for TfliteEngine {
    fn infer(&self, input: &Array4<f32>) -> Result<Vec<f32>> {
        let (_, h, w, _) = input.dim();
        let tensor: Tensor = tract_ndarray::Array4::<f32>::from_shape_fn(
            (1, h, w, 3),
            |(b, y, x, c)| input[[b, y, x, c]],
        )
        .into();
        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| Error::Inference(format!("TFLite execution failed: {e}")))?;
        let output = outputs
            .first()
            .ok_or_else(|| Error::Inference("model produced no outputs".to_string()))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| Error::Inference(format!("output is not f32: {e}")))?;
        Ok(view.iter().copied().collect())
    }

    fn input_width(&self) -> u32 {
        self.input_w
    }

    fn input_height(&self) -> u32 {
        self.input_h
    }

    fn output_len(&self) -> Option<usize> {
        self.output_len
    }

    fn backend(&self) -> ModelBackend {
        ModelBackend::Tflite
    }
}

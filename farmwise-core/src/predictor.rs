//! The loaded classification context

use std::time::Instant;

use tracing::info;

use crate::assets::AssetStore;
use crate::crops::CropGroups;
use crate::cures::CureTable;
use crate::engine::{load_engine, InferenceEngine, ModelBackend};
use crate::error::{Error, Result};
use crate::labels::LabelSet;
use crate::postprocess::{postprocess, Prediction};
use crate::preprocess::preprocess;

/// Everything a prediction needs, loaded once at startup and then immutable.
///
/// Handlers share one `Predictor` behind an `Arc`; nothing in here mutates
/// after `load` returns.
pub struct Predictor {
    engine: Box<dyn InferenceEngine>,
    labels: LabelSet,
    crops: CropGroups,
    cures: CureTable,
    threshold: f64,
}

impl Predictor {
    /// Blocking startup sequence: parse the lookup tables, validate the crop
    /// groups against the label set, load the model, check output arity.
    pub fn load(store: &AssetStore, backend: ModelBackend, threshold: f64) -> Result<Self> {
        let classes_text = std::fs::read_to_string(store.classes_path())?;
        let labels = LabelSet::parse(&classes_text)?;
        let crops = CropGroups::builtin();
        crops.validate(&labels)?;
        let cure_text = std::fs::read_to_string(store.cure_path())?;
        let cures = CureTable::parse(&cure_text)?;

        let engine = load_engine(backend, &store.model_path(backend))?;
        if let Some(n) = engine.output_len() {
            if n != labels.len() {
                return Err(Error::RuntimeLoad(format!(
                    "model scores {n} classes but the label list has {}",
                    labels.len()
                )));
            }
        }

        info!(
            "predictor ready: {} backend, {} classes, input {}x{}",
            engine.backend(),
            labels.len(),
            engine.input_width(),
            engine.input_height(),
        );
        Ok(Self {
            engine,
            labels,
            crops,
            cures,
            threshold,
        })
    }

    /// Assemble a predictor from pre-built parts. Tests inject fake engines
    /// and small tables here.
    pub fn from_parts(
        engine: Box<dyn InferenceEngine>,
        labels: LabelSet,
        crops: CropGroups,
        cures: CureTable,
        threshold: f64,
    ) -> Self {
        Self {
            engine,
            labels,
            crops,
            cures,
            threshold,
        }
    }

    pub fn class_count(&self) -> usize {
        self.labels.len()
    }

    /// The "HxW" string the health endpoint reports.
    pub fn input_shape(&self) -> String {
        format!(
            "{}x{}",
            self.engine.input_height(),
            self.engine.input_width()
        )
    }

    pub fn backend(&self) -> ModelBackend {
        self.engine.backend()
    }

    /// Classify one uploaded photo. Blocking; callers on the async runtime
    /// wrap this in `spawn_blocking`.
    ///
    /// The crop hint is trimmed and lowercased here so callers can pass the
    /// raw form value; a hint that trims to nothing counts as absent.
    pub fn predict(
        &self,
        image: &[u8],
        crop_hint: Option<&str>,
        top_k: usize,
    ) -> Result<Prediction> {
        let hint = crop_hint
            .map(|h| h.trim().to_lowercase())
            .filter(|h| !h.is_empty());
        let tensor = preprocess(
            image,
            self.engine.input_width(),
            self.engine.input_height(),
        )?;
        let started = Instant::now();
        let probs = self.engine.infer(&tensor)?;
        let inference_ms = started.elapsed().as_millis() as u64;
        let mut prediction = postprocess(
            &probs,
            &self.labels,
            &self.crops,
            &self.cures,
            hint.as_deref(),
            top_k,
            self.threshold,
        )?;
        prediction.inference_ms = inference_ms;
        Ok(prediction)
    }
}

//! Probability vector to client-facing verdict

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::crops::CropGroups;
use crate::cures::CureTable;
use crate::error::{Error, Result};
use crate::labels::LabelSet;

/// Ranked entries returned when the client does not ask for a count.
pub const DEFAULT_TOP_K: usize = 3;

/// Gate below which the class name and cure are withheld.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.70;

/// Class name reported when the confidence gate trips.
pub const UNCERTAIN_CLASS: &str = "uncertain";

const MSG_ACCEPTABLE: &str = "Prediction confidence is acceptable.";
const MSG_UNCERTAIN: &str = "Uncertain – upload a clear, close-up leaf photo in daylight.";
const CURE_WITHHELD: &str = "Not provided – confidence too low.";

/// One entry of the ranked candidate list.
///
/// `confidence` is the raw masked probability as a percentage; it is never
/// renormalized, so entries under an applied crop hint may sum to less
/// than 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedLabel {
    #[serde(rename = "class")]
    pub label: String,
    pub confidence: f64,
}

/// Final verdict for one uploaded photo, serialized verbatim to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub predicted_class: String,
    pub confidence: f64,
    pub low_confidence: bool,
    pub message: String,
    pub top_predictions: Vec<RankedLabel>,
    pub cure: String,
    pub crop_hint: Option<String>,
    /// Inference wall time for this request; stamped by the predictor.
    #[serde(default)]
    pub inference_ms: u64,
}

/// Turn a model output vector into a [`Prediction`].
///
/// A recognized `crop_hint` (already trimmed and lowercased) zeroes every
/// probability outside its group before ranking; unknown hints are ignored
/// but still echoed back. The top-1 confidence is renormalized by the masked
/// sum when a hint applied and that sum is positive. The gate is a strict
/// `<` against `threshold`: a score exactly at the threshold passes.
pub fn postprocess(
    probs: &[f32],
    labels: &LabelSet,
    crops: &CropGroups,
    cures: &CureTable,
    crop_hint: Option<&str>,
    top_k: usize,
    threshold: f64,
) -> Result<Prediction> {
    if probs.len() != labels.len() {
        return Err(Error::Inference(format!(
            "model emitted {} scores for {} labels",
            probs.len(),
            labels.len()
        )));
    }

    let mut masked: Vec<f32> = probs.to_vec();
    let mut hint_applied = false;
    if let Some(hint) = crop_hint {
        if let Some(allowed) = crops.get(hint) {
            for (prob, label) in masked.iter_mut().zip(labels.iter()) {
                if !allowed.contains(label) {
                    *prob = 0.0;
                }
            }
            hint_applied = true;
        }
    }

    // Stable sort: equal scores keep label-file order.
    let mut order: Vec<usize> = (0..masked.len()).collect();
    order.sort_by(|&a, &b| {
        masked[b]
            .partial_cmp(&masked[a])
            .unwrap_or(Ordering::Equal)
    });
    let k = top_k.clamp(1, labels.len());

    let top_predictions: Vec<RankedLabel> = order[..k]
        .iter()
        .map(|&i| RankedLabel {
            label: labels.as_slice()[i].clone(),
            confidence: as_percent(masked[i] as f64),
        })
        .collect();

    let top1 = order[0];
    let top1_label = &labels.as_slice()[top1];
    let mut top1_conf = masked[top1] as f64;
    if hint_applied {
        let total: f32 = masked.iter().sum();
        if total > 0.0 {
            top1_conf /= total as f64;
        }
    }

    let prediction = if top1_conf < threshold {
        Prediction {
            predicted_class: UNCERTAIN_CLASS.to_string(),
            confidence: as_percent(top1_conf),
            low_confidence: true,
            message: MSG_UNCERTAIN.to_string(),
            top_predictions,
            cure: CURE_WITHHELD.to_string(),
            crop_hint: crop_hint.map(str::to_string),
            inference_ms: 0,
        }
    } else {
        Prediction {
            predicted_class: top1_label.clone(),
            confidence: as_percent(top1_conf),
            low_confidence: false,
            message: MSG_ACCEPTABLE.to_string(),
            top_predictions,
            cure: cures.lookup_or_fallback(top1_label).to_string(),
            crop_hint: crop_hint.map(str::to_string),
            inference_ms: 0,
        }
    };
    Ok(prediction)
}

/// Probability as a percentage, two decimals, pinned to [0, 100].
fn as_percent(p: f64) -> f64 {
    ((p * 100.0).clamp(0.0, 100.0) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cures::CURE_FALLBACK;

    fn labels() -> LabelSet {
        LabelSet::from_labels(vec![
            "Apple Scab".to_string(),
            "Apple Black Rot".to_string(),
            "Tomato Late Blight".to_string(),
            "Tomato healthy".to_string(),
        ])
        .unwrap()
    }

    fn crops() -> CropGroups {
        CropGroups::from_entries(vec![
            (
                "apple".to_string(),
                vec!["Apple Scab".to_string(), "Apple Black Rot".to_string()],
            ),
            (
                "tomato".to_string(),
                vec![
                    "Tomato Late Blight".to_string(),
                    "Tomato healthy".to_string(),
                ],
            ),
        ])
    }

    fn cures() -> CureTable {
        CureTable::from_entries(vec![(
            "apple scab".to_string(),
            "Apply captan sprays at green tip.".to_string(),
        )])
    }

    fn run(probs: &[f32], hint: Option<&str>, top_k: usize) -> Prediction {
        postprocess(
            probs,
            &labels(),
            &crops(),
            &cures(),
            hint,
            top_k,
            DEFAULT_CONFIDENCE_THRESHOLD,
        )
        .unwrap()
    }

    #[test]
    fn confident_prediction_reports_class_and_cure() {
        let p = run(&[0.85, 0.05, 0.05, 0.05], None, DEFAULT_TOP_K);
        assert_eq!(p.predicted_class, "Apple Scab");
        assert_eq!(p.confidence, 85.0);
        assert!(!p.low_confidence);
        assert_eq!(p.message, "Prediction confidence is acceptable.");
        assert_eq!(p.cure, "Apply captan sprays at green tip.");
        assert_eq!(p.crop_hint, None);
        assert_eq!(p.top_predictions.len(), 3);
        assert_eq!(p.top_predictions[0].label, "Apple Scab");
        assert_eq!(p.top_predictions[0].confidence, 85.0);
    }

    #[test]
    fn missing_cure_entry_falls_back() {
        let p = run(&[0.05, 0.85, 0.05, 0.05], None, 1);
        assert_eq!(p.predicted_class, "Apple Black Rot");
        assert_eq!(p.cure, CURE_FALLBACK);
    }

    #[test]
    fn low_confidence_withholds_class_and_cure() {
        let p = run(&[0.5, 0.3, 0.1, 0.1], None, DEFAULT_TOP_K);
        assert_eq!(p.predicted_class, "uncertain");
        assert_eq!(p.confidence, 50.0);
        assert!(p.low_confidence);
        assert_eq!(
            p.message,
            "Uncertain – upload a clear, close-up leaf photo in daylight."
        );
        assert_eq!(p.cure, "Not provided – confidence too low.");
        // the ranked list is still the real one
        assert_eq!(p.top_predictions[0].label, "Apple Scab");
        assert_eq!(p.top_predictions[0].confidence, 50.0);
    }

    #[test]
    fn crop_hint_masks_and_renormalizes_top1_only() {
        let p = run(&[0.2, 0.6, 0.15, 0.05], Some("apple"), 2);
        // masked sum is 0.8, so the top-1 reads 0.6 / 0.8 = 75%
        assert_eq!(p.predicted_class, "Apple Black Rot");
        assert_eq!(p.confidence, 75.0);
        assert!(!p.low_confidence);
        assert_eq!(p.crop_hint.as_deref(), Some("apple"));
        // ranked entries keep the raw masked values
        assert_eq!(p.top_predictions[0].confidence, 60.0);
        assert_eq!(p.top_predictions[1].label, "Apple Scab");
        assert_eq!(p.top_predictions[1].confidence, 20.0);
    }

    #[test]
    fn masked_labels_rank_below_group_members() {
        let p = run(&[0.1, 0.2, 0.6, 0.1], Some("apple"), 4);
        let ranked: Vec<&str> = p
            .top_predictions
            .iter()
            .map(|r| r.label.as_str())
            .collect();
        // zeroed labels trail in label-file order
        assert_eq!(
            ranked,
            vec![
                "Apple Black Rot",
                "Apple Scab",
                "Tomato Late Blight",
                "Tomato healthy"
            ]
        );
        assert_eq!(p.top_predictions[2].confidence, 0.0);
        assert_eq!(p.top_predictions[3].confidence, 0.0);
    }

    #[test]
    fn unknown_hint_is_ignored_but_echoed() {
        let p = run(&[0.85, 0.05, 0.05, 0.05], Some("durian"), 1);
        assert_eq!(p.predicted_class, "Apple Scab");
        assert_eq!(p.confidence, 85.0);
        assert_eq!(p.crop_hint.as_deref(), Some("durian"));
    }

    #[test]
    fn zero_masked_sum_keeps_raw_confidence() {
        let p = run(&[0.0, 0.0, 0.7, 0.3], Some("apple"), 2);
        assert_eq!(p.predicted_class, "uncertain");
        assert_eq!(p.confidence, 0.0);
        assert!(p.low_confidence);
        // every candidate ties at zero, so label-file order holds
        assert_eq!(p.top_predictions[0].label, "Apple Scab");
        assert_eq!(p.top_predictions[1].label, "Apple Black Rot");
    }

    #[test]
    fn ties_keep_label_file_order() {
        let p = run(&[0.25, 0.25, 0.25, 0.25], None, 4);
        let ranked: Vec<&str> = p
            .top_predictions
            .iter()
            .map(|r| r.label.as_str())
            .collect();
        assert_eq!(
            ranked,
            vec![
                "Apple Scab",
                "Apple Black Rot",
                "Tomato Late Blight",
                "Tomato healthy"
            ]
        );
    }

    #[test]
    fn top_k_is_clamped_to_label_count() {
        assert_eq!(run(&[0.85, 0.05, 0.05, 0.05], None, 0).top_predictions.len(), 1);
        assert_eq!(
            run(&[0.85, 0.05, 0.05, 0.05], None, 99).top_predictions.len(),
            4
        );
    }

    #[test]
    fn gate_is_strict_so_exact_threshold_passes() {
        let at = postprocess(
            &[0.75, 0.25, 0.0, 0.0],
            &labels(),
            &crops(),
            &cures(),
            None,
            1,
            0.75,
        )
        .unwrap();
        assert!(!at.low_confidence);

        let below = postprocess(
            &[0.749, 0.251, 0.0, 0.0],
            &labels(),
            &crops(),
            &cures(),
            None,
            1,
            0.75,
        )
        .unwrap();
        assert!(below.low_confidence);
    }

    #[test]
    fn confidences_round_to_two_decimals() {
        let p = run(&[0.876543, 0.123457, 0.0, 0.0], None, 2);
        assert_eq!(p.confidence, 87.65);
        assert_eq!(p.top_predictions[1].confidence, 12.35);
    }

    #[test]
    fn score_arity_mismatch_is_an_inference_error() {
        let err = postprocess(
            &[0.5, 0.5],
            &labels(),
            &crops(),
            &cures(),
            None,
            1,
            DEFAULT_CONFIDENCE_THRESHOLD,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
    }

    #[test]
    fn serialized_field_names_match_the_wire_format() {
        let p = run(&[0.85, 0.05, 0.05, 0.05], None, 1);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["predicted_class"], "Apple Scab");
        assert_eq!(json["top_predictions"][0]["class"], "Apple Scab");
        assert!(json["crop_hint"].is_null());
    }
}

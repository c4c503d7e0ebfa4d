//! HTTP request handlers
//!
//! Implements the health and prediction endpoints. All prediction work is
//! delegated to `farmwise_core::Predictor`; handlers translate between the
//! wire format and the core error types.

use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::{debug, error, warn};

use farmwise_core::{Error as CoreError, Prediction, DEFAULT_TOP_K};

use crate::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    service: String,
    classes: usize,
    input_shape: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: String,
}

/// Exact client-facing message for a request with no usable image part.
const MISSING_IMAGE: &str = "Send a multipart/form-data POST with key 'image'.";

type PredictResult = Result<Json<Prediction>, (StatusCode, Json<ErrorResponse>)>;

fn error_response(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET / - Service identity and readiness.
///
/// Never fails; before the model is loaded it reports zero classes and a
/// pending input shape so deploy probes can distinguish "up" from "ready".
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    match state.predictor() {
        Some(p) => Json(HealthResponse {
            status: "ok".to_string(),
            service: state.service_name.clone(),
            classes: p.class_count(),
            input_shape: p.input_shape(),
        }),
        None => Json(HealthResponse {
            status: "loading".to_string(),
            service: state.service_name.clone(),
            classes: 0,
            input_shape: "pending".to_string(),
        }),
    }
}

// ============================================================================
// Prediction Endpoint
// ============================================================================

/// OPTIONS /predict - CORS preflight. The headers themselves come from the
/// response layers in the router.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// POST /predict - multipart upload with an `image` part and optional
/// `crop` and `topk` fields.
pub async fn predict(State(state): State<AppState>, request: Request) -> PredictResult {
    let Some(predictor) = state.predictor().cloned() else {
        return Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Model is still loading; retry shortly.",
        ));
    };

    // A non-multipart body gets the same 400 as a missing image part.
    let mut multipart = match Multipart::from_request(request, &()).await {
        Ok(multipart) => multipart,
        Err(_) => return Err(error_response(StatusCode::BAD_REQUEST, MISSING_IMAGE)),
    };

    let mut image: Option<Vec<u8>> = None;
    let mut crop: Option<String> = None;
    let mut topk: Option<String> = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("unreadable multipart body: {e}");
                return Err(error_response(StatusCode::BAD_REQUEST, MISSING_IMAGE));
            }
        };
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "image" => match field.bytes().await {
                Ok(bytes) => image = Some(bytes.to_vec()),
                Err(e) => {
                    warn!("failed reading image field: {e}");
                    return Err(error_response(StatusCode::BAD_REQUEST, MISSING_IMAGE));
                }
            },
            "crop" => crop = field.text().await.ok(),
            "topk" => topk = field.text().await.ok(),
            _ => {}
        }
    }
    let Some(image) = image else {
        return Err(error_response(StatusCode::BAD_REQUEST, MISSING_IMAGE));
    };

    // Unparseable counts fall back to the default; the ranking clamps to the
    // label count.
    let top_k = topk
        .as_deref()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map(|v| v.max(1) as usize)
        .unwrap_or(DEFAULT_TOP_K);

    let result =
        tokio::task::spawn_blocking(move || predictor.predict(&image, crop.as_deref(), top_k))
            .await;

    match result {
        Ok(Ok(prediction)) => {
            debug!(
                class = %prediction.predicted_class,
                confidence = prediction.confidence,
                inference_ms = prediction.inference_ms,
                "prediction served"
            );
            Ok(Json(prediction))
        }
        Ok(Err(CoreError::ImageDecode(detail))) => Err(error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Image processing failed: {detail}"),
        )),
        Ok(Err(e)) => {
            error!("inference failed: {e}");
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
            ))
        }
        Err(e) => {
            error!("prediction task panicked: {e}");
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "prediction task failed",
            ))
        }
    }
}

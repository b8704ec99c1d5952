//! Listener feedback and the aggregated statistics read back from it.

use super::error::ApiError;
use super::state::GuardedTelemetryStore;
use crate::telemetry::{FeedbackPayload, TelemetrySnapshot};
use axum::{body::Bytes, extract::State, Json};
use serde_json::{json, Value};
use tracing::debug;

pub async fn post_feedback(
    State(telemetry): State<GuardedTelemetryStore>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let root: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON: {}", e)))?;
    let feedback = FeedbackPayload::from_json(&root)
        .ok_or_else(|| ApiError::BadRequest("Feedback must be a JSON object.".to_string()))?;
    debug!(
        "Feedback for session {:?} ({} items)",
        feedback.session_id,
        feedback.items.len()
    );

    telemetry.record_feedback(feedback.liked, feedback.rating, &feedback.items);
    Ok(Json(json!({ "ok": true })))
}

pub async fn get_stats(State(telemetry): State<GuardedTelemetryStore>) -> Json<TelemetrySnapshot> {
    Json(telemetry.snapshot())
}

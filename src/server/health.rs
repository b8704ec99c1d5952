use super::state::GuardedInferenceSettings;
use crate::inference::HealthReport;
use axum::{extract::State, Json};

/// Reports which of the configured inference paths exist on disk.
pub async fn get_health(State(settings): State<GuardedInferenceSettings>) -> Json<HealthReport> {
    Json(HealthReport::from_settings(&settings))
}

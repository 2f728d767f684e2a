use axum::{extract::State, response::Json};

use crate::models::HealthCheck;
use crate::services::EnergyService;

/// Always answers 200; a failed meter probe is reported as `degraded`.
pub async fn health_check(State(service): State<EnergyService>) -> Json<HealthCheck> {
    Json(service.health().await)
}

use axum::{
    extract::{Query, State},
    response::Json,
};

use crate::error::Result;
use crate::models::{EnergyData, RegisterListing, SummaryQuery};
use crate::services::{EnergyService, SummaryReport};

pub async fn get_instant(State(service): State<EnergyService>) -> Result<Json<EnergyData>> {
    let reading = service.instant_reading().await?;
    Ok(Json(reading))
}

pub async fn get_debug_registers(State(service): State<EnergyService>) -> Json<RegisterListing> {
    Json(service.register_listing().await)
}

pub async fn get_summary(
    State(service): State<EnergyService>,
    Query(params): Query<SummaryQuery>,
) -> Result<Json<SummaryReport>> {
    let report = service.summary(&params.start, &params.end).await?;
    Ok(Json(report))
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::meter::RegisterMap;
use crate::services::summary::round_to;

/// Number of characters of raw XML echoed by the register listing.
pub const RAW_XML_SAMPLE_CHARS: usize = 1000;

/// Instantaneous view over one `?inst` read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyData {
    pub meter_name: String,
    pub timestamp: DateTime<Utc>,
    pub current_power: f64,
    pub solar_generation: f64,
    pub grid_import: f64,
    pub grid_export: f64,
    pub raw_data: RegisterMap,
}

impl EnergyData {
    /// Split the grid register into import (positive) and export (negative) flow.
    pub fn from_registers(
        meter_name: &str,
        registers: RegisterMap,
        grid_register: &str,
        solar_register: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let grid = registers.get(grid_register).copied().unwrap_or(0.0);
        let solar = solar_register
            .and_then(|name| registers.get(name))
            .map(|value| value.abs())
            .unwrap_or(0.0);

        Self {
            meter_name: meter_name.to_string(),
            timestamp,
            current_power: round_to(grid.abs(), 2),
            solar_generation: solar,
            grid_import: if grid > 0.0 { grid } else { 0.0 },
            grid_export: if grid < 0.0 { grid.abs() } else { 0.0 },
            raw_data: registers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterListing {
    pub available_registers: Vec<String>,
    pub register_values: RegisterMap,
    pub raw_xml_sample: String,
}

impl RegisterListing {
    pub fn new(registers: RegisterMap, raw_xml: &str) -> Self {
        Self {
            available_registers: registers.keys().cloned().collect(),
            register_values: registers,
            raw_xml_sample: raw_xml.chars().take(RAW_XML_SAMPLE_CHARS).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub meter_connection: bool,
    pub timestamp: DateTime<Utc>,
}

impl HealthCheck {
    pub fn new(meter_connection: bool, timestamp: DateTime<Utc>) -> Self {
        let status = if meter_connection {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };
        Self {
            status,
            meter_connection,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryQuery {
    pub start: String,
    pub end: String,
}

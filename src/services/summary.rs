use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize, Serializer};
use tracing::{info, warn};

use crate::meter::MeterApi;

/// Message carried by the error marker when a summary cannot be computed.
pub const TOTALS_UNAVAILABLE: &str = "Unable to compute totals";

/// Tariff used to price consumed energy.
#[derive(Debug, Clone, PartialEq)]
pub struct Tariff {
    pub rate_per_kwh: f64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Period {
    #[serde(serialize_with = "serialize_with_offset")]
    pub start: DateTime<FixedOffset>,
    #[serde(serialize_with = "serialize_with_offset")]
    pub end: DateTime<FixedOffset>,
}

/// RFC 3339 keeping a numeric offset, so UTC renders as `+00:00` rather than `Z`.
fn serialize_with_offset<S: Serializer>(
    ts: &DateTime<FixedOffset>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub currency: String,
    pub amount: f64,
    pub tariff_per_kwh: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub period: Period,
    pub energy_used_kwh: f64,
    pub cost_estimate: CostEstimate,
}

/// Result of a summary computation. Callers must check for `Unavailable`
/// before trusting any numbers; zero usage is a valid `Usage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SummaryReport {
    Usage(UsageSummary),
    Unavailable { error: String },
}

impl SummaryReport {
    pub fn unavailable() -> Self {
        SummaryReport::Unavailable {
            error: TOTALS_UNAVAILABLE.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SummaryReport::Unavailable { .. })
    }
}

/// Estimates consumption by bracketing two cumulative totals reads around a settling interval.
///
/// The requested period only labels the report. The delta over the settling
/// interval is reported as-is and is not scaled to the period length.
pub struct SummaryEngine {
    meter: Arc<dyn MeterApi>,
    register: String,
    tariff: Tariff,
    settle: Duration,
}

impl SummaryEngine {
    pub fn new(
        meter: Arc<dyn MeterApi>,
        register: impl Into<String>,
        tariff: Tariff,
        settle: Duration,
    ) -> Self {
        Self {
            meter,
            register: register.into(),
            tariff,
            settle,
        }
    }

    pub fn tariff(&self) -> &Tariff {
        &self.tariff
    }

    pub async fn compute(&self, period: Period) -> SummaryReport {
        let first = self.meter.totals().await;
        tokio::time::sleep(self.settle).await;
        let second = self.meter.totals().await;

        if first.is_empty() || second.is_empty() {
            warn!(
                first_empty = first.is_empty(),
                second_empty = second.is_empty(),
                "Totals sample missing, summary unavailable"
            );
            return SummaryReport::unavailable();
        }

        let start_total = first.get(&self.register).copied().unwrap_or(0.0);
        let end_total = second.get(&self.register).copied().unwrap_or(0.0);
        let energy_used_kwh = energy_delta_kwh(start_total, end_total);
        let amount = cost(energy_used_kwh, self.tariff.rate_per_kwh);

        info!(
            register = %self.register,
            start_total,
            end_total,
            energy_used_kwh,
            amount,
            "Computed energy summary"
        );

        SummaryReport::Usage(UsageSummary {
            period,
            energy_used_kwh,
            cost_estimate: CostEstimate {
                currency: self.tariff.currency.clone(),
                amount,
                tariff_per_kwh: self.tariff.rate_per_kwh,
            },
        })
    }
}

/// Watt-hour totals to a non-negative kWh delta, rounded to 3 decimals.
/// A counter that went backwards (meter reset) counts as zero.
pub fn energy_delta_kwh(start_wh: f64, end_wh: f64) -> f64 {
    let delta_wh = (end_wh - start_wh).max(0.0);
    round_to(delta_wh / 1000.0, 3)
}

pub fn cost(energy_kwh: f64, rate_per_kwh: f64) -> f64 {
    round_to(energy_kwh * rate_per_kwh, 2)
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use tracing::{debug, warn};

use super::summary::{Period, SummaryEngine, SummaryReport, Tariff};
use crate::cache::ResultCache;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::meter::{Endpoint, MeterApi};
use crate::models::{EnergyData, HealthCheck, RegisterListing};

/// How the instantaneous registers are presented.
#[derive(Debug, Clone)]
pub struct ReadingSettings {
    pub meter_name: String,
    pub grid_register: String,
    pub solar_register: Option<String>,
}

/// The four meter-backed operations exposed over HTTP.
#[derive(Clone)]
pub struct EnergyService {
    meter: Arc<dyn MeterApi>,
    engine: Arc<SummaryEngine>,
    cache: Arc<ResultCache<SummaryReport>>,
    settings: Arc<ReadingSettings>,
}

impl EnergyService {
    pub fn new(
        meter: Arc<dyn MeterApi>,
        engine: Arc<SummaryEngine>,
        cache: Arc<ResultCache<SummaryReport>>,
        settings: ReadingSettings,
    ) -> Self {
        Self {
            meter,
            engine,
            cache,
            settings: Arc::new(settings),
        }
    }

    /// Wire the engine, cache and settings from configuration around `meter`.
    pub fn from_config(config: &Config, meter: Arc<dyn MeterApi>) -> Self {
        let tariff = Tariff {
            rate_per_kwh: config.tariff.rate_per_kwh,
            currency: config.tariff.currency.clone(),
        };
        let engine = SummaryEngine::new(
            meter.clone(),
            config.meter.grid_register.clone(),
            tariff,
            config.summary.settle_interval(),
        );
        let cache = ResultCache::new(config.summary.cache_ttl());
        let settings = ReadingSettings {
            meter_name: config.meter.name.clone(),
            grid_register: config.meter.grid_register.clone(),
            solar_register: config.meter.solar_register.clone(),
        };

        Self::new(meter, Arc::new(engine), Arc::new(cache), settings)
    }

    pub fn cache(&self) -> &ResultCache<SummaryReport> {
        &self.cache
    }

    pub async fn instant_reading(&self) -> Result<EnergyData> {
        let registers = self.meter.instantaneous().await;
        if registers.is_empty() {
            return Err(AppError::MeterUnavailable("No data from meter".to_string()));
        }

        Ok(EnergyData::from_registers(
            &self.settings.meter_name,
            registers,
            &self.settings.grid_register,
            self.settings.solar_register.as_deref(),
            Utc::now(),
        ))
    }

    pub async fn register_listing(&self) -> RegisterListing {
        let registers = self.meter.instantaneous().await;
        let raw_xml = match self.meter.raw_document(Endpoint::Instantaneous).await {
            Ok(xml) => xml,
            Err(e) => {
                warn!(error = %e, "Raw XML sample unavailable");
                String::new()
            }
        };

        RegisterListing::new(registers, &raw_xml)
    }

    /// Summary for the labelled period, memoized per exact `(start, end)` pair.
    pub async fn summary(&self, start: &str, end: &str) -> Result<SummaryReport> {
        let key = format!("{}_{}", start, end);
        if let Some(report) = self.cache.get(&key).await {
            debug!(%key, "Serving summary from cache");
            return Ok(report);
        }

        let period = Period {
            start: parse_timestamp(start)?,
            end: parse_timestamp(end)?,
        };
        let report = self.engine.compute(period).await;
        self.cache.set(key, report.clone()).await;
        Ok(report)
    }

    pub async fn health(&self) -> HealthCheck {
        let meter_connection = match self.meter.probe().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Meter health probe failed");
                false
            }
        };
        HealthCheck::new(meter_connection, Utc::now())
    }
}

/// Layouts tried after RFC 3339, once `normalize_iso` has run. `%#z` takes `+02`, `+0200` and `+02:00`.
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M%#z"];
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// ISO-8601 timestamp with or without an offset; a naive date or date/time is read as UTC.
///
/// Accepts `Z`, hour-only or colon-less offsets, a space instead of `T`, and times
/// given to the hour or minute.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>> {
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts);
    }

    let normalized = normalize_iso(raw);
    for format in OFFSET_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(&normalized, format) {
            return Ok(ts);
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, format) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }
    if let Some(naive) = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(naive.and_utc().fixed_offset());
    }

    Err(AppError::InvalidInput(format!(
        "Invalid ISO-8601 timestamp: {}",
        raw
    )))
}

/// `Z` becomes `+00:00`, a space date/time separator becomes `T`, and an
/// hour-only clock gets `:00` so chrono sees a minute field.
fn normalize_iso(raw: &str) -> String {
    let mut out = match raw.strip_suffix(['Z', 'z']) {
        Some(head) => format!("{}+00:00", head),
        None => raw.to_string(),
    };

    if out.as_bytes().get(10) == Some(&b' ') {
        out.replace_range(10..11, "T");
    }

    if let Some((date, time)) = out.split_once('T') {
        let clock_end = time.find(['+', '-']).unwrap_or(time.len());
        let (clock, offset) = time.split_at(clock_end);
        if !clock.is_empty() && !clock.contains(':') {
            return format!("{}T{}:00{}", date, clock, offset);
        }
    }

    out
}

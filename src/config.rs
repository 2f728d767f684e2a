use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Origins a local dashboard build is served from; always allowed on top of the configured list.
const DEV_ORIGINS: [&str; 4] = [
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "http://localhost:5173",
    "http://127.0.0.1:5173",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub meter: MeterConfig,
    #[serde(default)]
    pub tariff: TariffConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_meter_name")]
    pub name: String,
    /// Register read for the import/export split and the totals delta.
    #[serde(default = "default_grid_register")]
    pub grid_register: String,
    #[serde(default)]
    pub solar_register: Option<String>,
    #[serde(default = "default_data_timeout_secs")]
    pub data_timeout_secs: u64,
    #[serde(default = "default_health_timeout_secs")]
    pub health_timeout_secs: u64,
    #[serde(default = "default_debug_timeout_secs")]
    pub debug_timeout_secs: u64,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            username: String::new(),
            password: String::new(),
            name: default_meter_name(),
            grid_register: default_grid_register(),
            solar_register: None,
            data_timeout_secs: default_data_timeout_secs(),
            health_timeout_secs: default_health_timeout_secs(),
            debug_timeout_secs: default_debug_timeout_secs(),
        }
    }
}

impl MeterConfig {
    pub fn data_timeout(&self) -> Duration {
        Duration::from_secs(self.data_timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    pub fn debug_timeout(&self) -> Duration {
        Duration::from_secs(self.debug_timeout_secs)
    }
}

fn default_meter_name() -> String {
    "Bertha House".into()
}

fn default_grid_register() -> String {
    "Main Incomer".into()
}

fn default_data_timeout_secs() -> u64 {
    10
}

fn default_health_timeout_secs() -> u64 {
    3
}

fn default_debug_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TariffConfig {
    #[serde(default = "default_rate_per_kwh")]
    pub rate_per_kwh: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            rate_per_kwh: default_rate_per_kwh(),
            currency: default_currency(),
        }
    }
}

fn default_rate_per_kwh() -> f64 {
    1.99
}

fn default_currency() -> String {
    "ZAR".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl SummaryConfig {
    pub fn settle_interval(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

fn default_settle_ms() -> u64 {
    1000
}

fn default_cache_ttl_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

impl ApiConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Configured origins followed by the local development origins, without duplicates.
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins: Vec<String> = Vec::new();
        let configured = self.cors_origins.iter().map(|o| o.trim());
        for origin in configured.chain(DEV_ORIGINS) {
            if !origin.is_empty() && !origins.iter().any(|o| o == origin) {
                origins.push(origin.to_string());
            }
        }
        origins
    }
}

fn default_api_host() -> String {
    "0.0.0.0".into()
}

fn default_api_port() -> u16 {
    8000
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".into()]
}

impl Config {
    /// Load YAML from disk, substitute `$(VAR)`/`${VAR}` with env vars, apply env overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let expanded = expand_env_placeholders(&raw)?;
        let mut config: Self = serde_yaml::from_str(&expanded)?;

        config.apply_env_overrides()?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Build the configuration purely from defaults and environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self {
            meter: MeterConfig::default(),
            tariff: TariffConfig::default(),
            summary: SummaryConfig::default(),
            api: ApiConfig::default(),
        };

        config.apply_env_overrides()?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("EGAUGE_HOST") {
            self.meter.host = host;
        }
        if let Ok(user) = std::env::var("EGAUGE_USER") {
            self.meter.username = user;
        }
        if let Ok(password) = std::env::var("EGAUGE_PASSWORD") {
            self.meter.password = password;
        }
        if let Ok(name) = std::env::var("EGAUGE_METER_NAME") {
            self.meter.name = name;
        }
        if let Ok(rate) = std::env::var("ENERGY_TARIFF_PER_KWH") {
            self.tariff.rate_per_kwh = rate.trim().parse().map_err(|_| {
                AppError::Config(format!("ENERGY_TARIFF_PER_KWH is not a number: {}", rate))
            })?;
        }
        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            self.api.cors_origins = origins.split(',').map(|o| o.trim().to_string()).collect();
        }
        if let Ok(host) = std::env::var("API_HOST") {
            self.api.host = host;
        }
        if let Ok(port) = std::env::var("API_PORT") {
            self.api.port = port
                .trim()
                .parse()
                .map_err(|_| AppError::Config(format!("API_PORT is not a port: {}", port)))?;
        }
        Ok(())
    }

    fn normalize(&mut self) {
        self.meter.host = self.meter.host.trim().trim_end_matches('/').to_string();
    }

    fn validate(&self) -> Result<()> {
        if self.meter.host.is_empty() {
            return Err(AppError::Config(
                "meter.host (EGAUGE_HOST) must be set".to_string(),
            ));
        }

        if !self.meter.host.starts_with("http://") && !self.meter.host.starts_with("https://") {
            return Err(AppError::Config(format!(
                "meter.host must start with http:// or https://, got {}",
                self.meter.host
            )));
        }

        if self.meter.grid_register.trim().is_empty() {
            return Err(AppError::Config(
                "meter.grid_register cannot be empty".to_string(),
            ));
        }

        if !self.tariff.rate_per_kwh.is_finite() || self.tariff.rate_per_kwh < 0.0 {
            return Err(AppError::Config(format!(
                "tariff.rate_per_kwh must be a non-negative number, got {}",
                self.tariff.rate_per_kwh
            )));
        }

        if self.summary.cache_ttl_secs == 0 {
            return Err(AppError::Config(
                "summary.cache_ttl_secs must be greater than 0".to_string(),
            ));
        }

        if self.api.port == 0 {
            return Err(AppError::Config("api.port cannot be 0".to_string()));
        }

        Ok(())
    }
}

/// Expand `$(VAR)` and `${VAR}` placeholders from the environment; `$$` is a literal `$`.
fn expand_env_placeholders(input: &str) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        let close = match chars.peek() {
            Some('$') => {
                chars.next();
                out.push('$');
                continue;
            }
            Some('(') => ')',
            Some('{') => '}',
            _ => {
                out.push('$');
                continue;
            }
        };
        chars.next();

        let mut name = String::new();
        let mut terminated = false;
        for ch in chars.by_ref() {
            if ch == close {
                terminated = true;
                break;
            }
            name.push(ch);
        }
        if !terminated {
            return Err(AppError::Config(format!(
                "unterminated env placeholder: missing '{}'",
                close
            )));
        }

        let value = std::env::var(&name)
            .map_err(|_| AppError::Config(format!("missing environment variable: {}", name)))?;
        out.push_str(&value);
    }

    Ok(out)
}

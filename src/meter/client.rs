use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use digest_auth::AuthContext;
use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{Response, StatusCode, Url};
use thiserror::Error;
use tracing::{error, info};

use super::{parse_registers, RegisterMap};
use crate::config::MeterConfig;

const CGI_PATH: &str = "/cgi-bin/egauge";

/// The two register documents served by the meter CGI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Instantaneous register readings (`?inst`).
    Instantaneous,
    /// Cumulative register totals (`?tot`).
    Totals,
}

impl Endpoint {
    pub fn query(self) -> &'static str {
        match self {
            Endpoint::Instantaneous => "inst",
            Endpoint::Totals => "tot",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Instantaneous => f.write_str("instantaneous"),
            Endpoint::Totals => f.write_str("totals"),
        }
    }
}

/// Why a meter read produced no data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("meter returned HTTP {0}")]
    Status(u16),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("digest authentication failed: {0}")]
    Auth(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Transport(e.to_string())
    }
}

/// Read access to an eGauge meter.
///
/// `MeterClient` talks to the real device; tests substitute their own implementation.
#[async_trait]
pub trait MeterApi: Send + Sync {
    /// Fetch and parse one register document, bounded by the data timeout.
    async fn read_registers(&self, endpoint: Endpoint) -> Result<RegisterMap, FetchError>;

    /// Fetch the raw XML of one register document, bounded by the debug timeout.
    async fn raw_document(&self, endpoint: Endpoint) -> Result<String, FetchError>;

    /// Quick connectivity check, bounded by the health timeout.
    async fn probe(&self) -> Result<(), FetchError>;

    /// Instantaneous registers, or an empty map when the read failed.
    async fn instantaneous(&self) -> RegisterMap {
        self.read_registers(Endpoint::Instantaneous)
            .await
            .unwrap_or_else(|e| {
                error!(error = %e, "Instantaneous fetch failed");
                RegisterMap::new()
            })
    }

    /// Cumulative totals, or an empty map when the read failed.
    async fn totals(&self) -> RegisterMap {
        self.read_registers(Endpoint::Totals)
            .await
            .unwrap_or_else(|e| {
                error!(error = %e, "Totals fetch failed");
                RegisterMap::new()
            })
    }
}

pub struct MeterClient {
    http: reqwest::Client,
    host: String,
    username: String,
    password: String,
    data_timeout: Duration,
    health_timeout: Duration,
    debug_timeout: Duration,
}

impl MeterClient {
    pub fn new(config: &MeterConfig) -> crate::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("egauge-api/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            host: config.host.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            data_timeout: config.data_timeout(),
            health_timeout: config.health_timeout(),
            debug_timeout: config.debug_timeout(),
        })
    }

    pub fn endpoint_url(&self, endpoint: Endpoint) -> String {
        format!("{}{}?{}", self.host, CGI_PATH, endpoint.query())
    }

    /// GET the endpoint, answering a digest challenge once if the meter issues one.
    async fn get(&self, endpoint: Endpoint) -> Result<Response, FetchError> {
        let url = self.endpoint_url(endpoint);
        info!(%url, "Fetching {} data", endpoint);

        let response = self.http.get(&url).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let challenge = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| FetchError::Auth("no WWW-Authenticate challenge".to_string()))?;
        let mut prompt =
            digest_auth::parse(challenge).map_err(|e| FetchError::Auth(e.to_string()))?;

        let uri = request_uri(&url)?;
        let context = AuthContext::new(self.username.as_str(), self.password.as_str(), uri);
        let answer = prompt
            .respond(&context)
            .map_err(|e| FetchError::Auth(e.to_string()))?;

        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, answer.to_header_string())
            .send()
            .await?;
        Ok(response)
    }

    /// One read of `endpoint`. Both handshake legs and the body share the `timeout` deadline.
    async fn fetch(&self, endpoint: Endpoint, timeout: Duration) -> Result<String, FetchError> {
        match tokio::time::timeout(timeout, self.fetch_body(endpoint)).await {
            Ok(result) => result,
            Err(_) => {
                error!(?timeout, "Meter request for {} data timed out", endpoint);
                Err(FetchError::Transport(format!(
                    "request timed out after {}s",
                    timeout.as_secs_f64()
                )))
            }
        }
    }

    async fn fetch_body(&self, endpoint: Endpoint) -> Result<String, FetchError> {
        let response = self.get(endpoint).await?;

        let status = response.status();
        if status != StatusCode::OK {
            error!(status = status.as_u16(), "Meter returned {} for {} data", status, endpoint);
            return Err(FetchError::Status(status.as_u16()));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl MeterApi for MeterClient {
    async fn read_registers(&self, endpoint: Endpoint) -> Result<RegisterMap, FetchError> {
        let body = self.fetch(endpoint, self.data_timeout).await?;
        Ok(parse_registers(&body))
    }

    async fn raw_document(&self, endpoint: Endpoint) -> Result<String, FetchError> {
        self.fetch(endpoint, self.debug_timeout).await
    }

    async fn probe(&self) -> Result<(), FetchError> {
        self.fetch(Endpoint::Instantaneous, self.health_timeout)
            .await
            .map(|_| ())
    }
}

/// Path and query of `url`, as quoted in the digest `uri` field.
fn request_uri(url: &str) -> Result<String, FetchError> {
    let parsed = Url::parse(url).map_err(|e| FetchError::Transport(e.to_string()))?;
    Ok(match parsed.query() {
        Some(query) => format!("{}?{}", parsed.path(), query),
        None => parsed.path().to_string(),
    })
}

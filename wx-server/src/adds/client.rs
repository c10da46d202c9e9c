//! Data server HTTP client.
//!
//! Fetches raw XML bodies; decoding happens later, once every request of a
//! fetch cycle has settled.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;

use super::error::FetchError;
use super::query::QuerySpec;

/// Default endpoint of the ADDS data server.
const DEFAULT_BASE_URL: &str =
    "https://www.aviationweather.gov/adds/dataserver_current/httpparam";

/// Default look-back window for reports, in hours.
const DEFAULT_HOURS_BEFORE_NOW: u32 = 1;

/// A source of raw weather feed bodies.
///
/// This abstraction allows the fetch cycle to be tested with a mock source.
/// Implementations must tolerate many concurrent calls and resolve each call
/// exactly once.
pub trait WeatherSource: Send + Sync + 'static {
    /// Fetch the response body for one query.
    fn fetch(&self, query: &QuerySpec) -> impl Future<Output = Result<Bytes, FetchError>> + Send;
}

/// Configuration for the data server client.
#[derive(Debug, Clone)]
pub struct AddsConfig {
    /// Base URL for the server
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// How far back to look for reports
    pub hours_before_now: u32,
}

impl AddsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_hours_before_now(mut self, hours: u32) -> Self {
        self.hours_before_now = hours;
        self
    }
}

impl Default for AddsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            hours_before_now: DEFAULT_HOURS_BEFORE_NOW,
        }
    }
}

/// HTTP client for the data server.
#[derive(Debug, Clone)]
pub struct AddsClient {
    http: reqwest::Client,
    base_url: String,
    hours_before_now: u32,
}

impl AddsClient {
    pub fn new(config: AddsConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("wx-server/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url,
            hours_before_now: config.hours_before_now,
        })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl WeatherSource for AddsClient {
    async fn fetch(&self, query: &QuerySpec) -> Result<Bytes, FetchError> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&query.query_params(self.hours_before_now))
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Api {
                status: status.as_u16(),
                message: body.chars().take(500).collect(),
            });
        }

        Ok(response.bytes().await?)
    }
}

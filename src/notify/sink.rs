//! External report sink abstraction and its HTTP implementation.

use crate::notify::error::DeliveryError;
use crate::notify::report::Report;
use anyhow::{bail, Context, Result};
use futures::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_SINK_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

pub type SinkFuture<'a> = BoxFuture<'a, Result<(), DeliveryError>>;

/// Destination for progress reports outside the process.
pub trait ReportSink: Send + Sync {
    /// Performs exactly one delivery attempt.
    fn deliver<'a>(&'a self, report: &'a Report) -> SinkFuture<'a>;
}

impl<T: ReportSink + ?Sized> ReportSink for Arc<T> {
    fn deliver<'a>(&'a self, report: &'a Report) -> SinkFuture<'a> {
        (**self).deliver(report)
    }
}

/// Location and credentials of the HTTP reporting endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
    endpoint: String,
    sink_id: String,
    token: Option<String>,
    request_timeout: Duration,
}

impl SinkConfig {
    pub fn new(
        endpoint: impl Into<String>,
        sink_id: impl Into<String>,
        token: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let config = Self {
            endpoint: endpoint.into().trim().trim_end_matches('/').to_owned(),
            sink_id: sink_id.into().trim().trim_matches('/').to_owned(),
            token: token
                .map(|token| token.trim().to_owned())
                .filter(|token| !token.is_empty()),
            request_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn sink_id(&self) -> &str {
        &self.sink_id
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Full URL reports are posted to.
    pub fn url(&self) -> String {
        format!("{}/{}", self.endpoint, self.sink_id)
    }

    fn validate(&self) -> Result<()> {
        let endpoint = Url::parse(&self.endpoint).with_context(|| {
            format!(
                "sink endpoint '{}' is not a valid http:// or https:// URL",
                self.endpoint
            )
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            bail!("sink endpoint must start with http:// or https://");
        }
        if endpoint.host_str().map_or(true, str::is_empty) {
            bail!("sink endpoint is missing a host");
        }
        if self.sink_id.is_empty() {
            bail!("sink id cannot be empty");
        }
        if self.request_timeout.is_zero() {
            bail!("sink request timeout must be greater than 0");
        }
        Ok(())
    }
}

/// Posts each report as a JSON document. A 2xx answer without an `error`
/// field counts as acknowledged.
#[derive(Debug, Clone)]
pub struct HttpReportSink {
    client: reqwest::Client,
    url: String,
}

impl HttpReportSink {
    pub fn new(config: &SinkConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = config.token() {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .context("failed to build Authorization header")?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()
            .context("failed to build report sink HTTP client")?;

        Ok(Self {
            client,
            url: config.url(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(&self, report: &Report) -> Result<(), DeliveryError> {
        let body = report.to_json().map_err(|err| DeliveryError::Encode {
            message: err.to_string(),
        })?;

        let response = self.client.post(&self.url).body(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        match reported_error(&bytes) {
            Some(message) => Err(DeliveryError::Reported { message }),
            None => Ok(()),
        }
    }
}

impl ReportSink for HttpReportSink {
    fn deliver<'a>(&'a self, report: &'a Report) -> SinkFuture<'a> {
        Box::pin(self.post(report))
    }
}

/// Extracts a non-null `error` field from an acknowledged response body.
fn reported_error(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    match value.get("error")? {
        Value::Null => None,
        Value::String(message) => Some(message.clone()),
        Value::Object(map) => Some(
            map.get("message")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| Value::Object(map.clone()).to_string()),
        ),
        other => Some(other.to_string()),
    }
}

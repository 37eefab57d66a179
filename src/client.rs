use crate::{config::ClientConfig, query::QueryResponse};
use chrono::{DateTime, Duration, Utc};
use log::debug;
use std::time;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("error building metrics client")]
    Build(reqwest::Error),
    #[error("error sending metrics request")]
    Request(#[from] reqwest::Error),
    #[error("metrics endpoint returned HTTP {0}")]
    Status(u16),
    #[error("error decoding metrics response")]
    Decode(#[from] serde_json::Error),
}

/// Window covered by a range query, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// The `duration` leading up to `end`.
    pub fn ending_at(end: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            start: end - duration,
            end,
        }
    }

    pub fn last(duration: Duration) -> Self {
        Self::ending_at(Utc::now(), duration)
    }
}

pub trait MetricsSource: Send + Sync {
    fn query(&self, query: &str) -> Result<QueryResponse, ClientError>;
    fn query_range(
        &self,
        query: &str,
        range: TimeRange,
        step: i64,
    ) -> Result<QueryResponse, ClientError>;
}

/// Client for the metrics endpoints proxied by the dashboard server.
pub struct ApiClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(time::Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self, resource: &str) -> String {
        format!("{}/{}", self.base_url, resource)
    }

    fn get(&self, resource: &str, params: &[(&str, String)]) -> Result<QueryResponse, ClientError> {
        let url = self.endpoint(resource);
        debug!("GET {} {:?}", url, params);
        let response = self.client.get(&url).query(params).send()?;
        let status = response.status();
        let body = response.bytes()?;
        decode_response(status.as_u16(), status.is_success(), &body)
    }
}

impl MetricsSource for ApiClient {
    fn query(&self, query: &str) -> Result<QueryResponse, ClientError> {
        self.get("metrics/query", &[("query", query.to_string())])
    }

    fn query_range(
        &self,
        query: &str,
        range: TimeRange,
        step: i64,
    ) -> Result<QueryResponse, ClientError> {
        self.get("metrics/query_range", &range_params(query, range, step))
    }
}

pub fn range_params(query: &str, range: TimeRange, step: i64) -> Vec<(&'static str, String)> {
    vec![
        ("query", query.to_string()),
        ("start", range.start.timestamp().to_string()),
        ("end", range.end.timestamp().to_string()),
        ("step", step.to_string()),
    ]
}

// Prometheus reports query errors with a 4xx/5xx status and a JSON body.
// The body wins whenever it parses.
fn decode_response(code: u16, success: bool, body: &[u8]) -> Result<QueryResponse, ClientError> {
    match serde_json::from_slice::<QueryResponse>(body) {
        Ok(response) => Ok(response),
        Err(_) if !success => Err(ClientError::Status(code)),
        Err(e) => Err(ClientError::Decode(e)),
    }
}

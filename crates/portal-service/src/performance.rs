//! HTTP client for the out-of-process performance service.
//!
//! The client only reports failures; deciding to fall back to a local
//! computation is [`crate::Portal::performance`]'s job.

use std::time::Duration;

use portal_core::performance::{
  PerformanceReport, PerformanceRequest, PerformanceResponse,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Connection settings, deserialised from the `[performance]` config table.
#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceSettings {
  /// Base URL, e.g. `http://127.0.0.1:8081`.
  pub url:          String,
  pub auth_token:   String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 { DEFAULT_TIMEOUT_SECS }

/// Where a performance report came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportSource {
  Remote,
  Local,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourcedReport {
  pub report: PerformanceReport,
  pub source: ReportSource,
}

/// Why a remote call did not produce a report.
#[derive(Debug, Error)]
pub enum RemoteError {
  /// Connection failure or timeout.
  #[error("request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("service returned status {0}")]
  Status(StatusCode),

  #[error("malformed response: {0}")]
  Decode(#[from] serde_json::Error),

  #[error("service reported failure: {0}")]
  Rejected(String),
}

/// Async client for `POST /api/performance`.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct PerformanceClient {
  client:     Client,
  endpoint:   String,
  auth_token: String,
}

impl PerformanceClient {
  pub fn new(settings: &PerformanceSettings) -> Result<Self, reqwest::Error> {
    Self::with_timeout(
      &settings.url,
      &settings.auth_token,
      Duration::from_secs(settings.timeout_secs),
    )
  }

  /// The whole request, including reading the body, must finish within
  /// `timeout`.
  pub fn with_timeout(
    base_url: &str,
    auth_token: &str,
    timeout: Duration,
  ) -> Result<Self, reqwest::Error> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self {
      client,
      endpoint: format!("{}/api/performance", base_url.trim_end_matches('/')),
      auth_token: auth_token.to_owned(),
    })
  }

  pub async fn fetch(
    &self,
    student_id: i64,
    semester: Option<u8>,
  ) -> Result<PerformanceReport, RemoteError> {
    let request = PerformanceRequest {
      student_id,
      auth_token: self.auth_token.clone(),
      semester: semester.map(i64::from),
    };
    let resp = self.client.post(&self.endpoint).json(&request).send().await?;
    if resp.status() != StatusCode::OK {
      return Err(RemoteError::Status(resp.status()));
    }

    let bytes = resp.bytes().await?;
    let body: PerformanceResponse = serde_json::from_slice(&bytes)?;
    let error = body.error.clone();
    body
      .into_report()
      .ok_or_else(|| RemoteError::Rejected(error.unwrap_or_default()))
  }
}

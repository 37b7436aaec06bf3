//! Train status adapter (HTTP).
//!
//! Implements the `trainlive-core` `TrainStatusClient` port over the public
//! live-status endpoint: `GET {base_url}?trainNo=<n>`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use trainlive_core::{
    config::Config,
    domain::TrainNumber,
    errors::{Error, StatusError},
    status::{StatusSnapshot, TrainStatusClient},
    Result,
};

mod wire;

pub use wire::snapshot_from_body;

#[derive(Clone, Debug)]
pub struct RailApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl RailApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("trainlive/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::External(format!("http client build failed: {e}")))?;
        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(cfg.train_api_url.clone(), cfg.train_api_timeout)
    }
}

#[async_trait]
impl TrainStatusClient for RailApiClient {
    async fn fetch(&self, train: &TrainNumber) -> std::result::Result<StatusSnapshot, StatusError> {
        let resp = self
            .http
            .get(&self.base_url)
            .query(&[("trainNo", train.as_str())])
            .send()
            .await
            .map_err(|e| StatusError::UpstreamUnavailable(format!("request error: {e}")))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StatusError::NotFound(train.clone()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StatusError::UpstreamUnavailable(format!(
                "{status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| StatusError::UpstreamUnavailable(format!("body read error: {e}")))?;

        let fetched_at: DateTime<Utc> = Utc::now();
        let snapshot = snapshot_from_body(train, &body, fetched_at)?;
        tracing::debug!(train = %train, station = %snapshot.current_station(), "fetched status");
        Ok(snapshot)
    }
}

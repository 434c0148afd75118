//! Traccar position uploader
//!
//! Uses the OsmAnd protocol: one HTTP GET whose query string carries the
//! report. Only HTTP 200 counts as delivered.

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tracing::debug;

use super::report::PositionReport;
use crate::config::{DeviceConfig, ServerConfig};
use crate::error::{Result, TrackerError};
use crate::gps::Fix;

/// Destination for position fixes
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Deliver one fix; the caller owns any retry policy
    async fn upload(&self, fix: &Fix) -> Result<()>;
}

/// Uploader for a Traccar server's OsmAnd endpoint
pub struct TraccarUploader {
    http: reqwest::Client,
    url: String,
    device_id: String,
}

impl TraccarUploader {
    /// # Errors
    ///
    /// Returns `TrackerError::Upload` if the HTTP client cannot be built
    pub fn new(server: &ServerConfig, device: &DeviceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(server.timeout_s))
            .build()
            .map_err(|e| TrackerError::Upload(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            url: server.url.clone(),
            device_id: device.id.clone(),
        })
    }

    fn request(&self, report: &PositionReport) -> reqwest::RequestBuilder {
        self.http.get(&self.url).query(report)
    }
}

#[async_trait]
impl Uploader for TraccarUploader {
    async fn upload(&self, fix: &Fix) -> Result<()> {
        let report = PositionReport::new(fix, &self.device_id, Utc::now());

        let response = self
            .request(&report)
            .send()
            .await
            .map_err(|e| TrackerError::Upload(e.to_string()))?;

        let status = response.status();
        debug!(status = status.as_u16(), "Traccar responded");

        if status != reqwest::StatusCode::OK {
            return Err(TrackerError::Upload(format!("server answered {}", status)));
        }
        Ok(())
    }
}

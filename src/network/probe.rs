//! Internet reachability probe

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, TrackerError};

/// Single reachability check
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// True when the internet can be reached right now
    async fn check(&self) -> bool;
}

/// Probe that issues an HTTP GET to a well-known endpoint
///
/// Any HTTP response counts as reachable, whatever its status.
pub struct HttpProbe {
    http: reqwest::Client,
    url: String,
}

impl HttpProbe {
    /// # Errors
    ///
    /// Returns `TrackerError::LinkFailure` if the HTTP client cannot be built
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TrackerError::LinkFailure(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ReachabilityProbe for HttpProbe {
    async fn check(&self) -> bool {
        match self.http.get(&self.url).send().await {
            Ok(response) => {
                debug!("Probe {} answered {}", self.url, response.status());
                true
            }
            Err(e) => {
                debug!("Probe {} failed: {}", self.url, e);
                false
            }
        }
    }
}

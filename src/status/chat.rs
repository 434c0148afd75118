//! Chat notifier
//!
//! Sends text messages through a Telegram-style bot API
//! (`GET {api_base}/bot{token}/sendMessage?chat_id=..&text=..`), with the
//! local time appended. Delivery is best effort: failures are logged only.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use super::display::render_lines;
use super::{LinkStatus, StatusReporter};
use crate::config::NotifyConfig;
use crate::error::{Result, TrackerError};

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Subset of the bot API answer we care about
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Append the local time to a message
///
/// The time reads `HH:MM:SS hrs on DD/Mon/YYYY`.
pub fn compose_message(message: &str, now: DateTime<Utc>, offset: FixedOffset) -> String {
    let local = now.with_timezone(&offset);
    format!(
        "{}\nTime: {} hrs on {}",
        message,
        local.format("%H:%M:%S"),
        local.format("%d/%b/%Y")
    )
}

/// Notifier posting to a chat through a bot API
pub struct ChatNotifier {
    http: reqwest::Client,
    endpoint: String,
    chat_id: String,
    startup_message: String,
    offset: FixedOffset,
    status_updates: bool,
}

impl ChatNotifier {
    /// # Errors
    ///
    /// Returns `TrackerError::Notify` if the offset is invalid or the HTTP
    /// client cannot be built
    pub fn new(config: &NotifyConfig) -> Result<Self> {
        let offset = FixedOffset::east_opt(config.utc_offset_minutes * 60).ok_or_else(|| {
            TrackerError::Notify(format!("invalid UTC offset: {} minutes", config.utc_offset_minutes))
        })?;

        let http = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| TrackerError::Notify(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                config.api_base.trim_end_matches('/'),
                config.bot_token
            ),
            chat_id: config.chat_id.clone(),
            startup_message: config.startup_message.clone(),
            offset,
            status_updates: config.status_updates,
        })
    }

    fn request(&self, text: &str) -> reqwest::RequestBuilder {
        self.http
            .get(&self.endpoint)
            .query(&[("chat_id", self.chat_id.as_str()), ("text", text)])
    }

    /// Send one message, reporting whether the API accepted it
    pub async fn send(&self, message: &str) -> Result<()> {
        let text = compose_message(message, Utc::now(), self.offset);

        let response = self
            .request(&text)
            .send()
            .await
            .map_err(|e| TrackerError::Notify(e.to_string()))?;

        let status = response.status();
        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| TrackerError::Notify(format!("HTTP {}: {}", status, e)))?;

        if !status.is_success() || !body.ok {
            return Err(TrackerError::Notify(format!(
                "HTTP {}: {}",
                status,
                body.description.unwrap_or_default()
            )));
        }
        Ok(())
    }

    async fn send_logged(&self, message: &str) {
        match self.send(message).await {
            Ok(()) => info!("Notification sent successfully"),
            Err(e) => warn!("Failed to send notification: {}", e),
        }
    }
}

#[async_trait]
impl StatusReporter for ChatNotifier {
    async fn status_changed(&mut self, status: LinkStatus) {
        if self.status_updates {
            let lines = render_lines(status);
            self.send_logged(&format!("{}\n{}", lines[0], lines[1])).await;
        }
    }

    async fn started(&mut self) {
        let message = self.startup_message.clone();
        self.send_logged(&message).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config() -> NotifyConfig {
        NotifyConfig {
            enabled: true,
            bot_token: "123:abc".to_string(),
            chat_id: "42".to_string(),
            ..NotifyConfig::default()
        }
    }

    #[test]
    fn test_compose_message_in_ist() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let ist = FixedOffset::east_opt(330 * 60).unwrap();

        assert_eq!(
            compose_message("Baleno Started...", now, ist),
            "Baleno Started...\nTime: 17:30:00 hrs on 01/Jan/2024"
        );
    }

    #[test]
    fn test_compose_message_crosses_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 1, 0, 0).unwrap();
        let west = FixedOffset::west_opt(5 * 3600).unwrap();

        assert!(compose_message("x", now, west).ends_with("20:00:00 hrs on 29/Feb/2024"));
    }

    #[test]
    fn test_request_targets_send_message() {
        let notifier = ChatNotifier::new(&config()).unwrap();
        let request = notifier.request("hello world").build().unwrap();
        let url = request.url();

        assert_eq!(url.path(), "/bot123:abc/sendMessage");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("chat_id".to_string(), "42".to_string())));
        assert!(pairs.contains(&("text".to_string(), "hello world".to_string())));
    }

    #[test]
    fn test_api_response_parsing() {
        let ok: ApiResponse = serde_json::from_str(r#"{"ok":true,"result":{}}"#).unwrap();
        assert!(ok.ok);

        let denied: ApiResponse =
            serde_json::from_str(r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#).unwrap();
        assert!(!denied.ok);
        assert_eq!(denied.description.as_deref(), Some("Unauthorized"));
    }

    #[tokio::test]
    async fn test_unreachable_api_is_notify_error() {
        let notifier = ChatNotifier::new(&NotifyConfig {
            api_base: "http://127.0.0.1:9".to_string(),
            ..config()
        })
        .unwrap();

        assert!(matches!(notifier.send("hi").await, Err(TrackerError::Notify(_))));
    }
}

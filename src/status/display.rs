//! Two-line status display
//!
//! Renders the (network, GPS) pair the way the vehicle's 128x32 panel shows
//! it and writes the lines to the log.

use async_trait::async_trait;
use tracing::info;

use super::{LinkStatus, StatusReporter};

/// Marker shown for a subsystem that is down
pub const CROSS_SYMBOL: char = '\u{2718}';

/// Render the two display lines for a status pair
pub fn render_lines(status: LinkStatus) -> [String; 2] {
    let state = |up: bool| if up { "ON".to_string() } else { CROSS_SYMBOL.to_string() };
    [
        format!("Network : {}", state(status.network_up)),
        format!("GPS     : {}", state(status.gps_up)),
    ]
}

/// Status display backed by the log
#[derive(Debug, Default)]
pub struct DisplayReporter {
    lines: Option<[String; 2]>,
}

impl DisplayReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines currently shown, if anything was rendered yet
    pub fn lines(&self) -> Option<&[String; 2]> {
        self.lines.as_ref()
    }
}

#[async_trait]
impl StatusReporter for DisplayReporter {
    async fn status_changed(&mut self, status: LinkStatus) {
        let lines = render_lines(status);
        info!("[display] {} | {}", lines[0], lines[1]);
        self.lines = Some(lines);
    }

    async fn started(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_all_up() {
        let [network, gps] = render_lines(LinkStatus::new(true, true));
        assert_eq!(network, "Network : ON");
        assert_eq!(gps, "GPS     : ON");
    }

    #[test]
    fn test_render_gps_down() {
        let [network, gps] = render_lines(LinkStatus::new(true, false));
        assert_eq!(network, "Network : ON");
        assert_eq!(gps, "GPS     : ✘");
    }

    #[tokio::test]
    async fn test_display_keeps_last_render() {
        let mut display = DisplayReporter::new();
        assert!(display.lines().is_none());

        display.status_changed(LinkStatus::DOWN).await;

        let lines = display.lines().unwrap();
        assert!(lines[0].ends_with(CROSS_SYMBOL));
        assert!(lines[1].ends_with(CROSS_SYMBOL));
    }
}

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::ResultKinds;

/// Settings for a [`ScannerSession`](crate::ScannerSession).
///
/// Every field has a default, so a partial document deserializes:
///
/// ```
/// let config: scan_session::SessionConfig =
///     serde_json::from_str(r#"{ "options": ["image", "qr_code"] }"#).unwrap();
/// assert_eq!(config.close_timeout_ms, 500);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// What each frame is scanned for.
    pub options: ResultKinds,
    /// How long `close` waits for the frame worker to stop.
    pub close_timeout_ms: u64,
    /// Name of the frame worker thread.
    pub worker_name: String,
}

impl SessionConfig {
    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            options: ResultKinds::default(),
            close_timeout_ms: 500,
            worker_name: "scan-worker".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_serialize_as_kind_names() {
        let config = SessionConfig {
            options: ResultKinds::EAN13 | ResultKinds::IMAGE,
            ..Default::default()
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["options"], serde_json::json!(["ean13", "image"]));
        assert_eq!(json["close_timeout_ms"], 500);

        let back: SessionConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: SessionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.close_timeout(), Duration::from_millis(500));
        assert_eq!(config.options, ResultKinds::IMAGE);
    }
}

//! Fetch payloads and the status records published for each widget

use crate::widget::InstanceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Coarse health of a polled service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    #[default]
    Online,
    Offline,
    Warning,
}

impl ServiceState {
    /// Interpret a state reported by an integration
    ///
    /// Only `offline` and `warning` are honored; anything else reads as online.
    pub fn from_reported(reported: Option<&str>) -> Self {
        match reported.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("offline") => ServiceState::Offline,
            Some("warning") => ServiceState::Warning,
            _ => ServiceState::Online,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Online => "online",
            ServiceState::Offline => "offline",
            ServiceState::Warning => "warning",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_success() -> bool {
    true
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// What a fetch operation hands back when the remote service answered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchPayload {
    /// Absent means success
    #[serde(default = "default_success")]
    pub success: bool,
    /// Optional coarse state reported by the integration
    #[serde(default, alias = "status", skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default = "empty_object")]
    pub stats: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Round-trip latency in milliseconds as measured by the integration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping: Option<u64>,
    /// Raw integration data for widget consumption
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl FetchPayload {
    /// Successful payload carrying `stats`
    pub fn ok(stats: Value) -> Self {
        Self {
            success: true,
            state: None,
            stats,
            error: None,
            ping: None,
            data: None,
        }
    }

    /// Successful payload with no statistics
    pub fn empty() -> Self {
        Self::ok(empty_object())
    }

    /// Explicit failure reported by the remote service
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            state: None,
            stats: empty_object(),
            error: Some(error.into()),
            ping: None,
            data: None,
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_ping(mut self, ping_ms: u64) -> Self {
        self.ping = Some(ping_ms);
        self
    }
}

/// Most recent status of one widget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub id: InstanceId,
    /// Display name (widget title, integration name or type id)
    pub name: String,
    /// Icon identifier for the presentation layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub state: ServiceState,
    pub last_updated: DateTime<Utc>,
    pub stats: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Round-trip latency in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// The payload the integration returned, preserved for widgets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl StatusRecord {
    pub fn latency(&self) -> Option<Duration> {
        self.latency_ms.map(Duration::from_millis)
    }

    pub fn is_online(&self) -> bool {
        self.state == ServiceState::Online
    }
}

/// Full status view keyed by widget id
pub type StatusMap = BTreeMap<InstanceId, StatusRecord>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_defaults_to_success() {
        let payload: FetchPayload = serde_json::from_value(json!({ "data": { "queue": 3 } })).unwrap();
        assert!(payload.success);
        assert_eq!(payload.stats, json!({}));
        assert_eq!(payload.data, Some(json!({ "queue": 3 })));
    }

    #[test]
    fn test_payload_accepts_status_alias() {
        let payload: FetchPayload =
            serde_json::from_value(json!({ "success": true, "status": "warning" })).unwrap();
        assert_eq!(
            ServiceState::from_reported(payload.state.as_deref()),
            ServiceState::Warning
        );
    }

    #[test]
    fn test_reported_state_only_honors_known_values() {
        assert_eq!(ServiceState::from_reported(None), ServiceState::Online);
        assert_eq!(ServiceState::from_reported(Some("degraded")), ServiceState::Online);
        assert_eq!(ServiceState::from_reported(Some("OFFLINE")), ServiceState::Offline);
    }

    #[test]
    fn test_record_latency_and_online() {
        let mut record = StatusRecord {
            id: InstanceId(1),
            name: "Sonarr".to_string(),
            icon: None,
            state: ServiceState::Online,
            last_updated: Utc::now(),
            stats: json!({}),
            error: None,
            latency_ms: Some(120),
            payload: None,
        };
        assert!(record.is_online());
        assert_eq!(record.latency(), Some(Duration::from_millis(120)));

        record.state = ServiceState::Warning;
        record.latency_ms = None;
        assert!(!record.is_online());
        assert_eq!(record.latency(), None);
    }
}

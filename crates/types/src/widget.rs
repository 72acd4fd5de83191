//! Widget instances as reported by the persistence layer

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Shortest allowed refresh interval
pub const MIN_REFRESH_SECS: u64 = 10;
/// Longest allowed refresh interval
pub const MAX_REFRESH_SECS: u64 = 300;
/// Refresh interval used when a widget does not configure one
pub const DEFAULT_REFRESH_SECS: u64 = 30;

/// Opaque per-widget configuration
pub type WidgetConfig = serde_json::Map<String, Value>;

/// Identifier assigned to a widget by the persistence layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub i64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for InstanceId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Clamp a requested refresh rate into the supported window
pub fn clamp_refresh_secs(secs: u64) -> u64 {
    secs.clamp(MIN_REFRESH_SECS, MAX_REFRESH_SECS)
}

/// One configured widget
///
/// Field aliases accept the dashboard API's widget shape
/// (`type`, `position`, `is_enabled`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetInstance {
    pub id: InstanceId,
    /// Integration type, resolved through the capability registry
    #[serde(alias = "type", alias = "pluginId")]
    pub type_id: String,
    #[serde(default)]
    pub config: WidgetConfig,
    #[serde(default = "default_enabled", alias = "is_enabled")]
    pub enabled: bool,
    #[serde(default, alias = "position")]
    pub order: i32,
}

fn default_enabled() -> bool {
    true
}

impl WidgetInstance {
    pub fn new(id: impl Into<InstanceId>, type_id: impl Into<String>, config: WidgetConfig) -> Self {
        Self {
            id: id.into(),
            type_id: type_id.into(),
            config,
            enabled: true,
            order: 0,
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Configured refresh rate in seconds, clamped to [10, 300]
    ///
    /// Missing, zero or unparsable values fall back to the default. Numeric
    /// strings are accepted since form inputs often store numbers as text.
    pub fn refresh_secs(&self) -> u64 {
        let requested = match self.config.get("refreshRate") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };

        match requested {
            Some(rate) if rate.is_finite() && rate != 0.0 => {
                if rate <= MIN_REFRESH_SECS as f64 {
                    MIN_REFRESH_SECS
                } else {
                    clamp_refresh_secs(rate.round() as u64)
                }
            }
            _ => DEFAULT_REFRESH_SECS,
        }
    }

    /// Refresh interval as a `Duration`
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs())
    }

    /// User-chosen widget title, if any
    pub fn title(&self) -> Option<&str> {
        self.config
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

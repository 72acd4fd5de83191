//! Classification of fetch results into status updates

use crate::constants::DEFAULT_REMOTE_ERROR;
use crate::error::FetchError;
use chrono::Utc;
use pulseboard_types::{FetchPayload, InstanceId, ServiceState, StatusRecord};
use serde_json::Value;
use std::time::Duration;

/// Coarse kind of a classified fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Success,
    /// The remote answered with a structured failure
    Recoverable,
    /// No usable response this cycle
    Fatal,
}

/// Result of one fetch after classification
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        state: ServiceState,
        payload: FetchPayload,
    },
    Recoverable {
        error: String,
    },
    Fatal(FetchError),
}

impl Outcome {
    /// Classify a raw fetch result
    ///
    /// An explicit `success: false` is recoverable and carries its message,
    /// an error raised before any payload is fatal for this cycle, anything
    /// else is a success whose state the payload may downgrade.
    pub fn classify(result: Result<FetchPayload, FetchError>) -> Self {
        match result {
            Ok(payload) if !payload.success => Outcome::Recoverable {
                error: payload
                    .error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_REMOTE_ERROR.to_string()),
            },
            Ok(payload) => Outcome::Success {
                state: ServiceState::from_reported(payload.state.as_deref()),
                payload,
            },
            Err(err) => Outcome::Fatal(err),
        }
    }

    /// Outcome reported for widgets whose integration has no fetch operation
    pub fn without_fetch() -> Self {
        Outcome::Success {
            state: ServiceState::Online,
            payload: FetchPayload::empty(),
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Success { .. } => OutcomeKind::Success,
            Outcome::Recoverable { .. } => OutcomeKind::Recoverable,
            Outcome::Fatal(_) => OutcomeKind::Fatal,
        }
    }

    /// Build the status record to publish, or `None` when the record must be
    /// removed instead
    pub fn into_record(self, target: RecordTarget, latency: Option<Duration>) -> Option<StatusRecord> {
        let now = Utc::now();
        match self {
            Outcome::Success { state, payload } => {
                let latency_ms = payload
                    .ping
                    .or_else(|| latency.map(|l| l.as_millis() as u64));
                let stats = match &payload.stats {
                    Value::Null => Value::Object(Default::default()),
                    other => other.clone(),
                };
                let raw = serde_json::to_value(&payload).ok();
                Some(StatusRecord {
                    id: target.id,
                    name: target.name,
                    icon: target.icon,
                    state,
                    last_updated: now,
                    stats,
                    error: None,
                    latency_ms,
                    payload: raw,
                })
            }
            Outcome::Recoverable { error } => Some(StatusRecord {
                id: target.id,
                name: target.name,
                icon: target.icon,
                state: ServiceState::Offline,
                last_updated: now,
                stats: Value::Object(Default::default()),
                error: Some(error),
                latency_ms: latency.map(|l| l.as_millis() as u64),
                payload: None,
            }),
            Outcome::Fatal(_) => None,
        }
    }
}

/// Identity of the widget a record is built for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordTarget {
    pub id: InstanceId,
    pub name: String,
    pub icon: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn target() -> RecordTarget {
        RecordTarget {
            id: InstanceId(1),
            name: "Sonarr".to_string(),
            icon: Some("sonarr".to_string()),
        }
    }

    #[test]
    fn test_explicit_failure_is_recoverable() {
        let outcome = Outcome::classify(Ok(FetchPayload::failed("bad key")));
        assert_eq!(outcome.kind(), OutcomeKind::Recoverable);

        let record = outcome.into_record(target(), None).unwrap();
        assert_eq!(record.state, ServiceState::Offline);
        assert_eq!(record.error.as_deref(), Some("bad key"));
        assert_eq!(record.stats, json!({}));
    }

    #[test]
    fn test_failure_without_message_gets_default() {
        let mut payload = FetchPayload::failed("");
        payload.error = None;
        let outcome = Outcome::classify(Ok(payload));
        assert_eq!(
            outcome,
            Outcome::Recoverable {
                error: DEFAULT_REMOTE_ERROR.to_string()
            }
        );
    }

    #[test]
    fn test_error_is_fatal_and_removes() {
        let outcome = Outcome::classify(Err(FetchError::Timeout(Duration::from_secs(15))));
        assert_eq!(outcome.kind(), OutcomeKind::Fatal);
        assert!(outcome.into_record(target(), None).is_none());
    }

    #[test]
    fn test_success_honors_reported_state() {
        let payload = FetchPayload::ok(json!({ "queue": 2 })).with_state("warning");
        let record = Outcome::classify(Ok(payload))
            .into_record(target(), Some(Duration::from_millis(42)))
            .unwrap();

        assert_eq!(record.state, ServiceState::Warning);
        assert_eq!(record.stats, json!({ "queue": 2 }));
        assert_eq!(record.latency_ms, Some(42));
        assert!(record.error.is_none());
    }

    #[test]
    fn test_reported_ping_wins_over_measured_latency() {
        let payload = FetchPayload::empty().with_ping(7);
        let record = Outcome::classify(Ok(payload))
            .into_record(target(), Some(Duration::from_millis(300)))
            .unwrap();
        assert_eq!(record.latency_ms, Some(7));
        assert_eq!(record.state, ServiceState::Online);
    }
}

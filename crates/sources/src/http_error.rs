//! Turning failed HTTP responses into user-facing error messages

use serde_json::Value;

/// Message for a non-success response from the dashboard backend
///
/// The backend's own `{"error": "..."}` body wins. A JSON body without a
/// message gets a generic one; a body that is not JSON gets a message
/// derived from the status code.
pub fn error_message(status: u16, reason: &str, body: &str, service: &str) -> String {
    match body_error(body) {
        BodyError::Message(message) => message,
        BodyError::NoMessage => format!("Failed to fetch {} stats: {}", service, status),
        BodyError::NotJson => status_message(status, reason, service),
    }
}

enum BodyError {
    Message(String),
    NoMessage,
    NotJson,
}

fn status_message(status: u16, reason: &str, service: &str) -> String {
    match status {
        400 => "Invalid widget ID or configuration".to_string(),
        401 => "Authentication failed - check API key".to_string(),
        403 => "Access forbidden - API key may be invalid".to_string(),
        404 => format!("Widget not found or {} API not found", service),
        408 => format!("Connection timeout - {} is slow to respond", service),
        500 => format!("Internal server error in {}", service),
        502 => format!("Connection refused - {} may be offline", service),
        503 => format!("{} service unavailable", service),
        _ => format!("HTTP {}: {}", status, reason),
    }
}

fn body_error(body: &str) -> BodyError {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return BodyError::NotJson;
    };
    match value
        .get("error")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|e| !e.is_empty())
    {
        Some(message) => BodyError::Message(message.to_string()),
        None => BodyError::NoMessage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_error_wins() {
        let message = error_message(502, "Bad Gateway", r#"{"error":"dial tcp: refused"}"#, "Sonarr");
        assert_eq!(message, "dial tcp: refused");
    }

    #[test]
    fn test_status_specific_messages() {
        assert_eq!(
            error_message(401, "Unauthorized", "", "Sonarr"),
            "Authentication failed - check API key"
        );
        assert_eq!(
            error_message(502, "Bad Gateway", "<html>", "Radarr"),
            "Connection refused - Radarr may be offline"
        );
        assert_eq!(
            error_message(503, "Service Unavailable", "", "Immich"),
            "Immich service unavailable"
        );
    }

    #[test]
    fn test_json_body_without_message_is_generic() {
        assert_eq!(
            error_message(503, "Service Unavailable", "{}", "Immich"),
            "Failed to fetch Immich stats: 503"
        );
        assert_eq!(
            error_message(401, "Unauthorized", r#"{"error":"  "}"#, "Sonarr"),
            "Failed to fetch Sonarr stats: 401"
        );
    }

    #[test]
    fn test_unknown_status_uses_reason() {
        assert_eq!(error_message(418, "I'm a teapot", "", "x"), "HTTP 418: I'm a teapot");
    }
}

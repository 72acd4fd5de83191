//! Connection test - checking a configuration before it is saved

use crate::capability::FetchRequest;
use crate::classify::Outcome;
use crate::error::{ConnectionTestError, FetchError};
use crate::registry::CapabilityRegistry;
use log::{debug, info};
use pulseboard_types::{FetchPayload, WidgetConfig};
use std::sync::Arc;
use std::time::Duration;

/// Validate `config` against the integration's schema and validator, then
/// run one validation-only fetch under `timeout`
///
/// Integrations without a fetch operation pass once the static checks do.
pub async fn test_connection(
    registry: &CapabilityRegistry,
    type_id: &str,
    config: WidgetConfig,
    timeout: Duration,
) -> Result<FetchPayload, ConnectionTestError> {
    let descriptor = registry
        .get(type_id)
        .ok_or_else(|| ConnectionTestError::UnknownType(type_id.to_string()))?;

    let missing = descriptor.config_template.missing_required(&config);
    if !missing.is_empty() {
        return Err(ConnectionTestError::MissingFields(missing));
    }
    descriptor
        .validate(&config)
        .map_err(ConnectionTestError::Rejected)?;

    let Some(fetch) = descriptor.fetch.clone() else {
        debug!("{} has no fetch operation, nothing to test", type_id);
        return Ok(FetchPayload::empty());
    };

    let request = FetchRequest::validation(Arc::new(config));
    let result = match tokio::time::timeout(timeout, fetch.fetch(request)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(timeout)),
    };

    match Outcome::classify(result) {
        Outcome::Success { payload, .. } => {
            info!("Connection test for {} succeeded", type_id);
            Ok(payload)
        }
        Outcome::Recoverable { error } => Err(ConnectionTestError::Remote(error)),
        Outcome::Fatal(err) => Err(ConnectionTestError::Fetch(err)),
    }
}

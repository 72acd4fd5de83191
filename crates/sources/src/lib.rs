//! pulseboard-sources: Built-in integrations for the pulseboard dashboard.
//!
//! Every integration fetches through the dashboard backend API, which holds
//! the service credentials and talks to the service itself.

mod backend;
mod http_error;
mod integrations;

pub use backend::{unwrap_envelope, BackendClient, BackendFetch, ClientError, DEFAULT_API_BASE};
pub use http_error::error_message;
pub use integrations::{
    adguard_home, immich, lidarr, prowlarr, qbittorrent, radarr, require_http_url, sonarr,
    transmission,
};

use log::info;
use pulseboard_core::CapabilityRegistry;
use std::sync::Arc;

/// Register all built-in integrations with `registry`
pub fn register_all(registry: &CapabilityRegistry, client: Arc<BackendClient>) {
    registry.register(sonarr(&client));
    registry.register(radarr(&client));
    registry.register(lidarr(&client));
    registry.register(prowlarr(&client));
    registry.register(qbittorrent(&client));
    registry.register(transmission(&client));
    registry.register(adguard_home(&client));
    registry.register(immich(&client));

    info!(
        "Registered {} built-in integrations against {}",
        registry.len(),
        client.api_base()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulseboard_types::Category;

    #[test]
    fn test_register_all() {
        let registry = CapabilityRegistry::new();
        let client = Arc::new(BackendClient::new(DEFAULT_API_BASE).unwrap());
        register_all(&registry, client);

        let ids: Vec<String> = registry.list().iter().map(|d| d.id().to_string()).collect();
        assert_eq!(
            ids,
            vec![
                "adguard-home",
                "immich",
                "lidarr",
                "prowlarr",
                "qbittorrent",
                "radarr",
                "sonarr",
                "transmission",
            ]
        );
        assert_eq!(registry.list_by_category(Category::Network).len(), 1);
        assert!(registry.list().iter().all(|d| d.fetch.is_some()));
    }
}

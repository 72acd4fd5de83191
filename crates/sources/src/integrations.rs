//! Descriptors for the built-in service integrations

use crate::backend::{BackendClient, BackendFetch};
use pulseboard_core::CapabilityDescriptor;
use pulseboard_types::{
    CapabilityMetadata, Category, ConfigField, ConfigTemplate, FieldType, WidgetConfig,
    DEFAULT_REFRESH_SECS, MAX_REFRESH_SECS, MIN_REFRESH_SECS,
};
use std::sync::Arc;

const AUTHOR: &str = "Alex <https://x.com/_avdept>";

fn metadata(id: &str, name: &str, description: &str, category: Category) -> CapabilityMetadata {
    let mut metadata = CapabilityMetadata::new(id, name, description, category);
    metadata.author = AUTHOR.to_string();
    metadata
}

fn title_field(default: &str) -> ConfigField {
    ConfigField::new("title", "Widget Title", FieldType::Text)
        .with_default(default)
        .with_placeholder(default)
}

fn server_url_field(placeholder: &str) -> ConfigField {
    ConfigField::new("serverUrl", "Server URL", FieldType::Url)
        .required()
        .with_placeholder(placeholder)
}

fn api_key_field(service: &str) -> ConfigField {
    ConfigField::new("apiKey", "API Key", FieldType::Password)
        .required()
        .credential()
        .with_description(format!("Found in {} under Settings > General", service))
}

fn refresh_field() -> ConfigField {
    ConfigField::new("refreshRate", "Refresh Rate (seconds)", FieldType::Number)
        .with_default(DEFAULT_REFRESH_SECS)
        .with_description(format!(
            "Polled every {}-{} seconds",
            MIN_REFRESH_SECS, MAX_REFRESH_SECS
        ))
}

fn username_field(required: bool) -> ConfigField {
    let field = ConfigField::new("username", "Username", FieldType::Text);
    if required {
        field.required()
    } else {
        field
    }
}

fn password_field(required: bool) -> ConfigField {
    let field = ConfigField::new("password", "Password", FieldType::Password).credential();
    if required {
        field.required()
    } else {
        field
    }
}

fn space_usage_fields(toggle: &str, threshold: &str) -> [ConfigField; 2] {
    [
        ConfigField::new(toggle, "Show Space Usage", FieldType::Boolean).with_default(false),
        ConfigField::new(threshold, "Usage Warning Threshold (%)", FieldType::Number)
            .with_default(90),
    ]
}

fn speed_limit_fields() -> [ConfigField; 2] {
    [
        ConfigField::new("maxDownloadSpeed", "Max Download Speed (MB/s)", FieldType::Number)
            .with_description("Scale for the download gauge; 0 disables it"),
        ConfigField::new("maxUploadSpeed", "Max Upload Speed (MB/s)", FieldType::Number)
            .with_description("Scale for the upload gauge; 0 disables it"),
    ]
}

/// Reject server URLs that are not absolute http(s) addresses
pub fn require_http_url(config: &WidgetConfig) -> Result<(), String> {
    let Some(url) = config.get("serverUrl").and_then(|v| v.as_str()) else {
        return Ok(());
    };
    let url = url.trim();
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .ok_or_else(|| "Server URL must start with http:// or https://".to_string())?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err("Server URL is missing a host".to_string());
    }
    Ok(())
}

/// *arr family services share the same configuration shape
fn arr_service(
    client: &Arc<BackendClient>,
    id: &'static str,
    name: &'static str,
    description: &str,
    port: u16,
    space_usage: bool,
) -> CapabilityDescriptor {
    let mut fields = vec![
        title_field(name),
        server_url_field(&format!("http://localhost:{}", port)),
        api_key_field(name),
        refresh_field(),
    ];
    if space_usage {
        fields.extend(space_usage_fields("showSpaceUsage", "showUsageThreshold"));
    }

    CapabilityDescriptor::new(
        metadata(id, name, description, Category::Media),
        ConfigTemplate::new(fields),
    )
    .with_fetch(BackendFetch::new(client.clone(), id, name))
    .with_validator(require_http_url)
}

pub fn sonarr(client: &Arc<BackendClient>) -> CapabilityDescriptor {
    arr_service(client, "sonarr", "Sonarr", "TV series queue, calendar and disk space", 8989, true)
}

pub fn radarr(client: &Arc<BackendClient>) -> CapabilityDescriptor {
    arr_service(client, "radarr", "Radarr", "Movie queue, calendar and disk space", 7878, true)
}

pub fn lidarr(client: &Arc<BackendClient>) -> CapabilityDescriptor {
    arr_service(client, "lidarr", "Lidarr", "Music queue, calendar and disk space", 8686, true)
}

pub fn prowlarr(client: &Arc<BackendClient>) -> CapabilityDescriptor {
    arr_service(client, "prowlarr", "Prowlarr", "Indexer health and grab statistics", 9696, false)
}

pub fn qbittorrent(client: &Arc<BackendClient>) -> CapabilityDescriptor {
    let mut fields = vec![
        title_field("qBittorrent"),
        server_url_field("http://localhost:8080"),
        username_field(false),
        password_field(false),
        refresh_field(),
    ];
    fields.extend(speed_limit_fields());

    CapabilityDescriptor::new(
        metadata("qbittorrent", "qBittorrent", "Transfer speeds and torrent counts", Category::Media),
        ConfigTemplate::new(fields),
    )
    .with_fetch(BackendFetch::new(client.clone(), "qbittorrent", "qBittorrent"))
    .with_validator(require_http_url)
}

pub fn transmission(client: &Arc<BackendClient>) -> CapabilityDescriptor {
    let mut fields = vec![
        title_field("Transmission"),
        server_url_field("http://localhost:9091"),
        ConfigField::new("rpcPath", "RPC Path", FieldType::Text)
            .with_default("/transmission/rpc")
            .with_placeholder("/transmission/rpc"),
        username_field(false),
        password_field(false),
        refresh_field(),
    ];
    fields.extend(speed_limit_fields());

    CapabilityDescriptor::new(
        metadata("transmission", "Transmission", "Transfer speeds and torrent counts", Category::Media),
        ConfigTemplate::new(fields),
    )
    .with_fetch(BackendFetch::new(client.clone(), "transmission", "Transmission"))
    .with_validator(require_http_url)
}

pub fn adguard_home(client: &Arc<BackendClient>) -> CapabilityDescriptor {
    let fields = vec![
        title_field("AdGuard Home"),
        server_url_field("http://localhost:3000"),
        username_field(true),
        password_field(true),
        refresh_field(),
    ];

    let mut metadata = metadata(
        "adguard-home",
        "AdGuard Home",
        "DNS queries, blocked requests and filtering status",
        Category::Network,
    );
    metadata.icon = "adguard".to_string();

    CapabilityDescriptor::new(metadata, ConfigTemplate::new(fields))
        .with_fetch(BackendFetch::new(client.clone(), "adguard", "AdGuard Home"))
        .with_validator(require_http_url)
}

pub fn immich(client: &Arc<BackendClient>) -> CapabilityDescriptor {
    let mut fields = vec![
        title_field("Immich"),
        server_url_field("http://localhost:2283"),
        api_key_field("Immich"),
        refresh_field(),
    ];
    let [toggle, threshold] = space_usage_fields("showStorage", "showStorageThreshold");
    fields.push(toggle.with_description("Show server storage usage"));
    fields.push(threshold);

    CapabilityDescriptor::new(
        metadata("immich", "Immich", "Photo and video library statistics", Category::Media),
        ConfigTemplate::new(fields),
    )
    .with_fetch(BackendFetch::new(client.clone(), "immich", "Immich"))
    .with_validator(require_http_url)
}

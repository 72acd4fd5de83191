//! pulseboard: A self-hosted dashboard that polls homelab services
//!
//! This library wires the polling core to the outside world:
//! - Configuration management
//! - A widget store backed by the dashboard JSON file

pub mod config;
pub mod store;

// Re-export commonly used types
pub use config::AppConfig;
pub use store::FileWidgetStore;

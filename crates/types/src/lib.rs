//! pulseboard-types: Shared data types for the pulseboard dashboard.
//!
//! This crate contains pure data types (widget instances, capability
//! metadata, configuration schema fields, status records) that are shared
//! across all pulseboard crates. Nothing here performs I/O or owns a timer.

pub mod field;
pub mod metadata;
pub mod status;
pub mod widget;

// Re-export commonly used types at the crate root for convenience
pub use field::{ConfigField, ConfigTemplate, FieldType, SelectOption};
pub use metadata::{CapabilityMetadata, Category};
pub use status::{FetchPayload, ServiceState, StatusMap, StatusRecord};
pub use widget::{
    clamp_refresh_secs, InstanceId, WidgetConfig, WidgetInstance, DEFAULT_REFRESH_SECS,
    MAX_REFRESH_SECS, MIN_REFRESH_SECS,
};

//! Display metadata for integration types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Grouping used by the widget picker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    System,
    Service,
    Monitoring,
    Media,
    Network,
    Storage,
    Custom,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::System => "system",
            Category::Service => "service",
            Category::Monitoring => "monitoring",
            Category::Media => "media",
            Category::Network => "network",
            Category::Storage => "storage",
            Category::Custom => "custom",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata about an integration type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityMetadata {
    /// Unique identifier for this integration type (e.g. "sonarr")
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Description of what this integration shows
    pub description: String,
    pub version: String,
    pub author: String,
    pub category: Category,
    /// Icon identifier for the presentation layer
    pub icon: String,
}

impl CapabilityMetadata {
    /// Metadata with the icon defaulting to the id
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        category: Category,
    ) -> Self {
        let id = id.into();
        Self {
            icon: id.clone(),
            id,
            name: name.into(),
            description: description.into(),
            version: "1.0.0".to_string(),
            author: String::new(),
            category,
        }
    }
}

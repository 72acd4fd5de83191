//! Widget store backed by the dashboard JSON file

use async_trait::async_trait;
use log::debug;
use pulseboard_core::{StoreError, WidgetStore};
use pulseboard_types::WidgetInstance;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Only the widget list of the dashboard file is read
#[derive(Debug, Deserialize)]
struct DashboardFile {
    #[serde(default)]
    widgets: Vec<WidgetInstance>,
}

/// Reads the `widgets` array of a JSON file on every call
#[derive(Debug, Clone)]
pub struct FileWidgetStore {
    path: PathBuf,
}

impl FileWidgetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl WidgetStore for FileWidgetStore {
    async fn list_enabled_instances(&self) -> Result<Vec<WidgetInstance>, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Dashboard file {} not found, no widgets", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let dashboard: DashboardFile = serde_json::from_str(&content)?;
        Ok(dashboard
            .widgets
            .into_iter()
            .filter(|w| w.enabled)
            .collect())
    }
}

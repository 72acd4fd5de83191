//! Registry of integration capabilities

use crate::capability::CapabilityDescriptor;
use log::{debug, info};
use pulseboard_types::Category;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Registry mapping integration-type ids to their capability descriptors
///
/// Built once at startup from an explicit registration list and injected
/// into the scheduler. Lookups are frequent and concurrent; registration is
/// rare, so a read/write lock is enough.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    capabilities: RwLock<HashMap<String, Arc<CapabilityDescriptor>>>,
}

impl CapabilityRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability, replacing any previous one with the same id
    pub fn register(&self, descriptor: CapabilityDescriptor) {
        let id = descriptor.id().to_string();
        let name = descriptor.metadata.name.clone();
        let replaced = self
            .capabilities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), Arc::new(descriptor))
            .is_some();

        if replaced {
            debug!("Replaced capability: {} ({})", name, id);
        } else {
            info!("Registered capability: {} ({})", name, id);
        }
    }

    /// Remove a capability; widgets that still reference it fall back to
    /// the "no fetch operation" behavior
    pub fn unregister(&self, type_id: &str) -> bool {
        let removed = self
            .capabilities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(type_id)
            .is_some();
        if removed {
            info!("Unregistered capability {}", type_id);
        }
        removed
    }

    /// Look up a capability by type id
    pub fn get(&self, type_id: &str) -> Option<Arc<CapabilityDescriptor>> {
        self.capabilities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(type_id)
            .cloned()
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.capabilities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(type_id)
    }

    /// All capabilities, sorted by id
    pub fn list(&self) -> Vec<Arc<CapabilityDescriptor>> {
        let mut all: Vec<_> = self
            .capabilities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }

    /// Capabilities in one category, sorted by id
    pub fn list_by_category(&self, category: Category) -> Vec<Arc<CapabilityDescriptor>> {
        self.list()
            .into_iter()
            .filter(|d| d.metadata.category == category)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.capabilities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

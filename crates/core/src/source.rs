//! Instance source - the reactive list of enabled widgets

use crate::error::StoreError;
use crate::subscription::{spawn_listener, Subscription, SubscriptionHandle};
use async_trait::async_trait;
use log::{debug, info};
use pulseboard_types::WidgetInstance;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;

/// Full list of widgets that should be polled right now
pub type Snapshot = Arc<Vec<WidgetInstance>>;

/// Read access to the persistence layer
#[async_trait]
pub trait WidgetStore: Send + Sync {
    /// Widgets the dashboard currently shows
    ///
    /// Implementations may return disabled widgets too; the instance source
    /// filters them out.
    async fn list_enabled_instances(&self) -> Result<Vec<WidgetInstance>, StoreError>;
}

/// Widget store kept in memory
#[derive(Debug, Default)]
pub struct MemoryWidgetStore {
    widgets: RwLock<Vec<WidgetInstance>>,
}

impl MemoryWidgetStore {
    pub fn new(widgets: Vec<WidgetInstance>) -> Self {
        Self {
            widgets: RwLock::new(widgets),
        }
    }

    /// Insert or replace a widget by id
    pub fn upsert(&self, widget: WidgetInstance) {
        let mut widgets = self.widgets.write().unwrap_or_else(PoisonError::into_inner);
        match widgets.iter_mut().find(|w| w.id == widget.id) {
            Some(existing) => *existing = widget,
            None => widgets.push(widget),
        }
    }

    pub fn remove(&self, id: pulseboard_types::InstanceId) -> bool {
        let mut widgets = self.widgets.write().unwrap_or_else(PoisonError::into_inner);
        let before = widgets.len();
        widgets.retain(|w| w.id != id);
        widgets.len() != before
    }
}

#[async_trait]
impl WidgetStore for MemoryWidgetStore {
    async fn list_enabled_instances(&self) -> Result<Vec<WidgetInstance>, StoreError> {
        Ok(self
            .widgets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

/// Keep enabled widgets only, sorted by display order
fn normalize(mut widgets: Vec<WidgetInstance>) -> Vec<WidgetInstance> {
    widgets.retain(|w| w.enabled);
    widgets.sort_by_key(|w| w.order);
    widgets
}

/// Reactive projection of the widget store
///
/// Every subscriber receives the full snapshot, never a diff: first the
/// current one, then a new one whenever the list of enabled widgets changes.
pub struct InstanceSource {
    store: Arc<dyn WidgetStore>,
    snapshot: watch::Sender<Snapshot>,
}

impl InstanceSource {
    /// Create a source with an empty initial snapshot; call [`reload`](Self::reload)
    /// to populate it from the store
    pub fn new(store: Arc<dyn WidgetStore>) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self { store, snapshot }
    }

    /// Re-read the store and publish the result if it changed
    ///
    /// Returns the number of enabled widgets.
    pub async fn reload(&self) -> Result<usize, StoreError> {
        let widgets = self.store.list_enabled_instances().await?;
        let count = widgets.iter().filter(|w| w.enabled).count();
        if self.publish(widgets) {
            info!("Widget list changed: {} enabled widgets", count);
        } else {
            debug!("Widget list unchanged ({} enabled)", count);
        }
        Ok(count)
    }

    /// Publish a snapshot directly; returns whether it differed from the last one
    pub fn publish(&self, widgets: Vec<WidgetInstance>) -> bool {
        let next = normalize(widgets);
        self.snapshot.send_if_modified(|current| {
            if **current == next {
                false
            } else {
                *current = Arc::new(next);
                true
            }
        })
    }

    /// Latest published snapshot
    pub fn current(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshots; the current one is delivered first
    pub fn subscribe(&self) -> Subscription<Snapshot> {
        Subscription::new(self.snapshot.subscribe())
    }

    /// Call `listener` with every snapshot until the handle is dropped
    pub fn subscribe_with<F>(&self, listener: F) -> SubscriptionHandle
    where
        F: FnMut(&Snapshot) + Send + 'static,
    {
        spawn_listener(self.subscribe(), listener)
    }
}

impl fmt::Debug for InstanceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceSource")
            .field("widgets", &self.snapshot.borrow().len())
            .field("subscribers", &self.snapshot.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulseboard_types::{InstanceId, WidgetConfig};

    fn widget(id: i64, order: i32) -> WidgetInstance {
        WidgetInstance::new(id, "sonarr", WidgetConfig::new()).with_order(order)
    }

    #[tokio::test]
    async fn test_reload_filters_and_sorts() {
        let store = Arc::new(MemoryWidgetStore::new(vec![
            widget(1, 2),
            widget(2, 0).disabled(),
            widget(3, 1),
        ]));
        let source = InstanceSource::new(store);

        assert_eq!(source.reload().await.unwrap(), 2);
        let ids: Vec<_> = source.current().iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![InstanceId(3), InstanceId(1)]);
    }

    #[tokio::test]
    async fn test_subscribe_delivers_current_then_changes() {
        let store = Arc::new(MemoryWidgetStore::new(vec![widget(1, 0)]));
        let source = InstanceSource::new(store.clone());
        source.reload().await.unwrap();

        let mut sub = source.subscribe();
        assert_eq!(sub.next().await.unwrap().len(), 1);

        store.upsert(widget(2, 1));
        source.reload().await.unwrap();
        assert_eq!(sub.next().await.unwrap().len(), 2);
    }

    #[test]
    fn test_publish_ignores_identical_snapshots() {
        let source = InstanceSource::new(Arc::new(MemoryWidgetStore::default()));
        assert!(source.publish(vec![widget(1, 0)]));
        assert!(!source.publish(vec![widget(1, 0)]));
        assert!(source.publish(vec![]));
    }

    #[test]
    fn test_memory_store_upsert_and_remove() {
        let store = MemoryWidgetStore::new(vec![widget(1, 0)]);
        store.upsert(widget(1, 5));
        store.upsert(widget(2, 1));
        assert!(store.remove(InstanceId(2)));
        assert!(!store.remove(InstanceId(2)));

        let widgets = store.widgets.read().unwrap();
        assert_eq!(widgets.len(), 1);
        assert_eq!(widgets[0].order, 5);
    }
}

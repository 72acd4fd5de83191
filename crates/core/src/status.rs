//! Status aggregate - the published view of every widget's latest status
//!
//! The scheduler is the only writer. Every write goes through one mutex that
//! also records which scheduled task currently owns each widget id, so a
//! late result from a cancelled or replaced task can never land after the
//! widget was removed. Readers load a lock-free snapshot.

use crate::subscription::{spawn_listener, Subscription, SubscriptionHandle};
use arc_swap::ArcSwap;
use log::{debug, trace};
use pulseboard_types::{InstanceId, StatusMap, StatusRecord};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

/// Identifies one scheduled task for a widget id
pub type Generation = u64;

/// Shared, observable map of widget id to latest status record
pub struct StatusAggregate {
    current: ArcSwap<StatusMap>,
    /// Owning generation per widget id; held for the duration of each write
    owners: Mutex<HashMap<InstanceId, Generation>>,
    notify: watch::Sender<Arc<StatusMap>>,
}

impl StatusAggregate {
    pub fn new() -> Self {
        let initial = Arc::new(StatusMap::new());
        let (notify, _) = watch::channel(Arc::clone(&initial));
        Self {
            current: ArcSwap::new(initial),
            owners: Mutex::new(HashMap::new()),
            notify,
        }
    }

    /// Current full status map (cheap Arc clone)
    pub fn snapshot(&self) -> Arc<StatusMap> {
        self.current.load_full()
    }

    /// Latest record for one widget
    pub fn get(&self, id: InstanceId) -> Option<StatusRecord> {
        self.current.load().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    /// Subscribe to the full map; the current map is delivered first
    pub fn subscribe(&self) -> Subscription<Arc<StatusMap>> {
        Subscription::new(self.notify.subscribe())
    }

    /// Call `listener` with the full map now and after every change
    pub fn subscribe_with<F>(&self, listener: F) -> SubscriptionHandle
    where
        F: FnMut(&Arc<StatusMap>) + Send + 'static,
    {
        spawn_listener(self.subscribe(), listener)
    }

    /// Hand ownership of `id` to `generation`, superseding any earlier task
    pub(crate) fn claim(&self, id: InstanceId, generation: Generation) {
        let mut owners = self.owners.lock().unwrap_or_else(PoisonError::into_inner);
        owners.insert(id, generation);
        trace!("Widget {} now owned by generation {}", id, generation);
    }

    /// Drop ownership of `id` and remove its record
    pub(crate) fn release(&self, id: InstanceId) {
        let mut owners = self.owners.lock().unwrap_or_else(PoisonError::into_inner);
        owners.remove(&id);
        self.write_locked(id, None);
    }

    /// Drop every owner and clear the map
    pub(crate) fn release_all(&self) {
        let mut owners = self.owners.lock().unwrap_or_else(PoisonError::into_inner);
        owners.clear();
        if !self.current.load().is_empty() {
            let empty = Arc::new(StatusMap::new());
            self.current.store(Arc::clone(&empty));
            self.notify.send_replace(empty);
        }
    }

    /// Replace (`Some`) or remove (`None`) the record for `id`
    ///
    /// Discarded unless `generation` still owns the widget. Returns whether
    /// the write was applied.
    pub(crate) fn apply(&self, id: InstanceId, generation: Generation, record: Option<StatusRecord>) -> bool {
        let owners = self.owners.lock().unwrap_or_else(PoisonError::into_inner);
        if owners.get(&id) != Some(&generation) {
            debug!(
                "Discarding result for widget {} from stale generation {}",
                id, generation
            );
            return false;
        }
        self.write_locked(id, record);
        true
    }

    /// Must be called with `owners` locked
    fn write_locked(&self, id: InstanceId, record: Option<StatusRecord>) {
        let previous = self.current.load();
        let next = match record {
            Some(record) => {
                let mut map = StatusMap::clone(&previous);
                map.insert(id, record);
                map
            }
            None => {
                if !previous.contains_key(&id) {
                    return;
                }
                let mut map = StatusMap::clone(&previous);
                map.remove(&id);
                map
            }
        };
        let next = Arc::new(next);
        self.current.store(Arc::clone(&next));
        self.notify.send_replace(next);
    }
}

impl Default for StatusAggregate {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StatusAggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusAggregate")
            .field("records", &self.len())
            .field("subscribers", &self.notify.receiver_count())
            .finish()
    }
}

//! pulseboard-core: Polling orchestration for the pulseboard dashboard.
//!
//! This crate contains the capability registry, the fetch contract that
//! integrations implement, the outcome classifier, the instance source, the
//! poll scheduler and the status aggregate it publishes into.

pub mod capability;
pub mod classify;
pub mod connection;
pub mod constants;
pub mod error;
pub mod registry;
pub mod scheduler;
pub mod source;
pub mod status;
pub mod subscription;

pub use capability::{
    fetch_fn, CapabilityDescriptor, ConfigValidator, FetchFn, FetchOperation, FetchRequest,
};
pub use classify::{Outcome, OutcomeKind, RecordTarget};
pub use connection::test_connection;
pub use constants::DEFAULT_FETCH_TIMEOUT;
pub use error::{ConnectionTestError, FetchError, SchedulerError, StoreError};
pub use registry::CapabilityRegistry;
pub use scheduler::{PollScheduler, ScheduledInstance, SchedulerConfig};
pub use source::{InstanceSource, MemoryWidgetStore, Snapshot, WidgetStore};
pub use status::{Generation, StatusAggregate};
pub use subscription::{Subscription, SubscriptionHandle};

// Re-export types used in trait signatures for convenience
pub use pulseboard_types::{
    CapabilityMetadata, Category, ConfigField, ConfigTemplate, FetchPayload, FieldType,
    InstanceId, ServiceState, StatusMap, StatusRecord, WidgetConfig, WidgetInstance,
};

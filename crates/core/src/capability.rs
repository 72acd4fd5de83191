//! Capability descriptors and the fetch contract integrations implement

use crate::error::FetchError;
use async_trait::async_trait;
use pulseboard_types::{
    CapabilityMetadata, ConfigTemplate, FetchPayload, InstanceId, WidgetConfig,
};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Input handed to a fetch operation
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// The widget's configuration (opaque to the core)
    pub config: Arc<WidgetConfig>,
    /// Widget being polled; `None` while a user tests an unsaved config
    pub instance_id: Option<InstanceId>,
    /// Set when the user is checking credentials before saving
    pub validation_only: bool,
}

impl FetchRequest {
    /// Regular scheduled poll for a saved widget
    pub fn poll(instance_id: InstanceId, config: Arc<WidgetConfig>) -> Self {
        Self {
            config,
            instance_id: Some(instance_id),
            validation_only: false,
        }
    }

    /// Credential check for a configuration that has not been saved yet
    pub fn validation(config: Arc<WidgetConfig>) -> Self {
        Self {
            config,
            instance_id: None,
            validation_only: true,
        }
    }

    /// String value of a config key, trimmed, if present and non-empty
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Trait for all fetch operations
///
/// A fetch contacts one remote service, once. It must not retry internally:
/// the scheduler retries on the next tick and enforces its own timeout, so an
/// implementation may simply await the remote.
#[async_trait]
pub trait FetchOperation: Send + Sync {
    /// Produce a payload, or fail before any payload was available
    async fn fetch(&self, request: FetchRequest) -> Result<FetchPayload, FetchError>;
}

/// Adapter that lets an async closure act as a fetch operation
pub struct FetchFn<F>(F);

/// Wrap an async closure as a [`FetchOperation`]
pub fn fetch_fn<F, Fut>(f: F) -> FetchFn<F>
where
    F: Fn(FetchRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<FetchPayload, FetchError>> + Send,
{
    FetchFn(f)
}

#[async_trait]
impl<F, Fut> FetchOperation for FetchFn<F>
where
    F: Fn(FetchRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<FetchPayload, FetchError>> + Send,
{
    async fn fetch(&self, request: FetchRequest) -> Result<FetchPayload, FetchError> {
        (self.0)(request).await
    }
}

/// Static configuration check run before a widget is tested or saved
pub type ConfigValidator = fn(&WidgetConfig) -> Result<(), String>;

/// Registered definition of an integration type
#[derive(Clone)]
pub struct CapabilityDescriptor {
    pub metadata: CapabilityMetadata,
    pub config_template: ConfigTemplate,
    /// Integrations without a fetch operation always read as online
    pub fetch: Option<Arc<dyn FetchOperation>>,
    pub validator: Option<ConfigValidator>,
}

impl CapabilityDescriptor {
    pub fn new(metadata: CapabilityMetadata, config_template: ConfigTemplate) -> Self {
        Self {
            metadata,
            config_template,
            fetch: None,
            validator: None,
        }
    }

    pub fn with_fetch(mut self, fetch: impl FetchOperation + 'static) -> Self {
        self.fetch = Some(Arc::new(fetch));
        self
    }

    pub fn with_validator(mut self, validator: ConfigValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Integration type id
    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    /// Run the static validator, if any
    pub fn validate(&self, config: &WidgetConfig) -> Result<(), String> {
        match self.validator {
            Some(validator) => validator(config),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for CapabilityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityDescriptor")
            .field("metadata", &self.metadata)
            .field("fields", &self.config_template.fields.len())
            .field("has_fetch", &self.fetch.is_some())
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

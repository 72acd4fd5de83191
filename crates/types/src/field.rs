//! Configuration schema fields describing what an integration expects

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input type of a configuration field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Free text (e.g., a widget title)
    Text,
    /// Numeric value (e.g., refresh rate in seconds)
    Number,
    /// On/off switch
    Boolean,
    /// One of a fixed set of options
    Select,
    /// Masked secret input
    Password,
    /// Server address
    Url,
    /// E-mail address
    Email,
}

/// One choice of a `Select` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: Value,
    pub label: String,
}

/// Metadata describing a single configuration field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigField {
    /// Key in the widget configuration map
    pub key: String,
    /// Human-readable label
    pub label: String,
    /// Input type
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Whether the field must be present before the widget can be saved
    pub required: bool,
    /// Credentials are never echoed back to the presentation layer
    #[serde(default)]
    pub credential: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
}

impl ConfigField {
    /// Create a new optional, non-credential field
    pub fn new(key: impl Into<String>, label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            field_type,
            required: false,
            credential: false,
            default: None,
            placeholder: None,
            description: None,
            options: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn credential(mut self) -> Self {
        self.credential = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_options(mut self, options: Vec<SelectOption>) -> Self {
        self.options = options;
        self
    }
}

/// Ordered list of configuration fields for one integration type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigTemplate {
    pub fields: Vec<ConfigField>,
}

impl ConfigTemplate {
    pub fn new(fields: Vec<ConfigField>) -> Self {
        Self { fields }
    }

    /// Look up a field by key
    pub fn field(&self, key: &str) -> Option<&ConfigField> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Keys of required fields that are absent, null or blank in `config`
    ///
    /// The schema is advisory: this is only consulted when a user tests a
    /// configuration, never on the polling path.
    pub fn missing_required(&self, config: &serde_json::Map<String, Value>) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .filter(|f| match config.get(&f.key) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            })
            .map(|f| f.key.clone())
            .collect()
    }

    /// Keys of fields marked as credentials
    pub fn credential_keys(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.credential)
            .map(|f| f.key.as_str())
    }

    /// Copy of `config` with every credential field removed
    pub fn redact(&self, config: &serde_json::Map<String, Value>) -> serde_json::Map<String, Value> {
        let mut redacted = config.clone();
        for key in self.credential_keys() {
            redacted.remove(key);
        }
        redacted
    }
}

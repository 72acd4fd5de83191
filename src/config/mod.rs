//! Configuration management

mod settings;

pub use settings::{AppConfig, CONFIG_VERSION};

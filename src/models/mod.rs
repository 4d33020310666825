//! Data models

pub mod config_value;

pub use config_value::{ConfigMap, ConfigValue, ValueKind};

//! Configuration management for the helper

pub mod error;
pub mod parser;
pub mod persistence;
pub mod schema;
pub mod settings;
pub mod store;
pub mod validator;

pub use error::ConfigError;
pub use parser::ConfigParser;
pub use persistence::{ConfigStorage, FileStorage};
pub use schema::{default_config, ConfigSchema, FieldSpec};
pub use settings::{MonitorConfig, RepairPolicy};
pub use store::ConfigStore;
pub use validator::{ConfigValidator, ValidationResult, ValidationRule, ValidationSeverity};

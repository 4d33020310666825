//! Mouse Fix helper - config file monitoring and self-repair
//!
//! The helper keeps its settings in a single JSON file that users and other
//! processes may edit at any time. [`ConfigFileMonitor`] watches that file,
//! loads valid content into a shared [`ConfigStore`] and rewrites the file from
//! the last valid settings or defaults when it becomes unreadable.

pub mod config;
pub mod localization;
pub mod logging;
pub mod models;
pub mod monitor;

pub use config::{ConfigError, ConfigStore, MonitorConfig, RepairPolicy};
pub use models::{ConfigMap, ConfigValue};
pub use monitor::diagnostics::{DiagnosticSink, RepairDiagnostic, TracingSink};
pub use monitor::{ConfigFileMonitor, ConfigFileState, ReactionOutcome, RepairOutcome};

/// Result type alias for helper operations
pub type Result<T> = anyhow::Result<T>;

/// Error types surfaced by the helper binary
#[derive(thiserror::Error, Debug)]
pub enum HelperError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("File watching error: {0}")]
    WatchError(#[from] monitor::watcher::WatchError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

use crate::config::validator::ValidationResult;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Parse error: {message}")]
    Parse { message: String },
    #[error("Validation failed: {}", summarize(.findings))]
    Validation { findings: Vec<ValidationResult> },
    #[error("Could not write repaired config file: {0}")]
    RepairWrite(#[source] std::io::Error),
    #[error("No valid config to repair from: {message}")]
    RepairSourceExhausted { message: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ConfigError {
    /// Errors a repair can fix by rewriting the file
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ConfigError::Parse { .. } | ConfigError::Validation { .. })
    }
}

fn summarize(findings: &[ValidationResult]) -> String {
    findings
        .iter()
        .map(|f| f.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

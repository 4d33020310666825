use crate::config::error::ConfigError;
use crate::config::validator::{
    ConfigValidator, ValidationResult, ValidationRule, ValidationSeverity,
};
use crate::models::config_value::{config_map_from_json, ConfigMap};
use tracing::debug;

/// Decodes config file bytes into a validated [`ConfigMap`] and back
pub struct ConfigParser {
    validator: ConfigValidator,
}

impl ConfigParser {
    pub fn new(validator: ConfigValidator) -> Self {
        Self { validator }
    }

    pub fn validator(&self) -> &ConfigValidator {
        &self.validator
    }

    /// Decode and validate. Syntax and encoding problems map to
    /// [`ConfigError::Parse`], structural problems to [`ConfigError::Validation`].
    pub fn parse(&self, bytes: &[u8]) -> Result<ConfigMap, ConfigError> {
        let text = std::str::from_utf8(bytes).map_err(|e| ConfigError::Parse {
            message: format!("unreadable encoding: {}", e),
        })?;

        if text.trim().is_empty() {
            return Err(ConfigError::Parse {
                message: "config file is empty".to_string(),
            });
        }

        let document: serde_json::Value =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse {
                message: format!("invalid JSON: {}", e),
            })?;

        let config = config_map_from_json(document).map_err(|e| ConfigError::Validation {
            findings: vec![ValidationResult {
                rule: ValidationRule {
                    name: "unsupported_structure".to_string(),
                    description: "Config must be a dictionary of non-null values".to_string(),
                    severity: ValidationSeverity::Error,
                },
                message: e.to_string(),
                key: String::new(),
            }],
        })?;

        self.check(&config)?;
        Ok(config)
    }

    /// Validate an already decoded mapping
    pub fn check(&self, config: &ConfigMap) -> Result<(), ConfigError> {
        let results = self.validator.validate(config);
        for warning in results.iter().filter(|r| !r.is_error()) {
            debug!(key = %warning.key, "{}", warning.message);
        }

        let findings: Vec<_> = results.into_iter().filter(ValidationResult::is_error).collect();
        if findings.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation { findings })
        }
    }

    /// Canonical on-disk form: pretty JSON with a trailing newline
    pub fn serialize(&self, config: &ConfigMap) -> Result<Vec<u8>, ConfigError> {
        let mut bytes = serde_json::to_vec_pretty(config)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

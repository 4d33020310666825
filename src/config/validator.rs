use crate::config::schema::{ConfigSchema, FieldSpec};
use crate::models::config_value::{ConfigMap, ConfigValue, ValueKind};
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("Failed to compile key pattern: {0}")]
pub struct ValidatorInitError(#[from] regex::Error);

#[derive(Debug, Clone)]
pub struct ValidationRule {
    pub name: String,
    pub description: String,
    pub severity: ValidationSeverity,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationSeverity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub rule: ValidationRule,
    pub message: String,
    /// Key path the finding refers to
    pub key: String,
}

impl ValidationResult {
    pub fn is_error(&self) -> bool {
        self.rule.severity == ValidationSeverity::Error
    }
}

pub struct ConfigValidator {
    schema: ConfigSchema,
    rules: Vec<ValidationRule>,
    key_regex: Regex,
}

impl ConfigValidator {
    pub fn new(schema: ConfigSchema) -> Result<Self, ValidatorInitError> {
        let key_regex = Regex::new(r"^[A-Za-z][A-Za-z0-9_.-]*$")?;

        Ok(Self {
            schema,
            rules: Self::default_rules(),
            key_regex,
        })
    }

    pub fn schema(&self) -> &ConfigSchema {
        &self.schema
    }

    /// Run every rule against the mapping and return all findings
    pub fn validate(&self, config: &ConfigMap) -> Vec<ValidationResult> {
        let mut results = Vec::new();

        for key in self.schema.required_keys() {
            if !config.contains_key(key) {
                results.push(self.finding(
                    "missing_required_key",
                    key,
                    format!("Required key '{}' is missing", key),
                ));
            }
        }

        for (key, value) in config {
            if !self.key_regex.is_match(key) {
                results.push(self.finding(
                    "invalid_key_name",
                    key,
                    format!("Key '{}' is not a valid setting name", key),
                ));
            }

            match self.schema.field(key) {
                Some(spec) => results.extend(self.validate_field(spec, value)),
                None => results.push(self.finding(
                    "unknown_key",
                    key,
                    format!("Unknown key '{}' will be ignored", key),
                )),
            }
        }

        results
    }

    /// Error-severity findings only
    pub fn errors(&self, config: &ConfigMap) -> Vec<ValidationResult> {
        self.validate(config)
            .into_iter()
            .filter(ValidationResult::is_error)
            .collect()
    }

    pub fn is_valid(&self, config: &ConfigMap) -> bool {
        self.errors(config).is_empty()
    }

    fn validate_field(&self, spec: &FieldSpec, value: &ConfigValue) -> Vec<ValidationResult> {
        let mut results = Vec::new();

        // Floats accept integer literals; nothing else widens
        let kind_ok = value.kind() == spec.kind
            || (spec.kind == ValueKind::Float && value.kind() == ValueKind::Integer);
        if !kind_ok {
            results.push(self.finding(
                "wrong_value_type",
                spec.key,
                format!(
                    "Key '{}' must be a {}, found {}",
                    spec.key,
                    spec.kind,
                    value.kind()
                ),
            ));
            return results;
        }

        if let (Some((min, max)), Some(number)) = (spec.range, value.as_f64()) {
            if number < min || number > max {
                results.push(self.finding(
                    "value_out_of_range",
                    spec.key,
                    format!(
                        "Key '{}' is {}, expected between {} and {}",
                        spec.key, number, min, max
                    ),
                ));
            }
        }

        if let (Some(allowed), Some(text)) = (spec.allowed, value.as_str()) {
            if !allowed.contains(&text) {
                results.push(self.finding(
                    "value_not_allowed",
                    spec.key,
                    format!(
                        "Key '{}' has unsupported value '{}' (expected one of {})",
                        spec.key,
                        text,
                        allowed.join(", ")
                    ),
                ));
            }
        }

        if let Some(element_kind) = spec.element_kind {
            let mismatched = match value {
                ConfigValue::Array(items) => items.iter().any(|v| v.kind() != element_kind),
                ConfigValue::Map(entries) => entries.values().any(|v| v.kind() != element_kind),
                _ => false,
            };
            if mismatched {
                results.push(self.finding(
                    "wrong_element_type",
                    spec.key,
                    format!("Entries of '{}' must all be {}s", spec.key, element_kind),
                ));
            }
        }

        results
    }

    fn finding(&self, rule_name: &str, key: &str, message: String) -> ValidationResult {
        ValidationResult {
            rule: self.get_rule(rule_name),
            message,
            key: key.to_string(),
        }
    }

    fn get_rule(&self, name: &str) -> ValidationRule {
        self.rules
            .iter()
            .find(|r| r.name == name)
            .cloned()
            .unwrap_or_else(|| ValidationRule {
                name: name.to_string(),
                description: String::new(),
                severity: ValidationSeverity::Error,
            })
    }

    fn default_rules() -> Vec<ValidationRule> {
        vec![
            ValidationRule {
                name: "missing_required_key".to_string(),
                description: "Required settings must be present".to_string(),
                severity: ValidationSeverity::Error,
            },
            ValidationRule {
                name: "invalid_key_name".to_string(),
                description: "Setting names must start with a letter".to_string(),
                severity: ValidationSeverity::Error,
            },
            ValidationRule {
                name: "wrong_value_type".to_string(),
                description: "Known settings must have the expected type".to_string(),
                severity: ValidationSeverity::Error,
            },
            ValidationRule {
                name: "value_out_of_range".to_string(),
                description: "Numeric settings must be within bounds".to_string(),
                severity: ValidationSeverity::Error,
            },
            ValidationRule {
                name: "value_not_allowed".to_string(),
                description: "Enumerated settings must use a supported value".to_string(),
                severity: ValidationSeverity::Error,
            },
            ValidationRule {
                name: "wrong_element_type".to_string(),
                description: "Collection entries must have the expected type".to_string(),
                severity: ValidationSeverity::Error,
            },
            ValidationRule {
                name: "unknown_key".to_string(),
                description: "Setting is not used by this version".to_string(),
                severity: ValidationSeverity::Warning,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{default_config, SCROLL_SPEED};

    fn validator() -> ConfigValidator {
        ConfigValidator::new(ConfigSchema::default()).unwrap()
    }

    #[test]
    fn test_defaults_are_valid() {
        let v = validator();
        assert!(v.validate(&default_config()).is_empty());
    }

    #[test]
    fn test_missing_required_key() {
        let v = validator();
        let errors = v.errors(&ConfigMap::new());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule.name, "missing_required_key");
        assert_eq!(errors[0].key, SCROLL_SPEED);
    }

    #[test]
    fn test_wrong_type_and_range() {
        let v = validator();

        let mut config = default_config();
        config.insert(SCROLL_SPEED.to_string(), ConfigValue::from("fast"));
        assert!(v.errors(&config).iter().any(|r| r.rule.name == "wrong_value_type"));

        config.insert(SCROLL_SPEED.to_string(), ConfigValue::Integer(42));
        assert!(v.errors(&config).iter().any(|r| r.rule.name == "value_out_of_range"));
    }

    #[test]
    fn test_unknown_key_is_warning_only() {
        let v = validator();
        let mut config = default_config();
        config.insert("LegacyFlag".to_string(), ConfigValue::Bool(true));

        let results = v.validate(&config);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].rule.severity, ValidationSeverity::Warning);
        assert!(v.is_valid(&config));
    }

    #[test]
    fn test_element_types() {
        let v = validator();
        let mut config = default_config();
        config.insert(
            "ExcludedApps".to_string(),
            ConfigValue::Array(vec![ConfigValue::from("com.apple.Safari"), ConfigValue::Integer(1)]),
        );
        assert!(v.errors(&config).iter().any(|r| r.rule.name == "wrong_element_type"));
    }

    #[test]
    fn test_invalid_key_name() {
        let v = validator();
        let mut config = default_config();
        config.insert("1bad key".to_string(), ConfigValue::Bool(true));
        assert!(v.errors(&config).iter().any(|r| r.rule.name == "invalid_key_name"));
    }
}

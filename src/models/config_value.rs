//! Tagged configuration values
//!
//! The config file is a free-form key/value document. Values are decoded into
//! a closed set of variants so the validator can reason about types explicitly
//! instead of probing untyped JSON at every read site.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Top-level configuration mapping.
///
/// A `BTreeMap` keeps serialization deterministic, so writing the same mapping
/// twice yields byte-identical files.
pub type ConfigMap = BTreeMap<String, ConfigValue>;

/// A single configuration value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<ConfigValue>),
    Map(ConfigMap),
}

/// Coarse value type, used by schema rules and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Integer,
    Float,
    String,
    Array,
    Map,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Bool => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Float => "number",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Map => "dictionary",
        };
        f.write_str(name)
    }
}

/// Reasons a decoded JSON document cannot be represented as a [`ConfigMap`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// The document root is not an object
    UnexpectedTopLevel(&'static str),
    /// A `null` appeared at the given key path
    NullValue(String),
    /// A number that fits neither i64 nor f64
    UnrepresentableNumber(String),
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionError::UnexpectedTopLevel(found) => {
                write!(f, "unexpected top-level type: expected dictionary, found {}", found)
            }
            ConversionError::NullValue(path) => write!(f, "null value at '{}'", path),
            ConversionError::UnrepresentableNumber(path) => {
                write!(f, "number out of range at '{}'", path)
            }
        }
    }
}

impl ConfigValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            ConfigValue::Bool(_) => ValueKind::Bool,
            ConfigValue::Integer(_) => ValueKind::Integer,
            ConfigValue::Float(_) => ValueKind::Float,
            ConfigValue::String(_) => ValueKind::String,
            ConfigValue::Array(_) => ValueKind::Array,
            ConfigValue::Map(_) => ValueKind::Map,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; integers widen to f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Integer(i) => Some(*i as f64),
            ConfigValue::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ConfigMap> {
        match self {
            ConfigValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Convert an arbitrary JSON value, rejecting `null` anywhere in the tree
    pub fn from_json(value: serde_json::Value, path: &str) -> Result<Self, ConversionError> {
        use serde_json::Value;

        match value {
            Value::Null => Err(ConversionError::NullValue(path.to_string())),
            Value::Bool(b) => Ok(ConfigValue::Bool(b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(ConfigValue::Integer(i))
                } else if let Some(x) = n.as_f64() {
                    Ok(ConfigValue::Float(x))
                } else {
                    Err(ConversionError::UnrepresentableNumber(path.to_string()))
                }
            }
            Value::String(s) => Ok(ConfigValue::String(s)),
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| Self::from_json(item, &format!("{}[{}]", path, i)))
                .collect::<Result<Vec<_>, _>>()
                .map(ConfigValue::Array),
            Value::Object(object) => map_from_object(object, path).map(ConfigValue::Map),
        }
    }
}

/// Convert a decoded JSON document into a top-level [`ConfigMap`]
pub fn config_map_from_json(document: serde_json::Value) -> Result<ConfigMap, ConversionError> {
    use serde_json::Value;

    match document {
        Value::Object(object) => map_from_object(object, ""),
        Value::Null => Err(ConversionError::UnexpectedTopLevel("null")),
        Value::Bool(_) => Err(ConversionError::UnexpectedTopLevel("boolean")),
        Value::Number(_) => Err(ConversionError::UnexpectedTopLevel("number")),
        Value::String(_) => Err(ConversionError::UnexpectedTopLevel("string")),
        Value::Array(_) => Err(ConversionError::UnexpectedTopLevel("array")),
    }
}

fn map_from_object(
    object: serde_json::Map<String, serde_json::Value>,
    path: &str,
) -> Result<ConfigMap, ConversionError> {
    object
        .into_iter()
        .map(|(key, value)| {
            let child = if path.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", path, key)
            };
            ConfigValue::from_json(value, &child).map(|v| (key, v))
        })
        .collect()
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Integer(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Float(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<ConfigMap> for ConfigValue {
    fn from(value: ConfigMap) -> Self {
        ConfigValue::Map(value)
    }
}

impl From<Vec<ConfigValue>> for ConfigValue {
    fn from(value: Vec<ConfigValue>) -> Self {
        ConfigValue::Array(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_conversion() {
        let map = config_map_from_json(json!({
            "ScrollSpeed": 5,
            "Smoothness": 0.5,
            "ButtonRemaps": { "3": "MissionControl" },
            "ExcludedApps": ["com.apple.Terminal"],
        }))
        .unwrap();

        assert_eq!(map["ScrollSpeed"], ConfigValue::Integer(5));
        assert_eq!(map["Smoothness"].as_f64(), Some(0.5));
        assert_eq!(
            map["ButtonRemaps"].as_map().unwrap()["3"].as_str(),
            Some("MissionControl")
        );
        assert_eq!(map["ExcludedApps"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_rejects_non_object_root() {
        let err = config_map_from_json(json!([1, 2, 3])).unwrap_err();
        assert_eq!(err, ConversionError::UnexpectedTopLevel("array"));
        assert!(err.to_string().contains("unexpected top-level type"));
    }

    #[test]
    fn test_rejects_nested_null() {
        let err = config_map_from_json(json!({ "A": { "B": [1, null] } })).unwrap_err();
        assert_eq!(err, ConversionError::NullValue("A.B[1]".to_string()));
    }

    #[test]
    fn test_serializes_untagged() {
        let mut map = ConfigMap::new();
        map.insert("ScrollSpeed".to_string(), 3.into());
        map.insert("SmoothScroll".to_string(), true.into());

        let text = serde_json::to_string(&map).unwrap();
        assert_eq!(text, r#"{"ScrollSpeed":3,"SmoothScroll":true}"#);
    }
}

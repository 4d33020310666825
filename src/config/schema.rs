//! Schema and defaults for the helper's config file

use crate::models::config_value::{ConfigMap, ConfigValue, ValueKind};

pub const SCROLL_SPEED: &str = "ScrollSpeed";
pub const SMOOTH_SCROLL: &str = "SmoothScroll";
pub const SCROLL_INVERTED: &str = "ScrollInverted";
pub const PRECISION_MODIFIER: &str = "PrecisionModifier";
pub const BUTTON_REMAPS: &str = "ButtonRemaps";
pub const EXCLUDED_APPS: &str = "ExcludedApps";

/// Expectation for one top-level key
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub kind: ValueKind,
    pub required: bool,
    /// Inclusive numeric bounds, checked for integers and floats
    pub range: Option<(f64, f64)>,
    /// Required element type for arrays / value type for dictionaries
    pub element_kind: Option<ValueKind>,
    /// Accepted values for strings
    pub allowed: Option<&'static [&'static str]>,
}

impl FieldSpec {
    const fn new(key: &'static str, kind: ValueKind) -> Self {
        Self {
            key,
            kind,
            required: false,
            range: None,
            element_kind: None,
            allowed: None,
        }
    }

    const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    const fn range(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }

    const fn elements(mut self, kind: ValueKind) -> Self {
        self.element_kind = Some(kind);
        self
    }

    const fn one_of(mut self, values: &'static [&'static str]) -> Self {
        self.allowed = Some(values);
        self
    }
}

const MODIFIERS: &[&str] = &["shift", "control", "option", "command", "none"];

/// The set of keys the helper knows about
#[derive(Debug, Clone)]
pub struct ConfigSchema {
    pub fields: Vec<FieldSpec>,
}

impl ConfigSchema {
    pub fn field(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn required_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().filter(|f| f.required).map(|f| f.key)
    }
}

impl Default for ConfigSchema {
    fn default() -> Self {
        Self {
            fields: vec![
                FieldSpec::new(SCROLL_SPEED, ValueKind::Integer)
                    .required()
                    .range(1.0, 10.0),
                FieldSpec::new(SMOOTH_SCROLL, ValueKind::Bool),
                FieldSpec::new(SCROLL_INVERTED, ValueKind::Bool),
                FieldSpec::new(PRECISION_MODIFIER, ValueKind::String).one_of(MODIFIERS),
                FieldSpec::new(BUTTON_REMAPS, ValueKind::Map).elements(ValueKind::String),
                FieldSpec::new(EXCLUDED_APPS, ValueKind::Array).elements(ValueKind::String),
            ],
        }
    }
}

/// Mapping written when no usable config exists
pub fn default_config() -> ConfigMap {
    let mut map = ConfigMap::new();
    map.insert(SCROLL_SPEED.to_string(), ConfigValue::Integer(3));
    map.insert(SMOOTH_SCROLL.to_string(), ConfigValue::Bool(true));
    map.insert(SCROLL_INVERTED.to_string(), ConfigValue::Bool(false));
    map.insert(PRECISION_MODIFIER.to_string(), ConfigValue::from("shift"));
    map.insert(BUTTON_REMAPS.to_string(), ConfigValue::Map(ConfigMap::new()));
    map.insert(EXCLUDED_APPS.to_string(), ConfigValue::Array(Vec::new()));
    map
}

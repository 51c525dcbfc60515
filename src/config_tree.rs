//! Key/value configuration tree handed to the monitoring context.
//!
//! Mirrors the shape of a collector configuration block: each item has a
//! key and a list of typed values. The exporter builds the tree from the
//! `rdt` section of its configuration file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single typed configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Boolean(_) => "boolean",
            ConfigValue::Integer(_) => "integer",
            ConfigValue::Float(_) => "float",
            ConfigValue::String(_) => "string",
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Boolean(b) => write!(f, "{}", b),
            ConfigValue::Integer(i) => write!(f, "{}", i),
            ConfigValue::Float(x) => write!(f, "{}", x),
            ConfigValue::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::String(s.to_string())
    }
}

/// One value or a list of values, as written in a configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValues {
    Many(Vec<ConfigValue>),
    One(ConfigValue),
}

impl ConfigValues {
    pub fn into_vec(self) -> Vec<ConfigValue> {
        match self {
            ConfigValues::Many(values) => values,
            ConfigValues::One(value) => vec![value],
        }
    }
}

/// A configuration key with its values.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigItem {
    pub key: String,
    pub values: Vec<ConfigValue>,
}

impl ConfigItem {
    pub fn new(key: impl Into<String>, values: Vec<ConfigValue>) -> Self {
        Self {
            key: key.into(),
            values,
        }
    }

    /// Convenience constructor for a key with string values.
    pub fn strings<I, S>(key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            key,
            values
                .into_iter()
                .map(|s| ConfigValue::String(s.into()))
                .collect(),
        )
    }
}

/// Flattens a configuration file section into items.
pub fn items_from_section(section: &BTreeMap<String, ConfigValues>) -> Vec<ConfigItem> {
    section
        .iter()
        .map(|(key, values)| ConfigItem::new(key.clone(), values.clone().into_vec()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_from_yaml() {
        let yaml = r#"
Cores:
  - "0-3"
  - "4,5"
Verbose: true
Interval: 10
"#;
        let section: BTreeMap<String, ConfigValues> = serde_yaml::from_str(yaml).unwrap();
        let items = items_from_section(&section);

        let cores = items.iter().find(|i| i.key == "Cores").unwrap();
        assert_eq!(cores.values, vec![ConfigValue::from("0-3"), ConfigValue::from("4,5")]);

        let verbose = items.iter().find(|i| i.key == "Verbose").unwrap();
        assert_eq!(verbose.values, vec![ConfigValue::Boolean(true)]);

        let interval = items.iter().find(|i| i.key == "Interval").unwrap();
        assert_eq!(interval.values[0].type_name(), "integer");
    }

    #[test]
    fn single_string_becomes_list() {
        let section: BTreeMap<String, ConfigValues> =
            serde_json::from_str(r#"{"Cores": "0-1"}"#).unwrap();
        let items = items_from_section(&section);
        assert_eq!(items[0].values, vec![ConfigValue::from("0-1")]);
    }

    #[test]
    fn mixed_list_keeps_types() {
        let section: BTreeMap<String, ConfigValues> =
            serde_json::from_str(r#"{"Cores": ["0-1", 7]}"#).unwrap();
        let items = items_from_section(&section);
        assert_eq!(items[0].values[1], ConfigValue::Integer(7));
        assert!(items[0].values[1].as_str().is_none());
    }

    #[test]
    fn strings_constructor() {
        let item = ConfigItem::strings("Cores", ["1", "2"]);
        assert_eq!(item.values.len(), 2);
        assert_eq!(item.values[0].as_str(), Some("1"));
    }
}

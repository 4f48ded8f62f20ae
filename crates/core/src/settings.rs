//! Hierarchical build settings.
//!
//! Every recipe, project and builder carries a [`Settings`] map. Settings cascade
//! top-down exactly once, when the build graph is constructed: a child's map is
//! the parent's map updated with the child's own keys.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BundleError, Result};

/// A single setting value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Integer(i64),
    String(String),
    List(Vec<String>),
}

impl SettingValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            SettingValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a list of words. Strings are split on whitespace.
    pub fn to_list(&self) -> Vec<String> {
        match self {
            SettingValue::List(items) => items.clone(),
            SettingValue::String(s) => s.split_whitespace().map(str::to_string).collect(),
            other => vec![other.to_string()],
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(b) => write!(f, "{}", b),
            SettingValue::Integer(i) => write!(f, "{}", i),
            SettingValue::String(s) => f.write_str(s),
            SettingValue::List(items) => f.write_str(&items.join(" ")),
        }
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::String(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::String(value)
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Integer(value)
    }
}

impl From<Vec<String>> for SettingValue {
    fn from(value: Vec<String>) -> Self {
        SettingValue::List(value)
    }
}

impl From<Vec<&str>> for SettingValue {
    fn from(value: Vec<&str>) -> Self {
        SettingValue::List(value.into_iter().map(str::to_string).collect())
    }
}

/// An ordered mapping from option name to value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    values: BTreeMap<String, SettingValue>,
}

impl Settings {
    /// Creates an empty settings map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `parent` updated key-by-key with `child`. Neither input changes.
    ///
    /// The merge is shallow: a list in `child` replaces the parent's list.
    pub fn merge(parent: &Settings, child: &Settings) -> Settings {
        let mut merged = parent.clone();
        merged.update(child);
        merged
    }

    /// Overwrites every key present in `other`.
    pub fn update(&mut self, other: &Settings) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<SettingValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<SettingValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Inserts only if the key is absent.
    pub fn insert_default(&mut self, key: impl Into<String>, value: impl Into<SettingValue>) {
        self.values.entry(key.into()).or_insert_with(|| value.into());
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(SettingValue::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(SettingValue::as_bool)
    }

    /// Returns a list setting, or an empty list when absent.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key).map(SettingValue::to_list).unwrap_or_default()
    }

    /// Returns a string setting or an [`BundleError::InvalidSetting`] error.
    pub fn require_str(&self, key: &str) -> Result<&str> {
        match self.get(key) {
            Some(SettingValue::String(s)) => Ok(s),
            Some(other) => Err(BundleError::invalid_setting(
                key,
                format!("expected a string, found '{}'", other),
            )),
            None => Err(BundleError::invalid_setting(key, "missing")),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SettingValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Renders every value as a string, for `${key}` substitution.
    pub fn to_substitutions(&self) -> HashMap<String, String> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for Settings
where
    K: Into<String>,
    V: Into<SettingValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut settings = Settings::new();
        for (key, value) in iter {
            settings.insert(key, value);
        }
        settings
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", key, value)?;
        }
        f.write_str("}")
    }
}

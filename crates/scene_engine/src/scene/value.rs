//! Dynamic values flowing into node configuration
//!
//! Scene data, config overrides and node parameters are all loosely typed
//! maps of [`Value`]s, so they can be built in code or loaded from TOML/RON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A loosely typed configuration value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Explicit null (still counts as a defined value)
    Null,
    /// Boolean
    Bool(bool),
    /// Number
    Number(f64),
    /// String
    Text(String),
    /// Ordered list
    List(Vec<Value>),
    /// Nested map
    Map(Params),
}

impl Value {
    /// Numeric value, if this is a number
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Boolean value, if this is a bool
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Text value, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Nested map, if this is one
    pub const fn as_map(&self) -> Option<&Params> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Whether this is [`Value::Null`]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(list: Vec<Value>) -> Self {
        Self::List(list)
    }
}

impl From<Params> for Value {
    fn from(map: Params) -> Self {
        Self::Map(map)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Ordered parameter map of a node, a scene data set or a config override
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, Value>);

impl Params {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert a value, returning the one it replaced
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Remove a value
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Look up a value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether the key is defined
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Look up a number
    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    /// Look up a string
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Look up a nested map
    pub fn map(&self, key: &str) -> Option<&Self> {
        self.get(key).and_then(Value::as_map)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Fill in every key this map does not define from `defaults`
    ///
    /// Values the caller defined, including explicit nulls, are kept.
    pub fn apply_defaults(&mut self, defaults: &Self) {
        for (key, value) in &defaults.0 {
            self.0.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    /// Overwrite entries with every value in `overrides`
    pub fn apply_overrides(&mut self, overrides: &Self) {
        for (key, value) in &overrides.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_lose_to_defined_values() {
        let mut params = Params::new().with("shine", 6.0).with("emit", Value::Null);
        let defaults = Params::new().with("shine", 1.0).with("emit", 0.5).with("specular", 0.9);
        params.apply_defaults(&defaults);

        assert_eq!(params.number("shine"), Some(6.0));
        assert!(params.get("emit").unwrap().is_null());
        assert_eq!(params.number("specular"), Some(0.9));
    }

    #[test]
    fn test_overrides_win() {
        let mut params = Params::new().with("angle", 10.0).with("x", 1.0);
        params.apply_overrides(&Params::new().with("angle", 45.0));
        assert_eq!(params.number("angle"), Some(45.0));
        assert_eq!(params.number("x"), Some(1.0));
    }

    #[test]
    fn test_params_from_toml() {
        let text = "yaw = 315\npitch = 20.5\nlabel = \"cube\"\n[eye]\nx = -1.0\n";
        let params: Params = toml::from_str(text).unwrap();
        assert_eq!(params.number("yaw"), Some(315.0));
        assert_eq!(params.text("label"), Some("cube"));
        assert_eq!(params.map("eye").and_then(|eye| eye.number("x")), Some(-1.0));
    }

    #[test]
    fn test_params_from_ron() {
        let params: Params = ron::from_str("{\"visible\": true, \"ids\": [1, 2]}").unwrap();
        assert_eq!(params.get("visible").and_then(Value::as_bool), Some(true));
        assert_eq!(params.get("ids"), Some(&Value::List(vec![1.into(), 2.into()])));
    }
}

//! The variable bag handed to the renderer.
//!
//! Values are either text, substituted verbatim, or flags, which drive
//! `{{#if}}` / `{{#unless}}` blocks. A bag can be built in code, loaded from
//! a small TOML file, or assembled from `name=value` CLI assignments.

use super::TemplateError;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Flag(bool),
}

impl Value {
    /// Non-empty text and `true` flags are truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Text(s) => !s.is_empty(),
            Value::Flag(b) => *b,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Flag(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Flag(b)
    }
}

/// Name → value mapping supplied at render time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables {
    values: BTreeMap<String, Value>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Builder-style [`Variables::set`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Absent names are falsy.
    pub fn is_truthy(&self, name: &str) -> bool {
        self.values.get(name).is_some_and(Value::is_truthy)
    }

    /// String form of a value, empty when absent.
    pub fn text(&self, name: &str) -> String {
        self.values
            .get(name)
            .map(ToString::to_string)
            .unwrap_or_default()
    }

    /// Insert every entry of `defaults` whose name is not already set.
    pub fn fill_missing<I, K, V>(&mut self, defaults: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (name, value) in defaults {
            self.values.entry(name.into()).or_insert_with(|| value.into());
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parse a flat TOML table of strings and booleans.
    ///
    /// Numbers are accepted and stored as text. Arrays, tables and dates
    /// have no meaning in a template and are rejected.
    pub fn from_toml_str(content: &str) -> Result<Self, TemplateError> {
        let table: toml::Table = toml::from_str(content)?;
        let mut vars = Variables::new();
        for (name, value) in table {
            let value = match value {
                toml::Value::String(s) => Value::Text(s),
                toml::Value::Boolean(b) => Value::Flag(b),
                toml::Value::Integer(i) => Value::Text(i.to_string()),
                toml::Value::Float(f) => Value::Text(f.to_string()),
                other => {
                    return Err(TemplateError::InvalidVariable(format!(
                        "'{name}' must be a string or boolean, found {}",
                        other.type_str()
                    )));
                }
            };
            vars.values.insert(name, value);
        }
        Ok(vars)
    }

    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        if !path.exists() {
            return Err(TemplateError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Apply a `name=value` assignment as text.
    pub fn assign(&mut self, assignment: &str) -> Result<(), TemplateError> {
        let (name, value) = assignment.split_once('=').ok_or_else(|| {
            TemplateError::InvalidVariable(format!("expected name=value, got '{assignment}'"))
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(TemplateError::InvalidVariable(format!(
                "empty name in '{assignment}'"
            )));
        }
        self.set(name, value);
        Ok(())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Variables {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut vars = Variables::new();
        for (k, v) in iter {
            vars.set(k, v);
        }
        vars
    }
}

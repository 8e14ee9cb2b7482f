//! # Command messages and argument typing.
//!
//! A [`Message`] is a topic plus named argument values; [`ArgType`] is the
//! manifest-declared type a value must satisfy. Messages derive serde so
//! they can cross the external message bus unchanged.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One argument value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self {
        ArgValue::Str(v.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(v: String) -> Self {
        ArgValue::Str(v)
    }
}

impl From<i64> for ArgValue {
    fn from(v: i64) -> Self {
        ArgValue::Int(v)
    }
}

impl From<f64> for ArgValue {
    fn from(v: f64) -> Self {
        ArgValue::Float(v)
    }
}

impl From<bool> for ArgValue {
    fn from(v: bool) -> Self {
        ArgValue::Bool(v)
    }
}

/// Manifest-declared argument type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    String,
    Int,
    Float,
    Bool,
    Unknown,
}

impl ArgType {
    /// Parses a manifest type string, case-insensitively.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "string" => ArgType::String,
            "int" => ArgType::Int,
            "float" => ArgType::Float,
            "bool" => ArgType::Bool,
            _ => ArgType::Unknown,
        }
    }

    /// Whether `value` satisfies this type. `Unknown` accepts anything;
    /// ints satisfy `Float` (the manifest cannot express an int literal for
    /// a float argument otherwise).
    pub fn matches(self, value: &ArgValue) -> bool {
        match (self, value) {
            (ArgType::Unknown, _) => true,
            (ArgType::String, ArgValue::Str(_)) => true,
            (ArgType::Int, ArgValue::Int(_)) => true,
            (ArgType::Float, ArgValue::Float(_) | ArgValue::Int(_)) => true,
            (ArgType::Bool, ArgValue::Bool(_)) => true,
            _ => false,
        }
    }
}

/// Topic plus named argument values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    pub topic: String,
    #[serde(default)]
    pub values: HashMap<String, ArgValue>,
}

impl Message {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            values: HashMap::new(),
        }
    }

    /// Builder-style argument attachment.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn str_arg(&self, key: &str) -> Option<&str> {
        match self.values.get(key)? {
            ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn int_arg(&self, key: &str) -> Option<i64> {
        match self.values.get(key)? {
            ArgValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn float_arg(&self, key: &str) -> Option<f64> {
        match self.values.get(key)? {
            ArgValue::Float(v) => Some(*v),
            ArgValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn bool_arg(&self, key: &str) -> Option<bool> {
        match self.values.get(key)? {
            ArgValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

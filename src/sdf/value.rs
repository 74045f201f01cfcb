//! Attribute values and time codes.

use std::collections::BTreeMap;
use std::fmt;

use glam::{DMat4, DVec3};
use serde::{Deserialize, Serialize};

/// Time at which a value is authored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TimeCode {
    /// The non-animated default value.
    Default,
    /// A time sample.
    Time(f64),
}

impl TimeCode {
    /// Check if this is the default time.
    #[inline]
    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }

    /// Sample time, `None` for the default time.
    #[inline]
    pub fn time(&self) -> Option<f64> {
        match self {
            Self::Default => None,
            Self::Time(t) => Some(*t),
        }
    }
}

impl Default for TimeCode {
    fn default() -> Self {
        Self::Default
    }
}

/// Scalar type of an attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueType {
    Bool,
    Int,
    Double,
    String,
    Token,
    Asset,
    Double3,
    Matrix4d,
    IntArray,
    DoubleArray,
    Double3Array,
    TokenArray,
    Dictionary,
}

impl ValueType {
    /// All types in tag order.
    pub const ALL: [ValueType; 13] = [
        Self::Bool,
        Self::Int,
        Self::Double,
        Self::String,
        Self::Token,
        Self::Asset,
        Self::Double3,
        Self::Matrix4d,
        Self::IntArray,
        Self::DoubleArray,
        Self::Double3Array,
        Self::TokenArray,
        Self::Dictionary,
    ];

    /// Type name as written in text layers.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int64",
            Self::Double => "double",
            Self::String => "string",
            Self::Token => "token",
            Self::Asset => "asset",
            Self::Double3 => "double3",
            Self::Matrix4d => "matrix4d",
            Self::IntArray => "int64[]",
            Self::DoubleArray => "double[]",
            Self::Double3Array => "double3[]",
            Self::TokenArray => "token[]",
            Self::Dictionary => "dictionary",
        }
    }

    /// Look up a type by its text name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }

    /// Binary tag.
    pub fn tag(&self) -> u8 {
        Self::ALL.iter().position(|t| t == self).unwrap_or(0) as u8
    }

    /// Type from a binary tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Attribute or metadata value.
///
/// Deserializes from `{"type": "double3", "value": [0, 1, 0]}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    #[serde(rename = "bool")]
    Bool(bool),
    #[serde(rename = "int64")]
    Int(i64),
    #[serde(rename = "double")]
    Double(f64),
    #[serde(rename = "string")]
    String(String),
    #[serde(rename = "token")]
    Token(String),
    #[serde(rename = "asset")]
    Asset(String),
    #[serde(rename = "double3")]
    Double3(DVec3),
    #[serde(rename = "matrix4d")]
    Matrix4d(DMat4),
    #[serde(rename = "int64[]")]
    IntArray(Vec<i64>),
    #[serde(rename = "double[]")]
    DoubleArray(Vec<f64>),
    #[serde(rename = "double3[]")]
    Double3Array(Vec<DVec3>),
    #[serde(rename = "token[]")]
    TokenArray(Vec<String>),
    #[serde(rename = "dictionary")]
    Dictionary(BTreeMap<String, Value>),
}

impl Value {
    /// Type of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Double(_) => ValueType::Double,
            Self::String(_) => ValueType::String,
            Self::Token(_) => ValueType::Token,
            Self::Asset(_) => ValueType::Asset,
            Self::Double3(_) => ValueType::Double3,
            Self::Matrix4d(_) => ValueType::Matrix4d,
            Self::IntArray(_) => ValueType::IntArray,
            Self::DoubleArray(_) => ValueType::DoubleArray,
            Self::Double3Array(_) => ValueType::Double3Array,
            Self::TokenArray(_) => ValueType::TokenArray,
            Self::Dictionary(_) => ValueType::Dictionary,
        }
    }

    /// Token or string payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Token(s) | Self::Asset(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric payload as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Matrix payload.
    pub fn as_matrix(&self) -> Option<DMat4> {
        match self {
            Self::Matrix4d(m) => Some(*m),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<DVec3> for Value {
    fn from(v: DVec3) -> Self {
        Self::Double3(v)
    }
}

impl From<DMat4> for Value {
    fn from(v: DMat4) -> Self {
        Self::Matrix4d(v)
    }
}

//! Attribute values and identifiers
//!
//! Values are compared exactly and type-stably: an `Int(1)` never equals a
//! `Float(1.0)` or `Bytes(b"1")`. Floats use IEEE total ordering so every
//! float (including NaN) is a well-defined reverse-index key.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifies one attribute column within a store
pub type AttributeId = u32;

/// Identifies one object within an attribute column
pub type ObjectId = u64;

/// A scalar attribute value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
}

impl Value {
    /// Variant rank used to order values of different types
    fn rank(&self) -> u8 {
        match self {
            Value::Int(_) => 0,
            Value::Float(_) => 1,
            Value::Bytes(_) => 2,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{:?}", v),
            Value::Bytes(v) => match std::str::from_utf8(v) {
                Ok(s) => write!(f, "{:?}", s),
                Err(_) => write!(f, "{:?}", v),
            },
        }
    }
}

/// Parses a value literal
///
/// - `int:<n>`, `float:<x>`, `bytes:<text>` select the variant explicitly
/// - otherwise integers parse as `Int`, other numbers as `Float`, and
///   anything else becomes `Bytes`
impl FromStr for Value {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix("int:") {
            return rest
                .parse()
                .map(Value::Int)
                .map_err(|e| format!("invalid int literal {:?}: {}", rest, e));
        }
        if let Some(rest) = s.strip_prefix("float:") {
            return rest
                .parse()
                .map(Value::Float)
                .map_err(|e| format!("invalid float literal {:?}: {}", rest, e));
        }
        if let Some(rest) = s.strip_prefix("bytes:") {
            return Ok(Value::Bytes(rest.as_bytes().to_vec()));
        }
        if let Ok(v) = s.parse::<i64>() {
            return Ok(Value::Int(v));
        }
        if let Ok(v) = s.parse::<f64>() {
            return Ok(Value::Float(v));
        }
        Ok(Value::Bytes(s.as_bytes().to_vec()))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Bytes(v.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Bytes(v.into_bytes())
    }
}

//! Loosely-typed parameter values crossing the netlist boundary.

use std::time::Duration;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// A typed scalar as delivered by the external netlist parser.
///
/// The bridge is the only place these are coerced into the strongly typed
/// parameters of a device kind; everything past the bridge works with
/// concrete `f64`/`bool` fields. Devices also hand scalars back through this
/// type when scratch state is observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Float(f64),
    Int(i64),
    Bool(bool),
    Str(String),
    Complex(Complex64),
    Duration(Duration),
}

impl Value {
    /// Name of the contained type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Float(_) => "float",
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Complex(_) => "complex",
            Value::Duration(_) => "duration",
        }
    }

    /// Numeric view. Ints widen, durations read as seconds.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::Duration(d) => Some(d.as_secs_f64()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

//! The dynamic operand type flowing between the scanner context and the
//! operator catalogue.
//!
//! The scanner that produces a runtime context is an external collaborator:
//! all we know about it is that it hands us a `HashMap<String, Value>` whose
//! values can be scalars, sequences, or nested maps. [`Value`] is the tagged
//! variant that carries that uncertainty through the evaluation engine, and
//! [`to_string`], [`to_float`], [`to_semver`] are the coercion functions every
//! operator composes from.

use std::collections::HashMap;
use std::fmt;

use semver::Version;
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// Value
// ═══════════════════════════════════════════════════════════════════════════════

/// A dynamically-typed operand: the type of everything a scanner context maps
/// field names to, and the type every trigger/rule `value` parses into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Seq(Vec<Value>),
    Map(HashMap<String, Value>),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_string(self))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Coercion errors
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, thiserror::Error)]
pub enum CoercionError {
    #[error("cannot coerce {0:?} to a number")]
    NotANumber(Value),
    #[error("cannot parse {0:?} as a semantic version: {1}")]
    NotASemver(Value, String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// Coercion rules (§4.2)
// ═══════════════════════════════════════════════════════════════════════════════

/// `toString`: nil -> "", strings as-is, bool/int/float via canonical textual
/// form, everything else via a default stringification.
pub fn to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Seq(items) => {
            let parts: Vec<String> = items.iter().map(to_string).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Map(_) => format!("{:?}", value),
    }
}

/// `toFloat`: accepts float/int of any width, parses strings, fails on
/// anything else.
pub fn to_float(value: &Value) -> Result<f64, CoercionError> {
    match value {
        Value::Int(i) => Ok(*i as f64),
        Value::Float(f) => Ok(*f),
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| CoercionError::NotANumber(value.clone())),
        _ => Err(CoercionError::NotANumber(value.clone())),
    }
}

/// `toSemver`: parses strings with the common 3-component form (accepting an
/// optional leading `v`); other types coerce via `toString` first.
pub fn to_semver(value: &Value) -> Result<Version, CoercionError> {
    let raw = match value {
        Value::String(s) => s.clone(),
        other => to_string(other),
    };
    parse_semver_lenient(&raw).map_err(|e| CoercionError::NotASemver(value.clone(), e))
}

/// Normalises a version string by stripping a leading `v`/`V` and parses it,
/// padding missing minor/patch components with zero so "8.5" and "8" parse
/// the same way "8.5.0"/"8.0.0" would.
pub fn parse_semver_lenient(raw: &str) -> Result<Version, String> {
    let trimmed = raw.trim();
    let stripped = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);
    let components = stripped.split('.').count();
    let padded = match components {
        1 => format!("{stripped}.0.0"),
        2 => format!("{stripped}.0"),
        _ => stripped.to_string(),
    };
    Version::parse(&padded).map_err(|e| e.to_string())
}

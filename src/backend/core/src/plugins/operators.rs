//! The operator catalogue: pure Boolean functions over two dynamically-typed
//! operands with deterministic coercion rules.
//!
//! Operators are stored as boxed closures in an [`OperatorRegistry`] rather
//! than as a global table, per the design note in the specification this
//! engine implements: callers may register additional named operators at
//! construction time and registration is last-write-wins.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;

use super::value::{to_float, to_semver, to_string, Value};

// ═══════════════════════════════════════════════════════════════════════════════
// Operator errors
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, thiserror::Error)]
pub enum OperatorError {
    #[error("unknown operator: {0}")]
    Unknown(String),

    #[error("operator {op}: invalid regular expression {pattern:?}: {source}")]
    BadRegex {
        op: String,
        pattern: String,
        source: regex::Error,
    },

    #[error("operator {op}: expected a numeric operand: {source}")]
    BadNumber {
        op: String,
        #[source]
        source: super::value::CoercionError,
    },

    #[error("operator {op}: expected a semantic version operand: {source}")]
    BadVersion {
        op: String,
        #[source]
        source: super::value::CoercionError,
    },

    #[error("operator {op}: `between` requires a 2-element [min, max] sequence, got {value:?}")]
    BadRange { op: String, value: Value },

    #[error("operator {op}: expected a boolean value, got {value:?}")]
    BadBool { op: String, value: Value },

    #[error("operator {op}: `in`/`notIn` requires a sequence, got {value:?}")]
    BadSequence { op: String, value: Value },
}

// ═══════════════════════════════════════════════════════════════════════════════
// Operator trait object
// ═══════════════════════════════════════════════════════════════════════════════

/// A named, pure Boolean function over two dynamically-typed operands.
pub type OperatorFn = Arc<dyn Fn(&Value, &Value) -> Result<bool, OperatorError> + Send + Sync>;

/// A builder/registry object mapping operator names to implementations.
///
/// Constructed via [`OperatorRegistry::with_builtins`]; additional operators
/// are added with [`OperatorRegistry::register`], which replaces any prior
/// entry under the same name (last-write-wins).
#[derive(Clone)]
pub struct OperatorRegistry {
    operators: HashMap<String, OperatorFn>,
}

impl OperatorRegistry {
    /// An empty registry with no operators at all.
    pub fn empty() -> Self {
        Self {
            operators: HashMap::new(),
        }
    }

    /// The closed builtin catalogue from the operator specification.
    pub fn with_builtins() -> Self {
        let mut reg = Self::empty();
        reg.register("equals", |a, b| Ok(to_string(a) == to_string(b)));
        reg.register("contains", |a, b| Ok(to_string(a).contains(&to_string(b))));
        reg.register("startsWith", |a, b| Ok(to_string(a).starts_with(&to_string(b))));
        reg.register("endsWith", |a, b| Ok(to_string(a).ends_with(&to_string(b))));
        reg.register("matches", |a, b| {
            let pattern = to_string(b);
            let re = Regex::new(&pattern).map_err(|source| OperatorError::BadRegex {
                op: "matches".into(),
                pattern: pattern.clone(),
                source,
            })?;
            Ok(re.is_match(&to_string(a)))
        });
        reg.register("gt", |a, b| numeric_cmp("gt", a, b, |x, y| x > y));
        reg.register("gte", |a, b| numeric_cmp("gte", a, b, |x, y| x >= y));
        reg.register("lt", |a, b| numeric_cmp("lt", a, b, |x, y| x < y));
        reg.register("lte", |a, b| numeric_cmp("lte", a, b, |x, y| x <= y));
        reg.register("between", |a, b| {
            let actual = to_float(a).map_err(|source| OperatorError::BadNumber {
                op: "between".into(),
                source,
            })?;
            let (min, max) = numeric_bounds("between", b)?;
            Ok(actual >= min && actual <= max)
        });
        reg.register("version_eq", |a, b| semver_cmp("version_eq", a, b, |x, y| x == y));
        reg.register("version_lt", |a, b| semver_cmp("version_lt", a, b, |x, y| x < y));
        reg.register("version_gt", |a, b| semver_cmp("version_gt", a, b, |x, y| x > y));
        reg.register("version_lte", |a, b| semver_cmp("version_lte", a, b, |x, y| x <= y));
        reg.register("version_gte", |a, b| semver_cmp("version_gte", a, b, |x, y| x >= y));
        reg.register("version_between", |a, b| {
            let actual = to_semver(a).map_err(|source| OperatorError::BadVersion {
                op: "version_between".into(),
                source,
            })?;
            let (min, max) = semver_bounds("version_between", b)?;
            Ok(actual >= min && actual <= max)
        });
        reg.register("exists", |_actual, expected| {
            expected.as_bool().ok_or_else(|| OperatorError::BadBool {
                op: "exists".into(),
                value: expected.clone(),
            })
        });
        reg.register("in", |a, b| in_sequence(a, b, "in"));
        reg.register("notIn", |a, b| in_sequence(a, b, "in").map(|found| !found));
        reg
    }

    /// Register (or replace) a named operator.
    pub fn register<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&Value, &Value) -> Result<bool, OperatorError> + Send + Sync + 'static,
    {
        self.operators.insert(name.to_string(), Arc::new(f));
    }

    /// Evaluate the named operator, returning [`OperatorError::Unknown`] if
    /// it has not been registered.
    pub fn evaluate(&self, name: &str, actual: &Value, expected: &Value) -> Result<bool, OperatorError> {
        let op = self
            .operators
            .get(name)
            .ok_or_else(|| OperatorError::Unknown(name.to_string()))?;
        op(actual, expected)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("operators", &self.operators.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════════

fn numeric_cmp(
    op: &str,
    a: &Value,
    b: &Value,
    cmp: impl Fn(f64, f64) -> bool,
) -> Result<bool, OperatorError> {
    let x = to_float(a).map_err(|source| OperatorError::BadNumber { op: op.into(), source })?;
    let y = to_float(b).map_err(|source| OperatorError::BadNumber { op: op.into(), source })?;
    Ok(cmp(x, y))
}

fn numeric_bounds(op: &str, bounds: &Value) -> Result<(f64, f64), OperatorError> {
    let seq = bounds.as_seq().ok_or_else(|| OperatorError::BadRange {
        op: op.into(),
        value: bounds.clone(),
    })?;
    if seq.len() != 2 {
        return Err(OperatorError::BadRange {
            op: op.into(),
            value: bounds.clone(),
        });
    }
    let min = to_float(&seq[0]).map_err(|source| OperatorError::BadNumber { op: op.into(), source })?;
    let max = to_float(&seq[1]).map_err(|source| OperatorError::BadNumber { op: op.into(), source })?;
    Ok((min, max))
}

fn semver_cmp(
    op: &str,
    a: &Value,
    b: &Value,
    cmp: impl Fn(&semver::Version, &semver::Version) -> bool,
) -> Result<bool, OperatorError> {
    let x = to_semver(a).map_err(|source| OperatorError::BadVersion { op: op.into(), source })?;
    let y = to_semver(b).map_err(|source| OperatorError::BadVersion { op: op.into(), source })?;
    Ok(cmp(&x, &y))
}

fn semver_bounds(op: &str, bounds: &Value) -> Result<(semver::Version, semver::Version), OperatorError> {
    let seq = bounds.as_seq().ok_or_else(|| OperatorError::BadRange {
        op: op.into(),
        value: bounds.clone(),
    })?;
    if seq.len() != 2 {
        return Err(OperatorError::BadRange {
            op: op.into(),
            value: bounds.clone(),
        });
    }
    let min = to_semver(&seq[0]).map_err(|source| OperatorError::BadVersion { op: op.into(), source })?;
    let max = to_semver(&seq[1]).map_err(|source| OperatorError::BadVersion { op: op.into(), source })?;
    Ok((min, max))
}

fn in_sequence(a: &Value, b: &Value, op: &str) -> Result<bool, OperatorError> {
    let seq = b.as_seq().ok_or_else(|| OperatorError::BadSequence {
        op: op.into(),
        value: b.clone(),
    })?;
    let target = to_string(a);
    Ok(seq.iter().any(|item| to_string(item) == target))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reg() -> OperatorRegistry {
        OperatorRegistry::with_builtins()
    }

    #[test]
    fn equals_compares_stringified_operands() {
        let r = reg();
        assert!(r
            .evaluate("equals", &Value::String("3des-cbc".into()), &Value::String("3des-cbc".into()))
            .unwrap());
        assert!(!r
            .evaluate("equals", &Value::Int(1), &Value::String("2".into()))
            .unwrap());
    }

    #[test]
    fn between_is_inclusive_at_both_ends() {
        let r = reg();
        let bounds = Value::Seq(vec![Value::Int(1), Value::Int(10)]);
        assert!(r.evaluate("between", &Value::Int(1), &bounds).unwrap());
        assert!(r.evaluate("between", &Value::Int(10), &bounds).unwrap());
        assert!(!r.evaluate("between", &Value::Int(11), &bounds).unwrap());
    }

    #[test]
    fn version_between_is_inclusive() {
        let r = reg();
        let bounds = Value::Seq(vec![Value::String("1.0.0".into()), Value::String("2.0.0".into())]);
        assert!(r
            .evaluate("version_between", &Value::String("1.0.0".into()), &bounds)
            .unwrap());
        assert!(r
            .evaluate("version_between", &Value::String("2.0.0".into()), &bounds)
            .unwrap());
        assert!(!r
            .evaluate("version_between", &Value::String("2.0.1".into()), &bounds)
            .unwrap());
    }

    #[test]
    fn version_lt_compares_semver_order() {
        let r = reg();
        assert!(r
            .evaluate("version_lt", &Value::String("7.4.0".into()), &Value::String("8.5".into()))
            .unwrap());
        assert!(!r
            .evaluate("version_lt", &Value::String("9.0.0".into()), &Value::String("8.5".into()))
            .unwrap());
    }

    #[test]
    fn in_and_not_in_are_logical_negations() {
        let r = reg();
        let seq = Value::Seq(vec![Value::String("a".into()), Value::String("b".into())]);
        assert!(r.evaluate("in", &Value::String("a".into()), &seq).unwrap());
        assert!(!r.evaluate("notIn", &Value::String("a".into()), &seq).unwrap());
        assert!(!r.evaluate("in", &Value::String("z".into()), &seq).unwrap());
        assert!(r.evaluate("notIn", &Value::String("z".into()), &seq).unwrap());
    }

    #[test]
    fn matches_fails_on_bad_regex() {
        let r = reg();
        let err = r
            .evaluate("matches", &Value::String("x".into()), &Value::String("(".into()))
            .unwrap_err();
        assert!(matches!(err, OperatorError::BadRegex { .. }));
    }

    #[test]
    fn unknown_operator_errors() {
        let r = reg();
        let err = r
            .evaluate("nope", &Value::Null, &Value::Null)
            .unwrap_err();
        assert!(matches!(err, OperatorError::Unknown(_)));
    }

    #[test]
    fn registering_custom_operator_last_write_wins() {
        let mut r = reg();
        r.register("equals", |_a, _b| Ok(true));
        assert!(r.evaluate("equals", &Value::Int(1), &Value::Int(2)).unwrap());
    }
}

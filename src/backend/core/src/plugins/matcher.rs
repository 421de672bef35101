//! The match engine: a Boolean combinator (AND/OR/NOT) over an ordered list
//! of typed rules.

use std::collections::HashMap;

use super::operators::{OperatorError, OperatorRegistry};
use super::value::Value;
use super::MatchBlock;

pub type Context = HashMap<String, Value>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum MatcherError {
    #[error("match block is missing")]
    MissingMatchBlock,

    #[error("match.rules must not be empty")]
    EmptyRules,

    #[error("unknown logic {0:?} (expected AND, OR, or NOT)")]
    UnknownLogic(String),

    #[error("match.rules[{index}] ({field:?}): {source}")]
    Rule {
        index: usize,
        field: String,
        #[source]
        source: OperatorError,
    },
}

/// A registry of named operators plus the top-level Boolean combinator over
/// a list of rules.
#[derive(Debug, Clone)]
pub struct MatcherEngine {
    operators: OperatorRegistry,
}

impl MatcherEngine {
    pub fn new(operators: OperatorRegistry) -> Self {
        Self { operators }
    }

    pub fn with_builtins() -> Self {
        Self::new(OperatorRegistry::with_builtins())
    }

    /// `Evaluate(match, context) -> (bool, error)` per §4.3.
    pub fn evaluate(&self, block: Option<&MatchBlock>, context: &Context) -> Result<bool, MatcherError> {
        let block = block.ok_or(MatcherError::MissingMatchBlock)?;
        if block.rules.is_empty() {
            return Err(MatcherError::EmptyRules);
        }

        let mut outcomes = Vec::with_capacity(block.rules.len());
        for (index, rule) in block.rules.iter().enumerate() {
            let outcome = match context.get(&rule.field) {
                None => false,
                Some(actual) => self
                    .operators
                    .evaluate(&rule.operator, actual, &rule.value)
                    .map_err(|source| MatcherError::Rule {
                        index,
                        field: rule.field.clone(),
                        source,
                    })?,
            };
            outcomes.push(outcome);
        }

        match block.logic.as_str() {
            "AND" => Ok(outcomes.iter().all(|b| *b)),
            "OR" => Ok(outcomes.iter().any(|b| *b)),
            "NOT" => Ok(!outcomes.iter().any(|b| *b)),
            other => Err(MatcherError::UnknownLogic(other.to_string())),
        }
    }
}

impl Default for MatcherEngine {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::MatchRule;

    fn block(logic: &str, rules: Vec<MatchRule>) -> MatchBlock {
        MatchBlock {
            logic: logic.to_string(),
            rules,
        }
    }

    fn rule(field: &str, operator: &str, value: Value) -> MatchRule {
        MatchRule {
            field: field.to_string(),
            operator: operator.to_string(),
            value,
        }
    }

    #[test]
    fn missing_field_yields_false_without_error() {
        let engine = MatcherEngine::with_builtins();
        let b = block("AND", vec![rule("ssh.cipher", "equals", Value::String("3des".into()))]);
        let ctx = Context::new();
        assert_eq!(engine.evaluate(Some(&b), &ctx).unwrap(), false);
    }

    #[test]
    fn and_requires_all_rules_true() {
        let engine = MatcherEngine::with_builtins();
        let b = block(
            "AND",
            vec![
                rule("ssh.version", "version_lt", Value::String("8.5".into())),
                rule("ssh.banner", "contains", Value::String("OpenSSH".into())),
            ],
        );
        let mut ctx = Context::new();
        ctx.insert("ssh.version".into(), Value::String("7.4.0".into()));
        ctx.insert("ssh.banner".into(), Value::String("OpenSSH_7.4p1".into()));
        assert!(engine.evaluate(Some(&b), &ctx).unwrap());

        ctx.insert("ssh.version".into(), Value::String("9.0.0".into()));
        assert!(!engine.evaluate(Some(&b), &ctx).unwrap());
    }

    #[test]
    fn or_requires_any_rule_true() {
        let engine = MatcherEngine::with_builtins();
        let b = block(
            "OR",
            vec![rule("ssh.cipher", "equals", Value::String("3des-cbc".into()))],
        );
        let mut ctx = Context::new();
        ctx.insert("ssh.cipher".into(), Value::String("3des-cbc".into()));
        assert!(engine.evaluate(Some(&b), &ctx).unwrap());
    }

    #[test]
    fn not_is_true_iff_all_rules_false() {
        let engine = MatcherEngine::with_builtins();
        let b = block("NOT", vec![rule("x", "equals", Value::String("a".into()))]);
        let mut ctx = Context::new();
        ctx.insert("x".into(), Value::String("b".into()));
        assert!(engine.evaluate(Some(&b), &ctx).unwrap());
        ctx.insert("x".into(), Value::String("a".into()));
        assert!(!engine.evaluate(Some(&b), &ctx).unwrap());
    }

    #[test]
    fn reordering_rules_preserves_and_or_result() {
        let engine = MatcherEngine::with_builtins();
        let mut ctx = Context::new();
        ctx.insert("a".into(), Value::String("1".into()));
        ctx.insert("b".into(), Value::String("2".into()));

        let forward = block(
            "AND",
            vec![
                rule("a", "equals", Value::String("1".into())),
                rule("b", "equals", Value::String("2".into())),
            ],
        );
        let reversed = block(
            "AND",
            vec![
                rule("b", "equals", Value::String("2".into())),
                rule("a", "equals", Value::String("1".into())),
            ],
        );
        assert_eq!(
            engine.evaluate(Some(&forward), &ctx).unwrap(),
            engine.evaluate(Some(&reversed), &ctx).unwrap()
        );
    }

    #[test]
    fn unknown_logic_errors() {
        let engine = MatcherEngine::with_builtins();
        let b = block("XOR", vec![rule("a", "equals", Value::Null)]);
        assert!(matches!(
            engine.evaluate(Some(&b), &Context::new()),
            Err(MatcherError::UnknownLogic(_))
        ));
    }

    #[test]
    fn unknown_operator_errors_never_false() {
        let engine = MatcherEngine::with_builtins();
        let b = block("AND", vec![rule("a", "bogus", Value::Null)]);
        let mut ctx = Context::new();
        ctx.insert("a".into(), Value::String("x".into()));
        assert!(engine.evaluate(Some(&b), &ctx).is_err());
    }

    #[test]
    fn missing_block_errors() {
        let engine = MatcherEngine::with_builtins();
        assert!(matches!(
            engine.evaluate(None, &Context::new()),
            Err(MatcherError::MissingMatchBlock)
        ));
    }

    #[test]
    fn empty_rules_errors() {
        let engine = MatcherEngine::with_builtins();
        let b = block("AND", vec![]);
        assert!(matches!(
            engine.evaluate(Some(&b), &Context::new()),
            Err(MatcherError::EmptyRules)
        ));
    }
}

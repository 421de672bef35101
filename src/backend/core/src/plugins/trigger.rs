//! The trigger gate: built on the same operator set as the match engine, but
//! with different semantics around missing keys — `exists` is needed as a
//! presence gate, whereas match-level absence is uniformly false.

use super::matcher::Context;
use super::operators::{OperatorError, OperatorRegistry};
use super::value::Value;
use super::Trigger;

#[derive(Debug, Clone, thiserror::Error)]
pub enum TriggerError {
    #[error("trigger[{index}] condition \"exists\" requires a boolean value, got {value:?}")]
    BadExistsValue { index: usize, value: Value },

    #[error("trigger[{index}] ({data_key:?}): {source}")]
    Condition {
        index: usize,
        data_key: String,
        #[source]
        source: OperatorError,
    },
}

/// A gate built on the operator registry deciding whether a plugin is
/// relevant to the current context at all.
#[derive(Debug, Clone)]
pub struct TriggerEvaluator {
    operators: OperatorRegistry,
}

impl TriggerEvaluator {
    pub fn new(operators: OperatorRegistry) -> Self {
        Self { operators }
    }

    pub fn with_builtins() -> Self {
        Self::new(OperatorRegistry::with_builtins())
    }

    /// `ShouldTrigger(triggers, context) -> (bool, error)` per §4.4. Empty
    /// `triggers` means "always triggered"; the first unsatisfied trigger
    /// short-circuits to `false` with no error.
    pub fn should_trigger(&self, triggers: &[Trigger], context: &Context) -> Result<bool, TriggerError> {
        if triggers.is_empty() {
            return Ok(true);
        }

        for (index, trigger) in triggers.iter().enumerate() {
            let satisfied = if trigger.condition == "exists" {
                let expected = trigger.value.as_bool().ok_or_else(|| TriggerError::BadExistsValue {
                    index,
                    value: trigger.value.clone(),
                })?;
                context.contains_key(&trigger.data_key) == expected
            } else {
                match context.get(&trigger.data_key) {
                    None => false,
                    Some(actual) => self
                        .operators
                        .evaluate(&trigger.condition, actual, &trigger.value)
                        .map_err(|source| TriggerError::Condition {
                            index,
                            data_key: trigger.data_key.clone(),
                            source,
                        })?,
                }
            };

            if !satisfied {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

impl Default for TriggerEvaluator {
    fn default() -> Self {
        Self::with_builtins()
    }
}

//! Composes the [`TriggerEvaluator`] and [`MatcherEngine`] to evaluate one
//! plugin, or a batch of them, against a runtime context.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use super::matcher::Context;
use super::{MatcherEngine, OutputBlock, Plugin, PluginError, TriggerEvaluator};

/// The outcome of evaluating one plugin against a context.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub matched: bool,
    pub plugin: Plugin,
    /// Valid iff `matched` — empty/default otherwise.
    pub output: OutputBlock,
    pub evaluated_at: DateTime<Utc>,
    pub execution_time: Duration,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EvaluatorError {
    #[error("plugin[{index}] ({name:?}): {source}")]
    Plugin {
        index: usize,
        name: String,
        #[source]
        source: PluginError,
    },

    #[error("evaluation cancelled after {completed} of {total} plugins")]
    Cancelled { completed: usize, total: usize },
}

/// Composes trigger + matcher into a single evaluation pipeline.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    triggers: TriggerEvaluator,
    matcher: MatcherEngine,
}

impl Evaluator {
    pub fn new(triggers: TriggerEvaluator, matcher: MatcherEngine) -> Self {
        Self { triggers, matcher }
    }

    pub fn with_builtins() -> Self {
        Self::default()
    }

    /// Evaluate a single plugin against `context`.
    pub fn evaluate(&self, plugin: &Plugin, context: &Context) -> Result<MatchResult, PluginError> {
        let started = Instant::now();
        let evaluated_at = Utc::now();

        let should_trigger = self.triggers.should_trigger(&plugin.triggers, context)?;
        if !should_trigger {
            return Ok(MatchResult {
                matched: false,
                plugin: plugin.clone(),
                output: OutputBlock::default(),
                evaluated_at,
                execution_time: started.elapsed(),
            });
        }

        let matched = match &plugin.match_block {
            Some(block) => self.matcher.evaluate(Some(block), context)?,
            None => true,
        };

        let mut output = OutputBlock::default();
        if matched {
            output = plugin.output.clone();
            if output.severity.is_none() {
                output.severity = super::Severity::parse(&plugin.metadata.severity);
            }
        }

        Ok(MatchResult {
            matched,
            plugin: plugin.clone(),
            output,
            evaluated_at,
            execution_time: started.elapsed(),
        })
    }

    /// Evaluate every plugin in order, stopping at the first error and
    /// wrapping it with the plugin's index and name.
    pub fn evaluate_all(&self, plugins: &[Plugin], context: &Context) -> Result<Vec<MatchResult>, EvaluatorError> {
        self.evaluate_all_cancellable(plugins, context, &CancellationToken::new())
    }

    /// As [`Evaluator::evaluate_all`], but aborts with
    /// [`EvaluatorError::Cancelled`] if `cancel` fires between plugins.
    pub fn evaluate_all_cancellable(
        &self,
        plugins: &[Plugin],
        context: &Context,
        cancel: &CancellationToken,
    ) -> Result<Vec<MatchResult>, EvaluatorError> {
        let mut results = Vec::with_capacity(plugins.len());
        for (index, plugin) in plugins.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(EvaluatorError::Cancelled {
                    completed: results.len(),
                    total: plugins.len(),
                });
            }
            let result = self.evaluate(plugin, context).map_err(|source| EvaluatorError::Plugin {
                index,
                name: plugin.name.clone(),
                source,
            })?;
            results.push(result);
        }
        Ok(results)
    }

    /// Evaluate every plugin and return only those that matched, preserving
    /// input order.
    pub fn evaluate_matched(&self, plugins: &[Plugin], context: &Context) -> Result<Vec<MatchResult>, EvaluatorError> {
        Ok(self
            .evaluate_all(plugins, context)?
            .into_iter()
            .filter(|r| r.matched)
            .collect())
    }
}

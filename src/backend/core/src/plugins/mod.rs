//! # Plugin Evaluation Engine
//!
//! A declarative vulnerability/compliance plugin runtime. Plugins are text
//! documents describing (a) when they apply to a piece of evidence
//! ([`Trigger`]s), (b) how to decide whether the evidence indicates a finding
//! (a [`MatchBlock`] over the [`operators`] expression language), and (c)
//! what to emit on a match (an [`OutputBlock`]).
//!
//! ## Architecture
//!
//! - **[`Plugin`] / validation**: the manifest schema and its structural
//!   invariants.
//! - **[`value`] / [`operators`]**: the dynamic operand type and the closed
//!   catalogue of typed comparison operators.
//! - **[`matcher`]**: the Boolean combinator (AND/OR/NOT) over match rules.
//! - **[`trigger`]**: the gate deciding whether a plugin is relevant at all.
//! - **[`evaluator`]**: composes trigger + matcher into one plugin
//!   evaluation (or a batch of them).
//! - **[`registry`]**: the thread-safe in-memory index of loaded plugins.
//! - **[`cache`]**: the filesystem-backed plugin store that owns a registry.
//! - **[`embedded`]**: discovery of manifests compiled into the binary.
//!
//! ## On-disk layout
//!
//! ```text
//! <cache_root>/
//! +-- ssh-weak-cipher/
//!     +-- 1.0.0/
//!         +-- plugin.yaml
//! ```

pub mod cache;
pub mod embedded;
pub mod evaluator;
pub mod matcher;
pub mod operators;
pub mod registry;
pub mod trigger;
pub mod value;

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use cache::{CacheEntry, CacheError, CacheManager};
pub use embedded::EmbeddedLoader;
pub use evaluator::{Evaluator, MatchResult};
pub use matcher::{MatcherEngine, MatcherError};
pub use operators::{OperatorError, OperatorRegistry};
pub use registry::Registry;
pub use trigger::{TriggerError, TriggerEvaluator};
pub use value::Value;

use crate::error::CoreError;

// ═══════════════════════════════════════════════════════════════════════════════
// Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// One of `critical`, `high`, `medium`, `low`, `info`, in that (decreasing)
/// order of urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    pub fn parse(raw: &str) -> Option<Severity> {
        Self::ALL.into_iter().find(|s| s.as_str() == raw)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PluginType
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginType {
    Evaluation,
    Output,
    Integration,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Trigger
// ═══════════════════════════════════════════════════════════════════════════════

/// A precondition gate on the context: `{ data_key, condition, value }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub data_key: String,
    pub condition: String,
    #[serde(default)]
    pub value: Value,
}

// ═══════════════════════════════════════════════════════════════════════════════
// MatchBlock / MatchRule
// ═══════════════════════════════════════════════════════════════════════════════

/// `{ logic: "AND"|"OR"|"NOT", rules: non-empty ordered sequence<MatchRule> }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchBlock {
    pub logic: String,
    pub rules: Vec<MatchRule>,
}

/// `{ field, operator, value }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRule {
    pub field: String,
    pub operator: String,
    #[serde(default)]
    pub value: Value,
}

// ═══════════════════════════════════════════════════════════════════════════════
// OutputBlock
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputBlock {
    #[serde(default)]
    pub vulnerability: bool,
    #[serde(default)]
    pub severity: Option<Severity>,
    pub message: String,
    #[serde(default)]
    pub remediation: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Metadata
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub severity: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default)]
    pub cve: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Plugin
// ═══════════════════════════════════════════════════════════════════════════════

/// The on-disk document and in-memory record for one plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plugin {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub plugin_type: PluginType,
    pub author: String,
    #[serde(default)]
    pub min_runtime_version: Option<String>,
    pub metadata: PluginMetadata,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    #[serde(default)]
    #[serde(rename = "match")]
    pub match_block: Option<MatchBlock>,
    pub output: OutputBlock,
    #[serde(default)]
    pub signature: Option<String>,

    /// Absolute path the manifest was loaded from. Not persisted.
    #[serde(skip)]
    pub file_path: Option<PathBuf>,
    /// When the manifest was loaded. Not persisted.
    #[serde(skip)]
    pub loaded_at: Option<DateTime<Utc>>,
}

impl Plugin {
    /// Parse a manifest from its YAML text.
    pub fn from_yaml(raw: &str) -> Result<Self, PluginError> {
        serde_yaml::from_str(raw).map_err(|e| PluginError::Parse(e.to_string()))
    }

    /// Serialize this plugin to YAML, the format `plugin.yaml` is stored in.
    pub fn to_yaml(&self) -> Result<String, PluginError> {
        serde_yaml::to_string(self).map_err(|e| PluginError::Parse(e.to_string()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Validation (§4.1)
    // ─────────────────────────────────────────────────────────────────────────

    pub fn validate(&self) -> Result<(), PluginError> {
        if self.id.is_empty() {
            return Err(PluginError::Validation("id must not be empty".into()));
        }
        if self.name.is_empty() {
            return Err(PluginError::Validation("name must not be empty".into()));
        }
        if self.version.is_empty() {
            return Err(PluginError::Validation("version must not be empty".into()));
        }
        if self.author.is_empty() {
            return Err(PluginError::Validation("author must not be empty".into()));
        }
        if self.metadata.severity.is_empty() {
            return Err(PluginError::Validation("metadata.severity must not be empty".into()));
        }
        if Severity::parse(&self.metadata.severity).is_none() {
            return Err(PluginError::Validation(format!(
                "metadata.severity {:?} is not one of critical, high, medium, low, info",
                self.metadata.severity
            )));
        }

        for (i, trigger) in self.triggers.iter().enumerate() {
            if trigger.data_key.is_empty() {
                return Err(PluginError::Validation(format!(
                    "trigger[{i}].data_key must not be empty"
                )));
            }
            if trigger.condition.is_empty() {
                return Err(PluginError::Validation(format!(
                    "trigger[{i}].condition must not be empty"
                )));
            }
        }

        if let Some(block) = &self.match_block {
            if block.logic.is_empty() {
                return Err(PluginError::Validation("match.logic must not be empty".into()));
            }
            if !matches!(block.logic.as_str(), "AND" | "OR" | "NOT") {
                return Err(PluginError::Validation(format!(
                    "match.logic {:?} is not one of AND, OR, NOT",
                    block.logic
                )));
            }
            if block.rules.is_empty() {
                return Err(PluginError::Validation("match.rules must not be empty".into()));
            }
            for (i, rule) in block.rules.iter().enumerate() {
                if rule.field.is_empty() {
                    return Err(PluginError::Validation(format!(
                        "match.rules[{i}].field must not be empty"
                    )));
                }
                if rule.operator.is_empty() {
                    return Err(PluginError::Validation(format!(
                        "match.rules[{i}].operator must not be empty"
                    )));
                }
            }
        }

        if self.output.message.is_empty() {
            return Err(PluginError::Validation("output.message must not be empty".into()));
        }

        if let Some(min) = &self.min_runtime_version {
            if !min.is_empty() {
                value::parse_semver_lenient(min).map_err(|e| {
                    PluginError::Validation(format!("min_runtime_version {min:?} is not valid semver: {e}"))
                })?;
            }
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Compatibility (§4.1)
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether `host_version` satisfies this plugin's `min_runtime_version`.
    pub fn is_compatible_with(&self, host_version: &str) -> Result<bool, PluginError> {
        let Some(required) = self.min_runtime_version.as_deref().filter(|s| !s.is_empty()) else {
            return Ok(true);
        };
        let required = value::parse_semver_lenient(required)
            .map_err(|e| PluginError::Validation(format!("min_runtime_version is invalid: {e}")))?;
        let host = value::parse_semver_lenient(host_version)
            .map_err(|e| PluginError::Validation(format!("host_version is invalid: {e}")))?;
        Ok(host >= required)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, thiserror::Error)]
pub enum PluginError {
    #[error("failed to parse plugin manifest: {0}")]
    Parse(String),

    #[error("plugin validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Matcher(#[from] MatcherError),

    #[error(transparent)]
    Trigger(#[from] TriggerError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_plugin() -> Plugin {
        Plugin {
            id: "ssh-weak-cipher".into(),
            name: "SSH Weak Cipher".into(),
            version: "1.0.0".into(),
            plugin_type: PluginType::Evaluation,
            author: "security-team".into(),
            min_runtime_version: None,
            metadata: PluginMetadata {
                severity: "high".into(),
                tags: vec!["ssh".into()],
                references: vec![],
                cve: None,
            },
            triggers: vec![Trigger {
                data_key: "ssh.cipher".into(),
                condition: "exists".into(),
                value: Value::Bool(true),
            }],
            match_block: Some(MatchBlock {
                logic: "OR".into(),
                rules: vec![MatchRule {
                    field: "ssh.cipher".into(),
                    operator: "equals".into(),
                    value: Value::String("3des-cbc".into()),
                }],
            }),
            output: OutputBlock {
                vulnerability: true,
                severity: None,
                message: "Weak cipher detected".into(),
                remediation: None,
                reference: None,
                metadata: None,
            },
            signature: None,
            file_path: None,
            loaded_at: None,
        }
    }

    #[test]
    fn valid_plugin_passes_validation() {
        assert!(valid_plugin().validate().is_ok());
    }

    #[test]
    fn empty_id_fails_validation() {
        let mut p = valid_plugin();
        p.id = String::new();
        assert!(p.validate().is_err());
    }

    #[test]
    fn bad_severity_fails_validation() {
        let mut p = valid_plugin();
        p.metadata.severity = "urgent".into();
        assert!(p.validate().is_err());
    }

    #[test]
    fn match_block_with_unknown_logic_fails() {
        let mut p = valid_plugin();
        p.match_block.as_mut().unwrap().logic = "XOR".into();
        assert!(p.validate().is_err());
    }

    #[test]
    fn match_block_with_empty_rules_fails() {
        let mut p = valid_plugin();
        p.match_block.as_mut().unwrap().rules.clear();
        assert!(p.validate().is_err());
    }

    #[test]
    fn empty_output_message_fails() {
        let mut p = valid_plugin();
        p.output.message = String::new();
        assert!(p.validate().is_err());
    }

    #[test]
    fn bad_min_runtime_version_fails() {
        let mut p = valid_plugin();
        p.min_runtime_version = Some("not-a-version".into());
        assert!(p.validate().is_err());
    }

    #[test]
    fn compatibility_normalises_leading_v_and_compares_semver() {
        let mut p = valid_plugin();
        p.min_runtime_version = Some("v1.2.0".into());
        assert!(p.is_compatible_with("1.3.0").unwrap());
        assert!(!p.is_compatible_with("v1.1.0").unwrap());
    }

    #[test]
    fn compatibility_with_no_minimum_is_always_true() {
        let p = valid_plugin();
        assert!(p.is_compatible_with("0.0.1").unwrap());
    }

    #[test]
    fn roundtrip_through_yaml_preserves_persisted_fields() {
        let p = valid_plugin();
        let yaml = p.to_yaml().unwrap();
        let parsed = Plugin::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.id, p.id);
        assert_eq!(parsed.version, p.version);
        assert_eq!(parsed.output.message, p.output.message);
        assert!(parsed.file_path.is_none());
        assert!(parsed.loaded_at.is_none());
    }
}

#![allow(clippy::result_large_err)]
//! # Plugin Evaluation Engine
//!
//! A declarative vulnerability/compliance plugin runtime. Plugins are text
//! manifests describing when they apply to a piece of evidence, how to
//! decide whether the evidence indicates a finding, and what to emit on a
//! match. This crate is the core evaluation engine and its on-disk cache —
//! it does not fetch plugins over the network, scan anything itself, or ship
//! an opinion about argument parsing or transport; those are left to
//! frontends such as `pentora-plugins-cli`.
//!
//! ## Architecture
//!
//! - **[`plugins`]**: the data model, the operator catalogue, the trigger
//!   gate, the match engine, the evaluator, the in-memory registry, the
//!   filesystem-backed cache manager, and the embedded plugin catalog.
//! - **[`error`]**: the closed sentinel error taxonomy and its classifiers
//!   (`exit_code`, `http_status`, `error_code`, `get_suggestion`).
//! - **[`config`]**: runtime configuration (cache root, default severity,
//!   host runtime version) loadable from TOML/environment.

pub mod config;
pub mod error;
pub mod plugins;

pub use config::RuntimeConfig;
pub use error::CoreError;
pub use plugins::{
    CacheManager, Evaluator, MatchResult, MatcherEngine, OperatorRegistry, Plugin, Registry,
    TriggerEvaluator, Value,
};

/// Re-exports of the most commonly used types, for `use pentora_plugins::prelude::*;`.
pub mod prelude {
    pub use crate::config::RuntimeConfig;
    pub use crate::error::{self, CoreError};
    pub use crate::plugins::cache::{CacheEntry, CacheError, CacheManager};
    pub use crate::plugins::embedded::EmbeddedLoader;
    pub use crate::plugins::evaluator::{Evaluator, MatchResult};
    pub use crate::plugins::matcher::{Context, MatcherEngine};
    pub use crate::plugins::operators::OperatorRegistry;
    pub use crate::plugins::registry::Registry;
    pub use crate::plugins::trigger::TriggerEvaluator;
    pub use crate::plugins::value::Value;
    pub use crate::plugins::{
        MatchBlock, MatchRule, OutputBlock, Plugin, PluginMetadata, PluginType, Severity, Trigger,
    };
}

//! Runtime configuration: the cache root, default severity, and the host
//! runtime version plugins compare `min_runtime_version` against.
//!
//! Loadable from TOML (via the `config` crate) with environment overrides,
//! in the same builder shape the wider toolbox uses for its own `Config`,
//! but scoped down to what this crate actually needs.

use std::path::PathBuf;

use serde::Deserialize;

use crate::plugins::Severity;

/// Configuration for the plugin evaluation engine and its on-disk cache.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Directory `CacheManager` treats as `<cache_root>`.
    #[serde(default = "default_cache_root")]
    pub cache_root: PathBuf,

    /// Severity assumed for an `OutputBlock` that doesn't set one and whose
    /// plugin also left `metadata.severity` unparseable. Only used as a last
    /// resort fallback by frontends; the evaluator itself always prefers
    /// `plugin.metadata.severity`.
    #[serde(default = "default_severity")]
    pub default_severity: String,

    /// The running host's version, compared against each plugin's
    /// `min_runtime_version` via `Plugin::is_compatible_with`.
    #[serde(default = "default_host_runtime_version")]
    pub host_runtime_version: String,

    /// Log level passed to `tracing_subscriber::EnvFilter`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cache_root: default_cache_root(),
            default_severity: default_severity(),
            host_runtime_version: default_host_runtime_version(),
            log_level: default_log_level(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables prefixed `PENTORA__`
    /// (e.g. `PENTORA__CACHE_ROOT=/var/lib/pentora/plugins`), falling back to
    /// defaults for anything unset.
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("PENTORA").separator("__"))
            .build()?;
        Ok(config.try_deserialize().unwrap_or_default())
    }

    /// Load from a specific TOML file, with environment variables taking
    /// precedence over anything the file sets.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let config = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("PENTORA").separator("__"))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// The configured default severity, falling back to `Info` if the string
    /// isn't one of the five recognised severities.
    pub fn default_severity(&self) -> Severity {
        Severity::parse(&self.default_severity).unwrap_or(Severity::Info)
    }
}

fn default_cache_root() -> PathBuf {
    dirs_cache_root()
}

/// The platform cache directory plus `pentora/plugins` (e.g.
/// `~/.cache/pentora/plugins` on Linux), falling back to a relative
/// `./plugin-cache` if no cache directory can be resolved (e.g. a minimal
/// container with `$HOME` unset).
fn dirs_cache_root() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("pentora").join("plugins"))
        .unwrap_or_else(|| PathBuf::from("./plugin-cache"))
}

fn default_severity() -> String {
    "info".to_string()
}

fn default_host_runtime_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_log_level() -> String {
    std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string())
}

/// Initialise the global `tracing` subscriber from `level` (an `EnvFilter`
/// directive string such as `"info"` or `"pentora_plugins=debug"`). Safe to
/// call more than once; later calls are no-ops.
pub fn init_tracing(level: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.default_severity(), Severity::Info);
        assert!(!cfg.host_runtime_version.is_empty());
    }

    #[test]
    fn default_severity_falls_back_on_garbage() {
        let mut cfg = RuntimeConfig::default();
        cfg.default_severity = "urgent".into();
        assert_eq!(cfg.default_severity(), Severity::Info);
    }
}

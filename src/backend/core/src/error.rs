//! The error taxonomy: a closed set of sentinel domain errors plus the
//! classifier functions (`exit_code`, `http_status`, `error_code`,
//! `get_suggestion`) that map any error — sentinel or wrapped sentinel — to a
//! stable exit code, HTTP-style status, machine-readable code, and a
//! human-facing suggestion.
//!
//! Every other error type in this crate ([`crate::plugins::PluginError`],
//! [`crate::plugins::cache::CacheError`], ...) wraps one of these sentinels
//! via `#[from]`/`#[source]` so that classification works through any number
//! of context layers, regardless of how deeply a sentinel ends up wrapped.

use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// Result alias
// ═══════════════════════════════════════════════════════════════════════════════

pub type Result<T> = std::result::Result<T, CoreError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Sentinel errors
// ═══════════════════════════════════════════════════════════════════════════════

/// The closed set of sentinel domain errors. `InvalidInput` doubles as
/// `InvalidOption` — the specification treats the two names as aliases, not
/// distinct variants, so [`CoreError::invalid_option`] just builds an
/// `InvalidInput`.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error("plugin not found: {0}")]
    PluginNotFound(String),

    #[error("plugin already installed: {0}")]
    PluginAlreadyInstalled(String),

    #[error("plugin not installed: {0}")]
    PluginNotInstalled(String),

    #[error("invalid category: {0}")]
    InvalidCategory(String),

    #[error("invalid plugin id: {0}")]
    InvalidPluginId(String),

    #[error("no plugins found: {0}")]
    NoPluginsFound(String),

    #[error("source not available: {0}")]
    SourceNotAvailable(String),

    #[error("checksum mismatch: {0}")]
    ChecksumMismatch(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("partial failure: {0}")]
    PartialFailure(String),
}

impl CoreError {
    /// Alias constructor for `InvalidOption` — see the type-level doc.
    pub fn invalid_option(msg: impl Into<String>) -> Self {
        CoreError::InvalidInput(msg.into())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Classification
// ═══════════════════════════════════════════════════════════════════════════════

/// Walks `err` and its `source()` chain looking for a [`CoreError`],
/// however deeply it is wrapped.
fn find_sentinel(err: &(dyn std::error::Error + 'static)) -> Option<&CoreError> {
    if let Some(sentinel) = err.downcast_ref::<CoreError>() {
        return Some(sentinel);
    }
    let mut cursor = err.source();
    while let Some(next) = cursor {
        if let Some(sentinel) = next.downcast_ref::<CoreError>() {
            return Some(sentinel);
        }
        cursor = next.source();
    }
    None
}

/// Exit code suitable for a CLI frontend. `0` for no error, `1` as the
/// default for anything unrecognised.
pub fn exit_code(err: Option<&(dyn std::error::Error + 'static)>) -> i32 {
    match err.and_then(find_sentinel) {
        None if err.is_none() => 0,
        None => 1,
        Some(sentinel) => match sentinel {
            CoreError::PluginNotFound(_)
            | CoreError::PluginNotInstalled(_)
            | CoreError::NoPluginsFound(_) => 4,
            CoreError::InvalidInput(_) | CoreError::InvalidCategory(_) | CoreError::InvalidPluginId(_) => 2,
            CoreError::SourceNotAvailable(_) | CoreError::Unavailable(_) => 7,
            CoreError::PluginAlreadyInstalled(_) | CoreError::Conflict(_) | CoreError::ChecksumMismatch(_) => 1,
            CoreError::PartialFailure(_) => 8,
        },
    }
}

/// HTTP-style status code for a service frontend. `200` for no error, `500`
/// as the default for anything unrecognised.
pub fn http_status(err: Option<&(dyn std::error::Error + 'static)>) -> u16 {
    match err.and_then(find_sentinel) {
        None if err.is_none() => 200,
        None => 500,
        Some(sentinel) => match sentinel {
            CoreError::PluginNotFound(_)
            | CoreError::PluginNotInstalled(_)
            | CoreError::NoPluginsFound(_) => 404,
            CoreError::InvalidInput(_) | CoreError::InvalidCategory(_) | CoreError::InvalidPluginId(_) => 400,
            CoreError::SourceNotAvailable(_) | CoreError::Unavailable(_) => 503,
            CoreError::PluginAlreadyInstalled(_) | CoreError::Conflict(_) => 409,
            CoreError::ChecksumMismatch(_) => 500,
            CoreError::PartialFailure(_) => 200,
        },
    }
}

/// Machine-readable error code. Empty string for no error, `INTERNAL_ERROR`
/// as the default for anything unrecognised.
pub fn error_code(err: Option<&(dyn std::error::Error + 'static)>) -> &'static str {
    match err.and_then(find_sentinel) {
        None if err.is_none() => "",
        None => "INTERNAL_ERROR",
        Some(sentinel) => match sentinel {
            CoreError::PluginNotFound(_) => "PLUGIN_NOT_FOUND",
            CoreError::PluginNotInstalled(_) => "PLUGIN_NOT_INSTALLED",
            CoreError::NoPluginsFound(_) => "NO_PLUGINS_FOUND",
            CoreError::InvalidInput(_) => "INVALID_INPUT",
            CoreError::InvalidCategory(_) => "INVALID_CATEGORY",
            CoreError::InvalidPluginId(_) => "INVALID_PLUGIN_ID",
            CoreError::SourceNotAvailable(_) => "SOURCE_NOT_AVAILABLE",
            CoreError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            CoreError::PluginAlreadyInstalled(_) => "PLUGIN_ALREADY_INSTALLED",
            CoreError::Conflict(_) => "VERSION_CONFLICT",
            CoreError::PartialFailure(_) => "PARTIAL_FAILURE",
            CoreError::ChecksumMismatch(_) => "CHECKSUM_MISMATCH",
        },
    }
}

/// A human suggestion a frontend may print alongside the error.
pub fn get_suggestion(err: Option<&(dyn std::error::Error + 'static)>) -> &'static str {
    match err.and_then(find_sentinel) {
        None if err.is_none() => "",
        None => "check logs for more details",
        Some(sentinel) => match sentinel {
            CoreError::PluginNotFound(_) => "list available plugins",
            CoreError::PluginNotInstalled(_) => "install the plugin first",
            CoreError::NoPluginsFound(_) => "check category / update",
            CoreError::InvalidInput(_) => "",
            CoreError::InvalidCategory(_) => "list valid categories",
            CoreError::InvalidPluginId(_) => "use lowercase/digits/hyphens",
            CoreError::SourceNotAvailable(_) | CoreError::Unavailable(_) => "retry with different source",
            CoreError::PluginAlreadyInstalled(_) => "use force flag",
            CoreError::Conflict(_) => "uninstall then reinstall",
            CoreError::PartialFailure(_) => "request detailed output",
            CoreError::ChecksumMismatch(_) => "retry with force flag",
        },
    }
}

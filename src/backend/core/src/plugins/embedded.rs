//! Discovery of manifests compiled into the binary under `embedded/`.
//!
//! The embedded catalog is read-only and fixed at compile time (via
//! `rust-embed`), unlike [`super::cache::CacheManager`]'s writable,
//! filesystem-backed store. It exists to ship a handful of illustrative
//! built-in plugins with the binary itself.

use std::collections::HashMap;

use rust_embed::RustEmbed;
use tracing::warn;

use super::Plugin;

/// The compiled-in `embedded/<category>/*.yaml` tree.
#[derive(RustEmbed)]
#[folder = "embedded/"]
struct Assets;

/// Fixed category lookup table for the first path segment after
/// `embedded/`. `misconfig` collapses into `network` (documented in the
/// engine's design notes as a migration artefact, not revisited here);
/// anything else falls back to `misc`.
fn categorize(first_segment: &str) -> &'static str {
    match first_segment {
        "ssh" => "ssh",
        "http" => "http",
        "tls" => "tls",
        "database" => "database",
        "misconfig" => "network",
        _ => "misc",
    }
}

/// Walks the embedded, read-only plugin tree and categorises each manifest.
///
/// Construction never fails: unreadable or unparsable entries are logged
/// with [`tracing::warn!`] and skipped, the same resilience policy
/// [`super::cache::CacheManager::new`] uses for its on-disk startup load.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedLoader {
    by_category: HashMap<String, Vec<Plugin>>,
}

impl EmbeddedLoader {
    /// Discover and parse every `embedded/<category>/*.yaml` file.
    pub fn discover() -> Self {
        let mut by_category: HashMap<String, Vec<Plugin>> = HashMap::new();

        for path in Assets::iter() {
            if !path.ends_with(".yaml") && !path.ends_with(".yml") {
                continue;
            }
            let Some(file) = Assets::get(&path) else {
                warn!(path = %path, "embedded asset vanished between iter() and get()");
                continue;
            };
            let raw = match std::str::from_utf8(&file.data) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(path = %path, error = %e, "skipping embedded manifest with invalid utf-8");
                    continue;
                }
            };
            let mut plugin = match Plugin::from_yaml(raw) {
                Ok(p) => p,
                Err(e) => {
                    warn!(path = %path, error = %e, "skipping unparsable embedded manifest");
                    continue;
                }
            };
            if let Err(e) = plugin.validate() {
                warn!(path = %path, error = %e, "skipping invalid embedded manifest");
                continue;
            }

            let first_segment = path.split('/').next().unwrap_or_default();
            let category = categorize(first_segment);
            plugin.loaded_at = Some(chrono::Utc::now());

            by_category.entry(category.to_string()).or_default().push(plugin);
        }

        for plugins in by_category.values_mut() {
            plugins.sort_by(|a, b| a.id.cmp(&b.id));
        }

        Self { by_category }
    }

    /// A view grouping every loaded plugin by its resolved category.
    pub fn by_category(&self) -> &HashMap<String, Vec<Plugin>> {
        &self.by_category
    }

    /// Every loaded plugin, category grouping flattened away.
    pub fn all(&self) -> Vec<Plugin> {
        let mut all: Vec<Plugin> = self.by_category.values().flatten().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// The plugins loaded under one category, if any were found there.
    pub fn category(&self, category: &str) -> &[Plugin] {
        self.by_category.get(category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of plugins discovered across every category.
    pub fn total(&self) -> usize {
        self.by_category.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovers_the_shipped_catalog() {
        let loader = EmbeddedLoader::discover();
        assert!(loader.total() > 0);
    }

    #[test]
    fn ssh_category_contains_ssh_plugins() {
        let loader = EmbeddedLoader::discover();
        let ssh = loader.category("ssh");
        assert!(!ssh.is_empty());
        assert!(ssh.iter().all(|p| p.id.starts_with("ssh-")));
    }

    #[test]
    fn misconfig_collapses_into_network_category() {
        let loader = EmbeddedLoader::discover();
        assert!(loader.category("misconfig").is_empty());
        let network = loader.category("network");
        assert!(network.iter().any(|p| p.id == "misconfig-open-admin-panel"));
    }

    #[test]
    fn unrecognised_category_falls_back_to_misc() {
        let loader = EmbeddedLoader::discover();
        let misc = loader.category("misc");
        assert!(misc.iter().any(|p| p.id == "cms-outdated-version"));
    }

    #[test]
    fn all_matches_the_sum_of_categories() {
        let loader = EmbeddedLoader::discover();
        let total_by_category: usize = loader.by_category().values().map(Vec::len).sum();
        assert_eq!(loader.all().len(), total_by_category);
        assert_eq!(loader.all().len(), loader.total());
    }
}

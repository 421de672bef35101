//! `pentora-plugins cache <subcommand>` — manage the on-disk plugin cache.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Subcommand;
use pentora_plugins::error::CoreError;
use pentora_plugins::plugins::cache::CacheManager;
use pentora_plugins::plugins::Plugin;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Validate and add a plugin manifest to the cache
    Add {
        /// Path to a `plugin.yaml` manifest to parse and store
        manifest: PathBuf,

        /// Opaque checksum to record alongside the cached entry
        #[arg(long)]
        checksum: Option<String>,

        /// Opaque download URL to record alongside the cached entry
        #[arg(long)]
        download_url: Option<String>,
    },

    /// Remove one `id@version` from the cache
    Remove {
        /// Plugin id
        id: String,
        /// Plugin version
        version: String,
    },

    /// List every plugin currently registered from the cache
    List,

    /// Show one plugin's full manifest by id
    Show {
        /// Plugin id
        id: String,
    },

    /// Enumerate cache entries with their on-disk manifest paths
    Entries,

    /// Total size, in bytes, of every file under the cache root
    Size,

    /// Remove cache subtrees untouched for longer than `--max-age-days`
    Prune {
        /// Age threshold, in days, past which a plugin's directory is pruned
        #[arg(long, default_value_t = 30)]
        max_age_days: u64,
    },

    /// Remove every cached plugin and empty the registry
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Serialize, Tabled)]
struct PluginRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Author")]
    author: String,
}

impl From<&Plugin> for PluginRow {
    fn from(p: &Plugin) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            version: p.version.clone(),
            severity: p.metadata.severity.clone(),
            author: p.author.clone(),
        }
    }
}

#[derive(Serialize, Tabled)]
struct EntryRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Cached At")]
    cached_at: String,
}

pub async fn execute(cmd: CacheCommands, cache: &CacheManager, format: OutputFormat) -> Result<()> {
    match cmd {
        CacheCommands::Add {
            manifest,
            checksum,
            download_url,
        } => {
            let raw = std::fs::read_to_string(&manifest)
                .with_context(|| format!("failed to read {}", manifest.display()))?;
            let plugin = Plugin::from_yaml(&raw)
                .with_context(|| format!("failed to parse manifest at {}", manifest.display()))?;
            let id = plugin.id.clone();
            let version = plugin.version.clone();
            let entry = cache.add(plugin, checksum, download_url).await?;

            match format {
                OutputFormat::Table => {
                    output::print_success(&format!("cached {id}@{version}"));
                    output::print_detail("Path", &entry.path.display().to_string());
                }
                _ => output::print_item(&entry_to_json(&entry), format),
            }
        }

        CacheCommands::Remove { id, version } => {
            cache.remove(&id, &version).await?;
            output::print_success(&format!("removed {id}@{version}"));
        }

        CacheCommands::List => {
            let mut plugins = cache.list().await;
            plugins.sort_by(|a, b| a.id.cmp(&b.id));
            let rows: Vec<PluginRow> = plugins.iter().map(PluginRow::from).collect();
            output::print_list(&rows, format);
        }

        CacheCommands::Show { id } => match cache.get(&id).await {
            Some(plugin) => output::print_item(&plugin, format),
            None => return Err(CoreError::PluginNotFound(id).into()),
        },

        CacheCommands::Entries => {
            let mut entries = cache.list_entries().await?;
            entries.sort_by(|a, b| a.id.cmp(&b.id));
            let rows: Vec<EntryRow> = entries
                .iter()
                .map(|e| EntryRow {
                    id: e.id.clone(),
                    version: e.version.clone(),
                    path: e.path.display().to_string(),
                    cached_at: e.cached_at.to_rfc3339(),
                })
                .collect();
            output::print_list(&rows, format);
        }

        CacheCommands::Size => {
            let size = cache.size().await?;
            output::print_detail("Cache size (bytes)", &size.to_string());
        }

        CacheCommands::Prune { max_age_days } => {
            let removed = cache.prune(Duration::from_secs(max_age_days * 24 * 3600)).await?;
            output::print_success(&format!("pruned {removed} stale plugin directories"));
        }

        CacheCommands::Clear { yes } => {
            if !yes {
                anyhow::bail!("refusing to clear the cache without --yes");
            }
            cache.clear().await?;
            output::print_success("cache cleared");
        }
    }

    Ok(())
}

fn entry_to_json(entry: &pentora_plugins::plugins::cache::CacheEntry) -> serde_json::Value {
    serde_json::json!({
        "id": entry.id,
        "name": entry.name,
        "version": entry.version,
        "path": entry.path,
        "checksum": entry.checksum,
        "download_url": entry.download_url,
        "cached_at": entry.cached_at,
        "last_used": entry.last_used,
    })
}

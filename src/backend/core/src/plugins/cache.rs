//! The filesystem-backed plugin store: a directory of
//! `<id>/<version>/plugin.yaml` manifests that owns a [`Registry`] and keeps
//! it in sync with the directory tree.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{Plugin, Registry};
use crate::error::CoreError;

const MANIFEST_FILE: &str = "plugin.yaml";

#[cfg(unix)]
const DIR_MODE: u32 = 0o755;
#[cfg(unix)]
const FILE_MODE: u32 = 0o644;

#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("cache operation cancelled")]
    Cancelled,

    #[error("plugin validation failed: {0}")]
    Validation(String),

    #[error("failed to parse manifest at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: super::PluginError,
    },

    #[error("filesystem error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A snapshot record of one cached plugin manifest, as produced by
/// [`CacheManager::list_entries`].
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub id: String,
    pub name: String,
    pub version: String,
    pub path: PathBuf,
    /// Not persisted across restarts; see the cache's module docs.
    pub checksum: Option<String>,
    /// Not persisted across restarts; see the cache's module docs.
    pub download_url: Option<String>,
    pub cached_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

/// Owns a [`Registry`] and keeps a directory tree of
/// `<root>/<id>/<version>/plugin.yaml` manifests synchronised with it.
#[derive(Debug, Clone)]
pub struct CacheManager {
    root: PathBuf,
    registry: Registry,
}

impl CacheManager {
    /// Ensures `root` exists (creating it with `0o755` if not) and loads every
    /// manifest already present into the registry. Corrupt or invalid
    /// manifests are logged and skipped rather than failing construction —
    /// the registry must start in a usable state.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        Self::new_cancellable(root, &CancellationToken::new()).await
    }

    pub async fn new_cancellable(root: impl Into<PathBuf>, cancel: &CancellationToken) -> Result<Self, CacheError> {
        let root = root.into();
        if root.as_os_str().is_empty() {
            return Err(CacheError::Core(CoreError::InvalidInput(
                "cache root path must not be empty".into(),
            )));
        }
        create_dir(&root).await?;

        let manager = Self {
            root,
            registry: Registry::new(),
        };
        manager.load_from_disk(cancel).await?;
        Ok(manager)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    async fn load_from_disk(&self, cancel: &CancellationToken) -> Result<(), CacheError> {
        let mut id_dirs = read_dir_entries(&self.root).await?;
        id_dirs.sort();

        for id_dir in id_dirs {
            if cancel.is_cancelled() {
                return Err(CacheError::Cancelled);
            }
            let id_path = self.root.join(&id_dir);
            if !id_path.is_dir() {
                continue;
            }
            let mut version_dirs = read_dir_entries(&id_path).await?;
            version_dirs.sort();

            for version_dir in version_dirs {
                if cancel.is_cancelled() {
                    return Err(CacheError::Cancelled);
                }
                let manifest_path = id_path.join(&version_dir).join(MANIFEST_FILE);
                match self.try_load_manifest(&manifest_path).await {
                    Ok(Some(plugin)) => self.registry.register(plugin).await,
                    Ok(None) => {}
                    Err(e) => warn!(path = %manifest_path.display(), error = %e, "skipping unreadable manifest at startup"),
                }
            }
        }
        Ok(())
    }

    async fn try_load_manifest(&self, path: &Path) -> Result<Option<Plugin>, CacheError> {
        let raw = match fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CacheError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let mut plugin = Plugin::from_yaml(&raw).map_err(|source| CacheError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        plugin.validate().map_err(|source| CacheError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        plugin.file_path = Some(path.to_path_buf());
        plugin.loaded_at = Some(Utc::now());
        Ok(Some(plugin))
    }

    /// Serialise `plugin` to `<root>/<id>/<version>/plugin.yaml`, overwriting
    /// any existing manifest, and register it.
    pub async fn add(
        &self,
        plugin: Plugin,
        checksum: Option<String>,
        download_url: Option<String>,
    ) -> Result<CacheEntry, CacheError> {
        self.add_cancellable(plugin, checksum, download_url, &CancellationToken::new()).await
    }

    pub async fn add_cancellable(
        &self,
        plugin: Plugin,
        checksum: Option<String>,
        download_url: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<CacheEntry, CacheError> {
        if cancel.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        plugin
            .validate()
            .map_err(|e| CacheError::Validation(e.to_string()))?;

        let version_dir = self.root.join(&plugin.id).join(&plugin.version);
        create_dir(&version_dir).await?;

        let manifest_path = version_dir.join(MANIFEST_FILE);
        let yaml = plugin
            .to_yaml()
            .map_err(|e| CacheError::Validation(format!("failed to serialise manifest: {e}")))?;
        write_file(&manifest_path, &yaml).await?;

        let mut stored = plugin.clone();
        stored.file_path = Some(manifest_path.clone());
        let now = Utc::now();
        stored.loaded_at = Some(now);
        self.registry.register(stored).await;

        info!(plugin_id = %plugin.id, version = %plugin.version, path = %manifest_path.display(), "added plugin to cache");

        Ok(CacheEntry {
            id: plugin.id,
            name: plugin.name,
            version: plugin.version,
            path: manifest_path,
            checksum,
            download_url,
            cached_at: now,
            last_used: now,
        })
    }

    /// Deletes `<root>/<id>/<version>` recursively, removing the parent
    /// `<root>/<id>` too if it is left empty, and unregisters the plugin.
    pub async fn remove(&self, id: &str, version: &str) -> Result<(), CacheError> {
        self.remove_cancellable(id, version, &CancellationToken::new()).await
    }

    pub async fn remove_cancellable(
        &self,
        id: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<(), CacheError> {
        if cancel.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        let version_dir = self.root.join(id).join(version);
        if !version_dir.is_dir() {
            return Err(CacheError::Core(CoreError::PluginNotInstalled(format!(
                "{id}@{version} not found in cache"
            ))));
        }

        fs::remove_dir_all(&version_dir).await.map_err(|source| CacheError::Io {
            path: version_dir.clone(),
            source,
        })?;

        let id_dir = self.root.join(id);
        if is_dir_empty(&id_dir).await? {
            fs::remove_dir(&id_dir).await.map_err(|source| CacheError::Io {
                path: id_dir.clone(),
                source,
            })?;
        }

        let _ = self.registry.unregister(id).await;
        info!(plugin_id = %id, version = %version, "removed plugin from cache");
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Option<Plugin> {
        self.get_cancellable(id, &CancellationToken::new()).await
    }

    pub async fn get_cancellable(&self, id: &str, cancel: &CancellationToken) -> Option<Plugin> {
        if cancel.is_cancelled() {
            return None;
        }
        self.registry.get(id).await
    }

    pub async fn list(&self) -> Vec<Plugin> {
        self.list_cancellable(&CancellationToken::new()).await
    }

    pub async fn list_cancellable(&self, cancel: &CancellationToken) -> Vec<Plugin> {
        if cancel.is_cancelled() {
            return Vec::new();
        }
        self.registry.list().await
    }

    /// For each registered plugin, stat its manifest file; missing files are
    /// skipped silently rather than erroring.
    pub async fn list_entries(&self) -> Result<Vec<CacheEntry>, CacheError> {
        self.list_entries_cancellable(&CancellationToken::new()).await
    }

    pub async fn list_entries_cancellable(&self, cancel: &CancellationToken) -> Result<Vec<CacheEntry>, CacheError> {
        let mut entries = Vec::new();
        for plugin in self.registry.list().await {
            if cancel.is_cancelled() {
                return Err(CacheError::Cancelled);
            }
            let Some(path) = &plugin.file_path else { continue };
            if fs::metadata(path).await.is_err() {
                continue;
            }
            let cached_at = plugin.loaded_at.unwrap_or_else(Utc::now);
            entries.push(CacheEntry {
                id: plugin.id.clone(),
                name: plugin.name.clone(),
                version: plugin.version.clone(),
                path: path.clone(),
                checksum: None,
                download_url: None,
                cached_at,
                last_used: cached_at,
            });
        }
        Ok(entries)
    }

    /// Recursive sum, in bytes, of every file size under the cache root.
    pub async fn size(&self) -> Result<u64, CacheError> {
        self.size_cancellable(&CancellationToken::new()).await
    }

    pub async fn size_cancellable(&self, cancel: &CancellationToken) -> Result<u64, CacheError> {
        Box::pin(dir_size(&self.root, cancel)).await
    }

    /// Removes every `<root>/<id>` subtree whose mtime is older than
    /// `max_age`, unregistering the corresponding plugin. Returns the number
    /// of subtrees removed.
    pub async fn prune(&self, max_age: Duration) -> Result<usize, CacheError> {
        self.prune_cancellable(max_age, &CancellationToken::new()).await
    }

    pub async fn prune_cancellable(&self, max_age: Duration, cancel: &CancellationToken) -> Result<usize, CacheError> {
        let id_dirs = read_dir_entries(&self.root).await?;
        let now = SystemTime::now();
        let mut removed = 0;

        for id in id_dirs {
            if cancel.is_cancelled() {
                return Err(CacheError::Cancelled);
            }
            let id_path = self.root.join(&id);
            let metadata = match fs::metadata(&id_path).await {
                Ok(m) => m,
                Err(_) => continue,
            };
            let mtime = metadata.modified().map_err(|source| CacheError::Io {
                path: id_path.clone(),
                source,
            })?;
            let age = now.duration_since(mtime).unwrap_or_default();
            if age > max_age {
                fs::remove_dir_all(&id_path).await.map_err(|source| CacheError::Io {
                    path: id_path.clone(),
                    source,
                })?;
                let _ = self.registry.unregister(&id).await;
                removed += 1;
            }
        }

        info!(removed, max_age_secs = max_age.as_secs(), "pruned cache");
        Ok(removed)
    }

    /// Deletes the entire cache root's contents and clears the registry.
    pub async fn clear(&self) -> Result<(), CacheError> {
        self.clear_cancellable(&CancellationToken::new()).await
    }

    pub async fn clear_cancellable(&self, cancel: &CancellationToken) -> Result<(), CacheError> {
        let id_dirs = read_dir_entries(&self.root).await?;
        for id in id_dirs {
            if cancel.is_cancelled() {
                return Err(CacheError::Cancelled);
            }
            let id_path = self.root.join(&id);
            if id_path.is_dir() {
                fs::remove_dir_all(&id_path).await.map_err(|source| CacheError::Io {
                    path: id_path.clone(),
                    source,
                })?;
            }
        }
        self.registry.clear().await;
        info!("cleared cache");
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Filesystem helpers
// ═══════════════════════════════════════════════════════════════════════════════

async fn create_dir(path: &Path) -> Result<(), CacheError> {
    fs::create_dir_all(path).await.map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    set_dir_mode(path).await?;
    Ok(())
}

async fn write_file(path: &Path, contents: &str) -> Result<(), CacheError> {
    fs::write(path, contents).await.map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    set_file_mode(path).await?;
    Ok(())
}

#[cfg(unix)]
async fn set_dir_mode(path: &Path) -> Result<(), CacheError> {
    use std::os::unix::fs::PermissionsExt;
    let perms = std::fs::Permissions::from_mode(DIR_MODE);
    fs::set_permissions(path, perms).await.map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(not(unix))]
async fn set_dir_mode(_path: &Path) -> Result<(), CacheError> {
    Ok(())
}

#[cfg(unix)]
async fn set_file_mode(path: &Path) -> Result<(), CacheError> {
    use std::os::unix::fs::PermissionsExt;
    let perms = std::fs::Permissions::from_mode(FILE_MODE);
    fs::set_permissions(path, perms).await.map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(not(unix))]
async fn set_file_mode(_path: &Path) -> Result<(), CacheError> {
    Ok(())
}

async fn read_dir_entries(dir: &Path) -> Result<Vec<String>, CacheError> {
    let mut reader = fs::read_dir(dir).await.map_err(|source| CacheError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut names = Vec::new();
    while let Some(entry) = reader.next_entry().await.map_err(|source| CacheError::Io {
        path: dir.to_path_buf(),
        source,
    })? {
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

/// Recursively sums file sizes under `dir`, checking `cancel` between entries.
async fn dir_size(dir: &Path, cancel: &CancellationToken) -> Result<u64, CacheError> {
    let mut reader = fs::read_dir(dir).await.map_err(|source| CacheError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut total = 0u64;
    while let Some(entry) = reader.next_entry().await.map_err(|source| CacheError::Io {
        path: dir.to_path_buf(),
        source,
    })? {
        if cancel.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        let path = entry.path();
        let metadata = entry.metadata().await.map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })?;
        if metadata.is_dir() {
            total += Box::pin(dir_size(&path, cancel)).await?;
        } else {
            total += metadata.len();
        }
    }
    Ok(total)
}

async fn is_dir_empty(dir: &Path) -> Result<bool, CacheError> {
    let mut reader = fs::read_dir(dir).await.map_err(|source| CacheError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    Ok(reader.next_entry().await.map_err(|source| CacheError::Io {
        path: dir.to_path_buf(),
        source,
    })?.is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::{MatchBlock, MatchRule, OutputBlock, PluginMetadata, PluginType, Trigger, Value};
    use filetime::{set_file_mtime, FileTime};
    use tempfile::TempDir;

    fn plugin(id: &str, version: &str) -> Plugin {
        Plugin {
            id: id.to_string(),
            name: "Test Plugin".into(),
            version: version.to_string(),
            plugin_type: PluginType::Evaluation,
            author: "security-team".into(),
            min_runtime_version: None,
            metadata: PluginMetadata {
                severity: "high".into(),
                tags: vec![],
                references: vec![],
                cve: None,
            },
            triggers: vec![Trigger {
                data_key: "k".into(),
                condition: "exists".into(),
                value: Value::Bool(true),
            }],
            match_block: Some(MatchBlock {
                logic: "AND".into(),
                rules: vec![MatchRule {
                    field: "k".into(),
                    operator: "equals".into(),
                    value: Value::String("v".into()),
                }],
            }),
            output: OutputBlock {
                message: "finding".into(),
                ..Default::default()
            },
            signature: None,
            file_path: None,
            loaded_at: None,
        }
    }

    #[tokio::test]
    async fn empty_root_path_is_rejected() {
        let err = CacheManager::new("").await.unwrap_err();
        assert!(matches!(err, CacheError::Core(CoreError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn size_sums_manifest_bytes_recursively() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path()).await.unwrap();
        cache.add(plugin("a", "1.0.0"), None, None).await.unwrap();
        cache.add(plugin("b", "1.0.0"), None, None).await.unwrap();

        let expected: u64 = [
            dir.path().join("a").join("1.0.0").join("plugin.yaml"),
            dir.path().join("b").join("1.0.0").join("plugin.yaml"),
        ]
        .iter()
        .map(|p| std::fs::metadata(p).unwrap().len())
        .sum();

        assert_eq!(cache.size().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn add_writes_manifest_and_registers() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path()).await.unwrap();
        let entry = cache.add(plugin("ssh-weak-cipher", "1.0.0"), None, None).await.unwrap();
        assert!(entry.path.exists());
        assert!(cache.get("ssh-weak-cipher").await.is_some());
    }

    #[tokio::test]
    async fn cache_lifecycle_add_get_remove() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path()).await.unwrap();
        cache.add(plugin("p", "1.0.0"), None, None).await.unwrap();

        assert!(cache.get("p").await.is_some());
        let manifest_path = dir.path().join("p").join("1.0.0").join("plugin.yaml");
        assert!(manifest_path.exists());

        cache.remove("p", "1.0.0").await.unwrap();
        assert!(cache.get("p").await.is_none());
        assert!(!dir.path().join("p").exists());

        assert!(cache.remove("p", "1.0.0").await.is_err());
    }

    #[tokio::test]
    async fn startup_load_tolerates_corruption() {
        let dir = TempDir::new().unwrap();

        let good_dir = dir.path().join("good").join("1.0.0");
        std::fs::create_dir_all(&good_dir).unwrap();
        std::fs::write(good_dir.join("plugin.yaml"), plugin("good", "1.0.0").to_yaml().unwrap()).unwrap();

        let bad_dir = dir.path().join("bad").join("1.0.0");
        std::fs::create_dir_all(&bad_dir).unwrap();
        std::fs::write(bad_dir.join("plugin.yaml"), "id: bad\nname: Bad\n").unwrap();

        let cache = CacheManager::new(dir.path()).await.unwrap();
        let loaded = cache.list().await;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "good");
    }

    #[tokio::test]
    async fn prune_removes_only_stale_directories() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path()).await.unwrap();
        cache.add(plugin("old", "1.0.0"), None, None).await.unwrap();
        cache.add(plugin("recent", "1.0.0"), None, None).await.unwrap();

        let old_path = dir.path().join("old");
        let two_days_ago = FileTime::from_system_time(SystemTime::now() - Duration::from_secs(2 * 24 * 3600));
        set_file_mtime(&old_path, two_days_ago).unwrap();

        let removed = cache.prune(Duration::from_secs(24 * 3600)).await.unwrap();
        assert_eq!(removed, 1);
        assert!(!old_path.exists());
        assert!(dir.path().join("recent").exists());
        assert!(cache.get("old").await.is_none());
        assert!(cache.get("recent").await.is_some());
    }

    #[tokio::test]
    async fn clear_empties_root_and_registry() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path()).await.unwrap();
        cache.add(plugin("a", "1.0.0"), None, None).await.unwrap();
        cache.add(plugin("b", "1.0.0"), None, None).await.unwrap();

        cache.clear().await.unwrap();
        assert_eq!(cache.list().await.len(), 0);
        assert_eq!(read_dir_entries(dir.path()).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn list_entries_skips_manifests_deleted_out_of_band() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path()).await.unwrap();
        let entry = cache.add(plugin("p", "1.0.0"), None, None).await.unwrap();
        std::fs::remove_file(&entry.path).unwrap();

        let entries = cache.list_entries().await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn cancellation_aborts_prune() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path()).await.unwrap();
        cache.add(plugin("a", "1.0.0"), None, None).await.unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let err = cache.prune_cancellable(Duration::from_secs(1), &token).await.unwrap_err();
        assert!(matches!(err, CacheError::Cancelled));
    }

    #[tokio::test]
    async fn cancellation_aborts_add_remove_get_list() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path()).await.unwrap();
        cache.add(plugin("a", "1.0.0"), None, None).await.unwrap();

        let token = CancellationToken::new();
        token.cancel();

        let err = cache
            .add_cancellable(plugin("b", "1.0.0"), None, None, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Cancelled));

        let err = cache.remove_cancellable("a", "1.0.0", &token).await.unwrap_err();
        assert!(matches!(err, CacheError::Cancelled));

        assert!(cache.get_cancellable("a", &token).await.is_none());
        assert!(cache.list_cancellable(&token).await.is_empty());
    }
}

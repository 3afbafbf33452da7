// Local avatar cache. Metadata and model blobs keyed by avatar id.

pub mod fs_store;
pub mod memory_store;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bytes::Bytes;
use directories::ProjectDirs;

use crate::avatar::metadata::AvatarMetadata;
use crate::config::{LoaderConfig, METADATA_EXTENSION, MODEL_EXTENSION};

pub use fs_store::FileCacheStore;
pub use memory_store::InMemoryCacheStore;

/// Storage backend for cached avatars.
///
/// Implementations are shared between concurrent loads. No cross-load locking
/// is provided: concurrent writes to the same path race and the last one stands.
pub trait AvatarCacheStore: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    /// Load metadata previously saved at `path`. Missing or unreadable entries yield `None`.
    fn load_metadata(&self, path: &Path) -> Option<AvatarMetadata>;

    fn save_metadata(
        &self,
        guid: &str,
        path: &Path,
        metadata: &AvatarMetadata,
        in_project: bool,
    ) -> Result<()>;

    fn load_model(&self, path: &Path) -> Option<Bytes>;

    fn save_model(&self, guid: &str, path: &Path, data: &[u8], in_project: bool) -> Result<()>;

    /// Remove everything stored for `guid` under the selected root.
    fn delete_avatar(&self, guid: &str, in_project: bool) -> Result<()>;

    /// Remove every entry of the persistent cache. Project-folder entries are kept.
    fn clear(&self) -> Result<()>;

    /// True when the persistent cache holds no entries.
    fn is_empty(&self) -> bool;

    /// Total bytes held by the persistent cache.
    fn size_bytes(&self) -> u64;
}

/// Resolves where each avatar's files live.
///
/// Every avatar owns `<root>/<guid>/`, holding `<guid>.json` and `<guid>.glb`,
/// where `root` is either the persistent cache root or the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    persistent_root: PathBuf,
    project_root: PathBuf,
}

impl CacheLayout {
    pub fn new(persistent_root: impl Into<PathBuf>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            persistent_root: persistent_root.into(),
            project_root: project_root.into(),
        }
    }

    /// Build the layout from config, falling back to the platform cache dir.
    pub fn from_config(config: &LoaderConfig) -> Result<Self> {
        let persistent_root = if config.cache_dir.trim().is_empty() {
            let dirs = ProjectDirs::from("com", "AvatarLoader", "AvatarLoader")
                .context("missing project directories")?;
            dirs.cache_dir().join("Avatars")
        } else {
            PathBuf::from(&config.cache_dir)
        };
        Ok(Self::new(persistent_root, &config.project_dir))
    }

    pub fn root(&self, in_project: bool) -> &Path {
        if in_project {
            &self.project_root
        } else {
            &self.persistent_root
        }
    }

    pub fn avatar_dir(&self, guid: &str, in_project: bool) -> PathBuf {
        self.root(in_project).join(guid)
    }

    pub fn metadata_path(&self, guid: &str, in_project: bool) -> PathBuf {
        self.avatar_dir(guid, in_project)
            .join(format!("{}.{}", guid, METADATA_EXTENSION))
    }

    pub fn model_path(&self, guid: &str, in_project: bool) -> PathBuf {
        self.avatar_dir(guid, in_project)
            .join(format!("{}.{}", guid, MODEL_EXTENSION))
    }
}

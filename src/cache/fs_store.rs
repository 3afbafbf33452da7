// Filesystem cache store. One directory per avatar, files replaced atomically.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{AvatarCacheStore, CacheLayout};
use crate::avatar::metadata::AvatarMetadata;

pub struct FileCacheStore {
    layout: CacheLayout,
}

impl FileCacheStore {
    pub fn new(layout: CacheLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    /// Write `data` to a sibling temp file and rename it over `path`,
    /// so readers only ever observe complete files.
    fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow!("cache path {} has no parent", path.display()))?;
        fs::create_dir_all(parent)
            .with_context(|| format!("create cache directory {}", parent.display()))?;

        let file_name = path
            .file_name()
            .ok_or_else(|| anyhow!("cache path {} has no file name", path.display()))?
            .to_string_lossy();
        let tmp = parent.join(format!(".{}.{}.part", file_name, Uuid::new_v4().simple()));

        fs::write(&tmp, data).with_context(|| format!("write {}", tmp.display()))?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e).with_context(|| format!("replace {}", path.display()));
        }
        Ok(())
    }

    fn dir_size(dir: &Path) -> u64 {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => return 0,
        };
        entries
            .flatten()
            .map(|entry| match entry.file_type() {
                Ok(kind) if kind.is_dir() => Self::dir_size(&entry.path()),
                Ok(_) => entry.metadata().map(|m| m.len()).unwrap_or(0),
                Err(_) => 0,
            })
            .sum()
    }
}

impl AvatarCacheStore for FileCacheStore {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn load_metadata(&self, path: &Path) -> Option<AvatarMetadata> {
        let data = fs::read(path).ok()?;
        match AvatarMetadata::from_slice(&data) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!("ignoring unreadable cached metadata {}: {}", path.display(), e);
                None
            }
        }
    }

    fn save_metadata(
        &self,
        guid: &str,
        path: &Path,
        metadata: &AvatarMetadata,
        in_project: bool,
    ) -> Result<()> {
        let json = metadata.to_json()?;
        Self::write_atomic(path, json.as_bytes())?;
        debug!(
            "metadata for {} saved to {} (project={})",
            guid,
            path.display(),
            in_project
        );
        Ok(())
    }

    fn load_model(&self, path: &Path) -> Option<Bytes> {
        fs::read(path).ok().map(Bytes::from)
    }

    fn save_model(&self, guid: &str, path: &Path, data: &[u8], in_project: bool) -> Result<()> {
        Self::write_atomic(path, data)?;
        debug!(
            "model for {} saved to {} ({} bytes, project={})",
            guid,
            path.display(),
            data.len(),
            in_project
        );
        Ok(())
    }

    fn delete_avatar(&self, guid: &str, in_project: bool) -> Result<()> {
        let dir = self.layout.avatar_dir(guid, in_project);
        if dir.exists() {
            fs::remove_dir_all(&dir).with_context(|| format!("remove {}", dir.display()))?;
            debug!("deleted cached avatar {}", guid);
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let root = self.layout.root(false);
        if root.exists() {
            fs::remove_dir_all(root)
                .with_context(|| format!("clear avatar cache {}", root.display()))?;
        }
        info!("avatar cache cleared at {}", root.display());
        Ok(())
    }

    fn is_empty(&self) -> bool {
        match fs::read_dir(self.layout.root(false)) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        }
    }

    fn size_bytes(&self) -> u64 {
        Self::dir_size(self.layout.root(false))
    }
}

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use bytes::Bytes;
use parking_lot::RwLock;

use super::AvatarCacheStore;
use crate::avatar::metadata::AvatarMetadata;

struct Entry {
    guid: String,
    in_project: bool,
    data: Bytes,
}

/// Process-local cache store. Stores the same encodings the filesystem store
/// writes, keyed by path.
#[derive(Default)]
pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<PathBuf, Entry>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs, project entries included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn put(&self, guid: &str, path: &Path, data: Bytes, in_project: bool) {
        self.entries.write().insert(
            path.to_path_buf(),
            Entry {
                guid: guid.to_string(),
                in_project,
                data,
            },
        );
    }
}

impl AvatarCacheStore for InMemoryCacheStore {
    fn exists(&self, path: &Path) -> bool {
        self.entries.read().contains_key(path)
    }

    fn load_metadata(&self, path: &Path) -> Option<AvatarMetadata> {
        let entries = self.entries.read();
        AvatarMetadata::from_slice(&entries.get(path)?.data).ok()
    }

    fn save_metadata(
        &self,
        guid: &str,
        path: &Path,
        metadata: &AvatarMetadata,
        in_project: bool,
    ) -> Result<()> {
        let json = metadata.to_json()?;
        self.put(guid, path, Bytes::from(json), in_project);
        Ok(())
    }

    fn load_model(&self, path: &Path) -> Option<Bytes> {
        self.entries.read().get(path).map(|entry| entry.data.clone())
    }

    fn save_model(&self, guid: &str, path: &Path, data: &[u8], in_project: bool) -> Result<()> {
        self.put(guid, path, Bytes::copy_from_slice(data), in_project);
        Ok(())
    }

    fn delete_avatar(&self, guid: &str, in_project: bool) -> Result<()> {
        self.entries
            .write()
            .retain(|_, entry| !(entry.guid == guid && entry.in_project == in_project));
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries.write().retain(|_, entry| entry.in_project);
        Ok(())
    }

    fn is_empty(&self) -> bool {
        !self.entries.read().values().any(|entry| !entry.in_project)
    }

    fn size_bytes(&self) -> u64 {
        self.entries
            .read()
            .values()
            .filter(|entry| !entry.in_project)
            .map(|entry| entry.data.len() as u64)
            .sum()
    }
}

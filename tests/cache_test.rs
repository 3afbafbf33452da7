use std::fs;

use time::macros::datetime;

use avatar_loader_engine::cache::{AvatarCacheStore, CacheLayout, FileCacheStore, InMemoryCacheStore};
use avatar_loader_engine::{AvatarMetadata, BodyType};

const GUID: &str = "638df693d72bffc6fa17943c";

fn sample_metadata() -> AvatarMetadata {
    AvatarMetadata::new(BodyType::FullBody, datetime!(2024-01-01 00:00:00 UTC))
}

fn file_store(dir: &tempfile::TempDir) -> FileCacheStore {
    FileCacheStore::new(CacheLayout::new(
        dir.path().join("persistent"),
        dir.path().join("project"),
    ))
}

#[test]
fn test_layout_paths() {
    let layout = CacheLayout::new("/cache", "/project/Assets/Avatars");
    assert_eq!(
        layout.metadata_path(GUID, false),
        std::path::Path::new("/cache").join(GUID).join(format!("{}.json", GUID))
    );
    assert_eq!(
        layout.model_path(GUID, true),
        std::path::Path::new("/project/Assets/Avatars")
            .join(GUID)
            .join(format!("{}.glb", GUID))
    );
}

#[test]
fn test_file_store_metadata_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir);
    let path = store.layout().metadata_path(GUID, false);

    assert!(store.is_empty());
    assert!(!store.exists(&path));
    assert!(store.load_metadata(&path).is_none());

    store
        .save_metadata(GUID, &path, &sample_metadata(), false)
        .unwrap();

    assert!(store.exists(&path));
    assert!(!store.is_empty());
    assert_eq!(store.load_metadata(&path), Some(sample_metadata()));
}

#[test]
fn test_file_store_save_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir);
    let path = store.layout().metadata_path(GUID, false);

    store.save_metadata(GUID, &path, &sample_metadata(), false).unwrap();
    let once = fs::read(&path).unwrap();
    store.save_metadata(GUID, &path, &sample_metadata(), false).unwrap();
    let twice = fs::read(&path).unwrap();

    assert_eq!(once, twice);
    assert_eq!(store.load_metadata(&path), Some(sample_metadata()));

    // No temp files are left next to the entry.
    let entries: Vec<_> = fs::read_dir(path.parent().unwrap())
        .unwrap()
        .flatten()
        .map(|e| e.file_name())
        .collect();
    assert_eq!(entries.len(), 1);
}

#[test]
fn test_file_store_model_round_trip_and_size() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir);
    let path = store.layout().model_path(GUID, false);
    let model = vec![0x67u8; 4096];

    assert!(store.load_model(&path).is_none());
    store.save_model(GUID, &path, &model, false).unwrap();

    assert_eq!(store.load_model(&path).unwrap().as_ref(), model.as_slice());
    assert_eq!(store.size_bytes(), 4096);
}

#[test]
fn test_file_store_corrupt_metadata_reads_as_missing() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir);
    let path = store.layout().metadata_path(GUID, false);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "{not json").unwrap();

    assert!(store.exists(&path));
    assert!(store.load_metadata(&path).is_none());
}

#[test]
fn test_file_store_clear_keeps_project_entries() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir);
    let cached = store.layout().metadata_path(GUID, false);
    let project = store.layout().metadata_path(GUID, true);

    store.save_metadata(GUID, &cached, &sample_metadata(), false).unwrap();
    store.save_metadata(GUID, &project, &sample_metadata(), true).unwrap();
    assert!(!store.is_empty());

    store.clear().unwrap();

    assert!(store.is_empty());
    assert!(!store.exists(&cached));
    assert!(store.exists(&project));
    assert_eq!(store.size_bytes(), 0);

    // Clearing an already empty cache is fine.
    store.clear().unwrap();
}

#[test]
fn test_file_store_delete_avatar() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir);
    let metadata_path = store.layout().metadata_path(GUID, false);
    let model_path = store.layout().model_path(GUID, false);

    store.save_metadata(GUID, &metadata_path, &sample_metadata(), false).unwrap();
    store.save_model(GUID, &model_path, b"glTF", false).unwrap();
    store.delete_avatar(GUID, false).unwrap();

    assert!(!store.exists(&metadata_path));
    assert!(!store.exists(&model_path));
    store.delete_avatar("never-cached", false).unwrap();
}

#[test]
fn test_memory_store_matches_file_semantics() {
    let layout = CacheLayout::new("/cache", "/project");
    let store = InMemoryCacheStore::new();
    let cached = layout.metadata_path(GUID, false);
    let project = layout.model_path(GUID, true);

    assert!(store.is_empty());
    store.save_metadata(GUID, &cached, &sample_metadata(), false).unwrap();
    store.save_metadata(GUID, &cached, &sample_metadata(), false).unwrap();
    store.save_model(GUID, &project, b"glTF", true).unwrap();

    assert_eq!(store.len(), 2);
    assert_eq!(store.load_metadata(&cached), Some(sample_metadata()));
    assert_eq!(store.load_model(&project).unwrap().as_ref(), b"glTF");
    assert!(!store.is_empty());

    store.clear().unwrap();
    assert!(store.is_empty());
    assert!(!store.exists(&cached));
    assert!(store.exists(&project));

    store.delete_avatar(GUID, true).unwrap();
    assert_eq!(store.len(), 0);
}

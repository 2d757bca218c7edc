//! Directory-backed schema snapshot store

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use super::snapshot::{CachedSchemaInfo, SchemaMetadata, SchemaSnapshot};
use crate::validation::validate_source_name;
use crate::{Error, Result};

const SCHEMA_SUFFIX: &str = "_schema.json";
const METADATA_SUFFIX: &str = "_metadata.json";

/// Persists one snapshot per data source as `<name>_schema.json` plus a
/// `<name>_metadata.json` sidecar.
///
/// Files are written through a temporary file and renamed into place,
/// payload first. The store assumes a single writing process.
#[derive(Debug, Clone)]
pub struct SchemaStore {
    dir: PathBuf,
}

impl SchemaStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            Error::Persistence(format!(
                "Failed to create schema directory {}: {e}",
                dir.display()
            ))
        })?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn schema_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}{SCHEMA_SUFFIX}"))
    }

    fn metadata_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}{METADATA_SUFFIX}"))
    }

    /// Return the stored snapshot if its sidecar says it is still fresh
    pub async fn get_schema(&self, name: &str) -> Result<Option<SchemaSnapshot>> {
        validate_source_name(name)?;

        let Some(metadata) = self.read_metadata(name).await? else {
            return Ok(None);
        };
        if !metadata.is_fresh() {
            tracing::debug!(source = name, "Schema snapshot is stale");
            return Ok(None);
        }

        read_json(&self.schema_path(name)).await
    }

    /// Persist a snapshot and its sidecar, returning the written sidecar
    pub async fn save_schema(
        &self,
        name: &str,
        snapshot: &SchemaSnapshot,
    ) -> Result<SchemaMetadata> {
        validate_source_name(name)?;

        let payload = serde_json::to_vec_pretty(snapshot)?;
        let metadata = SchemaMetadata::new(name, snapshot.metadata.cache_ttl, payload.len());
        let sidecar = serde_json::to_vec_pretty(&metadata)?;

        write_atomic(&self.schema_path(name), &payload).await?;
        write_atomic(&self.metadata_path(name), &sidecar).await?;

        tracing::info!(
            source = name,
            schema_size = metadata.schema_size,
            ttl_seconds = metadata.ttl_seconds,
            "Schema snapshot saved"
        );
        Ok(metadata)
    }

    /// True unless a parsable, fresh sidecar exists
    pub async fn is_schema_stale(&self, name: &str) -> bool {
        match self.read_metadata(name).await {
            Ok(Some(metadata)) => !metadata.is_fresh(),
            Ok(None) | Err(_) => true,
        }
    }

    /// Remove both files of a snapshot, ignoring missing ones.
    /// Returns whether anything was removed.
    pub async fn invalidate_schema(&self, name: &str) -> bool {
        let mut removed = false;
        for path in [self.schema_path(name), self.metadata_path(name)] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed = true,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove schema file");
                }
            }
        }
        if removed {
            tracing::info!(source = name, "Schema snapshot invalidated");
        }
        removed
    }

    /// Hash of the whole fresh snapshot, if any
    pub async fn get_schema_hash(&self, name: &str) -> Result<Option<String>> {
        match self.get_schema(name).await? {
            Some(snapshot) => Ok(Some(snapshot.snapshot_hash()?)),
            None => Ok(None),
        }
    }

    /// Every parsable sidecar in the directory, keyed by source name
    pub async fn list_cached_schemas(&self) -> Result<BTreeMap<String, CachedSchemaInfo>> {
        let mut listing = BTreeMap::new();
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| persistence("read schema directory", &self.dir, &e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| persistence("read schema directory", &self.dir, &e))?
        {
            let file_name = entry.file_name();
            let Some(name) = file_name
                .to_str()
                .and_then(|f| f.strip_suffix(METADATA_SUFFIX))
            else {
                continue;
            };

            let metadata: SchemaMetadata = match read_json(&entry.path()).await {
                Ok(Some(metadata)) => metadata,
                Ok(None) | Err(_) => continue,
            };
            let schema_file_exists = tokio::fs::try_exists(self.schema_path(name))
                .await
                .unwrap_or(false);

            listing.insert(
                name.to_string(),
                CachedSchemaInfo {
                    is_fresh: metadata.is_fresh(),
                    metadata,
                    schema_file_exists,
                },
            );
        }

        Ok(listing)
    }

    /// Invalidate every non-fresh snapshot, returning how many were removed
    pub async fn cleanup_stale_schemas(&self) -> Result<usize> {
        let mut removed = 0;
        for (name, info) in self.list_cached_schemas().await? {
            if !info.is_fresh && self.invalidate_schema(&name).await {
                removed += 1;
            }
        }
        tracing::info!(removed, "Stale schema cleanup finished");
        Ok(removed)
    }

    async fn read_metadata(&self, name: &str) -> Result<Option<SchemaMetadata>> {
        read_json(&self.metadata_path(name)).await
    }
}

fn persistence(action: &str, path: &Path, err: &std::io::Error) -> Error {
    Error::Persistence(format!("Failed to {action} {}: {err}", path.display()))
}

/// Missing and unparsable files both read as `None`
async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(persistence("read", path, &e)),
    };

    match serde_json::from_slice(&content) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unparsable schema file");
            Ok(None)
        }
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| persistence("write", &tmp, &e))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(persistence("rename into", path, &e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, Utc};
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn store() -> (TempDir, SchemaStore) {
        let dir = TempDir::new().unwrap();
        let store = SchemaStore::new(dir.path().join("resources")).unwrap();
        (dir, store)
    }

    fn snapshot(name: &str, ttl: u64) -> SchemaSnapshot {
        SchemaSnapshot::new(name, ttl)
            .with_entity("users", json!({"columns": {"id": {"type": "INT"}}}))
    }

    async fn age_sidecar(store: &SchemaStore, name: &str, secs: i64) {
        let path = store.metadata_path(name);
        let mut metadata: SchemaMetadata =
            serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        metadata.generated_at = Utc::now() - TimeDelta::seconds(secs);
        tokio::fs::write(&path, serde_json::to_vec(&metadata).unwrap())
            .await
            .unwrap();
    }

    #[test]
    fn test_new_creates_directory() {
        let (_dir, store) = store();
        assert!(store.dir().is_dir());
    }

    #[tokio::test]
    async fn test_save_then_get_round_trip() {
        let (_dir, store) = store();
        let original = snapshot("sales", 3600);

        let metadata = store.save_schema("sales", &original).await.unwrap();
        assert_eq!(metadata.data_source, "sales");
        assert_eq!(metadata.ttl_seconds, 3600);
        assert_eq!(metadata.version, "1.0");
        assert!(metadata.schema_size > 0);

        let loaded = store.get_schema("sales").await.unwrap().unwrap();
        assert_eq!(loaded, original);
        assert!(!store.is_schema_stale("sales").await);
    }

    #[tokio::test]
    async fn test_file_layout() {
        let (_dir, store) = store();
        store.save_schema("sales", &snapshot("sales", 60)).await.unwrap();

        assert!(store.dir().join("sales_schema.json").is_file());
        assert!(store.dir().join("sales_metadata.json").is_file());
        assert!(!store.dir().join("sales_schema.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_schema_is_none() {
        let (_dir, store) = store();
        assert!(store.get_schema("nothing").await.unwrap().is_none());
        assert!(store.is_schema_stale("nothing").await);
    }

    #[tokio::test]
    async fn test_stale_schema_is_none() {
        let (_dir, store) = store();
        store.save_schema("sales", &snapshot("sales", 60)).await.unwrap();
        age_sidecar(&store, "sales", 120).await;

        assert!(store.get_schema("sales").await.unwrap().is_none());
        assert!(store.is_schema_stale("sales").await);
        assert!(store.get_schema_hash("sales").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unparsable_sidecar_is_none() {
        let (_dir, store) = store();
        store.save_schema("sales", &snapshot("sales", 60)).await.unwrap();
        tokio::fs::write(store.metadata_path("sales"), b"not json")
            .await
            .unwrap();

        assert!(store.get_schema("sales").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_payload_is_none() {
        let (_dir, store) = store();
        store.save_schema("sales", &snapshot("sales", 60)).await.unwrap();
        tokio::fs::remove_file(store.schema_path("sales"))
            .await
            .unwrap();

        assert!(store.get_schema("sales").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_name_rejected() {
        let (_dir, store) = store();
        let err = store.get_schema("../etc").await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_invalidate_schema() {
        let (_dir, store) = store();
        store.save_schema("sales", &snapshot("sales", 60)).await.unwrap();

        assert!(store.invalidate_schema("sales").await);
        assert!(!store.invalidate_schema("sales").await);
        assert!(store.get_schema("sales").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_schema_hash_stable_and_sensitive() {
        let (_dir, store) = store();
        let first = snapshot("sales", 60);
        store.save_schema("sales", &first).await.unwrap();
        let hash1 = store.get_schema_hash("sales").await.unwrap().unwrap();

        store.save_schema("sales", &first).await.unwrap();
        let hash2 = store.get_schema_hash("sales").await.unwrap().unwrap();
        assert_eq!(hash1, hash2);

        let changed = first.with_entity("orders", json!({"columns": {}}));
        store.save_schema("sales", &changed).await.unwrap();
        let hash3 = store.get_schema_hash("sales").await.unwrap().unwrap();
        assert_ne!(hash1, hash3);
    }

    #[tokio::test]
    async fn test_schema_hash_changes_with_header_fields() {
        let (_dir, store) = store();
        let first = snapshot("sales", 3600);
        store.save_schema("sales", &first).await.unwrap();
        let hash1 = store.get_schema_hash("sales").await.unwrap().unwrap();

        let mut second = first.clone();
        second.metadata.cache_ttl = 7200;
        store.save_schema("sales", &second).await.unwrap();
        let hash2 = store.get_schema_hash("sales").await.unwrap().unwrap();
        assert_ne!(hash1, hash2);

        let mut third = second.clone();
        third.metadata.data_source = "renamed".to_string();
        third.metadata.generated_at = second.metadata.generated_at - TimeDelta::hours(1);
        store.save_schema("sales", &third).await.unwrap();
        let hash3 = store.get_schema_hash("sales").await.unwrap().unwrap();
        assert_ne!(hash2, hash3);
    }

    #[tokio::test]
    async fn test_list_cached_schemas() {
        let (_dir, store) = store();
        store.save_schema("fresh", &snapshot("fresh", 60)).await.unwrap();
        store.save_schema("old", &snapshot("old", 60)).await.unwrap();
        age_sidecar(&store, "old", 600).await;
        tokio::fs::remove_file(store.schema_path("old")).await.unwrap();
        tokio::fs::write(store.dir().join("junk_metadata.json"), b"{")
            .await
            .unwrap();

        let listing = store.list_cached_schemas().await.unwrap();
        assert_eq!(listing.len(), 2);
        assert!(listing["fresh"].is_fresh);
        assert!(listing["fresh"].schema_file_exists);
        assert!(!listing["old"].is_fresh);
        assert!(!listing["old"].schema_file_exists);
    }

    #[tokio::test]
    async fn test_cleanup_stale_schemas() {
        let (_dir, store) = store();
        store.save_schema("a", &snapshot("a", 60)).await.unwrap();
        store.save_schema("b", &snapshot("b", 60)).await.unwrap();
        store.save_schema("c", &snapshot("c", 60)).await.unwrap();
        age_sidecar(&store, "b", 61).await;
        age_sidecar(&store, "c", 3600).await;

        assert_eq!(store.cleanup_stale_schemas().await.unwrap(), 2);
        let listing = store.list_cached_schemas().await.unwrap();
        assert_eq!(listing.keys().collect::<Vec<_>>(), vec!["a"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sidecar_failure_keeps_previous_sidecar() {
        let (_dir, store) = store();
        let first = snapshot("sales", 60);
        let before = store.save_schema("sales", &first).await.unwrap();

        // A directory squatting on the sidecar's temp path makes its write fail.
        let blocker = store.dir().join("sales_metadata.json.tmp");
        tokio::fs::create_dir(&blocker).await.unwrap();

        let err = store
            .save_schema("sales", &first.clone().with_entity("orders", json!({})))
            .await
            .unwrap_err();
        assert!(err.is_persistence());

        let sidecar: SchemaMetadata = serde_json::from_slice(
            &tokio::fs::read(store.metadata_path("sales")).await.unwrap(),
        )
        .unwrap();
        assert_eq!(sidecar, before);
    }
}

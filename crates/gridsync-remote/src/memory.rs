//! In-memory [`RemoteStore`] implementation
//!
//! Backs the test suites and the demo path. Collections and data objects live
//! in maps behind an async lock; checksums are recorded in the tagged SHA-256
//! encoding unless a test seeds a different value explicitly.

use crate::store::RemoteStore;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use gridsync_types::{Error, Result};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    checksum: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    collections: BTreeSet<String>,
    objects: BTreeMap<String, StoredObject>,
    resources: HashMap<String, u64>,
    read_only_prefix: Option<String>,
}

/// In-memory grid holding collections, data objects and resource capacities
#[derive(Debug, Default)]
pub struct MemoryRemote {
    inner: RwLock<Inner>,
}

impl MemoryRemote {
    /// Create an empty in-memory grid
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the tagged checksum value this grid records for `data`
    pub fn tagged_checksum(data: &[u8]) -> String {
        format!("sha2:{}", BASE64.encode(Sha256::digest(data)))
    }

    /// Create a collection and all its ancestors
    pub async fn add_collection(&self, path: &str) {
        let mut inner = self.inner.write().await;
        insert_with_ancestors(&mut inner.collections, path);
    }

    /// Store a data object with an automatically recorded checksum
    pub async fn add_object(&self, path: &str, data: &[u8]) {
        let checksum = Some(Self::tagged_checksum(data));
        self.add_object_with_checksum(path, data, checksum).await;
    }

    /// Store a data object with an explicit (possibly absent) checksum value
    pub async fn add_object_with_checksum(
        &self,
        path: &str,
        data: &[u8],
        checksum: Option<String>,
    ) {
        let mut inner = self.inner.write().await;
        if let Some(parent) = parent_collection(path) {
            insert_with_ancestors(&mut inner.collections, parent);
        }
        inner.objects.insert(
            path.to_string(),
            StoredObject {
                data: data.to_vec(),
                checksum,
            },
        );
    }

    /// Set the free space reported for a named resource
    pub async fn set_resource_space(&self, resource: &str, bytes: u64) {
        self.inner
            .write()
            .await
            .resources
            .insert(resource.to_string(), bytes);
    }

    /// Reject writes under `prefix` with a permission error
    pub async fn set_read_only_prefix(&self, prefix: &str) {
        self.inner.write().await.read_only_prefix = Some(prefix.to_string());
    }

    /// Content of a stored data object, for assertions
    pub async fn object_data(&self, path: &str) -> Option<Vec<u8>> {
        self.inner
            .read()
            .await
            .objects
            .get(path)
            .map(|o| o.data.clone())
    }
}

fn parent_collection(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(parent, _)| parent)
}

fn insert_with_ancestors(collections: &mut BTreeSet<String>, path: &str) {
    let mut current = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(segment);
        collections.insert(current.clone());
    }
}

fn check_writable(inner: &Inner, path: &str) -> Result<()> {
    if let Some(prefix) = &inner.read_only_prefix {
        if path.starts_with(prefix.as_str()) {
            return Err(Error::PermissionDenied {
                path: path.to_string(),
            });
        }
    }
    Ok(())
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn collection_exists(&self, path: &str) -> Result<bool> {
        Ok(self.inner.read().await.collections.contains(path))
    }

    async fn object_exists(&self, path: &str) -> Result<bool> {
        Ok(self.inner.read().await.objects.contains_key(path))
    }

    async fn list_checksums(&self, collection: &str) -> Result<HashMap<String, Option<String>>> {
        let inner = self.inner.read().await;
        let mut result = HashMap::new();
        for (path, object) in &inner.objects {
            if let Some(relative) = path.strip_prefix(collection) {
                if relative.starts_with('/') {
                    result.insert(relative.to_string(), object.checksum.clone());
                }
            }
        }
        Ok(result)
    }

    async fn get_checksum(&self, collection: &str, name: &str) -> Result<Option<String>> {
        let path = format!("{collection}/{name}");
        Ok(self
            .inner
            .read()
            .await
            .objects
            .get(&path)
            .and_then(|o| o.checksum.clone()))
    }

    async fn object_size(&self, path: &str) -> Result<u64> {
        let inner = self.inner.read().await;
        inner
            .objects
            .get(path)
            .map(|o| o.data.len() as u64)
            .ok_or_else(|| Error::remote(format!("no data object at '{path}'")))
    }

    async fn put(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        let data = tokio::fs::read(local_path).await.map_err(|e| Error::Io {
            message: format!("Failed to read file '{}': {}", local_path.display(), e),
        })?;

        let mut inner = self.inner.write().await;
        check_writable(&inner, remote_path)?;
        let parent = parent_collection(remote_path)
            .ok_or_else(|| Error::remote(format!("'{remote_path}' has no parent collection")))?;
        if !inner.collections.contains(parent) {
            return Err(Error::remote(format!("no such collection '{parent}'")));
        }
        let checksum = Some(Self::tagged_checksum(&data));
        inner
            .objects
            .insert(remote_path.to_string(), StoredObject { data, checksum });
        Ok(())
    }

    async fn get(&self, remote_path: &str, local_path: &Path) -> Result<()> {
        let data = {
            let inner = self.inner.read().await;
            inner
                .objects
                .get(remote_path)
                .map(|o| o.data.clone())
                .ok_or_else(|| Error::remote(format!("no data object at '{remote_path}'")))?
        };
        tokio::fs::write(local_path, data).await.map_err(|e| Error::Io {
            message: format!("Failed to write file '{}': {}", local_path.display(), e),
        })?;
        Ok(())
    }

    async fn ensure_collection(&self, path: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        check_writable(&inner, path)?;
        insert_with_ancestors(&mut inner.collections, path);
        Ok(())
    }

    async fn resource_free_space(&self, resource: &str) -> Result<u64> {
        Ok(self
            .inner
            .read()
            .await
            .resources
            .get(resource)
            .copied()
            .unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_collection_ancestors_created() {
        let remote = MemoryRemote::new();
        remote.add_collection("/zone/home/user/sub").await;

        assert!(remote.collection_exists("/zone").await.unwrap());
        assert!(remote.collection_exists("/zone/home/user").await.unwrap());
        assert!(!remote.collection_exists("/other").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_checksums_relative_paths() {
        let remote = MemoryRemote::new();
        remote.add_object("/zone/coll/a.txt", b"a").await;
        remote.add_object("/zone/coll/sub/b.txt", b"b").await;
        remote.add_object("/zone/other/c.txt", b"c").await;

        let listing = remote.list_checksums("/zone/coll").await.unwrap();
        assert_eq!(listing.len(), 2);
        assert!(listing.contains_key("/a.txt"));
        assert!(listing.contains_key("/sub/b.txt"));
        assert_eq!(
            listing["/a.txt"],
            Some(MemoryRemote::tagged_checksum(b"a"))
        );
    }

    #[tokio::test]
    async fn test_put_requires_parent_collection() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("x.txt");
        tokio::fs::write(&file, b"x").await.unwrap();

        let remote = MemoryRemote::new();
        assert!(remote.put(&file, "/zone/coll/x.txt").await.is_err());

        remote.ensure_collection("/zone/coll").await.unwrap();
        remote.put(&file, "/zone/coll/x.txt").await.unwrap();
        assert_eq!(remote.object_data("/zone/coll/x.txt").await.unwrap(), b"x");
    }

    #[tokio::test]
    async fn test_read_only_prefix_denies_writes() {
        let remote = MemoryRemote::new();
        remote.set_read_only_prefix("/zone/protected").await;

        let err = remote
            .ensure_collection("/zone/protected/sub")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            gridsync_types::Error::PermissionDenied { .. }
        ));
    }

    #[tokio::test]
    async fn test_get_roundtrip() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out.txt");

        let remote = MemoryRemote::new();
        remote.add_object("/zone/coll/a.txt", b"payload").await;
        remote.get("/zone/coll/a.txt", &target).await.unwrap();

        assert_eq!(tokio::fs::read(&target).await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_resource_free_space_defaults_unbounded() {
        let remote = MemoryRemote::new();
        assert_eq!(
            remote.resource_free_space("hot_1").await.unwrap(),
            u64::MAX
        );
        remote.set_resource_space("hot_1", 512).await;
        assert_eq!(remote.resource_free_space("hot_1").await.unwrap(), 512);
    }
}

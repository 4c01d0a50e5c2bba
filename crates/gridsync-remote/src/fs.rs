//! Directory-backed [`RemoteStore`] implementation
//!
//! Maps logical grid paths onto a local directory root, so a mounted share or
//! a second disk can act as the remote side. Checksums are computed on demand
//! in the tagged SHA-256 encoding; there is no stored metadata, so a listing
//! reads every file once.

use crate::store::RemoteStore;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use gridsync_types::{Error, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use walkdir::WalkDir;

/// A grid rooted at a local directory
#[derive(Debug, Clone)]
pub struct FsRemote {
    root: PathBuf,
}

impl FsRemote {
    /// Serve logical paths out of `root`
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a logical `/`-separated path under the root
    fn resolve(&self, logical: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in logical.split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path
    }
}

async fn tagged_checksum_of(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await.map_err(|e| Error::Io {
        message: format!("Failed to open '{}': {}", path.display(), e),
    })?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer).await.map_err(|e| Error::Io {
            message: format!("Failed to read '{}': {}", path.display(), e),
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("sha2:{}", BASE64.encode(hasher.finalize())))
}

#[async_trait]
impl RemoteStore for FsRemote {
    async fn collection_exists(&self, path: &str) -> Result<bool> {
        Ok(self.resolve(path).is_dir())
    }

    async fn object_exists(&self, path: &str) -> Result<bool> {
        Ok(self.resolve(path).is_file())
    }

    async fn list_checksums(&self, collection: &str) -> Result<HashMap<String, Option<String>>> {
        let root = self.resolve(collection);
        let mut result = HashMap::new();
        if !root.is_dir() {
            return Ok(result);
        }
        for entry in WalkDir::new(&root) {
            let entry = entry.map_err(|e| Error::Io {
                message: format!("Failed to walk '{}': {}", root.display(), e),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(&root).map_err(|e| Error::Io {
                message: format!("Failed to relativize '{}': {}", entry.path().display(), e),
            })?;
            let mut logical = String::new();
            for component in relative.components() {
                logical.push('/');
                logical.push_str(&component.as_os_str().to_string_lossy());
            }
            let checksum = tagged_checksum_of(entry.path()).await?;
            result.insert(logical, Some(checksum));
        }
        Ok(result)
    }

    async fn get_checksum(&self, collection: &str, name: &str) -> Result<Option<String>> {
        let path = self.resolve(collection).join(name);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(tagged_checksum_of(&path).await?))
    }

    async fn object_size(&self, path: &str) -> Result<u64> {
        let resolved = self.resolve(path);
        let metadata = tokio::fs::metadata(&resolved).await.map_err(|_| {
            Error::remote(format!("no data object at '{path}'"))
        })?;
        Ok(metadata.len())
    }

    async fn put(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        let target = self.resolve(remote_path);
        tokio::fs::copy(local_path, &target).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                Error::PermissionDenied {
                    path: remote_path.to_string(),
                }
            } else {
                Error::remote(format!("put to '{remote_path}' failed: {e}"))
            }
        })?;
        Ok(())
    }

    async fn get(&self, remote_path: &str, local_path: &Path) -> Result<()> {
        let source = self.resolve(remote_path);
        tokio::fs::copy(&source, local_path).await.map_err(|e| {
            Error::remote(format!("get of '{remote_path}' failed: {e}"))
        })?;
        Ok(())
    }

    async fn ensure_collection(&self, path: &str) -> Result<()> {
        let target = self.resolve(path);
        tokio::fs::create_dir_all(&target).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                Error::PermissionDenied {
                    path: path.to_string(),
                }
            } else {
                Error::remote(format!("could not create collection '{path}': {e}"))
            }
        })?;
        Ok(())
    }

    async fn resource_free_space(&self, _resource: &str) -> Result<u64> {
        // no resource accounting on a plain filesystem root
        Ok(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRemote;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_logical_paths_resolve_under_the_root() {
        let dir = TempDir::new().unwrap();
        tokio::fs::create_dir_all(dir.path().join("zone/home/user"))
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("zone/home/user/a.txt"), b"abc")
            .await
            .unwrap();

        let remote = FsRemote::new(dir.path());
        assert!(remote.collection_exists("/zone/home/user").await.unwrap());
        assert!(remote.object_exists("/zone/home/user/a.txt").await.unwrap());
        assert!(!remote.object_exists("/zone/home/user/b.txt").await.unwrap());
        assert_eq!(remote.object_size("/zone/home/user/a.txt").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_listing_matches_the_memory_encoding() {
        let dir = TempDir::new().unwrap();
        tokio::fs::create_dir_all(dir.path().join("coll/sub"))
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("coll/a.txt"), b"payload")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("coll/sub/b.txt"), b"x")
            .await
            .unwrap();

        let remote = FsRemote::new(dir.path());
        let listing = remote.list_checksums("/coll").await.unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(
            listing["/a.txt"],
            Some(MemoryRemote::tagged_checksum(b"payload"))
        );
        assert!(listing.contains_key("/sub/b.txt"));
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let grid = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        let source = local.path().join("in.txt");
        tokio::fs::write(&source, b"roundtrip").await.unwrap();

        let remote = FsRemote::new(grid.path());
        remote.ensure_collection("/zone/coll").await.unwrap();
        remote.put(&source, "/zone/coll/in.txt").await.unwrap();
        assert_eq!(
            remote.get_checksum("/zone/coll", "in.txt").await.unwrap(),
            Some(MemoryRemote::tagged_checksum(b"roundtrip"))
        );

        let target = local.path().join("out.txt");
        remote.get("/zone/coll/in.txt", &target).await.unwrap();
        assert_eq!(tokio::fs::read(&target).await.unwrap(), b"roundtrip");
    }
}

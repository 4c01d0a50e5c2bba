//! Computes the transfer set reconciling a local tree with a remote collection
//!
//! Diffing is all-or-nothing per call: any unreadable local file or failed
//! remote query aborts the whole computation. The remote side is consulted
//! with a single bulk checksum query per run, never one round trip per file.

use gridsync_remote::{checksums_differ, RemoteStore};
use gridsync_types::{ChecksumScope, Error, FileSyncMethod, Result, SyncResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Engine computing CREATE/UPDATE transfer sets in either direction
///
/// Output order is deterministic: CREATE results sorted by relative path,
/// then UPDATE results sorted by relative path.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffEngine {
    scope: ChecksumScope,
}

impl DiffEngine {
    /// Create a diff engine with the given comparison policy
    pub fn new(scope: ChecksumScope) -> Self {
        Self { scope }
    }

    /// Plan the uploads needed to bring `remote_root` in sync with `local`
    ///
    /// Files present only locally become CREATE, files on both sides with
    /// differing content become UPDATE, files present only remotely are left
    /// alone. `local` may be a single file, in which case `remote_root` names
    /// the target data object.
    pub async fn diff_upload(
        &self,
        remote: &dyn RemoteStore,
        local: &Path,
        remote_root: &str,
    ) -> Result<Vec<SyncResult>> {
        if local.is_file() {
            return self.diff_upload_single(remote, local, remote_root).await;
        }
        if !local.is_dir() {
            return Err(Error::SourceNotFound {
                path: local.to_path_buf(),
            });
        }

        debug!("diffing upload {} -> {}", local.display(), remote_root);
        let local_files = collect_local_files(local)?;
        let remote_checksums = remote.list_checksums(remote_root).await?;

        let mut creates = Vec::new();
        let mut candidates = Vec::new();
        for rel in &local_files {
            if remote_checksums.contains_key(rel) {
                candidates.push(rel.clone());
            } else {
                creates.push(rel.clone());
            }
        }
        creates.sort();
        candidates.sort();

        let mut results = Vec::with_capacity(creates.len());
        for rel in creates {
            let source = local_file_for(local, &rel);
            let size = local_size(&source).await?;
            results.push(SyncResult::new(
                path_string(&source),
                format!("{remote_root}{rel}"),
                size,
                FileSyncMethod::Create,
            ));
        }

        for rel in candidates {
            let source = local_file_for(local, &rel);
            let target = format!("{remote_root}{rel}");
            let differs = match self.scope {
                ChecksumScope::Checksum => {
                    checksums_differ(&source, remote_checksums[&rel].as_deref()).await?
                }
                ChecksumScope::Size => {
                    remote.object_size(&target).await? != local_size(&source).await?
                }
            };
            if differs {
                let size = local_size(&source).await?;
                results.push(SyncResult::new(
                    path_string(&source),
                    target,
                    size,
                    FileSyncMethod::Update,
                ));
            }
        }

        info!(
            "upload diff {} -> {}: {} transfers planned",
            local.display(),
            remote_root,
            results.len()
        );
        Ok(results)
    }

    /// Plan the downloads needed to bring `local` in sync with `remote_root`
    ///
    /// In download results `source_path` is the local destination and
    /// `target_path` the remote data object, so the executor reads `target`
    /// and writes `source`. Sizes are taken from the remote side, falling back
    /// to 0 when the size query fails.
    pub async fn diff_download(
        &self,
        remote: &dyn RemoteStore,
        local: &Path,
        remote_root: &str,
    ) -> Result<Vec<SyncResult>> {
        let (local_root, local_files, remote_base, remote_files) =
            self.download_universe(remote, local, remote_root).await?;

        let mut creates: Vec<String> = remote_files
            .keys()
            .filter(|rel| !local_files.contains(*rel))
            .cloned()
            .collect();
        let mut candidates: Vec<String> = local_files
            .iter()
            .filter(|rel| remote_files.contains_key(*rel))
            .cloned()
            .collect();
        creates.sort();
        candidates.sort();

        let mut results = Vec::new();
        for rel in creates {
            results.push(SyncResult::new(
                path_string(&local_file_for(&local_root, &rel)),
                format!("{remote_base}{rel}"),
                0,
                FileSyncMethod::Create,
            ));
        }
        for rel in candidates {
            let local_path = local_file_for(&local_root, &rel);
            let target = format!("{remote_base}{rel}");
            let differs = match self.scope {
                ChecksumScope::Checksum => {
                    checksums_differ(&local_path, remote_files[&rel].as_deref()).await?
                }
                ChecksumScope::Size => {
                    remote.object_size(&target).await? != local_size(&local_path).await?
                }
            };
            if differs {
                results.push(SyncResult::new(
                    path_string(&local_path),
                    target,
                    0,
                    FileSyncMethod::Update,
                ));
            }
        }

        for item in &mut results {
            item.source_file_size = remote.object_size(&item.target_path).await.unwrap_or(0);
        }

        info!(
            "download diff {} <- {}: {} transfers planned",
            local.display(),
            remote_root,
            results.len()
        );
        Ok(results)
    }

    /// Resolve the single-object vs whole-collection shape of a download
    async fn download_universe(
        &self,
        remote: &dyn RemoteStore,
        local: &Path,
        remote_root: &str,
    ) -> Result<(PathBuf, Vec<String>, String, HashMap<String, Option<String>>)> {
        if remote.object_exists(remote_root).await? {
            if local.is_dir() {
                return Err(Error::structural_mismatch(format!(
                    "'{remote_root}' is a data object but '{}' is a directory",
                    local.display()
                )));
            }
            let (collection, name) = split_object_path(remote_root)?;
            let checksum = remote.get_checksum(collection, name).await?;
            let mut remote_files = HashMap::new();
            remote_files.insert(format!("/{name}"), checksum);

            let local_files = if local.is_file() {
                let name = local
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                vec![format!("/{name}")]
            } else {
                Vec::new()
            };
            let local_root = local.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
            Ok((local_root, local_files, collection.to_string(), remote_files))
        } else if remote.collection_exists(remote_root).await? {
            if local.is_file() {
                return Err(Error::structural_mismatch(format!(
                    "'{remote_root}' is a collection but '{}' is a file",
                    local.display()
                )));
            }
            let local_files = if local.is_dir() {
                collect_local_files(local)?
            } else {
                Vec::new()
            };
            let remote_files = remote.list_checksums(remote_root).await?;
            Ok((
                local.to_path_buf(),
                local_files,
                remote_root.to_string(),
                remote_files,
            ))
        } else {
            Err(Error::remote(format!(
                "'{remote_root}' does not exist as a data object or collection"
            )))
        }
    }

    /// Plan the upload of one local file onto one remote data object path
    async fn diff_upload_single(
        &self,
        remote: &dyn RemoteStore,
        local: &Path,
        remote_path: &str,
    ) -> Result<Vec<SyncResult>> {
        if remote.collection_exists(remote_path).await? {
            return Err(Error::structural_mismatch(format!(
                "'{}' is a file locally while '{remote_path}' is a collection remotely",
                local.display()
            )));
        }
        let (collection, name) = split_object_path(remote_path)?;
        let size = local_size(local).await?;
        let create = SyncResult::new(
            path_string(local),
            remote_path.to_string(),
            size,
            FileSyncMethod::Create,
        );

        if !remote.collection_exists(collection).await?
            || !remote.object_exists(remote_path).await?
        {
            return Ok(vec![create]);
        }

        let checksum = remote.get_checksum(collection, name).await?;
        let differs = match self.scope {
            ChecksumScope::Checksum => checksums_differ(local, checksum.as_deref()).await?,
            ChecksumScope::Size => remote.object_size(remote_path).await? != size,
        };
        if differs {
            Ok(vec![SyncResult {
                file_sync_method: FileSyncMethod::Update,
                ..create
            }])
        } else {
            Ok(Vec::new())
        }
    }
}

/// Collect all files under `root` as `/`-prefixed posix paths relative to it
fn collect_local_files(root: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| Error::Io {
            message: format!("Failed to walk '{}': {}", root.display(), e),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| Error::Io {
                message: format!("Failed to relativize '{}': {}", entry.path().display(), e),
            })?;
        let mut posix = String::new();
        for component in relative.components() {
            posix.push('/');
            posix.push_str(&component.as_os_str().to_string_lossy());
        }
        files.push(posix);
    }
    Ok(files)
}

/// Resolve a `/`-prefixed relative path back to a local filesystem path
fn local_file_for(root: &Path, relative: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for segment in relative.split('/').filter(|s| !s.is_empty()) {
        path.push(segment);
    }
    path
}

fn split_object_path(path: &str) -> Result<(&str, &str)> {
    path.rsplit_once('/')
        .filter(|(collection, name)| !collection.is_empty() && !name.is_empty())
        .ok_or_else(|| Error::remote(format!("'{path}' is not a valid data object path")))
}

async fn local_size(path: &Path) -> Result<u64> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| Error::Io {
        message: format!("Failed to get metadata for '{}': {}", path.display(), e),
    })?;
    Ok(metadata.len())
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridsync_remote::MemoryRemote;
    use tempfile::TempDir;

    const COLL: &str = "/zone/home/user";

    async fn local_tree(files: &[(&str, &[u8])]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (rel, content) in files {
            let path = local_file_for(dir.path(), rel);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await.unwrap();
            }
            tokio::fs::write(&path, content).await.unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn test_upload_into_empty_collection_creates_everything() {
        let dir = local_tree(&[("/file1.abc", b"0123456789"), ("/file2.abc", b"9876543210")])
            .await;
        let remote = MemoryRemote::new();
        remote.add_collection(COLL).await;

        let plan = DiffEngine::default()
            .diff_upload(&remote, dir.path(), COLL)
            .await
            .unwrap();

        assert_eq!(plan.len(), 2);
        assert!(plan
            .iter()
            .all(|r| r.file_sync_method == FileSyncMethod::Create && r.source_file_size == 10));
        assert_eq!(plan[0].target_path, format!("{COLL}/file1.abc"));
        assert_eq!(plan[1].target_path, format!("{COLL}/file2.abc"));
    }

    #[tokio::test]
    async fn test_identical_content_is_never_transferred() {
        let dir = local_tree(&[("/a.txt", b"same")]).await;
        let remote = MemoryRemote::new();
        remote.add_object(&format!("{COLL}/a.txt"), b"same").await;

        let plan = DiffEngine::default()
            .diff_upload(&remote, dir.path(), COLL)
            .await
            .unwrap();
        assert!(plan.is_empty());
    }

    #[tokio::test]
    async fn test_changed_content_yields_single_update() {
        let dir = local_tree(&[
            ("/file1.abc", b"0123456789-appended"),
            ("/file2.abc", b"9876543210"),
        ])
        .await;
        let remote = MemoryRemote::new();
        remote
            .add_object(&format!("{COLL}/file1.abc"), b"0123456789")
            .await;

        let plan = DiffEngine::default()
            .diff_upload(&remote, dir.path(), COLL)
            .await
            .unwrap();

        assert_eq!(plan.len(), 2);
        // CREATE group sorts before the UPDATE group
        assert_eq!(plan[0].file_sync_method, FileSyncMethod::Create);
        assert!(plan[0].target_path.ends_with("/file2.abc"));
        assert_eq!(plan[1].file_sync_method, FileSyncMethod::Update);
        assert!(plan[1].target_path.ends_with("/file1.abc"));
        assert_eq!(plan[1].source_file_size, 19);
    }

    #[tokio::test]
    async fn test_remote_only_files_are_left_alone_on_upload() {
        let dir = local_tree(&[]).await;
        let remote = MemoryRemote::new();
        remote.add_object(&format!("{COLL}/extra.txt"), b"x").await;

        let plan = DiffEngine::default()
            .diff_upload(&remote, dir.path(), COLL)
            .await
            .unwrap();
        assert!(plan.is_empty());
    }

    #[tokio::test]
    async fn test_missing_remote_checksum_forces_update() {
        let dir = local_tree(&[("/a.txt", b"same")]).await;
        let remote = MemoryRemote::new();
        remote
            .add_object_with_checksum(&format!("{COLL}/a.txt"), b"same", None)
            .await;

        let plan = DiffEngine::default()
            .diff_upload(&remote, dir.path(), COLL)
            .await
            .unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].file_sync_method, FileSyncMethod::Update);
    }

    #[tokio::test]
    async fn test_size_scope_ignores_equal_sized_changes() {
        let dir = local_tree(&[("/a.txt", b"abcd")]).await;
        let remote = MemoryRemote::new();
        remote.add_object(&format!("{COLL}/a.txt"), b"wxyz").await;

        let by_size = DiffEngine::new(ChecksumScope::Size)
            .diff_upload(&remote, dir.path(), COLL)
            .await
            .unwrap();
        assert!(by_size.is_empty());

        let by_checksum = DiffEngine::new(ChecksumScope::Checksum)
            .diff_upload(&remote, dir.path(), COLL)
            .await
            .unwrap();
        assert_eq!(by_checksum.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_local_source_is_a_hard_error() {
        let remote = MemoryRemote::new();
        let err = DiffEngine::default()
            .diff_upload(&remote, Path::new("/definitely/not/here"), COLL)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SourceNotFound { .. }));
    }

    #[tokio::test]
    async fn test_single_file_against_remote_collection_is_structural_mismatch() {
        let dir = local_tree(&[("/a.txt", b"x")]).await;
        let remote = MemoryRemote::new();
        remote.add_collection(&format!("{COLL}/a.txt")).await;

        let err = DiffEngine::default()
            .diff_upload(
                &remote,
                &dir.path().join("a.txt"),
                &format!("{COLL}/a.txt"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StructuralMismatch { .. }));
    }

    #[tokio::test]
    async fn test_single_file_upload_create_and_noop() {
        let dir = local_tree(&[("/a.txt", b"payload")]).await;
        let local = dir.path().join("a.txt");
        let remote = MemoryRemote::new();

        let plan = DiffEngine::default()
            .diff_upload(&remote, &local, &format!("{COLL}/a.txt"))
            .await
            .unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].file_sync_method, FileSyncMethod::Create);
        assert_eq!(plan[0].source_file_size, 7);

        remote.add_object(&format!("{COLL}/a.txt"), b"payload").await;
        let plan = DiffEngine::default()
            .diff_upload(&remote, &local, &format!("{COLL}/a.txt"))
            .await
            .unwrap();
        assert!(plan.is_empty());
    }

    #[tokio::test]
    async fn test_download_plans_remote_only_files() {
        let dir = local_tree(&[]).await;
        let remote = MemoryRemote::new();
        remote.add_object(&format!("{COLL}/a.txt"), b"12345").await;
        remote
            .add_object(&format!("{COLL}/sub/b.txt"), b"123")
            .await;

        let plan = DiffEngine::default()
            .diff_download(&remote, dir.path(), COLL)
            .await
            .unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].file_sync_method, FileSyncMethod::Create);
        assert_eq!(plan[0].target_path, format!("{COLL}/a.txt"));
        assert_eq!(plan[0].source_file_size, 5);
        assert_eq!(
            plan[0].source_path,
            dir.path().join("a.txt").to_string_lossy()
        );
        assert_eq!(plan[1].source_file_size, 3);
    }

    #[tokio::test]
    async fn test_download_detects_stale_local_copy() {
        let dir = local_tree(&[("/a.txt", b"old content")]).await;
        let remote = MemoryRemote::new();
        remote
            .add_object(&format!("{COLL}/a.txt"), b"new content!")
            .await;

        let plan = DiffEngine::default()
            .diff_download(&remote, dir.path(), COLL)
            .await
            .unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].file_sync_method, FileSyncMethod::Update);
        assert_eq!(plan[0].source_file_size, 12);
    }

    #[tokio::test]
    async fn test_download_collection_onto_local_file_is_structural_mismatch() {
        let dir = local_tree(&[("/a.txt", b"x")]).await;
        let remote = MemoryRemote::new();
        remote.add_collection(COLL).await;

        let err = DiffEngine::default()
            .diff_download(&remote, &dir.path().join("a.txt"), COLL)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StructuralMismatch { .. }));
    }

    #[tokio::test]
    async fn test_download_of_missing_remote_path_errors() {
        let dir = local_tree(&[]).await;
        let remote = MemoryRemote::new();

        let err = DiffEngine::default()
            .diff_download(&remote, dir.path(), "/zone/nowhere")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Remote { .. }));
    }

    #[tokio::test]
    async fn test_download_single_object_into_file_path() {
        let dir = local_tree(&[]).await;
        let local = dir.path().join("a.txt");
        let remote = MemoryRemote::new();
        remote.add_object(&format!("{COLL}/a.txt"), b"abc").await;

        let plan = DiffEngine::default()
            .diff_download(&remote, &local, &format!("{COLL}/a.txt"))
            .await
            .unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].file_sync_method, FileSyncMethod::Create);
        assert_eq!(plan[0].source_path, local.to_string_lossy());
        assert_eq!(plan[0].source_file_size, 3);
    }
}

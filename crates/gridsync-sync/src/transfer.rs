//! Executes a planned transfer set item by item
//!
//! Uploads degrade per item: a missing source file, a full resource or a
//! failed put marks that one item as failed and the batch moves on. Downloads
//! instead verify the aggregate free space once, up front, and refuse the
//! whole batch when the local disk cannot hold it.

use gridsync_remote::RemoteStore;
use gridsync_types::{Error, Result, SyncResult};
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// Per-item outcome of a transfer attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The file was transferred
    Ok,
    /// The transfer was attempted and failed
    Failed,
    /// The source of the transfer no longer exists
    FailedFileNotFound,
    /// The destination does not have room for the file
    FailedNoSpace,
}

impl TransferOutcome {
    /// Whether this outcome counts as a successful transfer
    pub fn is_ok(&self) -> bool {
        matches!(self, TransferOutcome::Ok)
    }
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransferOutcome::Ok => "OK",
            TransferOutcome::Failed => "FAILED",
            TransferOutcome::FailedFileNotFound => "FAILED, File not found",
            TransferOutcome::FailedNoSpace => "FAILED, Not enough free space",
        };
        f.write_str(label)
    }
}

/// Policy knobs for an upload batch
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Storage resource whose free space is checked before each put
    pub resource: Option<String>,
    /// Bytes that must remain free on the resource after each put
    pub min_free_space: u64,
    /// Disable to skip the per-item free space check entirely
    pub check_free_space: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            resource: None,
            min_free_space: 0,
            check_free_space: true,
        }
    }
}

/// Lazily executed upload batch
///
/// Each call to [`next`](UploadBatch::next) moves exactly one planned item to
/// the remote side and reports how it went. Dropping the batch abandons the
/// remaining items without touching them.
pub struct UploadBatch<'a> {
    remote: &'a dyn RemoteStore,
    items: std::vec::IntoIter<SyncResult>,
    options: UploadOptions,
}

impl<'a> UploadBatch<'a> {
    /// Wrap a planned transfer set for execution against `remote`
    pub fn new(remote: &'a dyn RemoteStore, plan: Vec<SyncResult>, options: UploadOptions) -> Self {
        Self {
            remote,
            items: plan.into_iter(),
            options,
        }
    }

    /// Transfer the next planned item, or `None` when the batch is done
    pub async fn next(&mut self) -> Option<(TransferOutcome, SyncResult)> {
        let item = self.items.next()?;
        let outcome = self.upload_one(&item).await;
        Some((outcome, item))
    }

    async fn upload_one(&self, item: &SyncResult) -> TransferOutcome {
        let source = Path::new(&item.source_path);
        if !tokio::fs::try_exists(source).await.unwrap_or(false) {
            warn!("upload source '{}' no longer exists", item.source_path);
            return TransferOutcome::FailedFileNotFound;
        }

        if self.options.check_free_space {
            if let Some(resource) = &self.options.resource {
                match self.remote.resource_free_space(resource).await {
                    Ok(free) => {
                        let usable = free.saturating_sub(self.options.min_free_space);
                        if item.source_file_size > usable {
                            warn!(
                                "resource '{resource}' lacks space for '{}' ({} > {} usable)",
                                item.source_path, item.source_file_size, usable
                            );
                            return TransferOutcome::FailedNoSpace;
                        }
                    }
                    Err(error) => {
                        warn!("free space query for resource '{resource}' failed: {error}");
                        return TransferOutcome::Failed;
                    }
                }
            }
        }

        match self.put_with_parent(source, &item.target_path).await {
            Ok(()) => {
                debug!("uploaded '{}' to '{}'", item.source_path, item.target_path);
                TransferOutcome::Ok
            }
            Err(error) => {
                warn!(
                    "upload of '{}' to '{}' failed: {error}",
                    item.source_path, item.target_path
                );
                TransferOutcome::Failed
            }
        }
    }

    async fn put_with_parent(&self, source: &Path, target: &str) -> Result<()> {
        if let Some((parent, _)) = target.rsplit_once('/') {
            if !parent.is_empty() {
                self.remote.ensure_collection(parent).await?;
            }
        }
        self.remote.put(source, target).await
    }
}

/// Policy knobs for a download batch
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Bytes that must remain free locally after the whole batch lands
    pub min_free_space: u64,
    /// Disable to skip the aggregate free space check
    pub check_free_space: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            min_free_space: 0,
            check_free_space: true,
        }
    }
}

/// Lazily executed download batch
///
/// Construction performs the aggregate free space check against the caller's
/// measurement of the destination disk; a batch that does not fit is rejected
/// outright rather than partially applied.
pub struct DownloadBatch<'a> {
    remote: &'a dyn RemoteStore,
    items: std::vec::IntoIter<SyncResult>,
}

impl std::fmt::Debug for DownloadBatch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadBatch")
            .field("items", &self.items)
            .finish_non_exhaustive()
    }
}

impl<'a> DownloadBatch<'a> {
    /// Wrap a planned transfer set, verifying it fits in `available_bytes`
    pub fn new(
        remote: &'a dyn RemoteStore,
        plan: Vec<SyncResult>,
        available_bytes: u64,
        options: DownloadOptions,
    ) -> Result<Self> {
        if options.check_free_space {
            let required: u64 = plan.iter().map(|item| item.source_file_size).sum();
            let available = available_bytes.saturating_sub(options.min_free_space);
            if required > available {
                return Err(Error::NotEnoughFreeSpace {
                    required,
                    available,
                });
            }
        }
        Ok(Self {
            remote,
            items: plan.into_iter(),
        })
    }

    /// Transfer the next planned item, or `None` when the batch is done
    pub async fn next(&mut self) -> Option<(TransferOutcome, SyncResult)> {
        let item = self.items.next()?;
        let outcome = self.download_one(&item).await;
        Some((outcome, item))
    }

    async fn download_one(&self, item: &SyncResult) -> TransferOutcome {
        match self.remote.object_exists(&item.target_path).await {
            Ok(true) => {}
            Ok(false) => {
                warn!("download source '{}' no longer exists", item.target_path);
                return TransferOutcome::FailedFileNotFound;
            }
            Err(error) => {
                warn!("existence check for '{}' failed: {error}", item.target_path);
                return TransferOutcome::Failed;
            }
        }

        let destination = Path::new(&item.source_path);
        if let Some(parent) = destination.parent() {
            if let Err(error) = tokio::fs::create_dir_all(parent).await {
                warn!(
                    "could not create directory '{}': {error}",
                    parent.display()
                );
                return TransferOutcome::Failed;
            }
        }

        match self.remote.get(&item.target_path, destination).await {
            Ok(()) => {
                debug!(
                    "downloaded '{}' to '{}'",
                    item.target_path, item.source_path
                );
                TransferOutcome::Ok
            }
            Err(error) => {
                warn!(
                    "download of '{}' to '{}' failed: {error}",
                    item.target_path, item.source_path
                );
                TransferOutcome::Failed
            }
        }
    }
}

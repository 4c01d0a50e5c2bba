//! The opaque capability set consumed from the remote grid

use async_trait::async_trait;
use gridsync_types::Result;
use std::collections::HashMap;
use std::path::Path;

/// Capability set the synchronisation engine requires from a remote grid
///
/// Paths on the remote side are logical, `/`-separated collection paths.
/// Connection and session lifecycle are the implementor's concern; every
/// method may suspend on network I/O for an unbounded duration.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Check whether a collection exists at `path`
    async fn collection_exists(&self, path: &str) -> Result<bool>;

    /// Check whether a data object exists at `path`
    async fn object_exists(&self, path: &str) -> Result<bool>;

    /// Bulk metadata query for every data object under `collection`
    ///
    /// Returns relative paths (leading `/`, `/`-separated) mapped to the
    /// checksum the grid has recorded, or `None` when no checksum was ever
    /// computed for the object. One call replaces a per-file round trip, which
    /// is what keeps diffing O(1) in remote calls.
    async fn list_checksums(&self, collection: &str) -> Result<HashMap<String, Option<String>>>;

    /// Fetch the recorded checksum of one data object, `None` when absent
    async fn get_checksum(&self, collection: &str, name: &str) -> Result<Option<String>>;

    /// Size in bytes of the data object at `path`
    async fn object_size(&self, path: &str) -> Result<u64>;

    /// Upload the local file at `local_path` to the data object `remote_path`
    async fn put(&self, local_path: &Path, remote_path: &str) -> Result<()>;

    /// Download the data object `remote_path` to the local file `local_path`
    async fn get(&self, remote_path: &str, local_path: &Path) -> Result<()>;

    /// Create the collection at `path` (and its parents) if absent
    async fn ensure_collection(&self, path: &str) -> Result<()>;

    /// Remaining capacity in bytes on the named storage resource
    async fn resource_free_space(&self, resource: &str) -> Result<u64>;
}

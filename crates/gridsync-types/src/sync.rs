//! Value types describing planned transfers

use serde::{Deserialize, Serialize};

/// Classification of a planned transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileSyncMethod {
    /// The destination does not have the file yet
    Create,
    /// The destination has the file but its content differs
    Update,
}

/// Direction of a synchronisation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncDirection {
    /// Local tree is the source, remote collection is the destination
    Upload,
    /// Remote collection is the source, local tree is the destination
    Download,
}

/// Comparison policy used when a file exists on both sides
///
/// `Size` is fast but only catches length changes; `Checksum` compares full
/// content digests and is the default for unattended runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChecksumScope {
    /// Compare byte lengths only
    Size,
    /// Compare content checksums
    #[default]
    Checksum,
}

/// One planned transfer, produced by the diff engine
///
/// Immutable once produced; the transfer executor consumes it unchanged.
/// `source_path` and `target_path` live in opposite namespaces depending on the
/// run direction (local filesystem path vs. logical collection path).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    /// Path the bytes are read from
    pub source_path: String,
    /// Path the bytes are written to, in the counterpart namespace
    pub target_path: String,
    /// Size of the source file in bytes
    pub source_file_size: u64,
    /// Whether the destination is absent or stale
    pub file_sync_method: FileSyncMethod,
}

impl SyncResult {
    /// Create a new planned transfer
    pub fn new<S1: Into<String>, S2: Into<String>>(
        source: S1,
        target: S2,
        size: u64,
        method: FileSyncMethod,
    ) -> Self {
        Self {
            source_path: source.into(),
            target_path: target.into(),
            source_file_size: size,
            file_sync_method: method,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_result_equality_is_structural() {
        let a = SyncResult::new("/l/a", "/r/a", 10, FileSyncMethod::Create);
        let b = SyncResult::new("/l/a", "/r/a", 10, FileSyncMethod::Create);
        assert_eq!(a, b);

        let c = SyncResult::new("/l/a", "/r/a", 10, FileSyncMethod::Update);
        assert_ne!(a, c);

        let d = SyncResult::new("/l/a", "/r/a", 11, FileSyncMethod::Create);
        assert_ne!(a, d);
    }

    #[test]
    fn test_checksum_scope_default() {
        assert_eq!(ChecksumScope::default(), ChecksumScope::Checksum);
    }
}

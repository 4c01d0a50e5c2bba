//! Remote checksum encodings and local digest comparison
//!
//! Grids record object checksums in one of two encodings: a strong digest
//! tagged `sha2:` followed by the base64 of the raw SHA-256 bytes, or a legacy
//! hex-encoded MD5 digest with no tag. The local side computes whichever
//! algorithm the remote value uses before comparing, over the full file
//! content.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use gridsync_types::{Error, Result};
use md5::Md5;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::debug;

/// Prefix tagging a base64-encoded SHA-256 digest
const SHA2_PREFIX: &str = "sha2:";

/// A parsed remote checksum value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteChecksum {
    /// Algorithm-tagged strong digest, stored as raw digest bytes
    Sha256(Vec<u8>),
    /// Legacy weak digest, stored as the lowercase hex string the grid keeps
    LegacyMd5(String),
}

impl RemoteChecksum {
    /// Parse the raw checksum string a grid reports for a data object
    pub fn parse(raw: &str) -> Result<Self> {
        if let Some(encoded) = raw.strip_prefix(SHA2_PREFIX) {
            let digest = BASE64.decode(encoded).map_err(|e| {
                Error::remote(format!("undecodable sha2 checksum '{raw}': {e}"))
            })?;
            Ok(Self::Sha256(digest))
        } else {
            Ok(Self::LegacyMd5(raw.to_ascii_lowercase()))
        }
    }
}

/// Compare a local file's content digest against a parsed remote checksum
pub async fn local_digest_matches(local_path: &Path, remote: &RemoteChecksum) -> Result<bool> {
    let content = tokio::fs::read(local_path).await.map_err(|e| Error::Io {
        message: format!("Failed to read file '{}': {}", local_path.display(), e),
    })?;

    let matches = match remote {
        RemoteChecksum::Sha256(digest) => {
            let local = Sha256::digest(&content);
            local.as_slice() == digest.as_slice()
        }
        RemoteChecksum::LegacyMd5(hex) => {
            let local = Md5::digest(&content);
            hex_encode(&local) == *hex
        }
    };
    Ok(matches)
}

/// Decide whether a transfer is needed for a file present on both sides
///
/// A remote object with no recorded checksum is treated as different whenever
/// the local file exists; missing metadata must never suppress a transfer.
pub async fn checksums_differ(local_path: &Path, remote_value: Option<&str>) -> Result<bool> {
    match remote_value {
        None => {
            debug!("no remote checksum for counterpart of {}", local_path.display());
            Ok(tokio::fs::try_exists(local_path).await.unwrap_or(true))
        }
        Some(raw) => {
            let remote = RemoteChecksum::parse(raw)?;
            Ok(!local_digest_matches(local_path, &remote).await?)
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sha2_value(content: &[u8]) -> String {
        format!("{SHA2_PREFIX}{}", BASE64.encode(Sha256::digest(content)))
    }

    fn md5_value(content: &[u8]) -> String {
        hex_encode(&Md5::digest(content))
    }

    #[test]
    fn test_parse_tagged_sha2() {
        let raw = sha2_value(b"hello");
        let parsed = RemoteChecksum::parse(&raw).unwrap();
        assert_eq!(
            parsed,
            RemoteChecksum::Sha256(Sha256::digest(b"hello").to_vec())
        );
    }

    #[test]
    fn test_parse_legacy_md5() {
        let parsed = RemoteChecksum::parse("D41D8CD98F00B204E9800998ECF8427E").unwrap();
        assert_eq!(
            parsed,
            RemoteChecksum::LegacyMd5("d41d8cd98f00b204e9800998ecf8427e".into())
        );
    }

    #[test]
    fn test_parse_rejects_bad_base64() {
        assert!(RemoteChecksum::parse("sha2:!!not-base64!!").is_err());
    }

    #[tokio::test]
    async fn test_sha2_roundtrip_against_local_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        tokio::fs::write(&file, b"content").await.unwrap();

        assert!(!checksums_differ(&file, Some(&sha2_value(b"content")))
            .await
            .unwrap());
        assert!(checksums_differ(&file, Some(&sha2_value(b"other")))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_legacy_md5_roundtrip_against_local_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        tokio::fs::write(&file, b"content").await.unwrap();

        assert!(!checksums_differ(&file, Some(&md5_value(b"content")))
            .await
            .unwrap());
        assert!(checksums_differ(&file, Some(&md5_value(b"other")))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_missing_remote_checksum_forces_transfer() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        tokio::fs::write(&file, b"content").await.unwrap();

        assert!(checksums_differ(&file, None).await.unwrap());
    }
}

//! Remote data-grid collaborator boundary for gridsync
//!
//! The synchronisation engine never talks to a grid directly; it consumes the
//! opaque capability set defined by [`RemoteStore`]: existence checks for
//! collections and data objects, bulk checksum listing, byte transfer in both
//! directions, idempotent collection creation and resource capacity queries.
//!
//! This crate also owns the two remote checksum encodings the engine must
//! understand (an algorithm-tagged base64 SHA-256 digest and a legacy hex MD5
//! digest) and two store implementations: an in-memory [`MemoryRemote`]
//! backing the test suites and a directory-backed [`FsRemote`] serving a
//! mounted share as the remote side.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod checksum;
pub mod fs;
pub mod memory;
pub mod store;

pub use checksum::{checksums_differ, local_digest_matches, RemoteChecksum};
pub use fs::FsRemote;
pub use memory::MemoryRemote;
pub use store::RemoteStore;

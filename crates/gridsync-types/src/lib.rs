//! Core type system and error handling for gridsync
//!
//! This crate provides the foundational types shared by every gridsync crate:
//!
//! - **Error handling**: a structured error enum with kinds and helper constructors
//! - **Sync values**: planned transfers ([`SyncResult`]), their classification
//!   ([`FileSyncMethod`]), the transfer direction and the comparison policy
//!
//! # Examples
//!
//! ```rust
//! use gridsync_types::{FileSyncMethod, SyncResult};
//!
//! let planned = SyncResult::new("/data/a.txt", "/grid/home/a.txt", 42, FileSyncMethod::Create);
//! assert_eq!(planned.source_file_size, 42);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod result;
pub mod sync;

pub use error::{Error, ErrorKind};
pub use result::Result;
pub use sync::{ChecksumScope, FileSyncMethod, SyncDirection, SyncResult};

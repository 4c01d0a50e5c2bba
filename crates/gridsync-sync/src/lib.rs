//! Diff engine and transfer executor for gridsync
//!
//! This crate computes the minimal set of transfers needed to reconcile a
//! local directory tree with a remote collection tree, and applies such a set
//! against the remote store:
//!
//! - **Diff engine**: one bulk checksum query per run, CREATE/UPDATE
//!   classification, deterministic output order, all-or-nothing failure
//! - **Upload executor**: lazy per-item execution with per-item free-space
//!   checks; a single bad file never aborts the batch
//! - **Download executor**: whole-batch free-space enforcement up front,
//!   then per-item execution
//!
//! # Examples
//!
//! ```rust,no_run
//! use gridsync_remote::MemoryRemote;
//! use gridsync_sync::DiffEngine;
//! use std::path::Path;
//!
//! # async fn example() -> gridsync_types::Result<()> {
//! let remote = MemoryRemote::new();
//! let engine = DiffEngine::default();
//! let plan = engine
//!     .diff_upload(&remote, Path::new("/data/project"), "/zone/home/project")
//!     .await?;
//! println!("{} transfers needed", plan.len());
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod diff;
pub mod transfer;

pub use diff::DiffEngine;
pub use transfer::{DownloadBatch, DownloadOptions, TransferOutcome, UploadBatch, UploadOptions};

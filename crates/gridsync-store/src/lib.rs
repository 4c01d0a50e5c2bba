//! Durable configuration and reporting stores for gridsync
//!
//! Two repositories share the same persistence contract: a single JSON
//! document on disk, created with an empty body on first use, rewritten in
//! full on every mutation, and never auto-repaired when malformed. Mutations
//! persist before observers are notified, so an observer always finds a
//! consistent on-disk state when it re-reads.
//!
//! - [`ConfigRepository`]: CRUD store of named synchronisation jobs
//! - [`ReportingRepository`]: append-only history of runs with per-file
//!   events and recomputed aggregates
//! - [`CronTrigger`]: five-field cron expressions with next-occurrence
//!   computation and the preset table the front-end offers

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod cron;
pub mod observer;
pub mod reporting;

pub use config::{
    default_state_dir, direction_for_kind, kind_for_direction, ConfigRepository, SyncConfigItem,
    STATE_DIR_NAME, SYNC_KINDS,
};
pub use cron::{CronPreset, CronTrigger, CRON_PRESETS};
pub use observer::{ConfigObserver, ObserverSet, ReportObserver};
pub use reporting::{
    ReportingRepository, SyncStatusEvent, SyncStatusReport, STATUS_OK, STATUS_PENDING,
};

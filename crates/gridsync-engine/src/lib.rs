//! Run orchestration and cron scheduling for gridsync
//!
//! [`SyncEngine`] runs one configuration's synchronisation end-to-end: diff,
//! report creation with pending events, transfer execution with live event
//! updates, finalization. It guarantees at most one concurrent run per
//! configuration UUID through an owned run registry.
//!
//! [`SyncScheduler`] keeps one pending timer per active configuration and
//! rebuilds the whole timer set whenever the configuration repository
//! changes, so a stale timer can never fire for a deleted or modified job.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod engine;
pub mod scheduler;
mod worker;

pub use engine::{
    CapacityProbe, EngineOptions, RunObserver, RunSummary, StartOutcome, SyncEngine,
    UnboundedCapacity,
};
pub use scheduler::SyncScheduler;

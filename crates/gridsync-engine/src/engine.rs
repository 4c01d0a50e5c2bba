//! Sync engine owning the per-configuration run registry

use crate::worker;
use gridsync_remote::RemoteStore;
use gridsync_store::{ConfigRepository, ObserverSet, ReportingRepository};
use gridsync_types::{ChecksumScope, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Transfer policy knobs, loadable from the options file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Remote storage resource checked for free space before uploads
    pub resource: Option<String>,
    /// Bytes kept free on the receiving side
    pub min_free_space: u64,
    /// Disable to skip free space checks in both directions
    pub check_free_space: bool,
    /// Diff comparison policy
    pub scope: ChecksumScope,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            resource: None,
            min_free_space: 0,
            check_free_space: true,
            scope: ChecksumScope::default(),
        }
    }
}

/// Measures free bytes on the filesystem holding a local path
pub trait CapacityProbe: Send + Sync {
    /// Available bytes for new data under `path`
    fn available_bytes(&self, path: &Path) -> u64;
}

/// Probe reporting unlimited local capacity
///
/// Used where the platform query is unavailable; download batches are then
/// never refused up front and failures surface per item instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnboundedCapacity;

impl CapacityProbe for UnboundedCapacity {
    fn available_bytes(&self, _path: &Path) -> u64 {
        u64::MAX
    }
}

/// Receives run lifecycle notifications
pub trait RunObserver: Send + Sync {
    /// A run was accepted and is now in flight
    fn run_started(&self, config_id: Uuid);
    /// A run left the in-flight set; `report_id` is absent when the run
    /// aborted before creating its report
    fn run_finished(&self, config_id: Uuid, report_id: Option<Uuid>);
}

/// How a start request was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A run was spawned
    Started,
    /// A run for this UUID is already in flight; the request is a no-op
    AlreadyRunning,
    /// No configuration with this UUID exists; logged, nothing spawned
    UnknownConfig,
}

/// Totals of one finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Report recording the run
    pub report_id: Uuid,
    /// Transfers the diff planned
    pub planned: usize,
    /// Items that transferred
    pub succeeded: usize,
    /// Items that failed softly
    pub failed: usize,
}

/// Orchestrates synchronisation runs with at most one in flight per
/// configuration UUID
///
/// Cheap to clone; clones share the run registry and observers.
#[derive(Clone)]
pub struct SyncEngine {
    remote: Arc<dyn RemoteStore>,
    configs: Arc<ConfigRepository>,
    reports: Arc<ReportingRepository>,
    probe: Arc<dyn CapacityProbe>,
    options: Arc<EngineOptions>,
    running: Arc<Mutex<HashSet<Uuid>>>,
    observers: Arc<ObserverSet<dyn RunObserver>>,
}

impl SyncEngine {
    /// Create an engine over the given collaborators
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        configs: Arc<ConfigRepository>,
        reports: Arc<ReportingRepository>,
        probe: Arc<dyn CapacityProbe>,
        options: EngineOptions,
    ) -> Self {
        Self {
            remote,
            configs,
            reports,
            probe,
            options: Arc::new(options),
            running: Arc::new(Mutex::new(HashSet::new())),
            observers: Arc::new(ObserverSet::new()),
        }
    }

    /// Attach an observer of run lifecycles
    pub fn subscribe(&self, observer: Arc<dyn RunObserver>) {
        self.observers.register(observer);
    }

    /// Whether a run for this configuration is currently in flight
    pub fn is_running(&self, config_id: Uuid) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&config_id)
    }

    /// Spawn a run for `config_id` unless one is already in flight
    ///
    /// The check-and-set against the run registry is atomic, so a timer
    /// trigger and a user trigger racing for the same UUID spawn exactly one
    /// run.
    pub fn start(&self, config_id: Uuid) -> StartOutcome {
        if self.configs.get_by_id(config_id).is_none() {
            error!("start requested for unknown configuration {config_id}");
            return StartOutcome::UnknownConfig;
        }
        if !self.try_acquire(config_id) {
            info!("configuration {config_id} already has a run in flight");
            return StartOutcome::AlreadyRunning;
        }

        let engine = self.clone();
        tokio::spawn(async move {
            match engine.run_acquired(config_id).await {
                Ok(summary) => engine.finish(config_id, Some(summary.report_id)),
                Err(error) => {
                    warn!("run for configuration {config_id} failed: {error}");
                    engine.finish(config_id, None);
                }
            }
        });
        StartOutcome::Started
    }

    /// Run `config_id` to completion on the caller's task
    ///
    /// Same exclusivity guarantee as [`start`](Self::start); a duplicate
    /// request fails fast instead of queuing.
    pub async fn run_once(&self, config_id: Uuid) -> Result<RunSummary> {
        if !self.try_acquire(config_id) {
            return Err(gridsync_types::Error::other(format!(
                "configuration {config_id} already has a run in flight"
            )));
        }
        let result = self.run_acquired(config_id).await;
        match &result {
            Ok(summary) => self.finish(config_id, Some(summary.report_id)),
            Err(_) => self.finish(config_id, None),
        }
        result
    }

    async fn run_acquired(&self, config_id: Uuid) -> Result<RunSummary> {
        let config = self.configs.get_by_id(config_id).ok_or_else(|| {
            gridsync_types::Error::config(format!("no configuration with uuid {config_id}"))
        })?;
        self.observers
            .for_each(|observer| observer.run_started(config_id));
        let available = self.probe.available_bytes(&config.local);
        worker::execute_run(
            self.remote.as_ref(),
            &self.reports,
            &self.options,
            &config,
            available,
        )
        .await
    }

    fn try_acquire(&self, config_id: Uuid) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(config_id)
    }

    fn finish(&self, config_id: Uuid, report_id: Option<Uuid>) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&config_id);
        self.observers
            .for_each(|observer| observer.run_finished(config_id, report_id));
    }

    /// The configuration repository this engine resolves UUIDs against
    pub fn configs(&self) -> &Arc<ConfigRepository> {
        &self.configs
    }

    /// The reporting repository this engine writes run history to
    pub fn reports(&self) -> &Arc<ReportingRepository> {
        &self.reports
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("options", &self.options)
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}

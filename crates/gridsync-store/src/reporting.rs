//! Reporting repository: append-only history of synchronisation runs
//!
//! Each run produces one report holding per-file events in diff order plus
//! three cached aggregates. Aggregates are always recomputed from scratch
//! over the event list after a mutation, never patched incrementally, so they
//! can never drift from the events they summarize.

use crate::config::{default_state_dir, load_document, write_document, DOCUMENT_COMMENT};
use crate::observer::{ObserverSet, ReportObserver};
use chrono::{DateTime, Utc};
use gridsync_types::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};
use uuid::Uuid;

const REPORT_FILE_NAME: &str = "synchronisation_events.json";

/// Status of an event whose transfer has not been attempted yet
pub const STATUS_PENDING: &str = "Pending";
/// Status of a successfully transferred event
pub const STATUS_OK: &str = "OK";

/// One file-level transfer record within a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatusEvent {
    /// Path the bytes are read from
    pub source: String,
    /// Path the bytes are written to
    pub destination: String,
    /// Final transferred size once known, 0 until then
    pub bytes: u64,
    /// "Pending", "OK" or a "FAILED, ..." outcome string
    pub status: String,
    /// When the transfer was planned or started
    pub start_date: DateTime<Utc>,
    /// When the transfer completed, in either direction of success
    pub end_date: Option<DateTime<Utc>>,
}

impl SyncStatusEvent {
    /// Create a pending event for a planned transfer
    pub fn pending<S1: Into<String>, S2: Into<String>>(source: S1, destination: S2) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            bytes: 0,
            status: STATUS_PENDING.to_string(),
            start_date: Utc::now(),
            end_date: None,
        }
    }
}

/// The durable record of one synchronisation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatusReport {
    /// Stable identifier of this run
    pub uuid: Uuid,
    /// Soft link to the configuration that produced the run
    pub config_id: Uuid,
    /// Per-file events in diff order
    pub events: Vec<SyncStatusEvent>,
    /// Earliest event start, or report creation time while empty
    pub start_date: DateTime<Utc>,
    /// Latest event end, null while the run is still going
    pub end_date: Option<DateTime<Utc>>,
    /// Cached count of events
    pub total_files_processed: u64,
    /// Cached count of events with status "OK"
    ///
    /// The document key carries a historical misspelling that existing state
    /// files depend on.
    #[serde(rename = "total_files_processed_succesfully")]
    pub total_files_processed_successfully: u64,
    /// Cached sum of event byte counts
    pub total_bytes_processed: u64,
}

impl SyncStatusReport {
    fn empty(config_id: Uuid) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            config_id,
            events: Vec::new(),
            start_date: Utc::now(),
            end_date: None,
            total_files_processed: 0,
            total_files_processed_successfully: 0,
            total_bytes_processed: 0,
        }
    }

    /// Recompute the cached aggregates and date range from the events
    ///
    /// With `fill_end_date_if_absent`, a report holding zero events is
    /// stamped with "now" as its end date, closing runs that errored before
    /// producing any event.
    pub fn recalculate(&mut self, fill_end_date_if_absent: bool) {
        self.total_files_processed = self.events.len() as u64;
        self.total_files_processed_successfully = self
            .events
            .iter()
            .filter(|event| event.status == STATUS_OK)
            .count() as u64;
        self.total_bytes_processed = self.events.iter().map(|event| event.bytes).sum();

        if self.events.is_empty() {
            if fill_end_date_if_absent && self.end_date.is_none() {
                self.end_date = Some(Utc::now());
            }
            return;
        }
        if let Some(earliest) = self.events.iter().map(|event| event.start_date).min() {
            self.start_date = earliest;
        }
        self.end_date = self.events.iter().filter_map(|event| event.end_date).max();
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ReportDocument {
    comment: String,
    reports: Vec<SyncStatusReport>,
}

impl Default for ReportDocument {
    fn default() -> Self {
        Self {
            comment: DOCUMENT_COMMENT.to_string(),
            reports: Vec::new(),
        }
    }
}

/// Durable append-only store of [`SyncStatusReport`] with change notification
///
/// Reports are never deleted programmatically; pruning history is a manual
/// file edit.
#[derive(Debug)]
pub struct ReportingRepository {
    path: PathBuf,
    reports: Mutex<Vec<SyncStatusReport>>,
    observers: ObserverSet<dyn ReportObserver>,
}

impl ReportingRepository {
    /// Open the repository at the default location under the home directory
    pub fn open_default() -> Result<Self> {
        Self::open(default_state_dir()?.join(REPORT_FILE_NAME))
    }

    /// Open the repository backed by `path`, creating an empty document if
    /// none exists
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let reports = load_document::<ReportDocument>(&path)?.reports;
        debug!("loaded {} reports from {}", reports.len(), path.display());
        Ok(Self {
            path,
            reports: Mutex::new(reports),
            observers: ObserverSet::new(),
        })
    }

    /// Attach an observer notified after every persisted mutation
    pub fn subscribe(&self, observer: Arc<dyn ReportObserver>) {
        self.observers.register(observer);
    }

    /// Create an empty report for a run of `config_id`
    pub fn create_report(&self, config_id: Uuid) -> Result<Uuid> {
        let report = SyncStatusReport::empty(config_id);
        let report_id = report.uuid;
        {
            let mut reports = self.lock();
            reports.push(report);
            self.persist(&reports)?;
        }
        info!("created report {report_id} for configuration {config_id}");
        self.notify(config_id, report_id, &[]);
        Ok(report_id)
    }

    /// Append a batch of events to a report
    ///
    /// Aggregates are recomputed once for the whole batch, not once per
    /// event; runs routinely carry thousands of files.
    pub fn add_events(&self, report_id: Uuid, events: Vec<SyncStatusEvent>) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        let sources: Vec<String> = events.iter().map(|event| event.source.clone()).collect();
        let config_id = {
            let mut reports = self.lock();
            let report = find_report(&mut reports, report_id)?;
            report.events.extend(events);
            report.recalculate(false);
            let config_id = report.config_id;
            self.persist(&reports)?;
            config_id
        };
        self.notify(config_id, report_id, &sources);
        Ok(())
    }

    /// Update one event, located by its source path, mutating only the
    /// fields given
    pub fn update_event(
        &self,
        report_id: Uuid,
        source: &str,
        end_date: Option<DateTime<Utc>>,
        status: Option<&str>,
        bytes: Option<u64>,
    ) -> Result<()> {
        let config_id = {
            let mut reports = self.lock();
            let report = find_report(&mut reports, report_id)?;
            let event = report
                .events
                .iter_mut()
                .find(|event| event.source == source)
                .ok_or_else(|| {
                    Error::other(format!("report {report_id} has no event for '{source}'"))
                })?;
            if let Some(end_date) = end_date {
                event.end_date = Some(end_date);
            }
            if let Some(status) = status {
                event.status = status.to_string();
            }
            if let Some(bytes) = bytes {
                event.bytes = bytes;
            }
            report.recalculate(false);
            let config_id = report.config_id;
            self.persist(&reports)?;
            config_id
        };
        self.notify(config_id, report_id, std::slice::from_ref(&source.to_string()));
        Ok(())
    }

    /// Close a finished run, stamping an end date even when it produced no
    /// events
    pub fn finalize_report(&self, report_id: Uuid) -> Result<()> {
        let config_id = {
            let mut reports = self.lock();
            let report = find_report(&mut reports, report_id)?;
            report.recalculate(true);
            let config_id = report.config_id;
            self.persist(&reports)?;
            config_id
        };
        self.notify(config_id, report_id, &[]);
        Ok(())
    }

    /// Snapshot of every report produced for one configuration
    pub fn find_reports_by_config(&self, config_id: Uuid) -> Vec<SyncStatusReport> {
        self.lock()
            .iter()
            .filter(|report| report.config_id == config_id)
            .cloned()
            .collect()
    }

    /// Snapshot of one report by its UUID
    pub fn find_report_by_uuid(&self, report_id: Uuid) -> Option<SyncStatusReport> {
        self.lock()
            .iter()
            .find(|report| report.uuid == report_id)
            .cloned()
    }

    /// Snapshot of all reports in creation order
    pub fn all(&self) -> Vec<SyncStatusReport> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SyncStatusReport>> {
        self.reports.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, reports: &[SyncStatusReport]) -> Result<()> {
        let document = ReportDocument {
            comment: DOCUMENT_COMMENT.to_string(),
            reports: reports.to_vec(),
        };
        write_document(&self.path, &document)
    }

    fn notify(&self, config_id: Uuid, report_id: Uuid, sources: &[String]) {
        self.observers
            .for_each(|observer| observer.reports_changed(config_id, report_id, sources));
    }
}

fn find_report(
    reports: &mut [SyncStatusReport],
    report_id: Uuid,
) -> Result<&mut SyncStatusReport> {
    reports
        .iter_mut()
        .find(|report| report.uuid == report_id)
        .ok_or_else(|| {
            warn!("no report with uuid {report_id}");
            Error::other(format!("no report with uuid {report_id}"))
        })
}

//! One synchronisation run, end to end

use crate::engine::{EngineOptions, RunSummary};
use chrono::Utc;
use gridsync_remote::RemoteStore;
use gridsync_store::{ReportingRepository, SyncConfigItem, SyncStatusEvent};
use gridsync_sync::{
    DiffEngine, DownloadBatch, DownloadOptions, TransferOutcome, UploadBatch, UploadOptions,
};
use gridsync_types::{Error, Result, SyncDirection, SyncResult};
use tracing::{debug, info};

/// Run one configuration: diff, report, transfer, finalize
///
/// A diff failure aborts before any report exists. Once the report is
/// created, per-item failures are captured in event statuses and the loop
/// always runs to the end of the plan.
pub(crate) async fn execute_run(
    remote: &dyn RemoteStore,
    reports: &ReportingRepository,
    options: &EngineOptions,
    config: &SyncConfigItem,
    available_bytes: u64,
) -> Result<RunSummary> {
    let direction = config
        .direction()
        .ok_or_else(|| Error::config(format!("unknown job kind '{}'", config.kind)))?;

    let engine = DiffEngine::new(options.scope);
    let plan = match direction {
        SyncDirection::Upload => {
            engine
                .diff_upload(remote, &config.local, &config.remote)
                .await?
        }
        SyncDirection::Download => {
            engine
                .diff_download(remote, &config.local, &config.remote)
                .await?
        }
    };
    debug!(
        "configuration {}: {} transfers planned",
        config.uuid,
        plan.len()
    );

    let report_id = reports.create_report(config.uuid)?;
    let pending: Vec<SyncStatusEvent> = plan
        .iter()
        .map(|item| SyncStatusEvent::pending(&item.source_path, &item.target_path))
        .collect();
    reports.add_events(report_id, pending)?;

    let mut summary = RunSummary {
        report_id,
        planned: plan.len(),
        succeeded: 0,
        failed: 0,
    };

    let outcome_loop = async {
        match direction {
            SyncDirection::Upload => {
                let upload_options = UploadOptions {
                    resource: options.resource.clone(),
                    min_free_space: options.min_free_space,
                    check_free_space: options.check_free_space,
                };
                let mut batch = UploadBatch::new(remote, plan, upload_options);
                while let Some((outcome, item)) = batch.next().await {
                    record(reports, report_id, &outcome, &item, &mut summary)?;
                }
                Ok::<(), Error>(())
            }
            SyncDirection::Download => {
                let download_options = DownloadOptions {
                    min_free_space: options.min_free_space,
                    check_free_space: options.check_free_space,
                };
                let mut batch =
                    DownloadBatch::new(remote, plan, available_bytes, download_options)?;
                while let Some((outcome, item)) = batch.next().await {
                    record(reports, report_id, &outcome, &item, &mut summary)?;
                }
                Ok(())
            }
        }
    };
    let result = outcome_loop.await;

    // the report is closed even when the batch was refused outright
    reports.finalize_report(report_id)?;
    result?;

    info!(
        "configuration {}: run finished, {}/{} transferred",
        config.uuid, summary.succeeded, summary.planned
    );
    Ok(summary)
}

fn record(
    reports: &ReportingRepository,
    report_id: uuid::Uuid,
    outcome: &TransferOutcome,
    item: &SyncResult,
    summary: &mut RunSummary,
) -> Result<()> {
    let bytes = if outcome.is_ok() {
        summary.succeeded += 1;
        item.source_file_size
    } else {
        summary.failed += 1;
        0
    };
    reports.update_event(
        report_id,
        &item.source_path,
        Some(Utc::now()),
        Some(&outcome.to_string()),
        Some(bytes),
    )
}

//! Cron-driven scheduler keeping one timer per configuration
//!
//! The scheduler is a channel-fed actor owning every timer exclusively. On
//! any configuration change it discards the whole timer set and rebuilds it
//! from the repository, a full resync rather than incremental patching, so no
//! stale timer can ever fire for a deleted or modified configuration.

use crate::engine::SyncEngine;
use chrono::Utc;
use gridsync_store::{ConfigObserver, ConfigRepository, CronTrigger};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

enum Command {
    Rebuild,
    TimerCount(oneshot::Sender<usize>),
    Shutdown,
}

/// Drives [`SyncEngine::start`] at each configuration's cron occurrences
pub struct SyncScheduler {
    command_tx: mpsc::UnboundedSender<Command>,
}

struct RepositoryListener {
    command_tx: mpsc::UnboundedSender<Command>,
}

impl ConfigObserver for RepositoryListener {
    fn configurations_changed(&self) {
        let _ = self.command_tx.send(Command::Rebuild);
    }
}

impl SyncScheduler {
    /// Start the scheduler actor and arm timers for the current
    /// configurations
    ///
    /// The scheduler subscribes itself to the repository; every later
    /// configuration change triggers a full timer rebuild.
    pub fn start(engine: Arc<SyncEngine>, configs: Arc<ConfigRepository>) -> Arc<Self> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        configs.subscribe(Arc::new(RepositoryListener {
            command_tx: command_tx.clone(),
        }));
        tokio::spawn(actor_loop(engine, configs, command_rx));
        let _ = command_tx.send(Command::Rebuild);
        Arc::new(Self { command_tx })
    }

    /// Force a full timer rebuild
    pub fn rebuild(&self) {
        let _ = self.command_tx.send(Command::Rebuild);
    }

    /// Number of armed timers, for status displays
    pub async fn timer_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        if self.command_tx.send(Command::TimerCount(tx)).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Disarm every timer and stop the actor
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(Command::Shutdown);
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        let _ = self.command_tx.send(Command::Shutdown);
    }
}

impl std::fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncScheduler").finish_non_exhaustive()
    }
}

async fn actor_loop(
    engine: Arc<SyncEngine>,
    configs: Arc<ConfigRepository>,
    mut command_rx: mpsc::UnboundedReceiver<Command>,
) {
    let mut timers: HashMap<Uuid, JoinHandle<()>> = HashMap::new();
    while let Some(command) = command_rx.recv().await {
        match command {
            Command::Rebuild => {
                disarm_all(&mut timers);
                for (uuid, next) in configs.next_fire_times(Utc::now()) {
                    match next {
                        Some(at) => {
                            debug!("arming timer for configuration {uuid}, next fire {at}");
                            timers.insert(uuid, arm(engine.clone(), configs.clone(), uuid));
                        }
                        None => {
                            warn!("configuration {uuid} has no next occurrence, not armed");
                        }
                    }
                }
                info!("scheduler rebuilt, {} timers armed", timers.len());
            }
            Command::TimerCount(reply) => {
                let _ = reply.send(timers.len());
            }
            Command::Shutdown => {
                disarm_all(&mut timers);
                break;
            }
        }
    }
}

fn disarm_all(timers: &mut HashMap<Uuid, JoinHandle<()>>) {
    for (_, handle) in timers.drain() {
        handle.abort();
    }
}

/// One timer: sleep until the next occurrence, trigger the engine, re-arm
fn arm(engine: Arc<SyncEngine>, configs: Arc<ConfigRepository>, uuid: Uuid) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            // deleted mid-flight or with a broken schedule; the rebuild that
            // follows any repository change cleans this handle up
            let Some(item) = configs.get_by_id(uuid) else { return };
            let Some(delay) = CronTrigger::parse(&item.cron)
                .ok()
                .and_then(|trigger| trigger.seconds_until_next(Utc::now()))
            else {
                return;
            };
            tokio::time::sleep(Duration::from_secs(delay)).await;
            let outcome = engine.start(uuid);
            debug!("timer fired for configuration {uuid}: {outcome:?}");
        }
    })
}

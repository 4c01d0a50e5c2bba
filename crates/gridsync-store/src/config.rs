//! Configuration repository: durable CRUD store of synchronisation jobs

use crate::cron::CronTrigger;
use crate::observer::{ConfigObserver, ObserverSet};
use chrono::{DateTime, Utc};
use gridsync_types::{Error, Result, SyncDirection};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Directory-name under the home directory holding both state documents
pub const STATE_DIR_NAME: &str = ".gridsync";

const CONFIG_FILE_NAME: &str = "synchronisation.json";
pub(crate) const DOCUMENT_COMMENT: &str =
    "Machine generated file. Entries are managed by the application, do not edit by hand.";

/// Job kinds, mapping the stored `type` label to a run direction
pub const SYNC_KINDS: &[(&str, SyncDirection)] = &[
    ("Scheduled upload", SyncDirection::Upload),
    ("Scheduled download", SyncDirection::Download),
];

/// Resolve a stored `type` label to a run direction
pub fn direction_for_kind(kind: &str) -> Option<SyncDirection> {
    SYNC_KINDS
        .iter()
        .find(|(label, _)| *label == kind)
        .map(|(_, direction)| *direction)
}

/// Resolve a run direction back to its stored `type` label
pub fn kind_for_direction(direction: SyncDirection) -> &'static str {
    SYNC_KINDS
        .iter()
        .find(|(_, d)| *d == direction)
        .map_or("Scheduled upload", |(label, _)| label)
}

/// One named synchronisation job
///
/// The UUID is assigned by [`ConfigRepository::add`] and stays stable for the
/// item's lifetime; the scheduler and engine reference items by UUID only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfigItem {
    /// Stable identifier, nil until the item is added to a repository
    #[serde(default = "Uuid::nil")]
    pub uuid: Uuid,
    /// Job kind label, see [`SYNC_KINDS`]
    #[serde(rename = "type")]
    pub kind: String,
    /// Absolute local directory or file path
    pub local: PathBuf,
    /// Logical remote collection or data object path
    pub remote: String,
    /// Five-field cron expression
    pub cron: String,
}

impl SyncConfigItem {
    /// Create an item awaiting UUID assignment
    pub fn new<K, L, R, C>(kind: K, local: L, remote: R, cron: C) -> Self
    where
        K: Into<String>,
        L: Into<PathBuf>,
        R: Into<String>,
        C: Into<String>,
    {
        Self {
            uuid: Uuid::nil(),
            kind: kind.into(),
            local: local.into(),
            remote: remote.into(),
            cron: cron.into(),
        }
    }

    /// The run direction this item's kind label maps to
    pub fn direction(&self) -> Option<SyncDirection> {
        direction_for_kind(&self.kind)
    }

    /// Check the local path exists and the cron expression parses
    ///
    /// Remote-side write permission is validated by the caller at
    /// creation/update time, not here.
    pub fn validate(&self) -> Result<()> {
        if !self.local.exists() {
            return Err(Error::config(format!(
                "local path '{}' does not exist",
                self.local.display()
            )));
        }
        if self.direction().is_none() {
            return Err(Error::config(format!("unknown job kind '{}'", self.kind)));
        }
        CronTrigger::parse(&self.cron)?;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ConfigDocument {
    comment: String,
    configurations: Vec<SyncConfigItem>,
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self {
            comment: DOCUMENT_COMMENT.to_string(),
            configurations: Vec::new(),
        }
    }
}

/// Durable CRUD store of [`SyncConfigItem`] with change notification
///
/// Backed by a single JSON document. Every mutation rewrites the whole
/// document synchronously and only then notifies observers.
#[derive(Debug)]
pub struct ConfigRepository {
    path: PathBuf,
    items: Mutex<Vec<SyncConfigItem>>,
    observers: ObserverSet<dyn ConfigObserver>,
}

impl ConfigRepository {
    /// Open the repository at the default location under the home directory
    pub fn open_default() -> Result<Self> {
        Self::open(default_state_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Open the repository backed by `path`, creating an empty document if
    /// none exists
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let items = load_document::<ConfigDocument>(&path)?.configurations;
        debug!("loaded {} configurations from {}", items.len(), path.display());
        Ok(Self {
            path,
            items: Mutex::new(items),
            observers: ObserverSet::new(),
        })
    }

    /// Attach an observer notified after every persisted mutation
    pub fn subscribe(&self, observer: Arc<dyn ConfigObserver>) {
        self.observers.register(observer);
    }

    /// Add a new item, assigning it a fresh UUID
    pub fn add(&self, mut item: SyncConfigItem) -> Result<Uuid> {
        item.uuid = Uuid::new_v4();
        let uuid = item.uuid;
        {
            let mut items = self.lock();
            items.push(item);
            self.persist(&items)?;
        }
        info!("added configuration {uuid}");
        self.notify();
        Ok(uuid)
    }

    /// Replace the item with the same UUID
    ///
    /// Returns `false` without persisting anything when no item matches,
    /// which callers must treat as a failed update.
    pub fn update(&self, item: SyncConfigItem) -> Result<bool> {
        let found = {
            let mut items = self.lock();
            match items.iter_mut().find(|existing| existing.uuid == item.uuid) {
                Some(existing) => {
                    *existing = item;
                    self.persist(&items)?;
                    true
                }
                None => {
                    warn!("update for unknown configuration {}", item.uuid);
                    false
                }
            }
        };
        if found {
            self.notify();
        }
        Ok(found)
    }

    /// Remove the item with the given UUID
    pub fn delete(&self, uuid: Uuid) -> Result<bool> {
        let found = {
            let mut items = self.lock();
            let before = items.len();
            items.retain(|item| item.uuid != uuid);
            if items.len() == before {
                false
            } else {
                self.persist(&items)?;
                true
            }
        };
        if found {
            info!("deleted configuration {uuid}");
            self.notify();
        }
        Ok(found)
    }

    /// Snapshot of the item at position `index`
    ///
    /// An out-of-range index is logged and yields `None`, it never panics a
    /// long-lived caller.
    pub fn get_by_index(&self, index: usize) -> Option<SyncConfigItem> {
        let items = self.lock();
        let item = items.get(index).cloned();
        if item.is_none() {
            error!(
                "configuration index {index} out of range ({} configured)",
                items.len()
            );
        }
        item
    }

    /// Snapshot of the item with the given UUID
    pub fn get_by_id(&self, uuid: Uuid) -> Option<SyncConfigItem> {
        self.lock().iter().find(|item| item.uuid == uuid).cloned()
    }

    /// Snapshot of all items in insertion order
    pub fn all(&self) -> Vec<SyncConfigItem> {
        self.lock().clone()
    }

    /// Number of configured items
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no items are configured
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Next cron occurrence after `now` for every configuration
    ///
    /// Items whose stored expression no longer parses are reported with
    /// `None` and logged rather than failing the whole query.
    pub fn next_fire_times(&self, now: DateTime<Utc>) -> Vec<(Uuid, Option<DateTime<Utc>>)> {
        self.all()
            .iter()
            .map(|item| (item.uuid, next_fire_time_of(item, now)))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SyncConfigItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, items: &[SyncConfigItem]) -> Result<()> {
        let document = ConfigDocument {
            comment: DOCUMENT_COMMENT.to_string(),
            configurations: items.to_vec(),
        };
        write_document(&self.path, &document)
    }

    fn notify(&self) {
        self.observers.for_each(ConfigObserver::configurations_changed);
    }
}

fn next_fire_time_of(item: &SyncConfigItem, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match CronTrigger::parse(&item.cron) {
        Ok(trigger) => trigger.next_occurrence(now),
        Err(error) => {
            warn!("configuration {} has an unusable schedule: {error}", item.uuid);
            None
        }
    }
}

/// The per-user directory holding both state documents, created if absent
pub fn default_state_dir() -> Result<PathBuf> {
    let home = dirs_next::home_dir()
        .ok_or_else(|| Error::config("could not determine the home directory"))?;
    Ok(home.join(STATE_DIR_NAME))
}

/// Load a repository document, creating an empty one on first use
///
/// A file that exists but does not parse is a fatal error naming the file,
/// never silently repaired.
pub(crate) fn load_document<D>(path: &Path) -> Result<D>
where
    D: for<'de> Deserialize<'de> + Serialize + Default,
{
    if path.exists() {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| Error::MalformedDocument {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    } else {
        let document = D::default();
        write_document(path, &document)?;
        Ok(document)
    }
}

pub(crate) fn write_document<D: Serialize>(path: &Path, document: &D) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let raw = serde_json::to_string_pretty(document).map_err(|e| Error::Io {
        message: format!("Failed to serialize '{}': {}", path.display(), e),
    })?;
    std::fs::write(path, raw)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct Counter(AtomicUsize);

    impl ConfigObserver for Counter {
        fn configurations_changed(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn repo_in(dir: &TempDir) -> ConfigRepository {
        ConfigRepository::open(dir.path().join(CONFIG_FILE_NAME)).unwrap()
    }

    fn sample_item(dir: &TempDir) -> SyncConfigItem {
        SyncConfigItem::new(
            "Scheduled upload",
            dir.path(),
            "/zone/home/user",
            "*/5 * * * *",
        )
    }

    #[test]
    fn test_first_open_creates_empty_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let repo = ConfigRepository::open(&path).unwrap();
        assert!(repo.is_empty());

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("configurations"));
        assert!(raw.contains("comment"));
    }

    #[test]
    fn test_malformed_document_is_fatal_and_names_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "{ not json").unwrap();

        let err = ConfigRepository::open(&path).unwrap_err();
        assert!(matches!(err, Error::MalformedDocument { .. }));
        assert!(err.to_string().contains(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_add_assigns_uuid_and_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let uuid = {
            let repo = repo_in(&dir);
            repo.add(sample_item(&dir)).unwrap()
        };
        assert!(!uuid.is_nil());

        let repo = repo_in(&dir);
        let item = repo.get_by_id(uuid).unwrap();
        assert_eq!(item.kind, "Scheduled upload");
        assert_eq!(item.cron, "*/5 * * * *");
    }

    #[test]
    fn test_update_reports_unknown_uuid() {
        let dir = TempDir::new().unwrap();
        let repo = repo_in(&dir);
        let uuid = repo.add(sample_item(&dir)).unwrap();

        let mut known = repo.get_by_id(uuid).unwrap();
        known.cron = "0 * * * *".to_string();
        assert!(repo.update(known).unwrap());
        assert_eq!(repo.get_by_id(uuid).unwrap().cron, "0 * * * *");

        let mut unknown = sample_item(&dir);
        unknown.uuid = Uuid::new_v4();
        assert!(!repo.update(unknown).unwrap());
    }

    #[test]
    fn test_delete_removes_by_uuid() {
        let dir = TempDir::new().unwrap();
        let repo = repo_in(&dir);
        let uuid = repo.add(sample_item(&dir)).unwrap();
        assert_eq!(repo.len(), 1);

        assert!(repo.delete(uuid).unwrap());
        assert!(repo.is_empty());
        assert!(!repo.delete(uuid).unwrap());
    }

    #[test]
    fn test_get_by_index_out_of_range_is_none() {
        let dir = TempDir::new().unwrap();
        let repo = repo_in(&dir);
        assert!(repo.get_by_index(0).is_none());

        repo.add(sample_item(&dir)).unwrap();
        assert!(repo.get_by_index(0).is_some());
        assert!(repo.get_by_index(1).is_none());
    }

    #[test]
    fn test_observers_fire_after_persist() {
        let dir = TempDir::new().unwrap();
        let repo = repo_in(&dir);
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        repo.subscribe(counter.clone());

        let uuid = repo.add(sample_item(&dir)).unwrap();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        repo.delete(uuid).unwrap();
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);

        // failed update does not notify
        let mut unknown = sample_item(&dir);
        unknown.uuid = Uuid::new_v4();
        repo.update(unknown).unwrap();
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_next_fire_times_cover_every_item() {
        let dir = TempDir::new().unwrap();
        let repo = repo_in(&dir);
        let a = repo.add(sample_item(&dir)).unwrap();
        let mut broken = sample_item(&dir);
        broken.cron = "not valid".to_string();
        // bypass validation on purpose, mimicking a hand-edited document
        let b = repo.add(broken).unwrap();

        let now = Utc::now();
        let times = repo.next_fire_times(now);
        assert_eq!(times.len(), 2);
        let of = |uuid: Uuid| times.iter().find(|(u, _)| *u == uuid).unwrap().1;
        assert!(of(a).unwrap() > now);
        assert!(of(b).is_none());
    }

    #[test]
    fn test_validate_checks_path_kind_and_cron() {
        let dir = TempDir::new().unwrap();
        assert!(sample_item(&dir).validate().is_ok());

        let mut missing = sample_item(&dir);
        missing.local = PathBuf::from("/definitely/not/here");
        assert!(matches!(
            missing.validate().unwrap_err(),
            Error::Config { .. }
        ));

        let mut bad_kind = sample_item(&dir);
        bad_kind.kind = "Mirror".to_string();
        assert!(bad_kind.validate().is_err());

        let mut bad_cron = sample_item(&dir);
        bad_cron.cron = "* * *".to_string();
        assert!(matches!(
            bad_cron.validate().unwrap_err(),
            Error::InvalidCron { .. }
        ));
    }

    #[test]
    fn test_kind_direction_mapping() {
        assert_eq!(
            direction_for_kind("Scheduled download"),
            Some(SyncDirection::Download)
        );
        assert_eq!(direction_for_kind("Mirror"), None);
        assert_eq!(
            kind_for_direction(SyncDirection::Upload),
            "Scheduled upload"
        );
    }
}

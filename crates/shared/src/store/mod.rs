use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::models::{ChatId, ChatRecord, Snapshot};

mod events;
mod reminders;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read snapshot {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("snapshot {path} is malformed: {source}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to encode snapshot: {0}")]
    Encode(serde_json::Error),
    #[error("failed to write snapshot {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// File-backed owner of every chat record.
///
/// The whole mapping is rewritten after each mutation while the lock is held,
/// so writes land on disk in mutation order.
#[derive(Debug)]
pub struct EventStore {
    path: PathBuf,
    chats: Mutex<Snapshot>,
}

impl EventStore {
    /// Loads the snapshot at `path`. Never fails: a missing file starts an empty
    /// store (and creates the file), an unreadable one is logged and ignored.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (snapshot, create_file) = match load_snapshot(&path) {
            Ok(Some(snapshot)) => {
                info!(
                    path = %path.display(),
                    chats = snapshot.len(),
                    "loaded snapshot"
                );
                (snapshot, false)
            }
            Ok(None) => {
                info!(path = %path.display(), "no snapshot found; starting empty");
                (Snapshot::new(), true)
            }
            Err(err) => {
                warn!("{err}; starting with empty state");
                (Snapshot::new(), false)
            }
        };

        let store = Self {
            path,
            chats: Mutex::new(snapshot),
        };
        if create_file {
            store.persist(&store.lock_chats());
        }
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Snapshot {
        self.lock_chats().clone()
    }

    pub fn save(&self) -> Result<(), StoreError> {
        let chats = self.lock_chats();
        write_snapshot(&self.path, &chats)
    }

    /// Returns the chat's record, inserting an empty one on first reference.
    /// Insertion alone is not written to disk.
    pub fn get_or_create(&self, chat_id: ChatId) -> ChatRecord {
        self.lock_chats().entry(chat_id).or_default().clone()
    }

    fn lock_chats(&self) -> MutexGuard<'_, Snapshot> {
        match self.chats.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn persist(&self, chats: &Snapshot) {
        if let Err(err) = write_snapshot(&self.path, chats) {
            error!("failed to save snapshot, keeping in-memory state: {err}");
        }
    }
}

/// Reads the snapshot at `path`; `Ok(None)` when the file does not exist.
pub fn load_snapshot(path: &Path) -> Result<Option<Snapshot>, StoreError> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let entries: BTreeMap<String, Value> =
        serde_json::from_slice(&raw).map_err(|source| StoreError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(Some(decode_entries(entries)))
}

/// Keeps every well-formed chat entry; a bad key or record is skipped on its
/// own so one entry cannot cost the rest of the file.
fn decode_entries(entries: BTreeMap<String, Value>) -> Snapshot {
    let mut snapshot = Snapshot::new();
    for (key, value) in entries {
        let Ok(chat_id) = key.trim().parse::<ChatId>() else {
            warn!(key = %key, "skipping snapshot entry with a non-numeric chat id");
            continue;
        };

        match serde_json::from_value::<ChatRecord>(value) {
            Ok(record) => {
                snapshot.insert(chat_id, record);
            }
            Err(err) => warn!(chat_id, "skipping malformed snapshot entry: {err}"),
        }
    }
    snapshot
}

/// Writes `snapshot` to a sibling temp file and renames it over `path`, so a
/// failed write never leaves a truncated snapshot behind.
pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), StoreError> {
    let encoded = serde_json::to_vec_pretty(snapshot).map_err(StoreError::Encode)?;
    let temp_path = temp_path_for(path);

    let result = (|| -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&encoded)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, path)
    })();

    result.map_err(|source| {
        let _ = fs::remove_file(&temp_path);
        StoreError::Write {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut file_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "snapshot".into());
    file_name.push(format!(".tmp.{}", std::process::id()));
    path.with_file_name(file_name)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::{EventStore, StoreError, load_snapshot, write_snapshot};
    use crate::models::{ChatRecord, ReminderSetting, Snapshot};

    fn temp_store() -> (TempDir, EventStore) {
        let dir = TempDir::new().expect("temp dir should be created");
        let store = EventStore::open(dir.path().join("vkids.json"));
        (dir, store)
    }

    #[test]
    fn open_creates_missing_snapshot_file() {
        let (_dir, store) = temp_store();

        let raw = fs::read_to_string(store.path()).expect("snapshot file should exist");
        assert_eq!(raw, "{}");
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn open_falls_back_to_empty_state_on_malformed_file() {
        let dir = TempDir::new().expect("temp dir should be created");
        let path = dir.path().join("vkids.json");
        fs::write(&path, "{ not json").expect("fixture should be written");

        let store = EventStore::open(&path);

        assert!(store.snapshot().is_empty());
        assert_eq!(
            fs::read_to_string(&path).expect("file should remain"),
            "{ not json"
        );
        assert!(matches!(
            load_snapshot(&path),
            Err(StoreError::Decode { .. })
        ));
    }

    #[test]
    fn open_reads_legacy_snapshot() {
        let dir = TempDir::new().expect("temp dir should be created");
        let path = dir.path().join("vkids.json");
        fs::write(
            &path,
            r#"{
  "1001": { "vkids": ["04-05 Fri 14:30", "04-06 Sat 09:00"], "reminder_hours": 4 },
  "2002": { "vkids": [], "reminder_hours": -1 }
}"#,
        )
        .expect("fixture should be written");

        let store = EventStore::open(&path);

        assert_eq!(
            store.get_or_create(1001),
            ChatRecord {
                events: vec!["04-05 Fri 14:30".to_string(), "04-06 Sat 09:00".to_string()],
                reminder: ReminderSetting::Every(4),
            }
        );
        assert_eq!(
            store.get_or_create(2002).reminder,
            ReminderSetting::AwaitingInput
        );
    }

    #[test]
    fn bad_entries_are_skipped_without_losing_other_chats() {
        let dir = TempDir::new().expect("temp dir should be created");
        let path = dir.path().join("vkids.json");
        fs::write(
            &path,
            r#"{
  "1001": { "vkids": ["04-05 Fri 14:30"], "reminder_hours": 5 },
  "2002": { "vkids": [], "reminder_hours": 10000000000 },
  "oops": { "vkids": ["01-01 Mon 00:00"], "reminder_hours": 0 },
  "3003": { "vkids": "not a list", "reminder_hours": 0 }
}"#,
        )
        .expect("fixture should be written");

        let store = EventStore::open(&path);
        store.append_event(3, "04-06 Sat 09:00".to_string());

        let reloaded = load_snapshot(&path)
            .expect("snapshot should load")
            .expect("snapshot should exist");
        assert_eq!(
            reloaded.keys().copied().collect::<Vec<_>>(),
            vec![3, 1001, 2002]
        );
        assert_eq!(reloaded[&1001].events, vec!["04-05 Fri 14:30".to_string()]);
        assert_eq!(reloaded[&1001].reminder, ReminderSetting::Every(5));
        assert_eq!(reloaded[&2002].reminder, ReminderSetting::Every(u32::MAX));
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let (_dir, store) = temp_store();

        let first = store.get_or_create(7);
        assert_eq!(first, ChatRecord::default());
        store.append_event(7, "04-05 Fri 14:30".to_string());

        let second = store.get_or_create(7);
        assert_eq!(second.events, vec!["04-05 Fri 14:30".to_string()]);
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn snapshot_round_trips_through_disk() {
        let dir = TempDir::new().expect("temp dir should be created");
        let path = dir.path().join("nested").join("vkids.json");

        let mut snapshot = Snapshot::new();
        snapshot.insert(
            1001,
            ChatRecord {
                events: vec!["04-05 Fri 14:30".to_string()],
                reminder: ReminderSetting::Every(5),
            },
        );
        snapshot.insert(
            -100_200,
            ChatRecord {
                events: vec!["12-31 Tue 23:59".to_string(), "01-01 Wed 00:01".to_string()],
                reminder: ReminderSetting::Disabled,
            },
        );

        write_snapshot(&path, &snapshot).expect("snapshot should be written");
        let reloaded = load_snapshot(&path)
            .expect("snapshot should load")
            .expect("snapshot should exist");

        assert_eq!(reloaded, snapshot);
        assert_eq!(EventStore::open(&path).snapshot(), snapshot);
    }

    #[test]
    fn failed_save_keeps_in_memory_state() {
        let dir = TempDir::new().expect("temp dir should be created");
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not a directory").expect("fixture should be written");
        let store = EventStore::open(blocker.join("vkids.json"));

        store.append_event(3, "04-05 Fri 14:30".to_string());

        assert!(matches!(store.save(), Err(StoreError::Write { .. })));
        assert_eq!(store.get_or_create(3).events.len(), 1);
    }
}

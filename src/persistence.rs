/**
 * Reading and writing the word list and settings as a single JSON snapshot.
 *
 * Saves are atomic: the snapshot is written to a temporary file next to the real one
 * and then renamed over it, so a crash never leaves a half-written word list.
 */
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::common::{Result, VocabError};
use super::word::{StoredWord, WordRecord};

/// Everything the application keeps between runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub words: Vec<WordRecord>,
    pub reminder_time: DateTime<Utc>,
    pub reminders_enabled: bool,
}

impl Default for Snapshot {
    fn default() -> Self {
        Snapshot {
            words: Vec::new(),
            reminder_time: default_reminder_time(),
            reminders_enabled: false,
        }
    }
}

/// The JSON shape of a `Snapshot`. Field names are part of the backup format.
#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(default, rename_all = "camelCase")]
struct StoredSnapshot {
    words: Vec<StoredWord>,
    reminder_time: Option<DateTime<Utc>>,
    reminders_enabled: bool,
}

fn default_reminder_time() -> DateTime<Utc> {
    let now = Utc::now();
    match now.date_naive().and_hms_opt(20, 0, 0) {
        Some(eight_pm) => Utc.from_utc_datetime(&eight_pm),
        None => now,
    }
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String> {
        let stored = StoredSnapshot {
            words: self.words.iter().map(|w| w.to_stored()).collect(),
            reminder_time: Some(self.reminder_time),
            reminders_enabled: self.reminders_enabled,
        };
        Ok(serde_json::to_string_pretty(&stored)?)
    }

    /// Parse a snapshot. Words without a headword are dropped with a warning rather
    /// than failing the whole load.
    pub fn from_json(data: &str) -> Result<Self> {
        let stored: StoredSnapshot = serde_json::from_str(data)?;
        let now = Utc::now();
        let mut words = Vec::with_capacity(stored.words.len());
        for stored_word in stored.words {
            match WordRecord::from_stored(stored_word, now) {
                Ok(word) => words.push(word),
                Err(e) => warn!("skipping stored word: {}", e),
            }
        }
        Ok(Snapshot {
            words,
            reminder_time: stored.reminder_time.unwrap_or_else(default_reminder_time),
            reminders_enabled: stored.reminders_enabled,
        })
    }
}

/// Somewhere to keep a snapshot between runs.
pub trait Persistence {
    fn load(&self) -> Result<Snapshot>;
    fn save(&self, snapshot: &Snapshot) -> Result<()>;
}

/// A snapshot kept in a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        JsonFileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Persistence for JsonFileStore {
    /// A missing file is an empty word list, not an error.
    ///
    /// If loading had to fill in or correct any field, such as a missing id, the file
    /// is rewritten at once so that the next load sees the same words.
    fn load(&self) -> Result<Snapshot> {
        if !self.path.exists() {
            debug!("no word list at {}, starting empty", self.path.display());
            return Ok(Snapshot::default());
        }
        let data = fs::read_to_string(&self.path)?;
        let snapshot = Snapshot::from_json(&data)?;
        debug!("loaded {} words from {}", snapshot.words.len(), self.path.display());

        let normalized = snapshot.to_json()?;
        if differs(&data, &normalized)? {
            info!("rewriting {} with normalized words", self.path.display());
            if let Err(e) = write_atomically(&self.path, &normalized) {
                warn!("could not rewrite word list: {}", e);
            }
        }
        Ok(snapshot)
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        write_atomically(&self.path, &snapshot.to_json()?)?;
        debug!("saved {} words to {}", snapshot.words.len(), self.path.display());
        Ok(())
    }
}

/// A snapshot kept in memory, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    saved: RefCell<Option<Snapshot>>,
    saves: RefCell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        MemoryStore { saved: RefCell::new(Some(snapshot)), saves: RefCell::new(0) }
    }

    /// How many times `save` has been called.
    pub fn save_count(&self) -> usize {
        *self.saves.borrow()
    }

    pub fn last_saved(&self) -> Option<Snapshot> {
        self.saved.borrow().clone()
    }
}

impl Persistence for MemoryStore {
    fn load(&self) -> Result<Snapshot> {
        Ok(self.saved.borrow().clone().unwrap_or_default())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        self.saved.replace(Some(snapshot.clone()));
        *self.saves.borrow_mut() += 1;
        Ok(())
    }
}

/// Write a backup of `snapshot` to `path`.
pub fn export_backup(snapshot: &Snapshot, path: &Path) -> Result<()> {
    write_atomically(path, &snapshot.to_json()?)?;
    info!("exported {} words to {}", snapshot.words.len(), path.display());
    Ok(())
}

/// Read a backup written by `export_backup`.
pub fn import_backup(path: &Path) -> Result<Snapshot> {
    let data = fs::read_to_string(path)?;
    let snapshot = Snapshot::from_json(&data)?;
    info!("read {} words from {}", snapshot.words.len(), path.display());
    Ok(snapshot)
}

/// Compare two snapshots as JSON values, so that formatting does not count.
fn differs(stored: &str, normalized: &str) -> Result<bool> {
    let stored: Value = serde_json::from_str(stored)?;
    let normalized: Value = serde_json::from_str(normalized)?;
    Ok(stored != normalized)
}

fn write_atomically(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    if let Err(source) = fs::write(&tmp, contents) {
        remove_temp_file(&tmp);
        return Err(VocabError::CannotWriteToFile { path: tmp, source });
    }
    if let Err(source) = fs::rename(&tmp, path) {
        remove_temp_file(&tmp);
        return Err(VocabError::CannotWriteToFile { path: path.to_path_buf(), source });
    }
    Ok(())
}

fn remove_temp_file(tmp: &Path) {
    if tmp.exists() {
        if let Err(e) = fs::remove_file(tmp) {
            warn!("could not remove {}: {}", tmp.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word::WordDraft;
    use chrono::Duration;

    fn word(headword: &str, meaning: &str) -> WordRecord {
        WordRecord::new(WordDraft::new(headword, meaning), Utc::now()).unwrap()
    }

    #[test]
    fn snapshot_json_uses_stable_field_names() {
        let snapshot = Snapshot {
            words: vec![word("queso", "cheese")],
            reminder_time: Utc::now(),
            reminders_enabled: true,
        };
        let value: Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert!(value["words"].is_array());
        assert!(value["reminderTime"].is_string());
        assert_eq!(value["remindersEnabled"], serde_json::Value::Bool(true));
        assert_eq!(value["words"][0]["headword"], "queso");
        assert!(value["words"][0]["nextReviewDate"].is_string());
    }

    #[test]
    fn from_json_fills_missing_fields() {
        let data = r#"{"words": [{"word": "pan", "meaning": "bread"}]}"#;
        let snapshot = Snapshot::from_json(data).unwrap();
        assert_eq!(snapshot.words.len(), 1);
        assert_eq!(snapshot.words[0].headword, "pan");
        assert!(!snapshot.reminders_enabled);
    }

    #[test]
    fn from_json_skips_words_without_headword() {
        let data = r#"{"words": [
            {"headword": " ", "meaning": "?"},
            {"headword": "leche", "meaning": "milk"}
        ]}"#;
        let snapshot = Snapshot::from_json(data).unwrap();
        assert_eq!(snapshot.words.len(), 1);
    }

    #[test]
    fn from_json_normalizes_stale_due_dates() {
        let reviewed = Utc::now() - Duration::days(1);
        let data = format!(
            r#"{{"words": [{{"headword": "agua", "meaning": "water", "reviewStage": 1,
                "lastReviewedAt": "{}", "nextReviewDate": "2000-01-01T00:00:00Z"}}]}}"#,
            reviewed.to_rfc3339()
        );
        let snapshot = Snapshot::from_json(&data).unwrap();
        assert_eq!(snapshot.words[0].next_review_date, reviewed + Duration::days(3));
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(matches!(Snapshot::from_json("{not json"), Err(VocabError::Json(_))));
    }

    #[test]
    fn legacy_file_gets_stable_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.json");
        let legacy = r#"{"words": [{"word": "pan", "meaning": "bread"}]}"#;
        fs::write(&path, legacy).unwrap();
        let store = JsonFileStore::new(&path);

        let first = store.load().unwrap().words[0].id();
        let second = store.load().unwrap().words[0].id();
        assert_eq!(first, second);
        assert!(fs::read_to_string(&path).unwrap().contains(&first.to_string()));
    }

    #[test]
    fn normalized_file_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.json");
        let store = JsonFileStore::new(&path);
        let snapshot = Snapshot {
            words: vec![word("sal", "salt")],
            ..Snapshot::default()
        };
        store.save(&snapshot).unwrap();
        // Same content, different layout.
        let saved = fs::read_to_string(&path).unwrap();
        let value: Value = serde_json::from_str(&saved).unwrap();
        let compact = value.to_string();
        fs::write(&path, &compact).unwrap();

        assert_eq!(store.load().unwrap(), snapshot);
        assert_eq!(fs::read_to_string(&path).unwrap(), compact);
    }

    #[test]
    fn failed_rename_keeps_error_and_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory cannot be replaced by a file.
        let path = dir.path().join("words.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "x").unwrap();

        let err = JsonFileStore::new(&path).save(&Snapshot::default()).unwrap_err();
        match err {
            VocabError::CannotWriteToFile { path: failed, .. } => {
                assert_eq!(failed, path)
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(!dir.path().join("words.json.tmp").exists());
    }

    #[test]
    fn memory_store_counts_saves() {
        let store = MemoryStore::new();
        assert_eq!(store.load().unwrap().words.len(), 0);
        store.save(&Snapshot::default()).unwrap();
        store.save(&Snapshot::default()).unwrap();
        assert_eq!(store.save_count(), 2);
    }
}

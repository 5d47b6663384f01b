// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JSON-file store.
//!
//! The whole store is one JSON object (`{ key: raw-string-value }`) kept in
//! memory and rewritten atomically on every mutation. Other processes may
//! write the same file. Their writes are noticed by a SHA-256 digest of the
//! file contents: before every mutation (so a write never drops keys it did
//! not touch) and on `poll_external_changes`, which reports them. Writes to
//! the same key are last-write-wins.

use super::{check_quota, KeyValueStore, StorageEvent};
use crate::error::StorageError;
use ring::digest::{digest, SHA256};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

type Entries = BTreeMap<String, String>;

#[derive(Debug)]
struct FileState {
    entries: Entries,
    /// Digest of the file as last read or written; `None` if absent.
    digest: Option<Vec<u8>>,
    /// External changes merged in but not yet reported.
    pending: Vec<StorageEvent>,
}

/// Persistent store backed by a single JSON file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    quota: Option<usize>,
    state: Mutex<FileState>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P, quota: Option<usize>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let (entries, digest) = match read_file(&path)? {
            Some((entries, digest)) => (entries, Some(digest)),
            None => (BTreeMap::new(), None),
        };

        tracing::info!(
            path = %path.display(),
            keys = entries.len(),
            "Opened file store"
        );

        Ok(Self {
            path,
            quota,
            state: Mutex::new(FileState {
                entries,
                digest,
                pending: Vec::new(),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, FileState>, StorageError> {
        self.state
            .lock()
            .map_err(|_| StorageError::Unavailable("file store lock poisoned".to_string()))
    }

    /// Merge whatever other writers put in the file since we last saw it,
    /// queueing one event per differing key.
    fn refresh(&self, state: &mut FileState) -> Result<(), StorageError> {
        let Some((entries, digest)) = read_file(&self.path)? else {
            state.digest = None;
            if !state.entries.is_empty() {
                state.entries.clear();
                state.pending.push(StorageEvent::cleared());
            }
            return Ok(());
        };

        if state.digest.as_ref() == Some(&digest) {
            return Ok(());
        }

        let before = state.pending.len();
        for (key, value) in &entries {
            if state.entries.get(key) != Some(value) {
                state
                    .pending
                    .push(StorageEvent::changed(key.clone(), Some(value.clone())));
            }
        }
        for key in state.entries.keys() {
            if !entries.contains_key(key) {
                state.pending.push(StorageEvent::changed(key.clone(), None));
            }
        }

        tracing::debug!(
            path = %self.path.display(),
            changes = state.pending.len() - before,
            "Detected external file store changes"
        );

        state.entries = entries;
        state.digest = Some(digest);
        Ok(())
    }

    /// Merge external changes, apply `mutate` to a copy of the entries,
    /// persist it, then commit.
    ///
    /// The in-memory state only changes once the file write succeeded.
    fn mutate<F>(&self, mutate: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut Entries) -> Result<(), StorageError>,
    {
        let mut state = self.lock()?;
        self.refresh(&mut state)?;

        let mut entries = state.entries.clone();
        mutate(&mut entries)?;
        let digest = write_file(&self.path, &entries)?;
        state.entries = entries;
        state.digest = Some(digest);
        Ok(())
    }
}

/// Turn queued external changes into events carrying the values we hold
/// now, so a local write made after the merge is not reported as undone.
fn drain_pending(state: &mut FileState) -> Vec<StorageEvent> {
    let pending = std::mem::take(&mut state.pending);
    if pending.is_empty() {
        return pending;
    }

    if pending.iter().any(|event| event.key.is_none()) {
        let mut events = vec![StorageEvent::cleared()];
        events.extend(
            state
                .entries
                .iter()
                .map(|(key, value)| StorageEvent::changed(key.clone(), Some(value.clone()))),
        );
        return events;
    }

    let keys: BTreeSet<String> = pending.into_iter().filter_map(|event| event.key).collect();
    keys.into_iter()
        .map(|key| {
            let value = state.entries.get(&key).cloned();
            StorageEvent::changed(key, value)
        })
        .collect()
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.entries.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.mutate(|entries| {
            check_quota(entries, key, value, self.quota)?;
            entries.insert(key.to_string(), value.to_string());
            Ok(())
        })
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.mutate(|entries| {
            entries.remove(key);
            Ok(())
        })
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.mutate(|entries| {
            entries.clear();
            Ok(())
        })
    }

    fn len(&self) -> Result<usize, StorageError> {
        Ok(self.lock()?.entries.len())
    }

    fn key(&self, index: usize) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.entries.keys().nth(index).cloned())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.lock()?.entries.keys().cloned().collect())
    }

    /// Writable-directory check instead of a write+delete cycle, which
    /// would cost two file rewrites per call here.
    fn probe(&self) -> Result<(), StorageError> {
        let _state = self.lock()?;
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        match fs::metadata(dir) {
            Ok(meta) if meta.permissions().readonly() => Err(StorageError::Unavailable(
                format!("{} is read-only", dir.display()),
            )),
            Ok(_) => Ok(()),
            // The directory is created on first write.
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn poll_external_changes(&self) -> Result<Vec<StorageEvent>, StorageError> {
        let mut state = self.lock()?;
        self.refresh(&mut state)?;
        Ok(drain_pending(&mut state))
    }
}

fn content_digest(data: &[u8]) -> Vec<u8> {
    digest(&SHA256, data).as_ref().to_vec()
}

/// Read and parse the store file; `None` if it does not exist.
fn read_file(path: &Path) -> Result<Option<(Entries, Vec<u8>)>, StorageError> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let digest = content_digest(&data);

    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(Some((BTreeMap::new(), digest)));
    }

    let entries: Entries = serde_json::from_slice(&data).map_err(|e| {
        StorageError::Deserialize(format!("{}: {}", path.display(), e))
    })?;
    Ok(Some((entries, digest)))
}

/// Write the entries to a sibling temp file and rename it into place.
/// Returns the digest of what was written.
fn write_file(path: &Path, entries: &Entries) -> Result<Vec<u8>, StorageError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }

    let data =
        serde_json::to_vec(entries).map_err(|e| StorageError::Serialize(e.to_string()))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, &data)?;
    fs::rename(&tmp, path)?;

    Ok(content_digest(&data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let store = FileStore::open(&path, None).unwrap();
        store.set_item("userType", "\"atleta\"").unwrap();
        store.set_item("theme", "\"dark\"").unwrap();
        store.remove_item("theme").unwrap();
        drop(store);

        let reopened = FileStore::open(&path, None).unwrap();
        assert_eq!(
            reopened.get_item("userType").unwrap(),
            Some("\"atleta\"".to_string())
        );
        assert_eq!(reopened.get_item("theme").unwrap(), None);
        assert_eq!(reopened.len().unwrap(), 1);
    }

    #[test]
    fn test_quota_failure_leaves_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let store = FileStore::open(&path, Some(16)).unwrap();
        store.set_item("a", "1").unwrap();
        let result = store.set_item("big", &"x".repeat(64));

        assert!(matches!(result, Err(StorageError::QuotaExceeded { .. })));
        assert_eq!(store.keys().unwrap(), vec!["a".to_string()]);
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(
            FileStore::open(&path, None),
            Err(StorageError::Deserialize(_))
        ));
    }

    #[test]
    fn test_poll_reports_changes_from_another_writer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let ours = FileStore::open(&path, None).unwrap();
        ours.set_item("keep", "1").unwrap();
        ours.set_item("drop", "2").unwrap();
        assert!(ours.poll_external_changes().unwrap().is_empty());

        let theirs = FileStore::open(&path, None).unwrap();
        theirs.remove_item("drop").unwrap();
        theirs.set_item("keep", "10").unwrap();
        theirs.set_item("new", "33").unwrap();

        let mut events = ours.poll_external_changes().unwrap();
        events.sort_by(|a, b| a.key.cmp(&b.key));
        assert_eq!(
            events,
            vec![
                StorageEvent::changed("drop", None),
                StorageEvent::changed("keep", Some("10".to_string())),
                StorageEvent::changed("new", Some("33".to_string())),
            ]
        );
        assert_eq!(ours.get_item("keep").unwrap(), Some("10".to_string()));
        assert!(ours.poll_external_changes().unwrap().is_empty());
    }

    #[test]
    fn test_poll_reports_deleted_file_as_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let store = FileStore::open(&path, None).unwrap();
        store.set_item("a", "1").unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(
            store.poll_external_changes().unwrap(),
            vec![StorageEvent::cleared()]
        );
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn test_writers_of_different_keys_keep_each_others_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let a = FileStore::open(&path, None).unwrap();
        let b = FileStore::open(&path, None).unwrap();
        a.set_item("theme", "\"dark\"").unwrap();
        b.set_item("language", "\"en-US\"").unwrap();
        a.set_item("privacy", "{}").unwrap();

        let reopened = FileStore::open(&path, None).unwrap();
        assert_eq!(
            reopened.keys().unwrap(),
            vec![
                "language".to_string(),
                "privacy".to_string(),
                "theme".to_string()
            ]
        );

        assert_eq!(
            a.poll_external_changes().unwrap(),
            vec![StorageEvent::changed("language", Some("\"en-US\"".to_string()))]
        );
        assert_eq!(
            b.poll_external_changes().unwrap(),
            vec![
                StorageEvent::changed("privacy", Some("{}".to_string())),
                StorageEvent::changed("theme", Some("\"dark\"".to_string())),
            ]
        );
    }

    #[test]
    fn test_same_length_rewrite_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let ours = FileStore::open(&path, None).unwrap();
        ours.set_item("score", "1").unwrap();

        let theirs = FileStore::open(&path, None).unwrap();
        theirs.set_item("score", "2").unwrap();

        assert_eq!(
            ours.poll_external_changes().unwrap(),
            vec![StorageEvent::changed("score", Some("2".to_string()))]
        );
    }

    #[test]
    fn test_merged_change_reports_value_after_local_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let ours = FileStore::open(&path, None).unwrap();
        let theirs = FileStore::open(&path, None).unwrap();
        theirs.set_item("k", "1").unwrap();
        ours.set_item("k", "2").unwrap();

        assert_eq!(
            ours.poll_external_changes().unwrap(),
            vec![StorageEvent::changed("k", Some("2".to_string()))]
        );
        assert_eq!(ours.get_item("k").unwrap(), Some("2".to_string()));
    }
}

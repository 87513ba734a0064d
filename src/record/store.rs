//! Per-player durable record storage.
//!
//! One JSON file per player under `<data_dir>/records/`, holding the ordered
//! list of raid entries (at most one pending + any number of archives).
//! Files are loaded lazily into an in-memory cache and written through after
//! every mutation. Writes hold an exclusive `fs2` lock across the full
//! read-modify-write cycle and land via temp-file-and-rename, so concurrent
//! readers only ever observe a record from before or after a write, never a
//! torn one. A file that fails to parse is quarantined (renamed aside) and
//! the player continues with empty history.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use log::{info, warn};

use crate::record::errors::RecordError;
use crate::record::types::{RaidArchive, RaidEntry};

/// Selects one archive out of a player's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveSelector {
    /// Server-assigned raid id.
    RaidId(String),
    /// Position in the created-at-ordered archive list.
    Index(usize),
}

impl std::fmt::Display for ArchiveSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveSelector::RaidId(id) => write!(f, "raid {}", id),
            ArchiveSelector::Index(idx) => write!(f, "index {}", idx),
        }
    }
}

/// File-backed store of every player's raid history.
pub struct RecordStore {
    records_dir: PathBuf,
    cache: HashMap<String, Vec<RaidEntry>>,
}

impl RecordStore {
    /// Open (or create) the store rooted at `data_dir`. Records live in the
    /// `records/` subdirectory.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, RecordError> {
        let records_dir = data_dir.as_ref().join("records");
        tokio::fs::create_dir_all(&records_dir).await?;
        Ok(Self {
            records_dir,
            cache: HashMap::new(),
        })
    }

    fn validate_player_id(player_id: &str) -> Result<(), RecordError> {
        let ok = !player_id.is_empty()
            && player_id.len() <= 64
            && !player_id.starts_with('.')
            && player_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if ok {
            Ok(())
        } else {
            Err(RecordError::InvalidPlayerId(player_id.to_string()))
        }
    }

    fn player_file(&self, player_id: &str) -> Result<PathBuf, RecordError> {
        Self::validate_player_id(player_id)?;
        Ok(self.records_dir.join(format!("{}.json", player_id)))
    }

    /// Load a player's file into the cache if not already present.
    async fn ensure_loaded(&mut self, player_id: &str) -> Result<(), RecordError> {
        if self.cache.contains_key(player_id) {
            return Ok(());
        }
        let path = self.player_file(player_id)?;
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(data) => match serde_json::from_str::<Vec<RaidEntry>>(&data) {
                Ok(entries) => entries,
                Err(e) => {
                    self.quarantine(&path, &e.to_string()).await;
                    Vec::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        self.cache.insert(player_id.to_string(), entries);
        Ok(())
    }

    /// Rename a corrupt record file aside so startup never blocks on it.
    async fn quarantine(&self, path: &Path, detail: &str) {
        let base = format!("{}.err", path.display());
        let mut target = PathBuf::from(&base);
        let mut counter = 0u32;
        while tokio::fs::try_exists(&target).await.unwrap_or(false) {
            target = PathBuf::from(format!("{}.{}", base, counter));
            counter += 1;
        }
        match tokio::fs::rename(path, &target).await {
            Ok(()) => warn!(
                "quarantined corrupt record file {} -> {} ({})",
                path.display(),
                target.display(),
                detail
            ),
            Err(e) => warn!(
                "failed to quarantine corrupt record file {}: {}",
                path.display(),
                e
            ),
        }
    }

    /// Read access to a player's ordered entries.
    pub async fn entries(&mut self, player_id: &str) -> Result<&[RaidEntry], RecordError> {
        self.ensure_loaded(player_id).await?;
        Ok(self.cache.get(player_id).map(Vec::as_slice).unwrap_or(&[]))
    }

    /// Mutate a player's entries and write the file through afterwards.
    pub async fn update<F, R>(&mut self, player_id: &str, mutate: F) -> Result<R, RecordError>
    where
        F: FnOnce(&mut Vec<RaidEntry>) -> R,
    {
        self.ensure_loaded(player_id).await?;
        let entries = self.cache.entry(player_id.to_string()).or_default();
        let result = mutate(entries);
        self.save_player(player_id).await?;
        Ok(result)
    }

    /// Persist a player's cached entries to disk.
    pub async fn save_player(&self, player_id: &str) -> Result<(), RecordError> {
        let path = self.player_file(player_id)?;
        let entries = self.cache.get(player_id).cloned().unwrap_or_default();
        let content = serde_json::to_string_pretty(&entries)?;
        write_file_locked(&path, &content)?;
        Ok(())
    }

    /// Drop a player's history from cache and disk.
    pub async fn delete_player(&mut self, player_id: &str) -> Result<(), RecordError> {
        let path = self.player_file(player_id)?;
        self.cache.remove(player_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("deleted record file for {}", player_id);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Player ids that have a record file on disk.
    pub async fn list_players(&self) -> Result<Vec<String>, RecordError> {
        let mut players = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.records_dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(player) = name.strip_suffix(".json") {
                players.push(player.to_string());
            }
        }
        players.sort();
        Ok(players)
    }

    /// All archived raids for a player, oldest first.
    pub async fn list_archives(&mut self, player_id: &str) -> Result<Vec<RaidArchive>, RecordError> {
        self.ensure_loaded(player_id).await?;
        let mut archives: Vec<RaidArchive> = self
            .cache
            .get(player_id)
            .into_iter()
            .flatten()
            .filter_map(RaidEntry::as_archive)
            .cloned()
            .collect();
        archives.sort_by_key(|a| a.created_at);
        Ok(archives)
    }

    /// Look up one archive by raid id or ordered index.
    pub async fn get_archive(
        &mut self,
        player_id: &str,
        selector: &ArchiveSelector,
    ) -> Result<RaidArchive, RecordError> {
        let archives = self.list_archives(player_id).await?;
        let found = match selector {
            ArchiveSelector::RaidId(id) => archives.into_iter().find(|a| &a.raid_id == id),
            ArchiveSelector::Index(idx) => archives.into_iter().nth(*idx),
        };
        found.ok_or_else(|| RecordError::InvalidSelector(selector.to_string()))
    }

    /// Mutate one archive in place (recheck write-back) and persist.
    pub async fn update_archive<F, R>(
        &mut self,
        player_id: &str,
        selector: &ArchiveSelector,
        mutate: F,
    ) -> Result<R, RecordError>
    where
        F: FnOnce(&mut RaidArchive) -> R,
    {
        self.ensure_loaded(player_id).await?;
        // Resolve index selectors against the same ordering list_archives uses.
        let target_raid_id = match selector {
            ArchiveSelector::RaidId(id) => id.clone(),
            ArchiveSelector::Index(_) => self.get_archive(player_id, selector).await?.raid_id,
        };
        let entries = self.cache.entry(player_id.to_string()).or_default();
        let archive = entries
            .iter_mut()
            .filter_map(|e| match e {
                RaidEntry::Archived(a) if a.raid_id == target_raid_id => Some(a),
                _ => None,
            })
            .next()
            .ok_or_else(|| RecordError::InvalidSelector(selector.to_string()))?;
        let result = mutate(archive);
        self.save_player(player_id).await?;
        Ok(result)
    }
}

/// Write `content` to `path` atomically under an exclusive lock.
///
/// The destination is opened first to take the lock, the content goes to a
/// fresh temp file in the same directory, and a rename publishes it. fs2 has
/// no async surface, so this stays synchronous; record files are small.
fn write_file_locked(path: &Path, content: &str) -> Result<(), RecordError> {
    use std::fs::OpenOptions;
    use std::io::Write;

    let lock_file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(path)?;
    lock_file.lock_exclusive()?;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let base = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("record.json");
    let mut counter = 0u32;
    let tmp_path = loop {
        let candidate = dir.join(format!(".{}.tmp-{}-{}", base, std::process::id(), counter));
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(mut tmp) => {
                tmp.write_all(content.as_bytes())?;
                tmp.flush()?;
                let _ = tmp.sync_all();
                break candidate;
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                counter += 1;
                if counter > 1000 {
                    let _ = fs2::FileExt::unlock(&lock_file);
                    return Err(e.into());
                }
            }
            Err(e) => {
                let _ = fs2::FileExt::unlock(&lock_file);
                return Err(e.into());
            }
        }
    };

    let result = std::fs::rename(&tmp_path, path);
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    let _ = fs2::FileExt::unlock(&lock_file);
    result?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::types::{RaidRecord, Side};
    use chrono::Utc;
    use tempfile::TempDir;

    fn pending(raid_id: &str, player: &str) -> RaidEntry {
        RaidEntry::Pending(RaidRecord::new(raid_id, player, Side::Pmc, Utc::now()))
    }

    #[tokio::test]
    async fn round_trips_player_entries() {
        let dir = TempDir::new().expect("tempdir");
        let mut store = RecordStore::open(dir.path()).await.expect("store");
        store
            .update("p1", |entries| entries.push(pending("factory.1", "p1")))
            .await
            .expect("update");

        // Fresh store instance forces a disk read.
        let mut reopened = RecordStore::open(dir.path()).await.expect("reopen");
        let entries = reopened.entries("p1").await.expect("entries");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].raid_id(), "factory.1");
    }

    #[tokio::test]
    async fn unknown_player_has_empty_history() {
        let dir = TempDir::new().expect("tempdir");
        let mut store = RecordStore::open(dir.path()).await.expect("store");
        assert!(store.entries("nobody").await.expect("entries").is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_quarantined_not_fatal() {
        let dir = TempDir::new().expect("tempdir");
        let records = dir.path().join("records");
        tokio::fs::create_dir_all(&records).await.expect("mkdir");
        tokio::fs::write(records.join("p1.json"), "{not json")
            .await
            .expect("write");

        let mut store = RecordStore::open(dir.path()).await.expect("store");
        assert!(store.entries("p1").await.expect("entries").is_empty());
        assert!(records.join("p1.json.err").exists());
        assert!(!records.join("p1.json").exists());
    }

    #[tokio::test]
    async fn quarantine_names_do_not_collide() {
        let dir = TempDir::new().expect("tempdir");
        let records = dir.path().join("records");
        tokio::fs::create_dir_all(&records).await.expect("mkdir");
        tokio::fs::write(records.join("p1.json.err"), "older corpse")
            .await
            .expect("write");
        tokio::fs::write(records.join("p1.json"), "{not json")
            .await
            .expect("write");

        let mut store = RecordStore::open(dir.path()).await.expect("store");
        let _ = store.entries("p1").await.expect("entries");
        assert!(records.join("p1.json.err.0").exists());
    }

    #[tokio::test]
    async fn rejects_path_hostile_player_ids() {
        let dir = TempDir::new().expect("tempdir");
        let mut store = RecordStore::open(dir.path()).await.expect("store");
        assert!(matches!(
            store.entries("../escape").await,
            Err(RecordError::InvalidPlayerId(_))
        ));
        assert!(matches!(
            store.entries("").await,
            Err(RecordError::InvalidPlayerId(_))
        ));
    }

    #[tokio::test]
    async fn delete_removes_cache_and_file() {
        let dir = TempDir::new().expect("tempdir");
        let mut store = RecordStore::open(dir.path()).await.expect("store");
        store
            .update("p1", |entries| entries.push(pending("factory.1", "p1")))
            .await
            .expect("update");
        store.delete_player("p1").await.expect("delete");
        assert!(store.entries("p1").await.expect("entries").is_empty());
        assert!(store.list_players().await.expect("list").is_empty());
    }
}

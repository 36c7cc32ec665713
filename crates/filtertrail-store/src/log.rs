// ABOUTME: Event log store persisting the whole trail to a primary JSON file mirrored to a backup.
// ABOUTME: Writes are atomic renames; loads fall back to the backup, then to an empty log.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use filtertrail_core::event::FilterEvent;
use filtertrail_core::persist::{LogPersistence, PersistError};
use thiserror::Error;

use crate::legacy::normalize_events;

pub const PRIMARY_FILE: &str = "filter_data.json";
pub const BACKUP_FILE: &str = "filter_data_backup.json";

/// Errors that can occur while writing the event log.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("both log locations failed (primary: {primary}; backup: {backup})")]
    BothLocationsFailed { primary: String, backup: String },
}

/// Which file a load was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Primary,
    Backup,
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub events: Vec<FilterEvent>,
    pub source: LoadSource,
    pub warnings: Vec<String>,
}

/// Which locations a save reached. At least one is always true.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveReport {
    pub primary: bool,
    pub backup: bool,
}

/// Write `bytes` to `path` using write-tmp, fsync, rename, then fsync the parent.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!("{}.tmp", file_name));

    let mut file = File::create(&tmp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, path)?;

    if let Some(parent) = path.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }
    Ok(())
}

/// The primary and backup locations of one event log.
#[derive(Debug, Clone)]
pub struct EventLogStore {
    primary: PathBuf,
    backup: PathBuf,
}

impl EventLogStore {
    pub fn new(primary: PathBuf, backup: PathBuf) -> Self {
        Self { primary, backup }
    }

    /// Store using the standard file names inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(PRIMARY_FILE), dir.join(BACKUP_FILE))
    }

    pub fn primary_path(&self) -> &Path {
        &self.primary
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup
    }

    /// Write the full log to the primary, then mirror it to the backup.
    /// Succeeds when either location was written.
    pub fn save(&self, events: &[FilterEvent]) -> Result<SaveReport, StoreError> {
        let json = serde_json::to_string_pretty(events)?;

        let primary = atomic_write(&self.primary, json.as_bytes());
        let backup = atomic_write(&self.backup, json.as_bytes());

        match (primary, backup) {
            (Ok(()), Ok(())) => Ok(SaveReport {
                primary: true,
                backup: true,
            }),
            (Ok(()), Err(e)) => {
                tracing::warn!(path = %self.backup.display(), error = %e, "backup log write failed");
                Ok(SaveReport {
                    primary: true,
                    backup: false,
                })
            }
            (Err(e), Ok(())) => {
                tracing::warn!(
                    path = %self.primary.display(),
                    error = %e,
                    "primary log write failed, saved to backup"
                );
                Ok(SaveReport {
                    primary: false,
                    backup: true,
                })
            }
            (Err(p), Err(b)) => Err(StoreError::BothLocationsFailed {
                primary: p.to_string(),
                backup: b.to_string(),
            }),
        }
    }

    /// Read the log, preferring the primary. Never fails: corrupt or missing
    /// files degrade to the backup and then to an empty log, with warnings.
    pub fn load(&self) -> LoadReport {
        let mut warnings = Vec::new();

        for (path, source) in [
            (&self.primary, LoadSource::Primary),
            (&self.backup, LoadSource::Backup),
        ] {
            match read_log(path) {
                Ok(Some((events, repaired))) => {
                    if repaired > 0 {
                        warnings.push(format!(
                            "{}: normalized {} older event(s)",
                            path.display(),
                            repaired
                        ));
                    }
                    if source == LoadSource::Backup {
                        tracing::warn!(path = %path.display(), "loaded filter trail from backup");
                    }
                    for warning in &warnings {
                        tracing::warn!("{}", warning);
                    }
                    return LoadReport {
                        events,
                        source,
                        warnings,
                    };
                }
                Ok(None) => {
                    warnings.push(format!("{}: missing or empty", path.display()));
                }
                Err(e) => {
                    warnings.push(format!("{}: {}", path.display(), e));
                }
            }
        }

        for warning in &warnings {
            tracing::warn!("{}", warning);
        }
        LoadReport {
            events: Vec::new(),
            source: LoadSource::Empty,
            warnings,
        }
    }

    /// Replace both locations with an empty log.
    pub fn reset(&self) -> Result<SaveReport, StoreError> {
        self.save(&[])
    }
}

/// `Ok(None)` when the file is absent or blank.
fn read_log(path: &Path) -> Result<Option<(Vec<FilterEvent>, usize)>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(None);
    }
    let report = normalize_events(&contents)?;
    Ok(Some((report.events, report.repaired)))
}

impl LogPersistence for EventLogStore {
    fn save(&self, events: &[FilterEvent]) -> Result<(), PersistError> {
        EventLogStore::save(self, events)
            .map(|_| ())
            .map_err(|e| PersistError(e.to_string()))
    }

    fn reset(&self) -> Result<(), PersistError> {
        EventLogStore::reset(self)
            .map(|_| ())
            .map_err(|e| PersistError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use filtertrail_core::event::{FilterAction, FilterEntry};
    use tempfile::TempDir;

    fn sample_log() -> Vec<FilterEvent> {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let add = FilterEvent {
            timestamp: t0 + chrono::Duration::seconds(5),
            action: FilterAction::FilterChange,
            added_filters: vec![FilterEntry {
                column: "Region".to_string(),
                values: vec!["East".to_string()],
                column_index: 2,
            }],
            removed_filters: Vec::new(),
            previous_row_count: 100,
            current_row_count: 40,
            total_rows: 100,
            filter_column: "Region".to_string(),
            filter_columns: vec!["Region".to_string()],
            active_filters: vec!["Region".to_string()],
        };
        vec![FilterEvent::initial_connection(100, t0), add]
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = EventLogStore::in_dir(dir.path());
        let events = sample_log();

        let report = store.save(&events).unwrap();
        assert!(report.primary && report.backup);

        let loaded = store.load();
        assert_eq!(loaded.source, LoadSource::Primary);
        assert_eq!(loaded.events, events);
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn corrupt_primary_falls_back_to_backup() {
        let dir = TempDir::new().unwrap();
        let store = EventLogStore::in_dir(dir.path());
        store.save(&sample_log()).unwrap();
        fs::write(store.primary_path(), "{ not json").unwrap();

        let loaded = store.load();
        assert_eq!(loaded.source, LoadSource::Backup);
        assert_eq!(loaded.events.len(), 2);
        assert_eq!(loaded.warnings.len(), 1);
    }

    #[test]
    fn empty_primary_falls_back_to_backup() {
        let dir = TempDir::new().unwrap();
        let store = EventLogStore::in_dir(dir.path());
        store.save(&sample_log()).unwrap();
        fs::write(store.primary_path(), "").unwrap();

        assert_eq!(store.load().source, LoadSource::Backup);
    }

    #[test]
    fn both_corrupt_degrades_to_empty() {
        let dir = TempDir::new().unwrap();
        let store = EventLogStore::in_dir(dir.path());
        fs::write(store.primary_path(), "garbage").unwrap();
        fs::write(store.backup_path(), "[{").unwrap();

        let loaded = store.load();
        assert_eq!(loaded.source, LoadSource::Empty);
        assert!(loaded.events.is_empty());
        assert_eq!(loaded.warnings.len(), 2);
    }

    #[test]
    fn missing_files_load_empty() {
        let dir = TempDir::new().unwrap();
        let store = EventLogStore::in_dir(&dir.path().join("never_created"));
        let loaded = store.load();
        assert_eq!(loaded.source, LoadSource::Empty);
    }

    #[test]
    fn reset_empties_both_locations() {
        let dir = TempDir::new().unwrap();
        let store = EventLogStore::in_dir(dir.path());
        store.save(&sample_log()).unwrap();
        store.reset().unwrap();

        let loaded = store.load();
        assert_eq!(loaded.source, LoadSource::Primary);
        assert!(loaded.events.is_empty());
        let backup = fs::read_to_string(store.backup_path()).unwrap();
        assert_eq!(backup.trim(), "[]");
    }

    #[test]
    fn unwritable_primary_still_saves_backup() {
        let dir = TempDir::new().unwrap();
        // A directory where the primary file should be makes its rename fail.
        let primary = dir.path().join("primary.json");
        fs::create_dir_all(primary.join("occupied")).unwrap();
        let store = EventLogStore::new(primary, dir.path().join("backup.json"));

        let report = store.save(&sample_log()).unwrap();
        assert!(!report.primary);
        assert!(report.backup);
        assert_eq!(store.load().source, LoadSource::Backup);
    }

    #[test]
    fn persistence_trait_reports_total_failure() {
        let dir = TempDir::new().unwrap();
        let primary = dir.path().join("a.json");
        let backup = dir.path().join("b.json");
        fs::create_dir_all(primary.join("x")).unwrap();
        fs::create_dir_all(backup.join("x")).unwrap();
        let store = EventLogStore::new(primary, backup);

        let err = LogPersistence::save(&store, &sample_log()).unwrap_err();
        assert!(err.0.contains("both log locations failed"));
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = EventLogStore::in_dir(dir.path());
        store.save(&sample_log()).unwrap();
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}

/// Modification detector for machine-maintained regions.
///
/// After every successful sync the fingerprint of each written region is
/// recorded. On the next sync the current region content is compared:
/// same fingerprint → untouched (safe to overwrite), different → modified
/// by hand (preserve), no record → never synced.
///
/// Records live outside the notes, in a JSON sidecar under the vault root.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fingerprint::ContentFingerprint;
use crate::storage::local::LocalNoteStore;
use crate::storage::VaultError;

const SIDECAR_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionState {
    /// Content still matches what was last written.
    Untouched,
    /// Content differs from what was last written.
    Modified,
    /// Nothing has been written to this region yet.
    NeverSynced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintRecord {
    pub fingerprint: ContentFingerprint,
    pub recorded_at: DateTime<Utc>,
}

/// Persistence for last-written fingerprints, keyed by (note id, region).
pub trait FingerprintStore: Send {
    fn get(&self, note_id: &str, region: &str) -> Option<&FingerprintRecord>;

    fn put(&mut self, note_id: &str, region: &str, record: FingerprintRecord);

    /// Persist pending records. A no-op for in-memory stores.
    fn flush(&mut self) -> Result<(), VaultError>;
}

type NoteRecords = BTreeMap<String, BTreeMap<String, FingerprintRecord>>;

#[derive(Debug, Default)]
pub struct MemoryFingerprintStore {
    notes: NoteRecords,
}

impl MemoryFingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FingerprintStore for MemoryFingerprintStore {
    fn get(&self, note_id: &str, region: &str) -> Option<&FingerprintRecord> {
        self.notes.get(note_id)?.get(region)
    }

    fn put(&mut self, note_id: &str, region: &str, record: FingerprintRecord) {
        self.notes
            .entry(note_id.to_string())
            .or_default()
            .insert(region.to_string(), record);
    }

    fn flush(&mut self) -> Result<(), VaultError> {
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SidecarFile {
    version: u32,
    #[serde(default)]
    notes: NoteRecords,
}

/// Fingerprint store backed by a JSON sidecar file.
pub struct JsonFingerprintStore {
    path: PathBuf,
    notes: NoteRecords,
    dirty: bool,
}

impl JsonFingerprintStore {
    /// Load the sidecar. A missing file starts empty; an unreadable or
    /// corrupt file is logged and also starts empty, so every region reads
    /// as never synced until rewritten.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let notes = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<SidecarFile>(&text) {
                Ok(file) if file.version == SIDECAR_VERSION => file.notes,
                Ok(file) => {
                    log::warn!(
                        "[vaultkeep.sync] Unsupported sidecar version {} in {}, starting empty",
                        file.version,
                        path.display()
                    );
                    NoteRecords::new()
                }
                Err(e) => {
                    log::warn!(
                        "[vaultkeep.sync] Corrupt sidecar {}: {}, starting empty",
                        path.display(),
                        e
                    );
                    NoteRecords::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => NoteRecords::new(),
            Err(e) => {
                log::warn!(
                    "[vaultkeep.sync] Cannot read sidecar {}: {}, starting empty",
                    path.display(),
                    e
                );
                NoteRecords::new()
            }
        };
        Self {
            path,
            notes,
            dirty: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FingerprintStore for JsonFingerprintStore {
    fn get(&self, note_id: &str, region: &str) -> Option<&FingerprintRecord> {
        self.notes.get(note_id)?.get(region)
    }

    fn put(&mut self, note_id: &str, region: &str, record: FingerprintRecord) {
        self.notes
            .entry(note_id.to_string())
            .or_default()
            .insert(region.to_string(), record);
        self.dirty = true;
    }

    fn flush(&mut self) -> Result<(), VaultError> {
        if !self.dirty {
            return Ok(());
        }
        let file = SidecarFile {
            version: SIDECAR_VERSION,
            notes: self.notes.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| VaultError::Sidecar(e.to_string()))?;
        LocalNoteStore::atomic_write(&self.path, &json)
            .map_err(|e| VaultError::Sidecar(format!("{}: {}", self.path.display(), e)))?;
        self.dirty = false;
        Ok(())
    }
}

pub struct ModificationDetector<S: FingerprintStore> {
    store: S,
}

impl<S: FingerprintStore> ModificationDetector<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Compare current region content against the last recorded write.
    pub fn classify(&self, note_id: &str, region: &str, current: &str) -> RegionState {
        match self.store.get(note_id, region) {
            None => RegionState::NeverSynced,
            Some(record) if record.fingerprint == ContentFingerprint::from_content(current) => {
                RegionState::Untouched
            }
            Some(_) => RegionState::Modified,
        }
    }

    /// Record content that was just written. Call only after the note
    /// write succeeded, then `commit`.
    pub fn record(&mut self, note_id: &str, region: &str, written: &str) {
        self.store.put(
            note_id,
            region,
            FingerprintRecord {
                fingerprint: ContentFingerprint::from_content(written),
                recorded_at: Utc::now(),
            },
        );
    }

    pub fn commit(&mut self) -> Result<(), VaultError> {
        self.store.flush()
    }
}

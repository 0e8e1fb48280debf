/// Local filesystem note store.
///
/// Notes are markdown files under the vault root with:
/// - Vault-relative note ids (no escaping the root)
/// - Atomic writes (write to a sibling .tmp, fsync, rename, fsync directory)
/// - Excluded folders skipped during enumeration
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use walkdir::WalkDir;

use super::{normalize_folder, normalize_note_id, NoteStore, VaultError};
use crate::config::VaultConfig;

pub struct LocalNoteStore {
    config: VaultConfig,
}

impl LocalNoteStore {
    pub fn new(config: VaultConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.config.vault_path
    }

    /// Accept either a vault-relative reference or an absolute path inside
    /// the vault, and return its note id.
    pub fn note_id_for(&self, raw: &str) -> Result<String, VaultError> {
        let path = Path::new(raw.trim());
        if path.is_absolute() {
            let relative = path
                .strip_prefix(self.root())
                .map_err(|_| VaultError::InvalidNoteId(raw.to_string()))?;
            return normalize_note_id(&relative.to_string_lossy());
        }
        normalize_note_id(raw)
    }

    fn path_for(&self, note_id: &str) -> Result<PathBuf, VaultError> {
        let id = normalize_note_id(note_id)?;
        Ok(self.root().join(id))
    }

    /// Atomic write with fsync: write to a unique sibling .tmp, fsync, rename,
    /// fsync directory. The temp file is removed if any step before the rename fails.
    pub(crate) fn atomic_write(path: &Path, content: &str) -> Result<(), std::io::Error> {
        let dir = path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir)?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "note".to_string());
        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos();
        let tmp_path = dir.join(format!(
            ".{}.{}-{:08x}.vaultkeep.tmp",
            file_name,
            std::process::id(),
            nanos
        ));

        let result = (|| {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp_path, path)
        })();
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        // fsync directory for rename durability
        if let Ok(d) = fs::File::open(dir) {
            let _ = d.sync_all();
        }
        Ok(())
    }
}

impl NoteStore for LocalNoteStore {
    fn exists(&self, note_id: &str) -> Result<bool, VaultError> {
        Ok(self.path_for(note_id)?.is_file())
    }

    fn read(&self, note_id: &str) -> Result<String, VaultError> {
        let path = self.path_for(note_id)?;
        fs::read_to_string(&path).map_err(|e| VaultError::io(note_id, e))
    }

    fn write(&self, note_id: &str, text: &str) -> Result<(), VaultError> {
        let path = self.path_for(note_id)?;
        Self::atomic_write(&path, text).map_err(|e| VaultError::Io {
            note_id: note_id.to_string(),
            source: e,
        })?;
        log::debug!("[vaultkeep.storage] Wrote {} ({} bytes)", note_id, text.len());
        Ok(())
    }

    fn modified_time(&self, note_id: &str) -> Result<DateTime<Local>, VaultError> {
        let path = self.path_for(note_id)?;
        let metadata = fs::metadata(&path).map_err(|e| VaultError::io(note_id, e))?;
        let modified = metadata.modified().map_err(|e| VaultError::io(note_id, e))?;
        Ok(DateTime::<Local>::from(modified))
    }

    fn list_notes(&self, folder: &str) -> Result<Vec<String>, VaultError> {
        let folder = normalize_folder(folder)?;
        let base = self.root().join(&folder);
        if !base.is_dir() {
            return Err(VaultError::FolderNotFound(folder));
        }

        let root = self.root().to_path_buf();
        let mut notes = Vec::new();
        let walker = WalkDir::new(&base).follow_links(false).into_iter();
        for entry in walker.filter_entry(|e| {
            e.path()
                .strip_prefix(&root)
                .map(|rel| !self.config.is_excluded(rel))
                .unwrap_or(false)
        }) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("[vaultkeep.storage] Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let is_markdown = entry
                .path()
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("md"))
                .unwrap_or(false);
            if !is_markdown {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(&root) {
                let id = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().to_string())
                    .collect::<Vec<_>>()
                    .join("/");
                notes.push(id);
            }
        }
        notes.sort();
        Ok(notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalNoteStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalNoteStore::new(VaultConfig::new(dir.path()));
        (dir, store)
    }

    #[test]
    fn test_write_and_read() {
        let (_dir, store) = store();
        store.write("Daily/2026-01-10", "# Today\n").unwrap();
        assert!(store.exists("Daily/2026-01-10.md").unwrap());
        assert_eq!(store.read("Daily/2026-01-10.md").unwrap(), "# Today\n");
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let (_dir, store) = store();
        let err = store.read("nope.md").unwrap_err();
        assert!(matches!(err, VaultError::NotFound { ref note_id } if note_id == "nope.md"));
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let (dir, store) = store();
        store.write("a.md", "one").unwrap();
        store.write("a.md", "two").unwrap();
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.md".to_string()]);
        assert_eq!(store.read("a.md").unwrap(), "two");
    }

    #[test]
    fn test_list_notes_skips_excluded_and_non_markdown() {
        let (dir, store) = store();
        store.write("1 - Projects/Alpha/plan.md", "x").unwrap();
        store.write("1 - Projects/Beta.md", "x").unwrap();
        store.write(".obsidian/cache.md", "x").unwrap();
        fs::write(dir.path().join("1 - Projects/image.png"), b"png").unwrap();

        let all = store.list_notes("").unwrap();
        assert_eq!(
            all,
            vec!["1 - Projects/Alpha/plan.md".to_string(), "1 - Projects/Beta.md".to_string()]
        );

        let alpha = store.list_notes("1 - Projects/Alpha").unwrap();
        assert_eq!(alpha, vec!["1 - Projects/Alpha/plan.md".to_string()]);
    }

    #[test]
    fn test_list_missing_folder() {
        let (_dir, store) = store();
        assert!(matches!(
            store.list_notes("Missing"),
            Err(VaultError::FolderNotFound(_))
        ));
    }

    #[test]
    fn test_note_id_for_absolute_path() {
        let (dir, store) = store();
        let abs = dir.path().join("Daily").join("2026-01-10.md");
        assert_eq!(
            store.note_id_for(&abs.to_string_lossy()).unwrap(),
            "Daily/2026-01-10.md"
        );
        assert!(store.note_id_for("/elsewhere/x.md").is_err());
    }

    #[test]
    fn test_modified_time() {
        let (_dir, store) = store();
        store.write("a.md", "x").unwrap();
        let modified = store.modified_time("a.md").unwrap();
        let age = Local::now().signed_duration_since(modified);
        assert!(age.num_seconds() < 60);
    }
}

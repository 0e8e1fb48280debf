pub mod local;

use chrono::{DateTime, Local};

/// Abstract note store. Note ids are vault-relative paths with `/`
/// separators and a `.md` suffix (see [`normalize_note_id`]).
/// Implementations: LocalNoteStore (filesystem).
pub trait NoteStore: Send + Sync {
    /// Whether the note currently exists.
    fn exists(&self, note_id: &str) -> Result<bool, VaultError>;

    /// Read the full raw text of a note.
    fn read(&self, note_id: &str) -> Result<String, VaultError>;

    /// Replace a note's text. Readers never observe a partially written file.
    fn write(&self, note_id: &str, text: &str) -> Result<(), VaultError>;

    /// Last modification time of the note.
    fn modified_time(&self, note_id: &str) -> Result<DateTime<Local>, VaultError>;

    /// All notes under `folder` (recursively), sorted by id. An empty folder
    /// string means the whole vault.
    fn list_notes(&self, folder: &str) -> Result<Vec<String>, VaultError>;
}

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("Note not found: {note_id}")]
    NotFound { note_id: String },

    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    #[error("Invalid note id: {0}")]
    InvalidNoteId(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error on {note_id}: {source}")]
    Io {
        note_id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Fingerprint sidecar error: {0}")]
    Sidecar(String),
}

impl VaultError {
    /// Short machine-readable kind, used by front ends.
    pub fn kind(&self) -> &'static str {
        match self {
            VaultError::NotFound { .. } | VaultError::FolderNotFound(_) => "not_found",
            VaultError::InvalidNoteId(_) => "invalid_note_id",
            VaultError::Configuration(_) => "configuration_error",
            VaultError::Io { .. } => "io_error",
            VaultError::Sidecar(_) => "sidecar_error",
        }
    }

    pub(crate) fn io(note_id: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            VaultError::NotFound {
                note_id: note_id.to_string(),
            }
        } else {
            VaultError::Io {
                note_id: note_id.to_string(),
                source,
            }
        }
    }
}

/// Normalize a vault-relative note reference into a note id.
/// Backslashes become `/`, `.` segments are dropped, `..` is rejected and a
/// missing `.md` suffix is appended.
pub fn normalize_note_id(raw: &str) -> Result<String, VaultError> {
    let cleaned = raw.trim().replace('\\', "/");
    let mut segments = Vec::new();
    for segment in cleaned.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(VaultError::InvalidNoteId(raw.to_string())),
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        return Err(VaultError::InvalidNoteId(raw.to_string()));
    }
    let mut id = segments.join("/");
    if !id.to_ascii_lowercase().ends_with(".md") {
        id.push_str(".md");
    }
    Ok(id)
}

/// Normalize a vault-relative folder reference. Empty means the vault root.
pub fn normalize_folder(raw: &str) -> Result<String, VaultError> {
    let cleaned = raw.trim().replace('\\', "/");
    let mut segments = Vec::new();
    for segment in cleaned.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(VaultError::InvalidNoteId(raw.to_string())),
            s => segments.push(s),
        }
    }
    Ok(segments.join("/"))
}

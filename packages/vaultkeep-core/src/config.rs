/// Vault configuration shared by the note store, the task aggregator and
/// front ends. Passed explicitly; nothing here is global.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// PARA category a note lives under, derived from its top-level folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParaLocation {
    Inbox,
    Projects,
    Areas,
    Resources,
    Archive,
}

impl ParaLocation {
    pub const ALL: [ParaLocation; 5] = [
        ParaLocation::Inbox,
        ParaLocation::Projects,
        ParaLocation::Areas,
        ParaLocation::Resources,
        ParaLocation::Archive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParaLocation::Inbox => "inbox",
            ParaLocation::Projects => "projects",
            ParaLocation::Areas => "areas",
            ParaLocation::Resources => "resources",
            ParaLocation::Archive => "archive",
        }
    }
}

impl fmt::Display for ParaLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Folder name for each PARA category, relative to the vault root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParaFolders {
    #[serde(default = "default_inbox")]
    pub inbox: String,
    #[serde(default = "default_projects")]
    pub projects: String,
    #[serde(default = "default_areas")]
    pub areas: String,
    #[serde(default = "default_resources")]
    pub resources: String,
    #[serde(default = "default_archive")]
    pub archive: String,
}

fn default_inbox() -> String {
    "0 - INBOX".to_string()
}

fn default_projects() -> String {
    "1 - Projects".to_string()
}

fn default_areas() -> String {
    "2 - AREAS".to_string()
}

fn default_resources() -> String {
    "3 - RESOURCES".to_string()
}

fn default_archive() -> String {
    "4 - ARCHIVE".to_string()
}

impl Default for ParaFolders {
    fn default() -> Self {
        Self {
            inbox: default_inbox(),
            projects: default_projects(),
            areas: default_areas(),
            resources: default_resources(),
            archive: default_archive(),
        }
    }
}

impl ParaFolders {
    pub fn folder(&self, location: ParaLocation) -> &str {
        match location {
            ParaLocation::Inbox => &self.inbox,
            ParaLocation::Projects => &self.projects,
            ParaLocation::Areas => &self.areas,
            ParaLocation::Resources => &self.resources,
            ParaLocation::Archive => &self.archive,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    pub vault_path: PathBuf,
    #[serde(default)]
    pub para_folders: ParaFolders,
    #[serde(default = "default_exclude_folders")]
    pub exclude_folders: Vec<String>,
    #[serde(default = "default_daily_notes_folder")]
    pub daily_notes_folder: String,
    /// Fingerprint sidecar, relative to the vault root.
    #[serde(default = "default_sidecar_file")]
    pub sidecar_file: String,
}

fn default_exclude_folders() -> Vec<String> {
    vec![
        ".obsidian".to_string(),
        ".trash".to_string(),
        "node_modules".to_string(),
    ]
}

fn default_daily_notes_folder() -> String {
    "Daily".to_string()
}

fn default_sidecar_file() -> String {
    ".vaultkeep/fingerprints.json".to_string()
}

impl VaultConfig {
    pub fn new(vault_path: impl Into<PathBuf>) -> Self {
        Self {
            vault_path: vault_path.into(),
            para_folders: ParaFolders::default(),
            exclude_folders: default_exclude_folders(),
            daily_notes_folder: default_daily_notes_folder(),
            sidecar_file: default_sidecar_file(),
        }
    }

    pub fn sidecar_path(&self) -> PathBuf {
        self.vault_path.join(&self.sidecar_file)
    }

    /// Note id of the daily note for `date` (`YYYY-MM-DD`).
    pub fn daily_note_id(&self, date: &str) -> String {
        let folder = self.daily_notes_folder.trim_matches('/');
        if folder.is_empty() {
            format!("{}.md", date)
        } else {
            format!("{}/{}.md", folder, date)
        }
    }

    /// True when any component of the vault-relative path is an excluded folder.
    pub fn is_excluded(&self, relative: &Path) -> bool {
        relative.components().any(|c| {
            let part = c.as_os_str().to_string_lossy();
            self.exclude_folders.iter().any(|ex| ex == part.as_ref())
        })
    }

    /// PARA category of a note id, by its first path segment.
    pub fn para_location(&self, note_id: &str) -> Option<ParaLocation> {
        let first = note_id.split('/').next().unwrap_or("");
        ParaLocation::ALL
            .into_iter()
            .find(|loc| self.para_folders.folder(*loc) == first)
    }

    /// Project a note belongs to. Inside the projects folder this is the next
    /// segment (or the note's own stem); elsewhere it is the first segment.
    pub fn project_of(&self, note_id: &str) -> String {
        let segments: Vec<&str> = note_id.split('/').filter(|s| !s.is_empty()).collect();
        let in_projects = segments
            .first()
            .map(|s| *s == self.para_folders.projects)
            .unwrap_or(false);
        let candidates = if in_projects { &segments[1..] } else { &segments[..] };
        match candidates {
            [] => String::new(),
            [only] => note_stem(only),
            [first, ..] => first.to_string(),
        }
    }
}

fn note_stem(file_name: &str) -> String {
    file_name
        .strip_suffix(".md")
        .unwrap_or(file_name)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_json() {
        let config: VaultConfig = serde_json::from_str(r#"{"vault_path": "/vault"}"#).unwrap();
        assert_eq!(config.para_folders.projects, "1 - Projects");
        assert_eq!(config.daily_notes_folder, "Daily");
        assert!(config.exclude_folders.contains(&".obsidian".to_string()));
        assert_eq!(
            config.sidecar_path(),
            PathBuf::from("/vault/.vaultkeep/fingerprints.json")
        );
    }

    #[test]
    fn test_para_location() {
        let config = VaultConfig::new("/vault");
        assert_eq!(
            config.para_location("1 - Projects/Alpha/plan.md"),
            Some(ParaLocation::Projects)
        );
        assert_eq!(
            config.para_location("4 - ARCHIVE/old.md"),
            Some(ParaLocation::Archive)
        );
        assert_eq!(config.para_location("Daily/2026-01-10.md"), None);
    }

    #[test]
    fn test_project_of() {
        let config = VaultConfig::new("/vault");
        assert_eq!(config.project_of("1 - Projects/Alpha/plan.md"), "Alpha");
        assert_eq!(config.project_of("1 - Projects/Beta.md"), "Beta");
        assert_eq!(config.project_of("2 - AREAS/Health/log.md"), "2 - AREAS");
        assert_eq!(config.project_of("README.md"), "README");
    }

    #[test]
    fn test_daily_note_id() {
        let mut config = VaultConfig::new("/vault");
        assert_eq!(config.daily_note_id("2026-01-10"), "Daily/2026-01-10.md");
        config.daily_notes_folder = String::new();
        assert_eq!(config.daily_note_id("2026-01-10"), "2026-01-10.md");
    }

    #[test]
    fn test_is_excluded() {
        let config = VaultConfig::new("/vault");
        assert!(config.is_excluded(Path::new(".obsidian/workspace.md")));
        assert!(config.is_excluded(Path::new("a/node_modules/b.md")));
        assert!(!config.is_excluded(Path::new("1 - Projects/a.md")));
    }
}

/// Vault facade: the operations exposed to a calling agent.
///
/// Owns the note store, the fingerprint sidecar and the task aggregator.
/// Reports are recomputed from current note content on every call.
use std::sync::{Mutex, PoisonError};

use chrono::{Local, NaiveDate};

use crate::config::{ParaLocation, VaultConfig};
use crate::sections::{JsonFingerprintStore, ModificationDetector};
use crate::storage::local::LocalNoteStore;
use crate::storage::{NoteStore, VaultError};
use crate::sync::{ProposedSection, SyncEngine, SyncOutcome, SyncRequest};
use crate::tasks::parser::parse_note;
use crate::tasks::stats::TaskAggregator;
use crate::template::{BraceTemplate, TemplateRenderer};
use crate::types::{FolderStats, NoteTasks, ProjectActivity, TaskExtraction, WeeklySummary};

pub struct Vault {
    store: LocalNoteStore,
    aggregator: TaskAggregator,
    renderer: Box<dyn TemplateRenderer>,
    detector: Mutex<ModificationDetector<JsonFingerprintStore>>,
}

impl Vault {
    /// Open a vault. The vault root must be an existing directory.
    pub fn open(config: VaultConfig) -> Result<Self, VaultError> {
        if !config.vault_path.is_dir() {
            return Err(VaultError::Configuration(format!(
                "vault path {} is not a directory",
                config.vault_path.display()
            )));
        }
        let sidecar = JsonFingerprintStore::load(config.sidecar_path());
        log::info!(
            "[vaultkeep.storage] Opened vault {}",
            config.vault_path.display()
        );
        Ok(Self {
            store: LocalNoteStore::new(config.clone()),
            aggregator: TaskAggregator::new(config),
            renderer: Box::new(BraceTemplate),
            detector: Mutex::new(ModificationDetector::new(sidecar)),
        })
    }

    pub fn with_renderer(mut self, renderer: Box<dyn TemplateRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn config(&self) -> &VaultConfig {
        self.store.config()
    }

    pub fn store(&self) -> &LocalNoteStore {
        &self.store
    }

    pub fn sync_note(&self, request: &SyncRequest) -> Result<SyncOutcome, VaultError> {
        let mut request = request.clone();
        request
            .vars
            .entry("date".to_string())
            .or_insert_with(|| Local::now().date_naive().to_string());
        request.note_id = self.store.note_id_for(&request.note_id)?;

        let mut detector = self.detector.lock().unwrap_or_else(PoisonError::into_inner);
        SyncEngine::new(&self.store, self.renderer.as_ref(), &mut detector).sync(&request)
    }

    /// Sync the daily note for `date`. The note is created from `template`
    /// when it is missing and a template is given.
    pub fn sync_daily_note(
        &self,
        date: NaiveDate,
        sections: Vec<ProposedSection>,
        preserve_modified: bool,
        template: Option<String>,
    ) -> Result<SyncOutcome, VaultError> {
        let date = date.format("%Y-%m-%d").to_string();
        let mut request = SyncRequest::new(self.config().daily_note_id(&date))
            .preserve_modified(preserve_modified)
            .var("date", date);
        request.sections = sections;
        request.create_if_missing = template.is_some();
        request.template = template;
        self.sync_note(&request)
    }

    /// Tasks of one note in line order. `sections` keeps tasks whose heading
    /// contains any of the given names, case-insensitively.
    pub fn extract_tasks(
        &self,
        note_id: &str,
        sections: Option<&[String]>,
    ) -> Result<TaskExtraction, VaultError> {
        let note_id = self.store.note_id_for(note_id)?;
        let text = self.store.read(&note_id)?;
        let mut tasks = parse_note(&text, &note_id);

        if let Some(filter) = sections.filter(|f| !f.is_empty()) {
            let wanted: Vec<String> = filter.iter().map(|s| s.to_lowercase()).collect();
            tasks.retain(|task| {
                let heading = task.section.to_lowercase();
                wanted.iter().any(|w| heading.contains(w.as_str()))
            });
        }
        Ok(TaskExtraction::from_tasks(&note_id, tasks))
    }

    pub fn folder_stats(
        &self,
        folder: &str,
        as_of: NaiveDate,
        lookback_days: u32,
    ) -> Result<FolderStats, VaultError> {
        let notes = self.collect(folder)?;
        let notes_scanned = notes.len();
        let tasks: Vec<_> = notes.into_iter().flat_map(|n| n.tasks).collect();
        Ok(FolderStats {
            folder: folder.to_string(),
            notes_scanned,
            stats: self.aggregator.aggregate(&tasks, as_of, lookback_days),
        })
    }

    pub fn weekly_summary(
        &self,
        folder: &str,
        start: NaiveDate,
        end: NaiveDate,
        location: Option<ParaLocation>,
    ) -> Result<WeeklySummary, VaultError> {
        if start > end {
            return Err(VaultError::Configuration(format!(
                "summary start {} is after end {}",
                start, end
            )));
        }
        let config = self.config();
        let tasks: Vec<_> = self
            .collect(folder)?
            .into_iter()
            .filter(|n| location.is_none() || config.para_location(&n.note_id) == location)
            .flat_map(|n| n.tasks)
            .collect();
        Ok(self.aggregator.weekly_summary(&tasks, start, end))
    }

    pub fn project_activity(
        &self,
        folder: &str,
        as_of: NaiveDate,
    ) -> Result<Vec<ProjectActivity>, VaultError> {
        let notes = self.collect(folder)?;
        Ok(self.aggregator.project_activity(&notes, as_of))
    }

    /// Parse every note under `folder`. Notes that cannot be read are logged
    /// and skipped.
    fn collect(&self, folder: &str) -> Result<Vec<NoteTasks>, VaultError> {
        let mut notes = Vec::new();
        for note_id in self.store.list_notes(folder)? {
            let read = self
                .store
                .read(&note_id)
                .and_then(|text| Ok((text, self.store.modified_time(&note_id)?)));
            match read {
                Ok((text, modified)) => notes.push(NoteTasks {
                    tasks: parse_note(&text, &note_id),
                    note_id,
                    modified: modified.date_naive(),
                }),
                Err(e) => {
                    log::warn!("[vaultkeep.tasks] Skipping {}: {}", note_id, e);
                }
            }
        }
        log::debug!(
            "[vaultkeep.tasks] Collected {} notes under '{}'",
            notes.len(),
            folder
        );
        Ok(notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::RegionState;
    use std::fs;
    use tempfile::TempDir;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn vault() -> (TempDir, Vault) {
        let dir = TempDir::new().unwrap();
        let vault = Vault::open(VaultConfig::new(dir.path())).unwrap();
        (dir, vault)
    }

    #[test]
    fn test_open_requires_directory() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            Vault::open(VaultConfig::new(missing)),
            Err(VaultError::Configuration(_))
        ));
    }

    #[test]
    fn test_sync_daily_note_creates_in_daily_folder() {
        let (dir, vault) = vault();
        let outcome = vault
            .sync_daily_note(
                date("2026-01-10"),
                vec![ProposedSection {
                    name: "schedule".to_string(),
                    content: "- 09:00 Standup".to_string(),
                }],
                true,
                Some("# {date}\n\n{section_schedule}\n".to_string()),
            )
            .unwrap();
        assert!(outcome.created);
        assert_eq!(outcome.note_id, "Daily/2026-01-10.md");

        let text = fs::read_to_string(dir.path().join("Daily/2026-01-10.md")).unwrap();
        assert!(text.starts_with("# 2026-01-10\n"));
        assert!(text.contains("- 09:00 Standup\n"));
        assert!(dir.path().join(".vaultkeep/fingerprints.json").is_file());
    }

    #[test]
    fn test_sync_daily_note_without_template_requires_existing_note() {
        let (_dir, vault) = vault();
        let err = vault
            .sync_daily_note(date("2026-01-10"), Vec::new(), true, None)
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_sidecar_survives_reopen() {
        let (dir, vault) = vault();
        vault
            .sync_note(
                &SyncRequest::new("Inbox")
                    .section("log", "machine\n")
                    .create_with("{section_log}\n"),
            )
            .unwrap();
        drop(vault);

        let reopened = Vault::open(VaultConfig::new(dir.path())).unwrap();
        let detector = reopened.detector.lock().unwrap();
        assert_eq!(
            detector.classify("Inbox.md", "log", "machine\n"),
            RegionState::Untouched
        );
    }

    #[test]
    fn test_extract_tasks_with_section_filter() {
        let (_dir, vault) = vault();
        vault
            .store()
            .write(
                "1 - Projects/Alpha.md",
                "- [ ] loose\n## Next Actions\n- [ ] call\n- [x] email ✅ 2026-01-09\n## Someday\n- [ ] learn\n",
            )
            .unwrap();

        let all = vault.extract_tasks("1 - Projects/Alpha", None).unwrap();
        assert_eq!(all.total, 4);
        assert_eq!(all.checked, 1);
        assert_eq!(all.by_section.len(), 3);

        let filter = vec!["next".to_string()];
        let next = vault
            .extract_tasks("1 - Projects/Alpha.md", Some(&filter))
            .unwrap();
        assert_eq!(next.total, 2);
        assert_eq!(next.tasks[0].description, "call");
        assert_eq!(next.tasks[0].line_number, 3);
    }

    #[test]
    fn test_extract_tasks_missing_note() {
        let (_dir, vault) = vault();
        assert!(matches!(
            vault.extract_tasks("missing", None),
            Err(VaultError::NotFound { .. })
        ));
    }

    #[test]
    fn test_folder_stats_spans_notes() {
        let (_dir, vault) = vault();
        let store = vault.store();
        store
            .write("1 - Projects/Alpha.md", "- [ ] Ship release 📅 2026-01-10 🔺\n- [x] done ✅ 2026-01-14\n")
            .unwrap();
        store
            .write("1 - Projects/Beta/plan.md", "- [ ] draft 📅 2026-01-16\n")
            .unwrap();
        store.write("2 - AREAS/Home.md", "- [ ] chores\n").unwrap();

        let stats = vault
            .folder_stats("1 - Projects", date("2026-01-15"), 7)
            .unwrap();
        assert_eq!(stats.notes_scanned, 2);
        assert_eq!(stats.stats.total, 3);
        assert_eq!(stats.stats.overdue, 1);
        assert_eq!(stats.stats.active, 1);
        assert_eq!(stats.stats.due_soon, 1);
        assert_eq!(stats.stats.recent_completions, 1);

        let whole = vault.folder_stats("", date("2026-01-15"), 7).unwrap();
        assert_eq!(whole.stats.total, 4);
    }

    #[test]
    fn test_weekly_summary_location_filter() {
        let (_dir, vault) = vault();
        let store = vault.store();
        store
            .write("1 - Projects/Alpha.md", "- [x] a ✅ 2026-01-12\n")
            .unwrap();
        store.write("2 - AREAS/Home.md", "- [x] b ✅ 2026-01-13\n").unwrap();

        let all = vault
            .weekly_summary("", date("2026-01-12"), date("2026-01-18"), None)
            .unwrap();
        assert_eq!(all.completed, 2);

        let projects = vault
            .weekly_summary(
                "",
                date("2026-01-12"),
                date("2026-01-18"),
                Some(ParaLocation::Projects),
            )
            .unwrap();
        assert_eq!(projects.completed, 1);
        assert_eq!(projects.completed_by_project.get("Alpha"), Some(&1));

        assert!(vault
            .weekly_summary("", date("2026-01-18"), date("2026-01-12"), None)
            .is_err());
    }

    #[test]
    fn test_project_activity_uses_completion_dates() {
        let (_dir, vault) = vault();
        vault
            .store()
            .write("1 - Projects/Alpha.md", "- [x] a ✅ 2099-01-01\n")
            .unwrap();
        let activity = vault
            .project_activity("1 - Projects", date("2099-01-03"))
            .unwrap();
        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0].project, "Alpha");
        assert_eq!(activity[0].last_activity_date, date("2099-01-01"));
        assert_eq!(activity[0].days_since_activity, 2);
        assert!(!activity[0].stale);
    }

    #[test]
    fn test_missing_folder_is_error() {
        let (_dir, vault) = vault();
        assert!(vault.folder_stats("Nope", date("2026-01-15"), 7).is_err());
    }
}

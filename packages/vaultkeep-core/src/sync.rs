/// Section-preserving sync of machine content into a note.
///
/// Per proposed region:
/// - Never synced or untouched since the last sync -> write the new content
/// - Modified by hand since the last sync -> keep it (when preserving)
/// - `preserve_modified = false` -> always write
///
/// Regions not named in the request and all text outside regions are left
/// byte-for-byte as they were. Fingerprints are recorded only once the note
/// write has succeeded.
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::sections::document::{self, empty_region, is_valid_region_name};
use crate::sections::{FingerprintStore, ModificationDetector, RegionState};
use crate::storage::{normalize_note_id, NoteStore, VaultError};
use crate::template::TemplateRenderer;

/// One region's proposed machine content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedSection {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncRequest {
    pub note_id: String,
    /// Applied in order; new regions are appended in this order.
    #[serde(deserialize_with = "deserialize_sections")]
    pub sections: Vec<ProposedSection>,
    #[serde(default = "default_true")]
    pub preserve_modified: bool,
    #[serde(default)]
    pub create_if_missing: bool,
    #[serde(default)]
    pub template: Option<String>,
    /// Extra template variables, used only when the note is created.
    #[serde(default)]
    pub vars: HashMap<String, String>,
}

fn default_true() -> bool {
    true
}

impl SyncRequest {
    pub fn new(note_id: impl Into<String>) -> Self {
        Self {
            note_id: note_id.into(),
            sections: Vec::new(),
            preserve_modified: true,
            create_if_missing: false,
            template: None,
            vars: HashMap::new(),
        }
    }

    pub fn section(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.sections.push(ProposedSection {
            name: name.into(),
            content: content.into(),
        });
        self
    }

    pub fn preserve_modified(mut self, preserve: bool) -> Self {
        self.preserve_modified = preserve;
        self
    }

    pub fn create_with(mut self, template: impl Into<String>) -> Self {
        self.create_if_missing = true;
        self.template = Some(template.into());
        self
    }

    pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

/// Accept sections either as a JSON object (`{"name": "content"}`, kept in
/// document order) or as a list of `{name, content}`.
pub fn deserialize_sections<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<ProposedSection>, D::Error> {
    struct SectionsVisitor;

    impl<'de> Visitor<'de> for SectionsVisitor {
        type Value = Vec<ProposedSection>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of region name to content, or a list of {name, content}")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut sections = Vec::new();
            while let Some((name, content)) = map.next_entry::<String, String>()? {
                sections.push(ProposedSection { name, content });
            }
            Ok(sections)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut sections = Vec::new();
            while let Some(section) = seq.next_element::<ProposedSection>()? {
                sections.push(section);
            }
            Ok(sections)
        }
    }

    d.deserialize_any(SectionsVisitor)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub note_id: String,
    pub created: bool,
    /// Regions that received the proposed content.
    pub updated_regions: Vec<String>,
    /// Regions kept as-is because they were edited by hand.
    pub preserved_regions: Vec<String>,
    /// Updated regions that did not exist before and were appended.
    pub new_regions: Vec<String>,
}

pub struct SyncEngine<'a, S: FingerprintStore> {
    store: &'a dyn NoteStore,
    renderer: &'a dyn TemplateRenderer,
    detector: &'a mut ModificationDetector<S>,
}

impl<'a, S: FingerprintStore> SyncEngine<'a, S> {
    pub fn new(
        store: &'a dyn NoteStore,
        renderer: &'a dyn TemplateRenderer,
        detector: &'a mut ModificationDetector<S>,
    ) -> Self {
        Self {
            store,
            renderer,
            detector,
        }
    }

    pub fn sync(&mut self, request: &SyncRequest) -> Result<SyncOutcome, VaultError> {
        validate_sections(&request.sections)?;
        let note_id = normalize_note_id(&request.note_id)?;

        let (original, created) = if self.store.exists(&note_id)? {
            (self.store.read(&note_id)?, false)
        } else if !request.create_if_missing {
            return Err(VaultError::NotFound { note_id });
        } else {
            let template = request.template.as_deref().ok_or_else(|| {
                VaultError::Configuration(format!(
                    "a template is required to create missing note {}",
                    note_id
                ))
            })?;
            let vars = template_vars(&note_id, request);
            (self.renderer.render(template, &vars), true)
        };

        let mut doc = document::parse(&original);
        let mut outcome = SyncOutcome {
            note_id: note_id.clone(),
            created,
            ..SyncOutcome::default()
        };
        let mut applied: Vec<(&str, String)> = Vec::new();

        for section in &request.sections {
            let name = section.name.as_str();
            // A freshly created note has no history; stale records must not
            // protect template text.
            let state = if created {
                RegionState::NeverSynced
            } else {
                let current = doc.get_region(name).unwrap_or("");
                self.detector.classify(&note_id, name, current)
            };

            if request.preserve_modified && state == RegionState::Modified {
                log::debug!(
                    "[vaultkeep.sync] {}: preserving hand-edited region '{}'",
                    note_id,
                    name
                );
                outcome.preserved_regions.push(name.to_string());
                continue;
            }

            let existed = doc.has_region(name);
            doc.set_region(name, &section.content);
            log::debug!(
                "[vaultkeep.sync] {}: writing region '{}' ({:?})",
                note_id,
                name,
                state
            );
            let written = doc.get_region(name).unwrap_or("").to_string();
            applied.push((name, written));
            outcome.updated_regions.push(name.to_string());
            if !existed {
                outcome.new_regions.push(name.to_string());
            }
        }

        let rendered = document::render(&doc);
        if created || rendered != original {
            self.store.write(&note_id, &rendered)?;
        }

        for (name, written) in &applied {
            self.detector.record(&note_id, name, written);
        }
        self.detector.commit()?;

        log::info!(
            "[vaultkeep.sync] {} {}: {} updated, {} preserved, {} new",
            if created { "Created" } else { "Synced" },
            note_id,
            outcome.updated_regions.len(),
            outcome.preserved_regions.len(),
            outcome.new_regions.len()
        );
        Ok(outcome)
    }
}

fn validate_sections(sections: &[ProposedSection]) -> Result<(), VaultError> {
    let mut seen = HashSet::new();
    for section in sections {
        if !is_valid_region_name(&section.name) {
            return Err(VaultError::Configuration(format!(
                "invalid region name {:?}",
                section.name
            )));
        }
        if !seen.insert(section.name.as_str()) {
            return Err(VaultError::Configuration(format!(
                "region {:?} proposed more than once",
                section.name
            )));
        }
    }
    Ok(())
}

fn template_vars(note_id: &str, request: &SyncRequest) -> HashMap<String, String> {
    let title = Path::new(note_id)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut vars = HashMap::new();
    vars.insert("note_id".to_string(), note_id.to_string());
    vars.insert("title".to_string(), title);
    for section in &request.sections {
        vars.insert(format!("section_{}", section.name), empty_region(&section.name));
    }
    for (key, value) in &request.vars {
        vars.insert(key.clone(), value.clone());
    }
    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VaultConfig;
    use crate::sections::MemoryFingerprintStore;
    use crate::storage::local::LocalNoteStore;
    use crate::template::BraceTemplate;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        store: LocalNoteStore,
        detector: ModificationDetector<MemoryFingerprintStore>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let store = LocalNoteStore::new(VaultConfig::new(dir.path()));
            Self {
                _dir: dir,
                store,
                detector: ModificationDetector::new(MemoryFingerprintStore::new()),
            }
        }

        fn sync(&mut self, request: &SyncRequest) -> Result<SyncOutcome, VaultError> {
            SyncEngine::new(&self.store, &BraceTemplate, &mut self.detector).sync(request)
        }

        fn read(&self, note_id: &str) -> String {
            self.store.read(note_id).unwrap()
        }
    }

    const DAILY_TEMPLATE: &str = "# {title}\n\n{section_schedule}\n\n## Notes\n";

    fn schedule(content: &str) -> SyncRequest {
        SyncRequest::new("Daily/2026-01-10.md").section("schedule", content)
    }

    #[test]
    fn test_create_from_template() {
        let mut fx = Fixture::new();
        let outcome = fx
            .sync(&schedule("- 09:00 Standup\n").create_with(DAILY_TEMPLATE))
            .unwrap();
        assert!(outcome.created);
        assert_eq!(outcome.updated_regions, vec!["schedule"]);
        assert!(outcome.new_regions.is_empty());
        assert_eq!(
            fx.read("Daily/2026-01-10.md"),
            "# 2026-01-10\n\n<!-- SECTION:schedule:START -->\n- 09:00 Standup\n<!-- SECTION:schedule:END -->\n\n## Notes\n"
        );
    }

    #[test]
    fn test_missing_note_without_create_is_not_found() {
        let mut fx = Fixture::new();
        let err = fx.sync(&schedule("x")).unwrap_err();
        assert!(matches!(err, VaultError::NotFound { ref note_id } if note_id == "Daily/2026-01-10.md"));
        assert!(!fx.store.exists("Daily/2026-01-10.md").unwrap());
    }

    #[test]
    fn test_missing_template_is_configuration_error() {
        let mut fx = Fixture::new();
        let mut request = schedule("x");
        request.create_if_missing = true;
        assert!(matches!(fx.sync(&request), Err(VaultError::Configuration(_))));
    }

    #[test]
    fn test_invalid_region_name_is_configuration_error() {
        let mut fx = Fixture::new();
        fx.store.write("a.md", "text\n").unwrap();
        let request = SyncRequest::new("a.md").section("bad:name", "x");
        assert!(matches!(fx.sync(&request), Err(VaultError::Configuration(_))));
        let request = SyncRequest::new("a.md").section("a", "x").section("a", "y");
        assert!(matches!(fx.sync(&request), Err(VaultError::Configuration(_))));
        assert_eq!(fx.read("a.md"), "text\n");
    }

    #[test]
    fn test_sync_is_idempotent() {
        let mut fx = Fixture::new();
        let request = schedule("- 09:00 Standup\n").create_with(DAILY_TEMPLATE);
        let first = fx.sync(&request).unwrap();
        let after_first = fx.read("Daily/2026-01-10.md");
        let second = fx.sync(&request).unwrap();

        assert!(first.preserved_regions.is_empty());
        assert!(second.preserved_regions.is_empty());
        assert!(!second.created);
        assert_eq!(second.updated_regions, vec!["schedule"]);
        assert_eq!(fx.read("Daily/2026-01-10.md"), after_first);
    }

    #[test]
    fn test_hand_edited_region_is_preserved() {
        let mut fx = Fixture::new();
        fx.sync(&schedule("- 09:00 Standup\n").create_with(DAILY_TEMPLATE))
            .unwrap();

        let edited = fx
            .read("Daily/2026-01-10.md")
            .replace("- 09:00 Standup", "- 09:00 Standup (moved to 10:00)");
        fx.store.write("Daily/2026-01-10.md", &edited).unwrap();

        let outcome = fx.sync(&schedule("- 09:30 Planning\n")).unwrap();
        assert_eq!(outcome.preserved_regions, vec!["schedule"]);
        assert!(outcome.updated_regions.is_empty());
        assert_eq!(fx.read("Daily/2026-01-10.md"), edited);

        // Still preserved on the next run: the fingerprint was not updated.
        let again = fx.sync(&schedule("- 11:00 Review\n")).unwrap();
        assert_eq!(again.preserved_regions, vec!["schedule"]);
    }

    #[test]
    fn test_overwrite_when_not_preserving() {
        let mut fx = Fixture::new();
        fx.sync(&schedule("- 09:00\n").create_with(DAILY_TEMPLATE))
            .unwrap();
        let edited = fx.read("Daily/2026-01-10.md").replace("- 09:00", "- mine");
        fx.store.write("Daily/2026-01-10.md", &edited).unwrap();

        let outcome = fx
            .sync(&schedule("- 10:00\n").preserve_modified(false))
            .unwrap();
        assert_eq!(outcome.updated_regions, vec!["schedule"]);
        let text = fx.read("Daily/2026-01-10.md");
        assert!(text.contains("- 10:00\n"));
        assert!(!text.contains("- mine"));

        // The forced write is recorded, so the region is untouched again.
        let next = fx.sync(&schedule("- 11:00\n")).unwrap();
        assert!(next.preserved_regions.is_empty());
    }

    #[test]
    fn test_reverted_edit_counts_as_untouched() {
        let mut fx = Fixture::new();
        fx.sync(&schedule("- 09:00\n").create_with(DAILY_TEMPLATE))
            .unwrap();
        let original = fx.read("Daily/2026-01-10.md");
        fx.store
            .write("Daily/2026-01-10.md", &original.replace("- 09:00", "- edit"))
            .unwrap();
        fx.store.write("Daily/2026-01-10.md", &original).unwrap();

        let outcome = fx.sync(&schedule("- 10:00\n")).unwrap();
        assert!(outcome.preserved_regions.is_empty());
    }

    #[test]
    fn test_new_region_appended_to_hand_written_note() {
        let mut fx = Fixture::new();
        let original = "# Meeting notes\n\nWritten by hand, no markers.\n";
        fx.store.write("2 - AREAS/Work.md", original).unwrap();

        let outcome = fx
            .sync(&SyncRequest::new("2 - AREAS/Work.md").section("tasks", "- [ ] Follow up"))
            .unwrap();
        assert!(!outcome.created);
        assert_eq!(outcome.new_regions, vec!["tasks"]);

        let text = fx.read("2 - AREAS/Work.md");
        assert!(text.starts_with(original));
        assert!(text.ends_with(
            "<!-- SECTION:tasks:START -->\n- [ ] Follow up\n<!-- SECTION:tasks:END -->\n"
        ));
    }

    #[test]
    fn test_untouched_text_outside_regions_survives() {
        let mut fx = Fixture::new();
        fx.sync(
            &schedule("- 09:00\n")
                .section("tasks", "- [ ] a\n")
                .create_with(DAILY_TEMPLATE),
        )
        .unwrap();
        let with_notes = format!("{}Hand-written journal entry.\n", fx.read("Daily/2026-01-10.md"));
        fx.store.write("Daily/2026-01-10.md", &with_notes).unwrap();

        fx.sync(&schedule("- 10:00\n")).unwrap();
        let text = fx.read("Daily/2026-01-10.md");
        assert!(text.contains("Hand-written journal entry.\n"));
        assert!(text.contains("- [ ] a\n"));
        assert!(text.contains("- 10:00\n"));
    }

    #[test]
    fn test_mixed_outcome() {
        let mut fx = Fixture::new();
        fx.sync(
            &schedule("- 09:00\n")
                .section("tasks", "- [ ] a\n")
                .create_with(DAILY_TEMPLATE),
        )
        .unwrap();
        let edited = fx.read("Daily/2026-01-10.md").replace("- [ ] a", "- [x] a");
        fx.store.write("Daily/2026-01-10.md", &edited).unwrap();

        let outcome = fx
            .sync(&schedule("- 10:00\n").section("tasks", "- [ ] b\n"))
            .unwrap();
        assert_eq!(outcome.updated_regions, vec!["schedule"]);
        assert_eq!(outcome.preserved_regions, vec!["tasks"]);
    }

    #[test]
    fn test_unterminated_region_is_closed_without_losing_text() {
        let mut fx = Fixture::new();
        fx.store
            .write("a.md", "<!-- SECTION:log:START -->\nhand text\n")
            .unwrap();
        let outcome = fx.sync(&SyncRequest::new("a.md").section("log", "machine\n")).unwrap();
        assert_eq!(outcome.updated_regions, vec!["log"]);
        assert_eq!(
            fx.read("a.md"),
            "<!-- SECTION:log:START -->\nmachine\n<!-- SECTION:log:END -->\nhand text\n"
        );
    }

    #[test]
    fn test_unterminated_region_leaves_later_regions_syncable() {
        let mut fx = Fixture::new();
        fx.store
            .write(
                "a.md",
                "<!-- SECTION:log:START -->\nhand\n<!-- SECTION:tasks:START -->\nold\n<!-- SECTION:tasks:END -->\n",
            )
            .unwrap();
        let request = SyncRequest::new("a.md").section("tasks", "new\n");

        let first = fx.sync(&request).unwrap();
        assert_eq!(first.updated_regions, vec!["tasks"]);
        assert!(first.new_regions.is_empty());
        let after_first = fx.read("a.md");
        assert_eq!(
            after_first,
            "<!-- SECTION:log:START -->\nhand\n<!-- SECTION:tasks:START -->\nnew\n<!-- SECTION:tasks:END -->\n"
        );

        for _ in 0..2 {
            let outcome = fx.sync(&request).unwrap();
            assert!(outcome.preserved_regions.is_empty());
            assert_eq!(outcome.updated_regions, vec!["tasks"]);
            assert_eq!(fx.read("a.md"), after_first);
        }
    }

    #[test]
    fn test_fingerprints_committed_to_sidecar() {
        use crate::sections::JsonFingerprintStore;

        let dir = TempDir::new().unwrap();
        let config = VaultConfig::new(dir.path());
        let store = LocalNoteStore::new(config.clone());
        let mut detector = ModificationDetector::new(JsonFingerprintStore::load(config.sidecar_path()));

        SyncEngine::new(&store, &BraceTemplate, &mut detector)
            .sync(&schedule("- 09:00\n").create_with(DAILY_TEMPLATE))
            .unwrap();

        let reloaded = ModificationDetector::new(JsonFingerprintStore::load(config.sidecar_path()));
        assert_eq!(
            reloaded.classify("Daily/2026-01-10.md", "schedule", "- 09:00\n"),
            RegionState::Untouched
        );
    }

    #[test]
    fn test_request_from_json_keeps_section_order() {
        let request: SyncRequest = serde_json::from_str(
            r#"{"note_id": "a", "sections": {"zeta": "1", "alpha": "2"}, "create_if_missing": true, "template": "t"}"#,
        )
        .unwrap();
        let names: Vec<&str> = request.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert!(request.preserve_modified);

        let list: SyncRequest = serde_json::from_str(
            r#"{"note_id": "a", "sections": [{"name": "b", "content": "x"}]}"#,
        )
        .unwrap();
        assert_eq!(list.sections[0].name, "b");
        assert!(!list.create_if_missing);
    }
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Heading text used for tasks that appear before any heading.
pub const UNTITLED_SECTION: &str = "untitled";

/// Task priority, ordered lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Lowest,
    Low,
    Medium,
    High,
    Highest,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Lowest => "lowest",
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Highest => "highest",
        }
    }
}

/// One checkbox line of a note. Always derived from current file content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub checked: bool,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub blocked: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub section: String,
    pub source_note: String,
    pub line_number: usize,
}

impl Task {
    /// Unchecked with a due date strictly before `as_of`.
    pub fn is_overdue(&self, as_of: NaiveDate) -> bool {
        !self.checked && self.due_date.map(|d| d < as_of).unwrap_or(false)
    }

    /// Unchecked and not overdue.
    pub fn is_active(&self, as_of: NaiveDate) -> bool {
        !self.checked && !self.is_overdue(as_of)
    }

    /// Active with a due date in `[as_of, as_of + window_days]`.
    pub fn is_due_soon(&self, as_of: NaiveDate, window_days: i64) -> bool {
        if !self.is_active(as_of) {
            return false;
        }
        match self.due_date {
            Some(due) => (due - as_of).num_days() <= window_days,
            None => false,
        }
    }

    /// Checked with a known completion date inside `[start, end]`.
    pub fn completed_between(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.checked
            && self
                .completion_date
                .map(|d| d >= start && d <= end)
                .unwrap_or(false)
    }

    /// Whether the task regenerates on completion.
    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }
}

/// Folder-level task statistics. Counts are over the whole task set; the
/// `active_tasks` list is capped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub as_of: NaiveDate,
    pub lookback_days: u32,
    pub total: usize,
    pub completed: usize,
    pub active: usize,
    pub overdue: usize,
    pub due_soon: usize,
    pub blocked: usize,
    pub high_priority: usize,
    pub recent_completions: usize,
    pub completed_unknown_date: usize,
    pub overdue_tasks: Vec<Task>,
    pub due_soon_tasks: Vec<Task>,
    pub blocked_tasks: Vec<Task>,
    pub recent_completed_tasks: Vec<Task>,
    pub active_tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySummary {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub completed: usize,
    pub completed_by_day: BTreeMap<NaiveDate, usize>,
    pub completed_by_project: BTreeMap<String, usize>,
    pub completed_by_priority: BTreeMap<String, usize>,
    /// Unchecked tasks due before `end_date`.
    pub overdue: usize,
    /// Unchecked tasks not overdue as of `end_date`.
    pub active: usize,
    pub completed_tasks: Vec<Task>,
}

/// Tasks of one note plus the note's modification date, the unit
/// `project_activity` works on.
#[derive(Debug, Clone)]
pub struct NoteTasks {
    pub note_id: String,
    pub modified: NaiveDate,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectActivity {
    pub note_id: String,
    pub title: String,
    pub project: String,
    pub last_activity_date: NaiveDate,
    pub days_since_activity: i64,
    pub stale: bool,
    pub total: usize,
    pub completed: usize,
    pub active: usize,
    pub overdue: usize,
    pub blocked: usize,
    pub recent_completions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderStats {
    pub folder: String,
    pub notes_scanned: usize,
    pub stats: TaskStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionTasks {
    pub section: String,
    pub tasks: Vec<Task>,
}

/// Tasks of a single note, in line order and grouped by heading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskExtraction {
    pub note_id: String,
    pub total: usize,
    pub checked: usize,
    pub unchecked: usize,
    pub tasks: Vec<Task>,
    pub by_section: Vec<SectionTasks>,
}

impl TaskExtraction {
    pub fn from_tasks(note_id: &str, tasks: Vec<Task>) -> Self {
        let mut by_section: Vec<SectionTasks> = Vec::new();
        for task in &tasks {
            match by_section.iter_mut().find(|s| s.section == task.section) {
                Some(group) => group.tasks.push(task.clone()),
                None => by_section.push(SectionTasks {
                    section: task.section.clone(),
                    tasks: vec![task.clone()],
                }),
            }
        }
        let checked = tasks.iter().filter(|t| t.checked).count();
        Self {
            note_id: note_id.to_string(),
            total: tasks.len(),
            checked,
            unchecked: tasks.len() - checked,
            tasks,
            by_section,
        }
    }
}

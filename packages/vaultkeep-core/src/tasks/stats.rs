/// Task aggregation: folder statistics, weekly summaries and project
/// activity. Every report is recomputed in full from the task set it is
/// given; the aggregator holds configuration only.
use chrono::{Days, NaiveDate};
use std::collections::BTreeMap;

use crate::config::VaultConfig;
use crate::types::{NoteTasks, Priority, ProjectActivity, Task, TaskStats, WeeklySummary};

/// Days ahead of `as_of` (inclusive) that count as "due soon".
pub const DUE_SOON_DAYS: i64 = 3;

/// A project is stale once its last activity is more than this many days old.
pub const STALE_AFTER_DAYS: i64 = 7;

/// Maximum number of tasks listed in `TaskStats::active_tasks`.
pub const ACTIVE_LIST_LIMIT: usize = 20;

pub struct TaskAggregator {
    config: VaultConfig,
}

impl TaskAggregator {
    pub fn new(config: VaultConfig) -> Self {
        Self { config }
    }

    /// Partition `tasks` as of `as_of`. Completed, active and overdue are
    /// disjoint and cover every task; due-soon is a subset of active; blocked
    /// counts unchecked tasks and may overlap active or overdue.
    pub fn aggregate(&self, tasks: &[Task], as_of: NaiveDate, lookback_days: u32) -> TaskStats {
        let window_start = days_before(as_of, u64::from(lookback_days));

        let mut stats = TaskStats {
            as_of,
            lookback_days,
            total: tasks.len(),
            completed: 0,
            active: 0,
            overdue: 0,
            due_soon: 0,
            blocked: 0,
            high_priority: 0,
            recent_completions: 0,
            completed_unknown_date: 0,
            overdue_tasks: Vec::new(),
            due_soon_tasks: Vec::new(),
            blocked_tasks: Vec::new(),
            recent_completed_tasks: Vec::new(),
            active_tasks: Vec::new(),
        };

        for task in tasks {
            if task.checked {
                stats.completed += 1;
                if task.completion_date.is_none() {
                    stats.completed_unknown_date += 1;
                } else if task.completed_between(window_start, as_of) {
                    stats.recent_completions += 1;
                    stats.recent_completed_tasks.push(task.clone());
                }
                continue;
            }

            if task.is_overdue(as_of) {
                stats.overdue += 1;
                stats.overdue_tasks.push(task.clone());
            } else {
                stats.active += 1;
                if stats.active_tasks.len() < ACTIVE_LIST_LIMIT {
                    stats.active_tasks.push(task.clone());
                }
                if task.is_due_soon(as_of, DUE_SOON_DAYS) {
                    stats.due_soon += 1;
                    stats.due_soon_tasks.push(task.clone());
                }
            }

            if task.blocked {
                stats.blocked += 1;
                stats.blocked_tasks.push(task.clone());
            }
            if matches!(task.priority, Some(Priority::High | Priority::Highest)) {
                stats.high_priority += 1;
            }
        }

        stats
    }

    /// Completions in `[start_date, end_date]` bucketed by day, project and
    /// priority, plus overdue and active counts as of `end_date`.
    pub fn weekly_summary(
        &self,
        tasks: &[Task],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> WeeklySummary {
        let mut summary = WeeklySummary {
            start_date,
            end_date,
            completed: 0,
            completed_by_day: BTreeMap::new(),
            completed_by_project: BTreeMap::new(),
            completed_by_priority: BTreeMap::new(),
            overdue: 0,
            active: 0,
            completed_tasks: Vec::new(),
        };

        for task in tasks {
            if task.checked {
                if !task.completed_between(start_date, end_date) {
                    continue;
                }
                // completed_between guarantees a completion date
                if let Some(day) = task.completion_date {
                    *summary.completed_by_day.entry(day).or_insert(0) += 1;
                }
                let project = self.config.project_of(&task.source_note);
                *summary.completed_by_project.entry(project).or_insert(0) += 1;
                let priority = task.priority.map(|p| p.as_str()).unwrap_or("none");
                *summary
                    .completed_by_priority
                    .entry(priority.to_string())
                    .or_insert(0) += 1;
                summary.completed += 1;
                summary.completed_tasks.push(task.clone());
            } else if task.is_overdue(end_date) {
                summary.overdue += 1;
            } else {
                summary.active += 1;
            }
        }

        summary
    }

    /// One entry per note, most recently active first.
    pub fn project_activity(&self, notes: &[NoteTasks], as_of: NaiveDate) -> Vec<ProjectActivity> {
        let recent_start = days_before(as_of, STALE_AFTER_DAYS.unsigned_abs());

        let mut projects: Vec<ProjectActivity> = notes
            .iter()
            .map(|note| {
                let last_completion = note
                    .tasks
                    .iter()
                    .filter(|t| t.checked)
                    .filter_map(|t| t.completion_date)
                    .max();
                let last_activity_date = match last_completion {
                    Some(done) if done > note.modified => done,
                    _ => note.modified,
                };
                let days_since_activity = (as_of - last_activity_date).num_days();

                ProjectActivity {
                    note_id: note.note_id.clone(),
                    title: note_title(&note.note_id),
                    project: self.config.project_of(&note.note_id),
                    last_activity_date,
                    days_since_activity,
                    stale: days_since_activity > STALE_AFTER_DAYS,
                    total: note.tasks.len(),
                    completed: note.tasks.iter().filter(|t| t.checked).count(),
                    active: note.tasks.iter().filter(|t| t.is_active(as_of)).count(),
                    overdue: note.tasks.iter().filter(|t| t.is_overdue(as_of)).count(),
                    blocked: note.tasks.iter().filter(|t| !t.checked && t.blocked).count(),
                    recent_completions: note
                        .tasks
                        .iter()
                        .filter(|t| t.completed_between(recent_start, as_of))
                        .count(),
                }
            })
            .collect();

        projects.sort_by(|a, b| {
            b.last_activity_date
                .cmp(&a.last_activity_date)
                .then_with(|| a.note_id.cmp(&b.note_id))
        });
        projects
    }
}

/// `date` minus `days`, clamped to the earliest representable date.
pub fn days_before(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_sub_days(Days::new(days))
        .unwrap_or(NaiveDate::MIN)
}

fn note_title(note_id: &str) -> String {
    let file = note_id.rsplit('/').next().unwrap_or(note_id);
    file.strip_suffix(".md").unwrap_or(file).to_string()
}
